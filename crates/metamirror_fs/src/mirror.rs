//! Node mirror builder: creates or reconciles one destination entry.

use std::io;
use std::path::Path;

use crate::backend::FsBackend;
use crate::select::{SpecAttributeSelection, select_attributes};
use crate::snapshot::{SpecFileAttributes, SpecRelativeEntry};
use crate::spec::{EnumNodeType, MirrorEntryError, SpecMirrorConfig};
use crate::xattrs::transfer_extended_attributes;

/// What happened to the destination node itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumMirrorAction {
    /// The node did not exist and was created.
    Created,
    /// The node already existed; only its attributes were reconciled.
    Updated,
}

/// Per-run mirror builder bound to one backend and one attribute selection.
pub struct NodeMirrorBuilder<'a, B: FsBackend + ?Sized> {
    backend: &'a B,
    selection: SpecAttributeSelection,
}

impl<'a, B: FsBackend + ?Sized> NodeMirrorBuilder<'a, B> {
    pub fn new(backend: &'a B, config: &SpecMirrorConfig) -> Self {
        Self {
            backend,
            selection: select_attributes(config),
        }
    }

    pub fn selection(&self) -> &SpecAttributeSelection {
        &self.selection
    }

    /// Mirror `entry` (read from `path_src`) onto `path_dst`.
    ///
    /// Steps short-circuit on the first failure: type check, destination conflict
    /// check, node creation or reconciliation, extended attributes, flags.
    pub fn mirror(
        &self,
        path_src: &Path,
        path_dst: &Path,
        entry: &SpecRelativeEntry,
    ) -> Result<EnumMirrorAction, MirrorEntryError> {
        let snapshot = &entry.snapshot;
        let node_type = snapshot.node_type;
        let path_rel = entry.path_rel.as_path();

        if node_type == EnumNodeType::Unsupported {
            return Err(MirrorEntryError::UnsupportedFileType {
                path_rel: path_rel.to_path_buf(),
            });
        }

        let node_type_found = self
            .backend
            .query_node_type(path_dst)
            .map_err(|e| derive_creation_error(node_type, path_rel, e))?;
        if let Some(found) = node_type_found
            && found != node_type
        {
            return Err(MirrorEntryError::TypeConflict {
                path_rel: path_rel.to_path_buf(),
                expected: node_type,
                found,
            });
        }
        let if_exists = node_type_found.is_some();

        let attrs = self.selection.build_file_payload(snapshot);
        let action = match node_type {
            EnumNodeType::SymbolicLink | EnumNodeType::AliasLink => {
                self.mirror_link(path_src, path_dst, path_rel, node_type, if_exists, &attrs)?
            }
            EnumNodeType::Directory | EnumNodeType::RegularFile => self
                .mirror_node(path_dst, node_type, if_exists, &attrs)
                .map_err(|e| derive_creation_error(node_type, path_rel, e))?,
            EnumNodeType::Unsupported => {
                return Err(MirrorEntryError::UnsupportedFileType {
                    path_rel: path_rel.to_path_buf(),
                });
            }
        };

        if self.selection.if_transfer_extended_attributes
            && snapshot.if_may_have_extended_attributes
            && node_type != EnumNodeType::SymbolicLink
        {
            transfer_extended_attributes(self.backend, path_src, path_dst, |name| {
                self.selection.is_extended_attribute_selected(name)
            })
            .map_err(|e| MirrorEntryError::ExtendedAttributesCopy {
                path_rel: path_rel.to_path_buf(),
                source: e,
            })?;
        }

        let flags = self.selection.build_resource_payload(snapshot);
        if !flags.is_empty() && node_type != EnumNodeType::SymbolicLink {
            self.backend
                .set_resource_attributes(path_dst, &flags)
                .map_err(|e| MirrorEntryError::FlagsCopy {
                    path_rel: path_rel.to_path_buf(),
                    source: e,
                })?;
        }

        tracing::debug!(path = %path_rel.display(), kind = %node_type, ?action, "mirrored");
        Ok(action)
    }

    /// Directory or placeholder file: create with attributes, or update in place.
    fn mirror_node(
        &self,
        path_dst: &Path,
        node_type: EnumNodeType,
        if_exists: bool,
        attrs: &SpecFileAttributes,
    ) -> io::Result<EnumMirrorAction> {
        if !if_exists {
            let res = if node_type == EnumNodeType::Directory {
                self.backend.create_directory(path_dst, attrs)
            } else {
                self.backend.create_empty_file(path_dst, attrs)
            };
            match res {
                Ok(()) => return Ok(EnumMirrorAction::Created),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
                Err(e) => return Err(e),
            }
        }
        if !attrs.is_empty() {
            self.backend.set_file_attributes(path_dst, attrs)?;
        }
        Ok(EnumMirrorAction::Updated)
    }

    /// Links are copied once; an existing destination link is left as it is.
    /// Only aliases get the file attributes, raw symlinks would forward them to the target.
    fn mirror_link(
        &self,
        path_src: &Path,
        path_dst: &Path,
        path_rel: &Path,
        node_type: EnumNodeType,
        if_exists: bool,
        attrs: &SpecFileAttributes,
    ) -> Result<EnumMirrorAction, MirrorEntryError> {
        let to_err = |e| MirrorEntryError::LinkCopy {
            path_rel: path_rel.to_path_buf(),
            source: e,
        };

        let mut action = EnumMirrorAction::Updated;
        if !if_exists {
            match self.backend.copy_link(path_src, path_dst) {
                Ok(()) => action = EnumMirrorAction::Created,
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
                Err(e) => return Err(to_err(e)),
            }
        }
        if node_type == EnumNodeType::AliasLink && !attrs.is_empty() {
            self.backend
                .set_file_attributes(path_dst, attrs)
                .map_err(to_err)?;
        }
        Ok(action)
    }
}

/// Node-construction error kind for a failure while creating or updating `node_type`.
fn derive_creation_error(
    node_type: EnumNodeType,
    path_rel: &Path,
    source: io::Error,
) -> MirrorEntryError {
    let path_rel = path_rel.to_path_buf();
    match node_type {
        EnumNodeType::Directory => MirrorEntryError::DirectoryCreation { path_rel, source },
        EnumNodeType::SymbolicLink | EnumNodeType::AliasLink => {
            MirrorEntryError::LinkCopy { path_rel, source }
        }
        EnumNodeType::RegularFile | EnumNodeType::Unsupported => {
            MirrorEntryError::FileCreation { path_rel, source }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::path::{Path, PathBuf};
    use std::time::{Duration, UNIX_EPOCH};

    use super::{EnumMirrorAction, NodeMirrorBuilder};
    use crate::backend::{EnumFsOperation, FsBackend, MemoryBackend};
    use crate::select::C_XATTR_FINDER_INFO;
    use crate::snapshot::{SpecFileAttributes, SpecRelativeEntry, SpecResourceAttributes};
    use crate::spec::{EnumMirrorErrorKind, EnumNodeType, MirrorEntryError, SpecMirrorConfig};

    fn derive_attrs() -> SpecFileAttributes {
        SpecFileAttributes {
            time_created: Some(UNIX_EPOCH + Duration::from_secs(1_500_000_000)),
            time_modified: Some(UNIX_EPOCH + Duration::from_secs(1_600_000_000)),
            mode_posix: Some(0o640),
            id_owner: Some(501),
            name_owner: Some("owner".to_string()),
            id_group: Some(20),
            name_group: Some("staff".to_string()),
            code_hfs_creator: Some(*b"ttxt"),
            code_hfs_type: Some(*b"TEXT"),
        }
    }

    fn derive_backend() -> MemoryBackend {
        let backend = MemoryBackend::new();
        backend.add_directory("/src");
        backend.add_directory("/dst");
        backend
    }

    fn derive_entry(backend: &MemoryBackend, name: &str) -> SpecRelativeEntry {
        let snapshot = backend
            .read_snapshot(&Path::new("/src").join(name))
            .expect("snapshot");
        SpecRelativeEntry {
            path_rel: PathBuf::from(name),
            snapshot,
        }
    }

    fn run_mirror(
        backend: &MemoryBackend,
        config: &SpecMirrorConfig,
        name: &str,
    ) -> Result<EnumMirrorAction, MirrorEntryError> {
        let entry = derive_entry(backend, name);
        NodeMirrorBuilder::new(backend, config).mirror(
            &Path::new("/src").join(name),
            &Path::new("/dst").join(name),
            &entry,
        )
    }

    #[test]
    fn file_is_created_empty_with_all_attributes() {
        let backend = derive_backend();
        backend.add_file("/src/f.txt", 42);
        backend.set_node_attributes("/src/f.txt", derive_attrs());
        backend.insert_extended_attribute("/src/f.txt", "user.tag", b"v");
        backend.set_node_flags(
            "/src/f.txt",
            SpecResourceAttributes {
                flag_hidden: Some(true),
                flag_immutable: Some(false),
            },
        );

        let action = run_mirror(&backend, &SpecMirrorConfig::all(), "f.txt").expect("mirror");

        assert_eq!(action, EnumMirrorAction::Created);
        let node = backend.node("/dst/f.txt").expect("node");
        assert_eq!(node.node_type, EnumNodeType::RegularFile);
        assert_eq!(node.len_content, 0);
        assert_eq!(node.attrs, derive_attrs());
        assert_eq!(node.xattrs.get(std::ffi::OsStr::new("user.tag")), Some(&b"v".to_vec()));
        assert_eq!(node.flags.flag_hidden, Some(true));
    }

    #[test]
    fn disabled_categories_are_not_applied() {
        let backend = derive_backend();
        backend.add_file("/src/f.txt", 1);
        backend.set_node_attributes("/src/f.txt", derive_attrs());
        backend.insert_extended_attribute("/src/f.txt", "user.tag", b"v");
        backend.set_node_flags(
            "/src/f.txt",
            SpecResourceAttributes {
                flag_hidden: Some(true),
                flag_immutable: None,
            },
        );
        let config = SpecMirrorConfig {
            if_copy_permissions: false,
            if_copy_extended_attributes: false,
            if_copy_flags: false,
            ..SpecMirrorConfig::all()
        };

        run_mirror(&backend, &config, "f.txt").expect("mirror");

        let node = backend.node("/dst/f.txt").expect("node");
        assert_eq!(node.attrs.time_modified, derive_attrs().time_modified);
        assert_eq!(node.attrs.code_hfs_type, Some(*b"TEXT"));
        assert_eq!(node.attrs.mode_posix, None);
        assert_eq!(node.attrs.id_owner, None);
        assert_eq!(node.attrs.name_group, None);
        assert!(node.xattrs.is_empty());
        assert!(node.flags.is_empty());
        assert_eq!(backend.count_operations(EnumFsOperation::SetResourceAttributes), 0);
    }

    #[test]
    fn unsupported_entry_is_rejected_before_touching_destination() {
        let backend = derive_backend();
        backend.add_unsupported("/src/fifo");

        let err = run_mirror(&backend, &SpecMirrorConfig::all(), "fifo").expect_err("unsupported");

        assert_eq!(err.kind(), EnumMirrorErrorKind::UnsupportedFileType);
        assert_eq!(backend.count_operations(EnumFsOperation::QueryNodeType), 0);
        assert!(backend.node("/dst/fifo").is_none());
    }

    #[test]
    fn existing_entry_of_other_type_is_a_conflict() {
        let backend = derive_backend();
        backend.add_directory("/src/a");
        backend.add_file("/dst/a", 3);

        let err = run_mirror(&backend, &SpecMirrorConfig::all(), "a").expect_err("conflict");

        assert_eq!(
            err.to_string(),
            "File \"a\" already exists but with different type (regular file, expected directory)"
        );
        assert_eq!(backend.node("/dst/a").expect("kept").len_content, 3);
    }

    #[test]
    fn existing_file_keeps_content_and_gets_attributes() {
        let backend = derive_backend();
        backend.add_file("/src/f.txt", 9);
        backend.set_node_attributes("/src/f.txt", derive_attrs());
        backend.add_file("/dst/f.txt", 5);

        let action = run_mirror(&backend, &SpecMirrorConfig::all(), "f.txt").expect("mirror");

        assert_eq!(action, EnumMirrorAction::Updated);
        let node = backend.node("/dst/f.txt").expect("node");
        assert_eq!(node.len_content, 5);
        assert_eq!(node.attrs, derive_attrs());
        assert_eq!(backend.count_operations(EnumFsOperation::CreateEmptyFile), 0);
    }

    #[test]
    fn existing_directory_is_updated() {
        let backend = derive_backend();
        backend.add_directory("/src/a");
        backend.set_node_attributes("/src/a", derive_attrs());
        backend.add_directory("/dst/a");

        let action = run_mirror(&backend, &SpecMirrorConfig::all(), "a").expect("mirror");

        assert_eq!(action, EnumMirrorAction::Updated);
        assert_eq!(backend.node("/dst/a").expect("node").attrs, derive_attrs());
    }

    #[test]
    fn symlink_is_copied_without_attributes() {
        let backend = derive_backend();
        backend.add_symlink("/src/link", "f.txt");
        backend.set_node_attributes("/src/link", derive_attrs());
        backend.insert_extended_attribute("/src/link", "user.tag", b"v");
        backend.set_node_flags(
            "/src/link",
            SpecResourceAttributes {
                flag_hidden: Some(true),
                flag_immutable: Some(true),
            },
        );

        let action = run_mirror(&backend, &SpecMirrorConfig::all(), "link").expect("mirror");

        assert_eq!(action, EnumMirrorAction::Created);
        let node = backend.node("/dst/link").expect("node");
        assert_eq!(node.link_target.as_deref(), Some(Path::new("f.txt")));
        assert!(node.attrs.is_empty());
        assert!(node.xattrs.is_empty());
        assert!(node.flags.is_empty());
        assert_eq!(backend.count_operations(EnumFsOperation::SetFileAttributes), 0);
    }

    #[test]
    fn alias_is_copied_then_given_attributes() {
        let backend = derive_backend();
        backend.add_alias("/src/alias", "/elsewhere/doc");
        backend.set_node_attributes("/src/alias", derive_attrs());

        run_mirror(&backend, &SpecMirrorConfig::all(), "alias").expect("mirror");

        let node = backend.node("/dst/alias").expect("node");
        assert_eq!(node.node_type, EnumNodeType::AliasLink);
        assert_eq!(node.attrs, derive_attrs());
    }

    #[test]
    fn existing_link_is_left_untouched() {
        let backend = derive_backend();
        backend.add_symlink("/src/link", "f.txt");
        backend.add_symlink("/dst/link", "other.txt");

        let action = run_mirror(&backend, &SpecMirrorConfig::all(), "link").expect("mirror");

        assert_eq!(action, EnumMirrorAction::Updated);
        assert_eq!(
            backend.node("/dst/link").expect("node").link_target.as_deref(),
            Some(Path::new("other.txt"))
        );
        assert_eq!(backend.count_operations(EnumFsOperation::CopyLink), 0);
    }

    #[test]
    fn failures_map_to_their_step() {
        let cases = [
            (
                "d",
                EnumNodeType::Directory,
                EnumFsOperation::CreateDirectory,
                EnumMirrorErrorKind::DirectoryCreation,
            ),
            (
                "f",
                EnumNodeType::RegularFile,
                EnumFsOperation::CreateEmptyFile,
                EnumMirrorErrorKind::FileCreation,
            ),
            (
                "l",
                EnumNodeType::SymbolicLink,
                EnumFsOperation::CopyLink,
                EnumMirrorErrorKind::LinkCopy,
            ),
            (
                "x",
                EnumNodeType::RegularFile,
                EnumFsOperation::WriteExtendedAttribute,
                EnumMirrorErrorKind::ExtendedAttributesCopy,
            ),
            (
                "g",
                EnumNodeType::RegularFile,
                EnumFsOperation::SetResourceAttributes,
                EnumMirrorErrorKind::FlagsCopy,
            ),
            (
                "q",
                EnumNodeType::Directory,
                EnumFsOperation::QueryNodeType,
                EnumMirrorErrorKind::DirectoryCreation,
            ),
        ];

        for (name, node_type, operation, kind_expected) in cases {
            let backend = derive_backend();
            let path_src = Path::new("/src").join(name);
            match node_type {
                EnumNodeType::Directory => backend.add_directory(&path_src),
                EnumNodeType::SymbolicLink => backend.add_symlink(&path_src, "t"),
                _ => backend.add_file(&path_src, 1),
            }
            backend.insert_extended_attribute(&path_src, "user.tag", b"v");
            backend.set_node_flags(
                &path_src,
                SpecResourceAttributes {
                    flag_hidden: Some(false),
                    flag_immutable: Some(false),
                },
            );
            backend.inject_failure(
                Path::new("/dst").join(name),
                operation,
                io::ErrorKind::PermissionDenied,
            );

            let err = run_mirror(&backend, &SpecMirrorConfig::all(), name).expect_err(name);
            assert_eq!(err.kind(), kind_expected, "case {name}");
            assert_eq!(err.path_rel(), Path::new(name));
        }
    }

    #[test]
    fn xattrs_are_not_queried_without_hint() {
        let backend = derive_backend();
        backend.add_file("/src/f", 1);

        run_mirror(&backend, &SpecMirrorConfig::all(), "f").expect("mirror");

        assert_eq!(
            backend.count_operations(EnumFsOperation::ListExtendedAttributes),
            0
        );
    }

    #[test]
    fn finder_info_xattr_follows_hfs_codes_switch() {
        let backend = derive_backend();
        backend.add_file("/src/f", 1);
        backend.insert_extended_attribute("/src/f", "user.tag", b"v");
        backend.insert_extended_attribute("/src/f", C_XATTR_FINDER_INFO, b"TEXTttxt");
        let config = SpecMirrorConfig {
            if_copy_hfs_codes: false,
            ..SpecMirrorConfig::all()
        };

        run_mirror(&backend, &config, "f").expect("mirror");

        let node = backend.node("/dst/f").expect("node");
        assert!(node.xattrs.contains_key(std::ffi::OsStr::new("user.tag")));
        assert!(!node.xattrs.contains_key(std::ffi::OsStr::new(C_XATTR_FINDER_INFO)));
    }
}
