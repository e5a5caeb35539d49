//! In-memory [`FsBackend`] with fault injection.
//!
//! Single-threaded by construction (`RefCell`), like the mirroring core itself.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::ffi::{OsStr, OsString};
use std::io;
use std::path::{Path, PathBuf};

use super::FsBackend;
use crate::snapshot::{SpecFileAttributes, SpecMetadataSnapshot, SpecResourceAttributes};
use crate::spec::{AttributeIoError, EnumNodeType, EnumXattrOperation};

/// Backend primitive, used to target injected faults and to count calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EnumFsOperation {
    QueryNodeType,
    ReadSnapshot,
    ListDirectory,
    CreateDirectory,
    CreateEmptyFile,
    CopyLink,
    SetFileAttributes,
    SetResourceAttributes,
    ListExtendedAttributes,
    ReadExtendedAttribute,
    WriteExtendedAttribute,
}

/// One stored entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecMemoryNode {
    pub node_type: EnumNodeType,
    pub len_content: u64,
    pub link_target: Option<PathBuf>,
    pub attrs: SpecFileAttributes,
    pub flags: SpecResourceAttributes,
    pub xattrs: BTreeMap<OsString, Vec<u8>>,
}

impl SpecMemoryNode {
    fn new(node_type: EnumNodeType) -> Self {
        Self {
            node_type,
            len_content: 0,
            link_target: None,
            attrs: SpecFileAttributes::default(),
            flags: SpecResourceAttributes::default(),
            xattrs: BTreeMap::new(),
        }
    }

    fn is_immutable(&self) -> bool {
        self.flags.flag_immutable == Some(true)
    }
}

/// Filesystem tree kept in a map keyed by absolute path.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    nodes: RefCell<BTreeMap<PathBuf, SpecMemoryNode>>,
    faults: RefCell<HashMap<(PathBuf, EnumFsOperation), io::ErrorKind>>,
    log_ops: RefCell<Vec<(EnumFsOperation, PathBuf)>>,
}

////////////////////////////////////////////////////////////////////////////////
// #region Fixtures

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&self, path: &Path, node: SpecMemoryNode) {
        self.nodes.borrow_mut().insert(path.to_path_buf(), node);
    }

    pub fn add_directory<P: AsRef<Path>>(&self, path: P) {
        self.insert(path.as_ref(), SpecMemoryNode::new(EnumNodeType::Directory));
    }

    pub fn add_file<P: AsRef<Path>>(&self, path: P, len_content: u64) {
        let mut node = SpecMemoryNode::new(EnumNodeType::RegularFile);
        node.len_content = len_content;
        self.insert(path.as_ref(), node);
    }

    pub fn add_symlink<P: AsRef<Path>, Q: AsRef<Path>>(&self, path: P, target: Q) {
        let mut node = SpecMemoryNode::new(EnumNodeType::SymbolicLink);
        node.link_target = Some(target.as_ref().to_path_buf());
        self.insert(path.as_ref(), node);
    }

    pub fn add_alias<P: AsRef<Path>, Q: AsRef<Path>>(&self, path: P, target: Q) {
        let mut node = SpecMemoryNode::new(EnumNodeType::AliasLink);
        node.link_target = Some(target.as_ref().to_path_buf());
        self.insert(path.as_ref(), node);
    }

    pub fn add_unsupported<P: AsRef<Path>>(&self, path: P) {
        self.insert(path.as_ref(), SpecMemoryNode::new(EnumNodeType::Unsupported));
    }

    /// Replace the stored file attributes of an existing node.
    pub fn set_node_attributes<P: AsRef<Path>>(&self, path: P, attrs: SpecFileAttributes) {
        if let Some(node) = self.nodes.borrow_mut().get_mut(path.as_ref()) {
            node.attrs = attrs;
        }
    }

    /// Replace the stored flags of an existing node.
    pub fn set_node_flags<P: AsRef<Path>>(&self, path: P, flags: SpecResourceAttributes) {
        if let Some(node) = self.nodes.borrow_mut().get_mut(path.as_ref()) {
            node.flags = flags;
        }
    }

    pub fn insert_extended_attribute<P: AsRef<Path>>(&self, path: P, name: &str, value: &[u8]) {
        if let Some(node) = self.nodes.borrow_mut().get_mut(path.as_ref()) {
            node.xattrs.insert(OsString::from(name), value.to_vec());
        }
    }

    /// Make every later `operation` on `path` fail with `kind`.
    pub fn inject_failure<P: AsRef<Path>>(
        &self,
        path: P,
        operation: EnumFsOperation,
        kind: io::ErrorKind,
    ) {
        self.faults
            .borrow_mut()
            .insert((path.as_ref().to_path_buf(), operation), kind);
    }

    pub fn clear_failures(&self) {
        self.faults.borrow_mut().clear();
    }

    pub fn node<P: AsRef<Path>>(&self, path: P) -> Option<SpecMemoryNode> {
        self.nodes.borrow().get(path.as_ref()).cloned()
    }

    /// All stored paths below `root` (exclusive), sorted.
    pub fn paths_under<P: AsRef<Path>>(&self, root: P) -> Vec<PathBuf> {
        let root = root.as_ref();
        self.nodes
            .borrow()
            .keys()
            .filter(|p| p.starts_with(root) && p.as_path() != root)
            .cloned()
            .collect()
    }

    /// Number of successful or failed calls of `operation` so far.
    pub fn count_operations(&self, operation: EnumFsOperation) -> usize {
        self.log_ops
            .borrow()
            .iter()
            .filter(|(op, _)| *op == operation)
            .count()
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Internals

impl MemoryBackend {
    fn enter(&self, path: &Path, operation: EnumFsOperation) -> io::Result<()> {
        self.log_ops
            .borrow_mut()
            .push((operation, path.to_path_buf()));
        match self.faults.borrow().get(&(path.to_path_buf(), operation)) {
            Some(kind) => Err(io::Error::new(
                *kind,
                format!("injected {operation:?} fault at {}", path.display()),
            )),
            None => Ok(()),
        }
    }

    fn require_node(&self, path: &Path) -> io::Result<SpecMemoryNode> {
        self.node(path).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("No such file or directory: {}", path.display()),
            )
        })
    }

    fn require_vacant_with_parent(&self, path: &Path) -> io::Result<()> {
        if self.nodes.borrow().contains_key(path) {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("File exists: {}", path.display()),
            ));
        }
        let path_parent = path.parent().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "path has no parent")
        })?;
        match self.nodes.borrow().get(path_parent) {
            Some(node) if node.node_type == EnumNodeType::Directory => {
                if node.is_immutable() {
                    return Err(io::Error::new(
                        io::ErrorKind::PermissionDenied,
                        format!("Operation not permitted: {}", path_parent.display()),
                    ));
                }
                Ok(())
            }
            Some(_) => Err(io::Error::new(
                io::ErrorKind::NotADirectory,
                format!("Not a directory: {}", path_parent.display()),
            )),
            None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("No such file or directory: {}", path_parent.display()),
            )),
        }
    }

    fn update_node<F>(&self, path: &Path, apply: F) -> io::Result<()>
    where
        F: FnOnce(&mut SpecMemoryNode),
    {
        let mut nodes = self.nodes.borrow_mut();
        let node = nodes.get_mut(path).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("No such file or directory: {}", path.display()),
            )
        })?;
        if node.is_immutable() {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("Operation not permitted: {}", path.display()),
            ));
        }
        apply(node);
        Ok(())
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region FsBackendImpl

impl FsBackend for MemoryBackend {
    fn query_node_type(&self, path: &Path) -> io::Result<Option<EnumNodeType>> {
        self.enter(path, EnumFsOperation::QueryNodeType)?;
        Ok(self.nodes.borrow().get(path).map(|n| n.node_type))
    }

    fn read_snapshot(&self, path: &Path) -> io::Result<SpecMetadataSnapshot> {
        self.enter(path, EnumFsOperation::ReadSnapshot)?;
        let node = self.require_node(path)?;
        Ok(SpecMetadataSnapshot {
            node_type: node.node_type,
            if_may_have_extended_attributes: !node.xattrs.is_empty(),
            time_created: node.attrs.time_created,
            time_modified: node.attrs.time_modified,
            mode_posix: node.attrs.mode_posix,
            id_owner: node.attrs.id_owner,
            name_owner: node.attrs.name_owner.clone(),
            id_group: node.attrs.id_group,
            name_group: node.attrs.name_group.clone(),
            flag_hidden: node.flags.flag_hidden,
            flag_immutable: node.flags.flag_immutable,
            code_hfs_creator: node.attrs.code_hfs_creator,
            code_hfs_type: node.attrs.code_hfs_type,
        })
    }

    fn list_directory(&self, path: &Path) -> io::Result<Vec<OsString>> {
        self.enter(path, EnumFsOperation::ListDirectory)?;
        let node = self.require_node(path)?;
        if node.node_type != EnumNodeType::Directory {
            return Err(io::Error::new(
                io::ErrorKind::NotADirectory,
                format!("Not a directory: {}", path.display()),
            ));
        }
        Ok(self
            .nodes
            .borrow()
            .keys()
            .filter(|p| p.parent() == Some(path))
            .filter_map(|p| p.file_name().map(|v| v.to_os_string()))
            .collect())
    }

    fn create_directory(&self, path: &Path, attrs: &SpecFileAttributes) -> io::Result<()> {
        self.enter(path, EnumFsOperation::CreateDirectory)?;
        self.require_vacant_with_parent(path)?;
        let mut node = SpecMemoryNode::new(EnumNodeType::Directory);
        node.attrs = attrs.clone();
        self.insert(path, node);
        Ok(())
    }

    fn create_empty_file(&self, path: &Path, attrs: &SpecFileAttributes) -> io::Result<()> {
        self.enter(path, EnumFsOperation::CreateEmptyFile)?;
        self.require_vacant_with_parent(path)?;
        let mut node = SpecMemoryNode::new(EnumNodeType::RegularFile);
        node.attrs = attrs.clone();
        self.insert(path, node);
        Ok(())
    }

    fn copy_link(&self, path_src: &Path, path_dst: &Path) -> io::Result<()> {
        self.enter(path_dst, EnumFsOperation::CopyLink)?;
        let node_src = self.require_node(path_src)?;
        if !node_src.node_type.is_link() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("Not a link: {}", path_src.display()),
            ));
        }
        self.require_vacant_with_parent(path_dst)?;
        let mut node = SpecMemoryNode::new(node_src.node_type);
        node.link_target = node_src.link_target;
        self.insert(path_dst, node);
        Ok(())
    }

    fn set_file_attributes(&self, path: &Path, attrs: &SpecFileAttributes) -> io::Result<()> {
        self.enter(path, EnumFsOperation::SetFileAttributes)?;
        self.update_node(path, |node| node.attrs.merge_from(attrs))
    }

    fn set_resource_attributes(
        &self,
        path: &Path,
        attrs: &SpecResourceAttributes,
    ) -> io::Result<()> {
        self.enter(path, EnumFsOperation::SetResourceAttributes)?;
        let mut nodes = self.nodes.borrow_mut();
        let node = nodes.get_mut(path).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("No such file or directory: {}", path.display()),
            )
        })?;
        if let Some(b_hidden) = attrs.flag_hidden {
            node.flags.flag_hidden = Some(b_hidden);
        }
        if let Some(b_immutable) = attrs.flag_immutable {
            node.flags.flag_immutable = Some(b_immutable);
        }
        Ok(())
    }

    fn list_extended_attributes(&self, path: &Path) -> Result<Vec<OsString>, AttributeIoError> {
        let to_err = |e| AttributeIoError::from_io(EnumXattrOperation::List, path, None, e);
        self.enter(path, EnumFsOperation::ListExtendedAttributes)
            .map_err(to_err)?;
        let node = self.require_node(path).map_err(to_err)?;
        Ok(node.xattrs.keys().cloned().collect())
    }

    fn read_extended_attribute(
        &self,
        path: &Path,
        name: &OsStr,
    ) -> Result<Vec<u8>, AttributeIoError> {
        let to_err = |e| AttributeIoError::from_io(EnumXattrOperation::Read, path, Some(name), e);
        self.enter(path, EnumFsOperation::ReadExtendedAttribute)
            .map_err(to_err)?;
        let node = self.require_node(path).map_err(to_err)?;
        node.xattrs
            .get(name)
            .cloned()
            .ok_or_else(|| to_err(io::Error::new(io::ErrorKind::NotFound, "attribute not found")))
    }

    fn write_extended_attribute(
        &self,
        path: &Path,
        name: &OsStr,
        value: &[u8],
    ) -> Result<(), AttributeIoError> {
        let to_err = |e| AttributeIoError::from_io(EnumXattrOperation::Write, path, Some(name), e);
        self.enter(path, EnumFsOperation::WriteExtendedAttribute)
            .map_err(to_err)?;
        self.update_node(path, |node| {
            node.xattrs.insert(name.to_os_string(), value.to_vec());
        })
        .map_err(to_err)
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use std::io;
    use std::path::Path;

    use super::{EnumFsOperation, MemoryBackend};
    use crate::backend::FsBackend;
    use crate::snapshot::SpecFileAttributes;
    use crate::spec::EnumNodeType;

    #[test]
    fn create_reports_already_exists_and_missing_parent() {
        let backend = MemoryBackend::new();
        backend.add_directory("/root");
        let attrs = SpecFileAttributes::default();

        backend
            .create_directory(Path::new("/root/a"), &attrs)
            .expect("create a");
        let err = backend
            .create_directory(Path::new("/root/a"), &attrs)
            .expect_err("exists");
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);

        let err = backend
            .create_empty_file(Path::new("/root/missing/f"), &attrs)
            .expect_err("no parent");
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn list_directory_returns_direct_children_only() {
        let backend = MemoryBackend::new();
        backend.add_directory("/r");
        backend.add_directory("/r/a");
        backend.add_file("/r/a/f", 1);
        backend.add_file("/r/b", 1);

        let mut l_names = backend.list_directory(Path::new("/r")).expect("list");
        l_names.sort();
        assert_eq!(l_names, vec!["a", "b"]);
    }

    #[test]
    fn injected_fault_fires_for_matching_path_and_operation() {
        let backend = MemoryBackend::new();
        backend.add_directory("/r");
        backend.inject_failure(
            "/r",
            EnumFsOperation::ListDirectory,
            io::ErrorKind::PermissionDenied,
        );

        let err = backend.list_directory(Path::new("/r")).expect_err("fault");
        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
        assert_eq!(
            backend.query_node_type(Path::new("/r")).expect("query"),
            Some(EnumNodeType::Directory)
        );
        assert_eq!(backend.count_operations(EnumFsOperation::ListDirectory), 1);

        backend.clear_failures();
        assert!(backend.list_directory(Path::new("/r")).is_ok());
    }

    #[test]
    fn copy_link_preserves_target_and_kind() {
        let backend = MemoryBackend::new();
        backend.add_directory("/s");
        backend.add_directory("/d");
        backend.add_alias("/s/al", "/somewhere");

        backend
            .copy_link(Path::new("/s/al"), Path::new("/d/al"))
            .expect("copy link");
        let node = backend.node("/d/al").expect("node");
        assert_eq!(node.node_type, EnumNodeType::AliasLink);
        assert_eq!(node.link_target.as_deref(), Some(Path::new("/somewhere")));
    }
}
