//! Extended-attribute transfer.
//!
//! `list`/`read`/`write` are the platform primitives used by
//! [`OsBackend`](crate::backend::OsBackend); they never follow a final symlink.
//! [`transfer_extended_attributes`] is the per-entry copy step used by the mirror
//! builder and works against any [`FsBackend`].

use std::ffi::{OsStr, OsString};
use std::io;
use std::path::Path;

use crate::backend::FsBackend;
use crate::spec::{AttributeIoError, EnumXattrOperation};

////////////////////////////////////////////////////////////////////////////////
// #region PlatformPrimitives

/// Whether an attribute name may be copied with the current privileges.
///
/// Unprivileged processes only see `user.*`; root skips `system.*` (ACL storage).
#[cfg(target_os = "linux")]
fn is_xattr_permitted(name: &OsStr) -> bool {
    use std::os::unix::ffi::OsStrExt;
    use std::sync::OnceLock;

    static B_IS_ROOT: OnceLock<bool> = OnceLock::new();
    let b_is_root = *B_IS_ROOT.get_or_init(|| nix::unistd::geteuid().is_root());

    let raw_name = name.as_bytes();
    if b_is_root {
        !raw_name.starts_with(b"system.")
    } else {
        raw_name.starts_with(b"user.")
    }
}

#[cfg(not(target_os = "linux"))]
fn is_xattr_permitted(_name: &OsStr) -> bool {
    true
}

/// List attribute names of `path`.
///
/// A filesystem without attribute support lists nothing.
pub fn list(path: &Path) -> Result<Vec<OsString>, AttributeIoError> {
    let iter_names = match xattr::list(path) {
        Ok(v) => v,
        Err(e) if e.kind() == io::ErrorKind::Unsupported => return Ok(Vec::new()),
        Err(e) => return Err(AttributeIoError::from_io(EnumXattrOperation::List, path, None, e)),
    };
    Ok(iter_names.filter(|name| is_xattr_permitted(name)).collect())
}

/// Read one attribute value.
///
/// The underlying call queries the value size, allocates exactly that and fetches.
/// An attribute that vanished between listing and reading is an error.
pub fn read(path: &Path, name: &OsStr) -> Result<Vec<u8>, AttributeIoError> {
    match xattr::get(path, name) {
        Ok(Some(raw_value)) => Ok(raw_value),
        Ok(None) => Err(AttributeIoError::from_io(
            EnumXattrOperation::Read,
            path,
            Some(name),
            io::Error::new(io::ErrorKind::NotFound, "attribute not found"),
        )),
        Err(e) => Err(AttributeIoError::from_io(
            EnumXattrOperation::Read,
            path,
            Some(name),
            e,
        )),
    }
}

/// Write one attribute value, replacing any previous value under the same name.
pub fn write(path: &Path, name: &OsStr, value: &[u8]) -> Result<(), AttributeIoError> {
    xattr::set(path, name, value)
        .map_err(|e| AttributeIoError::from_io(EnumXattrOperation::Write, path, Some(name), e))
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Transfer

/// Copy the extended attributes of `path_src` accepted by `is_selected` onto `path_dst`.
///
/// The first failing name stops the transfer; later names are not attempted.
/// Returns the number of attributes written.
pub fn transfer_extended_attributes<B, F>(
    backend: &B,
    path_src: &Path,
    path_dst: &Path,
    is_selected: F,
) -> Result<usize, AttributeIoError>
where
    B: FsBackend + ?Sized,
    F: Fn(&OsStr) -> bool,
{
    let l_names = backend.list_extended_attributes(path_src)?;
    let mut cnt_written = 0;
    for name in l_names.iter().filter(|name| is_selected(name)) {
        let raw_value = backend.read_extended_attribute(path_src, name)?;
        backend.write_extended_attribute(path_dst, name, &raw_value)?;
        cnt_written += 1;
    }
    if cnt_written > 0 {
        tracing::trace!(
            src = %path_src.display(),
            dst = %path_dst.display(),
            n = cnt_written,
            "extended attributes copied"
        );
    }
    Ok(cnt_written)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use std::ffi::{OsStr, OsString};
    use std::fs;
    use std::io;
    use std::path::Path;

    use tempfile::tempdir;

    use super::{list, read, transfer_extended_attributes, write};
    use crate::backend::{EnumFsOperation, MemoryBackend};
    use crate::select::{C_XATTR_FINDER_INFO, select_attributes};
    use crate::spec::{EnumXattrOperation, SpecMirrorConfig};

    fn xattrs_supported(path: &Path) -> bool {
        let name = OsStr::new("user.metamirror_check");
        match xattr::set(path, name, b"check") {
            Ok(()) => {
                let _ = xattr::remove(path, name);
                true
            }
            Err(_) => false,
        }
    }

    #[test]
    fn write_then_read_returns_identical_bytes() {
        let tmp = tempdir().expect("tempdir");
        let path_file = tmp.path().join("f.txt");
        fs::write(&path_file, b"").expect("write file");
        if !xattrs_supported(&path_file) {
            eprintln!("xattrs not supported, skipping test");
            return;
        }

        let name = OsStr::new("user.metamirror_roundtrip");
        let raw_value = [0_u8, 1, 2, 255, b'x'];
        write(&path_file, name, &raw_value).expect("write xattr");

        assert_eq!(read(&path_file, name).expect("read xattr"), raw_value);
        assert!(
            list(&path_file)
                .expect("list xattrs")
                .contains(&OsString::from("user.metamirror_roundtrip"))
        );
    }

    #[test]
    fn read_of_missing_attribute_fails() {
        let tmp = tempdir().expect("tempdir");
        let path_file = tmp.path().join("f.txt");
        fs::write(&path_file, b"").expect("write file");
        if !xattrs_supported(&path_file) {
            eprintln!("xattrs not supported, skipping test");
            return;
        }

        let err = read(&path_file, OsStr::new("user.metamirror_absent")).expect_err("must fail");
        assert_eq!(err.operation, EnumXattrOperation::Read);
    }

    #[test]
    fn list_on_missing_path_reports_os_code() {
        let tmp = tempdir().expect("tempdir");
        let err = list(&tmp.path().join("missing")).expect_err("must fail");
        if !xattr::SUPPORTED_PLATFORM {
            return;
        }
        assert_eq!(err.operation, EnumXattrOperation::List);
        assert!(err.code.is_some());
    }

    #[test]
    fn transfer_copies_all_names_between_files() {
        let tmp = tempdir().expect("tempdir");
        let path_src = tmp.path().join("src.txt");
        let path_dst = tmp.path().join("dst.txt");
        fs::write(&path_src, b"payload").expect("write src");
        fs::write(&path_dst, b"").expect("write dst");
        if !xattrs_supported(&path_src) {
            eprintln!("xattrs not supported, skipping test");
            return;
        }
        write(&path_src, OsStr::new("user.a"), b"1").expect("xattr a");
        write(&path_src, OsStr::new("user.b"), b"22").expect("xattr b");

        let backend = crate::backend::OsBackend::new();
        let n_copied =
            transfer_extended_attributes(&backend, &path_src, &path_dst, |_| true).expect("transfer");

        assert_eq!(n_copied, 2);
        assert_eq!(read(&path_dst, OsStr::new("user.a")).expect("a"), b"1");
        assert_eq!(read(&path_dst, OsStr::new("user.b")).expect("b"), b"22");
    }

    #[test]
    fn transfer_stops_at_first_failing_name() {
        let backend = MemoryBackend::new();
        backend.add_directory("/src");
        backend.add_directory("/dst");
        backend.add_file("/src/f", 3);
        backend.add_file("/dst/f", 0);
        backend.insert_extended_attribute("/src/f", "user.a", b"1");
        backend.insert_extended_attribute("/src/f", "user.b", b"2");
        backend.inject_failure(
            "/dst/f",
            EnumFsOperation::WriteExtendedAttribute,
            io::ErrorKind::Unsupported,
        );

        let err = transfer_extended_attributes(
            &backend,
            Path::new("/src/f"),
            Path::new("/dst/f"),
            |_| true,
        )
        .expect_err("write must fail");

        assert_eq!(err.operation, EnumXattrOperation::Write);
        assert_eq!(err.name, Some(OsString::from("user.a")));
        let node_dst = backend.node("/dst/f").expect("dst node");
        assert!(node_dst.xattrs.is_empty());
    }

    #[test]
    fn finder_info_is_left_behind_without_hfs_codes() {
        let backend = MemoryBackend::new();
        backend.add_directory("/src");
        backend.add_directory("/dst");
        backend.add_file("/src/f", 3);
        backend.add_file("/dst/f", 0);
        backend.insert_extended_attribute("/src/f", "user.a", b"1");
        backend.insert_extended_attribute("/src/f", C_XATTR_FINDER_INFO, b"TEXTttxt");
        let selection = select_attributes(&SpecMirrorConfig {
            if_copy_hfs_codes: false,
            ..SpecMirrorConfig::all()
        });

        let n_copied = transfer_extended_attributes(
            &backend,
            Path::new("/src/f"),
            Path::new("/dst/f"),
            |name| selection.is_extended_attribute_selected(name),
        )
        .expect("transfer");

        assert_eq!(n_copied, 1);
        let node_dst = backend.node("/dst/f").expect("dst node");
        assert_eq!(
            node_dst.xattrs.keys().collect::<Vec<_>>(),
            vec![&OsString::from("user.a")]
        );
    }
}
