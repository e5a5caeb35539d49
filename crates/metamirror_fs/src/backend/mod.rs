//! Filesystem capability used by the mirroring core.
//!
//! The core never touches `std::fs` directly; everything goes through [`FsBackend`],
//! so tests can swap in [`MemoryBackend`] with injected faults.

use std::ffi::{OsStr, OsString};
use std::io;
use std::path::Path;

use crate::snapshot::{SpecFileAttributes, SpecMetadataSnapshot, SpecResourceAttributes};
use crate::spec::{AttributeIoError, EnumNodeType};

mod memory;
mod os;

pub use memory::{EnumFsOperation, MemoryBackend, SpecMemoryNode};
pub use os::OsBackend;

/// Primitive filesystem operations the mirroring core depends on.
///
/// Creation primitives must fail with [`io::ErrorKind::AlreadyExists`] when the
/// destination is already present; the mirror builder relies on that to reconcile.
pub trait FsBackend {
    /// Kind of the entry at `path` without following a final symlink; `None` if absent.
    fn query_node_type(&self, path: &Path) -> io::Result<Option<EnumNodeType>>;

    /// Read one metadata snapshot. Unsupported attributes are `None`.
    fn read_snapshot(&self, path: &Path) -> io::Result<SpecMetadataSnapshot>;

    /// Child names of one directory, in no particular order.
    fn list_directory(&self, path: &Path) -> io::Result<Vec<OsString>>;

    /// Create the last path segment as a directory, then apply `attrs`.
    fn create_directory(&self, path: &Path, attrs: &SpecFileAttributes) -> io::Result<()>;

    /// Create a zero-length regular file, then apply `attrs`.
    fn create_empty_file(&self, path: &Path, attrs: &SpecFileAttributes) -> io::Result<()>;

    /// Reproduce the link at `path_src` (its target reference) at `path_dst`.
    fn copy_link(&self, path_src: &Path, path_dst: &Path) -> io::Result<()>;

    /// Apply the `Some` fields of `attrs` to an existing entry.
    fn set_file_attributes(&self, path: &Path, attrs: &SpecFileAttributes) -> io::Result<()>;

    /// Apply hidden/immutable flags to an existing entry.
    fn set_resource_attributes(
        &self,
        path: &Path,
        attrs: &SpecResourceAttributes,
    ) -> io::Result<()>;

    fn list_extended_attributes(&self, path: &Path) -> Result<Vec<OsString>, AttributeIoError>;

    fn read_extended_attribute(
        &self,
        path: &Path,
        name: &OsStr,
    ) -> Result<Vec<u8>, AttributeIoError>;

    fn write_extended_attribute(
        &self,
        path: &Path,
        name: &OsStr,
        value: &[u8],
    ) -> Result<(), AttributeIoError>;
}

impl<B: FsBackend + ?Sized> FsBackend for &B {
    fn query_node_type(&self, path: &Path) -> io::Result<Option<EnumNodeType>> {
        (**self).query_node_type(path)
    }

    fn read_snapshot(&self, path: &Path) -> io::Result<SpecMetadataSnapshot> {
        (**self).read_snapshot(path)
    }

    fn list_directory(&self, path: &Path) -> io::Result<Vec<OsString>> {
        (**self).list_directory(path)
    }

    fn create_directory(&self, path: &Path, attrs: &SpecFileAttributes) -> io::Result<()> {
        (**self).create_directory(path, attrs)
    }

    fn create_empty_file(&self, path: &Path, attrs: &SpecFileAttributes) -> io::Result<()> {
        (**self).create_empty_file(path, attrs)
    }

    fn copy_link(&self, path_src: &Path, path_dst: &Path) -> io::Result<()> {
        (**self).copy_link(path_src, path_dst)
    }

    fn set_file_attributes(&self, path: &Path, attrs: &SpecFileAttributes) -> io::Result<()> {
        (**self).set_file_attributes(path, attrs)
    }

    fn set_resource_attributes(
        &self,
        path: &Path,
        attrs: &SpecResourceAttributes,
    ) -> io::Result<()> {
        (**self).set_resource_attributes(path, attrs)
    }

    fn list_extended_attributes(&self, path: &Path) -> Result<Vec<OsString>, AttributeIoError> {
        (**self).list_extended_attributes(path)
    }

    fn read_extended_attribute(
        &self,
        path: &Path,
        name: &OsStr,
    ) -> Result<Vec<u8>, AttributeIoError> {
        (**self).read_extended_attribute(path, name)
    }

    fn write_extended_attribute(
        &self,
        path: &Path,
        name: &OsStr,
        value: &[u8],
    ) -> Result<(), AttributeIoError> {
        (**self).write_extended_attribute(path, name, value)
    }
}
