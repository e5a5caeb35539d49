//! Real-filesystem [`FsBackend`].

use std::ffi::{OsStr, OsString};
use std::fs;
use std::io;
use std::path::Path;
use std::time::SystemTime;

use filetime::FileTime;

use super::FsBackend;
use crate::snapshot::{SpecFileAttributes, SpecMetadataSnapshot, SpecResourceAttributes};
use crate::spec::{AttributeIoError, EnumNodeType};
use crate::xattrs;

/// Backend over `std::fs` plus the platform attribute calls.
///
/// Creation time is written on macOS and Windows only; elsewhere it is read but skipped.
/// Alias links are never reported; macOS Finder aliases show up as regular files.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsBackend;

impl OsBackend {
    pub fn new() -> Self {
        Self
    }
}

fn derive_node_type(file_type: fs::FileType) -> EnumNodeType {
    if file_type.is_symlink() {
        EnumNodeType::SymbolicLink
    } else if file_type.is_dir() {
        EnumNodeType::Directory
    } else if file_type.is_file() {
        EnumNodeType::RegularFile
    } else {
        EnumNodeType::Unsupported
    }
}

////////////////////////////////////////////////////////////////////////////////
// #region Ownership

#[cfg(unix)]
fn read_owner_names(id_owner: u32, id_group: u32) -> (Option<String>, Option<String>) {
    use nix::unistd::{Gid, Group, Uid, User};

    let name_owner = User::from_uid(Uid::from_raw(id_owner))
        .ok()
        .flatten()
        .map(|u| u.name);
    let name_group = Group::from_gid(Gid::from_raw(id_group))
        .ok()
        .flatten()
        .map(|g| g.name);
    (name_owner, name_group)
}

/// Change owner and group. A numeric id wins over a name; unknown names are ignored.
#[cfg(unix)]
fn apply_ownership(path: &Path, attrs: &SpecFileAttributes) -> io::Result<()> {
    use nix::unistd::{Gid, Group, Uid, User};

    let id_owner = match (attrs.id_owner, attrs.name_owner.as_deref()) {
        (Some(id), _) => Some(Uid::from_raw(id)),
        (None, Some(name)) => User::from_name(name).map_err(io::Error::from)?.map(|u| u.uid),
        (None, None) => None,
    };
    let id_group = match (attrs.id_group, attrs.name_group.as_deref()) {
        (Some(id), _) => Some(Gid::from_raw(id)),
        (None, Some(name)) => Group::from_name(name).map_err(io::Error::from)?.map(|g| g.gid),
        (None, None) => None,
    };
    if id_owner.is_none() && id_group.is_none() {
        return Ok(());
    }
    nix::unistd::chown(path, id_owner, id_group).map_err(io::Error::from)
}

#[cfg(not(unix))]
fn apply_ownership(_path: &Path, _attrs: &SpecFileAttributes) -> io::Result<()> {
    Ok(())
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Dates

#[cfg(target_os = "macos")]
fn apply_time_created(path: &Path, time_created: SystemTime) -> io::Result<()> {
    use std::os::macos::fs::FileTimesExt;

    let file = fs::File::open(path)?;
    file.set_times(fs::FileTimes::new().set_created(time_created))
}

#[cfg(windows)]
fn apply_time_created(path: &Path, time_created: SystemTime) -> io::Result<()> {
    use std::os::windows::fs::{FileTimesExt, OpenOptionsExt};

    const FILE_WRITE_ATTRIBUTES: u32 = 0x0100;
    const FILE_FLAG_BACKUP_SEMANTICS: u32 = 0x0200_0000;

    let file = fs::OpenOptions::new()
        .access_mode(FILE_WRITE_ATTRIBUTES)
        .custom_flags(FILE_FLAG_BACKUP_SEMANTICS)
        .open(path)?;
    file.set_times(fs::FileTimes::new().set_created(time_created))
}

#[cfg(not(any(target_os = "macos", windows)))]
fn apply_time_created(_path: &Path, _time_created: SystemTime) -> io::Result<()> {
    Ok(())
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Flags

#[cfg(target_os = "linux")]
fn read_flags(path: &Path, node_type: EnumNodeType) -> (Option<bool>, Option<bool>) {
    use rustix::fs::IFlags;

    if !matches!(node_type, EnumNodeType::RegularFile | EnumNodeType::Directory) {
        return (None, None);
    }
    let flag_immutable = fs::File::open(path)
        .ok()
        .and_then(|file| rustix::fs::ioctl_getflags(&file).ok())
        .map(|flags| flags.contains(IFlags::IMMUTABLE));
    (None, flag_immutable)
}

/// Only the immutable bit exists on Linux; it is written only when it changes.
#[cfg(target_os = "linux")]
fn apply_flags(path: &Path, attrs: &SpecResourceAttributes) -> io::Result<()> {
    use rustix::fs::IFlags;

    let Some(b_immutable) = attrs.flag_immutable else {
        return Ok(());
    };
    let file = match fs::File::open(path) {
        Ok(v) => v,
        Err(_) if !b_immutable => return Ok(()),
        Err(e) => return Err(e),
    };
    let flags_current = match rustix::fs::ioctl_getflags(&file) {
        Ok(v) => v,
        Err(_) if !b_immutable => return Ok(()),
        Err(e) => return Err(e.into()),
    };
    if flags_current.contains(IFlags::IMMUTABLE) == b_immutable {
        return Ok(());
    }
    let mut flags_new = flags_current;
    flags_new.set(IFlags::IMMUTABLE, b_immutable);
    rustix::fs::ioctl_setflags(&file, flags_new).map_err(io::Error::from)
}

#[cfg(target_os = "macos")]
fn read_flags(path: &Path, node_type: EnumNodeType) -> (Option<bool>, Option<bool>) {
    use nix::sys::stat::FileFlag;
    use std::os::macos::fs::MetadataExt;

    if node_type == EnumNodeType::SymbolicLink {
        return (None, None);
    }
    match fs::symlink_metadata(path) {
        Ok(meta) => {
            let flags = FileFlag::from_bits_truncate(meta.st_flags() as _);
            (
                Some(flags.contains(FileFlag::UF_HIDDEN)),
                Some(flags.contains(FileFlag::UF_IMMUTABLE)),
            )
        }
        Err(_) => (None, None),
    }
}

#[cfg(target_os = "macos")]
fn apply_flags(path: &Path, attrs: &SpecResourceAttributes) -> io::Result<()> {
    use nix::sys::stat::FileFlag;
    use std::os::macos::fs::MetadataExt;

    if attrs.is_empty() {
        return Ok(());
    }
    let meta = fs::symlink_metadata(path)?;
    let mut flags = FileFlag::from_bits_truncate(meta.st_flags() as _);
    if let Some(b_hidden) = attrs.flag_hidden {
        flags.set(FileFlag::UF_HIDDEN, b_hidden);
    }
    if let Some(b_immutable) = attrs.flag_immutable {
        flags.set(FileFlag::UF_IMMUTABLE, b_immutable);
    }
    nix::unistd::chflags(path, flags).map_err(io::Error::from)
}

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
fn read_flags(_path: &Path, _node_type: EnumNodeType) -> (Option<bool>, Option<bool>) {
    (None, None)
}

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
fn apply_flags(_path: &Path, _attrs: &SpecResourceAttributes) -> io::Result<()> {
    Ok(())
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region HfsCodes

#[cfg(target_os = "macos")]
use crate::select::C_XATTR_FINDER_INFO as C_FINDER_INFO;
#[cfg(target_os = "macos")]
const N_FINDER_INFO_LEN: usize = 32;

/// Type and creator codes from the Finder info blob (bytes 0..4 and 4..8).
#[cfg(target_os = "macos")]
fn read_hfs_codes(path: &Path) -> (Option<[u8; 4]>, Option<[u8; 4]>) {
    let Ok(Some(raw_info)) = xattr::get(path, C_FINDER_INFO) else {
        return (None, None);
    };
    if raw_info.len() < 8 {
        return (None, None);
    }
    let pick = |raw: &[u8]| -> Option<[u8; 4]> {
        let code: [u8; 4] = raw.try_into().ok()?;
        (code != [0; 4]).then_some(code)
    };
    (pick(&raw_info[4..8]), pick(&raw_info[0..4]))
}

#[cfg(target_os = "macos")]
fn apply_hfs_codes(path: &Path, attrs: &SpecFileAttributes) -> io::Result<()> {
    if attrs.code_hfs_creator.is_none() && attrs.code_hfs_type.is_none() {
        return Ok(());
    }
    let mut raw_info = xattr::get(path, C_FINDER_INFO)?.unwrap_or_default();
    raw_info.resize(raw_info.len().max(N_FINDER_INFO_LEN), 0);
    if let Some(code) = attrs.code_hfs_type {
        raw_info[0..4].copy_from_slice(&code);
    }
    if let Some(code) = attrs.code_hfs_creator {
        raw_info[4..8].copy_from_slice(&code);
    }
    xattr::set(path, C_FINDER_INFO, &raw_info)
}

#[cfg(not(target_os = "macos"))]
fn read_hfs_codes(_path: &Path) -> (Option<[u8; 4]>, Option<[u8; 4]>) {
    (None, None)
}

#[cfg(not(target_os = "macos"))]
fn apply_hfs_codes(_path: &Path, _attrs: &SpecFileAttributes) -> io::Result<()> {
    Ok(())
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region FsBackendImpl

impl FsBackend for OsBackend {
    fn query_node_type(&self, path: &Path) -> io::Result<Option<EnumNodeType>> {
        match fs::symlink_metadata(path) {
            Ok(meta) => Ok(Some(derive_node_type(meta.file_type()))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn read_snapshot(&self, path: &Path) -> io::Result<SpecMetadataSnapshot> {
        let meta = fs::symlink_metadata(path)?;
        let node_type = derive_node_type(meta.file_type());
        let mut snapshot = SpecMetadataSnapshot::of_type(node_type);

        snapshot.if_may_have_extended_attributes =
            xattr::SUPPORTED_PLATFORM && node_type != EnumNodeType::SymbolicLink;
        snapshot.time_created = meta.created().ok();
        snapshot.time_modified = meta.modified().ok();

        #[cfg(unix)]
        {
            use std::os::unix::fs::MetadataExt;

            snapshot.mode_posix = Some(meta.mode() & 0o7777);
            snapshot.id_owner = Some(meta.uid());
            snapshot.id_group = Some(meta.gid());
            let (name_owner, name_group) = read_owner_names(meta.uid(), meta.gid());
            snapshot.name_owner = name_owner;
            snapshot.name_group = name_group;
        }

        let (flag_hidden, flag_immutable) = read_flags(path, node_type);
        snapshot.flag_hidden = flag_hidden;
        snapshot.flag_immutable = flag_immutable;

        if node_type != EnumNodeType::SymbolicLink {
            let (code_hfs_creator, code_hfs_type) = read_hfs_codes(path);
            snapshot.code_hfs_creator = code_hfs_creator;
            snapshot.code_hfs_type = code_hfs_type;
        }
        Ok(snapshot)
    }

    fn list_directory(&self, path: &Path) -> io::Result<Vec<OsString>> {
        let mut l_names = Vec::new();
        for entry in fs::read_dir(path)? {
            l_names.push(entry?.file_name());
        }
        Ok(l_names)
    }

    fn create_directory(&self, path: &Path, attrs: &SpecFileAttributes) -> io::Result<()> {
        fs::create_dir(path)?;
        self.set_file_attributes(path, attrs)
    }

    fn create_empty_file(&self, path: &Path, attrs: &SpecFileAttributes) -> io::Result<()> {
        fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)?;
        self.set_file_attributes(path, attrs)
    }

    fn copy_link(&self, path_src: &Path, path_dst: &Path) -> io::Result<()> {
        let target = fs::read_link(path_src)?;

        #[cfg(unix)]
        {
            return std::os::unix::fs::symlink(&target, path_dst);
        }
        #[cfg(windows)]
        {
            use std::os::windows::fs::{symlink_dir, symlink_file};
            return if path_src.is_dir() {
                symlink_dir(&target, path_dst)
            } else {
                symlink_file(&target, path_dst)
            };
        }
        #[cfg(not(any(unix, windows)))]
        {
            let _ = (target, path_dst);
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "Symbolic links are unsupported on this platform",
            ));
        }
    }

    fn set_file_attributes(&self, path: &Path, attrs: &SpecFileAttributes) -> io::Result<()> {
        apply_ownership(path, attrs)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode_posix) = attrs.mode_posix {
                fs::set_permissions(path, fs::Permissions::from_mode(mode_posix))?;
            }
        }

        apply_hfs_codes(path, attrs)?;

        if let Some(time_created) = attrs.time_created {
            apply_time_created(path, time_created)?;
        }
        // Last, so nothing above bumps the timestamp again.
        if let Some(time_modified) = attrs.time_modified {
            filetime::set_file_mtime(path, FileTime::from_system_time(time_modified))?;
        }
        Ok(())
    }

    fn set_resource_attributes(
        &self,
        path: &Path,
        attrs: &SpecResourceAttributes,
    ) -> io::Result<()> {
        apply_flags(path, attrs)
    }

    fn list_extended_attributes(&self, path: &Path) -> Result<Vec<OsString>, AttributeIoError> {
        xattrs::list(path)
    }

    fn read_extended_attribute(
        &self,
        path: &Path,
        name: &OsStr,
    ) -> Result<Vec<u8>, AttributeIoError> {
        xattrs::read(path, name)
    }

    fn write_extended_attribute(
        &self,
        path: &Path,
        name: &OsStr,
        value: &[u8],
    ) -> Result<(), AttributeIoError> {
        xattrs::write(path, name, value)
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
