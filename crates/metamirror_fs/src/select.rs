//! Attribute selection: maps a [`SpecMirrorConfig`] to the concrete keys to transfer.
//!
//! Keys are split by the store they live in. File-attribute keys (dates, permissions,
//! ownership, HFS codes) and resource keys (hidden/immutable flags) have separate
//! read/write paths on most platforms, so the mirror builder applies the two sets
//! independently. Extended attributes are not keys here; they are gated by
//! [`SpecAttributeSelection::if_transfer_extended_attributes`], except the Finder
//! info blob, which stores the HFS codes and follows their key.

use std::collections::BTreeSet;
use std::ffi::OsStr;

use crate::snapshot::{SpecFileAttributes, SpecMetadataSnapshot, SpecResourceAttributes};
use crate::spec::SpecMirrorConfig;

/// Extended attribute holding the HFS type (bytes 0..4) and creator (bytes 4..8).
pub const C_XATTR_FINDER_INFO: &str = "com.apple.FinderInfo";

/// Key in the generic file-attribute store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EnumFileAttributeKey {
    CreationDate,
    ModificationDate,
    PosixPermissions,
    OwnerAccountId,
    OwnerAccountName,
    GroupOwnerAccountId,
    GroupOwnerAccountName,
    HfsCreatorCode,
    HfsTypeCode,
}

/// Key in the resource-property store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EnumResourceAttributeKey {
    IsHidden,
    IsImmutable,
}

const L_KEYS_DATES: [EnumFileAttributeKey; 2] = [
    EnumFileAttributeKey::CreationDate,
    EnumFileAttributeKey::ModificationDate,
];
const L_KEYS_PERMISSIONS: [EnumFileAttributeKey; 5] = [
    EnumFileAttributeKey::PosixPermissions,
    EnumFileAttributeKey::OwnerAccountId,
    EnumFileAttributeKey::OwnerAccountName,
    EnumFileAttributeKey::GroupOwnerAccountId,
    EnumFileAttributeKey::GroupOwnerAccountName,
];
const L_KEYS_HFS_CODES: [EnumFileAttributeKey; 2] = [
    EnumFileAttributeKey::HfsCreatorCode,
    EnumFileAttributeKey::HfsTypeCode,
];
const L_KEYS_FLAGS: [EnumResourceAttributeKey; 2] = [
    EnumResourceAttributeKey::IsHidden,
    EnumResourceAttributeKey::IsImmutable,
];

/// Disjoint key sets to read from a source snapshot and write to a mirror.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpecAttributeSelection {
    pub keys_file: BTreeSet<EnumFileAttributeKey>,
    pub keys_resource: BTreeSet<EnumResourceAttributeKey>,
    pub if_transfer_extended_attributes: bool,
}

/// Compute the attribute selection for one configuration. Pure.
pub fn select_attributes(config: &SpecMirrorConfig) -> SpecAttributeSelection {
    let mut keys_file = BTreeSet::new();
    let mut keys_resource = BTreeSet::new();

    if config.if_copy_dates {
        keys_file.extend(L_KEYS_DATES);
    }
    if config.if_copy_permissions {
        keys_file.extend(L_KEYS_PERMISSIONS);
    }
    if config.if_copy_hfs_codes {
        keys_file.extend(L_KEYS_HFS_CODES);
    }
    if config.if_copy_flags {
        keys_resource.extend(L_KEYS_FLAGS);
    }

    SpecAttributeSelection {
        keys_file,
        keys_resource,
        if_transfer_extended_attributes: config.if_copy_extended_attributes,
    }
}

impl SpecAttributeSelection {
    /// Whether the extended attribute `name` may be transferred.
    pub fn is_extended_attribute_selected(&self, name: &OsStr) -> bool {
        if !self.if_transfer_extended_attributes {
            return false;
        }
        name != OsStr::new(C_XATTR_FINDER_INFO)
            || self.keys_file.contains(&EnumFileAttributeKey::HfsTypeCode)
            || self.keys_file.contains(&EnumFileAttributeKey::HfsCreatorCode)
    }

    /// File-attribute payload: selected keys that the snapshot actually carries.
    pub fn build_file_payload(&self, snapshot: &SpecMetadataSnapshot) -> SpecFileAttributes {
        let has = |key: EnumFileAttributeKey| self.keys_file.contains(&key);
        SpecFileAttributes {
            time_created: snapshot
                .time_created
                .filter(|_| has(EnumFileAttributeKey::CreationDate)),
            time_modified: snapshot
                .time_modified
                .filter(|_| has(EnumFileAttributeKey::ModificationDate)),
            mode_posix: snapshot
                .mode_posix
                .filter(|_| has(EnumFileAttributeKey::PosixPermissions)),
            id_owner: snapshot
                .id_owner
                .filter(|_| has(EnumFileAttributeKey::OwnerAccountId)),
            name_owner: snapshot
                .name_owner
                .clone()
                .filter(|_| has(EnumFileAttributeKey::OwnerAccountName)),
            id_group: snapshot
                .id_group
                .filter(|_| has(EnumFileAttributeKey::GroupOwnerAccountId)),
            name_group: snapshot
                .name_group
                .clone()
                .filter(|_| has(EnumFileAttributeKey::GroupOwnerAccountName)),
            code_hfs_creator: snapshot
                .code_hfs_creator
                .filter(|_| has(EnumFileAttributeKey::HfsCreatorCode)),
            code_hfs_type: snapshot
                .code_hfs_type
                .filter(|_| has(EnumFileAttributeKey::HfsTypeCode)),
        }
    }

    /// Resource payload: selected flags that the snapshot actually carries.
    pub fn build_resource_payload(&self, snapshot: &SpecMetadataSnapshot) -> SpecResourceAttributes {
        let has = |key: EnumResourceAttributeKey| self.keys_resource.contains(&key);
        SpecResourceAttributes {
            flag_hidden: snapshot
                .flag_hidden
                .filter(|_| has(EnumResourceAttributeKey::IsHidden)),
            flag_immutable: snapshot
                .flag_immutable
                .filter(|_| has(EnumResourceAttributeKey::IsImmutable)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::ffi::OsStr;
    use std::time::{Duration, UNIX_EPOCH};

    use super::{
        C_XATTR_FINDER_INFO, EnumFileAttributeKey, EnumResourceAttributeKey, select_attributes,
    };
    use crate::snapshot::SpecMetadataSnapshot;
    use crate::spec::{EnumNodeType, SpecMirrorConfig};

    fn derive_config(n_bits: u8) -> SpecMirrorConfig {
        SpecMirrorConfig {
            if_copy_dates: n_bits & 1 != 0,
            if_copy_permissions: n_bits & 2 != 0,
            if_copy_extended_attributes: n_bits & 4 != 0,
            if_copy_flags: n_bits & 8 != 0,
            if_copy_hfs_codes: n_bits & 16 != 0,
        }
    }

    fn derive_full_snapshot() -> SpecMetadataSnapshot {
        SpecMetadataSnapshot {
            if_may_have_extended_attributes: true,
            time_created: Some(UNIX_EPOCH + Duration::from_secs(1_600_000_000)),
            time_modified: Some(UNIX_EPOCH + Duration::from_secs(1_700_000_000)),
            mode_posix: Some(0o640),
            id_owner: Some(501),
            name_owner: Some("owner".to_string()),
            id_group: Some(20),
            name_group: Some("staff".to_string()),
            flag_hidden: Some(true),
            flag_immutable: Some(false),
            code_hfs_creator: Some(*b"ttxt"),
            code_hfs_type: Some(*b"TEXT"),
            ..SpecMetadataSnapshot::of_type(EnumNodeType::RegularFile)
        }
    }

    #[test]
    fn selection_matches_enabled_categories_for_every_config() {
        let snapshot = derive_full_snapshot();
        for n_bits in 0_u8..32 {
            let config = derive_config(n_bits);
            let selection = select_attributes(&config);

            assert_eq!(
                selection.keys_file.contains(&EnumFileAttributeKey::ModificationDate),
                config.if_copy_dates
            );
            assert_eq!(
                selection.keys_file.contains(&EnumFileAttributeKey::OwnerAccountName),
                config.if_copy_permissions
            );
            assert_eq!(
                selection.keys_file.contains(&EnumFileAttributeKey::HfsTypeCode),
                config.if_copy_hfs_codes
            );
            assert_eq!(
                selection.keys_resource.contains(&EnumResourceAttributeKey::IsHidden),
                config.if_copy_flags
            );
            assert_eq!(
                selection.if_transfer_extended_attributes,
                config.if_copy_extended_attributes
            );

            let attrs = selection.build_file_payload(&snapshot);
            assert_eq!(attrs.time_created.is_some(), config.if_copy_dates);
            assert_eq!(attrs.time_modified.is_some(), config.if_copy_dates);
            assert_eq!(attrs.mode_posix.is_some(), config.if_copy_permissions);
            assert_eq!(attrs.id_owner.is_some(), config.if_copy_permissions);
            assert_eq!(attrs.name_group.is_some(), config.if_copy_permissions);
            assert_eq!(attrs.code_hfs_creator.is_some(), config.if_copy_hfs_codes);
            assert_eq!(attrs.code_hfs_type.is_some(), config.if_copy_hfs_codes);

            let flags = selection.build_resource_payload(&snapshot);
            assert_eq!(flags.flag_hidden.is_some(), config.if_copy_flags);
            assert_eq!(flags.flag_immutable.is_some(), config.if_copy_flags);

            assert_eq!(select_attributes(&config), selection);
        }
    }

    #[test]
    fn finder_info_follows_hfs_codes_switch() {
        let name_finder = OsStr::new(C_XATTR_FINDER_INFO);
        let name_user = OsStr::new("user.tag");

        let selection = select_attributes(&SpecMirrorConfig::all());
        assert!(selection.is_extended_attribute_selected(name_finder));
        assert!(selection.is_extended_attribute_selected(name_user));

        let selection = select_attributes(&SpecMirrorConfig {
            if_copy_hfs_codes: false,
            ..SpecMirrorConfig::all()
        });
        assert!(!selection.is_extended_attribute_selected(name_finder));
        assert!(selection.is_extended_attribute_selected(name_user));

        let selection = select_attributes(&SpecMirrorConfig {
            if_copy_extended_attributes: false,
            ..SpecMirrorConfig::all()
        });
        assert!(!selection.is_extended_attribute_selected(name_user));
    }

    #[test]
    fn absent_snapshot_fields_are_never_selected() {
        let selection = select_attributes(&SpecMirrorConfig::all());
        let snapshot = SpecMetadataSnapshot::of_type(EnumNodeType::Directory);

        assert!(selection.build_file_payload(&snapshot).is_empty());
        assert!(selection.build_resource_payload(&snapshot).is_empty());
    }
}
