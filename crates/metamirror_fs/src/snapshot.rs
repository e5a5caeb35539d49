//! Per-entry metadata snapshot and the attribute payloads derived from it.

use std::path::PathBuf;
use std::time::SystemTime;

use crate::spec::EnumNodeType;

/// Four-byte legacy HFS type/creator code.
pub type TypeFourCharCode = [u8; 4];

/// Immutable metadata of one source entry, read once during a walk.
///
/// Optional fields are `None` when the platform does not report them; absence is
/// never an error and such fields are simply not applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecMetadataSnapshot {
    pub node_type: EnumNodeType,
    /// Hint that the entry may carry extended attributes (avoids blind probing).
    pub if_may_have_extended_attributes: bool,
    pub time_created: Option<SystemTime>,
    pub time_modified: Option<SystemTime>,
    pub mode_posix: Option<u32>,
    pub id_owner: Option<u32>,
    pub name_owner: Option<String>,
    pub id_group: Option<u32>,
    pub name_group: Option<String>,
    pub flag_hidden: Option<bool>,
    pub flag_immutable: Option<bool>,
    pub code_hfs_creator: Option<TypeFourCharCode>,
    pub code_hfs_type: Option<TypeFourCharCode>,
}

impl SpecMetadataSnapshot {
    /// Snapshot carrying only a node type.
    pub fn of_type(node_type: EnumNodeType) -> Self {
        Self {
            node_type,
            if_may_have_extended_attributes: false,
            time_created: None,
            time_modified: None,
            mode_posix: None,
            id_owner: None,
            name_owner: None,
            id_group: None,
            name_group: None,
            flag_hidden: None,
            flag_immutable: None,
            code_hfs_creator: None,
            code_hfs_type: None,
        }
    }
}

/// One enumerator step: a path relative to the tree root plus its snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecRelativeEntry {
    pub path_rel: PathBuf,
    pub snapshot: SpecMetadataSnapshot,
}

/// Attributes written through the generic "file attributes" store.
///
/// Only `Some` fields are applied; `None` leaves the destination untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpecFileAttributes {
    pub time_created: Option<SystemTime>,
    pub time_modified: Option<SystemTime>,
    pub mode_posix: Option<u32>,
    pub id_owner: Option<u32>,
    pub name_owner: Option<String>,
    pub id_group: Option<u32>,
    pub name_group: Option<String>,
    pub code_hfs_creator: Option<TypeFourCharCode>,
    pub code_hfs_type: Option<TypeFourCharCode>,
}

impl SpecFileAttributes {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Overlay every `Some` field of `other` onto `self`.
    pub fn merge_from(&mut self, other: &Self) {
        fn overlay<T: Clone>(dst: &mut Option<T>, src: &Option<T>) {
            if let Some(v) = src {
                *dst = Some(v.clone());
            }
        }
        overlay(&mut self.time_created, &other.time_created);
        overlay(&mut self.time_modified, &other.time_modified);
        overlay(&mut self.mode_posix, &other.mode_posix);
        overlay(&mut self.id_owner, &other.id_owner);
        overlay(&mut self.name_owner, &other.name_owner);
        overlay(&mut self.id_group, &other.id_group);
        overlay(&mut self.name_group, &other.name_group);
        overlay(&mut self.code_hfs_creator, &other.code_hfs_creator);
        overlay(&mut self.code_hfs_type, &other.code_hfs_type);
    }
}

/// Attributes written through the "resource property" store (flags).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpecResourceAttributes {
    pub flag_hidden: Option<bool>,
    pub flag_immutable: Option<bool>,
}

impl SpecResourceAttributes {
    pub fn is_empty(&self) -> bool {
        self.flag_hidden.is_none() && self.flag_immutable.is_none()
    }
}
