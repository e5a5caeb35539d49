//! `metamirror_fs`:
//! Shadow-tree mirroring engine. Mirrors keep the shape and selected metadata
//! of a tree; regular files become empty placeholders, links are copied as links.
//!
//! Layout:
//! - `spec`     : enums/options/errors
//! - `snapshot` : per-entry metadata snapshot and attribute payloads
//! - `select`   : config -> attribute keys
//! - `backend`  : filesystem capability (real and in-memory)
//! - `xattrs`   : extended-attribute primitives and transfer
//! - `mirror`   : per-entry create/reconcile
//! - `walk`     : pre-order enumerator
//! - `policy`   : abort/skip controller, progress observer
//! - `run`      : tree and single-entry orchestration
//! - `report`   : run-time report model

pub mod backend;
mod filter;
pub mod mirror;
pub mod policy;
pub mod report;
pub mod run;
pub mod select;
pub mod snapshot;
pub mod spec;
mod util;
pub mod walk;
pub mod xattrs;

pub use backend::{FsBackend, MemoryBackend, OsBackend};
pub use mirror::{EnumMirrorAction, NodeMirrorBuilder};
pub use policy::{ErrorPolicyController, MirrorObserver, NoopObserver};
pub use report::{EnumRunStatus, ReportMirror, ReportMirrorBuilder, SpecEntryOutcome};
pub use run::{MetaMirror, mirror_item, mirror_tree};
pub use select::{SpecAttributeSelection, select_attributes};
pub use snapshot::{SpecFileAttributes, SpecMetadataSnapshot, SpecRelativeEntry};
pub use spec::{
    AttributeIoError, EnumErrorPolicy, EnumMirrorErrorKind, EnumNodeType, EnumPatternMode,
    MirrorEntryError, MirrorTreeError, SpecMirrorConfig, SpecMirrorOptions, ValidationError,
};
pub use walk::{TreeWalker, WalkError};
