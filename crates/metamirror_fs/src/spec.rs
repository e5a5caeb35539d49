//! Mirror models: enums, options and the error taxonomy.

use std::ffi::OsString;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

////////////////////////////////////////////////////////////////////////////////
// #region EnumsInit

/// Kind of one filesystem entry, as seen without following a final symlink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EnumNodeType {
    /// Regular file; mirrored as an empty placeholder.
    RegularFile,
    /// Directory.
    Directory,
    /// Raw symbolic link.
    SymbolicLink,
    /// Platform alias/reparse-style link that needs a separate attribute step.
    AliasLink,
    /// Anything else (fifo, socket, device, ...).
    Unsupported,
}

impl EnumNodeType {
    /// Whether the entry is mirrored by duplicating a link reference.
    pub fn is_link(self) -> bool {
        matches!(self, Self::SymbolicLink | Self::AliasLink)
    }
}

impl fmt::Display for EnumNodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c_name = match self {
            Self::RegularFile => "regular file",
            Self::Directory => "directory",
            Self::SymbolicLink => "symbolic link",
            Self::AliasLink => "alias",
            Self::Unsupported => "unsupported file",
        };
        f.write_str(c_name)
    }
}

/// What to do when mirroring one entry fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnumErrorPolicy {
    /// Stop the whole run at the first failing entry.
    #[default]
    Abort,
    /// Record the failure, report it and continue with the next entry.
    Skip,
}

/// Pattern matching mode for exclusion lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnumPatternMode {
    /// Shell-like wildcards (`*`, `?`, character classes).
    #[default]
    Glob,
    /// Regular expression pattern.
    Regex,
    /// Substring match.
    Literal,
}

/// Extended-attribute primitive that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumXattrOperation {
    /// Listing attribute names.
    List,
    /// Reading one attribute value.
    Read,
    /// Writing one attribute value.
    Write,
}

impl fmt::Display for EnumXattrOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::List => "list",
            Self::Read => "read",
            Self::Write => "write",
        })
    }
}

/// Fieldless view of [`MirrorEntryError`] for matching and counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnumMirrorErrorKind {
    UnsupportedFileType,
    TypeConflict,
    DirectoryCreation,
    FileCreation,
    LinkCopy,
    ExtendedAttributesCopy,
    FlagsCopy,
    EntryRead,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Options

/// Which metadata categories are transferred onto every mirror.
///
/// Any combination is valid. `Default` enables everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpecMirrorConfig {
    /// Creation and modification dates.
    pub if_copy_dates: bool,
    /// POSIX permission bits plus owner and group.
    pub if_copy_permissions: bool,
    /// Named extended attributes.
    pub if_copy_extended_attributes: bool,
    /// Hidden and immutable flags.
    pub if_copy_flags: bool,
    /// Legacy HFS type and creator codes.
    pub if_copy_hfs_codes: bool,
}

impl SpecMirrorConfig {
    /// Every category enabled.
    pub fn all() -> Self {
        Self {
            if_copy_dates: true,
            if_copy_permissions: true,
            if_copy_extended_attributes: true,
            if_copy_flags: true,
            if_copy_hfs_codes: true,
        }
    }

    /// Every category disabled: mirrors only reproduce the tree shape.
    pub fn none() -> Self {
        Self {
            if_copy_dates: false,
            if_copy_permissions: false,
            if_copy_extended_attributes: false,
            if_copy_flags: false,
            if_copy_hfs_codes: false,
        }
    }
}

impl Default for SpecMirrorConfig {
    fn default() -> Self {
        Self::all()
    }
}

/// Input options for a mirroring run.
#[derive(Debug, Clone, Default)]
pub struct SpecMirrorOptions {
    /// Metadata categories to transfer.
    pub config: SpecMirrorConfig,
    /// Abort-vs-skip behavior for entry-level failures.
    pub rule_error: EnumErrorPolicy,
    /// Exclude patterns applied to entry basenames. Excluded directories are pruned.
    pub patterns_exclude: Option<Vec<String>>,
    /// Pattern interpretation mode.
    pub rule_pattern: EnumPatternMode,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Errors

/// Low-level failure of one extended-attribute primitive.
#[derive(Debug, thiserror::Error)]
#[error(
    "Couldn't {operation} extended attribute{} of \"{}\": {message}",
    describe_xattr_name(.name.as_deref()),
    .path.display()
)]
pub struct AttributeIoError {
    /// Primitive that failed.
    pub operation: EnumXattrOperation,
    /// Entry the primitive ran against.
    pub path: PathBuf,
    /// Attribute name; `None` for listing.
    pub name: Option<OsString>,
    /// Originating platform error code, when there is one.
    pub code: Option<i32>,
    /// Platform error message, verbatim.
    pub message: String,
}

impl AttributeIoError {
    pub fn from_io(
        operation: EnumXattrOperation,
        path: &Path,
        name: Option<&std::ffi::OsStr>,
        error: io::Error,
    ) -> Self {
        Self {
            operation,
            path: path.to_path_buf(),
            name: name.map(|v| v.to_os_string()),
            code: error.raw_os_error(),
            message: error.to_string(),
        }
    }
}

fn describe_xattr_name(name: Option<&std::ffi::OsStr>) -> String {
    match name {
        Some(v) => format!(" \"{}\"", v.to_string_lossy()),
        None => "s".to_string(),
    }
}

/// Failure to mirror one entry. Paths are relative to the tree roots.
#[derive(Debug, thiserror::Error)]
pub enum MirrorEntryError {
    #[error("Unsupported file type of \"{}\"", .path_rel.display())]
    UnsupportedFileType { path_rel: PathBuf },

    #[error(
        "File \"{}\" already exists but with different type ({found}, expected {expected})",
        .path_rel.display()
    )]
    TypeConflict {
        path_rel: PathBuf,
        expected: EnumNodeType,
        found: EnumNodeType,
    },

    #[error("Couldn't create directory \"{}\":  {source}", .path_rel.display())]
    DirectoryCreation { path_rel: PathBuf, source: io::Error },

    #[error("Couldn't create file \"{}\":  {source}", .path_rel.display())]
    FileCreation { path_rel: PathBuf, source: io::Error },

    #[error("Couldn't copy symlink or alias to \"{}\":  {source}", .path_rel.display())]
    LinkCopy { path_rel: PathBuf, source: io::Error },

    #[error("Couldn't copy extended attributes to \"{}\":  {source}", .path_rel.display())]
    ExtendedAttributesCopy {
        path_rel: PathBuf,
        source: AttributeIoError,
    },

    #[error("Couldn't copy flags to \"{}\":  {source}", .path_rel.display())]
    FlagsCopy { path_rel: PathBuf, source: io::Error },

    #[error("Couldn't read metadata of \"{}\":  {source}", .path_rel.display())]
    EntryRead { path_rel: PathBuf, source: io::Error },
}

impl MirrorEntryError {
    pub fn kind(&self) -> EnumMirrorErrorKind {
        match self {
            Self::UnsupportedFileType { .. } => EnumMirrorErrorKind::UnsupportedFileType,
            Self::TypeConflict { .. } => EnumMirrorErrorKind::TypeConflict,
            Self::DirectoryCreation { .. } => EnumMirrorErrorKind::DirectoryCreation,
            Self::FileCreation { .. } => EnumMirrorErrorKind::FileCreation,
            Self::LinkCopy { .. } => EnumMirrorErrorKind::LinkCopy,
            Self::ExtendedAttributesCopy { .. } => EnumMirrorErrorKind::ExtendedAttributesCopy,
            Self::FlagsCopy { .. } => EnumMirrorErrorKind::FlagsCopy,
            Self::EntryRead { .. } => EnumMirrorErrorKind::EntryRead,
        }
    }

    pub fn path_rel(&self) -> &Path {
        match self {
            Self::UnsupportedFileType { path_rel }
            | Self::TypeConflict { path_rel, .. }
            | Self::DirectoryCreation { path_rel, .. }
            | Self::FileCreation { path_rel, .. }
            | Self::LinkCopy { path_rel, .. }
            | Self::ExtendedAttributesCopy { path_rel, .. }
            | Self::FlagsCopy { path_rel, .. }
            | Self::EntryRead { path_rel, .. } => path_rel,
        }
    }
}

/// Pre-flight problems detected before any mirroring begins.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("No such source \"{}\"", .0.display())]
    SourceMissing(PathBuf),

    #[error("Source is not a directory: {}", .0.display())]
    SourceNotDirectory(PathBuf),

    #[error("No such output directory \"{}\"", .0.display())]
    DestinationMissing(PathBuf),

    #[error("Output path is not a directory: {}", .0.display())]
    DestinationNotDirectory(PathBuf),

    #[error(
        "Source and destination directories overlap: {} <-> {}",
        .path_source.display(),
        .path_destination.display()
    )]
    SourceDestinationOverlap {
        path_source: PathBuf,
        path_destination: PathBuf,
    },

    #[error("Invalid exclude pattern: {0}")]
    InvalidPattern(String),

    #[error("Couldn't inspect \"{}\":  {source}", .path.display())]
    Inspect { path: PathBuf, source: io::Error },
}

/// Errors that terminate a whole run.
#[derive(Debug, thiserror::Error)]
pub enum MirrorTreeError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// First entry failure under [`EnumErrorPolicy::Abort`].
    #[error("{source}")]
    Aborted {
        path_rel: PathBuf,
        source: MirrorEntryError,
    },

    /// Directory listing failed mid-walk; the remaining sequence is incomplete.
    #[error("Enumeration failed at \"{}\":  {source}", .path.display())]
    Traversal { path: PathBuf, source: io::Error },
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
