//! Command-line arguments.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use metamirror_fs::{EnumErrorPolicy, EnumPatternMode, SpecMirrorConfig, SpecMirrorOptions};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ArgPatternMode {
    Glob,
    Regex,
    Literal,
}

impl From<ArgPatternMode> for EnumPatternMode {
    fn from(value: ArgPatternMode) -> Self {
        match value {
            ArgPatternMode::Glob => Self::Glob,
            ArgPatternMode::Regex => Self::Regex,
            ArgPatternMode::Literal => Self::Literal,
        }
    }
}

/// Mirror a directory tree as empty placeholder files that keep the metadata.
#[derive(Parser, Debug)]
#[command(name = "metamirror", author, version, about, long_about = None)]
pub struct Args {
    /// Source directory (or entry, with --single)
    pub source: PathBuf,

    /// Existing destination directory (or the mirror path, with --single)
    pub destination: PathBuf,

    /// Mirror only SOURCE itself onto DESTINATION
    #[arg(long)]
    pub single: bool,

    /// Report failing entries and continue instead of aborting
    #[arg(short = 'i', long)]
    pub skip_errors: bool,

    /// Print the relative path of each mirrored entry
    #[arg(short, long)]
    pub verbose: bool,

    /// Do not copy creation and modification dates
    #[arg(long)]
    pub no_dates: bool,

    /// Do not copy permissions and ownership
    #[arg(long)]
    pub no_permissions: bool,

    /// Do not copy extended attributes
    #[arg(long)]
    pub no_xattrs: bool,

    /// Do not copy hidden/immutable flags
    #[arg(long)]
    pub no_flags: bool,

    /// Do not copy HFS type and creator codes
    #[arg(long)]
    pub no_hfs_codes: bool,

    /// Exclude entries whose name matches (repeatable; excluded directories are pruned)
    #[arg(short = 'e', long = "exclude", value_name = "PATTERN")]
    pub patterns_exclude: Vec<String>,

    /// How exclude patterns are interpreted
    #[arg(long, value_enum, default_value_t = ArgPatternMode::Glob)]
    pub pattern_mode: ArgPatternMode,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "warn")]
    pub log_level: tracing::Level,
}

impl Args {
    pub fn to_options(&self) -> SpecMirrorOptions {
        SpecMirrorOptions {
            config: SpecMirrorConfig {
                if_copy_dates: !self.no_dates,
                if_copy_permissions: !self.no_permissions,
                if_copy_extended_attributes: !self.no_xattrs,
                if_copy_flags: !self.no_flags,
                if_copy_hfs_codes: !self.no_hfs_codes,
            },
            rule_error: if self.skip_errors {
                EnumErrorPolicy::Skip
            } else {
                EnumErrorPolicy::Abort
            },
            patterns_exclude: (!self.patterns_exclude.is_empty())
                .then(|| self.patterns_exclude.clone()),
            rule_pattern: self.pattern_mode.into(),
        }
    }
}
