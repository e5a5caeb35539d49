//! Run report models and mutable report builder.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use crate::spec::{EnumMirrorErrorKind, MirrorEntryError, MirrorTreeError};

/// Terminal status of one tree run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EnumRunStatus {
    /// Every enumerated entry was mirrored.
    #[default]
    Completed,
    /// The walk finished but some entries were skipped after failing.
    Partial,
    /// Stopped early by an entry failure (abort policy) or a traversal failure.
    Aborted,
}

impl EnumRunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Partial => "partial",
            Self::Aborted => "aborted",
        }
    }
}

impl fmt::Display for EnumRunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of processing one enumerated entry, in walk order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecEntryOutcome {
    pub path_rel: PathBuf,
    pub outcome: Result<(), EnumMirrorErrorKind>,
}

/// Aggregate counters and per-entry outcomes for one tree run.
#[derive(Debug, Default)]
pub struct ReportMirror {
    /// Entries produced by the enumerator, including failed reads.
    pub cnt_scanned: u64,
    /// Entries whose mirror was created or reconciled.
    pub cnt_mirrored: u64,
    /// Entries that failed, skipped or not.
    pub cnt_failed: u64,
    /// Entries dropped by exclusion patterns (a pruned directory counts once).
    pub cnt_excluded: u64,
    pub entries: Vec<SpecEntryOutcome>,
    /// Entry failures recorded under skip policy, with their full messages.
    pub errors: Vec<MirrorEntryError>,
    pub status: EnumRunStatus,
    /// Run-terminating failure, if any.
    pub fatal: Option<MirrorTreeError>,
}

impl ReportMirror {
    /// Number of collected (skipped) entry errors.
    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Surface the fatal failure as an error, keeping the report otherwise.
    pub fn into_result(mut self) -> Result<Self, MirrorTreeError> {
        match self.fatal.take() {
            Some(e) => Err(e),
            None => Ok(self),
        }
    }

    /// Machine-readable counters.
    pub fn to_dict(&self) -> BTreeMap<String, u64> {
        let mut dict_counts = BTreeMap::new();
        dict_counts.insert("cnt_scanned".to_string(), self.cnt_scanned);
        dict_counts.insert("cnt_mirrored".to_string(), self.cnt_mirrored);
        dict_counts.insert("cnt_failed".to_string(), self.cnt_failed);
        dict_counts.insert("cnt_excluded".to_string(), self.cnt_excluded);
        dict_counts
    }

    /// Human-readable one-line summary.
    pub fn format(&self, prefix: &str) -> String {
        let dict_counts = self.to_dict();
        format!(
            "{prefix} scanned={} mirrored={} failed={} excluded={} status={}",
            dict_counts["cnt_scanned"],
            dict_counts["cnt_mirrored"],
            dict_counts["cnt_failed"],
            dict_counts["cnt_excluded"],
            self.status
        )
    }
}

impl fmt::Display for ReportMirror {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format("[MIRROR]"))
    }
}

/// Mutable accumulator used while walking.
#[derive(Debug, Default)]
pub struct ReportMirrorBuilder {
    pub cnt_scanned: u64,
    pub cnt_mirrored: u64,
    pub cnt_failed: u64,
    pub cnt_excluded: u64,
    pub entries: Vec<SpecEntryOutcome>,
    pub errors: Vec<MirrorEntryError>,
}

impl ReportMirrorBuilder {
    pub fn add_scanned(&mut self) {
        self.cnt_scanned += 1;
    }

    pub fn add_excluded(&mut self, n: u64) {
        self.cnt_excluded += n;
    }

    pub fn add_mirrored(&mut self, path_rel: PathBuf) {
        self.cnt_mirrored += 1;
        self.entries.push(SpecEntryOutcome {
            path_rel,
            outcome: Ok(()),
        });
    }

    /// Record a failure; `error` is kept only when the run goes on past it.
    pub fn add_failed(&mut self, error: &MirrorEntryError) {
        self.cnt_failed += 1;
        self.entries.push(SpecEntryOutcome {
            path_rel: error.path_rel().to_path_buf(),
            outcome: Err(error.kind()),
        });
    }

    pub fn add_skipped_error(&mut self, error: MirrorEntryError) {
        self.errors.push(error);
    }

    /// Finalize into an immutable report. Status follows from `fatal` and the failure count.
    pub fn build(self, fatal: Option<MirrorTreeError>) -> ReportMirror {
        let status = if fatal.is_some() {
            EnumRunStatus::Aborted
        } else if self.cnt_failed > 0 {
            EnumRunStatus::Partial
        } else {
            EnumRunStatus::Completed
        };
        ReportMirror {
            cnt_scanned: self.cnt_scanned,
            cnt_mirrored: self.cnt_mirrored,
            cnt_failed: self.cnt_failed,
            cnt_excluded: self.cnt_excluded,
            entries: self.entries,
            errors: self.errors,
            status,
            fatal,
        }
    }
}
