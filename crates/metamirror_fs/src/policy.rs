//! Error policy controller and progress observer.

use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

use crate::report::{ReportMirror, ReportMirrorBuilder};
use crate::spec::{EnumErrorPolicy, MirrorEntryError, MirrorTreeError};

/// Progress and diagnostic channel for a run.
///
/// Both hooks default to no-ops.
pub trait MirrorObserver {
    /// Called after an entry was mirrored successfully.
    fn on_entry_mirrored(&mut self, _path_rel: &Path) {}

    /// Called when a failing entry is skipped under [`EnumErrorPolicy::Skip`].
    fn on_entry_skipped(&mut self, _path_rel: &Path, _error: &MirrorEntryError) {}
}

/// Observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl MirrorObserver for NoopObserver {}

/// Decides abort-vs-skip for each entry outcome and accumulates the report.
pub struct ErrorPolicyController<'o> {
    rule_error: EnumErrorPolicy,
    observer: &'o mut dyn MirrorObserver,
    builder_report: ReportMirrorBuilder,
}

impl<'o> ErrorPolicyController<'o> {
    pub fn new(rule_error: EnumErrorPolicy, observer: &'o mut dyn MirrorObserver) -> Self {
        Self {
            rule_error,
            observer,
            builder_report: ReportMirrorBuilder::default(),
        }
    }

    pub fn add_scanned(&mut self) {
        self.builder_report.add_scanned();
    }

    pub fn add_excluded(&mut self, n: u64) {
        self.builder_report.add_excluded(n);
    }

    /// Route one entry outcome.
    ///
    /// `Break` carries the run-terminating error under abort policy; skip policy
    /// always continues.
    pub fn handle(
        &mut self,
        path_rel: PathBuf,
        outcome: Result<(), MirrorEntryError>,
    ) -> ControlFlow<MirrorTreeError> {
        let error = match outcome {
            Ok(()) => {
                self.observer.on_entry_mirrored(&path_rel);
                self.builder_report.add_mirrored(path_rel);
                return ControlFlow::Continue(());
            }
            Err(e) => e,
        };

        self.builder_report.add_failed(&error);
        match self.rule_error {
            EnumErrorPolicy::Abort => ControlFlow::Break(MirrorTreeError::Aborted {
                path_rel,
                source: error,
            }),
            EnumErrorPolicy::Skip => {
                tracing::debug!(error = %error, "skipping entry");
                self.observer.on_entry_skipped(&path_rel, &error);
                self.builder_report.add_skipped_error(error);
                ControlFlow::Continue(())
            }
        }
    }

    pub fn finish(self, fatal: Option<MirrorTreeError>) -> ReportMirror {
        self.builder_report.build(fatal)
    }
}
