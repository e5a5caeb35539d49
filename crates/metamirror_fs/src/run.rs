//! Orchestrator: tree mode and single-entry mode.

use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::backend::{FsBackend, OsBackend};
use crate::filter::SpecMirrorPatterns;
use crate::mirror::NodeMirrorBuilder;
use crate::policy::{ErrorPolicyController, MirrorObserver, NoopObserver};
use crate::report::ReportMirror;
use crate::select::EnumFileAttributeKey;
use crate::snapshot::{SpecFileAttributes, SpecRelativeEntry};
use crate::spec::{
    EnumNodeType, MirrorEntryError, MirrorTreeError, SpecMirrorConfig, SpecMirrorOptions,
    ValidationError,
};
use crate::util::{derive_destination_path, is_overlap};
use crate::walk::{TreeWalker, WalkError};

/// Mirroring entry point bound to one backend and one set of options.
pub struct MetaMirror<B: FsBackend> {
    backend: B,
    options: SpecMirrorOptions,
}

impl MetaMirror<OsBackend> {
    /// Mirror against the real filesystem.
    pub fn with_os_backend(options: SpecMirrorOptions) -> Self {
        Self::new(OsBackend::new(), options)
    }
}

impl<B: FsBackend> MetaMirror<B> {
    pub fn new(backend: B, options: SpecMirrorOptions) -> Self {
        Self { backend, options }
    }

    fn require_directory(
        &self,
        path: &Path,
        on_missing: fn(PathBuf) -> ValidationError,
        on_other: fn(PathBuf) -> ValidationError,
    ) -> Result<(), ValidationError> {
        match self.backend.query_node_type(path) {
            Ok(Some(EnumNodeType::Directory)) => Ok(()),
            Ok(Some(_)) => Err(on_other(path.to_path_buf())),
            Ok(None) => Err(on_missing(path.to_path_buf())),
            Err(e) => Err(ValidationError::Inspect {
                path: path.to_path_buf(),
                source: e,
            }),
        }
    }

    /// Pre-flight checks for tree mode, in reporting order.
    fn validate_tree(
        &self,
        path_src: &Path,
        path_dst: &Path,
    ) -> Result<SpecMirrorPatterns, ValidationError> {
        self.require_directory(
            path_src,
            ValidationError::SourceMissing,
            ValidationError::SourceNotDirectory,
        )?;
        self.require_directory(
            path_dst,
            ValidationError::DestinationMissing,
            ValidationError::DestinationNotDirectory,
        )?;
        if is_overlap(path_src, path_dst) {
            return Err(ValidationError::SourceDestinationOverlap {
                path_source: path_src.to_path_buf(),
                path_destination: path_dst.to_path_buf(),
            });
        }
        SpecMirrorPatterns::from_raw(
            self.options.patterns_exclude.as_deref(),
            self.options.rule_pattern,
        )
    }

    /// Mirror every entry below `path_src` into the existing directory `path_dst`.
    ///
    /// Only validation fails here; entry and traversal failures end up in the
    /// report (`status`, `fatal`).
    pub fn mirror_tree_report<P, Q>(
        &self,
        path_src: P,
        path_dst: Q,
        observer: &mut dyn MirrorObserver,
    ) -> Result<ReportMirror, ValidationError>
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
    {
        let path_src = path_src.as_ref();
        let path_dst = path_dst.as_ref();
        let patterns = self.validate_tree(path_src, path_dst)?;

        let builder_node = NodeMirrorBuilder::new(&self.backend, &self.options.config);
        let mut controller = ErrorPolicyController::new(self.options.rule_error, observer);
        let mut walker = TreeWalker::new(&self.backend, path_src).with_patterns(patterns);
        let if_restore_dir_times = builder_node
            .selection()
            .keys_file
            .contains(&EnumFileAttributeKey::ModificationDate);
        let mut l_dirs_open: Vec<(PathBuf, SystemTime)> = Vec::new();
        let mut fatal = None;

        for item in walker.by_ref() {
            let path_rel_next = match &item {
                Ok(entry) => Some(entry.path_rel.as_path()),
                Err(WalkError::EntryRead { path_rel, .. }) => Some(path_rel.as_path()),
                Err(WalkError::Traversal { .. }) => None,
            };
            self.restore_directory_times(path_dst, &mut l_dirs_open, path_rel_next);

            let (path_rel, outcome) = match item {
                Ok(entry) => {
                    let outcome = builder_node
                        .mirror(
                            &derive_destination_path(path_src, &entry.path_rel),
                            &derive_destination_path(path_dst, &entry.path_rel),
                            &entry,
                        )
                        .map(|_| ());
                    if if_restore_dir_times
                        && outcome.is_ok()
                        && entry.snapshot.node_type == EnumNodeType::Directory
                        && let Some(time_modified) = entry.snapshot.time_modified
                    {
                        l_dirs_open.push((entry.path_rel.clone(), time_modified));
                    }
                    (entry.path_rel, outcome)
                }
                Err(WalkError::EntryRead { path_rel, source }) => (
                    path_rel.clone(),
                    Err(MirrorEntryError::EntryRead { path_rel, source }),
                ),
                Err(WalkError::Traversal { path, source }) => {
                    fatal = Some(MirrorTreeError::Traversal { path, source });
                    break;
                }
            };
            controller.add_scanned();
            if let ControlFlow::Break(e) = controller.handle(path_rel, outcome) {
                fatal = Some(e);
                break;
            }
        }
        self.restore_directory_times(path_dst, &mut l_dirs_open, None);
        controller.add_excluded(walker.cnt_excluded());

        let report = controller.finish(fatal);
        tracing::info!("{}", report);
        Ok(report)
    }

    /// Re-apply the modification time of every open directory that does not contain
    /// `path_rel_next`; `None` closes them all. Creating children bumps a directory's
    /// time, so it is written again once its subtree is done.
    fn restore_directory_times(
        &self,
        path_dst: &Path,
        l_dirs_open: &mut Vec<(PathBuf, SystemTime)>,
        path_rel_next: Option<&Path>,
    ) {
        while let Some((path_rel_dir, _)) = l_dirs_open.last() {
            if path_rel_next.is_some_and(|p| p.starts_with(path_rel_dir)) {
                break;
            }
            let Some((path_rel_dir, time_modified)) = l_dirs_open.pop() else {
                break;
            };
            let attrs = SpecFileAttributes {
                time_modified: Some(time_modified),
                ..SpecFileAttributes::default()
            };
            let path_dir = derive_destination_path(path_dst, &path_rel_dir);
            if let Err(e) = self.backend.set_file_attributes(&path_dir, &attrs) {
                tracing::warn!(
                    path = %path_rel_dir.display(),
                    error = %e,
                    "couldn't restore directory modification time"
                );
            }
        }
    }

    /// Like [`Self::mirror_tree_report`], with abort and traversal failures as errors.
    pub fn mirror_tree<P, Q>(
        &self,
        path_src: P,
        path_dst: Q,
        observer: &mut dyn MirrorObserver,
    ) -> Result<ReportMirror, MirrorTreeError>
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
    {
        self.mirror_tree_report(path_src, path_dst, observer)?
            .into_result()
    }

    /// Mirror one entry at `path_src` onto the exact path `path_dst`.
    ///
    /// Errors name `path_dst` as given. No walk and no error policy are involved.
    pub fn mirror_item<P, Q>(
        &self,
        path_src: P,
        path_dst: Q,
        observer: &mut dyn MirrorObserver,
    ) -> Result<(), MirrorTreeError>
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
    {
        let path_src = path_src.as_ref();
        let path_dst = path_dst.as_ref();
        match self.backend.query_node_type(path_src) {
            Ok(Some(_)) => {}
            Ok(None) => {
                return Err(ValidationError::SourceMissing(path_src.to_path_buf()).into());
            }
            Err(e) => {
                return Err(ValidationError::Inspect {
                    path: path_src.to_path_buf(),
                    source: e,
                }
                .into());
            }
        }

        let path_rel = path_dst.to_path_buf();
        let to_aborted = |e: MirrorEntryError| MirrorTreeError::Aborted {
            path_rel: path_rel.clone(),
            source: e,
        };
        let snapshot = self.backend.read_snapshot(path_src).map_err(|e| {
            to_aborted(MirrorEntryError::EntryRead {
                path_rel: path_rel.clone(),
                source: e,
            })
        })?;
        let entry = SpecRelativeEntry {
            path_rel: path_rel.clone(),
            snapshot,
        };
        NodeMirrorBuilder::new(&self.backend, &self.options.config)
            .mirror(path_src, path_dst, &entry)
            .map_err(to_aborted)?;
        observer.on_entry_mirrored(&path_rel);
        Ok(())
    }
}

/// Mirror a whole tree on the real filesystem.
pub fn mirror_tree<P, Q>(
    path_src: P,
    path_dst: Q,
    options: SpecMirrorOptions,
) -> Result<ReportMirror, MirrorTreeError>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    MetaMirror::with_os_backend(options).mirror_tree(path_src, path_dst, &mut NoopObserver)
}

/// Mirror a single entry on the real filesystem.
pub fn mirror_item<P, Q>(
    path_src: P,
    path_dst: Q,
    config: SpecMirrorConfig,
) -> Result<(), MirrorTreeError>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let options = SpecMirrorOptions {
        config,
        ..SpecMirrorOptions::default()
    };
    MetaMirror::with_os_backend(options).mirror_item(path_src, path_dst, &mut NoopObserver)
}
