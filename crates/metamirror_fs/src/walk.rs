//! Pre-order tree enumerator.
//!
//! The walker keeps a stack of sorted directory listings. A directory entry is
//! yielded before it is listed; its children are read on the following `next()`
//! call, so a consumer that stops early never lists anything further.

use std::ffi::OsString;
use std::io;
use std::iter::FusedIterator;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::backend::FsBackend;
use crate::filter::SpecMirrorPatterns;
use crate::snapshot::SpecRelativeEntry;
use crate::spec::EnumNodeType;
use crate::util::derive_destination_path;

/// Failure produced in place of an entry.
#[derive(Debug, Error)]
pub enum WalkError {
    /// Metadata of one discovered entry could not be read. The walk goes on.
    #[error("Couldn't read metadata of \"{}\":  {source}", .path_rel.display())]
    EntryRead { path_rel: PathBuf, source: io::Error },
    /// A directory could not be listed. Always the last item of the walk.
    #[error("Enumeration failed at \"{}\":  {source}", .path.display())]
    Traversal { path: PathBuf, source: io::Error },
}

impl WalkError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Traversal { .. })
    }
}

#[derive(Debug)]
struct SpecDirCursor {
    path_rel: PathBuf,
    names: std::vec::IntoIter<OsString>,
}

/// Lazy, finite, non-restartable pre-order walk below one root.
///
/// The root itself is not yielded. Siblings come out sorted by name.
pub struct TreeWalker<'a, B: FsBackend + ?Sized> {
    backend: &'a B,
    path_root: PathBuf,
    patterns: SpecMirrorPatterns,
    stack: Vec<SpecDirCursor>,
    pending_descend: Option<PathBuf>,
    cnt_excluded: u64,
    if_finished: bool,
}

impl<'a, B: FsBackend + ?Sized> TreeWalker<'a, B> {
    pub fn new<P: AsRef<Path>>(backend: &'a B, path_root: P) -> Self {
        Self {
            backend,
            path_root: path_root.as_ref().to_path_buf(),
            patterns: SpecMirrorPatterns::default(),
            stack: Vec::new(),
            pending_descend: Some(PathBuf::new()),
            cnt_excluded: 0,
            if_finished: false,
        }
    }

    pub(crate) fn with_patterns(mut self, patterns: SpecMirrorPatterns) -> Self {
        self.patterns = patterns;
        self
    }

    /// Entries dropped by exclusion patterns so far.
    pub fn cnt_excluded(&self) -> u64 {
        self.cnt_excluded
    }

    fn descend(&mut self, path_rel_dir: PathBuf) -> Result<(), WalkError> {
        let path_dir = derive_destination_path(&self.path_root, &path_rel_dir);
        match self.backend.list_directory(&path_dir) {
            Ok(mut l_names) => {
                l_names.sort();
                self.stack.push(SpecDirCursor {
                    path_rel: path_rel_dir,
                    names: l_names.into_iter(),
                });
                Ok(())
            }
            Err(e) => Err(WalkError::Traversal {
                path: path_dir,
                source: e,
            }),
        }
    }
}

impl<B: FsBackend + ?Sized> Iterator for TreeWalker<'_, B> {
    type Item = Result<SpecRelativeEntry, WalkError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.if_finished {
            return None;
        }
        if let Some(path_rel_dir) = self.pending_descend.take()
            && let Err(e) = self.descend(path_rel_dir)
        {
            tracing::debug!(error = %e, "directory enumeration failed");
            self.if_finished = true;
            self.stack.clear();
            return Some(Err(e));
        }

        loop {
            let Some(cursor) = self.stack.last_mut() else {
                self.if_finished = true;
                return None;
            };
            let Some(name) = cursor.names.next() else {
                self.stack.pop();
                continue;
            };
            let path_rel = cursor.path_rel.join(&name);

            if self.patterns.is_excluded(&name.to_string_lossy()) {
                tracing::debug!(path = %path_rel.display(), "excluded");
                self.cnt_excluded += 1;
                continue;
            }

            let path_src = self.path_root.join(&path_rel);
            return match self.backend.read_snapshot(&path_src) {
                Ok(snapshot) => {
                    if snapshot.node_type == EnumNodeType::Directory {
                        self.pending_descend = Some(path_rel.clone());
                    }
                    Some(Ok(SpecRelativeEntry { path_rel, snapshot }))
                }
                Err(e) => Some(Err(WalkError::EntryRead {
                    path_rel,
                    source: e,
                })),
            };
        }
    }
}

impl<B: FsBackend + ?Sized> FusedIterator for TreeWalker<'_, B> {}
