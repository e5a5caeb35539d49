//! Console progress: mirrored paths to stdout, skipped entries to stderr.

use std::io::Write;
use std::path::Path;

use metamirror_fs::{MirrorEntryError, MirrorObserver};

pub struct ConsoleObserver<O: Write, E: Write> {
    if_verbose: bool,
    out: O,
    err: E,
}

impl<O: Write, E: Write> ConsoleObserver<O, E> {
    pub fn new(if_verbose: bool, out: O, err: E) -> Self {
        Self {
            if_verbose,
            out,
            err,
        }
    }
}

impl<O: Write, E: Write> MirrorObserver for ConsoleObserver<O, E> {
    fn on_entry_mirrored(&mut self, path_rel: &Path) {
        if self.if_verbose {
            // A closed stdout must not stop the run.
            let _ = writeln!(self.out, "{}", path_rel.display());
        }
    }

    fn on_entry_skipped(&mut self, _path_rel: &Path, error: &MirrorEntryError) {
        let _ = writeln!(self.err, "Skipping file:  {error}");
    }
}
