use std::fs;
use std::path::{Component, Path, PathBuf};

////////////////////////////////////////////////////////////////////////////////
// #region PathHelpers

fn is_relative_to_base(path: &Path, base: &Path) -> bool {
    path.starts_with(base)
}

/// Canonical form when the path exists, absolute lexical form otherwise.
fn normalize_path(path: &Path) -> PathBuf {
    if let Ok(resolved) = fs::canonicalize(path) {
        return resolved;
    }
    let path_abs = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    let mut path_clean = PathBuf::new();
    for component in path_abs.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                path_clean.pop();
            }
            other => path_clean.push(other.as_os_str()),
        }
    }
    path_clean
}

/// Whether either root lies inside the other.
///
/// Resolution goes through the host filesystem, not the run's backend: paths the host
/// cannot resolve are compared lexically, which is what an in-memory tree gets.
pub(crate) fn is_overlap(src: &Path, dst: &Path) -> bool {
    let src_resolved = normalize_path(src);
    let dst_resolved = normalize_path(dst);
    is_relative_to_base(&dst_resolved, &src_resolved)
        || is_relative_to_base(&src_resolved, &dst_resolved)
}

/// `root` joined with a root-relative path; the empty relative path is the root itself.
pub(crate) fn derive_destination_path(path_root: &Path, path_rel: &Path) -> PathBuf {
    if path_rel.as_os_str().is_empty() {
        path_root.to_path_buf()
    } else {
        path_root.join(path_rel)
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
