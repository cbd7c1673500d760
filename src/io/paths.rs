//! Path comparison for reader and writer locations.

use std::path::{Path, PathBuf};

/// Resolves `path` to an absolute form comparable with other resolved paths.
///
/// The deepest existing ancestor is canonicalized, so symlinks and `..` in the
/// existing part are resolved even when the tail does not exist yet.
pub fn resolve(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };

    let mut existing = absolute.as_path();
    let mut missing = Vec::new();
    loop {
        if let Ok(canonical) = existing.canonicalize() {
            return missing
                .iter()
                .rev()
                .fold(canonical, |acc: PathBuf, part| acc.join(part));
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name.to_os_string());
                existing = parent;
            }
            _ => return absolute,
        }
    }
}

/// Whether `a` and `b` are the same location or one lies inside the other.
pub fn paths_overlap(a: &Path, b: &Path) -> bool {
    let a = resolve(a);
    let b = resolve(b);
    a.starts_with(&b) || b.starts_with(&a)
}
