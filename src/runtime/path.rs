//! Path utility functions for normalization and comparison.

use std::path::{Component, Path, PathBuf};

/// Normalize a path by processing `.` and `..` components lexically.
/// This does not access the filesystem and does not follow symlinks.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !result.pop() {
                    result.push(component);
                }
            }
            _ => result.push(component),
        }
    }
    result
}

/// Express `path` relative to `root`, if it lives under it.
pub fn relative_to(path: &Path, root: &Path) -> Option<PathBuf> {
    normalize_path(path)
        .strip_prefix(normalize_path(root))
        .ok()
        .map(Path::to_path_buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_with_parent_dir() {
        assert_eq!(
            normalize_path(Path::new("/repo/creator/../other/./pkg.var")),
            PathBuf::from("/repo/other/pkg.var")
        );
    }

    #[test]
    fn test_normalize_path_parent_at_root_of_relative() {
        assert_eq!(
            normalize_path(Path::new("../links/pkg.var")),
            PathBuf::from("../links/pkg.var")
        );
    }

    #[test]
    fn test_relative_to() {
        assert_eq!(
            relative_to(Path::new("/repo/alice/a.b.1.var"), Path::new("/repo")),
            Some(PathBuf::from("alice/a.b.1.var"))
        );
        assert_eq!(
            relative_to(Path::new("/elsewhere/a.b.1.var"), Path::new("/repo")),
            None
        );
    }
}
