use anyhow::Result;
use std::path::{Path, PathBuf};

use crate::runtime::Runtime;

/// Whether `path` looks like a package archive (`*.var`, any case).
pub fn is_archive(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("var"))
}

/// Find every archive under `root`, depth first, skipping symlinks and the
/// directories named in `reserved`.
///
/// Results are sorted so repeated scans index in the same order.
#[tracing::instrument(skip(runtime, root, reserved))]
pub fn find_all_archives<R: Runtime>(
    runtime: &R,
    root: &Path,
    reserved: &[&str],
) -> Result<Vec<PathBuf>> {
    let mut archives = Vec::new();

    if !runtime.exists(root) {
        return Ok(archives);
    }

    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in runtime.read_dir(&dir)? {
            if runtime.is_symlink(&entry) {
                continue;
            }
            if runtime.is_dir(&entry) {
                let name = entry.file_name().and_then(|n| n.to_str()).unwrap_or("");
                if !reserved.contains(&name) {
                    pending.push(entry);
                }
            } else if is_archive(&entry) {
                archives.push(entry);
            }
        }
    }

    archives.sort();
    Ok(archives)
}
