//! Moving archives and links around without overwriting anything.

use anyhow::{Context, Result};
use log::debug;
use std::path::{Path, PathBuf};

use crate::runtime::Runtime;

/// First free path for `file_name` in `dir`: `name.var`, `name(1).var`,
/// `name(2).var`, ...
pub fn unique_path<R: Runtime>(runtime: &R, dir: &Path, file_name: &str) -> PathBuf {
    let candidate = dir.join(file_name);
    if !runtime.exists(&candidate) && !runtime.is_symlink(&candidate) {
        return candidate;
    }
    let (stem, ext) = match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, format!(".{}", ext)),
        _ => (file_name, String::new()),
    };
    (1..)
        .map(|i| dir.join(format!("{}({}){}", stem, i, ext)))
        .find(|p| !runtime.exists(p) && !runtime.is_symlink(p))
        .unwrap_or(candidate)
}

/// Move `from` to `to`, copying and removing when a rename is not possible
/// (different volumes). Links are always renamed.
#[tracing::instrument(skip(runtime))]
pub fn move_file<R: Runtime>(runtime: &R, from: &Path, to: &Path) -> Result<()> {
    if let Some(parent) = to.parent() {
        runtime.create_dir_all(parent)?;
    }
    match runtime.rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) if !runtime.is_symlink(from) => {
            debug!("rename {:?} failed ({}), copying instead", from, e);
            runtime
                .copy(from, to)
                .with_context(|| format!("Failed to copy {:?} to {:?}", from, to))?;
            runtime
                .remove_file(from)
                .with_context(|| format!("Failed to remove {:?} after copying", from))?;
            Ok(())
        }
        Err(e) => Err(e.context(format!("Failed to move link {:?}", from))),
    }
}

/// Move `from` into `dir` under a non-clashing name; returns the new path.
pub fn move_into<R: Runtime>(runtime: &R, from: &Path, dir: &Path) -> Result<PathBuf> {
    let file_name = from
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("{:?} has no file name", from))?;
    runtime.create_dir_all(dir)?;
    let dest = unique_path(runtime, dir, file_name);
    move_file(runtime, from, &dest)?;
    Ok(dest)
}
