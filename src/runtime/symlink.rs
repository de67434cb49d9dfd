//! Symlink operations (create, read, resolve, remove, timestamps).

use anyhow::{Context, Result};
use filetime::FileTime;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use super::RealRuntime;
use super::path::normalize_path;

impl RealRuntime {
    #[tracing::instrument(skip(self))]
    pub(crate) fn symlink_impl(&self, original: &Path, link: &Path) -> Result<()> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::symlink as unix_symlink;
            unix_symlink(original, link).context("Failed to create symlink")?;
        }
        #[cfg(windows)]
        {
            use anyhow::bail;
            use std::os::windows::fs::symlink_file;

            // Package archives are always files.
            symlink_file(original, link).context("Failed to create file symlink")?;

            if fs::symlink_metadata(link).is_err() {
                bail!(
                    "Symlink creation reported success but link does not exist: link={:?} target={:?}",
                    link,
                    original
                );
            }
        }
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn read_link_impl(&self, path: &Path) -> Result<PathBuf> {
        fs::read_link(path).context("Failed to read symlink")
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn resolve_link_impl(&self, path: &Path) -> Result<PathBuf> {
        let target = fs::read_link(path).context("Failed to read symlink")?;
        if target.is_absolute() {
            Ok(target)
        } else {
            let parent = path
                .parent()
                .context("Failed to get parent directory of symlink")?;
            Ok(normalize_path(&parent.join(&target)))
        }
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn is_symlink_impl(&self, path: &Path) -> bool {
        fs::symlink_metadata(path)
            .map(|m| m.file_type().is_symlink())
            .unwrap_or(false)
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn remove_symlink_impl(&self, path: &Path) -> Result<()> {
        #[cfg(unix)]
        {
            fs::remove_file(path).context("Failed to remove symlink")?;
        }
        #[cfg(windows)]
        {
            fs::remove_file(path)
                .or_else(|_| fs::remove_dir(path))
                .context("Failed to remove symlink")?;
        }
        Ok(())
    }

    /// Unix has no settable birth time, so the creation time lands in atime.
    #[tracing::instrument(skip(self))]
    pub(crate) fn set_link_times_impl(
        &self,
        link: &Path,
        created: SystemTime,
        modified: SystemTime,
    ) -> Result<()> {
        filetime::set_symlink_file_times(
            link,
            FileTime::from_system_time(created),
            FileTime::from_system_time(modified),
        )
        .with_context(|| format!("Failed to set times on link {:?}", link))
    }
}

#[cfg(test)]
mod tests {
    use crate::runtime::{RealRuntime, Runtime};
    use std::time::{Duration, SystemTime};
    use tempfile::tempdir;

    #[cfg_attr(
        vpm_skip_cross_windows_tests,
        ignore = "cross windows tests disabled; set VPM_RUN_CROSS_WINDOWS_TESTS=1 to enable"
    )]
    #[test]
    fn test_real_runtime_file_symlink() {
        let runtime = RealRuntime;
        let dir = tempdir().unwrap();

        let target = dir.path().join("alice.hair1.2.var");
        runtime.write(&target, b"content").unwrap();

        let link = dir.path().join("link.var");
        runtime.symlink(&target, &link).unwrap();
        assert!(runtime.is_symlink(&link));
        assert!(!runtime.is_symlink(&target));
        assert_eq!(runtime.read_to_string(&link).unwrap(), "content");
        assert_eq!(runtime.resolve_link(&link).unwrap(), target);

        runtime.remove_symlink(&link).unwrap();
        assert!(!runtime.exists(&link));
        assert!(runtime.exists(&target));
    }

    #[cfg(unix)]
    #[test]
    fn test_resolve_link_relative_target() {
        let runtime = RealRuntime;
        let dir = tempdir().unwrap();
        let sub = dir.path().join("links");
        runtime.create_dir_all(&sub).unwrap();
        let target = dir.path().join("pkg.var");
        runtime.write(&target, b"x").unwrap();

        let link = sub.join("pkg.var");
        runtime.symlink(std::path::Path::new("../pkg.var"), &link).unwrap();

        assert_eq!(runtime.resolve_link(&link).unwrap(), target);
    }

    #[cfg(unix)]
    #[test]
    fn test_dangling_link_is_still_a_symlink() {
        let runtime = RealRuntime;
        let dir = tempdir().unwrap();
        let link = dir.path().join("gone.var");
        runtime
            .symlink(&dir.path().join("missing.var"), &link)
            .unwrap();

        assert!(runtime.is_symlink(&link));
        assert!(!runtime.exists(&link));
    }

    #[cfg(unix)]
    #[test]
    fn test_set_link_times_stamps_the_link() {
        use std::os::unix::fs::MetadataExt;

        let runtime = RealRuntime;
        let dir = tempdir().unwrap();
        let target = dir.path().join("pkg.var");
        runtime.write(&target, b"x").unwrap();
        let link = dir.path().join("link.var");
        runtime.symlink(&target, &link).unwrap();

        let modified = SystemTime::UNIX_EPOCH + Duration::from_secs(1_600_000_000);
        runtime.set_link_times(&link, modified, modified).unwrap();

        let meta = std::fs::symlink_metadata(&link).unwrap();
        assert_eq!(meta.mtime(), 1_600_000_000);
    }
}
