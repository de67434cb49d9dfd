use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::STATE_DIR;

pub const QUARANTINE_DIR: &str = "___Quarantine___";
pub const PREVIEW_DIR: &str = "___Previews___";

/// Directory names under the repository root that never hold live archives.
pub const RESERVED_DIRS: &[&str] = &[QUARANTINE_DIR, PREVIEW_DIR, STATE_DIR];

/// Why an archive was moved out of the live repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quarantine {
    /// Bad name, no manifest or unreadable.
    Malformed,
    /// A second copy of an already indexed package.
    Redundant,
    Stale,
    Superseded,
    Deleted,
}

impl Quarantine {
    pub fn dir_name(&self) -> &'static str {
        match self {
            Quarantine::Malformed => "malformed",
            Quarantine::Redundant => "redundant",
            Quarantine::Stale => "stale",
            Quarantine::Superseded => "superseded",
            Quarantine::Deleted => "deleted",
        }
    }
}

impl fmt::Display for Quarantine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Paths inside a repository root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryLayout {
    root: PathBuf,
}

impl RepositoryLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn quarantine_dir(&self, kind: Quarantine) -> PathBuf {
        self.root.join(QUARANTINE_DIR).join(kind.dir_name())
    }

    pub fn preview_dir(&self) -> PathBuf {
        self.root.join(PREVIEW_DIR)
    }

    pub fn archive_path(&self, relative: &Path) -> PathBuf {
        self.root.join(relative)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_paths() {
        let layout = RepositoryLayout::new("/vars");
        assert_eq!(
            layout.quarantine_dir(Quarantine::Stale),
            PathBuf::from("/vars/___Quarantine___/stale")
        );
        assert_eq!(layout.preview_dir(), PathBuf::from("/vars/___Previews___"));
        assert_eq!(
            layout.archive_path(Path::new("bob/bob.scene1.3.var")),
            PathBuf::from("/vars/bob/bob.scene1.3.var")
        );
    }
}
