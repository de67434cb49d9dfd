use std::path::{Path, PathBuf};

use crate::package::PackageName;

/// Directory under the activation root that holds the links.
pub const LINK_DIR: &str = "___VarsLink___";

/// Where links whose package is gone are parked.
pub const MISSING_DIR: &str = "___MissingVarLink___";

/// Suffix of the marker file that disables a link.
pub const DISABLED_SUFFIX: &str = ".disabled";

/// Paths inside an activation root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationLayout {
    root: PathBuf,
}

impl ActivationLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn link_dir(&self) -> PathBuf {
        self.root.join(LINK_DIR)
    }

    pub fn missing_dir(&self) -> PathBuf {
        self.root.join(MISSING_DIR)
    }

    /// Where a fresh link for `name` is created.
    pub fn link_path(&self, name: &PackageName) -> PathBuf {
        self.link_dir().join(name.file_name())
    }

    /// Where a parked or substitute link for `name` lives.
    pub fn missing_path(&self, name: &PackageName) -> PathBuf {
        self.missing_dir().join(name.file_name())
    }

    /// The disable marker belonging to `link`.
    pub fn marker_for(link: &Path) -> PathBuf {
        let mut s = link.as_os_str().to_os_string();
        s.push(DISABLED_SUFFIX);
        PathBuf::from(s)
    }
}
