//! Package identity: `creator.package.version`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::MalformedName;

/// The version component of a package name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum VersionSpec {
    Exact(u32),
    Latest,
}

impl fmt::Display for VersionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionSpec::Exact(v) => write!(f, "{}", v),
            VersionSpec::Latest => write!(f, "latest"),
        }
    }
}

impl FromStr for VersionSpec {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("latest") {
            return Ok(VersionSpec::Latest);
        }
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(());
        }
        s.parse::<u32>().map(VersionSpec::Exact).map_err(|_| ())
    }
}

/// All versions of one `creator.package`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Lineage {
    pub creator: String,
    pub package: String,
}

impl Lineage {
    pub fn new(creator: impl Into<String>, package: impl Into<String>) -> Self {
        Self {
            creator: creator.into(),
            package: package.into(),
        }
    }

    pub fn at(&self, version: VersionSpec) -> PackageName {
        PackageName {
            lineage: self.clone(),
            version,
        }
    }
}

impl fmt::Display for Lineage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.creator, self.package)
    }
}

/// A well-formed package name. Stored records always carry an exact version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PackageName {
    lineage: Lineage,
    version: VersionSpec,
}

impl PackageName {
    pub fn new(creator: &str, package: &str, version: VersionSpec) -> Self {
        Lineage::new(creator, package).at(version)
    }

    pub fn exact(creator: &str, package: &str, version: u32) -> Self {
        Self::new(creator, package, VersionSpec::Exact(version))
    }

    pub fn creator(&self) -> &str {
        &self.lineage.creator
    }

    pub fn package(&self) -> &str {
        &self.lineage.package
    }

    pub fn version(&self) -> VersionSpec {
        self.version
    }

    pub fn exact_version(&self) -> Option<u32> {
        match self.version {
            VersionSpec::Exact(v) => Some(v),
            VersionSpec::Latest => None,
        }
    }

    pub fn lineage(&self) -> &Lineage {
        &self.lineage
    }

    pub fn same_lineage(&self, other: &PackageName) -> bool {
        self.lineage == other.lineage
    }

    /// `creator.package.latest` for this name's lineage.
    pub fn latest_alias(&self) -> PackageName {
        self.lineage.at(VersionSpec::Latest)
    }

    /// File name of the archive (and of its activation link).
    pub fn file_name(&self) -> String {
        format!("{}.var", self)
    }

    /// Parse the stem of a `*.var` path.
    pub fn from_archive_path(path: &std::path::Path) -> Result<Self, MalformedName> {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| MalformedName(path.display().to_string()))?;
        stem.parse()
    }
}

impl fmt::Display for PackageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.lineage, self.version)
    }
}

impl FromStr for PackageName {
    type Err = MalformedName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || MalformedName(s.to_string());
        let parts: Vec<&str> = s.split('.').collect();
        let [creator, package, version] = parts.as_slice() else {
            return Err(malformed());
        };
        if creator.trim().is_empty() || package.trim().is_empty() {
            return Err(malformed());
        }
        let version = version.parse::<VersionSpec>().map_err(|_| malformed())?;
        Ok(PackageName::new(creator, package, version))
    }
}

impl TryFrom<String> for PackageName {
    type Error = MalformedName;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PackageName> for String {
    fn from(name: PackageName) -> Self {
        name.to_string()
    }
}
