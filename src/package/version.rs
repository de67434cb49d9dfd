//! Version resolution for dependency references.
//!
//! This module provides pure functions that pick a concrete version out of
//! the versions a lineage has on hand.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use super::name::{PackageName, VersionSpec};

/// Suffix marking a name that only approximately satisfies its reference.
pub const APPROXIMATE_MARKER: char = '$';

/// What to do when a reference names an exact version that is not present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ApproximationPolicy {
    /// Only the exact version satisfies the reference.
    Strict,
    /// The smallest present version at or above the request, else the highest.
    #[default]
    ClosestAtLeast,
    /// Always the highest present version.
    Newest,
}

/// The outcome of resolving one reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Exact(PackageName),
    Approximate {
        requested: PackageName,
        resolved: PackageName,
    },
    Missing,
}

impl Resolution {
    /// The concrete package chosen, if any.
    pub fn package(&self) -> Option<&PackageName> {
        match self {
            Resolution::Exact(name) => Some(name),
            Resolution::Approximate { resolved, .. } => Some(resolved),
            Resolution::Missing => None,
        }
    }

    pub fn is_approximate(&self) -> bool {
        matches!(self, Resolution::Approximate { .. })
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::Exact(name) => write!(f, "{}", name),
            Resolution::Approximate { resolved, .. } => {
                write!(f, "{}{}", resolved, APPROXIMATE_MARKER)
            }
            Resolution::Missing => write!(f, "missing"),
        }
    }
}

/// Version resolver - pure functions for version resolution.
///
/// All methods are stateless and operate on the set of versions present
/// for one lineage.
pub struct VersionResolver;

impl VersionResolver {
    /// Resolve `reference` against the versions present for its lineage.
    pub fn resolve(
        reference: &PackageName,
        present: &BTreeSet<u32>,
        policy: ApproximationPolicy,
    ) -> Resolution {
        let Some(latest) = Self::find_latest(present) else {
            return Resolution::Missing;
        };
        let requested = match reference.version() {
            VersionSpec::Latest => {
                return Resolution::Exact(reference.lineage().at(VersionSpec::Exact(latest)));
            }
            VersionSpec::Exact(v) => v,
        };
        if present.contains(&requested) {
            return Resolution::Exact(reference.clone());
        }

        let chosen = match policy {
            ApproximationPolicy::Strict => return Resolution::Missing,
            ApproximationPolicy::ClosestAtLeast => {
                Self::find_at_least(present, requested).unwrap_or(latest)
            }
            ApproximationPolicy::Newest => latest,
        };
        Resolution::Approximate {
            requested: reference.clone(),
            resolved: reference.lineage().at(VersionSpec::Exact(chosen)),
        }
    }

    pub fn find_latest(present: &BTreeSet<u32>) -> Option<u32> {
        present.last().copied()
    }

    /// Smallest present version `>= floor`.
    pub fn find_at_least(present: &BTreeSet<u32>, floor: u32) -> Option<u32> {
        present.range(floor..).next().copied()
    }

    /// Whether `name` is the newest version of its lineage.
    ///
    /// A `latest` alias is never itself latest; only exact versions are
    /// comparable.
    pub fn is_latest(name: &PackageName, present: &BTreeSet<u32>) -> bool {
        match (name.exact_version(), Self::find_latest(present)) {
            (Some(v), Some(max)) => v >= max,
            (Some(_), None) => true,
            (None, _) => false,
        }
    }
}
