//! Package model
//!
//! This module provides package identity, indexed records, version
//! resolution and archive discovery.

mod discovery;
mod name;
mod record;
mod version;

pub use discovery::{find_all_archives, is_archive};
pub use name::{Lineage, PackageName, VersionSpec};
pub use record::{ActivationState, AssetCategory, AssetEntry, ContentCounts, PackageRecord};
pub use version::{APPROXIMATE_MARKER, ApproximationPolicy, Resolution, VersionResolver};
