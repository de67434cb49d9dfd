//! Error taxonomy shared by the engine's layers.
//!
//! Per-item failures (a bad archive, a link the filesystem refused) are
//! values carried inside batch reports. Only [`StoreError`] is allowed to
//! abort an enclosing batch.

use std::path::PathBuf;
use thiserror::Error;

use crate::package::{ActivationState, PackageName};

/// A string that does not split into `creator.package.version`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("malformed package name {0:?}: expected creator.package.(version|latest)")]
pub struct MalformedName(pub String);

/// Why an archive could not be turned into a package record.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error(transparent)]
    MalformedName(#[from] MalformedName),

    /// The archive has no manifest; it belongs in quarantine, not in a retry loop.
    #[error("{0:?} has no meta.json manifest")]
    MissingManifest(PathBuf),

    #[error("{path:?} is not a readable archive: {reason}")]
    Archive { path: PathBuf, reason: String },

    #[error("I/O error on {path:?}: {reason}")]
    Io { path: PathBuf, reason: String },
}

impl IndexError {
    /// Archive-level rejections are quarantined; I/O failures are not.
    pub fn should_quarantine(&self) -> bool {
        !matches!(self, IndexError::Io { .. })
    }
}

/// Failure of a single activation transition.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ActivationError {
    #[error("cannot create activation link for {name}: {reason}")]
    LinkCreationFailed { name: PackageName, reason: String },

    #[error("cannot remove activation link for {name}: {reason}")]
    LinkRemovalFailed { name: PackageName, reason: String },

    #[error("{name} cannot go from {from} to {to}")]
    IllegalTransition {
        name: PackageName,
        from: ActivationState,
        to: ActivationState,
    },

    #[error("{name} conflicts with active version {active}")]
    LineageConflict {
        name: PackageName,
        active: PackageName,
    },

    #[error("source archive for {name} not found at {path:?}")]
    SourceMissing { name: PackageName, path: PathBuf },

    #[error("{0} is not in the catalog")]
    UnknownPackage(String),
}

/// Catalog store failures. These mean the ground truth itself is unreliable.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("catalog store I/O failed: {0}")]
    Io(String),

    #[error("catalog store is corrupt: {0}")]
    Corrupt(String),

    #[error("catalog constraint violated: {0}")]
    Constraint(String),
}
