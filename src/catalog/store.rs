use log::debug;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::StoreError;
use crate::package::{ActivationState, AssetEntry, PackageName, PackageRecord};
use crate::runtime::Runtime;

/// Layout version of the stored document.
pub const SNAPSHOT_FORMAT: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyRow {
    pub package: PackageName,
    pub reference: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivationRow {
    pub package: PackageName,
    pub state: ActivationState,
}

/// The persisted form of a catalog: one array per relation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    pub format: u32,
    pub packages: Vec<PackageRecord>,
    #[serde(default)]
    pub dependencies: Vec<DependencyRow>,
    #[serde(default)]
    pub assets: Vec<AssetEntry>,
    #[serde(default)]
    pub activation: Vec<ActivationRow>,
}

/// Durable storage for catalog snapshots.
#[cfg_attr(test, mockall::automock)]
pub trait CatalogStore: Send + Sync {
    /// `None` when nothing has been stored yet.
    fn load(&self) -> Result<Option<CatalogSnapshot>, StoreError>;
    fn save(&self, snapshot: &CatalogSnapshot) -> Result<(), StoreError>;
}

/// Stores the snapshot as a single JSON document.
pub struct JsonCatalogStore<'a, R: Runtime> {
    runtime: &'a R,
    path: PathBuf,
}

impl<'a, R: Runtime> JsonCatalogStore<'a, R> {
    pub fn new(runtime: &'a R, path: PathBuf) -> Self {
        Self { runtime, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl<R: Runtime> CatalogStore for JsonCatalogStore<'_, R> {
    #[tracing::instrument(skip(self))]
    fn load(&self) -> Result<Option<CatalogSnapshot>, StoreError> {
        if !self.runtime.exists(&self.path) {
            debug!("No catalog at {:?}", self.path);
            return Ok(None);
        }
        let content = self
            .runtime
            .read_to_string(&self.path)
            .map_err(|e| StoreError::Io(format!("{:?}: {}", self.path, e)))?;
        let snapshot: CatalogSnapshot = serde_json::from_str(&content)
            .map_err(|e| StoreError::Corrupt(format!("{:?}: {}", self.path, e)))?;
        if snapshot.format != SNAPSHOT_FORMAT {
            return Err(StoreError::Corrupt(format!(
                "{:?}: unsupported format {}",
                self.path, snapshot.format
            )));
        }
        Ok(Some(snapshot))
    }

    #[tracing::instrument(skip(self, snapshot))]
    fn save(&self, snapshot: &CatalogSnapshot) -> Result<(), StoreError> {
        let io = |e: anyhow::Error| StoreError::Io(format!("{:?}: {}", self.path, e));
        let json = serde_json::to_vec_pretty(snapshot)
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;
        if let Some(parent) = self.path.parent() {
            self.runtime.create_dir_all(parent).map_err(io)?;
        }
        let temp = self.temp_path();
        self.runtime.write(&temp, &json).map_err(io)?;
        self.runtime.rename(&temp, &self.path).map_err(io)?;
        debug!(
            "Saved catalog with {} packages to {:?}",
            snapshot.packages.len(),
            self.path
        );
        Ok(())
    }
}
