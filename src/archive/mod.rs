//! Archive indexing: turn a `.var` file into a package record.

mod classify;
mod manifest;
mod zip;

use log::{debug, warn};
use std::path::{Path, PathBuf};

use crate::error::{IndexError, MalformedName};
use crate::package::{AssetCategory, AssetEntry, PackageName, PackageRecord, VersionSpec};
use crate::runtime::Runtime;
use crate::runtime::path::relative_to;

pub use classify::{PluginTally, classify};
pub use manifest::{MANIFEST_ENTRY, scan_references};
pub use self::zip::VarArchive;

/// Everything learned from one archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedArchive {
    pub record: PackageRecord,
    pub assets: Vec<AssetEntry>,
}

/// Reads archives and extracts their preview images.
pub struct ArchiveIndexer<'a, R: Runtime> {
    runtime: &'a R,
    repo_root: PathBuf,
    preview_root: PathBuf,
}

impl<'a, R: Runtime> ArchiveIndexer<'a, R> {
    pub fn new(runtime: &'a R, repo_root: PathBuf, preview_root: PathBuf) -> Self {
        Self {
            runtime,
            repo_root,
            preview_root,
        }
    }

    /// Directory holding the previews of `name` in `category`.
    pub fn preview_dir(&self, category: AssetCategory, name: &PackageName) -> PathBuf {
        self.preview_root
            .join(category.dir_name())
            .join(name.to_string())
    }

    /// Index one archive. The file itself is never modified.
    #[tracing::instrument(skip(self))]
    pub fn index(&self, archive: &Path) -> Result<IndexedArchive, IndexError> {
        let name = PackageName::from_archive_path(archive)?;
        if name.version() == VersionSpec::Latest {
            return Err(MalformedName(name.to_string()).into());
        }

        let info = self.runtime.metadata(archive).map_err(|e| IndexError::Io {
            path: archive.to_path_buf(),
            reason: e.to_string(),
        })?;

        let mut var = VarArchive::open(self.runtime, archive)?;
        let (manifest, manifest_date) = var.manifest()?;
        let dependencies = scan_references(&manifest);

        let relative_path =
            relative_to(archive, &self.repo_root).unwrap_or_else(|| archive.to_path_buf());
        let mut record = PackageRecord::new(name.clone(), relative_path);
        record.manifest_date = manifest_date;
        record.size_bytes = info.size;
        record.dependencies = dependencies;

        let mut plugins = PluginTally::default();
        let mut assets = Vec::new();
        for entry in var.entries()? {
            plugins.observe(&entry);
            let Some((category, is_preset)) = classify(&entry) else {
                continue;
            };
            let ordinal = record.counts.bump(category);
            let preview_image = self.extract_preview(&mut var, &name, &entry, category, ordinal);
            assets.push(AssetEntry {
                owner: name.clone(),
                category,
                archive_path: entry,
                is_preset,
                preview_image,
            });
        }
        record.counts.plugins = plugins.count();

        debug!(
            "Indexed {}: {} assets, {} dependencies",
            name,
            assets.len(),
            record.dependencies.len()
        );
        Ok(IndexedArchive { record, assets })
    }

    /// Copy the `.jpg` sitting next to `entry` into the preview area.
    /// Returns the preview file name, or `None` when there is no image.
    fn extract_preview(
        &self,
        var: &mut VarArchive,
        name: &PackageName,
        entry: &str,
        category: AssetCategory,
        ordinal: u32,
    ) -> Option<String> {
        let (stem, _) = entry.rsplit_once('.')?;
        let jpg_entry = var.find(&format!("{}.jpg", stem))?.to_string();
        let jpg_stem = Path::new(&jpg_entry)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("preview")
            .to_lowercase();
        let file_name = format!("{}{:03}_{}.jpg", category.dir_name(), ordinal, jpg_stem);

        let dir = self.preview_dir(category, name);
        let dest = dir.join(&file_name);
        if self.runtime.exists(&dest) {
            return Some(file_name);
        }
        let extracted = self
            .runtime
            .create_dir_all(&dir)
            .and_then(|_| var.extract_entry(self.runtime, &jpg_entry, &dest));
        match extracted {
            Ok(()) => Some(file_name),
            Err(e) => {
                warn!("Cannot extract preview {} of {}: {}", jpg_entry, name, e);
                None
            }
        }
    }

    /// Delete every preview image of `name`.
    pub fn discard_previews(&self, name: &PackageName) {
        for category in AssetCategory::ALL {
            let dir = self.preview_dir(category, name);
            if self.runtime.is_dir(&dir)
                && let Err(e) = self.runtime.remove_dir_all(&dir)
            {
                warn!("Cannot remove previews at {:?}: {}", dir, e);
            }
        }
    }
}
