use log::debug;
use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use zip::ZipArchive;

use crate::error::IndexError;
use crate::runtime::{ReadSeek, Runtime};

use super::manifest::MANIFEST_ENTRY;

/// Read access to one `.var` archive.
pub struct VarArchive {
    path: PathBuf,
    zip: ZipArchive<Box<dyn ReadSeek>>,
    /// Lowercased entry name -> entry name as stored.
    names: HashMap<String, String>,
}

impl VarArchive {
    #[tracing::instrument(skip(runtime))]
    pub fn open<R: Runtime>(runtime: &R, path: &Path) -> Result<Self, IndexError> {
        let reader = runtime.open_seekable(path).map_err(|e| IndexError::Io {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let zip = ZipArchive::new(reader).map_err(|e| IndexError::Archive {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let names = zip
            .file_names()
            .map(|n| (n.to_lowercase(), n.to_string()))
            .collect();
        Ok(Self {
            path: path.to_path_buf(),
            zip,
            names,
        })
    }

    /// File entries (directories excluded), in archive order.
    pub fn entries(&mut self) -> Result<Vec<String>, IndexError> {
        let mut out = Vec::with_capacity(self.zip.len());
        for i in 0..self.zip.len() {
            let entry = self.zip.by_index(i).map_err(|e| IndexError::Archive {
                path: self.path.clone(),
                reason: e.to_string(),
            })?;
            if !entry.is_dir() {
                out.push(entry.name().to_string());
            }
        }
        Ok(out)
    }

    /// Manifest text and its modification stamp (`YYYY-MM-DD HH:MM:SS`).
    pub fn manifest(&mut self) -> Result<(String, Option<String>), IndexError> {
        let mut entry = match self.zip.by_name(MANIFEST_ENTRY) {
            Ok(entry) => entry,
            Err(zip::result::ZipError::FileNotFound) => {
                return Err(IndexError::MissingManifest(self.path.clone()));
            }
            Err(e) => {
                return Err(IndexError::Archive {
                    path: self.path.clone(),
                    reason: e.to_string(),
                });
            }
        };
        let date = entry.last_modified().map(|dt| {
            format!(
                "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
                dt.year(),
                dt.month(),
                dt.day(),
                dt.hour(),
                dt.minute(),
                dt.second()
            )
        });
        let mut bytes = Vec::new();
        entry
            .read_to_end(&mut bytes)
            .map_err(|e| IndexError::Archive {
                path: self.path.clone(),
                reason: format!("cannot read {}: {}", MANIFEST_ENTRY, e),
            })?;
        Ok((String::from_utf8_lossy(&bytes).into_owned(), date))
    }

    /// Stored name of `entry`, matched case-insensitively.
    pub fn find(&self, entry: &str) -> Option<&str> {
        self.names.get(&entry.to_lowercase()).map(String::as_str)
    }

    /// Copy `entry` out to `dest`. Parent directories must exist.
    pub fn extract_entry<R: Runtime>(
        &mut self,
        runtime: &R,
        entry: &str,
        dest: &Path,
    ) -> anyhow::Result<()> {
        let mut file = self.zip.by_name(entry)?;
        let mut out = runtime.create_file(dest)?;
        std::io::copy(&mut file, &mut out)?;
        debug!("Extracted {} to {:?}", entry, dest);
        Ok(())
    }
}
