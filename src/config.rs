//! Settings: command-line values layered over an optional config file.

use anyhow::{Context, Result, bail};
use log::debug;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::package::ApproximationPolicy;
use crate::runtime::Runtime;

/// Directory under the repository root holding engine state.
pub const STATE_DIR: &str = ".vpm";

/// Contents of `<config_dir>/vpm/config.json`. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub repo: Option<PathBuf>,
    pub activation_root: Option<PathBuf>,
    pub state: Option<PathBuf>,
    pub policy: Option<ApproximationPolicy>,
    pub downloads: Option<PathBuf>,
}

impl FileConfig {
    pub fn path<R: Runtime>(runtime: &R) -> Option<PathBuf> {
        runtime
            .config_dir()
            .map(|dir| dir.join("vpm").join("config.json"))
    }

    #[tracing::instrument(skip(runtime))]
    pub fn load<R: Runtime>(runtime: &R, path: &Path) -> Result<Self> {
        if !runtime.exists(path) {
            debug!("No config file at {:?}", path);
            return Ok(Self::default());
        }
        let content = runtime.read_to_string(path)?;
        serde_json::from_str(&content).with_context(|| format!("Invalid config file {:?}", path))
    }
}

/// Values given on the command line or through the environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    pub repo: Option<PathBuf>,
    pub activation_root: Option<PathBuf>,
    pub state: Option<PathBuf>,
    pub policy: Option<ApproximationPolicy>,
    pub downloads: Option<PathBuf>,
}

/// Fully resolved settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub repo_root: PathBuf,
    pub activation_root: PathBuf,
    pub state_file: PathBuf,
    pub policy: ApproximationPolicy,
    /// Optional table of download references for missing packages.
    pub downloads: Option<PathBuf>,
}

impl Settings {
    /// Command-line values win over file values.
    pub fn merge(overrides: Overrides, file: FileConfig) -> Result<Self> {
        let Some(repo_root) = overrides.repo.or(file.repo) else {
            bail!("No repository root configured (use --repo or VPM_REPO)");
        };
        let Some(activation_root) = overrides.activation_root.or(file.activation_root) else {
            bail!("No activation root configured (use --activation-root or VPM_ACTIVATION_ROOT)");
        };
        let state_file = overrides
            .state
            .or(file.state)
            .unwrap_or_else(|| repo_root.join(STATE_DIR).join("catalog.json"));
        Ok(Self {
            repo_root,
            activation_root,
            state_file,
            policy: overrides.policy.or(file.policy).unwrap_or_default(),
            downloads: overrides.downloads.or(file.downloads),
        })
    }

    /// Read the config file (if any) and apply `overrides` on top.
    pub fn resolve<R: Runtime>(runtime: &R, overrides: Overrides) -> Result<Self> {
        let file = match FileConfig::path(runtime) {
            Some(path) => FileConfig::load(runtime, &path)?,
            None => FileConfig::default(),
        };
        Self::merge(overrides, file)
    }
}
