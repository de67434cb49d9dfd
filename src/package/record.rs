use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use super::name::PackageName;

/// Kinds of content an archive can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetCategory {
    Scene,
    Look,
    Clothing,
    Hairstyle,
    Asset,
    Morph,
    Pose,
    Skin,
}

impl AssetCategory {
    pub const ALL: [AssetCategory; 8] = [
        AssetCategory::Scene,
        AssetCategory::Look,
        AssetCategory::Clothing,
        AssetCategory::Hairstyle,
        AssetCategory::Asset,
        AssetCategory::Morph,
        AssetCategory::Pose,
        AssetCategory::Skin,
    ];

    /// Directory name used for this category's preview images.
    pub fn dir_name(&self) -> &'static str {
        match self {
            AssetCategory::Scene => "scenes",
            AssetCategory::Look => "looks",
            AssetCategory::Clothing => "clothing",
            AssetCategory::Hairstyle => "hairstyle",
            AssetCategory::Asset => "assets",
            AssetCategory::Morph => "morphs",
            AssetCategory::Pose => "pose",
            AssetCategory::Skin => "skin",
        }
    }
}

impl fmt::Display for AssetCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Per-category content counts of one archive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentCounts {
    pub scenes: u32,
    pub looks: u32,
    pub clothing: u32,
    pub hairstyles: u32,
    pub assets: u32,
    pub morphs: u32,
    pub poses: u32,
    pub skins: u32,
    pub plugins: u32,
}

impl ContentCounts {
    pub fn get(&self, category: AssetCategory) -> u32 {
        match category {
            AssetCategory::Scene => self.scenes,
            AssetCategory::Look => self.looks,
            AssetCategory::Clothing => self.clothing,
            AssetCategory::Hairstyle => self.hairstyles,
            AssetCategory::Asset => self.assets,
            AssetCategory::Morph => self.morphs,
            AssetCategory::Pose => self.poses,
            AssetCategory::Skin => self.skins,
        }
    }

    /// Count one more entry of `category`; returns the new count.
    pub fn bump(&mut self, category: AssetCategory) -> u32 {
        let slot = match category {
            AssetCategory::Scene => &mut self.scenes,
            AssetCategory::Look => &mut self.looks,
            AssetCategory::Clothing => &mut self.clothing,
            AssetCategory::Hairstyle => &mut self.hairstyles,
            AssetCategory::Asset => &mut self.assets,
            AssetCategory::Morph => &mut self.morphs,
            AssetCategory::Pose => &mut self.poses,
            AssetCategory::Skin => &mut self.skins,
        };
        *slot += 1;
        *slot
    }

    /// Plugins with no scene or look to go with them.
    pub fn is_plugin_only(&self) -> bool {
        self.plugins > 0 && self.scenes == 0 && self.looks == 0
    }
}

/// One indexed archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRecord {
    pub name: PackageName,
    /// Archive location relative to the repository root.
    pub relative_path: PathBuf,
    /// Manifest modification stamp, `YYYY-MM-DD HH:MM:SS`.
    pub manifest_date: Option<String>,
    pub size_bytes: u64,
    #[serde(flatten)]
    pub counts: ContentCounts,
    /// Dependency references exactly as the manifest spells them.
    #[serde(skip)]
    pub dependencies: Vec<String>,
}

impl PackageRecord {
    pub fn new(name: PackageName, relative_path: impl Into<PathBuf>) -> Self {
        Self {
            name,
            relative_path: relative_path.into(),
            manifest_date: None,
            size_bytes: 0,
            counts: ContentCounts::default(),
            dependencies: Vec::new(),
        }
    }

    pub fn with_dependencies<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = deps.into_iter().map(Into::into).collect();
        self
    }
}

/// A classified entry inside an archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetEntry {
    pub owner: PackageName,
    pub category: AssetCategory,
    pub archive_path: String,
    pub is_preset: bool,
    /// Preview file name under `<previews>/<category>/<owner>/`.
    pub preview_image: Option<String>,
}

/// Activation state of a package in the activation root.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActivationState {
    #[default]
    NotInstalled,
    Installed,
    Disabled,
}

impl ActivationState {
    pub fn is_active(&self) -> bool {
        !matches!(self, ActivationState::NotInstalled)
    }
}

impl fmt::Display for ActivationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActivationState::NotInstalled => write!(f, "not-installed"),
            ActivationState::Installed => write!(f, "installed"),
            ActivationState::Disabled => write!(f, "disabled"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_bump_and_get() {
        let mut counts = ContentCounts::default();
        assert_eq!(counts.bump(AssetCategory::Look), 1);
        assert_eq!(counts.bump(AssetCategory::Look), 2);
        assert_eq!(counts.bump(AssetCategory::Pose), 1);
        assert_eq!(counts.get(AssetCategory::Look), 2);
        assert_eq!(counts.get(AssetCategory::Scene), 0);
    }

    #[test]
    fn test_plugin_only() {
        let mut counts = ContentCounts {
            plugins: 2,
            ..Default::default()
        };
        assert!(counts.is_plugin_only());
        counts.bump(AssetCategory::Scene);
        assert!(!counts.is_plugin_only());
        assert!(!ContentCounts::default().is_plugin_only());
    }

    #[test]
    fn test_category_dir_names_are_distinct() {
        let mut names: Vec<_> = AssetCategory::ALL.iter().map(|c| c.dir_name()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), AssetCategory::ALL.len());
    }

    #[test]
    fn test_record_serializes_flat_counts() {
        let mut record = PackageRecord::new(PackageName::exact("bob", "scene1", 3), "bob/bob.scene1.3.var")
            .with_dependencies(["alice.hair1.2"]);
        record.counts.scenes = 1;
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["name"], "bob.scene1.3");
        assert_eq!(json["scenes"], 1);
        assert!(json.get("dependencies").is_none());
    }

    #[test]
    fn test_activation_state_display() {
        assert_eq!(ActivationState::NotInstalled.to_string(), "not-installed");
        assert!(ActivationState::Disabled.is_active());
        assert!(!ActivationState::NotInstalled.is_active());
    }
}
