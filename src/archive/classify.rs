//! Classification of archive entries into asset categories.

use crate::package::AssetCategory;

/// Whether an entry matching a rule is a preset.
#[derive(Debug, Clone, Copy)]
enum Preset {
    Never,
    Always,
    /// Preset when the entry has this extension.
    When(&'static str),
}

struct Rule {
    /// Lowercased directory prefixes; any one may match.
    prefixes: &'static [&'static str],
    /// Lowercased extensions, without the dot.
    extensions: &'static [&'static str],
    category: AssetCategory,
    preset: Preset,
}

impl Rule {
    fn matches(&self, path: &str, ext: &str) -> bool {
        self.prefixes.iter().any(|p| path.starts_with(p)) && self.extensions.contains(&ext)
    }

    fn is_preset(&self, ext: &str) -> bool {
        match self.preset {
            Preset::Never => false,
            Preset::Always => true,
            Preset::When(e) => e == ext,
        }
    }
}

/// Ordered rule table. When several rules match, the last one wins.
const RULES: &[Rule] = &[
    Rule {
        prefixes: &["saves/scene/"],
        extensions: &["json"],
        category: AssetCategory::Scene,
        preset: Preset::Never,
    },
    Rule {
        prefixes: &["saves/person/appearance/"],
        extensions: &["json", "vac"],
        category: AssetCategory::Look,
        preset: Preset::When("json"),
    },
    Rule {
        prefixes: &[
            "custom/atom/person/appearance/",
            "custom/atom/person/general/",
        ],
        extensions: &["json", "vap"],
        category: AssetCategory::Look,
        preset: Preset::Always,
    },
    Rule {
        prefixes: &["custom/clothing/"],
        extensions: &["vam", "vap"],
        category: AssetCategory::Clothing,
        preset: Preset::Never,
    },
    Rule {
        prefixes: &["custom/atom/person/clothing/"],
        extensions: &["vam", "vap"],
        category: AssetCategory::Clothing,
        preset: Preset::When("vap"),
    },
    Rule {
        prefixes: &["custom/hair/"],
        extensions: &["vam", "vap"],
        category: AssetCategory::Hairstyle,
        preset: Preset::Never,
    },
    Rule {
        prefixes: &["custom/atom/person/hair/"],
        extensions: &["vam", "vap"],
        category: AssetCategory::Hairstyle,
        preset: Preset::When("vap"),
    },
    Rule {
        prefixes: &["custom/assets/"],
        extensions: &["assetbundle"],
        category: AssetCategory::Asset,
        preset: Preset::Never,
    },
    Rule {
        prefixes: &["custom/atom/person/morphs/"],
        extensions: &["vmi", "vap"],
        category: AssetCategory::Morph,
        preset: Preset::When("vap"),
    },
    Rule {
        prefixes: &["custom/atom/person/pose/"],
        extensions: &["vap"],
        category: AssetCategory::Pose,
        preset: Preset::Always,
    },
    Rule {
        prefixes: &["saves/person/pose/"],
        extensions: &["json", "vac"],
        category: AssetCategory::Pose,
        preset: Preset::When("json"),
    },
    Rule {
        prefixes: &["custom/atom/person/skin/"],
        extensions: &["vap"],
        category: AssetCategory::Skin,
        preset: Preset::Always,
    },
];

const SCRIPT_DIRS: &[&str] = &["custom/scripts/", "custom/atom/person/scripts/"];

fn split_ext(path: &str) -> (String, String) {
    let lower = path.replace('\\', "/").to_ascii_lowercase();
    let ext = lower
        .rsplit_once('/')
        .map_or(lower.as_str(), |(_, file)| file)
        .rsplit_once('.')
        .map(|(_, e)| e.to_string())
        .unwrap_or_default();
    (lower, ext)
}

/// Classify one archive entry path. Returns the category and preset flag,
/// or `None` when no rule matches.
pub fn classify(entry_path: &str) -> Option<(AssetCategory, bool)> {
    let (path, ext) = split_ext(entry_path);
    RULES
        .iter()
        .rev()
        .find(|rule| rule.matches(&path, &ext))
        .map(|rule| (rule.category, rule.is_preset(&ext)))
}

/// Tallies plugin scripts while walking an archive.
#[derive(Debug, Default)]
pub struct PluginTally {
    cs: u32,
    cslist: u32,
}

impl PluginTally {
    pub fn observe(&mut self, entry_path: &str) {
        let (path, ext) = split_ext(entry_path);
        if !SCRIPT_DIRS.iter().any(|d| path.starts_with(d)) {
            return;
        }
        match ext.as_str() {
            "cslist" => self.cslist += 1,
            "cs" => self.cs += 1,
            _ => {}
        }
    }

    /// Script lists stand for whole plugins; loose sources only count when
    /// there is no list.
    pub fn count(&self) -> u32 {
        if self.cslist > 0 { self.cslist } else { self.cs }
    }
}
