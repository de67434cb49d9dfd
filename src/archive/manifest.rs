//! Dependency references embedded in manifest text.

use regex::Regex;
use std::sync::OnceLock;

/// Name of the manifest entry inside every archive.
pub const MANIFEST_ENTRY: &str = "meta.json";

/// Matches a quoted `"creator.package.version"` key followed by a colon.
///
/// Creator is 1-60 chars, package 1-80 chars, neither containing a quote,
/// colon, dot or line break; version is digits or `latest`.
fn reference_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r#""(([^\r\n":.]{1,60})\.([^\r\n":.]{1,80})\.(\d+|latest))("?\s*):"#,
        )
        .unwrap()
    })
}

/// Extract the distinct dependency references mentioned in `text`, sorted.
///
/// A reference may be prefixed with a path (`sub/dir/creator.pkg.1`); only
/// the part after the last `/` counts.
pub fn scan_references(text: &str) -> Vec<String> {
    let mut refs: Vec<String> = reference_pattern()
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| {
            let s = m.as_str();
            s.rsplit_once('/').map_or(s, |(_, tail)| tail).to_string()
        })
        .collect();
    refs.sort();
    refs.dedup();
    refs
}
