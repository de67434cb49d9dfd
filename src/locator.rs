//! Download references for packages that are not in the repository.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::Path;

use crate::closure::DownloadLocator;
use crate::package::PackageName;
use crate::runtime::Runtime;

/// A JSON table mapping either a full reference (`creator.package.version`)
/// or a lineage (`creator.package`) to where it can be downloaded.
#[derive(Debug, Default, Clone)]
pub struct TableLocator {
    table: HashMap<String, String>,
}

impl TableLocator {
    pub fn new(table: HashMap<String, String>) -> Self {
        Self { table }
    }

    #[tracing::instrument(skip(runtime))]
    pub fn load<R: Runtime>(runtime: &R, path: &Path) -> Result<Self> {
        let content = runtime.read_to_string(path)?;
        let table = serde_json::from_str(&content)
            .with_context(|| format!("Invalid download table {:?}", path))?;
        Ok(Self { table })
    }
}

impl DownloadLocator for TableLocator {
    fn locate(&self, reference: &str) -> Option<String> {
        if let Some(hit) = self.table.get(reference) {
            return Some(hit.clone());
        }
        let name = reference.parse::<PackageName>().ok()?;
        self.table.get(&name.lineage().to_string()).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_then_lineage() {
        let locator = TableLocator::new(HashMap::from([
            ("alice.hair1.2".to_string(), "https://a/2".to_string()),
            ("alice.hair1".to_string(), "https://a".to_string()),
        ]));
        assert_eq!(locator.locate("alice.hair1.2").as_deref(), Some("https://a/2"));
        assert_eq!(locator.locate("alice.hair1.7").as_deref(), Some("https://a"));
        assert_eq!(locator.locate("bob.x.1"), None);
        assert_eq!(locator.locate("nonsense"), None);
    }
}
