use anyhow::Result;
use log::debug;

use crate::runtime::Runtime;

use super::CliRepository;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListFilter {
    /// Only packages with a link in the activation root.
    pub active_only: bool,
    /// Case-insensitive substring of the package name.
    pub pattern: Option<String>,
}

impl ListFilter {
    fn matches(&self, name: &str, active: bool) -> bool {
        if self.active_only && !active {
            return false;
        }
        match &self.pattern {
            Some(pattern) => name
                .to_ascii_lowercase()
                .contains(&pattern.to_ascii_lowercase()),
            None => true,
        }
    }
}

/// List cataloged packages with their activation state
#[tracing::instrument(skip(repo))]
pub fn list<R: Runtime>(repo: &CliRepository<'_, R>, filter: &ListFilter) -> Result<()> {
    let catalog = repo.read()?;
    if catalog.is_empty() {
        println!("No packages in the repository. Run `vpm update` first.");
        return Ok(());
    }
    debug!("Listing {} package(s)", catalog.len());

    let mut shown = 0;
    for record in catalog.records() {
        let state = catalog.activation(&record.name);
        let name = record.name.to_string();
        if !filter.matches(&name, state.is_active()) {
            continue;
        }
        let latest = if catalog.is_latest(&record.name) {
            ""
        } else {
            " (old)"
        };
        println!("{} {}{}", name, state, latest);
        shown += 1;
    }
    if shown == 0 {
        println!("No matching packages.");
    }
    Ok(())
}
