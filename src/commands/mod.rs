use anyhow::{Context, Result};
use log::debug;

use crate::{
    activation::ItemOutcome,
    catalog::JsonCatalogStore,
    config::{Overrides, Settings},
    package::PackageName,
    repository::Repository,
    runtime::Runtime,
};

mod activate;
mod list;
mod maintain;
mod remove;
mod show;
mod update;

pub use activate::{disable, install, substitute, switch};
pub use list::{ListFilter, list};
pub use maintain::{MissingTarget, missing, rebuild_links, sweep_stale, sweep_superseded};
pub use remove::{delete, uninstall};
pub use show::show;
pub use update::{refresh, update};

pub type CliRepository<'a, R> = Repository<'a, R, JsonCatalogStore<'a, R>>;

/// Resolve settings and open the repository they point at.
#[tracing::instrument(skip(runtime))]
pub fn open<R: Runtime>(runtime: &R, overrides: Overrides) -> Result<(Settings, CliRepository<'_, R>)> {
    let settings = Settings::resolve(runtime, overrides)?;
    debug!("Using settings {:?}", settings);
    let store = JsonCatalogStore::new(runtime, settings.state_file.clone());
    let repo = Repository::open(runtime, store, &settings)
        .with_context(|| format!("Cannot open repository {:?}", settings.repo_root))?;
    Ok((settings, repo))
}

/// Parse exact package names given on the command line.
pub(crate) fn parse_names(raw: &[String]) -> Result<Vec<PackageName>> {
    raw.iter()
        .map(|s| s.parse::<PackageName>().map_err(anyhow::Error::from))
        .collect()
}

/// Ask before a destructive step unless `--yes` was given.
pub(crate) fn confirmed<R: Runtime>(runtime: &R, yes: bool, prompt: &str) -> Result<bool> {
    if yes {
        return Ok(true);
    }
    runtime.confirm(prompt)
}

/// Print one line per batch item and return how many failed.
pub(crate) fn print_outcomes<T>(
    verb: &str,
    outcomes: &[ItemOutcome<T>],
    note: impl Fn(&T) -> Option<&'static str>,
) -> usize {
    let mut failed = 0;
    for outcome in outcomes {
        match &outcome.result {
            Ok(value) => match note(value) {
                Some(note) => println!("{} {} ({})", verb, outcome.name, note),
                None => println!("{} {}", verb, outcome.name),
            },
            Err(e) => {
                failed += 1;
                println!("failed {}: {}", outcome.name, e);
            }
        }
    }
    failed
}

/// Fail the command when some items of a batch failed.
pub(crate) fn check_failures(failed: usize, total: usize) -> Result<()> {
    if failed > 0 {
        anyhow::bail!("{} of {} items failed", failed, total);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::MockRuntime;

    #[test]
    fn test_parse_names() {
        let names = parse_names(&["a.b.1".to_string(), "c.d.latest".to_string()]).unwrap();
        assert_eq!(names[0], PackageName::exact("a", "b", 1));
        assert!(parse_names(&["a.b".to_string()]).is_err());
    }

    #[test]
    fn test_confirmed_skips_prompt_with_yes() {
        let runtime = MockRuntime::new();
        assert!(confirmed(&runtime, true, "sure?").unwrap());
    }

    #[test]
    fn test_confirmed_asks_runtime() {
        let mut runtime = MockRuntime::new();
        runtime.expect_confirm().returning(|_| Ok(false));
        assert!(!confirmed(&runtime, false, "sure?").unwrap());
    }

    #[test]
    fn test_check_failures() {
        assert!(check_failures(0, 3).is_ok());
        let err = check_failures(1, 3).unwrap_err();
        assert_eq!(err.to_string(), "1 of 3 items failed");
    }
}
