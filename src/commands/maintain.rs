use anyhow::Result;
use log::debug;
use std::path::Path;

use crate::{
    closure::DownloadLocator,
    locator::TableLocator,
    package::APPROXIMATE_MARKER,
    repository::MissingScope,
    report::Reporter,
    runtime::Runtime,
};

use super::{CliRepository, parse_names, remove::print_sweep};

/// Which packages `vpm missing` looks at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MissingTarget {
    Installed,
    All,
    Packages(Vec<String>),
}

/// Print unresolved and approximately resolved dependencies
#[tracing::instrument(skip(runtime, repo, reporter))]
pub fn missing<R: Runtime>(
    runtime: &R,
    repo: &CliRepository<'_, R>,
    target: MissingTarget,
    downloads: Option<&Path>,
    reporter: &dyn Reporter,
) -> Result<()> {
    let scope = match target {
        MissingTarget::Installed => MissingScope::Installed,
        MissingTarget::All => MissingScope::All,
        MissingTarget::Packages(names) => MissingScope::Packages(parse_names(&names)?),
    };
    let locator = match downloads {
        Some(path) => {
            debug!("Loading download table from {:?}", path);
            Some(TableLocator::load(runtime, path)?)
        }
        None => None,
    };
    let report = repo.missing_dependencies(
        &scope,
        locator.as_ref().map(|l| l as &dyn DownloadLocator),
        reporter,
    )?;

    if report.is_empty() {
        println!("All dependencies are present.");
        return Ok(());
    }
    for entry in &report.missing {
        match &entry.download {
            Some(download) => println!("missing {} ({})", entry.reference, download),
            None => println!("missing {}", entry.reference),
        }
    }
    for (reference, resolved) in &report.approximate {
        println!(
            "approximate {} -> {}{}",
            reference, resolved, APPROXIMATE_MARKER
        );
    }
    Ok(())
}

/// Move old, unused versions to quarantine
#[tracing::instrument(skip(repo, reporter))]
pub fn sweep_stale<R: Runtime>(repo: &CliRepository<'_, R>, reporter: &dyn Reporter) -> Result<()> {
    let report = repo.sweep_stale(reporter)?;
    print_sweep(&report)
}

/// Switch installed old versions to the latest and quarantine them
#[tracing::instrument(skip(repo, reporter))]
pub fn sweep_superseded<R: Runtime>(
    repo: &CliRepository<'_, R>,
    reporter: &dyn Reporter,
) -> Result<()> {
    let report = repo.sweep_superseded(reporter)?;
    print_sweep(&report)
}

/// Point every link at the current location of its archive
#[tracing::instrument(skip(repo, reporter))]
pub fn rebuild_links<R: Runtime>(
    repo: &CliRepository<'_, R>,
    alternate_root: Option<&Path>,
    include_missing: bool,
    reporter: &dyn Reporter,
) -> Result<()> {
    let report = repo.rebuild_links(alternate_root, include_missing, reporter)?;
    for name in &report.restored {
        println!("restored {}", name);
    }
    for path in &report.orphaned {
        println!("orphaned {}", path.display());
    }
    for (path, reason) in &report.failed {
        println!("failed {}: {}", path.display(), reason);
    }
    println!(
        "{} relinked, {} restored, {} orphaned, {} failed",
        report.relinked.len(),
        report.restored.len(),
        report.orphaned.len(),
        report.failed.len()
    );
    Ok(())
}
