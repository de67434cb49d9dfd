use anyhow::Result;

use crate::{
    activation::InstallOutcome,
    package::{APPROXIMATE_MARKER, PackageName},
    report::Reporter,
    runtime::Runtime,
};

use super::{CliRepository, check_failures, parse_names, print_outcomes};

/// Install packages by reference; `latest` and missing versions are
/// resolved through the configured policy.
#[tracing::instrument(skip(repo, reporter))]
pub fn install<R: Runtime>(
    repo: &CliRepository<'_, R>,
    references: &[String],
    with_dependencies: bool,
    reporter: &dyn Reporter,
) -> Result<()> {
    let report = repo.install(references, with_dependencies, reporter)?;

    for (reference, name) in &report.approximate {
        println!("{} resolved to {}{}", reference, name, APPROXIMATE_MARKER);
    }
    let failed = print_outcomes("installed", &report.outcomes, |outcome| match outcome {
        InstallOutcome::Installed => None,
        InstallOutcome::AlreadyInstalled => Some("already installed"),
    });
    for reference in &report.unresolved {
        println!("missing {}", reference);
    }
    check_failures(failed, report.outcomes.len())
}

#[tracing::instrument(skip(repo, reporter))]
pub fn disable<R: Runtime>(
    repo: &CliRepository<'_, R>,
    names: &[String],
    reporter: &dyn Reporter,
) -> Result<()> {
    let names = parse_names(names)?;
    let outcomes = repo.disable(&names, reporter)?;
    let failed = print_outcomes("disabled", &outcomes, |_| None);
    check_failures(failed, outcomes.len())
}

/// Move the activation from one version to another of the same package.
#[tracing::instrument(skip(repo))]
pub fn switch<R: Runtime>(repo: &CliRepository<'_, R>, old: &str, new: &str) -> Result<()> {
    let old: PackageName = old.parse()?;
    let new: PackageName = new.parse()?;
    repo.switch_version(&old, &new)?;
    println!("switched {} to {}", old, new);
    Ok(())
}

/// Link another package's archive in place of a missing reference.
#[tracing::instrument(skip(repo))]
pub fn substitute<R: Runtime>(
    repo: &CliRepository<'_, R>,
    reference: &str,
    substitute: &str,
) -> Result<()> {
    let reference: PackageName = reference.parse()?;
    let substitute: PackageName = substitute.parse()?;
    let (used, link) = repo.link_substitute(&reference, &substitute)?;
    println!("linked {} as {}", used, link.display());
    Ok(())
}
