use anyhow::Result;
use log::info;

use crate::{
    repository::{RemovalReport, UninstallPreview},
    report::Reporter,
    runtime::Runtime,
};

use super::{CliRepository, check_failures, confirmed, parse_names, print_outcomes};

fn print_preview(preview: &UninstallPreview) {
    for name in &preview.requested {
        println!("  {}", name);
    }
    if !preview.implicated.is_empty() {
        println!("Packages depending on them:");
        for name in &preview.implicated {
            println!("  {}", name);
        }
    }
}

/// Uninstall packages. With `cascade`, active packages that depend on them
/// are uninstalled too, after confirmation.
#[tracing::instrument(skip(runtime, repo, reporter))]
pub fn uninstall<R: Runtime>(
    runtime: &R,
    repo: &CliRepository<'_, R>,
    names: &[String],
    cascade: bool,
    yes: bool,
    reporter: &dyn Reporter,
) -> Result<()> {
    let names = parse_names(names)?;
    if cascade {
        let preview = repo.preview_uninstall(&names)?;
        if preview.requested.is_empty() && preview.implicated.is_empty() {
            println!("Nothing to uninstall.");
            return Ok(());
        }
        println!("Uninstalling:");
        print_preview(&preview);
        if !preview.implicated.is_empty() && !confirmed(runtime, yes, "Continue?")? {
            info!("Uninstall cancelled");
            return Ok(());
        }
    }

    let outcomes = repo.uninstall(&names, cascade, reporter)?;
    let failed = print_outcomes("uninstalled", &outcomes, |_| None);
    check_failures(failed, outcomes.len())
}

fn print_removal(report: &RemovalReport) -> usize {
    for (name, dest) in &report.moved {
        println!("moved {} to {}", name, dest.display());
    }
    for (name, reason) in &report.failed {
        println!("failed {}: {}", name, reason);
    }
    report.failed.len()
}

/// Move packages to the deleted quarantine and forget them.
#[tracing::instrument(skip(runtime, repo, reporter))]
pub fn delete<R: Runtime>(
    runtime: &R,
    repo: &CliRepository<'_, R>,
    names: &[String],
    cascade: bool,
    yes: bool,
    reporter: &dyn Reporter,
) -> Result<()> {
    let names = parse_names(names)?;
    let preview = if cascade {
        repo.preview_delete(&names)?
    } else {
        names.clone()
    };
    println!("Deleting:");
    for name in &preview {
        println!("  {}", name);
    }
    if !confirmed(runtime, yes, "Move these archives out of the repository?")? {
        info!("Delete cancelled");
        return Ok(());
    }

    let report = repo.delete(&names, cascade, reporter)?;
    let failed = print_removal(&report);
    check_failures(failed, report.moved.len() + failed)
}

pub(crate) fn print_sweep(report: &RemovalReport) -> Result<()> {
    if report.moved.is_empty() && report.failed.is_empty() {
        println!("Nothing to sweep.");
        return Ok(());
    }
    let failed = print_removal(report);
    check_failures(failed, report.moved.len() + failed)
}
