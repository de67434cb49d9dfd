use anyhow::Result;

use crate::{report::Reporter, runtime::Runtime};

use super::CliRepository;

/// Re-index the repository and print what changed
#[tracing::instrument(skip(repo, reporter))]
pub fn update<R: Runtime>(repo: &CliRepository<'_, R>, reporter: &dyn Reporter) -> Result<()> {
    let report = repo.update(reporter)?;

    for name in &report.added {
        println!("added {}", name);
    }
    for name in &report.relocated {
        println!("relocated {}", name);
    }
    for name in &report.removed {
        println!("removed {}", name);
    }
    for (path, kind, reason) in &report.quarantined {
        println!("quarantined {} ({}): {}", path.display(), kind, reason);
    }
    for (path, reason) in &report.failed {
        println!("failed {}: {}", path.display(), reason);
    }
    println!(
        "{} added, {} unchanged, {} relocated, {} removed, {} quarantined",
        report.added.len(),
        report.unchanged,
        report.relocated.len(),
        report.removed.len(),
        report.quarantined.len()
    );
    Ok(())
}

/// Re-read activation state from the activation root
#[tracing::instrument(skip(repo))]
pub fn refresh<R: Runtime>(repo: &CliRepository<'_, R>) -> Result<()> {
    let active = repo.refresh_activation()?;
    println!("{} active package(s)", active);
    Ok(())
}
