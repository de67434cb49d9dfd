use anyhow::Result;
use log::debug;

use crate::{
    catalog::Catalog,
    closure::ClosureEngine,
    package::{ApproximationPolicy, AssetCategory, PackageName},
    runtime::Runtime,
};

use super::CliRepository;

/// Show detailed information about a package
#[tracing::instrument(skip(repo))]
pub fn show<R: Runtime>(repo: &CliRepository<'_, R>, name: &str) -> Result<()> {
    let name: PackageName = name.parse()?;
    let catalog = repo.read()?;
    let resolution = catalog.resolve_name(&name, repo.policy());
    let Some(name) = resolution.package() else {
        anyhow::bail!("Package {} is not in the repository.", name);
    };
    debug!("Showing {}", name);

    for line in describe(&catalog, name, repo.policy()) {
        println!("{}", line);
    }
    Ok(())
}

fn describe(catalog: &Catalog, name: &PackageName, policy: ApproximationPolicy) -> Vec<String> {
    let mut lines = Vec::new();
    let Some(record) = catalog.get(name) else {
        return lines;
    };

    lines.push(format!("Package: {}", name));
    lines.push(format!("Archive: {}", record.relative_path.display()));
    lines.push(format!("Size: {} bytes", record.size_bytes));
    if let Some(date) = &record.manifest_date {
        lines.push(format!("Manifest date: {}", date));
    }
    lines.push(format!("State: {}", catalog.activation(name)));
    if !catalog.is_latest(name)
        && let Some(latest) = catalog.latest_of(name.lineage())
    {
        lines.push(format!("Latest version: {}", latest));
    }

    let counts: Vec<String> = AssetCategory::ALL
        .iter()
        .filter_map(|c| {
            let n = record.counts.get(*c);
            (n > 0).then(|| format!("{} {}", n, c))
        })
        .chain((record.counts.plugins > 0).then(|| format!("{} plugins", record.counts.plugins)))
        .collect();
    if !counts.is_empty() {
        lines.push(format!("Contents: {}", counts.join(", ")));
    }

    let assets = catalog.assets_of(name);
    if !assets.is_empty() {
        lines.push(String::new());
        lines.push("Assets:".to_string());
        for asset in assets {
            let preset = if asset.is_preset { ", preset" } else { "" };
            lines.push(format!("  {} [{}{}]", asset.archive_path, asset.category, preset));
        }
    }

    let dependencies = catalog.dependencies_of(name);
    if !dependencies.is_empty() {
        lines.push(String::new());
        lines.push("Dependencies:".to_string());
        for reference in dependencies {
            lines.push(format!(
                "  {} -> {}",
                reference,
                catalog.resolve(reference, policy)
            ));
        }
    }

    let consumers = ClosureEngine::new(catalog, policy).direct_consumers(name);
    if !consumers.is_empty() {
        lines.push(String::new());
        lines.push("Used by:".to_string());
        for consumer in consumers {
            lines.push(format!("  {}", consumer));
        }
    }
    lines
}
