//! Redundancy sweeps: find old versions that can be moved out of the way.
//!
//! Planning is pure and works on the catalog alone; the repository carries
//! the plans out.

use std::collections::BTreeMap;

use crate::catalog::Catalog;
use crate::closure::ClosureEngine;
use crate::package::{ApproximationPolicy, Lineage, PackageName, VersionSpec};

/// Versions of each lineage with at least two records, ascending.
fn multi_version_lineages(catalog: &Catalog) -> BTreeMap<&Lineage, Vec<PackageName>> {
    catalog
        .lineages()
        .filter_map(|lineage| {
            let versions = catalog.versions(lineage);
            (versions.len() > 1).then(|| {
                let names = versions
                    .iter()
                    .map(|v| lineage.at(VersionSpec::Exact(*v)))
                    .collect();
                (lineage, names)
            })
        })
        .collect()
}

/// Non-latest versions that are not active and that no record depends on.
pub fn plan_stale(catalog: &Catalog) -> Vec<PackageName> {
    let engine = ClosureEngine::new(catalog, ApproximationPolicy::default());
    let mut stale = Vec::new();
    for names in multi_version_lineages(catalog).into_values() {
        let Some((_latest, older)) = names.split_last() else {
            continue;
        };
        for name in older {
            if catalog.activation(name).is_active() {
                continue;
            }
            if !engine.direct_consumers(name).is_empty() {
                continue;
            }
            stale.push(name.clone());
        }
    }
    stale
}

/// One old active version and the latest version that replaces it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Supersession {
    pub old: PackageName,
    pub latest: PackageName,
}

/// Active non-latest versions whose activation should move to the latest
/// version. Plugin-only packages are left alone.
pub fn plan_superseded(catalog: &Catalog) -> Vec<Supersession> {
    let plugin_only = |name: &PackageName| {
        catalog
            .get(name)
            .is_some_and(|r| r.counts.is_plugin_only())
    };

    let mut plan = Vec::new();
    for names in multi_version_lineages(catalog).into_values() {
        let Some((latest, older)) = names.split_last() else {
            continue;
        };
        if plugin_only(latest) {
            continue;
        }
        for name in older {
            if catalog.activation(name).is_active() && !plugin_only(name) {
                plan.push(Supersession {
                    old: name.clone(),
                    latest: latest.clone(),
                });
            }
        }
    }
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::tests::{catalog_of, record};
    use crate::package::ActivationState;

    fn n(s: &str) -> PackageName {
        s.parse().unwrap()
    }

    #[test]
    fn test_stale_skips_latest_active_and_depended_upon() {
        let mut catalog = catalog_of(&[
            ("a.b.1", &[]),
            ("a.b.2", &[]),
            ("a.b.3", &[]),
            ("a.b.4", &[]),
            ("c.d.1", &[]),
            ("user.scene.1", &["a.b.2"]),
        ]);
        catalog.set_activation(&n("a.b.3"), ActivationState::Disabled);

        assert_eq!(plan_stale(&catalog), vec![n("a.b.1")]);
    }

    #[test]
    fn test_stale_single_version_lineage_is_never_stale() {
        let catalog = catalog_of(&[("c.d.1", &[])]);
        assert!(plan_stale(&catalog).is_empty());
    }

    #[test]
    fn test_superseded_plan() {
        let mut catalog = catalog_of(&[
            ("a.b.1", &[]),
            ("a.b.2", &[]),
            ("c.d.1", &[]),
            ("c.d.5", &[]),
        ]);
        catalog.set_activation(&n("a.b.1"), ActivationState::Installed);
        catalog.set_activation(&n("c.d.5"), ActivationState::Installed);

        assert_eq!(
            plan_superseded(&catalog),
            vec![Supersession {
                old: n("a.b.1"),
                latest: n("a.b.2"),
            }]
        );
    }

    #[test]
    fn test_superseded_leaves_plugin_only_packages() {
        let mut catalog = Catalog::new();
        for name in ["p.plugin.1", "p.plugin.2"] {
            let mut indexed = record(name, &[]);
            indexed.record.counts.plugins = 1;
            catalog.upsert(indexed);
        }
        catalog.set_activation(&n("p.plugin.1"), ActivationState::Installed);
        assert!(plan_superseded(&catalog).is_empty());
    }
}
