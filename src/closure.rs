//! Dependency closures over the catalog.
//!
//! Forward: everything a set of packages needs, transitively.
//! Backward: everything that stops working when a set of packages goes away.

use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};

use crate::catalog::Catalog;
use crate::package::{ApproximationPolicy, PackageName, Resolution};

/// Result of a forward walk.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ForwardClosure {
    /// Resolved packages, in discovery order.
    pub members: Vec<PackageName>,
    /// References that resolved to nothing.
    pub missing: BTreeSet<String>,
    /// References satisfied by another version than requested.
    pub approximate: BTreeMap<String, PackageName>,
}

/// Finds where an unresolved reference can be obtained.
#[cfg_attr(test, mockall::automock)]
pub trait DownloadLocator {
    fn locate(&self, reference: &str) -> Option<String>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingDependency {
    pub reference: String,
    pub download: Option<String>,
}

/// Unresolved and approximately resolved references of a set of packages.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MissingReport {
    pub missing: Vec<MissingDependency>,
    pub approximate: BTreeMap<String, PackageName>,
}

impl MissingReport {
    pub fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.approximate.is_empty()
    }

    /// Attach download references from `locator` to missing entries.
    pub fn annotate(&mut self, locator: &dyn DownloadLocator) {
        for entry in &mut self.missing {
            if entry.download.is_none() {
                entry.download = locator.locate(&entry.reference);
            }
        }
    }
}

pub struct ClosureEngine<'a> {
    catalog: &'a Catalog,
    policy: ApproximationPolicy,
}

impl<'a> ClosureEngine<'a> {
    pub fn new(catalog: &'a Catalog, policy: ApproximationPolicy) -> Self {
        Self { catalog, policy }
    }

    /// Walk dependencies from `roots` (names or reference strings).
    pub fn forward<S: AsRef<str>>(&self, roots: &[S]) -> ForwardClosure {
        let mut closure = ForwardClosure::default();
        let mut visited: HashSet<PackageName> = HashSet::new();
        let mut queue: VecDeque<String> =
            roots.iter().map(|r| r.as_ref().to_string()).collect();

        while let Some(reference) = queue.pop_front() {
            let resolution = self.catalog.resolve(&reference, self.policy);
            let package = match &resolution {
                Resolution::Missing => {
                    closure.missing.insert(reference);
                    continue;
                }
                Resolution::Exact(name) => name.clone(),
                Resolution::Approximate { resolved, .. } => {
                    closure.approximate.insert(reference, resolved.clone());
                    resolved.clone()
                }
            };
            if !visited.insert(package.clone()) {
                continue;
            }
            queue.extend(self.catalog.dependencies_of(&package).iter().cloned());
            closure.members.push(package);
        }
        closure
    }

    /// The packages that must be active for `names` to work, inputs included.
    pub fn install_set_for(&self, names: &[PackageName]) -> Vec<PackageName> {
        let roots: Vec<String> = names.iter().map(ToString::to_string).collect();
        self.forward(&roots).members
    }

    /// Packages that would lose a dependency if `names` went away, inputs
    /// included, in discovery order.
    ///
    /// A name whose lineage has more than one active version is skipped as a
    /// source: its consumers can still be served by a sibling.
    pub fn implicated_by(&self, names: &[PackageName]) -> Vec<PackageName> {
        let mut seen: HashSet<PackageName> = HashSet::new();
        let mut result = Vec::new();
        for name in names {
            if seen.insert(name.clone()) {
                result.push(name.clone());
            }
        }

        let mut frontier: Vec<PackageName> = result.clone();
        while !frontier.is_empty() {
            let mut next = Vec::new();
            for name in &frontier {
                if self.catalog.active_count(name.lineage()) > 1 {
                    continue;
                }
                for consumer in self.direct_consumers(name) {
                    if seen.insert(consumer.clone()) {
                        result.push(consumer.clone());
                        next.push(consumer);
                    }
                }
            }
            frontier = next;
        }
        result
    }

    /// Records that reference `name` exactly, or through the `latest` alias
    /// when `name` is the newest version of its lineage.
    pub fn direct_consumers(&self, name: &PackageName) -> Vec<PackageName> {
        let mut consumers: Vec<PackageName> = self.catalog.consumers_of(name).cloned().collect();
        if self.catalog.is_latest(name) {
            consumers.extend(self.catalog.consumers_of(&name.latest_alias()).cloned());
        }
        consumers.retain(|c| c != name);
        consumers.sort();
        consumers.dedup();
        consumers
    }

    /// Dependency references of the forward closure of `roots` that did not
    /// resolve exactly.
    pub fn missing_dependencies(&self, roots: &[PackageName]) -> MissingReport {
        let roots: Vec<String> = roots.iter().map(ToString::to_string).collect();
        let closure = self.forward(&roots);
        MissingReport {
            missing: closure
                .missing
                .into_iter()
                .map(|reference| MissingDependency {
                    reference,
                    download: None,
                })
                .collect(),
            approximate: closure.approximate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::tests::catalog_of;
    use crate::package::ActivationState;

    fn n(s: &str) -> PackageName {
        s.parse().unwrap()
    }

    fn names(v: &[&str]) -> Vec<PackageName> {
        v.iter().map(|s| n(s)).collect()
    }

    #[test]
    fn test_forward_closure_with_cycle() {
        let catalog = catalog_of(&[
            ("a.a.1", &["b.b.1"]),
            ("b.b.1", &["c.c.1"]),
            ("c.c.1", &["a.a.1"]),
        ]);
        let engine = ClosureEngine::new(&catalog, ApproximationPolicy::default());
        let set = engine.install_set_for(&names(&["a.a.1"]));
        assert_eq!(set, names(&["a.a.1", "b.b.1", "c.c.1"]));
    }

    #[test]
    fn test_forward_closure_is_superset_of_inputs() {
        let catalog = catalog_of(&[
            ("a.a.1", &["b.b.1"]),
            ("b.b.1", &[]),
            ("x.x.1", &["b.b.1"]),
        ]);
        let engine = ClosureEngine::new(&catalog, ApproximationPolicy::default());
        let inputs = names(&["a.a.1", "x.x.1"]);
        let set = engine.install_set_for(&inputs);
        for input in &inputs {
            assert!(set.contains(input));
        }
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn test_forward_records_missing_and_approximate() {
        let catalog = catalog_of(&[
            ("bob.scene1.3", &["alice.hair1.2", "carol.skin.latest", "dave.prop.1"]),
            ("alice.hair1.5", &[]),
            ("carol.skin.4", &[]),
        ]);
        let engine = ClosureEngine::new(&catalog, ApproximationPolicy::default());
        let closure = engine.forward(&["bob.scene1.3"]);
        assert_eq!(
            closure.members,
            names(&["bob.scene1.3", "alice.hair1.5", "carol.skin.4"])
        );
        assert_eq!(closure.missing, BTreeSet::from(["dave.prop.1".to_string()]));
        assert_eq!(
            closure.approximate.get("alice.hair1.2"),
            Some(&n("alice.hair1.5"))
        );
    }

    #[test]
    fn test_strict_policy_turns_approximation_into_missing() {
        let catalog = catalog_of(&[("bob.scene1.3", &["alice.hair1.2"]), ("alice.hair1.5", &[])]);
        let engine = ClosureEngine::new(&catalog, ApproximationPolicy::Strict);
        let report = engine.missing_dependencies(&names(&["bob.scene1.3"]));
        assert_eq!(report.missing.len(), 1);
        assert_eq!(report.missing[0].reference, "alice.hair1.2");
        assert!(report.approximate.is_empty());
    }

    #[test]
    fn test_implicated_by_transitive() {
        let catalog = catalog_of(&[
            ("alice.hair1.2", &[]),
            ("bob.look.1", &["alice.hair1.2"]),
            ("carol.scene.1", &["bob.look.1"]),
            ("dave.scene.1", &[]),
        ]);
        let engine = ClosureEngine::new(&catalog, ApproximationPolicy::default());
        assert_eq!(
            engine.implicated_by(&names(&["alice.hair1.2"])),
            names(&["alice.hair1.2", "bob.look.1", "carol.scene.1"])
        );
    }

    #[test]
    fn test_implicated_by_latest_alias_only_for_newest() {
        let catalog = catalog_of(&[
            ("alice.hair1.1", &[]),
            ("alice.hair1.2", &[]),
            ("bob.look.1", &["alice.hair1.latest"]),
        ]);
        let engine = ClosureEngine::new(&catalog, ApproximationPolicy::default());
        assert_eq!(
            engine.implicated_by(&names(&["alice.hair1.2"])),
            names(&["alice.hair1.2", "bob.look.1"])
        );
        assert_eq!(
            engine.implicated_by(&names(&["alice.hair1.1"])),
            names(&["alice.hair1.1"])
        );
    }

    #[test]
    fn test_implicated_by_skips_lineage_with_two_active_versions() {
        let mut catalog = catalog_of(&[
            ("alice.hair1.1", &[]),
            ("alice.hair1.2", &[]),
            ("bob.look.1", &["alice.hair1.2"]),
        ]);
        catalog.set_activation(&n("alice.hair1.1"), ActivationState::Installed);
        catalog.set_activation(&n("alice.hair1.2"), ActivationState::Installed);
        let engine = ClosureEngine::new(&catalog, ApproximationPolicy::default());
        assert_eq!(
            engine.implicated_by(&names(&["alice.hair1.2"])),
            names(&["alice.hair1.2"])
        );
    }

    #[test]
    fn test_annotate_missing() {
        let mut report = MissingReport {
            missing: vec![
                MissingDependency {
                    reference: "dave.prop.1".into(),
                    download: None,
                },
                MissingDependency {
                    reference: "erin.prop.1".into(),
                    download: None,
                },
            ],
            approximate: BTreeMap::new(),
        };
        let mut locator = MockDownloadLocator::new();
        locator
            .expect_locate()
            .returning(|r| (r == "dave.prop.1").then(|| "https://hub/dave.prop.1".to_string()));
        report.annotate(&locator);
        assert_eq!(
            report.missing[0].download.as_deref(),
            Some("https://hub/dave.prop.1")
        );
        assert_eq!(report.missing[1].download, None);
    }
}
