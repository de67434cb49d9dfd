//! In-memory catalog of indexed packages.
//!
//! The catalog keeps records, their dependency references, classified
//! assets and a cached activation map, plus the indexes the resolver and
//! the closure engine query: versions per lineage and consumers per
//! referenced name.

mod store;

use log::warn;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

use crate::archive::IndexedArchive;
use crate::error::StoreError;
use crate::package::{
    ActivationState, ApproximationPolicy, AssetEntry, Lineage, PackageName, PackageRecord,
    Resolution, VersionResolver, VersionSpec,
};

pub use store::{
    ActivationRow, CatalogSnapshot, CatalogStore, DependencyRow, JsonCatalogStore,
    SNAPSHOT_FORMAT,
};

#[cfg(test)]
pub use store::MockCatalogStore;

static NO_VERSIONS: BTreeSet<u32> = BTreeSet::new();

#[derive(Debug, Default, Clone)]
pub struct Catalog {
    records: BTreeMap<PackageName, PackageRecord>,
    versions: HashMap<Lineage, BTreeSet<u32>>,
    /// Referenced name (exact or `latest` alias) -> records declaring it.
    consumers: HashMap<PackageName, BTreeSet<PackageName>>,
    assets: BTreeMap<PackageName, Vec<AssetEntry>>,
    /// Only active names are stored; absence means not installed.
    activation: BTreeMap<PackageName, ActivationState>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, name: &PackageName) -> Option<&PackageRecord> {
        self.records.get(name)
    }

    pub fn contains(&self, name: &PackageName) -> bool {
        self.records.contains_key(name)
    }

    pub fn records(&self) -> impl Iterator<Item = &PackageRecord> {
        self.records.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &PackageName> {
        self.records.keys()
    }

    /// Insert or replace one indexed archive.
    pub fn upsert(&mut self, indexed: IndexedArchive) {
        let IndexedArchive { record, assets } = indexed;
        let name = record.name.clone();
        self.unlink_dependencies(&name);
        self.link_dependencies(&record);
        if let Some(v) = name.exact_version() {
            self.versions
                .entry(name.lineage().clone())
                .or_default()
                .insert(v);
        }
        self.assets.insert(name.clone(), assets);
        self.records.insert(name, record);
    }

    /// Point an existing record at a new archive location.
    pub fn relocate(&mut self, name: &PackageName, relative_path: &Path) -> bool {
        match self.records.get_mut(name) {
            Some(record) => {
                record.relative_path = relative_path.to_path_buf();
                true
            }
            None => false,
        }
    }

    /// Remove a record with its dependency references, assets and activation
    /// entry.
    pub fn destroy(&mut self, name: &PackageName) -> Option<PackageRecord> {
        let record = self.records.remove(name)?;
        self.unlink_dependencies_of(&record);
        self.assets.remove(name);
        self.activation.remove(name);
        if let Some(v) = name.exact_version()
            && let Some(set) = self.versions.get_mut(name.lineage())
        {
            set.remove(&v);
            if set.is_empty() {
                self.versions.remove(name.lineage());
            }
        }
        Some(record)
    }

    fn link_dependencies(&mut self, record: &PackageRecord) {
        for reference in &record.dependencies {
            match reference.parse::<PackageName>() {
                Ok(target) => {
                    self.consumers
                        .entry(target)
                        .or_default()
                        .insert(record.name.clone());
                }
                Err(e) => warn!("{} declares an unusable dependency: {}", record.name, e),
            }
        }
    }

    fn unlink_dependencies(&mut self, name: &PackageName) {
        if let Some(old) = self.records.get(name).cloned() {
            self.unlink_dependencies_of(&old);
        }
    }

    fn unlink_dependencies_of(&mut self, record: &PackageRecord) {
        for reference in &record.dependencies {
            if let Ok(target) = reference.parse::<PackageName>()
                && let Some(set) = self.consumers.get_mut(&target)
            {
                set.remove(&record.name);
                if set.is_empty() {
                    self.consumers.remove(&target);
                }
            }
        }
    }

    pub fn dependencies_of(&self, name: &PackageName) -> &[String] {
        self.records
            .get(name)
            .map(|r| r.dependencies.as_slice())
            .unwrap_or(&[])
    }

    /// Records whose manifest names `target` verbatim (exact name or alias).
    pub fn consumers_of(&self, target: &PackageName) -> impl Iterator<Item = &PackageName> {
        self.consumers.get(target).into_iter().flatten()
    }

    pub fn assets_of(&self, name: &PackageName) -> &[AssetEntry] {
        self.assets.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    // Versions

    pub fn versions(&self, lineage: &Lineage) -> &BTreeSet<u32> {
        self.versions.get(lineage).unwrap_or(&NO_VERSIONS)
    }

    pub fn lineages(&self) -> impl Iterator<Item = &Lineage> {
        self.versions.keys()
    }

    pub fn latest_of(&self, lineage: &Lineage) -> Option<PackageName> {
        VersionResolver::find_latest(self.versions(lineage))
            .map(|v| lineage.at(VersionSpec::Exact(v)))
    }

    pub fn is_latest(&self, name: &PackageName) -> bool {
        VersionResolver::is_latest(name, self.versions(name.lineage()))
    }

    pub fn resolve_name(&self, reference: &PackageName, policy: ApproximationPolicy) -> Resolution {
        VersionResolver::resolve(reference, self.versions(reference.lineage()), policy)
    }

    /// Resolve a reference as written in a manifest. Unparsable text is
    /// missing.
    pub fn resolve(&self, reference: &str, policy: ApproximationPolicy) -> Resolution {
        match reference.parse::<PackageName>() {
            Ok(name) => self.resolve_name(&name, policy),
            Err(_) => Resolution::Missing,
        }
    }

    // Activation cache

    pub fn activation(&self, name: &PackageName) -> ActivationState {
        self.activation.get(name).copied().unwrap_or_default()
    }

    pub fn set_activation(&mut self, name: &PackageName, state: ActivationState) {
        if state.is_active() {
            self.activation.insert(name.clone(), state);
        } else {
            self.activation.remove(name);
        }
    }

    /// Replace the whole cache. Names without a record are dropped.
    pub fn replace_activation(
        &mut self,
        states: impl IntoIterator<Item = (PackageName, ActivationState)>,
    ) {
        self.activation = states
            .into_iter()
            .filter(|(name, state)| state.is_active() && self.records.contains_key(name))
            .collect();
    }

    /// Active packages, in name order.
    pub fn active(&self) -> impl Iterator<Item = (&PackageName, ActivationState)> {
        self.activation.iter().map(|(n, s)| (n, *s))
    }

    /// Number of versions of `lineage` currently active.
    pub fn active_count(&self, lineage: &Lineage) -> usize {
        self.activation
            .keys()
            .filter(|n| n.lineage() == lineage)
            .count()
    }

    // Snapshots

    pub fn snapshot(&self) -> CatalogSnapshot {
        let dependencies = self
            .records
            .values()
            .flat_map(|r| {
                r.dependencies.iter().map(|d| DependencyRow {
                    package: r.name.clone(),
                    reference: d.clone(),
                })
            })
            .collect();
        CatalogSnapshot {
            format: SNAPSHOT_FORMAT,
            packages: self.records.values().cloned().collect(),
            dependencies,
            assets: self.assets.values().flatten().cloned().collect(),
            activation: self
                .activation
                .iter()
                .map(|(package, state)| ActivationRow {
                    package: package.clone(),
                    state: *state,
                })
                .collect(),
        }
    }

    /// Rebuild a catalog from stored rows, enforcing record uniqueness and
    /// that every row hangs off an existing record.
    pub fn from_snapshot(snapshot: CatalogSnapshot) -> Result<Self, StoreError> {
        let mut records: BTreeMap<PackageName, PackageRecord> = BTreeMap::new();
        let mut paths = BTreeSet::new();
        for mut record in snapshot.packages {
            if !paths.insert(record.relative_path.clone()) {
                return Err(StoreError::Constraint(format!(
                    "archive path {:?} is claimed by more than one package",
                    record.relative_path
                )));
            }
            record.dependencies.clear();
            let name = record.name.clone();
            if records.insert(name.clone(), record).is_some() {
                return Err(StoreError::Constraint(format!(
                    "duplicate package row {}",
                    name
                )));
            }
        }

        for row in snapshot.dependencies {
            let record = records.get_mut(&row.package).ok_or_else(|| {
                StoreError::Constraint(format!(
                    "dependency {} belongs to unknown package {}",
                    row.reference, row.package
                ))
            })?;
            record.dependencies.push(row.reference);
        }

        let mut assets: BTreeMap<PackageName, Vec<AssetEntry>> = BTreeMap::new();
        for entry in snapshot.assets {
            if !records.contains_key(&entry.owner) {
                return Err(StoreError::Constraint(format!(
                    "asset {} belongs to unknown package {}",
                    entry.archive_path, entry.owner
                )));
            }
            assets.entry(entry.owner.clone()).or_default().push(entry);
        }

        let mut catalog = Catalog::new();
        for (name, record) in records {
            let assets = assets.remove(&name).unwrap_or_default();
            catalog.upsert(IndexedArchive { record, assets });
        }

        for row in snapshot.activation {
            if !catalog.contains(&row.package) {
                return Err(StoreError::Constraint(format!(
                    "activation row for unknown package {}",
                    row.package
                )));
            }
            catalog.set_activation(&row.package, row.state);
        }
        Ok(catalog)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::package::{AssetCategory, ContentCounts};

    pub(crate) fn record(name: &str, deps: &[&str]) -> IndexedArchive {
        let name: PackageName = name.parse().unwrap();
        let path = format!("{}/{}.var", name.creator(), name);
        IndexedArchive {
            record: PackageRecord::new(name, path).with_dependencies(deps.iter().copied()),
            assets: Vec::new(),
        }
    }

    pub(crate) fn catalog_of(entries: &[(&str, &[&str])]) -> Catalog {
        let mut catalog = Catalog::new();
        for (name, deps) in entries {
            catalog.upsert(record(name, deps));
        }
        catalog
    }

    fn n(s: &str) -> PackageName {
        s.parse().unwrap()
    }

    #[test]
    fn test_upsert_indexes_versions_and_consumers() {
        let catalog = catalog_of(&[
            ("alice.hair1.1", &[]),
            ("alice.hair1.2", &[]),
            ("bob.scene1.3", &["alice.hair1.2", "carol.skin.latest"]),
        ]);
        assert_eq!(catalog.len(), 3);
        assert_eq!(
            catalog.versions(n("alice.hair1.1").lineage()),
            &BTreeSet::from([1, 2])
        );
        assert_eq!(
            catalog.consumers_of(&n("alice.hair1.2")).collect::<Vec<_>>(),
            vec![&n("bob.scene1.3")]
        );
        assert_eq!(
            catalog.consumers_of(&n("carol.skin.latest")).count(),
            1
        );
        assert!(catalog.is_latest(&n("alice.hair1.2")));
        assert!(!catalog.is_latest(&n("alice.hair1.1")));
    }

    #[test]
    fn test_upsert_replaces_dependencies() {
        let mut catalog = catalog_of(&[("bob.scene1.3", &["alice.hair1.2"])]);
        catalog.upsert(record("bob.scene1.3", &["alice.hair1.1"]));
        assert_eq!(catalog.consumers_of(&n("alice.hair1.2")).count(), 0);
        assert_eq!(catalog.consumers_of(&n("alice.hair1.1")).count(), 1);
        assert_eq!(catalog.dependencies_of(&n("bob.scene1.3")), ["alice.hair1.1"]);
    }

    #[test]
    fn test_destroy_cascades() {
        let mut catalog = catalog_of(&[
            ("alice.hair1.2", &[]),
            ("bob.scene1.3", &["alice.hair1.2"]),
        ]);
        catalog.set_activation(&n("bob.scene1.3"), ActivationState::Installed);

        let removed = catalog.destroy(&n("bob.scene1.3")).unwrap();
        assert_eq!(removed.name, n("bob.scene1.3"));
        assert_eq!(catalog.consumers_of(&n("alice.hair1.2")).count(), 0);
        assert_eq!(catalog.activation(&n("bob.scene1.3")), ActivationState::NotInstalled);
        assert!(catalog.versions(n("bob.scene1.3").lineage()).is_empty());
        assert!(catalog.destroy(&n("bob.scene1.3")).is_none());

        let policy = ApproximationPolicy::default();
        assert_eq!(catalog.resolve("bob.scene1.3", policy), Resolution::Missing);
        assert_eq!(catalog.resolve("bob.scene1.latest", policy), Resolution::Missing);
        catalog.destroy(&n("alice.hair1.2"));
        assert_eq!(catalog.resolve("alice.hair1.2", policy), Resolution::Missing);
        assert_eq!(catalog.resolve("alice.hair1.1", policy), Resolution::Missing);
    }

    #[test]
    fn test_resolve_through_catalog() {
        let catalog = catalog_of(&[("a.b.1", &[]), ("a.b.3", &[]), ("a.b.5", &[])]);
        let policy = ApproximationPolicy::default();
        assert_eq!(catalog.resolve("a.b.4", policy).to_string(), "a.b.5$");
        assert_eq!(catalog.resolve("a.b.latest", policy), Resolution::Exact(n("a.b.5")));
        assert_eq!(catalog.resolve("x.y.1", policy), Resolution::Missing);
        assert_eq!(catalog.resolve("garbage", policy), Resolution::Missing);
    }

    #[test]
    fn test_activation_cache() {
        let mut catalog = catalog_of(&[("a.b.1", &[]), ("a.b.2", &[]), ("c.d.1", &[])]);
        catalog.replace_activation([
            (n("a.b.1"), ActivationState::Installed),
            (n("c.d.1"), ActivationState::Disabled),
            (n("z.z.1"), ActivationState::Installed),
        ]);
        assert_eq!(catalog.active_count(n("a.b.1").lineage()), 1);
        assert_eq!(catalog.active().count(), 2);
        catalog.set_activation(&n("a.b.1"), ActivationState::NotInstalled);
        assert_eq!(catalog.active_count(n("a.b.1").lineage()), 0);
    }

    #[test]
    fn test_snapshot_round_trip_keeps_everything() {
        let mut catalog = catalog_of(&[
            ("alice.hair1.2", &[]),
            ("bob.scene1.3", &["alice.hair1.2"]),
        ]);
        let mut indexed = record("carol.look.1", &[]);
        indexed.record.counts = ContentCounts {
            looks: 1,
            ..Default::default()
        };
        indexed.assets.push(AssetEntry {
            owner: n("carol.look.1"),
            category: AssetCategory::Look,
            archive_path: "Saves/Person/Appearance/x.json".into(),
            is_preset: true,
            preview_image: None,
        });
        catalog.upsert(indexed);
        catalog.set_activation(&n("bob.scene1.3"), ActivationState::Disabled);

        let restored = Catalog::from_snapshot(catalog.snapshot()).unwrap();
        assert_eq!(restored.len(), 3);
        assert_eq!(restored.dependencies_of(&n("bob.scene1.3")), ["alice.hair1.2"]);
        assert_eq!(restored.assets_of(&n("carol.look.1")).len(), 1);
        assert_eq!(restored.activation(&n("bob.scene1.3")), ActivationState::Disabled);
        assert_eq!(restored.get(&n("carol.look.1")).unwrap().counts.looks, 1);
    }

    #[test]
    fn test_from_snapshot_rejects_orphan_rows() {
        let catalog = catalog_of(&[("bob.scene1.3", &["alice.hair1.2"])]);
        let mut snapshot = catalog.snapshot();
        snapshot.packages.clear();
        assert!(matches!(
            Catalog::from_snapshot(snapshot),
            Err(StoreError::Constraint(_))
        ));
    }

    #[test]
    fn test_from_snapshot_rejects_duplicates() {
        let catalog = catalog_of(&[("bob.scene1.3", &[])]);
        let mut snapshot = catalog.snapshot();
        let mut dup = snapshot.packages[0].clone();
        dup.relative_path = "elsewhere/bob.scene1.3.var".into();
        snapshot.packages.push(dup);
        assert!(matches!(
            Catalog::from_snapshot(snapshot),
            Err(StoreError::Constraint(_))
        ));
    }
}
