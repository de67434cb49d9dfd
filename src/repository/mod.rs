//! The repository handle: one catalog, one store, one activation root.
//!
//! Every mutating operation is a batch that holds the catalog's write guard
//! from start to finish and persists the catalog before returning. Batches
//! start by re-reading activation from the activation root; the stored
//! activation cache is only a hint. Queries take the read guard.

mod layout;

use anyhow::{Context, Result, anyhow};
use log::{debug, info, warn};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::activation::{
    ActivationLayout, ActivationManager, InstallOutcome, ItemOutcome, RebuildReport,
};
use crate::archive::ArchiveIndexer;
use crate::catalog::{Catalog, CatalogStore};
use crate::closure::{ClosureEngine, DownloadLocator, MissingReport};
use crate::config::Settings;
use crate::error::ActivationError;
use crate::package::{
    APPROXIMATE_MARKER, ActivationState, ApproximationPolicy, PackageName, VersionSpec,
    find_all_archives,
};
use crate::relocate::move_into;
use crate::report::Reporter;
use crate::runtime::Runtime;
use crate::runtime::path::relative_to;
use crate::sweep::{plan_stale, plan_superseded};

pub use layout::{PREVIEW_DIR, QUARANTINE_DIR, Quarantine, RESERVED_DIRS, RepositoryLayout};

/// What an update batch did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UpdateReport {
    pub added: Vec<PackageName>,
    /// Known archives found where the catalog expected them.
    pub unchanged: usize,
    /// Known archives found at a new location.
    pub relocated: Vec<PackageName>,
    /// Records whose archive is gone.
    pub removed: Vec<PackageName>,
    /// Archives moved to quarantine, with where they went and why.
    pub quarantined: Vec<(PathBuf, Quarantine, String)>,
    pub failed: Vec<(PathBuf, String)>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct InstallReport {
    pub outcomes: Vec<ItemOutcome<InstallOutcome>>,
    /// Requested names or dependency references that resolved to nothing.
    pub unresolved: Vec<String>,
    /// References satisfied by another version than requested.
    pub approximate: Vec<(String, PackageName)>,
}

/// Packages that an uninstall would take down, for confirmation.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UninstallPreview {
    pub requested: Vec<PackageName>,
    pub implicated: Vec<PackageName>,
}

impl UninstallPreview {
    pub fn all(&self) -> Vec<PackageName> {
        self.requested
            .iter()
            .chain(self.implicated.iter())
            .cloned()
            .collect()
    }
}

/// Packages moved out of the repository by a delete or a sweep.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RemovalReport {
    /// Each removed package with the quarantine path its archive went to.
    pub moved: Vec<(PackageName, PathBuf)>,
    pub failed: Vec<(PackageName, String)>,
}

/// Which packages a missing-dependency report starts from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MissingScope {
    Installed,
    All,
    Packages(Vec<PackageName>),
}

pub struct Repository<'a, R: Runtime, S: CatalogStore> {
    runtime: &'a R,
    store: S,
    layout: RepositoryLayout,
    activation: ActivationLayout,
    policy: ApproximationPolicy,
    catalog: RwLock<Catalog>,
}

impl<'a, R: Runtime, S: CatalogStore> Repository<'a, R, S> {
    /// Load the catalog from `store`, or start empty if nothing was stored.
    #[tracing::instrument(skip(runtime, store))]
    pub fn open(runtime: &'a R, store: S, settings: &Settings) -> Result<Self> {
        let mut catalog = match store.load().context("Failed to load the catalog")? {
            Some(snapshot) => {
                Catalog::from_snapshot(snapshot).context("Stored catalog is inconsistent")?
            }
            None => Catalog::new(),
        };
        let activation = ActivationLayout::new(&settings.activation_root);
        let manager = ActivationManager::open(runtime, activation.clone());
        catalog.replace_activation(manager.states());
        debug!("Opened catalog with {} packages", catalog.len());
        Ok(Self {
            runtime,
            store,
            layout: RepositoryLayout::new(&settings.repo_root),
            activation,
            policy: settings.policy,
            catalog: RwLock::new(catalog),
        })
    }

    /// Persist and release the handle.
    pub fn close(self) -> Result<()> {
        let catalog = self.read()?;
        self.persist(&catalog)
    }

    pub fn layout(&self) -> &RepositoryLayout {
        &self.layout
    }

    pub fn policy(&self) -> ApproximationPolicy {
        self.policy
    }

    /// Shared access for queries.
    pub fn read(&self) -> Result<RwLockReadGuard<'_, Catalog>> {
        self.catalog
            .read()
            .map_err(|_| anyhow!("catalog lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Catalog>> {
        self.catalog
            .write()
            .map_err(|_| anyhow!("catalog lock poisoned"))
    }

    /// Exclusive access with activation re-read from disk.
    fn batch(&self) -> Result<(RwLockWriteGuard<'_, Catalog>, ActivationManager<'a, R>)> {
        let mut catalog = self.write()?;
        let manager = self.manager();
        catalog.replace_activation(manager.states());
        Ok((catalog, manager))
    }

    fn persist(&self, catalog: &Catalog) -> Result<()> {
        self.store
            .save(&catalog.snapshot())
            .context("Failed to persist the catalog")
    }

    fn indexer(&self) -> ArchiveIndexer<'a, R> {
        ArchiveIndexer::new(
            self.runtime,
            self.layout.root().to_path_buf(),
            self.layout.preview_dir(),
        )
    }

    fn manager(&self) -> ActivationManager<'a, R> {
        ActivationManager::open(self.runtime, self.activation.clone())
    }

    fn source_path(&self, catalog: &Catalog, name: &PackageName) -> Option<PathBuf> {
        catalog
            .get(name)
            .map(|r| self.layout.archive_path(&r.relative_path))
    }

    fn quarantine(&self, path: &Path, kind: Quarantine) -> Result<PathBuf> {
        move_into(self.runtime, path, &self.layout.quarantine_dir(kind))
    }

    /// Drop a record together with its link and preview images. The record
    /// goes even when the link cannot be removed.
    fn forget(
        &self,
        catalog: &mut Catalog,
        manager: &mut ActivationManager<'a, R>,
        name: &PackageName,
    ) -> Result<(), ActivationError> {
        let unlinked = if manager.state(name).is_active() {
            manager.uninstall(name)
        } else {
            Ok(())
        };
        catalog.destroy(name);
        self.indexer().discard_previews(name);
        unlinked
    }

    /// Bring the catalog in line with the archives on disk.
    #[tracing::instrument(skip(self, reporter))]
    pub fn update(&self, reporter: &dyn Reporter) -> Result<UpdateReport> {
        let (mut catalog, mut manager) = self.batch()?;
        let mut report = UpdateReport::default();
        let indexer = self.indexer();
        let root = self.layout.root();

        let archives = find_all_archives(self.runtime, root, RESERVED_DIRS)
            .with_context(|| format!("Failed to scan {:?}", root))?;
        let total = archives.len();
        let mut seen: HashSet<PackageName> = HashSet::new();

        for (i, path) in archives.iter().enumerate() {
            reporter.progress(i + 1, total);
            let relative = relative_to(path, root).unwrap_or_else(|| path.clone());

            let name = match PackageName::from_archive_path(path) {
                Ok(name) if name.version() != VersionSpec::Latest => name,
                Ok(name) => {
                    self.quarantine_into(
                        path,
                        Quarantine::Malformed,
                        format!("{} has no version number", name),
                        &mut report,
                        reporter,
                    );
                    continue;
                }
                Err(e) => {
                    self.quarantine_into(
                        path,
                        Quarantine::Malformed,
                        e.to_string(),
                        &mut report,
                        reporter,
                    );
                    continue;
                }
            };

            if let Some(existing) = catalog.get(&name) {
                if existing.relative_path == relative {
                    seen.insert(name);
                    report.unchanged += 1;
                    continue;
                }
                let existing_path = self.layout.archive_path(&existing.relative_path);
                if seen.contains(&name) || self.runtime.exists(&existing_path) {
                    self.quarantine_into(
                        path,
                        Quarantine::Redundant,
                        format!("{} is already indexed at {:?}", name, existing_path),
                        &mut report,
                        reporter,
                    );
                    continue;
                }
                catalog.relocate(&name, &relative);
                info!("{} moved to {:?}", name, relative);
                report.relocated.push(name.clone());
                seen.insert(name);
                continue;
            }

            match indexer.index(path) {
                Ok(indexed) => {
                    catalog.upsert(indexed);
                    report.added.push(name.clone());
                    seen.insert(name);
                }
                Err(e) if e.should_quarantine() => {
                    self.quarantine_into(
                        path,
                        Quarantine::Malformed,
                        e.to_string(),
                        &mut report,
                        reporter,
                    );
                }
                Err(e) => {
                    reporter.error(&e.to_string());
                    report.failed.push((path.clone(), e.to_string()));
                }
            }
        }

        let gone: Vec<PackageName> = catalog
            .names()
            .filter(|n| !seen.contains(*n))
            .cloned()
            .collect();
        for name in gone {
            let link = manager
                .link_of(&name)
                .map_or_else(|| self.activation.link_path(&name), Path::to_path_buf);
            if let Err(e) = self.forget(&mut catalog, &mut manager, &name) {
                reporter.error(&e.to_string());
                report.failed.push((link, e.to_string()));
            }
            info!("{} is gone from the repository", name);
            report.removed.push(name);
        }

        catalog.replace_activation(manager.states());
        self.persist(&catalog)?;
        reporter.info(&format!(
            "{} added, {} relocated, {} removed, {} quarantined",
            report.added.len(),
            report.relocated.len(),
            report.removed.len(),
            report.quarantined.len()
        ));
        Ok(report)
    }

    fn quarantine_into(
        &self,
        path: &Path,
        kind: Quarantine,
        reason: String,
        report: &mut UpdateReport,
        reporter: &dyn Reporter,
    ) {
        match self.quarantine(path, kind) {
            Ok(dest) => {
                reporter.warn(&format!("{:?} quarantined as {}: {}", path, kind, reason));
                report.quarantined.push((dest, kind, reason));
            }
            Err(e) => {
                reporter.error(&format!("Cannot quarantine {:?}: {:#}", path, e));
                report.failed.push((path.to_path_buf(), reason));
            }
        }
    }

    /// Re-read activation state from the activation root.
    pub fn refresh_activation(&self) -> Result<usize> {
        let (catalog, _) = self.batch()?;
        self.persist(&catalog)?;
        Ok(catalog.active().count())
    }

    /// Activate `references` (names, possibly `latest` or approximate), and
    /// their dependencies when `with_dependencies` is set.
    #[tracing::instrument(skip(self, reporter))]
    pub fn install(
        &self,
        references: &[String],
        with_dependencies: bool,
        reporter: &dyn Reporter,
    ) -> Result<InstallReport> {
        let (mut catalog, mut manager) = self.batch()?;
        let mut report = InstallReport::default();

        let targets = if with_dependencies {
            let closure = ClosureEngine::new(&catalog, self.policy).forward(references);
            report.unresolved = closure.missing.into_iter().collect();
            report.approximate = closure.approximate.into_iter().collect();
            closure.members
        } else {
            let mut targets = Vec::new();
            for reference in references {
                let resolution = catalog.resolve(reference, self.policy);
                match resolution.package() {
                    Some(name) => {
                        if resolution.is_approximate() {
                            report.approximate.push((reference.clone(), name.clone()));
                        }
                        targets.push(name.clone());
                    }
                    None => report.unresolved.push(reference.clone()),
                }
            }
            targets
        };
        for reference in &report.unresolved {
            reporter.warn(&format!("{} is not in the repository", reference));
        }
        for (reference, name) in &report.approximate {
            reporter.warn(&format!(
                "{} satisfied by {}{}",
                reference, name, APPROXIMATE_MARKER
            ));
        }

        let items: Vec<(PackageName, PathBuf)> = targets
            .into_iter()
            .filter_map(|name| self.source_path(&catalog, &name).map(|p| (name, p)))
            .collect();
        report.outcomes = manager.install_all(&items, reporter);
        for outcome in report.outcomes.iter().filter(|o| o.is_ok()) {
            catalog.set_activation(&outcome.name, manager.state(&outcome.name));
        }
        self.persist(&catalog)?;
        Ok(report)
    }

    /// The active packages an uninstall of `names` would take down.
    pub fn preview_uninstall(&self, names: &[PackageName]) -> Result<UninstallPreview> {
        let catalog = self.read()?;
        Ok(self.uninstall_plan(&catalog, &self.manager(), names))
    }

    fn uninstall_plan(
        &self,
        catalog: &Catalog,
        manager: &ActivationManager<'a, R>,
        names: &[PackageName],
    ) -> UninstallPreview {
        let engine = ClosureEngine::new(catalog, self.policy);
        let requested: HashSet<&PackageName> = names.iter().collect();
        let mut preview = UninstallPreview::default();
        for name in engine.implicated_by(names) {
            if !manager.state(&name).is_active() {
                continue;
            }
            if requested.contains(&name) {
                preview.requested.push(name);
            } else {
                preview.implicated.push(name);
            }
        }
        preview
    }

    #[tracing::instrument(skip(self, reporter))]
    pub fn uninstall(
        &self,
        names: &[PackageName],
        include_implicated: bool,
        reporter: &dyn Reporter,
    ) -> Result<Vec<ItemOutcome<()>>> {
        let (mut catalog, mut manager) = self.batch()?;
        let targets = if include_implicated {
            self.uninstall_plan(&catalog, &manager, names).all()
        } else {
            names.to_vec()
        };
        let outcomes = manager.uninstall_all(&targets, reporter);
        for outcome in outcomes.iter().filter(|o| o.is_ok()) {
            catalog.set_activation(&outcome.name, ActivationState::NotInstalled);
        }
        self.persist(&catalog)?;
        Ok(outcomes)
    }

    #[tracing::instrument(skip(self, reporter))]
    pub fn disable(
        &self,
        names: &[PackageName],
        reporter: &dyn Reporter,
    ) -> Result<Vec<ItemOutcome<()>>> {
        let (mut catalog, mut manager) = self.batch()?;
        let outcomes = manager.disable_all(names, reporter);
        for outcome in outcomes.iter().filter(|o| o.is_ok()) {
            catalog.set_activation(&outcome.name, ActivationState::Disabled);
        }
        self.persist(&catalog)?;
        Ok(outcomes)
    }

    /// Move the activation of `old` to `new`.
    pub fn switch_version(&self, old: &PackageName, new: &PackageName) -> Result<()> {
        let (mut catalog, mut manager) = self.batch()?;
        if !old.same_lineage(new) {
            anyhow::bail!("{} and {} are not versions of the same package", old, new);
        }
        let source = self
            .source_path(&catalog, new)
            .ok_or_else(|| ActivationError::UnknownPackage(new.to_string()))?;
        manager.switch(old, new, &source)?;
        catalog.set_activation(old, ActivationState::NotInstalled);
        catalog.set_activation(new, manager.state(new));
        self.persist(&catalog)
    }

    /// Everything a cascading delete of `names` would remove, active or not.
    pub fn preview_delete(&self, names: &[PackageName]) -> Result<Vec<PackageName>> {
        let catalog = self.read()?;
        Ok(ClosureEngine::new(&catalog, self.policy).implicated_by(names))
    }

    /// Deactivate and move archives to the deleted quarantine, then forget
    /// them. With `include_implicated`, everything depending on them goes too.
    #[tracing::instrument(skip(self, reporter))]
    pub fn delete(
        &self,
        names: &[PackageName],
        include_implicated: bool,
        reporter: &dyn Reporter,
    ) -> Result<RemovalReport> {
        let (mut catalog, mut manager) = self.batch()?;
        let targets = if include_implicated {
            ClosureEngine::new(&catalog, self.policy).implicated_by(names)
        } else {
            names.to_vec()
        };
        let report = self.remove_packages(
            &mut catalog,
            &mut manager,
            &targets,
            Quarantine::Deleted,
            reporter,
        );
        self.persist(&catalog)?;
        Ok(report)
    }

    fn remove_packages(
        &self,
        catalog: &mut Catalog,
        manager: &mut ActivationManager<'a, R>,
        names: &[PackageName],
        kind: Quarantine,
        reporter: &dyn Reporter,
    ) -> RemovalReport {
        let mut report = RemovalReport::default();
        let total = names.len();
        for (i, name) in names.iter().enumerate() {
            reporter.progress(i + 1, total);
            match self.remove_package(catalog, manager, name, kind) {
                Ok(dest) => {
                    reporter.info(&format!("{} moved to {:?}", name, dest));
                    report.moved.push((name.clone(), dest));
                }
                Err(e) => {
                    reporter.warn(&format!("Cannot remove {}: {:#}", name, e));
                    report.failed.push((name.clone(), format!("{:#}", e)));
                }
            }
        }
        report
    }

    fn remove_package(
        &self,
        catalog: &mut Catalog,
        manager: &mut ActivationManager<'a, R>,
        name: &PackageName,
        kind: Quarantine,
    ) -> Result<PathBuf> {
        let source = self
            .source_path(catalog, name)
            .ok_or_else(|| ActivationError::UnknownPackage(name.to_string()))?;
        if manager.state(name).is_active() {
            manager.uninstall(name)?;
            catalog.set_activation(name, ActivationState::NotInstalled);
        }
        let dest = self.quarantine(&source, kind)?;
        self.forget(catalog, manager, name)?;
        Ok(dest)
    }

    /// Unresolved dependencies of the packages in `scope`. Approximate
    /// resolutions are reported to `reporter` as warnings.
    pub fn missing_dependencies(
        &self,
        scope: &MissingScope,
        locator: Option<&dyn DownloadLocator>,
        reporter: &dyn Reporter,
    ) -> Result<MissingReport> {
        let catalog = self.read()?;
        let roots: Vec<PackageName> = match scope {
            MissingScope::Installed => self
                .manager()
                .states()
                .into_iter()
                .map(|(n, _)| n)
                .filter(|n| catalog.contains(n))
                .collect(),
            MissingScope::All => catalog.names().cloned().collect(),
            MissingScope::Packages(names) => names.clone(),
        };
        let mut report = ClosureEngine::new(&catalog, self.policy).missing_dependencies(&roots);
        for (reference, name) in &report.approximate {
            reporter.warn(&format!(
                "{} satisfied by {}{}",
                reference, name, APPROXIMATE_MARKER
            ));
        }
        if let Some(locator) = locator {
            report.annotate(locator);
        }
        Ok(report)
    }

    /// Move old, inactive, unreferenced versions to the stale quarantine.
    #[tracing::instrument(skip(self, reporter))]
    pub fn sweep_stale(&self, reporter: &dyn Reporter) -> Result<RemovalReport> {
        let (mut catalog, mut manager) = self.batch()?;
        let plan = plan_stale(&catalog);
        let report =
            self.remove_packages(&mut catalog, &mut manager, &plan, Quarantine::Stale, reporter);
        self.persist(&catalog)?;
        Ok(report)
    }

    /// Move the activation of old active versions to the latest version and
    /// quarantine the old archives.
    #[tracing::instrument(skip(self, reporter))]
    pub fn sweep_superseded(&self, reporter: &dyn Reporter) -> Result<RemovalReport> {
        let (mut catalog, mut manager) = self.batch()?;
        let plan = plan_superseded(&catalog);
        let mut report = RemovalReport::default();
        let total = plan.len();

        for (i, step) in plan.iter().enumerate() {
            reporter.progress(i + 1, total);
            let result = self.retire(&mut catalog, &mut manager, &step.old, &step.latest);
            match result {
                Ok(dest) => {
                    reporter.info(&format!("{} replaced by {}", step.old, step.latest));
                    report.moved.push((step.old.clone(), dest));
                }
                Err(e) => {
                    reporter.warn(&format!("Cannot retire {}: {:#}", step.old, e));
                    report.failed.push((step.old.clone(), format!("{:#}", e)));
                }
            }
        }
        self.persist(&catalog)?;
        Ok(report)
    }

    fn retire(
        &self,
        catalog: &mut Catalog,
        manager: &mut ActivationManager<'a, R>,
        old: &PackageName,
        latest: &PackageName,
    ) -> Result<PathBuf> {
        let source = self
            .source_path(catalog, latest)
            .ok_or_else(|| ActivationError::UnknownPackage(latest.to_string()))?;
        manager.switch(old, latest, &source)?;
        catalog.set_activation(old, ActivationState::NotInstalled);
        catalog.set_activation(latest, manager.state(latest));
        self.remove_package(catalog, manager, old, Quarantine::Superseded)
    }

    /// Re-point links at the current archive locations. With
    /// `alternate_root`, the links under that activation root are rebuilt
    /// instead of the configured one. With `include_missing`, parked links
    /// whose package is back are restored.
    #[tracing::instrument(skip(self, reporter))]
    pub fn rebuild_links(
        &self,
        alternate_root: Option<&Path>,
        include_missing: bool,
        reporter: &dyn Reporter,
    ) -> Result<RebuildReport> {
        let mut catalog = self.write()?;
        let layout = alternate_root
            .map(ActivationLayout::new)
            .unwrap_or_else(|| self.activation.clone());
        let mut manager = ActivationManager::open(self.runtime, layout);
        let source_of = |name: &PackageName| self.source_path(&catalog, name);
        let report = manager.rebuild_links(&source_of, include_missing, reporter);
        if alternate_root.is_none() {
            catalog.replace_activation(manager.states());
            self.persist(&catalog)?;
        }
        if !report.orphaned.is_empty() {
            warn!("{} links point at unknown packages", report.orphaned.len());
        }
        Ok(report)
    }

    /// Make the archive of `substitute` stand in for the missing
    /// `reference`, through a link in the activation root's missing area.
    /// Returns the package used and the link.
    #[tracing::instrument(skip(self))]
    pub fn link_substitute(
        &self,
        reference: &PackageName,
        substitute: &PackageName,
    ) -> Result<(PackageName, PathBuf)> {
        let (catalog, manager) = self.batch()?;
        let resolution = catalog.resolve_name(substitute, self.policy);
        let substitute = resolution
            .package()
            .filter(|_| !resolution.is_approximate())
            .ok_or_else(|| ActivationError::UnknownPackage(substitute.to_string()))?;
        let source = self
            .source_path(&catalog, substitute)
            .ok_or_else(|| ActivationError::UnknownPackage(substitute.to_string()))?;
        let link = manager.link_substitute(reference, substitute, &source)?;
        Ok((substitute.clone(), link))
    }
}
