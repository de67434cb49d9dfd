//! Activation state machine.
//!
//! A package is active when a link to its archive exists in the activation
//! root's link directory, and disabled when a `.disabled` marker sits next to
//! that link. Transitions:
//!
//! - NotInstalled -> Installed: create the link
//! - Installed -> Disabled: create the marker
//! - Installed | Disabled -> NotInstalled: remove link and marker
//!
//! At most one version of a lineage is active at a time; `switch` moves the
//! activation from one version to another and puts the old link back if the
//! new one cannot be created.

mod layout;

use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::ActivationError;
use crate::package::{ActivationState, PackageName, VersionSpec, is_archive};
use crate::relocate::move_into;
use crate::report::Reporter;
use crate::runtime::Runtime;

pub use layout::{ActivationLayout, DISABLED_SUFFIX, LINK_DIR, MISSING_DIR};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    Installed,
    /// A link was already there; nothing changed.
    AlreadyInstalled,
}

/// Result for one item of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemOutcome<T> {
    pub name: PackageName,
    pub result: Result<T, ActivationError>,
}

impl<T> ItemOutcome<T> {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// What a link rebuild did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RebuildReport {
    pub relinked: Vec<PackageName>,
    /// Parked links moved back into the link directory.
    pub restored: Vec<PackageName>,
    /// Links moved to the missing area, at their new location.
    pub orphaned: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, String)>,
}

/// Collect every link below `dir`, sorted.
fn scan_links<R: Runtime>(runtime: &R, dir: &Path) -> Vec<PathBuf> {
    let mut links = Vec::new();
    if !runtime.is_dir(dir) {
        return links;
    }
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        let entries = match runtime.read_dir(&current) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Cannot list {:?}: {}", current, e);
                continue;
            }
        };
        for entry in entries {
            if runtime.is_symlink(&entry) {
                if is_archive(&entry) {
                    links.push(entry);
                }
            } else if runtime.is_dir(&entry) {
                pending.push(entry);
            }
        }
    }
    links.sort();
    links
}

pub struct ActivationManager<'a, R: Runtime> {
    runtime: &'a R,
    layout: ActivationLayout,
    /// Active name -> its link.
    links: BTreeMap<PackageName, PathBuf>,
}

impl<'a, R: Runtime> ActivationManager<'a, R> {
    /// Read the current activation state from disk.
    #[tracing::instrument(skip(runtime))]
    pub fn open(runtime: &'a R, layout: ActivationLayout) -> Self {
        let mut manager = Self {
            runtime,
            layout,
            links: BTreeMap::new(),
        };
        manager.reload();
        manager
    }

    pub fn layout(&self) -> &ActivationLayout {
        &self.layout
    }

    fn reload(&mut self) {
        self.links.clear();
        for link in scan_links(self.runtime, &self.layout.link_dir()) {
            match PackageName::from_archive_path(&link) {
                Ok(name) if name.exact_version().is_some() => {
                    if let Some(first) = self.links.get(&name) {
                        warn!("{} is linked twice: {:?} and {:?}", name, first, link);
                        continue;
                    }
                    self.links.insert(name, link);
                }
                _ => debug!("Ignoring link {:?} with unusable name", link),
            }
        }
    }

    pub fn state(&self, name: &PackageName) -> ActivationState {
        match self.links.get(name) {
            None => ActivationState::NotInstalled,
            Some(link) if self.runtime.exists(&ActivationLayout::marker_for(link)) => {
                ActivationState::Disabled
            }
            Some(_) => ActivationState::Installed,
        }
    }

    /// The link that makes `name` active.
    pub fn link_of(&self, name: &PackageName) -> Option<&Path> {
        self.links.get(name).map(PathBuf::as_path)
    }

    /// Every active package with its state.
    pub fn states(&self) -> Vec<(PackageName, ActivationState)> {
        self.links
            .keys()
            .map(|name| (name.clone(), self.state(name)))
            .collect()
    }

    /// Another active version of `name`'s lineage, if any.
    pub fn active_sibling(&self, name: &PackageName) -> Option<&PackageName> {
        self.links
            .keys()
            .find(|other| other.same_lineage(name) && *other != name)
    }

    fn creation_failed(name: &PackageName, e: impl std::fmt::Display) -> ActivationError {
        ActivationError::LinkCreationFailed {
            name: name.clone(),
            reason: e.to_string(),
        }
    }

    fn removal_failed(name: &PackageName, e: impl std::fmt::Display) -> ActivationError {
        ActivationError::LinkRemovalFailed {
            name: name.clone(),
            reason: e.to_string(),
        }
    }

    /// NotInstalled -> Installed. Idempotent for packages that already have
    /// a link.
    #[tracing::instrument(skip(self))]
    pub fn install(
        &mut self,
        name: &PackageName,
        source: &Path,
    ) -> Result<InstallOutcome, ActivationError> {
        let link = self.layout.link_path(name);
        if self.links.contains_key(name) {
            return Ok(InstallOutcome::AlreadyInstalled);
        }
        if self.runtime.is_symlink(&link) {
            self.links.insert(name.clone(), link);
            return Ok(InstallOutcome::AlreadyInstalled);
        }
        if let Some(active) = self.active_sibling(name) {
            return Err(ActivationError::LineageConflict {
                name: name.clone(),
                active: active.clone(),
            });
        }
        if !self.runtime.exists(source) {
            return Err(ActivationError::SourceMissing {
                name: name.clone(),
                path: source.to_path_buf(),
            });
        }

        self.runtime
            .create_dir_all(&self.layout.link_dir())
            .map_err(|e| Self::creation_failed(name, e))?;
        self.runtime
            .symlink(source, &link)
            .map_err(|e| Self::creation_failed(name, e))?;
        self.stamp(&link, source);
        self.links.insert(name.clone(), link);
        debug!("Installed {} -> {:?}", name, source);
        Ok(InstallOutcome::Installed)
    }

    /// Give the link its source's timestamps. Failure only costs ordering
    /// in the consumer, so it is not an error.
    fn stamp(&self, link: &Path, source: &Path) {
        let stamped = self.runtime.metadata(source).and_then(|info| {
            self.runtime.set_link_times(
                link,
                info.created.unwrap_or(info.modified),
                info.modified,
            )
        });
        if let Err(e) = stamped {
            warn!("Cannot set times on {:?}: {}", link, e);
        }
    }

    /// Installed -> Disabled. Disabling a disabled package is a no-op.
    #[tracing::instrument(skip(self))]
    pub fn disable(&mut self, name: &PackageName) -> Result<(), ActivationError> {
        let link = match (self.state(name), self.links.get(name)) {
            (ActivationState::Disabled, _) => return Ok(()),
            (ActivationState::Installed, Some(link)) => link.clone(),
            (from, _) => {
                return Err(ActivationError::IllegalTransition {
                    name: name.clone(),
                    from,
                    to: ActivationState::Disabled,
                });
            }
        };
        self.runtime
            .write(&ActivationLayout::marker_for(&link), b"")
            .map_err(|e| Self::creation_failed(name, e))
    }

    /// Installed | Disabled -> NotInstalled.
    #[tracing::instrument(skip(self))]
    pub fn uninstall(&mut self, name: &PackageName) -> Result<(), ActivationError> {
        let Some(link) = self.links.get(name).cloned() else {
            return Err(ActivationError::IllegalTransition {
                name: name.clone(),
                from: ActivationState::NotInstalled,
                to: ActivationState::NotInstalled,
            });
        };
        self.runtime
            .remove_symlink(&link)
            .map_err(|e| Self::removal_failed(name, e))?;
        self.links.remove(name);

        let marker = ActivationLayout::marker_for(&link);
        if self.runtime.exists(&marker)
            && let Err(e) = self.runtime.remove_file(&marker)
        {
            warn!("Cannot remove disable marker {:?}: {}", marker, e);
        }
        debug!("Uninstalled {}", name);
        Ok(())
    }

    /// Move the activation of `old` to `new` (same lineage), carrying the
    /// disabled flag over. If `new` cannot be linked, `old` is restored.
    #[tracing::instrument(skip(self))]
    pub fn switch(
        &mut self,
        old: &PackageName,
        new: &PackageName,
        new_source: &Path,
    ) -> Result<(), ActivationError> {
        let from = self.state(old);
        let Some(old_link) = self.links.get(old).cloned() else {
            return Err(ActivationError::IllegalTransition {
                name: old.clone(),
                from,
                to: ActivationState::NotInstalled,
            });
        };
        let was_disabled = from == ActivationState::Disabled;
        let old_target = self
            .runtime
            .read_link(&old_link)
            .map_err(|e| Self::removal_failed(old, e))?;

        self.uninstall(old)?;
        if let Err(e) = self.install(new, new_source) {
            self.restore(old, &old_link, &old_target, was_disabled);
            return Err(e);
        }
        if was_disabled {
            self.disable(new)?;
        }
        info!("Switched {} to {}", old, new);
        Ok(())
    }

    fn restore(&mut self, name: &PackageName, link: &Path, target: &Path, disabled: bool) {
        if let Err(e) = self.runtime.symlink(target, link) {
            warn!("Cannot restore link for {}: {}", name, e);
            return;
        }
        self.links.insert(name.clone(), link.to_path_buf());
        if disabled
            && let Err(e) = self
                .runtime
                .write(&ActivationLayout::marker_for(link), b"")
        {
            warn!("Cannot restore disable marker for {}: {}", name, e);
        }
    }

    /// Install each `(name, source)`; one failure does not stop the rest.
    pub fn install_all(
        &mut self,
        items: &[(PackageName, PathBuf)],
        reporter: &dyn Reporter,
    ) -> Vec<ItemOutcome<InstallOutcome>> {
        let total = items.len();
        let mut outcomes = Vec::with_capacity(total);
        for (i, (name, source)) in items.iter().enumerate() {
            let result = self.install(name, source);
            if let Err(e) = &result {
                reporter.warn(&e.to_string());
            }
            outcomes.push(ItemOutcome {
                name: name.clone(),
                result,
            });
            reporter.progress(i + 1, total);
        }
        outcomes
    }

    pub fn uninstall_all(
        &mut self,
        names: &[PackageName],
        reporter: &dyn Reporter,
    ) -> Vec<ItemOutcome<()>> {
        self.for_each(names, reporter, Self::uninstall)
    }

    pub fn disable_all(
        &mut self,
        names: &[PackageName],
        reporter: &dyn Reporter,
    ) -> Vec<ItemOutcome<()>> {
        self.for_each(names, reporter, Self::disable)
    }

    fn for_each(
        &mut self,
        names: &[PackageName],
        reporter: &dyn Reporter,
        op: fn(&mut Self, &PackageName) -> Result<(), ActivationError>,
    ) -> Vec<ItemOutcome<()>> {
        let total = names.len();
        let mut outcomes = Vec::with_capacity(total);
        for (i, name) in names.iter().enumerate() {
            let result = op(self, name);
            if let Err(e) = &result {
                reporter.warn(&e.to_string());
            }
            outcomes.push(ItemOutcome {
                name: name.clone(),
                result,
            });
            reporter.progress(i + 1, total);
        }
        outcomes
    }

    /// Re-point every link at the current archive of the package it names.
    ///
    /// The package is taken from the link target's file name, falling back
    /// to the link's own name. `source_of` answers with the archive path of
    /// a cataloged package; links it does not know are parked in the
    /// missing area. With `include_missing`, parked links whose package is
    /// known again are moved back, and substitute links are re-pointed in
    /// place.
    #[tracing::instrument(skip(self, source_of, reporter))]
    pub fn rebuild_links(
        &mut self,
        source_of: &dyn Fn(&PackageName) -> Option<PathBuf>,
        include_missing: bool,
        reporter: &dyn Reporter,
    ) -> RebuildReport {
        let mut report = RebuildReport::default();
        let links = scan_links(self.runtime, &self.layout.link_dir());
        let parked = if include_missing {
            scan_links(self.runtime, &self.layout.missing_dir())
        } else {
            Vec::new()
        };
        let total = links.len() + parked.len();

        for (i, link) in links.iter().enumerate() {
            match self.target_of(link, source_of) {
                Some((name, source)) => match self.relink(link, &source) {
                    Ok(()) => report.relinked.push(name),
                    Err(e) => {
                        reporter.warn(&format!("Cannot relink {:?}: {}", link, e));
                        report.failed.push((link.clone(), e.to_string()));
                    }
                },
                None => match self.park(link) {
                    Ok(dest) => {
                        reporter.warn(&format!("{:?} points at an unknown package", link));
                        report.orphaned.push(dest);
                    }
                    Err(e) => report.failed.push((link.clone(), e.to_string())),
                },
            }
            reporter.progress(i + 1, total);
        }
        self.reload();

        for (i, link) in parked.iter().enumerate() {
            reporter.progress(links.len() + i + 1, total);
            let Some((name, source)) = self.target_of(link, source_of) else {
                debug!("{:?} still points at an unknown package", link);
                continue;
            };
            let own_name = PackageName::from_archive_path(link).ok();
            let restorable = own_name.as_ref() == Some(&name)
                && !self.links.contains_key(&name)
                && self.active_sibling(&name).is_none()
                && !self.runtime.is_symlink(&self.layout.link_path(&name));

            let result = if restorable {
                self.unpark(link, &name, &source)
            } else {
                self.relink(link, &source)
            };
            match result {
                Ok(()) if restorable => {
                    info!("Restored link for {}", name);
                    report.restored.push(name);
                }
                Ok(()) => report.relinked.push(name),
                Err(e) => {
                    reporter.warn(&format!("Cannot relink {:?}: {}", link, e));
                    report.failed.push((link.clone(), e.to_string()));
                }
            }
        }

        self.reload();
        report
    }

    /// The package a link stands for, with its current archive.
    fn target_of(
        &self,
        link: &Path,
        source_of: &dyn Fn(&PackageName) -> Option<PathBuf>,
    ) -> Option<(PackageName, PathBuf)> {
        let name = self
            .runtime
            .read_link(link)
            .ok()
            .and_then(|target| PackageName::from_archive_path(&target).ok())
            .or_else(|| PackageName::from_archive_path(link).ok())?;
        let source = source_of(&name)?;
        Some((name, source))
    }

    /// Link `reference` in the missing area to `source`, the archive of
    /// `substitute`. A `latest` reference takes the substitute's version.
    /// Earlier substitute links for the same reference are replaced.
    #[tracing::instrument(skip(self))]
    pub fn link_substitute(
        &self,
        reference: &PackageName,
        substitute: &PackageName,
        source: &Path,
    ) -> Result<PathBuf, ActivationError> {
        let link_name = match (reference.exact_version(), substitute.exact_version()) {
            (None, Some(v)) => reference.lineage().at(VersionSpec::Exact(v)),
            _ => reference.clone(),
        };
        if !self.runtime.exists(source) {
            return Err(ActivationError::SourceMissing {
                name: substitute.clone(),
                path: source.to_path_buf(),
            });
        }
        let link = self.layout.missing_path(&link_name);
        if self.runtime.is_symlink(&link) {
            self.runtime
                .remove_symlink(&link)
                .map_err(|e| Self::removal_failed(&link_name, e))?;
            let marker = ActivationLayout::marker_for(&link);
            if self.runtime.exists(&marker)
                && let Err(e) = self.runtime.remove_file(&marker)
            {
                warn!("Cannot remove disable marker {:?}: {}", marker, e);
            }
        }
        self.runtime
            .create_dir_all(&self.layout.missing_dir())
            .map_err(|e| Self::creation_failed(&link_name, e))?;
        self.runtime
            .symlink(source, &link)
            .map_err(|e| Self::creation_failed(&link_name, e))?;
        self.stamp(&link, source);
        info!("{} now stands in for {}", substitute, link_name);
        Ok(link)
    }

    fn relink(&self, link: &Path, source: &Path) -> anyhow::Result<()> {
        if self
            .runtime
            .resolve_link(link)
            .is_ok_and(|target| target == source)
        {
            return Ok(());
        }
        self.runtime.remove_symlink(link)?;
        self.runtime.symlink(source, link)?;
        self.stamp(link, source);
        Ok(())
    }

    /// Move a parked link (and its marker) back into the link directory.
    fn unpark(&self, link: &Path, name: &PackageName, source: &Path) -> anyhow::Result<()> {
        let dest = self.layout.link_path(name);
        self.runtime.create_dir_all(&self.layout.link_dir())?;
        self.runtime.rename(link, &dest)?;
        let marker = ActivationLayout::marker_for(link);
        if self.runtime.exists(&marker) {
            self.runtime
                .rename(&marker, &ActivationLayout::marker_for(&dest))?;
        }
        self.relink(&dest, source)
    }

    /// Move an orphan link (and its marker) to the missing area.
    fn park(&self, link: &Path) -> anyhow::Result<PathBuf> {
        let missing = self.layout.missing_dir();
        let dest = move_into(self.runtime, link, &missing)?;
        let marker = ActivationLayout::marker_for(link);
        if self.runtime.exists(&marker) {
            self.runtime
                .rename(&marker, &ActivationLayout::marker_for(&dest))?;
        }
        Ok(dest)
    }
}
