//! Switch/restore engine: keeps the live workspace consistent with the ledger.
//!
//! Every mutating operation is copy-then-commit: managed files are written into
//! the workspace first (each one atomically), and the ledger is only updated once
//! all copies succeeded. A crash between the two leaves the old ledger, so the
//! next `restore` re-applies the old personality.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::SwitcherConfig;
use crate::error::{Error, Result};
use crate::fsutil;
use crate::workspace::ResolvedPaths;

use super::backup::{BackupStore, PruneReport, RetentionPolicy};
use super::ledger::StateLedger;
use super::store::{present_files, PersonalityStore};
use super::types::{
    ActiveState, CreateSource, DeletePlan, PersonalityInfo, PersonalityName, ProfileLayout,
};

// ─────────────────────────────────────────────────────────────────
// Outcomes
// ─────────────────────────────────────────────────────────────────

/// Health of the ledger file as seen by one read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerHealth {
    Ok,
    Missing,
    Corrupt,
}

/// Which managed files one apply pass touched.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ApplyReport {
    pub written: Vec<String>,
    pub removed: Vec<String>,
    pub unchanged: Vec<String>,
}

impl ApplyReport {
    pub fn is_noop(&self) -> bool {
        self.written.is_empty() && self.removed.is_empty()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SwitchOutcome {
    pub active: PersonalityName,
    pub previous: Option<PersonalityName>,
    /// The target was already active; files were re-applied, ledger untouched.
    pub already_active: bool,
    pub files: ApplyReport,
    pub backup: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RestoreOutcome {
    pub active: PersonalityName,
    /// What the ledger asked for, when it was readable.
    pub requested: Option<PersonalityName>,
    pub fell_back: bool,
    pub ledger: LedgerHealth,
    pub ledger_written: bool,
    pub files: ApplyReport,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeleteOutcome {
    pub deleted: PersonalityName,
    pub switched_to_default: bool,
    pub active: PersonalityName,
    pub backup: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RenameOutcome {
    pub from: PersonalityName,
    pub to: PersonalityName,
    pub ledger_updated: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub ledger: LedgerHealth,
    pub ledger_path: PathBuf,
    pub active: Option<PersonalityName>,
    pub previous: Option<PersonalityName>,
    /// The personality `restore` would apply right now.
    pub effective: PersonalityName,
    pub effective_valid: bool,
    /// Managed files whose workspace content differs from the effective personality.
    pub drifted: Vec<String>,
    pub workspace: PathBuf,
    pub store: PathBuf,
    pub personalities: usize,
    pub backups: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct InitOutcome {
    pub created: bool,
    pub source: Option<String>,
    pub ledger_written: bool,
    pub files: ApplyReport,
}

// ─────────────────────────────────────────────────────────────────
// Switch Engine
// ─────────────────────────────────────────────────────────────────

/// Drives switch, restore, and delete over a store, a ledger, and a workspace.
pub struct SwitchEngine {
    workspace: PathBuf,
    store: PersonalityStore,
    ledger: StateLedger,
    backups: BackupStore,
    backups_enabled: bool,
}

impl SwitchEngine {
    pub fn new(
        workspace: PathBuf,
        store: PersonalityStore,
        ledger: StateLedger,
        backups: BackupStore,
    ) -> Self {
        Self {
            workspace,
            store,
            ledger,
            backups,
            backups_enabled: true,
        }
    }

    /// Build an engine for resolved paths and the loaded config.
    pub fn from_config(paths: &ResolvedPaths, config: &SwitcherConfig) -> Self {
        Self::new(
            paths.workspace_dir.clone(),
            PersonalityStore::new(paths.store_dir.clone(), ProfileLayout::from(&config.profile)),
            StateLedger::new(paths.ledger_path.clone()),
            BackupStore::new(paths.backup_dir.clone()),
        )
        .with_backups_enabled(config.backup.enabled)
    }

    pub fn with_backups_enabled(mut self, enabled: bool) -> Self {
        self.backups_enabled = enabled;
        self
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    pub fn store(&self) -> &PersonalityStore {
        &self.store
    }

    pub fn ledger(&self) -> &StateLedger {
        &self.ledger
    }

    pub fn backups(&self) -> &BackupStore {
        &self.backups
    }

    /// The live personality, with an empty ledger meaning `default`.
    fn effective_active(&self) -> PersonalityName {
        self.ledger
            .read()
            .unwrap_or_else(PersonalityName::default_personality)
    }

    // ─────────────────────────────────────────────────────────────
    // Switch
    // ─────────────────────────────────────────────────────────────

    pub fn switch(&self, name: &PersonalityName) -> Result<SwitchOutcome> {
        self.store.validate(name)?;

        let current = self.ledger.read_state();
        let outgoing = current.as_ref().map(|s| s.active.clone());
        let already_active = outgoing.as_ref() == Some(name);

        // Nothing to lose when the workspace already holds the target's files.
        let backup = if self.drift(name)?.is_empty() {
            None
        } else {
            let label = outgoing
                .clone()
                .unwrap_or_else(PersonalityName::default_personality);
            self.snapshot_workspace(&label)?
        };

        let files = self.apply(name)?;

        // The folder may have been removed while we were copying.
        if !self.store.exists(name) {
            return Err(Error::not_found(name.as_str()));
        }

        let previous = if already_active {
            current.and_then(|s| s.previous)
        } else {
            self.ledger.write(name, outgoing.as_ref())?;
            outgoing
        };

        info!(
            personality = %name,
            previous = ?previous.as_ref().map(|p| p.as_str()),
            written = files.written.len(),
            removed = files.removed.len(),
            "Switched personality"
        );

        Ok(SwitchOutcome {
            active: name.clone(),
            previous,
            already_active,
            files,
            backup,
        })
    }

    // ─────────────────────────────────────────────────────────────
    // Restore
    // ─────────────────────────────────────────────────────────────

    /// Re-apply the ledger's personality to the workspace.
    ///
    /// Safe to call on every heartbeat: with nothing changed it writes nothing.
    pub fn restore(&self) -> Result<RestoreOutcome> {
        let (ledger, state) = match self.ledger.read_checked() {
            Ok(Some(state)) => (LedgerHealth::Ok, Some(state)),
            Ok(None) => (LedgerHealth::Missing, None),
            Err(e) => {
                warn!(error = %e, "State ledger unreadable, restoring 'default'");
                (LedgerHealth::Corrupt, None)
            }
        };

        let requested = state.as_ref().map(|s| s.active.clone());
        let wanted = requested
            .clone()
            .unwrap_or_else(PersonalityName::default_personality);

        let (active, fell_back) = if self.store.is_valid(&wanted) {
            (wanted.clone(), false)
        } else if wanted.is_default() {
            return Err(self.no_valid_personality(&wanted));
        } else {
            let default = PersonalityName::default_personality();
            if !self.store.is_valid(&default) {
                return Err(self.no_valid_personality(&wanted));
            }
            warn!(requested = %wanted, "Active personality is unusable, falling back to 'default'");
            (default, true)
        };

        let files = self.apply(&active)?;

        let ledger_written = ledger != LedgerHealth::Ok || fell_back;
        if ledger_written {
            let previous = if fell_back {
                Some(wanted)
            } else {
                state.and_then(|s| s.previous)
            };
            self.ledger.write(&active, previous.as_ref())?;
        }

        if files.is_noop() && !ledger_written {
            debug!(personality = %active, "Workspace already consistent");
        } else {
            info!(
                personality = %active,
                fell_back,
                written = files.written.len(),
                removed = files.removed.len(),
                "Restored personality"
            );
        }

        Ok(RestoreOutcome {
            active,
            requested,
            fell_back,
            ledger,
            ledger_written,
            files,
        })
    }

    fn no_valid_personality(&self, wanted: &PersonalityName) -> Error {
        let reason = if wanted.is_default() {
            "'default' is missing or incomplete".to_string()
        } else {
            format!("'{}' and 'default' are both missing or incomplete", wanted)
        };
        Error::NoValidPersonality { reason }
    }

    // ─────────────────────────────────────────────────────────────
    // Delete
    // ─────────────────────────────────────────────────────────────

    pub fn delete(&self, name: &PersonalityName) -> Result<DeleteOutcome> {
        self.delete_with(name, |_| self.store.remove(name))
    }

    /// Delete `name`, removing its folder with `remove_dir`.
    pub(crate) fn delete_with<F>(
        &self,
        name: &PersonalityName,
        remove_dir: F,
    ) -> Result<DeleteOutcome>
    where
        F: FnOnce(&Path) -> io::Result<()>,
    {
        let active = self.ledger.read();
        let plan = DeletePlan::for_target(name, active.as_ref())?;
        self.store.path_for(name)?;

        match plan {
            DeletePlan::Remove => {
                let backup = self.remove(name, remove_dir)?;
                info!(personality = %name, "Personality deleted");
                Ok(DeleteOutcome {
                    deleted: name.clone(),
                    switched_to_default: false,
                    active: active.unwrap_or_else(PersonalityName::default_personality),
                    backup,
                })
            }
            DeletePlan::SwitchToDefaultThenRemove => {
                let default = PersonalityName::default_personality();
                self.switch(&default)
                    .map_err(|e| Error::ImplicitSwitchFailed {
                        name: name.to_string(),
                        source: Box::new(e),
                    })?;

                let backup = self
                    .remove(name, remove_dir)
                    .map_err(|e| Error::DeleteFailedAfterSwitch {
                        name: name.to_string(),
                        message: e.to_string(),
                    })?;

                info!(personality = %name, "Active personality deleted, 'default' is now active");
                Ok(DeleteOutcome {
                    deleted: name.clone(),
                    switched_to_default: true,
                    active: default,
                    backup,
                })
            }
        }
    }

    /// Back up and remove an inactive personality.
    fn remove<F>(&self, name: &PersonalityName, remove_dir: F) -> Result<Option<PathBuf>>
    where
        F: FnOnce(&Path) -> io::Result<()>,
    {
        let backup = if self.backups_enabled {
            let files = self.store.profile_files(name)?;
            self.backups.snapshot(name.as_str(), &files)?.map(|b| b.path)
        } else {
            None
        };

        let dir = self.store.dir_for(name);
        remove_dir(&dir).map_err(|source| Error::DeleteFailed {
            name: name.to_string(),
            path: dir,
            source,
        })?;
        Ok(backup)
    }

    // ─────────────────────────────────────────────────────────────
    // Create / Rename / List
    // ─────────────────────────────────────────────────────────────

    pub fn create(
        &self,
        name: &PersonalityName,
        source: &CreateSource,
        description: Option<String>,
    ) -> Result<PersonalityInfo> {
        self.store
            .create(name, source, &self.workspace, description)?;
        self.store.info(name, Some(&self.effective_active()))
    }

    /// Rename a personality; the ledger follows when it names `old`.
    pub fn rename(&self, old: &PersonalityName, new: &PersonalityName) -> Result<RenameOutcome> {
        let state = self.ledger.read_state();
        self.store.rename(old, new)?;

        let follow = |n: PersonalityName| if &n == old { new.clone() } else { n };
        let ledger_updated = match state {
            Some(ActiveState {
                active, previous, ..
            }) if &active == old || previous.as_ref() == Some(old) => {
                self.ledger
                    .write(&follow(active), previous.map(&follow).as_ref())?;
                true
            }
            _ => false,
        };

        Ok(RenameOutcome {
            from: old.clone(),
            to: new.clone(),
            ledger_updated,
        })
    }

    pub fn list(&self) -> Result<Vec<PersonalityInfo>> {
        let active = self.effective_active();
        self.store
            .list()?
            .iter()
            .map(|name| self.store.info(name, Some(&active)))
            .collect()
    }

    // ─────────────────────────────────────────────────────────────
    // Status / Init / Cleanup
    // ─────────────────────────────────────────────────────────────

    pub fn status(&self) -> Result<StatusReport> {
        let (ledger, state) = match self.ledger.read_checked() {
            Ok(Some(state)) => (LedgerHealth::Ok, Some(state)),
            Ok(None) => (LedgerHealth::Missing, None),
            Err(_) => (LedgerHealth::Corrupt, None),
        };

        let active = state.as_ref().map(|s| s.active.clone());
        let previous = state.and_then(|s| s.previous);
        let effective = active
            .clone()
            .unwrap_or_else(PersonalityName::default_personality);
        let effective_valid = self.store.is_valid(&effective);

        let drifted = if self.store.exists(&effective) {
            self.drift(&effective)?
        } else {
            Vec::new()
        };

        Ok(StatusReport {
            ledger,
            ledger_path: self.ledger.path().to_path_buf(),
            active,
            previous,
            effective,
            effective_valid,
            drifted,
            workspace: self.workspace.clone(),
            store: self.store.root().to_path_buf(),
            personalities: self.store.list()?.len(),
            backups: self.backups.list()?.len(),
        })
    }

    fn drift(&self, name: &PersonalityName) -> Result<Vec<String>> {
        let dir = self.store.path_for(name)?;
        let mut drifted = Vec::new();
        for file in &self.store.layout().files {
            let want = dir.join(file);
            let have = self.workspace.join(file);
            let want_digest = fsutil::file_digest(&want).map_err(|e| Error::io_read(&want, e))?;
            let have_digest = fsutil::file_digest(&have).map_err(|e| Error::io_read(&have, e))?;
            if want_digest != have_digest {
                drifted.push(file.clone());
            }
        }
        Ok(drifted)
    }

    /// Provision `default` and point an empty ledger at it.
    pub fn init(&self) -> Result<InitOutcome> {
        let default = PersonalityName::default_personality();
        let layout = self.store.layout();

        let source = if self.store.exists(&default) {
            None
        } else {
            let workspace_ready = layout
                .required
                .iter()
                .all(|f| self.workspace.join(f).is_file());
            let source = if workspace_ready {
                CreateSource::Workspace
            } else {
                CreateSource::Template
            };
            self.store.create(
                &default,
                &source,
                &self.workspace,
                Some("Baseline personality".to_string()),
            )?;
            Some(source.label())
        };

        let (ledger_written, files) = if self.ledger.read().is_none() {
            let files = self.apply(&default)?;
            self.ledger.write(&default, None)?;
            (true, files)
        } else {
            (false, ApplyReport::default())
        };

        info!(created = source.is_some(), ledger_written, "Initialized personality store");
        Ok(InitOutcome {
            created: source.is_some(),
            source,
            ledger_written,
            files,
        })
    }

    /// Apply a retention policy to the backup directory.
    pub fn cleanup_backups(&self, policy: &RetentionPolicy) -> PruneReport {
        self.backups.prune(policy)
    }

    // ─────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────

    fn snapshot_workspace(&self, label: &PersonalityName) -> Result<Option<PathBuf>> {
        if !self.backups_enabled {
            return Ok(None);
        }
        let files = present_files(&self.workspace, &self.store.layout().files);
        Ok(self
            .backups
            .snapshot(label.as_str(), &files)?
            .map(|entry| entry.path))
    }

    /// Mirror a personality's managed files into the workspace.
    ///
    /// Files already matching by digest are skipped. Managed files the
    /// personality lacks are removed from the workspace.
    fn apply(&self, name: &PersonalityName) -> Result<ApplyReport> {
        let dir = self.store.path_for(name)?;
        fs::create_dir_all(&self.workspace).map_err(|e| Error::io_write(&self.workspace, e))?;

        let mut report = ApplyReport::default();
        for file in &self.store.layout().files {
            let src = dir.join(file);
            let dst = self.workspace.join(file);
            let copy_failed = |path: &Path, source: io::Error| Error::CopyFailed {
                name: name.to_string(),
                file: file.clone(),
                path: path.to_path_buf(),
                source,
            };

            if src.is_file() {
                let want = fsutil::file_digest(&src).map_err(|e| copy_failed(&src, e))?;
                let have = fsutil::file_digest(&dst).map_err(|e| copy_failed(&dst, e))?;
                if want.is_some() && want == have {
                    report.unchanged.push(file.clone());
                    continue;
                }
                fsutil::copy_atomic(&src, &dst).map_err(|e| copy_failed(&dst, e))?;
                report.written.push(file.clone());
            } else if dst.is_file() {
                fs::remove_file(&dst).map_err(|e| copy_failed(&dst, e))?;
                report.removed.push(file.clone());
            }
        }

        debug!(
            personality = %name,
            written = ?report.written,
            removed = ?report.removed,
            "Applied profile files"
        );
        Ok(report)
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
