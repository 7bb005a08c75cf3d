//! Personality store: one directory per personality under a flat root.
//!
//! Pure filesystem abstraction: no ledger access and no workspace writes.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

use super::registry::TemplateRegistry;
use super::types::{
    CreateSource, PersonalityInfo, PersonalityMeta, PersonalityName, ProfileLayout, SlotState,
};

// ─────────────────────────────────────────────────────────────────
// Personality Store
// ─────────────────────────────────────────────────────────────────

/// Directory-per-personality store.
pub struct PersonalityStore {
    /// Store root: <workspace>/personalities/ by default.
    root: PathBuf,

    /// Managed/required file names.
    layout: ProfileLayout,

    /// Bundled template for `CreateSource::Template`.
    templates: TemplateRegistry,
}

impl PersonalityStore {
    pub fn new(root: PathBuf, layout: ProfileLayout) -> Self {
        Self {
            root,
            layout,
            templates: TemplateRegistry::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn layout(&self) -> &ProfileLayout {
        &self.layout
    }

    /// Ensure the store root exists.
    fn ensure_dir(&self) -> Result<()> {
        if !self.root.exists() {
            fs::create_dir_all(&self.root).map_err(|e| Error::io_write(&self.root, e))?;
            debug!(path = %self.root.display(), "Created personality store");
        }
        Ok(())
    }

    /// Directory a personality lives in, whether or not it exists.
    pub fn dir_for(&self, name: &PersonalityName) -> PathBuf {
        self.root.join(name.as_str())
    }

    // ─────────────────────────────────────────────────────────────
    // Query
    // ─────────────────────────────────────────────────────────────

    pub fn exists(&self, name: &PersonalityName) -> bool {
        self.dir_for(name).is_dir()
    }

    /// Directory for an existing personality, or `NotFound`.
    pub fn path_for(&self, name: &PersonalityName) -> Result<PathBuf> {
        let dir = self.dir_for(name);
        if dir.is_dir() {
            Ok(dir)
        } else {
            Err(Error::not_found(name.as_str()))
        }
    }

    /// All installed personality names, sorted.
    pub fn list(&self) -> Result<Vec<PersonalityName>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::io_read(&self.root, e)),
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| Error::io_read(&self.root, e))?;
            if !entry.path().is_dir() {
                continue;
            }
            let file_name = entry.file_name();
            let Some(raw) = file_name.to_str() else {
                continue;
            };
            // Hidden entries (.backups, staging dirs) never parse as names.
            if let Ok(name) = PersonalityName::new(raw) {
                names.push(name);
            }
        }

        names.sort();
        Ok(names)
    }

    /// Required files absent from a personality folder.
    pub fn missing_required(&self, name: &PersonalityName) -> Vec<String> {
        let dir = self.dir_for(name);
        self.layout
            .required
            .iter()
            .filter(|f| !dir.join(f).is_file())
            .cloned()
            .collect()
    }

    /// Check that a personality exists and carries every required file.
    pub fn validate(&self, name: &PersonalityName) -> Result<PathBuf> {
        let dir = self.path_for(name)?;
        let missing = self.missing_required(name);
        if !missing.is_empty() {
            return Err(Error::InvalidPersonality {
                name: name.to_string(),
                missing,
            });
        }
        Ok(dir)
    }

    pub fn is_valid(&self, name: &PersonalityName) -> bool {
        self.validate(name).is_ok()
    }

    /// Managed files present in a personality folder, as `(file name, path)`.
    pub fn profile_files(&self, name: &PersonalityName) -> Result<Vec<(String, PathBuf)>> {
        let dir = self.path_for(name)?;
        Ok(present_files(&dir, &self.layout.files))
    }

    /// Read a personality's metadata file, if present and readable.
    pub fn meta(&self, name: &PersonalityName) -> Option<PersonalityMeta> {
        let path = self.dir_for(name).join(&self.layout.metadata_file);
        let content = fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&content) {
            Ok(meta) => Some(meta),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring unreadable personality metadata");
                None
            }
        }
    }

    /// Summary of an installed personality.
    pub fn info(
        &self,
        name: &PersonalityName,
        active: Option<&PersonalityName>,
    ) -> Result<PersonalityInfo> {
        let path = self.path_for(name)?;
        let files = self
            .profile_files(name)?
            .into_iter()
            .map(|(file, _)| file)
            .collect();

        Ok(PersonalityInfo {
            name: name.clone(),
            description: self.meta(name).and_then(|m| m.description),
            state: if active == Some(name) {
                SlotState::Active
            } else {
                SlotState::Inactive
            },
            valid: self.is_valid(name),
            files,
            path,
        })
    }

    // ─────────────────────────────────────────────────────────────
    // Mutate
    // ─────────────────────────────────────────────────────────────

    /// Create a new personality from `source`.
    ///
    /// Files are staged in a hidden sibling directory and renamed into place, so
    /// a failed create never leaves a half-populated personality behind.
    pub fn create(
        &self,
        name: &PersonalityName,
        source: &CreateSource,
        workspace: &Path,
        description: Option<String>,
    ) -> Result<PathBuf> {
        if self.exists(name) {
            return Err(Error::AlreadyExists {
                name: name.to_string(),
            });
        }
        self.ensure_dir()?;

        let staging = self.root.join(format!(".staging-{}", name));
        if staging.exists() {
            fs::remove_dir_all(&staging).map_err(|e| Error::io_write(&staging, e))?;
        }
        fs::create_dir_all(&staging).map_err(|e| Error::io_write(&staging, e))?;

        let result = self.populate(&staging, name, source, workspace, description);
        if let Err(e) = result {
            let _ = fs::remove_dir_all(&staging);
            return Err(e);
        }

        let dest = self.dir_for(name);
        fs::rename(&staging, &dest).map_err(|e| {
            let _ = fs::remove_dir_all(&staging);
            Error::io_write(&dest, e)
        })?;

        info!(personality = %name, source = %source.label(), "Personality created");
        Ok(dest)
    }

    fn populate(
        &self,
        staging: &Path,
        name: &PersonalityName,
        source: &CreateSource,
        workspace: &Path,
        description: Option<String>,
    ) -> Result<()> {
        match source {
            CreateSource::Workspace => {
                for (file, src) in present_files(workspace, &self.layout.files) {
                    let dst = staging.join(&file);
                    fs::copy(&src, &dst).map_err(|e| Error::io_write(&dst, e))?;
                }
            }
            CreateSource::Personality(from) => {
                for (file, src) in self.profile_files(from)? {
                    let dst = staging.join(&file);
                    fs::copy(&src, &dst).map_err(|e| Error::io_write(&dst, e))?;
                }
            }
            CreateSource::Template => {
                for (file, content) in self.templates.files_for(&self.layout.files) {
                    let dst = staging.join(file);
                    fs::write(&dst, content).map_err(|e| Error::io_write(&dst, e))?;
                }
            }
        }

        let missing: Vec<String> = self
            .layout
            .required
            .iter()
            .filter(|f| !staging.join(f).is_file())
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(Error::InvalidPersonality {
                name: name.to_string(),
                missing,
            });
        }

        let meta = PersonalityMeta {
            description,
            created_at: Utc::now(),
            created_from: Some(source.label()),
        };
        let meta_path = staging.join(&self.layout.metadata_file);
        fs::write(&meta_path, serde_json::to_vec_pretty(&meta)?)
            .map_err(|e| Error::io_write(&meta_path, e))?;

        Ok(())
    }

    /// Rename a personality folder. The ledger is the caller's concern.
    pub fn rename(&self, old: &PersonalityName, new: &PersonalityName) -> Result<PathBuf> {
        if old.is_default() {
            return Err(Error::CannotRenameDefault);
        }
        let from = self.path_for(old)?;
        if self.exists(new) {
            return Err(Error::AlreadyExists {
                name: new.to_string(),
            });
        }

        let to = self.dir_for(new);
        fs::rename(&from, &to).map_err(|e| Error::io_write(&to, e))?;
        info!(from = %old, to = %new, "Personality renamed");
        Ok(to)
    }

    /// Remove a personality folder and everything in it.
    pub fn remove(&self, name: &PersonalityName) -> io::Result<()> {
        fs::remove_dir_all(self.dir_for(name))
    }
}

/// Files from `names` that exist under `dir`.
pub(crate) fn present_files(dir: &Path, names: &[String]) -> Vec<(String, PathBuf)> {
    names
        .iter()
        .map(|f| (f.clone(), dir.join(f)))
        .filter(|(_, p)| p.is_file())
        .collect()
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_store() -> (PersonalityStore, PathBuf, TempDir) {
        let tmp = TempDir::new().unwrap();
        let workspace = tmp.path().join("workspace");
        fs::create_dir_all(&workspace).unwrap();
        let store = PersonalityStore::new(workspace.join("personalities"), ProfileLayout::default());
        (store, workspace, tmp)
    }

    fn name(s: &str) -> PersonalityName {
        PersonalityName::new(s).unwrap()
    }

    #[test]
    fn test_create_from_template_and_list() {
        let (store, workspace, _tmp) = test_store();
        store
            .create(&name("default"), &CreateSource::Template, &workspace, None)
            .unwrap();

        assert!(store.exists(&name("default")));
        assert!(store.is_valid(&name("default")));
        assert_eq!(store.list().unwrap(), vec![name("default")]);

        let files: Vec<_> = store
            .profile_files(&name("default"))
            .unwrap()
            .into_iter()
            .map(|(f, _)| f)
            .collect();
        assert_eq!(files, vec!["SOUL.md", "IDENTITY.md"]);
    }

    #[test]
    fn test_create_from_workspace_requires_files() {
        let (store, workspace, _tmp) = test_store();

        let err = store
            .create(&name("work"), &CreateSource::Workspace, &workspace, None)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidPersonality { .. }));
        assert!(!store.exists(&name("work")));
        assert!(store.list().unwrap().is_empty());

        fs::write(workspace.join("SOUL.md"), "work soul").unwrap();
        store
            .create(
                &name("work"),
                &CreateSource::Workspace,
                &workspace,
                Some("Office hours".into()),
            )
            .unwrap();

        let info = store.info(&name("work"), None).unwrap();
        assert_eq!(info.description.as_deref(), Some("Office hours"));
        assert_eq!(info.files, vec!["SOUL.md"]);
        assert_eq!(info.state, SlotState::Inactive);
    }

    #[test]
    fn test_create_duplicate() {
        let (store, workspace, _tmp) = test_store();
        store
            .create(&name("work"), &CreateSource::Template, &workspace, None)
            .unwrap();
        let err = store
            .create(&name("work"), &CreateSource::Template, &workspace, None)
            .unwrap_err();
        assert!(matches!(err, Error::AlreadyExists { .. }));
    }

    #[test]
    fn test_path_for_missing() {
        let (store, _workspace, _tmp) = test_store();
        assert!(matches!(
            store.path_for(&name("ghost")),
            Err(Error::NotFound { .. })
        ));
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn test_validate_reports_missing_files() {
        let (store, workspace, _tmp) = test_store();
        store
            .create(&name("work"), &CreateSource::Template, &workspace, None)
            .unwrap();
        fs::remove_file(store.dir_for(&name("work")).join("SOUL.md")).unwrap();

        match store.validate(&name("work")) {
            Err(Error::InvalidPersonality { missing, .. }) => assert_eq!(missing, vec!["SOUL.md"]),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_list_skips_hidden_entries() {
        let (store, workspace, _tmp) = test_store();
        store
            .create(&name("work"), &CreateSource::Template, &workspace, None)
            .unwrap();
        fs::create_dir_all(store.root().join(".backups")).unwrap();
        fs::write(store.root().join(".state.json"), "{}").unwrap();

        assert_eq!(store.list().unwrap(), vec![name("work")]);
    }

    #[test]
    fn test_rename() {
        let (store, workspace, _tmp) = test_store();
        for n in ["default", "work", "home"] {
            store
                .create(&name(n), &CreateSource::Template, &workspace, None)
                .unwrap();
        }

        assert!(matches!(
            store.rename(&name("default"), &name("other")),
            Err(Error::CannotRenameDefault)
        ));
        assert!(matches!(
            store.rename(&name("work"), &name("home")),
            Err(Error::AlreadyExists { .. })
        ));

        store.rename(&name("work"), &name("office")).unwrap();
        assert_eq!(
            store.list().unwrap(),
            vec![name("default"), name("home"), name("office")]
        );
    }
}
