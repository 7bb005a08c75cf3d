//! State ledger: the single persisted record of the live personality.
//!
//! The ledger is read fresh on every call. A missing or undecodable file reads
//! as "no active personality" so a damaged ledger never blocks the agent; the
//! caller falls back to `default`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::fsutil;

use super::types::{ActiveState, PersonalityName};

/// Persisted `{active, previous}` record.
pub struct StateLedger {
    path: PathBuf,
}

impl StateLedger {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the active personality name, treating corruption as absence.
    pub fn read(&self) -> Option<PersonalityName> {
        self.read_state().map(|s| s.active)
    }

    /// Read the full record, treating corruption as absence.
    pub fn read_state(&self) -> Option<ActiveState> {
        match self.read_checked() {
            Ok(state) => state,
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable state ledger");
                None
            }
        }
    }

    /// Read the full record, surfacing corruption as `LedgerCorrupt`.
    pub fn read_checked(&self) -> Result<Option<ActiveState>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No state ledger");
                return Ok(None);
            }
            Err(e) => {
                return Err(Error::LedgerCorrupt {
                    path: self.path.clone(),
                    message: e.to_string(),
                })
            }
        };

        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| Error::LedgerCorrupt {
                path: self.path.clone(),
                message: e.to_string(),
            })
    }

    /// Atomically record `active` as live, remembering `previous`.
    pub fn write(
        &self,
        active: &PersonalityName,
        previous: Option<&PersonalityName>,
    ) -> Result<ActiveState> {
        let state = ActiveState {
            active: active.clone(),
            previous: previous.cloned(),
            switched_at: Some(Utc::now()),
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::io_write(parent, e))?;
        }

        let json = serde_json::to_vec_pretty(&state)?;
        fsutil::write_atomic(&self.path, &json).map_err(|e| Error::io_write(&self.path, e))?;

        debug!(active = %active, previous = ?previous.map(|p| p.as_str()), "State ledger written");
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_ledger() -> (StateLedger, TempDir) {
        let tmp = TempDir::new().unwrap();
        let ledger = StateLedger::new(tmp.path().join("store").join(".state.json"));
        (ledger, tmp)
    }

    fn name(s: &str) -> PersonalityName {
        PersonalityName::new(s).unwrap()
    }

    #[test]
    fn test_missing_reads_none() {
        let (ledger, _tmp) = test_ledger();
        assert!(ledger.read().is_none());
        assert!(ledger.read_checked().unwrap().is_none());
    }

    #[test]
    fn test_write_then_read() {
        let (ledger, _tmp) = test_ledger();
        ledger.write(&name("work"), Some(&name("default"))).unwrap();

        let state = ledger.read_state().unwrap();
        assert_eq!(state.active, name("work"));
        assert_eq!(state.previous, Some(name("default")));
        assert!(state.switched_at.is_some());
    }

    #[test]
    fn test_corrupt_reads_none_but_checked_errors() {
        let (ledger, _tmp) = test_ledger();
        fs::create_dir_all(ledger.path().parent().unwrap()).unwrap();
        fs::write(ledger.path(), "{ not json").unwrap();

        assert!(ledger.read().is_none());
        assert!(matches!(
            ledger.read_checked(),
            Err(Error::LedgerCorrupt { .. })
        ));
    }

    #[test]
    fn test_unsafe_name_in_ledger_is_corrupt() {
        let (ledger, _tmp) = test_ledger();
        fs::create_dir_all(ledger.path().parent().unwrap()).unwrap();
        fs::write(ledger.path(), r#"{"active":"../../etc","previous":null}"#).unwrap();

        assert!(ledger.read().is_none());
    }
}
