//! Timestamped backups and retention pruning.
//!
//! Layout: `<root>/<personality>/<timestamp>[-N]/<files>`. The creation time is
//! parsed from the folder name, so ordering survives copies that reset mtimes.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// Folder name format for snapshots (UTC).
pub const TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%S%.3fZ";

// ─────────────────────────────────────────────────────────────────
// Types
// ─────────────────────────────────────────────────────────────────

/// One snapshot on disk.
#[derive(Debug, Clone, Serialize)]
pub struct BackupEntry {
    pub personality: String,
    pub created_at: DateTime<Utc>,
    pub path: PathBuf,
}

/// Count and age retention.
///
/// The `keep_count` most recent backups are never deleted. Beyond that rank a
/// backup is deleted by count alone; with `keep_count == 0` there is no count
/// policy and only backups older than `max_age` go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    pub keep_count: usize,
    pub max_age: Option<Duration>,
}

impl RetentionPolicy {
    pub fn new(keep_count: usize, max_age_days: Option<u64>) -> Self {
        Self {
            keep_count,
            max_age: max_age_days
                .and_then(|d| i64::try_from(d).ok())
                .and_then(Duration::try_days),
        }
    }

    /// Whether the backup at `rank` (0 = newest) and `age` should be deleted.
    pub fn should_delete(&self, rank: usize, age: Duration) -> bool {
        if rank < self.keep_count {
            return false;
        }
        if self.keep_count > 0 {
            return true;
        }
        matches!(self.max_age, Some(max) if age > max)
    }
}

/// Outcome of a prune pass.
#[derive(Debug, Default)]
pub struct PruneReport {
    pub deleted: usize,
    pub retained: usize,
    /// Folders whose name is not a timestamp; never touched.
    pub skipped: usize,
    /// Aggregated failure, if any deletion (or the scan) failed.
    pub error: Option<Error>,
}

// ─────────────────────────────────────────────────────────────────
// Backup Store
// ─────────────────────────────────────────────────────────────────

/// Snapshot directory for all personalities.
pub struct BackupStore {
    root: PathBuf,
}

impl BackupStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Snapshot `files` under `personality`. Returns `None` when there is nothing to save.
    pub fn snapshot(
        &self,
        personality: &str,
        files: &[(String, PathBuf)],
    ) -> Result<Option<BackupEntry>> {
        self.snapshot_at(personality, files, Utc::now())
    }

    pub(crate) fn snapshot_at(
        &self,
        personality: &str,
        files: &[(String, PathBuf)],
        at: DateTime<Utc>,
    ) -> Result<Option<BackupEntry>> {
        if files.is_empty() {
            return Ok(None);
        }

        let backup_failed = |message: String| Error::BackupFailed {
            name: personality.to_string(),
            message,
        };

        let parent = self.root.join(personality);
        fs::create_dir_all(&parent)
            .map_err(|e| backup_failed(format!("{}: {}", parent.display(), e)))?;

        let stamp = at.format(TIMESTAMP_FORMAT).to_string();
        let mut dir = parent.join(&stamp);
        let mut n = 1;
        while dir.exists() {
            dir = parent.join(format!("{}-{}", stamp, n));
            n += 1;
        }
        fs::create_dir(&dir).map_err(|e| backup_failed(format!("{}: {}", dir.display(), e)))?;

        for (file, src) in files {
            if let Err(e) = fs::copy(src, dir.join(file)) {
                let _ = fs::remove_dir_all(&dir);
                return Err(backup_failed(format!("{}: {}", src.display(), e)));
            }
        }

        debug!(personality, path = %dir.display(), files = files.len(), "Backup created");
        Ok(Some(BackupEntry {
            personality: personality.to_string(),
            created_at: at,
            path: dir,
        }))
    }

    /// All backups, newest first.
    pub fn list(&self) -> Result<Vec<BackupEntry>> {
        Ok(self.scan()?.0)
    }

    /// Scan the backup tree. Returns entries newest first plus the count of
    /// folders that could not be dated.
    fn scan(&self) -> Result<(Vec<BackupEntry>, usize)> {
        let personalities = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok((Vec::new(), 0)),
            Err(e) => return Err(Error::io_read(&self.root, e)),
        };

        let mut entries = Vec::new();
        let mut skipped = 0;

        for personality in personalities {
            let personality = personality.map_err(|e| Error::io_read(&self.root, e))?;
            let personality_dir = personality.path();
            if !personality_dir.is_dir() {
                continue;
            }
            let name = personality.file_name().to_string_lossy().into_owned();

            let snapshots =
                fs::read_dir(&personality_dir).map_err(|e| Error::io_read(&personality_dir, e))?;
            for snapshot in snapshots {
                let snapshot = snapshot.map_err(|e| Error::io_read(&personality_dir, e))?;
                let folder = snapshot.file_name().to_string_lossy().into_owned();
                match parse_timestamp(&folder) {
                    Some(created_at) => entries.push(BackupEntry {
                        personality: name.clone(),
                        created_at,
                        path: snapshot.path(),
                    }),
                    None => {
                        debug!(path = %snapshot.path().display(), "Skipping undated backup entry");
                        skipped += 1;
                    }
                }
            }
        }

        entries.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.path.cmp(&a.path))
        });
        Ok((entries, skipped))
    }

    /// Apply `policy` now.
    pub fn prune(&self, policy: &RetentionPolicy) -> PruneReport {
        self.prune_with(policy, Utc::now(), |p| fs::remove_dir_all(p))
    }

    /// Apply `policy` at `now`, deleting with `remove`.
    ///
    /// A failed deletion does not stop the pass; failures are folded into a
    /// single `PruneFailed` error and the deleted count stays accurate.
    pub(crate) fn prune_with<F>(
        &self,
        policy: &RetentionPolicy,
        now: DateTime<Utc>,
        mut remove: F,
    ) -> PruneReport
    where
        F: FnMut(&Path) -> io::Result<()>,
    {
        let (entries, skipped) = match self.scan() {
            Ok(scan) => scan,
            Err(e) => {
                return PruneReport {
                    error: Some(e),
                    ..Default::default()
                }
            }
        };

        let mut report = PruneReport {
            skipped,
            ..Default::default()
        };
        let mut failures = Vec::new();

        for (rank, entry) in entries.iter().enumerate() {
            if !policy.should_delete(rank, now - entry.created_at) {
                report.retained += 1;
                continue;
            }
            match remove(&entry.path) {
                Ok(()) => {
                    debug!(path = %entry.path.display(), "Backup pruned");
                    report.deleted += 1;
                }
                Err(e) => {
                    warn!(path = %entry.path.display(), error = %e, "Failed to prune backup");
                    failures.push(format!("{}: {}", entry.path.display(), e));
                }
            }
        }

        self.remove_empty_parents();

        if !failures.is_empty() {
            report.error = Some(Error::PruneFailed {
                deleted: report.deleted,
                failures,
            });
        }

        info!(
            deleted = report.deleted,
            retained = report.retained,
            skipped = report.skipped,
            "Backup retention applied"
        );
        report
    }

    /// Drop per-personality folders left empty by pruning.
    fn remove_empty_parents(&self) {
        let Ok(entries) = fs::read_dir(&self.root) else {
            return;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            let empty = fs::read_dir(&path)
                .map(|mut d| d.next().is_none())
                .unwrap_or(false);
            if empty {
                let _ = fs::remove_dir(&path);
            }
        }
    }
}

/// Parse a snapshot folder name (`<timestamp>` or `<timestamp>-N`).
fn parse_timestamp(folder: &str) -> Option<DateTime<Utc>> {
    let stamp = folder.split('-').next()?;
    NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
