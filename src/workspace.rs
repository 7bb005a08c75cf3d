//! Workspace path resolution.
//!
//! Precedence for the live workspace: `--workspace` flag, then `[workspace] dir`
//! (config file or `PSWITCH_WORKSPACE`), then the current directory when it
//! already holds a store, then `~/.agent/workspace`.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::{expand_path, WorkspaceSettings};
use crate::error::Result;

pub const STORE_DIR_NAME: &str = "personalities";
pub const LEDGER_FILE_NAME: &str = ".state.json";
pub const BACKUP_DIR_NAME: &str = ".backups";

/// Every on-disk location the switcher touches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPaths {
    pub workspace_dir: PathBuf,
    pub store_dir: PathBuf,
    pub backup_dir: PathBuf,
    pub ledger_path: PathBuf,
}

impl ResolvedPaths {
    /// Resolve against the process's current directory and home.
    pub fn resolve(cli_workspace: Option<&str>, settings: &WorkspaceSettings) -> Result<Self> {
        let cwd = std::env::current_dir()?;
        Ok(Self::resolve_from(
            cli_workspace,
            settings,
            &cwd,
            dirs::home_dir(),
        ))
    }

    pub fn resolve_from(
        cli_workspace: Option<&str>,
        settings: &WorkspaceSettings,
        cwd: &Path,
        home: Option<PathBuf>,
    ) -> Self {
        let absolute = |raw: &str| {
            let p = PathBuf::from(expand_path(raw));
            if p.is_absolute() {
                p
            } else {
                cwd.join(p)
            }
        };

        let workspace_dir = if let Some(dir) = cli_workspace {
            absolute(dir)
        } else if let Some(dir) = settings.dir.as_deref() {
            absolute(dir)
        } else if cwd.join(STORE_DIR_NAME).is_dir() {
            cwd.to_path_buf()
        } else {
            home.unwrap_or_else(|| cwd.to_path_buf())
                .join(".agent")
                .join("workspace")
        };

        let store_dir = settings
            .store_dir
            .as_deref()
            .map(absolute)
            .unwrap_or_else(|| workspace_dir.join(STORE_DIR_NAME));
        let backup_dir = settings
            .backup_dir
            .as_deref()
            .map(absolute)
            .unwrap_or_else(|| store_dir.join(BACKUP_DIR_NAME));
        let ledger_path = store_dir.join(LEDGER_FILE_NAME);

        debug!(
            workspace = %workspace_dir.display(),
            store = %store_dir.display(),
            backups = %backup_dir.display(),
            "Resolved paths"
        );

        Self {
            workspace_dir,
            store_dir,
            backup_dir,
            ledger_path,
        }
    }
}
