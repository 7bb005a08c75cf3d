//! Common test utilities and fixtures
//!
//! Shared sandbox for driving the binary against a throwaway workspace.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use serde_json::Value;
use tempfile::TempDir;

const ENV_VARS: &[&str] = &[
    "PSWITCH_CONFIG",
    "PSWITCH_WORKSPACE",
    "PSWITCH_STORE_DIR",
    "PSWITCH_BACKUP_DIR",
    "PSWITCH_BACKUP_ENABLED",
    "PSWITCH_BACKUP_KEEP",
    "PSWITCH_BACKUP_MAX_AGE_DAYS",
    "PSWITCH_LOG_LEVEL",
    "PSWITCH_LOG_FILE",
    "PSWITCH_LOG_JSON",
    "PSWITCH_HOST_CONFIG",
    "RUST_LOG",
];

/// Get the path to the test fixtures directory
pub fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
}

/// Get a path to a specific fixture file
pub fn fixture_path(name: &str) -> PathBuf {
    fixtures_dir().join(name)
}

pub fn valid_config_fixture() -> PathBuf {
    fixture_path("valid_config.toml")
}

pub fn invalid_config_fixture() -> PathBuf {
    fixture_path("invalid_config.toml")
}

/// The binary with a clean environment.
pub fn switcher_cmd() -> Command {
    let mut cmd = Command::cargo_bin("personality-switcher").unwrap();
    for var in ENV_VARS {
        cmd.env_remove(var);
    }
    cmd
}

/// A temp workspace, store and config file, one per test.
pub struct Sandbox {
    pub root: TempDir,
    pub workspace: PathBuf,
    pub config_path: PathBuf,
    pub host_path: PathBuf,
}

impl Sandbox {
    pub fn new() -> Self {
        Self::with_config("")
    }

    /// Sandbox whose config gets `extra` appended (for extra sections).
    pub fn with_config(extra: &str) -> Self {
        let root = TempDir::new().unwrap();
        let workspace = root.path().join("workspace");
        let config_path = root.path().join("config.toml");
        let host_path = root.path().join("host.json");
        fs::create_dir_all(&workspace).unwrap();

        let config = format!(
            r#"
[backup]
enabled = true
keep_count = 10

[logging]
level = "warn"

[host]
config_file = "{}"
{}
"#,
            host_path.display(),
            extra
        );
        fs::write(&config_path, config).unwrap();

        Self {
            root,
            workspace,
            config_path,
            host_path,
        }
    }

    pub fn store(&self) -> PathBuf {
        self.workspace.join("personalities")
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.store().join(".state.json")
    }

    pub fn backups(&self) -> PathBuf {
        self.store().join(".backups")
    }

    /// Command preloaded with this sandbox's config and workspace.
    pub fn cmd(&self) -> Command {
        let mut cmd = switcher_cmd();
        cmd.arg("--config")
            .arg(&self.config_path)
            .arg("--workspace")
            .arg(&self.workspace);
        cmd
    }

    /// Run one command in a fresh process; returns the parsed record and exit code.
    pub fn run(&self, args: &[&str]) -> (Value, i32) {
        let output = self.cmd().args(args).output().unwrap();
        let stdout = String::from_utf8_lossy(&output.stdout);
        let record: Value = serde_json::from_str(stdout.trim())
            .unwrap_or_else(|e| panic!("stdout is not one JSON record ({}): {:?}", e, stdout));
        (record, output.status.code().unwrap_or(-1))
    }

    /// Run and require `status: ok`.
    pub fn ok(&self, args: &[&str]) -> Value {
        let (record, code) = self.run(args);
        assert_eq!(record["status"], "ok", "{:?} failed: {}", args, record);
        assert_eq!(code, 0);
        record
    }

    /// Put a personality folder in the store directly.
    pub fn install(&self, name: &str, soul: &str) {
        let dir = self.store().join(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("SOUL.md"), soul).unwrap();
        fs::write(dir.join("IDENTITY.md"), format!("# {}\n", name)).unwrap();
    }

    pub fn write_live(&self, file: &str, content: &str) {
        fs::write(self.workspace.join(file), content).unwrap();
    }

    pub fn live(&self, file: &str) -> Option<String> {
        fs::read_to_string(self.workspace.join(file)).ok()
    }

    pub fn stored(&self, name: &str, file: &str) -> Option<String> {
        fs::read_to_string(self.store().join(name).join(file)).ok()
    }

    pub fn active(&self) -> Option<String> {
        let content = fs::read_to_string(self.ledger_path()).ok()?;
        let v: Value = serde_json::from_str(&content).ok()?;
        v["active"].as_str().map(str::to_string)
    }

    pub fn path(&self) -> &Path {
        self.root.path()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixtures_exist() {
        assert!(valid_config_fixture().exists());
        assert!(invalid_config_fixture().exists());
    }
}
