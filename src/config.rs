//! Configuration system for the personality switcher
//!
//! Supports multiple configuration sources with the following precedence (highest to lowest):
//! 1. CLI arguments
//! 2. Environment variables (PSWITCH_* prefix)
//! 3. Configuration file (TOML)
//! 4. Default values

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Main switcher configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SwitcherConfig {
    /// Workspace and store locations
    pub workspace: WorkspaceSettings,

    /// Which files make up a personality
    pub profile: ProfileSettings,

    /// Backup and retention policy
    pub backup: BackupSettings,

    /// Logging configuration
    pub logging: LoggingSettings,

    /// Host command registration
    pub host: HostSettings,
}

/// Workspace location settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceSettings {
    /// Live workspace directory (auto-detected if not set)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,

    /// Personality store directory (default: <workspace>/personalities)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_dir: Option<String>,

    /// Backup directory (default: <store>/.backups)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_dir: Option<String>,
}

/// Profile file layout
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileSettings {
    /// Files copied into the live workspace on switch/restore
    pub files: Vec<String>,

    /// Files a personality must contain to be valid
    pub required: Vec<String>,

    /// Optional metadata file kept in the personality folder only
    pub metadata_file: String,
}

/// Backup settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupSettings {
    /// Snapshot files before switch/delete
    pub enabled: bool,

    /// Number of most recent backups always kept (0 = age filter only)
    pub keep_count: usize,

    /// Delete backups older than this many days
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_age_days: Option<u64>,
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level: trace, debug, info, warn, error
    pub level: String,

    /// Log file path (empty = no file logging)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,

    /// Number of rotated log files to keep
    pub max_files: u32,

    /// Enable JSON formatted logging
    pub json_format: bool,
}

/// Host configuration collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HostSettings {
    /// Host JSON configuration file holding the command list
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_file: Option<String>,

    /// JSON pointer to the command array inside the host file
    pub commands_pointer: String,

    /// Command names registered with the host
    pub commands: Vec<String>,
}

// Default implementations

impl Default for ProfileSettings {
    fn default() -> Self {
        Self {
            files: vec![
                "SOUL.md".to_string(),
                "IDENTITY.md".to_string(),
                "USER.md".to_string(),
            ],
            required: vec!["SOUL.md".to_string()],
            metadata_file: "personality.json".to_string(),
        }
    }
}

impl Default for BackupSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            keep_count: 10,
            max_age_days: None,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            file: None,
            max_files: 5,
            json_format: false,
        }
    }
}

impl Default for HostSettings {
    fn default() -> Self {
        Self {
            config_file: None,
            commands_pointer: "/commands/custom".to_string(),
            commands: vec![
                "personality".to_string(),
                "personality-switch".to_string(),
                "personality-restore".to_string(),
            ],
        }
    }
}

impl SwitcherConfig {
    /// Load configuration from file with environment variable overrides
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut config = Self::default();

        // 1. Load from config file if it exists
        if let Some(path) = Self::find_config_file(config_path)? {
            debug!(path = %path.display(), "Loading configuration file");
            let content = fs::read_to_string(&path).map_err(|e| Error::io_read(&path, e))?;
            config = toml::from_str(&content).map_err(|e| Error::ConfigParse {
                path: path.clone(),
                source: e,
            })?;
            info!(path = %path.display(), "Configuration loaded from file");
        }

        // 2. Apply environment variable overrides
        config.apply_env_overrides();

        // 3. Expand paths
        config.expand_paths();

        // 4. Validate
        config.validate()?;

        Ok(config)
    }

    /// Find the configuration file to use
    fn find_config_file(explicit_path: Option<&str>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit_path {
            let path = PathBuf::from(expand_path(path));
            if path.exists() {
                return Ok(Some(path));
            }
            return Err(Error::ConfigNotFound { path });
        }

        let search_paths = [
            PathBuf::from("personality-switcher.toml"),
            dirs::config_dir()
                .map(|p| p.join("personality-switcher").join("config.toml"))
                .unwrap_or_default(),
            dirs::home_dir()
                .map(|p| p.join(".personality-switcher").join("config.toml"))
                .unwrap_or_default(),
        ];

        for path in &search_paths {
            if path.is_file() {
                debug!(path = %path.display(), "Found configuration file");
                return Ok(Some(path.clone()));
            }
        }

        debug!("No configuration file found, using defaults");
        Ok(None)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        // Workspace settings
        if let Ok(val) = std::env::var("PSWITCH_WORKSPACE") {
            self.workspace.dir = Some(val);
        }
        if let Ok(val) = std::env::var("PSWITCH_STORE_DIR") {
            self.workspace.store_dir = Some(val);
        }
        if let Ok(val) = std::env::var("PSWITCH_BACKUP_DIR") {
            self.workspace.backup_dir = Some(val);
        }

        // Backup settings
        if let Ok(val) = std::env::var("PSWITCH_BACKUP_ENABLED") {
            self.backup.enabled = parse_bool(&val);
        }
        if let Ok(val) = std::env::var("PSWITCH_BACKUP_KEEP") {
            if let Ok(n) = val.parse() {
                self.backup.keep_count = n;
            }
        }
        if let Ok(val) = std::env::var("PSWITCH_BACKUP_MAX_AGE_DAYS") {
            if let Ok(n) = val.parse() {
                self.backup.max_age_days = Some(n);
            }
        }

        // Logging settings
        if let Ok(val) = std::env::var("PSWITCH_LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Ok(val) = std::env::var("PSWITCH_LOG_FILE") {
            self.logging.file = Some(val);
        }
        if let Ok(val) = std::env::var("PSWITCH_LOG_JSON") {
            self.logging.json_format = parse_bool(&val);
        }

        // Host settings
        if let Ok(val) = std::env::var("PSWITCH_HOST_CONFIG") {
            self.host.config_file = Some(val);
        }
    }

    /// Expand ~ and other path variables
    fn expand_paths(&mut self) {
        for dir in [
            &mut self.workspace.dir,
            &mut self.workspace.store_dir,
            &mut self.workspace.backup_dir,
            &mut self.logging.file,
            &mut self.host.config_file,
        ] {
            if let Some(path) = dir.take() {
                *dir = Some(expand_path(&path));
            }
        }
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        if self.profile.files.is_empty() {
            return Err(Error::config_field_invalid(
                "profile.files",
                "At least one profile file must be managed",
            ));
        }

        for file in self.profile.files.iter().chain([&self.profile.metadata_file]) {
            if !is_plain_file_name(file) {
                return Err(Error::config_field_invalid(
                    "profile.files",
                    format!("'{}' must be a plain file name without directories", file),
                ));
            }
        }

        if let Some(missing) = self
            .profile
            .required
            .iter()
            .find(|r| !self.profile.files.contains(r))
        {
            return Err(Error::config_field_invalid(
                "profile.required",
                format!("Required file '{}' is not listed in profile.files", missing),
            ));
        }

        if self.profile.files.contains(&self.profile.metadata_file) {
            return Err(Error::config_field_invalid(
                "profile.metadata_file",
                "The metadata file cannot also be a managed profile file",
            ));
        }

        if !self.host.commands_pointer.is_empty() && !self.host.commands_pointer.starts_with('/') {
            return Err(Error::config_field_invalid(
                "host.commands_pointer",
                "Must be a JSON pointer starting with '/'",
            ));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(Error::config_field_invalid(
                "logging.level",
                format!(
                    "Invalid log level '{}'. Must be one of: {}",
                    self.logging.level,
                    valid_levels.join(", ")
                ),
            ));
        }

        Ok(())
    }
}

fn parse_bool(val: &str) -> bool {
    val.eq_ignore_ascii_case("true") || val == "1"
}

fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains('/')
        && !name.contains('\\')
}

/// Expand ~ and environment variables in paths
pub fn expand_path(path: &str) -> String {
    shellexpand::full(path)
        .unwrap_or_else(|_| std::borrow::Cow::Borrowed(path))
        .into_owned()
}

/// Initialize a new configuration file
pub fn init_config(path: Option<&str>, force: bool) -> Result<PathBuf> {
    let config_path = path
        .map(|p| PathBuf::from(expand_path(p)))
        .unwrap_or_else(default_config_path);

    if config_path.exists() && !force {
        return Err(Error::Config(format!(
            "Configuration file already exists: {}. Use --force to overwrite.",
            config_path.display()
        )));
    }

    if let Some(parent) = config_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| Error::io_write(parent, e))?;
    }

    fs::write(&config_path, generate_default_config())
        .map_err(|e| Error::io_write(&config_path, e))?;

    Ok(config_path)
}

fn default_config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".personality-switcher")
        .join("config.toml")
}

/// Generate default configuration content with comments
fn generate_default_config() -> String {
    r#"# Personality Switcher Configuration

[workspace]
# Live agent workspace (auto-detected if not set)
# dir = "~/.agent/workspace"

# Personality store (default: <workspace>/personalities)
# store_dir = "~/.agent/workspace/personalities"

# Backup directory (default: <store>/.backups)
# backup_dir = "~/.agent/workspace/personalities/.backups"

[profile]
# Files copied into the workspace when a personality becomes active
files = ["SOUL.md", "IDENTITY.md", "USER.md"]

# Files every personality must contain
required = ["SOUL.md"]

# Per-personality metadata, never copied into the workspace
metadata_file = "personality.json"

[backup]
# Snapshot files before switch/delete
enabled = true

# Most recent backups always kept (0 = apply the age cutoff only)
keep_count = 10

# Delete backups older than this many days
# max_age_days = 30

[logging]
# Log level: trace, debug, info, warn, error
level = "warn"

# Log file path (comment out to disable file logging)
# file = "~/.personality-switcher/logs/switcher.log"

# Number of rotated log files to keep
max_files = 5

# Enable JSON formatted logging
json_format = false

[host]
# Host JSON configuration that lists chat commands
# config_file = "~/.agent/host.json"

# JSON pointer to the command array
commands_pointer = "/commands/custom"

# Commands added by 'commands register'
commands = ["personality", "personality-switch", "personality-restore"]
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn test_default_config() {
        let config = SwitcherConfig::default();
        assert_eq!(config.profile.required, vec!["SOUL.md"]);
        assert_eq!(config.backup.keep_count, 10);
        assert!(config.backup.max_age_days.is_none());
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn test_env_override() {
        env::set_var("PSWITCH_BACKUP_KEEP", "3");
        env::set_var("PSWITCH_BACKUP_MAX_AGE_DAYS", "7");
        env::set_var("PSWITCH_LOG_LEVEL", "debug");

        let mut config = SwitcherConfig::default();
        config.apply_env_overrides();

        assert_eq!(config.backup.keep_count, 3);
        assert_eq!(config.backup.max_age_days, Some(7));
        assert_eq!(config.logging.level, "debug");

        env::remove_var("PSWITCH_BACKUP_KEEP");
        env::remove_var("PSWITCH_BACKUP_MAX_AGE_DAYS");
        env::remove_var("PSWITCH_LOG_LEVEL");
    }

    #[test]
    fn test_validation_required_not_managed() {
        let mut config = SwitcherConfig::default();
        config.profile.required = vec!["AGENTS.md".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_nested_paths() {
        let mut config = SwitcherConfig::default();
        config.profile.files.push("../escape.md".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_metadata_collision() {
        let mut config = SwitcherConfig::default();
        config.profile.metadata_file = "SOUL.md".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_invalid_log_level() {
        let mut config = SwitcherConfig::default();
        config.logging.level = "invalid".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_valid_config() {
        assert!(SwitcherConfig::default().validate().is_ok());
    }

    #[test]
    fn test_path_expansion() {
        let mut config = SwitcherConfig::default();
        config.workspace.dir = Some("~/agent".to_string());
        config.expand_paths();

        assert!(!config.workspace.dir.unwrap().contains('~'));
    }

    #[test]
    fn test_generated_config_parses() {
        let config: SwitcherConfig = toml::from_str(&generate_default_config()).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.host.commands.len(), 3);
    }

    #[test]
    fn test_parse_config_file() {
        let config_str = r#"
[workspace]
dir = "/srv/agent"

[profile]
files = ["SOUL.md", "AGENTS.md"]
required = ["SOUL.md", "AGENTS.md"]

[backup]
keep_count = 0
max_age_days = 14
"#;

        let config: SwitcherConfig = toml::from_str(config_str).unwrap();

        assert_eq!(config.workspace.dir.as_deref(), Some("/srv/agent"));
        assert_eq!(config.profile.files, vec!["SOUL.md", "AGENTS.md"]);
        assert_eq!(config.profile.metadata_file, "personality.json");
        assert_eq!(config.backup.keep_count, 0);
        assert_eq!(config.backup.max_age_days, Some(14));
        assert!(config.backup.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_init_config_refuses_overwrite() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        let path_str = path.to_str().unwrap();

        init_config(Some(path_str), false).unwrap();
        assert!(init_config(Some(path_str), false).is_err());
        assert!(init_config(Some(path_str), true).is_ok());
    }
}
