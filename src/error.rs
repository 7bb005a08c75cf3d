//! Error types for the personality switcher
//!
//! Provides structured error handling with:
//! - Numeric error codes for machine parsing
//! - Stable kind slugs for the JSON result record
//! - User-friendly messages with suggestions
//! - Exit codes for CLI

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for switcher operations
pub type Result<T> = std::result::Result<T, Error>;

/// Numeric error codes for machine parsing and documentation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ErrorCode {
    // Configuration errors (1xx)
    ConfigNotFound = 100,
    ConfigParseError = 101,
    ConfigValidation = 102,
    Usage = 103,

    // IO errors (2xx)
    IoRead = 200,
    IoWrite = 201,
    IoPermission = 202,
    IoNotFound = 203,
    Serialization = 204,

    // Personality errors (3xx)
    PersonalityNotFound = 300,
    InvalidName = 301,
    AlreadyExists = 302,
    InvalidPersonality = 303,
    CannotDeleteDefault = 304,
    CannotRenameDefault = 305,

    // Ledger errors (4xx)
    LedgerCorrupt = 400,
    NoValidPersonality = 401,

    // Sync errors (5xx)
    CopyFailed = 500,
    BackupFailed = 501,
    ImplicitSwitchFailed = 502,
    DeleteFailedAfterSwitch = 503,
    DeleteFailed = 504,

    // Retention errors (6xx)
    PruneFailed = 600,

    // Host integration errors (7xx)
    HostConfig = 700,

    // Internal errors (9xx)
    InternalError = 900,
}

impl ErrorCode {
    /// Get the string code (e.g., "E300")
    pub fn as_str(&self) -> String {
        format!("E{}", *self as u16)
    }

    /// Get the exit code for CLI (maps to 1-125 range)
    pub fn exit_code(&self) -> i32 {
        match *self as u16 {
            100..=199 => 10, // Config errors
            200..=299 => 20, // IO errors
            300..=399 => 30, // Personality errors
            400..=499 => 40, // Ledger errors
            500..=599 => 50, // Sync errors
            600..=699 => 60, // Retention errors
            700..=799 => 70, // Host errors
            900..=999 => 90, // Internal errors
            _ => 1,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Main error type for the switcher
#[derive(Error, Debug)]
pub enum Error {
    // ─────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Configuration parse error
    #[error("Failed to parse configuration {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// Configuration validation error
    #[error("Configuration validation failed: {message}")]
    ConfigValidation { message: String, field: Option<String> },

    /// Generic configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Command-line arguments rejected by the parser
    #[error("Invalid usage: {message}")]
    Usage { message: String },

    // ─────────────────────────────────────────────────────────────
    // IO Errors
    // ─────────────────────────────────────────────────────────────

    /// File read error
    #[error("Failed to read {path}: {source}")]
    IoRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File write error
    #[error("Failed to write {path}: {source}")]
    IoWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    Toml(#[from] toml::ser::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ─────────────────────────────────────────────────────────────
    // Personality Errors
    // ─────────────────────────────────────────────────────────────

    /// Referenced personality is absent from the store
    #[error("Personality not found: {name}")]
    NotFound { name: String },

    /// Name is not filesystem-safe
    #[error("Invalid personality name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    /// Name already taken
    #[error("Personality already exists: {name}")]
    AlreadyExists { name: String },

    /// Personality folder is missing required profile files
    #[error("Personality '{name}' is invalid: missing {}", .missing.join(", "))]
    InvalidPersonality { name: String, missing: Vec<String> },

    /// The reserved default personality cannot be deleted
    #[error("The 'default' personality cannot be deleted")]
    CannotDeleteDefault,

    /// The reserved default personality cannot be renamed
    #[error("The 'default' personality cannot be renamed")]
    CannotRenameDefault,

    // ─────────────────────────────────────────────────────────────
    // Ledger Errors
    // ─────────────────────────────────────────────────────────────

    /// State ledger exists but cannot be decoded
    #[error("State ledger {path} is corrupt: {message}")]
    LedgerCorrupt { path: PathBuf, message: String },

    /// Neither the active personality nor 'default' is usable
    #[error("No valid personality available: {reason}")]
    NoValidPersonality { reason: String },

    // ─────────────────────────────────────────────────────────────
    // Sync Errors
    // ─────────────────────────────────────────────────────────────

    /// Copying a profile file into the workspace failed
    #[error("Failed to copy '{file}' of personality '{name}' into {path}: {source}")]
    CopyFailed {
        name: String,
        file: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Snapshot before a destructive operation failed
    #[error("Failed to back up '{name}': {message}")]
    BackupFailed { name: String, message: String },

    /// The switch to 'default' before deleting the active personality failed
    #[error("Could not switch to 'default' before deleting '{name}': {source}")]
    ImplicitSwitchFailed {
        name: String,
        #[source]
        source: Box<Error>,
    },

    /// Deleting failed after the ledger already moved to 'default'
    #[error("Switched to 'default' but failed to delete '{name}': {message}")]
    DeleteFailedAfterSwitch { name: String, message: String },

    /// Deleting an inactive personality failed
    #[error("Failed to delete personality '{name}' at {path}: {source}")]
    DeleteFailed {
        name: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ─────────────────────────────────────────────────────────────
    // Retention Errors
    // ─────────────────────────────────────────────────────────────

    /// Some backups could not be deleted
    #[error("Pruned {deleted} backup(s) but {} failed: {}", .failures.len(), .failures.join("; "))]
    PruneFailed { deleted: usize, failures: Vec<String> },

    // ─────────────────────────────────────────────────────────────
    // Host Integration Errors
    // ─────────────────────────────────────────────────────────────

    /// Host configuration file cannot be updated
    #[error("Host configuration error ({path}): {message}")]
    HostConfig { path: PathBuf, message: String },

    // ─────────────────────────────────────────────────────────────
    // Internal Errors
    // ─────────────────────────────────────────────────────────────

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    // ─────────────────────────────────────────────────────────────
    // Error Classification
    // ─────────────────────────────────────────────────────────────

    /// Get the numeric error code
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::ConfigNotFound { .. } => ErrorCode::ConfigNotFound,
            Error::ConfigParse { .. } => ErrorCode::ConfigParseError,
            Error::ConfigValidation { .. } => ErrorCode::ConfigValidation,
            Error::Config(_) => ErrorCode::ConfigValidation,
            Error::Usage { .. } => ErrorCode::Usage,

            Error::IoRead { .. } => ErrorCode::IoRead,
            Error::IoWrite { .. } => ErrorCode::IoWrite,
            Error::Io(e) => match e.kind() {
                std::io::ErrorKind::NotFound => ErrorCode::IoNotFound,
                std::io::ErrorKind::PermissionDenied => ErrorCode::IoPermission,
                _ => ErrorCode::IoRead,
            },
            Error::Toml(_) | Error::Json(_) => ErrorCode::Serialization,

            Error::NotFound { .. } => ErrorCode::PersonalityNotFound,
            Error::InvalidName { .. } => ErrorCode::InvalidName,
            Error::AlreadyExists { .. } => ErrorCode::AlreadyExists,
            Error::InvalidPersonality { .. } => ErrorCode::InvalidPersonality,
            Error::CannotDeleteDefault => ErrorCode::CannotDeleteDefault,
            Error::CannotRenameDefault => ErrorCode::CannotRenameDefault,

            Error::LedgerCorrupt { .. } => ErrorCode::LedgerCorrupt,
            Error::NoValidPersonality { .. } => ErrorCode::NoValidPersonality,

            Error::CopyFailed { .. } => ErrorCode::CopyFailed,
            Error::BackupFailed { .. } => ErrorCode::BackupFailed,
            Error::ImplicitSwitchFailed { .. } => ErrorCode::ImplicitSwitchFailed,
            Error::DeleteFailedAfterSwitch { .. } => ErrorCode::DeleteFailedAfterSwitch,
            Error::DeleteFailed { .. } => ErrorCode::DeleteFailed,

            Error::PruneFailed { .. } => ErrorCode::PruneFailed,

            Error::HostConfig { .. } => ErrorCode::HostConfig,

            Error::Internal(_) => ErrorCode::InternalError,
        }
    }

    /// Stable snake_case slug reported as `kind` in the JSON result
    pub fn kind(&self) -> &'static str {
        match self.code() {
            ErrorCode::ConfigNotFound => "config_not_found",
            ErrorCode::ConfigParseError => "config_parse",
            ErrorCode::ConfigValidation => "config_validation",
            ErrorCode::Usage => "usage",
            ErrorCode::IoRead => "io_read",
            ErrorCode::IoWrite => "io_write",
            ErrorCode::IoPermission => "io_permission",
            ErrorCode::IoNotFound => "io_not_found",
            ErrorCode::Serialization => "serialization",
            ErrorCode::PersonalityNotFound => "not_found",
            ErrorCode::InvalidName => "invalid_name",
            ErrorCode::AlreadyExists => "already_exists",
            ErrorCode::InvalidPersonality => "invalid_personality",
            ErrorCode::CannotDeleteDefault => "cannot_delete_default",
            ErrorCode::CannotRenameDefault => "cannot_rename_default",
            ErrorCode::LedgerCorrupt => "ledger_corrupt",
            ErrorCode::NoValidPersonality => "no_valid_personality",
            ErrorCode::CopyFailed => "copy_failed",
            ErrorCode::BackupFailed => "backup_failed",
            ErrorCode::ImplicitSwitchFailed => "implicit_switch_failed",
            ErrorCode::DeleteFailedAfterSwitch => "delete_failed_after_switch",
            ErrorCode::DeleteFailed => "delete_failed",
            ErrorCode::PruneFailed => "prune_failed",
            ErrorCode::HostConfig => "host_config",
            ErrorCode::InternalError => "internal",
        }
    }

    /// Check if the error is fatal (no fallback exists, the agent cannot run)
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::NoValidPersonality { .. }
                | Error::ConfigNotFound { .. }
                | Error::ConfigParse { .. }
                | Error::ConfigValidation { .. }
                | Error::Internal(_)
        )
    }

    /// Get the exit code for CLI
    pub fn exit_code(&self) -> i32 {
        self.code().exit_code()
    }

    // ─────────────────────────────────────────────────────────────
    // User-Friendly Messages
    // ─────────────────────────────────────────────────────────────

    /// Get a user-friendly suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Error::ConfigNotFound { .. } => Some(
                "Run 'personality-switcher config init' to create a default configuration file."
            ),
            Error::ConfigParse { .. } => Some(
                "Check your configuration file syntax. Run 'personality-switcher config validate' to see details."
            ),
            Error::ConfigValidation { .. } => Some(
                "Review the configuration file and fix the invalid values."
            ),
            Error::Usage { .. } => Some(
                "Run 'personality-switcher --help' to see the available commands and arguments."
            ),

            Error::NotFound { .. } => Some(
                "Run 'personality-switcher list' to see installed personalities."
            ),
            Error::InvalidName { .. } => Some(
                "Use letters, digits, '-' and '_' only, starting with a letter or digit."
            ),
            Error::InvalidPersonality { .. } => Some(
                "Add the missing profile files to the personality folder or switch to another personality."
            ),
            Error::CannotDeleteDefault | Error::CannotRenameDefault => Some(
                "'default' is the fallback personality and must always exist."
            ),

            Error::NoValidPersonality { .. } => Some(
                "Run 'personality-switcher init' to provision the 'default' personality."
            ),

            Error::CopyFailed { .. } => Some(
                "Check that the workspace directory is writable. The active personality was not changed."
            ),
            Error::BackupFailed { .. } => Some(
                "Check free disk space and permissions on the backup directory, or disable backups."
            ),
            Error::DeleteFailedAfterSwitch { .. } => Some(
                "'default' is now active. Remove the personality folder manually or retry the delete."
            ),

            Error::PruneFailed { .. } => Some(
                "Some backups were not removed. Check permissions on the backup directory and retry."
            ),

            Error::HostConfig { .. } => Some(
                "Set [host] config_file to the host's JSON configuration file."
            ),

            _ => None,
        }
    }

    /// Format the error for terminal display with colors
    pub fn format_for_terminal(&self) -> String {
        let mut output = format!(
            "\x1b[31mError [{}]\x1b[0m: {}\n",
            self.code().as_str(),
            self
        );

        if let Error::ConfigValidation {
            field: Some(field), ..
        } = self
        {
            output.push_str(&format!("  Field: {}\n", field));
        }

        if let Some(hint) = self.suggestion() {
            output.push_str(&format!("\n\x1b[33mHint\x1b[0m: {}\n", hint));
        }

        output
    }

    /// Format the error for logging (no colors)
    pub fn format_for_log(&self) -> String {
        format!("[{}] {}", self.code().as_str(), self)
    }
}

// ─────────────────────────────────────────────────────────────────
// Error Constructors (for ergonomic error creation)
// ─────────────────────────────────────────────────────────────────

impl Error {
    /// Create a personality not found error
    pub fn not_found(name: impl Into<String>) -> Self {
        Error::NotFound { name: name.into() }
    }

    /// Create a config validation error
    pub fn config_validation(message: impl Into<String>) -> Self {
        Error::ConfigValidation {
            message: message.into(),
            field: None,
        }
    }

    /// Create a config validation error with field name
    pub fn config_field_invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::ConfigValidation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create a write error for a path
    pub fn io_write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::IoWrite {
            path: path.into(),
            source,
        }
    }

    /// Create a read error for a path
    pub fn io_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::IoRead {
            path: path.into(),
            source,
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
