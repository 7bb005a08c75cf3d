//! CLI argument parsing using clap v4
//!
//! Defines the command-line interface for the personality switcher.

use clap::{Parser, Subcommand};

/// Personality switcher - swap an agent's profile files with crash-safe restore
///
/// Keeps named personalities (folders of profile files) and mirrors the active
/// one into the live workspace. Every personality command prints a single JSON
/// record on stdout; logs go to stderr.
#[derive(Parser, Debug)]
#[command(name = "personality-switcher")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to configuration file
    #[arg(short, long, env = "PSWITCH_CONFIG", global = true)]
    pub config: Option<String>,

    /// Live workspace directory (overrides config and auto-detection)
    #[arg(short, long, global = true)]
    pub workspace: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Make a personality the live one
    Switch {
        /// Personality name
        name: String,
    },

    /// Delete a personality (switches to 'default' first if it is active)
    Delete {
        /// Personality name
        name: String,
    },

    /// Re-apply the recorded personality to the workspace
    Restore,

    /// Prune old backups
    CleanupBackups {
        /// Number of most recent backups always kept (default from [backup])
        #[arg(long)]
        keep: Option<usize>,

        /// Maximum backup age in days (default from [backup])
        #[arg(long)]
        days: Option<u64>,
    },

    /// List installed personalities
    List,

    /// Create a personality (from the live workspace unless told otherwise)
    Create {
        /// Personality name
        name: String,

        /// Copy files from an existing personality
        #[arg(long, conflicts_with = "template")]
        from: Option<String>,

        /// Start from the bundled template
        #[arg(long)]
        template: bool,

        /// Short description stored with the personality
        #[arg(short, long)]
        description: Option<String>,
    },

    /// Rename a personality
    Rename {
        /// Current name
        old: String,

        /// New name
        new: String,
    },

    /// Show the ledger and drift between workspace and active personality
    Status,

    /// Provision the 'default' personality
    Init,

    /// Register the switcher's commands with the host agent
    Commands {
        #[command(subcommand)]
        subcommand: HostSubcommand,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },

    /// Display version and build information
    Version,
}

impl Commands {
    /// Command name as it appears in the JSON result record.
    pub fn name(&self) -> &'static str {
        match self {
            Commands::Switch { .. } => "switch",
            Commands::Delete { .. } => "delete",
            Commands::Restore => "restore",
            Commands::CleanupBackups { .. } => "cleanup-backups",
            Commands::List => "list",
            Commands::Create { .. } => "create",
            Commands::Rename { .. } => "rename",
            Commands::Status => "status",
            Commands::Init => "init",
            Commands::Commands {
                subcommand: HostSubcommand::Register,
            } => "commands register",
            Commands::Commands {
                subcommand: HostSubcommand::Unregister,
            } => "commands unregister",
            Commands::Config { .. } => "config",
            Commands::Version => "version",
        }
    }
}

/// Host registration subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum HostSubcommand {
    /// Add the switcher's commands to the host configuration
    Register,

    /// Remove the switcher's commands from the host configuration
    Unregister,
}

/// Configuration subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum ConfigSubcommand {
    /// Display the current configuration
    Show,

    /// Initialize a new configuration file
    Init {
        /// Path where to create the config file
        #[arg(short, long)]
        path: Option<String>,

        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Validate a configuration file
    Validate,
}
