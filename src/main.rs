//! personality-switcher - swap an agent's profile files with crash-safe restore
//!
//! This is the main entry point for the personality-switcher binary.
//! Each personality command loads the config, resolves the workspace, runs
//! one engine operation, and prints one JSON record on stdout.

mod cli;
mod config;
mod error;
mod fsutil;
mod host;
mod logging;
mod output;
mod persona;
mod version;
mod workspace;

use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use serde_json::json;
use tracing::{debug, error, warn};

use crate::cli::{Cli, Commands, ConfigSubcommand, HostSubcommand};
use crate::config::SwitcherConfig;
use crate::error::{Error, Result};
use crate::host::HostRegistrar;
use crate::output::CommandResult;
use crate::persona::{CreateSource, PersonalityName, RetentionPolicy, SwitchEngine};
use crate::workspace::ResolvedPaths;

fn main() {
    // Parse CLI arguments first (before logging, so we know verbosity)
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => usage_error(e),
    };

    match &cli.command {
        Commands::Version => {
            version::print_version();
            return;
        }
        Commands::Config { subcommand } => {
            let result = logging::init_simple(tracing::Level::WARN)
                .and_then(|_| handle_config_command(subcommand.clone(), cli.config.as_deref()));
            if let Err(e) = result {
                eprint!("{}", e.format_for_terminal());
                std::process::exit(e.exit_code());
            }
            return;
        }
        _ => {}
    }

    // `run` owns the log guards, so file logs are flushed before we exit.
    let result = run(&cli);
    result.print();
    std::process::exit(result.exit_code());
}

/// Report rejected arguments as a JSON record; help and version stay plain text.
fn usage_error(e: clap::Error) -> ! {
    if matches!(
        e.kind(),
        ErrorKind::DisplayHelp
            | ErrorKind::DisplayVersion
            | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
    ) {
        e.exit();
    }

    let _ = e.print();
    let rendered = e.to_string();
    let message = rendered
        .lines()
        .take_while(|line| !line.starts_with("Usage:"))
        .map(|line| line.trim().trim_start_matches("error: "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    let result = CommandResult::error(attempted_command(), &Error::Usage { message });
    result.print();
    std::process::exit(result.exit_code());
}

/// Best guess at the subcommand the user typed.
fn attempted_command() -> String {
    let cmd = Cli::command();
    std::env::args()
        .skip(1)
        .find(|arg| cmd.find_subcommand(arg).is_some())
        .unwrap_or_else(|| cmd.get_name().to_string())
}

/// Load config, set up logging, and run one personality command.
fn run(cli: &Cli) -> CommandResult {
    let command = cli.command.name();

    let config = match SwitcherConfig::load(cli.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => return CommandResult::error(command, &e),
    };

    let _log_guards = match logging::init_logging(&config.logging, cli.verbose, cli.quiet) {
        Ok(guards) => guards,
        Err(e) => return CommandResult::error(command, &e),
    };

    let build = version::build_info();
    debug!(version = %build.full_version(), command, "Starting personality-switcher");

    match dispatch(cli, &config) {
        Ok(result) => result,
        Err(e) => {
            if e.is_fatal() {
                error!(command, error = %e.format_for_log(), "Command failed");
            } else {
                warn!(command, error = %e.format_for_log(), "Command failed");
            }
            CommandResult::error(command, &e)
        }
    }
}

fn dispatch(cli: &Cli, config: &SwitcherConfig) -> Result<CommandResult> {
    let command = cli.command.name();

    if let Commands::Commands { subcommand } = &cli.command {
        let registrar = HostRegistrar::from_settings(&config.host)?;
        let (update, message) = match subcommand {
            HostSubcommand::Register => (registrar.register()?, "Host commands registered"),
            HostSubcommand::Unregister => (registrar.unregister()?, "Host commands unregistered"),
        };
        return Ok(CommandResult::ok(command, message, serde_json::to_value(&update)?));
    }

    let paths = ResolvedPaths::resolve(cli.workspace.as_deref(), &config.workspace)?;
    let engine = SwitchEngine::from_config(&paths, config);

    let result = match &cli.command {
        Commands::Switch { name } => {
            let name = PersonalityName::new(name.as_str())?;
            let outcome = engine.switch(&name)?;
            let message = if outcome.already_active {
                format!("'{}' is already active, files re-applied", name)
            } else {
                format!("Switched to '{}'", name)
            };
            CommandResult::ok(command, message, serde_json::to_value(&outcome)?)
        }

        Commands::Delete { name } => {
            let name = PersonalityName::new(name.as_str())?;
            let outcome = engine.delete(&name)?;
            let message = if outcome.switched_to_default {
                format!("Deleted '{}', 'default' is now active", name)
            } else {
                format!("Deleted '{}'", name)
            };
            CommandResult::ok(command, message, serde_json::to_value(&outcome)?)
        }

        Commands::Restore => {
            let outcome = engine.restore()?;
            let message = match (&outcome.requested, outcome.fell_back) {
                (Some(requested), true) => format!(
                    "'{}' is unavailable, restored '{}'",
                    requested, outcome.active
                ),
                _ if outcome.files.is_noop() => {
                    format!("Workspace already matches '{}'", outcome.active)
                }
                _ => format!("Restored '{}'", outcome.active),
            };
            CommandResult::ok(command, message, serde_json::to_value(&outcome)?)
        }

        Commands::CleanupBackups { keep, days } => {
            let policy = RetentionPolicy::new(
                keep.unwrap_or(config.backup.keep_count),
                days.or(config.backup.max_age_days),
            );
            let report = engine.cleanup_backups(&policy);
            let data = json!({
                "deleted": report.deleted,
                "retained": report.retained,
                "skipped": report.skipped,
                "keep_count": policy.keep_count,
                "max_age_days": policy.max_age.map(|d| d.num_days()),
            });
            match report.error {
                Some(e) => {
                    warn!(error = %e.format_for_log(), "Backup cleanup incomplete");
                    CommandResult::error(command, &e).with_data(data)
                }
                None => CommandResult::ok(
                    command,
                    format!("Removed {} backup(s)", report.deleted),
                    data,
                ),
            }
        }

        Commands::List => {
            let personalities = engine.list()?;
            CommandResult::ok(
                command,
                format!("{} personality(ies) installed", personalities.len()),
                json!({ "personalities": personalities }),
            )
        }

        Commands::Create {
            name,
            from,
            template,
            description,
        } => {
            let name = PersonalityName::new(name.as_str())?;
            let source = match (from, template) {
                (Some(from), _) => CreateSource::Personality(PersonalityName::new(from.as_str())?),
                (None, true) => CreateSource::Template,
                (None, false) => CreateSource::Workspace,
            };
            let info = engine.create(&name, &source, description.clone())?;
            CommandResult::ok(
                command,
                format!("Created '{}' from {}", name, source.label()),
                serde_json::to_value(&info)?,
            )
        }

        Commands::Rename { old, new } => {
            let old = PersonalityName::new(old.as_str())?;
            let new = PersonalityName::new(new.as_str())?;
            let outcome = engine.rename(&old, &new)?;
            CommandResult::ok(
                command,
                format!("Renamed '{}' to '{}'", old, new),
                serde_json::to_value(&outcome)?,
            )
        }

        Commands::Status => {
            let report = engine.status()?;
            let message = if report.drifted.is_empty() {
                format!("'{}' is active", report.effective)
            } else {
                format!(
                    "'{}' is active, {} file(s) drifted",
                    report.effective,
                    report.drifted.len()
                )
            };
            CommandResult::ok(command, message, serde_json::to_value(&report)?)
        }

        Commands::Init => {
            let outcome = engine.init()?;
            let message = match &outcome.source {
                Some(source) => format!("Created 'default' from {}", source),
                None => "'default' already exists".to_string(),
            };
            CommandResult::ok(command, message, serde_json::to_value(&outcome)?)
        }

        Commands::Commands { .. } | Commands::Config { .. } | Commands::Version => {
            return Err(Error::Internal(format!(
                "'{}' is handled before dispatch",
                command
            )))
        }
    };

    Ok(result)
}

/// Handle config subcommands (plain text output)
fn handle_config_command(subcommand: ConfigSubcommand, config_path: Option<&str>) -> Result<()> {
    match subcommand {
        ConfigSubcommand::Show => {
            let cfg = SwitcherConfig::load(config_path)?;
            println!("{}", toml::to_string_pretty(&cfg)?);
        }
        ConfigSubcommand::Init { path, force } => {
            let created = config::init_config(path.as_deref(), force)?;
            println!("Created configuration file: {}", created.display());
        }
        ConfigSubcommand::Validate => {
            SwitcherConfig::load(config_path)?;
            println!("Configuration is valid.");
        }
    }

    Ok(())
}
