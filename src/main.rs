//! `stitchtoon-gui` - front-end for the stitchtoon image stitcher
//!
//! Command-line entry point. Manages profiles and the theme, and runs stitch
//! jobs through the same session controller a windowed front-end uses.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use stitchtoon_gui::{
    config::{ConfigManager, SettingsStore},
    controller::SessionController,
    error::get_user_friendly_error,
    utils::{self, UpdateChecker},
    worker::{CommandStitcher, MessageKind, StitchJob},
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// How often the run loop checks for worker events
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How long a finished run waits for a pending update check
const UPDATE_CHECK_WAIT: Duration = Duration::from_secs(2);

#[derive(Debug, Parser)]
#[command(name = "stitchtoon-gui", version, about)]
struct Cli {
    /// Restore default profiles and theme before anything else
    #[arg(long)]
    reset: bool,

    /// Log at debug level
    #[arg(long)]
    debug: bool,

    /// Do not look for a newer release
    #[arg(long)]
    no_update_check: bool,

    /// Stitcher command line, e.g. `stitchtoon` or "python -m stitchtoon"
    #[arg(long, env = "STITCHTOON_STITCHER", default_value = "stitchtoon")]
    stitcher: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Manage saved profiles
    Profiles {
        #[command(subcommand)]
        action: ProfilesCommand,
    },
    /// Show or change the theme
    Theme {
        /// Theme name, e.g. "Dark Teal" or `light_pink`
        name: Option<String>,
    },
    /// Stitch a directory with a profile
    Run {
        /// Input directory
        #[arg(long)]
        input: PathBuf,
        /// Output directory, derived from the input when omitted
        #[arg(long)]
        output: Option<PathBuf>,
        /// Profile to use instead of the current one
        #[arg(long)]
        profile: Option<String>,
    },
}

#[derive(Debug, Subcommand)]
enum ProfilesCommand {
    /// List profile names, marking the current one
    List,
    /// Print a profile as JSON
    Show {
        /// Profile name; the current profile when omitted or unknown
        name: Option<String>,
    },
    /// Delete a profile
    Delete {
        /// Profile name
        name: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    ConfigManager::ensure_config_dir().context("Failed to create configuration directory")?;
    utils::init_logging(cli.debug).context("Failed to initialize logging system")?;

    let settings = SettingsStore::open_default().context("Failed to open settings")?;
    if cli.reset {
        settings.reset().context("Failed to reset settings")?;
        println!("Settings reset to defaults");
    }

    let stitcher = Arc::new(
        CommandStitcher::from_command_line(&cli.stitcher)
            .context("Invalid stitcher command")?,
    );
    let mut session = SessionController::new(settings, stitcher);

    let result = match cli.command {
        None => {
            print_summary(&session);
            Ok(())
        }
        Some(Command::Profiles { action }) => profiles(&mut session, action),
        Some(Command::Theme { name }) => theme(&mut session, name.as_deref()),
        Some(Command::Run {
            input,
            output,
            profile,
        }) => run(&mut session, input, output, profile.as_deref(), !cli.no_update_check),
    };

    if let Err(e) = &result {
        error!("Command failed: {:#}", e);
    }
    session.shutdown(None).context("Failed to save settings")?;
    result
}

fn print_summary(session: &SessionController) {
    println!("Current profile: {}", session.current_profile().name);
    println!("Theme: {}", session.theme());
    println!(
        "Settings: {}",
        ConfigManager::get_settings_path().display()
    );
}

fn profiles(session: &mut SessionController, action: ProfilesCommand) -> Result<()> {
    match action {
        ProfilesCommand::List => {
            let current = session.current_profile().name.clone();
            for name in session.profiles().list() {
                let marker = if name == current { "*" } else { " " };
                println!("{marker} {name}");
            }
        }
        ProfilesCommand::Show { name } => {
            let profile = session.profile_or_current(name.as_deref());
            println!("{}", serde_json::to_string_pretty(profile)?);
        }
        ProfilesCommand::Delete { name } => {
            session
                .delete_profile(&name)
                .map_err(|e| anyhow::anyhow!(get_user_friendly_error(&e)))?;
            println!("Deleted profile \"{name}\"");
        }
    }
    Ok(())
}

fn theme(session: &mut SessionController, name: Option<&str>) -> Result<()> {
    match name {
        Some(name) => {
            let theme = session
                .change_theme(name)
                .map_err(|e| anyhow::anyhow!(get_user_friendly_error(&e)))?;
            println!("Theme set to {theme}");
        }
        None => println!("{}", session.theme()),
    }
    Ok(())
}

fn run(
    session: &mut SessionController,
    input: PathBuf,
    output: Option<PathBuf>,
    profile: Option<&str>,
    check_updates: bool,
) -> Result<()> {
    if check_updates {
        session.check_for_updates(UpdateChecker::default());
    }

    let profile = session.select_profile(profile);
    let output = output.unwrap_or_else(|| session.suggest_output(&input));
    info!(
        "Running profile {:?} on {} -> {}",
        profile.name,
        input.display(),
        output.display()
    );

    session
        .start(StitchJob::new(input, output, profile))
        .map_err(|e| anyhow::anyhow!(get_user_friendly_error(&e)))?;
    session.run_until_idle(POLL_INTERVAL);
    session.poll_events();
    if check_updates {
        session.finish_update_check(UPDATE_CHECK_WAIT);
    }

    for (line, kind) in session.console() {
        if *kind == MessageKind::Error {
            eprintln!("{line}");
        } else {
            println!("{line}");
        }
    }
    if let Some(notice) = session.update_notice() {
        println!(
            "A new version is available: {} ({})",
            notice.version, notice.url
        );
    }

    let status = session.status();
    if status.kind == MessageKind::Error {
        bail!("{}", status.message);
    }
    println!("{}", status.message);
    Ok(())
}
