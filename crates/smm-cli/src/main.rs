#![cfg_attr(not(test), deny(clippy::unwrap_used))]

#[macro_use]
extern crate tracing;

use crate::{config::LauncherConfig, logging::LoggingGuard};
use clap::{Parser, Subcommand};
use directories::ProjectDirs;
use eyre::{Context, ContextCompat};
use std::{fs, path::PathBuf, process::ExitCode};

const QUALIFIER: &str = "io.github";
const ORGANIZATION: &str = "stardew-mod-manager";
const APP_NAME: &str = "smm";

mod commands;
mod config;
mod logging;

#[cfg(test)]
#[ctor::ctor]
fn setup_test() {
    use tracing_subscriber::EnvFilter;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("trace")),
        )
        .with_file(true)
        .with_line_number(true)
        .init();
}

/// Install SMAPI and manage Stardew Valley mods through Steam.
#[derive(Debug, Parser)]
#[command(name = "smm", version, about)]
pub struct Cli {
    /// Steam account id to act on (defaults to the first local user)
    #[arg(long, global = true)]
    user: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List the Steam users that signed in on this machine
    Users,
    /// Show the resolved paths and the SMAPI state
    Status,
    /// Download the latest SMAPI release and install it
    Install,
    /// Switch the launch options between SMAPI and the plain game
    Toggle,
    /// Start Stardew Valley through Steam
    Launch,
    /// List enabled and disabled mods
    Mods,
    /// Move a mod back into the Mods folder
    EnableMod { name: String },
    /// Move a mod into the DisabledMods folder
    DisableMod { name: String },
    /// Zip the Mods folder into a mod pack
    Export { path: PathBuf },
    /// Replace every installed mod with a mod pack
    Import { path: PathBuf },
    /// List recently installed mod packs
    Recent,
    /// Remove a mod pack from the recent list
    ForgetPack { path: PathBuf },
    /// Use a custom Steam folder, or auto-detect it again when omitted
    SetSteamPath { path: Option<PathBuf> },
    /// Use a custom game folder, or auto-detect it again when omitted
    SetGamePath { path: Option<PathBuf> },
}

pub struct InitResources {
    dirs: ProjectDirs,
    _logging_guard: LoggingGuard,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let init_res = match init() {
        Ok(res) => res,
        Err(e) => {
            eprintln!("failed to initialize: {e:?}");
            return ExitCode::FAILURE;
        }
    };

    match commands::run(cli, &init_res.dirs).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:?}");
            eprintln!(
                "error: {e}\nsee the log files in {} for details",
                init_res.dirs.data_dir().join("logs").display()
            );
            ExitCode::FAILURE
        }
    }
}

fn init() -> eyre::Result<InitResources> {
    let dirs = ProjectDirs::from(QUALIFIER, ORGANIZATION, APP_NAME)
        .context("failed to detect the user directories")?;

    fs::create_dir_all(dirs.config_dir()).context("failed to create the config directory")?;
    fs::create_dir_all(dirs.data_dir()).context("failed to create the data directory")?;

    let launcher_config: LauncherConfig = config::load(dirs.config_dir())?;
    let logging_guard = logging::init(&dirs, &launcher_config);
    info!(
        "{APP_NAME} {} starting, config in {}",
        env!("CARGO_PKG_VERSION"),
        dirs.config_dir().display()
    );

    Ok(InitResources {
        dirs,
        _logging_guard: logging_guard,
    })
}
