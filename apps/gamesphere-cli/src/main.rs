//! `gamesphere`: adds installed games to Sunshine/Apollo with cover art.

mod config;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use gamesphere_host::HostKind;
use gamesphere_reconcile::{Reconciler, RunOutcome, SteamLaunch};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "gamesphere", version)]
#[command(about = "Adds installed Steam, Epic, Xbox and custom games to Sunshine or Apollo")]
pub struct Cli {
    /// TOML config file. Defaults to <config dir>/gamesphere/config.toml.
    #[arg(long, env = "GAMESPHERE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Steam libraryfolders.vdf. Detected when omitted.
    #[arg(long, env = "STEAM_LIBRARY_VDF_PATH")]
    pub steam_library: Option<PathBuf>,

    /// Skip Steam entirely, including auto-detection.
    #[arg(long)]
    pub no_steam: bool,

    /// Host apps.json to update.
    #[arg(long, env = "SUNSHINE_APPS_JSON_PATH")]
    pub apps_json: Option<PathBuf>,

    /// Folder where thumbnails are stored.
    #[arg(long, env = "SUNSHINE_GRIDS_FOLDER")]
    pub grids_folder: Option<PathBuf>,

    #[arg(long, env = "STEAMGRIDDB_API_KEY", hide_env_values = true)]
    pub steamgriddb_api_key: Option<String>,

    /// Epic Games Launcher manifests folder.
    #[arg(long, env = "EPIC_MANIFESTS_PATH")]
    pub epic_manifests: Option<PathBuf>,

    /// Comma-separated Xbox game folders.
    #[arg(long, env = "XBOX_GAMES_FOLDERS")]
    pub xbox_folders: Option<String>,

    /// JSON file listing extra games.
    #[arg(long, env = "CUSTOM_GAMES_JSON_PATH")]
    pub custom_games: Option<PathBuf>,

    /// Launch non-Steam games through scripts generated here.
    #[arg(long, env = "SHORTCUTS_FOLDER")]
    pub shortcuts_folder: Option<PathBuf>,

    #[arg(long, env = "GAMESPHERE_HOST")]
    pub host: Option<HostKind>,

    #[arg(long, value_enum)]
    pub steam_launch: Option<LaunchArg>,

    /// Parallel thumbnail downloads.
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Show what would change without touching anything.
    #[arg(long)]
    pub dry_run: bool,

    #[arg(short, long)]
    pub verbose: bool,

    /// Don't remind to restart the host afterwards.
    #[arg(long)]
    pub no_restart: bool,

    /// Remove every game from the host, keeping only its stock entries.
    #[arg(long)]
    pub remove_games: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LaunchArg {
    Auto,
    Uri,
    Client,
    Flatpak,
}

impl From<LaunchArg> for SteamLaunch {
    fn from(arg: LaunchArg) -> Self {
        match arg {
            LaunchArg::Auto => SteamLaunch::Auto,
            LaunchArg::Uri => SteamLaunch::Uri,
            LaunchArg::Client => SteamLaunch::Client,
            LaunchArg::Flatpak => SteamLaunch::Flatpak,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(format!("{default_level},hyper=warn,reqwest=warn"))),
        )
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting gamesphere");

    let config = match config::resolve(&cli) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "cannot load configuration");
            return ExitCode::from(RunOutcome::ValidationFailed.exit_code() as u8);
        }
    };

    let mut reconciler = Reconciler::new(config);
    let cancel = reconciler.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, stopping before any write");
            cancel.cancel();
        }
    });

    let result = if cli.remove_games {
        reconciler.remove_all_games().await
    } else {
        reconciler.run().await
    };

    let outcome = RunOutcome::from_result(&result);
    match &result {
        Ok(summary) => print!("{summary}"),
        Err(e) => eprintln!("error: {e}"),
    }
    ExitCode::from(outcome.exit_code() as u8)
}
