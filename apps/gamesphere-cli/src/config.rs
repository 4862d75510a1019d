//! Run configuration for the CLI.
//!
//! Layered lowest to highest: built-in defaults, the TOML file
//! (`<config dir>/gamesphere/config.toml` unless `--config` is given), then
//! command-line flags and their environment variables.

use std::path::{Path, PathBuf};

use anyhow::Context;
use gamesphere_reconcile::ReconcileConfig;
use tracing::{debug, info};

use crate::Cli;

const CONFIG_FILE: &str = "config.toml";

/// Default location of the config file.
pub fn default_config_path() -> Option<PathBuf> {
    gamesphere_host::app_data_dir().map(|dir| dir.join(CONFIG_FILE))
}

/// Reads a TOML config file. Every key is optional.
pub fn load_file(path: &Path) -> anyhow::Result<ReconcileConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let config = toml::from_str(&content)
        .with_context(|| format!("invalid config {}", path.display()))?;
    debug!(path = %path.display(), "configuration file loaded");
    Ok(config)
}

/// Builds the run configuration from the file (if any) and the flags.
pub fn resolve(cli: &Cli) -> anyhow::Result<ReconcileConfig> {
    let mut config = match &cli.config {
        Some(path) => load_file(path)?,
        None => match default_config_path().filter(|p| p.is_file()) {
            Some(path) => load_file(&path)?,
            None => ReconcileConfig::default(),
        },
    };
    apply_flags(&mut config, cli);

    if config.steam_library_index_path.is_none() && !cli.no_steam {
        config.steam_library_index_path = detect_steam();
    }
    if cli.no_steam {
        config.steam_library_index_path = None;
    }
    Ok(config)
}

fn apply_flags(config: &mut ReconcileConfig, cli: &Cli) {
    if let Some(path) = &cli.steam_library {
        config.steam_library_index_path = Some(path.clone());
    }
    if let Some(path) = &cli.apps_json {
        config.host_apps_document_path = Some(path.clone());
    }
    if let Some(path) = &cli.grids_folder {
        config.thumbnails_directory = Some(path.clone());
    }
    if let Some(key) = cli.steamgriddb_api_key.as_deref().filter(|k| !k.trim().is_empty()) {
        config.community_art_api_key = Some(key.trim().to_string());
    }
    if let Some(path) = &cli.epic_manifests {
        config.epic_manifests_path = Some(path.clone());
    }
    if let Some(list) = &cli.xbox_folders {
        config.xbox_game_folders = ReconcileConfig::parse_folder_list(list);
    }
    if let Some(path) = &cli.custom_games {
        config.custom_games_json_path = Some(path.clone());
    }
    if let Some(path) = &cli.shortcuts_folder {
        config.shortcuts_folder = Some(path.clone());
    }
    if let Some(host) = cli.host {
        config.host = host;
    }
    if let Some(launch) = cli.steam_launch {
        config.steam_launch = launch.into();
    }
    if let Some(n) = cli.concurrency {
        config.fetch_concurrency = n;
    }
    config.dry_run |= cli.dry_run;
    config.verbose |= cli.verbose;
    config.no_restart |= cli.no_restart;
}

/// Finds the local Steam installation's library index.
fn detect_steam() -> Option<PathBuf> {
    let index = gamesphere_steam::Paths::new().ok()?.library_index_path();
    if index.is_file() {
        info!(path = %index.display(), "using detected Steam library");
        Some(index)
    } else {
        debug!(path = %index.display(), "no Steam library index found");
        None
    }
}
