//! Run configuration.

use std::path::PathBuf;

use gamesphere_artwork::{DEFAULT_CDN_BASE_URL, RetryPolicy};
use gamesphere_host::HostKind;
use gamesphere_steam::LaunchStyle;
use serde::{Deserialize, Serialize};

/// How Steam games are launched by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SteamLaunch {
    /// Bare URI on Windows, `steam` or Flatpak elsewhere.
    #[default]
    Auto,
    Uri,
    Client,
    Flatpak,
}

impl SteamLaunch {
    pub fn resolve(self, library_index: &std::path::Path) -> LaunchStyle {
        match self {
            SteamLaunch::Auto => LaunchStyle::detect(library_index),
            SteamLaunch::Uri => LaunchStyle::Uri,
            SteamLaunch::Client => LaunchStyle::Client,
            SteamLaunch::Flatpak => LaunchStyle::Flatpak,
        }
    }
}

/// Everything one reconciliation run needs.
///
/// Deserializable from the TOML config file; every field has a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Steam `libraryfolders.vdf`. Steam is skipped when unset.
    pub steam_library_index_path: Option<PathBuf>,
    /// Host `apps.json`. Defaults to the host's standard location.
    pub host_apps_document_path: Option<PathBuf>,
    /// Where thumbnails are cached. Defaults to the host's covers folder.
    pub thumbnails_directory: Option<PathBuf>,
    /// SteamGridDB API key.
    pub community_art_api_key: Option<String>,
    pub epic_manifests_path: Option<PathBuf>,
    pub xbox_game_folders: Vec<PathBuf>,
    pub custom_games_json_path: Option<PathBuf>,
    /// When set, non-Steam games launch through generated scripts here.
    pub shortcuts_folder: Option<PathBuf>,
    pub dry_run: bool,
    pub verbose: bool,
    pub no_restart: bool,

    pub host: HostKind,
    pub steam_launch: SteamLaunch,
    /// Parallel thumbnail lookups.
    pub fetch_concurrency: usize,
    pub retry: RetryPolicy,
    /// Per network request, in seconds.
    pub request_timeout_secs: u64,
    /// Overrides the per-user backup fallback directory.
    pub backup_fallback_dir: Option<PathBuf>,
    pub steam_cdn_url: String,
    pub community_api_url: Option<String>,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            steam_library_index_path: None,
            host_apps_document_path: None,
            thumbnails_directory: None,
            community_art_api_key: None,
            epic_manifests_path: None,
            xbox_game_folders: Vec::new(),
            custom_games_json_path: None,
            shortcuts_folder: None,
            dry_run: false,
            verbose: false,
            no_restart: false,
            host: HostKind::default(),
            steam_launch: SteamLaunch::default(),
            fetch_concurrency: 5,
            retry: RetryPolicy::default(),
            request_timeout_secs: 15,
            backup_fallback_dir: None,
            steam_cdn_url: DEFAULT_CDN_BASE_URL.to_string(),
            community_api_url: None,
        }
    }
}

impl ReconcileConfig {
    /// Splits the comma-separated folder list form (`D:\XboxGames,E:\Games`).
    pub fn parse_folder_list(list: &str) -> Vec<PathBuf> {
        list.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .collect()
    }

    pub fn apps_document_path(&self) -> Option<PathBuf> {
        self.host_apps_document_path
            .clone()
            .or_else(|| self.host.default_apps_path())
    }

    pub fn thumbnails_path(&self) -> Option<PathBuf> {
        self.thumbnails_directory
            .clone()
            .or_else(|| self.host.default_covers_dir())
    }

    pub fn has_sources(&self) -> bool {
        self.steam_library_index_path.is_some()
            || self.epic_manifests_path.is_some()
            || !self.xbox_game_folders.is_empty()
            || self.custom_games_json_path.is_some()
    }
}
