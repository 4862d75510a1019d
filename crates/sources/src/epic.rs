//! Epic Games Store provider.
//!
//! Reads the launcher's `*.item` manifests (one JSON file per install).

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, warn};

use crate::command::open_uri_command;
use crate::entry::{GameEntry, ImageHint, Origin};
use crate::provider::{Discovery, ProviderError, SourceProvider, dedup_entries};

/// Default manifest folder of the Windows launcher.
pub const DEFAULT_MANIFESTS_DIR: &str = r"C:\ProgramData\Epic\EpicGamesLauncher\Data\Manifests";

/// Fields of an `.item` manifest this provider reads.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct EpicManifest {
    #[serde(default)]
    display_name: String,
    #[serde(default)]
    catalog_item_id: String,
    #[serde(default)]
    catalog_namespace: String,
    #[serde(default)]
    app_name: String,
    #[serde(default)]
    install_location: String,
    #[serde(default, rename = "bIsIncompleteInstall")]
    is_incomplete_install: bool,
    #[serde(default)]
    app_categories: Vec<String>,
}

impl EpicManifest {
    fn is_game(&self) -> bool {
        // Older manifests carry no categories; treat them as games.
        self.app_categories.is_empty() || self.app_categories.iter().any(|c| c == "games")
    }

    fn launch_uri(&self) -> String {
        format!(
            "com.epicgames.launcher://apps/{}%3A{}%3A{}?action=launch&silent=true",
            self.catalog_namespace, self.catalog_item_id, self.app_name
        )
    }
}

pub struct EpicProvider {
    manifests_dir: PathBuf,
}

impl EpicProvider {
    pub fn new(manifests_dir: impl Into<PathBuf>) -> Self {
        Self {
            manifests_dir: manifests_dir.into(),
        }
    }
}

impl SourceProvider for EpicProvider {
    fn origin(&self) -> Origin {
        Origin::Epic
    }

    fn discover(&self) -> Result<Discovery, ProviderError> {
        let dir = fs::read_dir(&self.manifests_dir)
            .map_err(|e| ProviderError::io(Origin::Epic, &self.manifests_dir, e))?;

        let mut paths: Vec<PathBuf> = dir
            .flatten()
            .map(|e| e.path())
            .filter(|p| p.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("item")))
            .collect();
        paths.sort();

        let mut entries = Vec::new();
        let mut incomplete = Vec::new();
        for path in paths {
            match read_manifest(&path) {
                Ok(Some(entry)) => entries.push(entry),
                Ok(None) => {}
                Err(reason) => {
                    warn!(manifest = %path.display(), %reason, "skipping Epic manifest");
                    incomplete.push(format!("{}: {reason}", path.display()));
                }
            }
        }

        debug!(count = entries.len(), skipped = incomplete.len(), "epic provider done");
        Ok(Discovery {
            entries: dedup_entries(entries),
            incomplete,
        })
    }
}

fn read_manifest(path: &Path) -> Result<Option<GameEntry>, String> {
    let text = fs::read_to_string(path).map_err(|e| e.to_string())?;
    let manifest: EpicManifest = serde_json::from_str(&text).map_err(|e| e.to_string())?;

    if manifest.is_incomplete_install {
        debug!(app = %manifest.app_name, "incomplete install, skipping");
        return Ok(None);
    }
    if !manifest.is_game() {
        debug!(app = %manifest.app_name, "not a game, skipping");
        return Ok(None);
    }
    if manifest.app_name.is_empty() {
        return Err("missing AppName".into());
    }

    let stable_id = if manifest.catalog_item_id.is_empty() {
        manifest.app_name.clone()
    } else {
        manifest.catalog_item_id.clone()
    };
    let display_name = if manifest.display_name.trim().is_empty() {
        manifest.app_name.clone()
    } else {
        manifest.display_name.trim().to_string()
    };

    Ok(Some(GameEntry {
        origin: Origin::Epic,
        stable_id,
        launch_command: open_uri_command(&manifest.launch_uri()),
        working_directory: (!manifest.install_location.is_empty())
            .then(|| manifest.install_location.clone()),
        image_hint: ImageHint::Name(display_name.clone()),
        display_name,
        shortcut: None,
    }))
}
