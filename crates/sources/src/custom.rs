//! User-declared games from a JSON file:
//!
//! ```json
//! { "games": [ { "name": "Dolphin", "cmd": "dolphin.exe", "image_path": "dolphin.png" } ] }
//! ```
//!
//! `id` and `working_dir` are optional extras. Without `id` the name is the
//! stable identity. Relative `image_path` values resolve against the file's
//! directory.

use std::fs;
use std::path::PathBuf;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::entry::{GameEntry, ImageHint, Origin};
use crate::provider::{Discovery, ProviderError, SourceProvider, dedup_entries};

#[derive(Debug, Deserialize)]
struct CustomFile {
    #[serde(default)]
    games: Vec<CustomGame>,
}

#[derive(Debug, Deserialize)]
struct CustomGame {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: String,
    #[serde(default)]
    cmd: String,
    #[serde(default)]
    image_path: Option<String>,
    #[serde(default)]
    working_dir: Option<String>,
}

pub struct CustomProvider {
    path: PathBuf,
}

impl CustomProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SourceProvider for CustomProvider {
    fn origin(&self) -> Origin {
        Origin::Custom
    }

    fn discover(&self) -> Result<Discovery, ProviderError> {
        let text = fs::read_to_string(&self.path)
            .map_err(|e| ProviderError::io(Origin::Custom, &self.path, e))?;
        let file: CustomFile = serde_json::from_str(&text)
            .map_err(|e| ProviderError::malformed(Origin::Custom, &self.path, e.to_string()))?;
        let base = self.path.parent().map(PathBuf::from).unwrap_or_default();

        let mut entries = Vec::with_capacity(file.games.len());
        for (index, game) in file.games.into_iter().enumerate() {
            let name = game.name.trim();
            if name.is_empty() || game.cmd.trim().is_empty() {
                warn!(index, "custom game without name or cmd, skipping");
                continue;
            }
            let stable_id = game
                .id
                .filter(|id| !id.trim().is_empty())
                .unwrap_or_else(|| name.to_string());
            let image_hint = match game.image_path.filter(|p| !p.is_empty()) {
                Some(p) => ImageHint::File(base.join(p)),
                None => ImageHint::Name(name.to_string()),
            };
            entries.push(GameEntry {
                origin: Origin::Custom,
                stable_id,
                display_name: name.to_string(),
                launch_command: game.cmd.trim().to_string(),
                working_directory: game.working_dir.filter(|d| !d.is_empty()),
                image_hint,
                shortcut: None,
            });
        }

        debug!(count = entries.len(), file = %self.path.display(), "custom provider done");
        Ok(Discovery::complete(dedup_entries(entries)))
    }
}
