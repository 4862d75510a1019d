//! Steam library provider.

use std::path::PathBuf;

use gamesphere_steam::{LaunchStyle, SteamError, installed_apps, launch_command};
use tracing::{debug, warn};

use crate::entry::{GameEntry, ImageHint, Origin};
use crate::provider::{Discovery, ProviderError, SourceProvider};

/// Lists installed Steam apps from `libraryfolders.vdf`.
pub struct SteamProvider {
    index_path: PathBuf,
    style: LaunchStyle,
}

impl SteamProvider {
    pub fn new(index_path: impl Into<PathBuf>, style: LaunchStyle) -> Self {
        Self {
            index_path: index_path.into(),
            style,
        }
    }

    /// Uses the launch style detected from the index location.
    pub fn detect(index_path: impl Into<PathBuf>) -> Self {
        let index_path = index_path.into();
        let style = LaunchStyle::detect(&index_path);
        Self::new(index_path, style)
    }

    fn map_err(&self, err: SteamError) -> ProviderError {
        match err {
            SteamError::Io { path, source } => ProviderError::io(Origin::Steam, path, source),
            other => ProviderError::malformed(Origin::Steam, &self.index_path, other.to_string()),
        }
    }
}

impl SourceProvider for SteamProvider {
    fn origin(&self) -> Origin {
        Origin::Steam
    }

    fn discover(&self) -> Result<Discovery, ProviderError> {
        let scan = installed_apps(&self.index_path).map_err(|e| self.map_err(e))?;
        debug!(count = scan.apps.len(), style = %self.style, "steam provider done");

        let incomplete = scan
            .skipped
            .iter()
            .map(|skipped| {
                warn!(
                    path = %skipped.path.display(),
                    apps = ?skipped.app_ids,
                    "steam library partly unreadable"
                );
                format!("{}: {}", skipped.path.display(), skipped.reason)
            })
            .collect();

        let entries = scan
            .apps
            .into_iter()
            .map(|app| GameEntry {
                origin: Origin::Steam,
                stable_id: app.app_id.to_string(),
                display_name: app.name,
                launch_command: launch_command(app.app_id, self.style),
                working_directory: None,
                image_hint: ImageHint::SteamAppId(app.app_id),
                shortcut: None,
            })
            .collect();

        Ok(Discovery { entries, incomplete })
    }
}
