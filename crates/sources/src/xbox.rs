//! Xbox / Windows store folder scan.
//!
//! Each subdirectory of a configured folder is one game. The executable is
//! `Content/gamelaunchhelper.exe` when present, else the first `.exe` in
//! `Content`, else the first `.exe` at the top level of the game folder.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::command::quote_path;
use crate::entry::{GameEntry, ImageHint, Origin};
use crate::provider::{Discovery, ProviderError, SourceProvider, dedup_entries};

const LAUNCH_HELPER: &str = "gamelaunchhelper.exe";

pub struct XboxProvider {
    folders: Vec<PathBuf>,
}

impl XboxProvider {
    pub fn new(folders: Vec<PathBuf>) -> Self {
        Self { folders }
    }
}

impl SourceProvider for XboxProvider {
    fn origin(&self) -> Origin {
        Origin::Xbox
    }

    /// Fails only when none of the folders can be read. Otherwise the
    /// unreadable ones are listed in [`Discovery::incomplete`].
    fn discover(&self) -> Result<Discovery, ProviderError> {
        let mut entries = Vec::new();
        let mut incomplete = Vec::new();
        let mut last_error = None;
        let mut readable = 0usize;

        for folder in &self.folders {
            let dir = match fs::read_dir(folder) {
                Ok(dir) => dir,
                Err(e) => {
                    warn!(folder = %folder.display(), error = %e, "xbox folder unreadable");
                    incomplete.push(format!("{}: {e}", folder.display()));
                    last_error = Some(ProviderError::io(Origin::Xbox, folder, e));
                    continue;
                }
            };
            readable += 1;

            let mut games: Vec<PathBuf> = dir
                .flatten()
                .map(|e| e.path())
                .filter(|p| p.is_dir())
                .collect();
            games.sort();

            for game_dir in games {
                let Some(name) = game_dir.file_name().and_then(|n| n.to_str()) else {
                    continue;
                };
                let Some(exe) = find_executable(&game_dir) else {
                    debug!(game = name, "no executable found, skipping");
                    continue;
                };
                entries.push(GameEntry {
                    origin: Origin::Xbox,
                    stable_id: name.to_string(),
                    display_name: name.to_string(),
                    launch_command: quote_path(&exe),
                    working_directory: exe.parent().map(|p| p.to_string_lossy().into_owned()),
                    image_hint: ImageHint::Name(name.to_string()),
                    shortcut: None,
                });
            }
        }

        if readable == 0
            && let Some(err) = last_error
        {
            return Err(err);
        }

        debug!(count = entries.len(), folders = self.folders.len(), "xbox provider done");
        Ok(Discovery {
            entries: dedup_entries(entries),
            incomplete,
        })
    }
}

fn find_executable(game_dir: &Path) -> Option<PathBuf> {
    let content = game_dir.join("Content");
    let helper = content.join(LAUNCH_HELPER);
    if helper.is_file() {
        return Some(helper);
    }
    first_exe(&content).or_else(|| first_exe(game_dir))
}

fn first_exe(dir: &Path) -> Option<PathBuf> {
    let mut exes: Vec<PathBuf> = fs::read_dir(dir)
        .ok()?
        .flatten()
        .map(|e| e.path())
        .filter(|p| {
            p.is_file()
                && p.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("exe"))
        })
        .collect();
    exes.sort();
    exes.into_iter().next()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"MZ").unwrap();
    }

    #[test]
    fn executable_preference() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        touch(&root.join("Forza/Content/gamelaunchhelper.exe"));
        touch(&root.join("Forza/Content/ForzaHorizon5.exe"));
        touch(&root.join("Halo/Content/b.exe"));
        touch(&root.join("Halo/Content/a.exe"));
        touch(&root.join("Loose/game.exe"));
        fs::create_dir_all(root.join("Empty")).unwrap();

        let found = XboxProvider::new(vec![root.to_path_buf()]).discover().unwrap();
        assert!(found.is_complete());
        let entries = found.entries;
        let ids: Vec<&str> = entries.iter().map(|e| e.stable_id.as_str()).collect();
        assert_eq!(ids, vec!["Forza", "Halo", "Loose"]);
        assert!(entries[0].launch_command.ends_with("gamelaunchhelper.exe"));
        assert!(entries[1].launch_command.ends_with("a.exe"));
        assert!(entries[2].launch_command.ends_with("game.exe"));
        assert_eq!(
            entries[2].working_directory.as_deref(),
            Some(root.join("Loose").to_string_lossy().as_ref())
        );
    }

    #[test]
    fn one_missing_folder_is_tolerated() {
        let tmp = tempfile::tempdir().unwrap();
        touch(&tmp.path().join("Game/game.exe"));
        let provider = XboxProvider::new(vec![
            PathBuf::from("/nonexistent/xbox"),
            tmp.path().to_path_buf(),
        ]);
        let found = provider.discover().unwrap();
        assert_eq!(found.entries.len(), 1);
        assert_eq!(found.incomplete.len(), 1);
        assert!(found.incomplete[0].contains("/nonexistent/xbox"), "{:?}", found.incomplete);
    }

    #[test]
    fn all_folders_missing_is_error() {
        let provider = XboxProvider::new(vec![PathBuf::from("/nonexistent/xbox")]);
        assert!(provider.discover().unwrap_err().is_unreadable());
    }
}
