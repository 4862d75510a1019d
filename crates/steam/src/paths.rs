use std::path::{Path, PathBuf};

use crate::SteamError;

/// Provides access to Steam directory paths.
pub struct Paths {
    base_dir: PathBuf,
}

impl Paths {
    /// Creates a new `Paths` instance with auto-detected Steam directory.
    pub fn new() -> Result<Self, SteamError> {
        let base_dir = get_base_dir()?;
        Ok(Self { base_dir })
    }

    /// Creates a new `Paths` instance with a custom base directory.
    pub fn with_base(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Returns the Steam base directory.
    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// Returns the `libraryfolders.vdf` index of this installation.
    pub fn library_index_path(&self) -> PathBuf {
        steamapps_dir(&self.base_dir).join("libraryfolders.vdf")
    }
}

/// Returns `<library>/steamapps`.
pub fn steamapps_dir(library_root: &Path) -> PathBuf {
    library_root.join("steamapps")
}

/// Returns the install directory of an app given its manifest `installdir`.
pub fn install_dir(library_root: &Path, installdir: &str) -> PathBuf {
    steamapps_dir(library_root).join("common").join(installdir)
}

#[cfg(windows)]
fn get_base_dir() -> Result<PathBuf, SteamError> {
    crate::paths_windows::get_base_dir()
}

#[cfg(not(windows))]
fn get_base_dir() -> Result<PathBuf, SteamError> {
    crate::paths_unix::get_base_dir()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_with_base() {
        let paths = Paths::with_base("/tmp/steam");
        assert_eq!(paths.base_dir(), &PathBuf::from("/tmp/steam"));
        assert_eq!(
            paths.library_index_path(),
            PathBuf::from("/tmp/steam/steamapps/libraryfolders.vdf")
        );
    }

    #[test]
    fn install_dir_structure() {
        assert_eq!(
            install_dir(Path::new("/lib"), "dota 2 beta"),
            PathBuf::from("/lib/steamapps/common/dota 2 beta")
        );
    }
}
