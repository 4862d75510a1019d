pub mod launch;
pub mod library;
pub mod paths;
#[cfg(not(windows))]
mod paths_unix;
#[cfg(windows)]
mod paths_windows;
pub mod vdf;

use std::path::PathBuf;

// Re-export primary types.
pub use launch::{LaunchStyle, launch_command, parse_rungameid, rungameid_uri};
pub use library::{
    InstalledApp, LibraryFolder, LibraryScan, SkippedSource, installed_apps, load_library_folders,
};
pub use paths::Paths;
pub use vdf::{VdfObject, VdfValue, load_vdf, parse_vdf};

/// Errors for Steam library discovery.
#[derive(Debug, thiserror::Error)]
pub enum SteamError {
    #[error("steam installation not found")]
    NotFound,

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("VDF parse error: {0}")]
    Vdf(String),

    #[error("library index has no 'libraryfolders' section")]
    MissingLibraryFolders,
}

impl SteamError {
    /// True when the error came from malformed content rather than I/O.
    pub fn is_parse_error(&self) -> bool {
        matches!(self, SteamError::Vdf(_) | SteamError::MissingLibraryFolders)
    }
}
