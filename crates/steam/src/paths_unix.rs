use std::path::PathBuf;

use crate::SteamError;

/// Returns the Steam base directory on Linux and other Unix systems.
pub(crate) fn get_base_dir() -> Result<PathBuf, SteamError> {
    let home = std::env::var_os("HOME")
        .map(PathBuf::from)
        .ok_or(SteamError::NotFound)?;

    let candidates = [
        home.join(".steam").join("steam"),
        home.join(".local").join("share").join("Steam"),
        home.join(".var")
            .join("app")
            .join("com.valvesoftware.Steam")
            .join(".local")
            .join("share")
            .join("Steam"),
        home.join("Library")
            .join("Application Support")
            .join("Steam"),
    ];

    candidates
        .into_iter()
        .find(|dir| dir.join("steamapps").exists())
        .ok_or(SteamError::NotFound)
}
