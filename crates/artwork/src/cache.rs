//! On-disk thumbnail cache.
//!
//! One PNG per game under the thumbnails directory, named from the game's
//! cache key (`steam_570.png`). Entries are never expired; deleting a file
//! forces a re-fetch on the next run.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use gamesphere_sources::ManagedKey;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct ThumbnailCache {
    dir: PathBuf,
}

impl ThumbnailCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Where the image for `key` lives, whether or not it exists yet.
    pub fn path_for(&self, key: &ManagedKey) -> PathBuf {
        self.dir.join(format!("{}.png", key.file_stem()))
    }

    /// Returns the cached image path if a non-empty file is present.
    pub fn lookup(&self, key: &ManagedKey) -> Option<PathBuf> {
        let path = self.path_for(key);
        match fs::metadata(&path) {
            Ok(meta) if meta.is_file() && meta.len() > 0 => Some(path),
            _ => None,
        }
    }

    /// Stores PNG bytes for `key` through a temp file and rename, so a
    /// reader never sees a half-written image.
    pub fn store(&self, key: &ManagedKey, png: &[u8]) -> io::Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);
        let temp = self
            .dir
            .join(format!(".{}.part.{}", key.file_stem(), std::process::id()));
        if let Err(e) = fs::write(&temp, png).and_then(|()| fs::rename(&temp, &path)) {
            let _ = fs::remove_file(&temp);
            return Err(e);
        }
        debug!(key = %key, path = %path.display(), bytes = png.len(), "cached thumbnail");
        Ok(path)
    }

    /// True when `path` points inside the cache directory.
    pub fn owns(&self, path: &Path) -> bool {
        let Ok(dir) = fs::canonicalize(&self.dir) else {
            return false;
        };
        fs::canonicalize(path).is_ok_and(|p| p.starts_with(&dir) && p != dir)
    }

    /// Deletes a thumbnail, but only one inside the cache directory.
    /// Returns whether a file was removed.
    pub fn remove_owned(&self, path: &Path) -> io::Result<bool> {
        if !self.owns(path) || !path.is_file() {
            return Ok(false);
        }
        fs::remove_file(path)?;
        debug!(path = %path.display(), "deleted thumbnail");
        Ok(true)
    }
}
