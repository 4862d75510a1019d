//! Timestamped snapshots of the host document, taken before a write.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tracing::{info, warn};

use crate::paths::app_data_dir;

/// Errors taking a snapshot. Any of these aborts the run before a write.
#[derive(Debug, thiserror::Error)]
pub enum BackupError {
    #[error("cannot read {path} for backup: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("no writable backup location (tried {primary} and {fallback}): {source}")]
    Unwritable {
        primary: PathBuf,
        fallback: String,
        #[source]
        source: io::Error,
    },
}

/// A verified byte-for-byte copy of the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupSnapshot {
    pub path: PathBuf,
    /// True when the document's own directory was not writable.
    pub used_fallback: bool,
}

/// Snapshots documents beside themselves, or into a per-user fallback
/// directory when that is not possible.
#[derive(Debug, Clone, Default)]
pub struct BackupManager {
    fallback_dir: Option<PathBuf>,
}

impl BackupManager {
    /// `fallback_dir` overrides the default `<config dir>/gamesphere/backups`.
    pub fn new(fallback_dir: Option<PathBuf>) -> Self {
        Self { fallback_dir }
    }

    pub fn fallback_dir(&self) -> Option<PathBuf> {
        self.fallback_dir
            .clone()
            .or_else(|| app_data_dir().map(|d| d.join("backups")))
    }

    /// Copies the current bytes of `document`.
    ///
    /// Returns `Ok(None)` when the document does not exist yet, since there
    /// is nothing to lose.
    pub fn snapshot(&self, document: &Path) -> Result<Option<BackupSnapshot>, BackupError> {
        let primary = match document.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        snapshot_in(document, &primary, self.fallback_dir().as_deref(), Local::now())
    }
}

fn snapshot_in(
    document: &Path,
    primary: &Path,
    fallback: Option<&Path>,
    now: DateTime<Local>,
) -> Result<Option<BackupSnapshot>, BackupError> {
    let bytes = match fs::read(document) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            info!(path = %document.display(), "no existing document, nothing to back up");
            return Ok(None);
        }
        Err(source) => {
            return Err(BackupError::Read {
                path: document.to_path_buf(),
                source,
            });
        }
    };

    let file_name = document
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "apps.json".into());
    let stem = format!("{file_name}.{}", now.format("%Y%m%d-%H%M%S"));

    let primary_err = match write_verified(primary, &stem, &bytes) {
        Ok(path) => {
            info!(backup = %path.display(), "backed up host document");
            return Ok(Some(BackupSnapshot {
                path,
                used_fallback: false,
            }));
        }
        Err(e) => e,
    };
    warn!(dir = %primary.display(), error = %primary_err, "cannot back up beside document, using fallback");

    let Some(fallback) = fallback else {
        return Err(BackupError::Unwritable {
            primary: primary.to_path_buf(),
            fallback: "<no fallback directory>".into(),
            source: primary_err,
        });
    };

    match fs::create_dir_all(fallback).and_then(|()| write_verified(fallback, &stem, &bytes)) {
        Ok(path) => {
            info!(backup = %path.display(), "backed up host document to fallback location");
            Ok(Some(BackupSnapshot {
                path,
                used_fallback: true,
            }))
        }
        Err(source) => Err(BackupError::Unwritable {
            primary: primary.to_path_buf(),
            fallback: fallback.display().to_string(),
            source,
        }),
    }
}

/// Writes `bytes` to a new `<stem>[.N].bak` in `dir` and reads it back.
fn write_verified(dir: &Path, stem: &str, bytes: &[u8]) -> io::Result<PathBuf> {
    let mut counter = 0u32;
    let (path, mut file) = loop {
        let name = if counter == 0 {
            format!("{stem}.bak")
        } else {
            format!("{stem}.{counter}.bak")
        };
        let path = dir.join(name);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => break (path, file),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists && counter < 100 => counter += 1,
            Err(e) => return Err(e),
        }
    };

    let written = file.write_all(bytes).and_then(|()| file.sync_all());
    drop(file);
    if let Err(e) = written {
        let _ = fs::remove_file(&path);
        return Err(e);
    }

    if fs::read(&path)? != bytes {
        let _ = fs::remove_file(&path);
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("backup {} does not match the original", path.display()),
        ));
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_time() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap()
    }

    #[test]
    fn snapshot_beside_document() {
        let tmp = tempfile::tempdir().unwrap();
        let doc = tmp.path().join("apps.json");
        fs::write(&doc, b"{\"apps\": []}").unwrap();

        let snap = snapshot_in(&doc, tmp.path(), None, fixed_time())
            .unwrap()
            .unwrap();
        assert!(!snap.used_fallback);
        assert_eq!(snap.path, tmp.path().join("apps.json.20240309-140507.bak"));
        assert_eq!(fs::read(&snap.path).unwrap(), fs::read(&doc).unwrap());
    }

    #[test]
    fn same_second_snapshots_do_not_overwrite() {
        let tmp = tempfile::tempdir().unwrap();
        let doc = tmp.path().join("apps.json");
        fs::write(&doc, b"one").unwrap();
        let first = snapshot_in(&doc, tmp.path(), None, fixed_time()).unwrap().unwrap();
        fs::write(&doc, b"two").unwrap();
        let second = snapshot_in(&doc, tmp.path(), None, fixed_time()).unwrap().unwrap();

        assert_ne!(first.path, second.path);
        assert_eq!(fs::read(&first.path).unwrap(), b"one");
        assert_eq!(fs::read(&second.path).unwrap(), b"two");
    }

    #[test]
    fn falls_back_when_primary_unwritable() {
        let tmp = tempfile::tempdir().unwrap();
        let doc = tmp.path().join("apps.json");
        fs::write(&doc, b"{}").unwrap();
        // A regular file can never hold a backup, even for root.
        let blocked = tmp.path().join("blocked");
        fs::write(&blocked, b"").unwrap();
        let fallback = tmp.path().join("fallback").join("backups");

        let snap = snapshot_in(&doc, &blocked, Some(&fallback), fixed_time())
            .unwrap()
            .unwrap();
        assert!(snap.used_fallback);
        assert!(snap.path.starts_with(&fallback));
        assert_eq!(fs::read(&snap.path).unwrap(), b"{}");
    }

    #[test]
    fn both_locations_unwritable() {
        let tmp = tempfile::tempdir().unwrap();
        let doc = tmp.path().join("apps.json");
        fs::write(&doc, b"{}").unwrap();
        let blocked = tmp.path().join("blocked");
        fs::write(&blocked, b"").unwrap();

        let err = snapshot_in(&doc, &blocked, Some(&blocked.join("sub")), fixed_time()).unwrap_err();
        assert!(matches!(err, BackupError::Unwritable { .. }), "{err}");
    }

    #[test]
    fn missing_document_needs_no_backup() {
        let tmp = tempfile::tempdir().unwrap();
        let manager = BackupManager::new(Some(tmp.path().join("fb")));
        assert!(manager.snapshot(&tmp.path().join("apps.json")).unwrap().is_none());
    }
}
