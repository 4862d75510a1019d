//! Host application list (`apps.json`) model for Sunshine and Apollo.

pub mod backup;
pub mod document;
pub mod paths;
pub mod record;

use std::io;
use std::path::PathBuf;

// Re-export primary types.
pub use backup::{BackupError, BackupManager, BackupSnapshot};
pub use document::{HostDocument, UpsertOutcome, atomic_write};
pub use paths::{HostKind, app_data_dir, config_dir};
pub use record::{HostAppRecord, MANAGED_FIELD, STOCK_NAMES};

/// Errors reading or writing the host document.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed host document {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("cannot write {path}: {source}{}", remediation(.source))]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

fn remediation(err: &io::Error) -> &'static str {
    if err.kind() == io::ErrorKind::PermissionDenied {
        " (run with elevated privileges, or make the file writable)"
    } else {
        ""
    }
}
