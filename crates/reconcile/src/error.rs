//! Reconciliation error types.

use gamesphere_host::{BackupError, HostError};
use gamesphere_sources::ProviderError;

/// Errors that abort a run. Per-provider and per-image failures are not
/// errors; they are reported in the run summary instead.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    /// Missing or invalid required configuration, found before any provider runs.
    #[error("configuration error: {0}")]
    Config(String),

    /// A provider failure serious enough to stop the run.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// The host document could not be read or understood.
    #[error(transparent)]
    Parse(HostError),

    #[error("backup failed, nothing was changed: {0}")]
    Backup(#[from] BackupError),

    /// Saving the document failed. The original file and backup are intact.
    #[error(transparent)]
    Write(HostError),

    #[error("cancelled before any change was written")]
    Cancelled,
}

impl ReconcileError {
    pub fn is_validation(&self) -> bool {
        matches!(self, ReconcileError::Config(_))
    }
}
