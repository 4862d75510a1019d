//! Reconciliation engine.
//!
//! Runs the source providers, diffs their games against the host's
//! application list, resolves thumbnails and writes the result behind a
//! verified backup.

pub mod config;
pub mod diff;
pub mod error;
pub mod events;
pub mod reconciler;
pub mod summary;

// Re-export primary types.
pub use config::{ReconcileConfig, SteamLaunch};
pub use diff::{Diff, compute_diff};
pub use error::ReconcileError;
pub use events::{ReconcileEvent, ReconcileState};
pub use reconciler::Reconciler;
pub use summary::{RunOutcome, RunSummary};
