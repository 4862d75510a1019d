//! Run states and progress events.

use std::fmt;

use gamesphere_artwork::ImageResult;
use gamesphere_sources::{ManagedKey, Origin};

/// Reconciler state machine.
///
/// `Idle → Validating → Discovering → Diffing → Fetching → BackingUp →
/// Applying → Done`, with `Failed` reachable from any state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileState {
    Idle,
    Validating,
    Discovering,
    Diffing,
    Fetching,
    BackingUp,
    Applying,
    Done,
    Failed,
}

impl ReconcileState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ReconcileState::Done | ReconcileState::Failed)
    }
}

impl fmt::Display for ReconcileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ReconcileState::Idle => "idle",
            ReconcileState::Validating => "validating",
            ReconcileState::Discovering => "discovering",
            ReconcileState::Diffing => "diffing",
            ReconcileState::Fetching => "fetching",
            ReconcileState::BackingUp => "backing up",
            ReconcileState::Applying => "applying",
            ReconcileState::Done => "done",
            ReconcileState::Failed => "failed",
        })
    }
}

/// Progress event emitted during a run.
#[derive(Debug, Clone)]
pub enum ReconcileEvent {
    StateChanged(ReconcileState),
    ProviderFinished { origin: Origin, count: usize },
    ProviderFailed { origin: Origin, error: String },
    ImageResolved { key: ManagedKey, result: ImageResult },
}
