//! The provider seam and its error type.

use std::collections::HashSet;
use std::path::PathBuf;

use tracing::warn;

use crate::entry::{GameEntry, Origin};

/// Why a provider produced nothing.
#[derive(Debug, thiserror::Error)]
pub enum ProviderCause {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed {path}: {reason}")]
    Malformed { path: PathBuf, reason: String },
}

/// A discovery source failed as a whole.
#[derive(Debug, thiserror::Error)]
#[error("{origin} provider failed: {cause}")]
pub struct ProviderError {
    pub origin: Origin,
    #[source]
    pub cause: ProviderCause,
}

impl ProviderError {
    pub fn io(origin: Origin, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self {
            origin,
            cause: ProviderCause::Io {
                path: path.into(),
                source,
            },
        }
    }

    pub fn malformed(origin: Origin, path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self {
            origin,
            cause: ProviderCause::Malformed {
                path: path.into(),
                reason: reason.into(),
            },
        }
    }

    /// True when the input could not be read at all (as opposed to parsed).
    pub fn is_unreadable(&self) -> bool {
        matches!(self.cause, ProviderCause::Io { .. })
    }
}

/// What a provider found.
///
/// `incomplete` names the parts of the origin that could not be read. When
/// it is non-empty, `entries` may be missing games that are still
/// installed, so callers must not treat absence as uninstallation.
#[derive(Debug, Default)]
pub struct Discovery {
    pub entries: Vec<GameEntry>,
    pub incomplete: Vec<String>,
}

impl Discovery {
    pub fn complete(entries: Vec<GameEntry>) -> Self {
        Self {
            entries,
            incomplete: Vec::new(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.incomplete.is_empty()
    }
}

/// One origin of installed games.
///
/// Implementations only read the filesystem and hold no shared mutable
/// state, so several providers may run in parallel.
pub trait SourceProvider: Send + Sync {
    fn origin(&self) -> Origin;

    /// Lists the games currently installed for this origin.
    fn discover(&self) -> Result<Discovery, ProviderError>;
}

/// Drops entries whose `stable_id` was already seen, keeping the first.
pub fn dedup_entries(entries: Vec<GameEntry>) -> Vec<GameEntry> {
    let mut seen = HashSet::new();
    entries
        .into_iter()
        .filter(|entry| {
            let fresh = seen.insert(entry.stable_id.clone());
            if !fresh {
                warn!(
                    origin = %entry.origin,
                    id = %entry.stable_id,
                    name = %entry.display_name,
                    "duplicate game id, keeping the first"
                );
            }
            fresh
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::ImageHint;

    fn entry(id: &str, name: &str) -> GameEntry {
        GameEntry {
            origin: Origin::Custom,
            stable_id: id.into(),
            display_name: name.into(),
            launch_command: "run".into(),
            working_directory: None,
            image_hint: ImageHint::Name(name.into()),
            shortcut: None,
        }
    }

    #[test]
    fn dedup_keeps_first() {
        let entries = vec![entry("a", "First"), entry("b", "B"), entry("a", "Second")];
        let out = dedup_entries(entries);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].display_name, "First");
    }

    #[test]
    fn unreadable_vs_malformed() {
        let io = ProviderError::io(
            Origin::Steam,
            "/x",
            std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        );
        assert!(io.is_unreadable());
        let bad = ProviderError::malformed(Origin::Epic, "/y", "not json");
        assert!(!bad.is_unreadable());
        assert_eq!(bad.to_string(), "epic provider failed: malformed /y: not json");
    }
}
