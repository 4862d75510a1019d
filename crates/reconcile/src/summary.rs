//! What a run did, and how the process should exit.

use std::fmt;
use std::path::PathBuf;

use gamesphere_host::BackupSnapshot;

use crate::ReconcileError;

/// Counts and names of what changed. In dry-run mode, what would change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub dry_run: bool,
    pub added: Vec<String>,
    pub updated: Vec<String>,
    pub removed: Vec<String>,
    /// Games left alone because a hand-added entry already launches them.
    pub skipped: Vec<String>,
    pub unchanged: usize,
    pub images_fetched: usize,
    /// Thumbnails a dry run would have downloaded.
    pub images_pending: usize,
    pub provider_failures: Vec<String>,
    pub fetch_failures: Vec<String>,
    /// Non-fatal problems while writing side files (shortcuts, cleanup).
    pub warnings: Vec<String>,
    pub backup: Option<BackupSnapshot>,
    pub document: Option<PathBuf>,
    /// The host must be restarted to pick up the new list.
    pub restart_reminder: bool,
}

impl RunSummary {
    pub fn change_count(&self) -> usize {
        self.added.len() + self.updated.len() + self.removed.len()
    }

    pub fn has_changes(&self) -> bool {
        self.change_count() > 0
    }

    /// Some providers or fetches failed but the run still completed.
    pub fn is_partial(&self) -> bool {
        !self.provider_failures.is_empty() || !self.fetch_failures.is_empty()
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = if self.dry_run { "would be " } else { "" };
        writeln!(
            f,
            "{} added, {} updated, {} removed, {} skipped, {} unchanged ({verb}applied)",
            self.added.len(),
            self.updated.len(),
            self.removed.len(),
            self.skipped.len(),
            self.unchanged,
        )?;
        for (label, names) in [
            ("added", &self.added),
            ("updated", &self.updated),
            ("removed", &self.removed),
            ("skipped", &self.skipped),
        ] {
            for name in names {
                writeln!(f, "  {label}: {name}")?;
            }
        }
        if self.dry_run && self.images_pending > 0 {
            writeln!(f, "{} thumbnails would be downloaded", self.images_pending)?;
        } else if self.images_fetched > 0 {
            writeln!(f, "{} thumbnails downloaded", self.images_fetched)?;
        }
        for failure in self.provider_failures.iter().chain(&self.fetch_failures) {
            writeln!(f, "  failed: {failure}")?;
        }
        for warning in &self.warnings {
            writeln!(f, "  warning: {warning}")?;
        }
        if let Some(backup) = &self.backup {
            writeln!(f, "backup: {}", backup.path.display())?;
        }
        if self.restart_reminder {
            writeln!(f, "restart the streaming host to see the changes")?;
        }
        Ok(())
    }
}

/// Process-level result of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Success,
    ValidationFailed,
    /// Completed, but some providers or fetches failed.
    Partial,
    /// Nothing was applied.
    Fatal,
}

impl RunOutcome {
    pub fn from_result(result: &Result<RunSummary, ReconcileError>) -> Self {
        match result {
            Ok(summary) if summary.is_partial() => RunOutcome::Partial,
            Ok(_) => RunOutcome::Success,
            Err(e) if e.is_validation() => RunOutcome::ValidationFailed,
            Err(_) => RunOutcome::Fatal,
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            RunOutcome::Success => 0,
            RunOutcome::Fatal => 1,
            RunOutcome::ValidationFailed => 2,
            RunOutcome::Partial => 3,
        }
    }
}
