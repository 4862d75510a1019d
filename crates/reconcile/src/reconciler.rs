//! The reconciliation state machine.
//!
//! Discovers installed games, diffs them against the host document,
//! resolves thumbnails and applies the result behind a verified backup.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use futures_util::stream;
use gamesphere_artwork::{ImageResolver, ImageResult, ResolverOptions, ThumbnailCache};
use gamesphere_host::record::{CMD, IMAGE_PATH, NAME, WORKING_DIR};
use gamesphere_host::{BackupManager, HostAppRecord, HostDocument, MANAGED_FIELD, UpsertOutcome};
use gamesphere_sources::shortcut::{attach_shortcut, delete_all_shortcuts, delete_shortcut, write_shortcut};
use gamesphere_sources::{
    CustomProvider, Discovery, EpicProvider, GameEntry, ManagedKey, Origin, ProviderError,
    SourceProvider, SteamProvider, XboxProvider,
};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::ReconcileConfig;
use crate::diff::{Diff, compute_diff};
use crate::events::{ReconcileEvent, ReconcileState};
use crate::summary::RunSummary;
use crate::ReconcileError;

/// Paths checked during `Validating`.
#[derive(Debug, Clone)]
struct RunPaths {
    document: PathBuf,
    thumbnails: PathBuf,
}

/// Result of `Discovering`.
struct Discovered {
    entries: Vec<GameEntry>,
    /// Origins whose provider read everything and whose missing games may go.
    removable: HashSet<Origin>,
}

/// Drives one reconciliation (or a full reset) against one host document.
pub struct Reconciler {
    config: ReconcileConfig,
    providers: Option<Vec<Arc<dyn SourceProvider>>>,
    state: ReconcileState,
    events_tx: mpsc::Sender<ReconcileEvent>,
    events_rx: Option<mpsc::Receiver<ReconcileEvent>>,
    cancel: CancellationToken,
}

impl Reconciler {
    pub fn new(config: ReconcileConfig) -> Self {
        let (events_tx, events_rx) = mpsc::channel(256);
        Self {
            config,
            providers: None,
            state: ReconcileState::Idle,
            events_tx,
            events_rx: Some(events_rx),
            cancel: CancellationToken::new(),
        }
    }

    /// Replaces the providers built from the configuration.
    pub fn with_providers(mut self, providers: Vec<Arc<dyn SourceProvider>>) -> Self {
        self.providers = Some(providers);
        self
    }

    /// Takes the event receiver. Can only be called once.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<ReconcileEvent>> {
        self.events_rx.take()
    }

    /// Cancelling stops the run at the next state boundary. Once the
    /// document save has started, the run completes.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn state(&self) -> ReconcileState {
        self.state
    }

    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    fn emit(&self, event: ReconcileEvent) {
        // Never block on a slow or absent listener.
        let _ = self.events_tx.try_send(event);
    }

    fn transition(&mut self, state: ReconcileState) {
        self.state = state;
        info!(state = %state, dry_run = self.config.dry_run, "reconcile state");
        self.emit(ReconcileEvent::StateChanged(state));
    }

    fn checkpoint(&self) -> Result<(), ReconcileError> {
        if self.cancel.is_cancelled() {
            return Err(ReconcileError::Cancelled);
        }
        Ok(())
    }

    fn finish(
        &mut self,
        result: Result<RunSummary, ReconcileError>,
    ) -> Result<RunSummary, ReconcileError> {
        match &result {
            Ok(summary) => {
                info!(
                    added = summary.added.len(),
                    updated = summary.updated.len(),
                    removed = summary.removed.len(),
                    skipped = summary.skipped.len(),
                    unchanged = summary.unchanged,
                    dry_run = summary.dry_run,
                    "reconcile finished"
                );
                self.transition(ReconcileState::Done);
            }
            Err(e) => {
                error!(state = %self.state, error = %e, "reconcile failed");
                self.transition(ReconcileState::Failed);
            }
        }
        result
    }

    /// Runs a full reconciliation.
    pub async fn run(&mut self) -> Result<RunSummary, ReconcileError> {
        let result = self.reconcile().await;
        self.finish(result)
    }

    async fn reconcile(&mut self) -> Result<RunSummary, ReconcileError> {
        let dry_run = self.config.dry_run;
        let mut summary = RunSummary {
            dry_run,
            ..Default::default()
        };

        self.transition(ReconcileState::Validating);
        let paths = self.validate(true)?;
        summary.document = Some(paths.document.clone());
        self.checkpoint()?;

        self.transition(ReconcileState::Discovering);
        let discovery = self.discover(&mut summary).await?;
        self.checkpoint()?;

        self.transition(ReconcileState::Diffing);
        let mut document = HostDocument::load(&paths.document).map_err(ReconcileError::Parse)?;
        let resolver = Arc::new(self.image_resolver(&paths.thumbnails)?);
        let diff = compute_diff(&discovery.entries, &document, &discovery.removable, |p| {
            !p.is_empty() && resolve_image(&paths.document, p).is_file()
        });
        debug!(
            add = diff.to_add.len(),
            update = diff.to_update.len(),
            repair = diff.to_repair.len(),
            remove = diff.to_remove.len(),
            skip = diff.skipped.len(),
            "diff computed"
        );
        summary.skipped = diff.skipped.iter().map(|e| e.display_name.clone()).collect();
        for entry in &diff.skipped {
            info!(key = %entry.key(), name = %entry.display_name, "already launched by a hand-added entry, skipping");
        }
        self.checkpoint()?;

        self.transition(ReconcileState::Fetching);
        let images = self.fetch_images(&resolver, &diff, &mut summary).await?;
        self.checkpoint()?;

        let removed = self.merge(&mut document, &diff, &images, &mut summary);

        if dry_run {
            info!("dry run, leaving the host document untouched");
            return Ok(summary);
        }

        // Shortcut files are side files; keep them current even when the
        // document itself has nothing to change.
        self.write_shortcuts(&discovery.entries, &mut summary);

        if !summary.has_changes() {
            info!("host document already up to date");
            return Ok(summary);
        }

        self.transition(ReconcileState::BackingUp);
        summary.backup = self.backup_manager().snapshot(&paths.document)?;
        self.checkpoint()?;

        self.transition(ReconcileState::Applying);
        document.save(&paths.document).map_err(ReconcileError::Write)?;
        summary.restart_reminder = !self.config.no_restart;
        self.cleanup_removed(&removed, &paths.document, resolver.cache(), &mut summary);

        Ok(summary)
    }

    /// Removes every game entry, keeping only the host's stock entries.
    ///
    /// Hand-added entries are removed too. Skips discovery and artwork.
    pub async fn remove_all_games(&mut self) -> Result<RunSummary, ReconcileError> {
        let result = self.reset().await;
        self.finish(result)
    }

    async fn reset(&mut self) -> Result<RunSummary, ReconcileError> {
        let dry_run = self.config.dry_run;
        let mut summary = RunSummary {
            dry_run,
            ..Default::default()
        };

        self.transition(ReconcileState::Validating);
        let paths = self.validate(false)?;
        summary.document = Some(paths.document.clone());
        self.checkpoint()?;

        let mut document = HostDocument::load(&paths.document).map_err(ReconcileError::Parse)?;
        let removed = document.reset_to_stock();
        summary.removed = removed.iter().map(|r| r.name().to_string()).collect();
        summary.unchanged = document.len();

        if dry_run {
            info!(removed = removed.len(), "dry run, leaving the host document untouched");
            return Ok(summary);
        }

        if !removed.is_empty() {
            self.transition(ReconcileState::BackingUp);
            summary.backup = self.backup_manager().snapshot(&paths.document)?;
            self.checkpoint()?;

            self.transition(ReconcileState::Applying);
            document.save(&paths.document).map_err(ReconcileError::Write)?;
            summary.restart_reminder = !self.config.no_restart;
        }

        let cache = ThumbnailCache::new(&paths.thumbnails);
        self.cleanup_removed(&removed, &paths.document, &cache, &mut summary);
        if let Some(folder) = &self.config.shortcuts_folder {
            match delete_all_shortcuts(folder) {
                Ok(n) => debug!(deleted = n, "launch shortcuts cleared"),
                Err(e) => summary
                    .warnings
                    .push(format!("cannot clear shortcuts in {}: {e}", folder.display())),
            }
        }
        Ok(summary)
    }

    // -----------------------------------------------------------------------
    // Validating
    // -----------------------------------------------------------------------

    fn validate(&self, need_sources: bool) -> Result<RunPaths, ReconcileError> {
        let config = &self.config;

        let document = config.apps_document_path().ok_or_else(|| {
            ReconcileError::Config("host apps document path is not set".into())
        })?;
        if document.is_dir() {
            return Err(ReconcileError::Config(format!(
                "host apps document {} is a directory",
                document.display()
            )));
        }
        if let Some(parent) = document.parent().filter(|p| !p.as_os_str().is_empty())
            && !parent.is_dir()
        {
            return Err(ReconcileError::Config(format!(
                "host config directory {} does not exist",
                parent.display()
            )));
        }

        let thumbnails = config.thumbnails_path().ok_or_else(|| {
            ReconcileError::Config("thumbnails directory is not set".into())
        })?;
        if thumbnails.exists() && !thumbnails.is_dir() {
            return Err(ReconcileError::Config(format!(
                "thumbnails path {} is not a directory",
                thumbnails.display()
            )));
        }

        if need_sources {
            if let Some(index) = &config.steam_library_index_path
                && !index.is_file()
            {
                return Err(ReconcileError::Config(format!(
                    "Steam library index {} not found",
                    index.display()
                )));
            }
            if self.providers.is_none() && !config.has_sources() {
                return Err(ReconcileError::Config("no game sources configured".into()));
            }
            if config.fetch_concurrency == 0 {
                return Err(ReconcileError::Config("fetch_concurrency must be at least 1".into()));
            }
        }

        Ok(RunPaths {
            document,
            thumbnails,
        })
    }

    // -----------------------------------------------------------------------
    // Discovering
    // -----------------------------------------------------------------------

    fn build_providers(&self) -> Vec<Arc<dyn SourceProvider>> {
        if let Some(providers) = &self.providers {
            return providers.clone();
        }
        let config = &self.config;
        let mut providers: Vec<Arc<dyn SourceProvider>> = Vec::new();
        if let Some(index) = &config.steam_library_index_path {
            let style = config.steam_launch.resolve(index);
            providers.push(Arc::new(SteamProvider::new(index, style)));
        }
        if let Some(dir) = &config.epic_manifests_path {
            providers.push(Arc::new(EpicProvider::new(dir)));
        }
        if !config.xbox_game_folders.is_empty() {
            providers.push(Arc::new(XboxProvider::new(config.xbox_game_folders.clone())));
        }
        if let Some(path) = &config.custom_games_json_path {
            providers.push(Arc::new(CustomProvider::new(path)));
        }
        providers
    }

    /// Runs every provider on the blocking pool and waits for all of them.
    async fn discover(&self, summary: &mut RunSummary) -> Result<Discovered, ReconcileError> {
        let mut tasks: JoinSet<(Origin, Result<Discovery, ProviderError>)> = JoinSet::new();
        for provider in self.build_providers() {
            tasks.spawn_blocking(move || (provider.origin(), provider.discover()));
        }

        let mut entries = Vec::new();
        let mut removable = HashSet::new();
        let mut fatal = None;

        loop {
            let joined = tokio::select! {
                _ = self.cancel.cancelled() => return Err(ReconcileError::Cancelled),
                joined = tasks.join_next() => joined,
            };
            let Some(joined) = joined else { break };

            match joined {
                Ok((origin, Ok(found))) => {
                    info!(origin = %origin, count = found.entries.len(), "provider finished");
                    self.emit(ReconcileEvent::ProviderFinished {
                        origin,
                        count: found.entries.len(),
                    });
                    if !found.is_complete() {
                        // Games behind an unreadable library may still be installed.
                        warn!(
                            origin = %origin,
                            unreadable = found.incomplete.len(),
                            "provider incomplete, keeping its missing games"
                        );
                        for reason in &found.incomplete {
                            summary
                                .provider_failures
                                .push(format!("{origin} provider incomplete: {reason}"));
                        }
                    } else if origin.removes_when_absent() {
                        removable.insert(origin);
                    }
                    entries.extend(found.entries);
                }
                Ok((origin, Err(e))) if origin == Origin::Steam && e.is_unreadable() => {
                    error!(error = %e, "Steam library index unreadable");
                    fatal = Some(e);
                }
                Ok((origin, Err(e))) => {
                    warn!(origin = %origin, error = %e, "provider failed, treating its games as absent");
                    self.emit(ReconcileEvent::ProviderFailed {
                        origin,
                        error: e.to_string(),
                    });
                    summary.provider_failures.push(e.to_string());
                }
                Err(e) => {
                    warn!(error = %e, "provider task failed");
                    summary.provider_failures.push(format!("provider task failed: {e}"));
                }
            }
        }
        if let Some(e) = fatal {
            return Err(ReconcileError::Provider(e));
        }

        entries.sort_by_key(GameEntry::key);
        entries.dedup_by_key(|e| e.key());
        if let Some(folder) = &self.config.shortcuts_folder {
            for entry in &mut entries {
                attach_shortcut(entry, folder);
            }
        }
        Ok(Discovered { entries, removable })
    }

    // -----------------------------------------------------------------------
    // Fetching
    // -----------------------------------------------------------------------

    fn image_resolver(&self, thumbnails: &Path) -> Result<ImageResolver, ReconcileError> {
        let config = &self.config;
        let options = ResolverOptions {
            api_key: config.community_art_api_key.clone(),
            timeout: Duration::from_secs(config.request_timeout_secs.max(1)),
            retry: config.retry.clone(),
            cdn_base_url: config.steam_cdn_url.clone(),
            api_base_url: config.community_api_url.clone(),
        };
        ImageResolver::new(thumbnails, options)
            .map_err(|e| ReconcileError::Config(format!("artwork client: {e}")))
    }

    /// Resolves thumbnails for added, updated and repaired entries with
    /// bounded concurrency. Dry runs only count what would be downloaded.
    async fn fetch_images(
        &self,
        resolver: &Arc<ImageResolver>,
        diff: &Diff,
        summary: &mut RunSummary,
    ) -> Result<HashMap<ManagedKey, ImageResult>, ReconcileError> {
        let mut images = HashMap::new();
        let mut pending = Vec::new();

        for entry in diff.image_candidates() {
            if resolver.needs_fetch(entry) {
                pending.push(entry.clone());
            } else {
                // Cache hits and supplied files never touch the network.
                images.insert(entry.key(), resolver.resolve(entry).await);
            }
        }

        if self.config.dry_run {
            summary.images_pending = pending.len();
            return Ok(images);
        }
        if pending.is_empty() {
            return Ok(images);
        }
        info!(count = pending.len(), concurrency = self.config.fetch_concurrency, "fetching thumbnails");

        let fetches = stream::iter(pending)
            .map(|entry| {
                let resolver = Arc::clone(resolver);
                async move {
                    let result = resolver.resolve(&entry).await;
                    (entry, result)
                }
            })
            .buffer_unordered(self.config.fetch_concurrency)
            .collect::<Vec<_>>();

        let results = tokio::select! {
            _ = self.cancel.cancelled() => return Err(ReconcileError::Cancelled),
            results = fetches => results,
        };

        for (entry, result) in results {
            match &result {
                ImageResult::Fetched(_) => summary.images_fetched += 1,
                ImageResult::Failed(reason) => summary
                    .fetch_failures
                    .push(format!("{}: {reason}", entry.display_name)),
                ImageResult::Cached(_) | ImageResult::NotFound => {}
            }
            self.emit(ReconcileEvent::ImageResolved {
                key: entry.key(),
                result: result.clone(),
            });
            images.insert(entry.key(), result);
        }
        Ok(images)
    }

    // -----------------------------------------------------------------------
    // Applying
    // -----------------------------------------------------------------------

    /// Applies the diff to the in-memory document and fills the summary
    /// counts. Returns the removed records for later cleanup.
    fn merge(
        &self,
        document: &mut HostDocument,
        diff: &Diff,
        images: &HashMap<ManagedKey, ImageResult>,
        summary: &mut RunSummary,
    ) -> Vec<HostAppRecord> {
        let image_for = |entry: &GameEntry| {
            images
                .get(&entry.key())
                .and_then(ImageResult::path)
                .map(|p| p.to_string_lossy().into_owned())
        };
        summary.unchanged = diff.unchanged;

        for entry in &diff.to_add {
            let mut record = HostAppRecord::managed(&entry.key(), &entry.display_name, &entry.launch_command);
            if let Some(dir) = &entry.working_directory {
                record.set(WORKING_DIR, dir.as_str());
            }
            if let Some(path) = image_for(entry) {
                record.set(IMAGE_PATH, path);
            }
            if self.config.host.requires_uuid() {
                record.ensure_uuid();
            }
            if document.upsert(record) == UpsertOutcome::Added {
                info!(key = %entry.key(), name = %entry.display_name, "adding");
                summary.added.push(entry.display_name.clone());
            }
        }

        for entry in diff.to_update.iter().chain(&diff.to_repair) {
            let Some(existing) = document.find_managed(&entry.key()) else {
                continue;
            };
            let mut record = existing.clone();
            record.set(NAME, entry.display_name.as_str());
            record.set(CMD, entry.launch_command.as_str());
            record.set(MANAGED_FIELD, entry.key().to_string());
            match &entry.working_directory {
                Some(dir) => record.set(WORKING_DIR, dir.as_str()),
                None => {
                    record.remove(WORKING_DIR);
                }
            }
            // A failed lookup keeps whatever image the record had.
            if let Some(path) = image_for(entry) {
                record.set(IMAGE_PATH, path);
            }
            if self.config.host.requires_uuid() {
                record.ensure_uuid();
            }
            match document.upsert(record) {
                UpsertOutcome::Updated => {
                    info!(key = %entry.key(), name = %entry.display_name, "updating");
                    summary.updated.push(entry.display_name.clone());
                }
                UpsertOutcome::Unchanged | UpsertOutcome::Added => summary.unchanged += 1,
            }
        }

        let remove: HashSet<&ManagedKey> = diff.to_remove.iter().collect();
        let removed = document.remove_managed(|key, _| remove.contains(key));
        for record in &removed {
            info!(name = %record.name(), "removing");
            summary.removed.push(record.name().to_string());
        }
        removed
    }

    fn write_shortcuts(&self, entries: &[GameEntry], summary: &mut RunSummary) {
        for entry in entries {
            let Some(shortcut) = &entry.shortcut else {
                continue;
            };
            if let Err(e) = write_shortcut(shortcut, entry.working_directory.as_deref()) {
                warn!(path = %shortcut.path.display(), error = %e, "cannot write launch shortcut");
                summary
                    .warnings
                    .push(format!("{}: cannot write {}: {e}", entry.display_name, shortcut.path.display()));
            }
        }
    }

    /// Deletes thumbnails and generated shortcuts of removed records. Only
    /// files inside the thumbnails and shortcuts folders are touched.
    fn cleanup_removed(
        &self,
        removed: &[HostAppRecord],
        document: &Path,
        cache: &ThumbnailCache,
        summary: &mut RunSummary,
    ) {
        for record in removed {
            let image = record.image_path();
            if !image.is_empty()
                && let Err(e) = cache.remove_owned(&resolve_image(document, image))
            {
                summary.warnings.push(format!("cannot delete {image}: {e}"));
            }
            if let Some(folder) = &self.config.shortcuts_folder {
                let script = record.cmd().trim().trim_matches('"');
                if !script.is_empty()
                    && let Err(e) = delete_shortcut(Path::new(script), folder)
                {
                    summary.warnings.push(format!("cannot delete {script}: {e}"));
                }
            }
        }
    }

    fn backup_manager(&self) -> BackupManager {
        BackupManager::new(self.config.backup_fallback_dir.clone())
    }
}

/// The host resolves a relative `image-path` against its own config folder.
fn resolve_image(document: &Path, image: &str) -> PathBuf {
    let image = Path::new(image);
    match document.parent() {
        Some(dir) if image.is_relative() => dir.join(image),
        _ => image.to_path_buf(),
    }
}
