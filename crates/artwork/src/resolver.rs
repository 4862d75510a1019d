//! Tiered artwork lookup: cache, then the Steam CDN, then SteamGridDB.

use std::path::{Path, PathBuf};
use std::time::Duration;

use gamesphere_sources::{GameEntry, ImageHint};
use gamesphere_steamgriddb::{
    Client, Error as GridError, GridFilters, ImageData, download, select_game, select_grid,
};
use tracing::{debug, info, warn};

use crate::ArtworkError;
use crate::cache::ThumbnailCache;
use crate::normalize::to_png;
use crate::retry::RetryPolicy;
use crate::single_flight::KeyLocks;

/// Public Steam CDN app asset root.
pub const DEFAULT_CDN_BASE_URL: &str = "https://cdn.cloudflare.steamstatic.com/steam/apps";

/// CDN assets tried in order: portrait library art, then the store header.
const CDN_ASSETS: &[&str] = &["library_600x900.jpg", "header.jpg"];

/// Outcome of resolving one game's thumbnail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageResult {
    /// Already on disk; no network call was made.
    Cached(PathBuf),
    /// Downloaded during this call and now cached.
    Fetched(PathBuf),
    /// No source has art for this game.
    NotFound,
    /// A source failed after retries.
    Failed(String),
}

impl ImageResult {
    pub fn path(&self) -> Option<&Path> {
        match self {
            ImageResult::Cached(p) | ImageResult::Fetched(p) => Some(p),
            ImageResult::NotFound | ImageResult::Failed(_) => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolverOptions {
    /// SteamGridDB key. Without one only Steam games get art.
    pub api_key: Option<String>,
    /// Per-request timeout.
    pub timeout: Duration,
    pub retry: RetryPolicy,
    pub cdn_base_url: String,
    /// Overrides the SteamGridDB API root.
    pub api_base_url: Option<String>,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            api_key: None,
            timeout: Duration::from_secs(15),
            retry: RetryPolicy::default(),
            cdn_base_url: DEFAULT_CDN_BASE_URL.to_string(),
            api_base_url: None,
        }
    }
}

/// Resolves and caches thumbnails. Safe to share across tasks; concurrent
/// calls for the same game wait for each other instead of fetching twice.
pub struct ImageResolver {
    cache: ThumbnailCache,
    http: reqwest::Client,
    griddb: Option<Client>,
    filters: GridFilters,
    cdn_base_url: String,
    retry: RetryPolicy,
    locks: KeyLocks,
}

impl ImageResolver {
    pub fn new(thumbnails_dir: impl Into<PathBuf>, options: ResolverOptions) -> Result<Self, ArtworkError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("gamesphere/", env!("CARGO_PKG_VERSION")))
            .timeout(options.timeout)
            .build()
            .map_err(GridError::Http)?;

        let griddb = match options.api_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => {
                let client = Client::new(key, options.timeout)?;
                Some(match options.api_base_url {
                    Some(url) => client.with_base_url(url),
                    None => client,
                })
            }
            _ => None,
        };

        Ok(Self {
            cache: ThumbnailCache::new(thumbnails_dir),
            http,
            griddb,
            filters: GridFilters::default(),
            cdn_base_url: options.cdn_base_url.trim_end_matches('/').to_string(),
            retry: options.retry,
            locks: KeyLocks::new(),
        })
    }

    pub fn cache(&self) -> &ThumbnailCache {
        &self.cache
    }

    fn can_fetch(&self, hint: &ImageHint) -> bool {
        match hint {
            ImageHint::SteamAppId(_) => true,
            ImageHint::Name(_) => self.griddb.is_some(),
            ImageHint::File(_) => false,
        }
    }

    /// Whether [`resolve`](Self::resolve) would go to the network.
    pub fn needs_fetch(&self, entry: &GameEntry) -> bool {
        self.can_fetch(&entry.image_hint) && self.cache.lookup(&entry.key()).is_none()
    }

    pub async fn resolve(&self, entry: &GameEntry) -> ImageResult {
        let key = entry.key();

        if let ImageHint::File(path) = &entry.image_hint {
            if path.is_file() {
                return ImageResult::Cached(path.clone());
            }
            warn!(key = %key, path = %path.display(), "configured image file is missing");
            return ImageResult::NotFound;
        }

        if let Some(path) = self.cache.lookup(&key) {
            return ImageResult::Cached(path);
        }
        if !self.can_fetch(&entry.image_hint) {
            debug!(key = %key, "no artwork source for this game");
            return ImageResult::NotFound;
        }

        let _guard = self.locks.acquire(&key.to_string()).await;
        // Another caller may have filled the slot while we waited.
        if let Some(path) = self.cache.lookup(&key) {
            return ImageResult::Cached(path);
        }

        match self.fetch_png(entry).await {
            Ok(Some(png)) => match self.cache.store(&key, &png) {
                Ok(path) => {
                    info!(key = %key, name = %entry.display_name, "fetched thumbnail");
                    ImageResult::Fetched(path)
                }
                Err(e) => ImageResult::Failed(e.to_string()),
            },
            Ok(None) => {
                info!(key = %key, name = %entry.display_name, "no thumbnail found");
                ImageResult::NotFound
            }
            Err(e) => {
                warn!(key = %key, name = %entry.display_name, error = %e, "thumbnail fetch failed");
                ImageResult::Failed(e.to_string())
            }
        }
    }

    /// Walks the tiers. `Ok(None)` means every tier answered "no art";
    /// otherwise the last real failure is returned.
    async fn fetch_png(&self, entry: &GameEntry) -> Result<Option<Vec<u8>>, ArtworkError> {
        let mut last_error = None;

        if let ImageHint::SteamAppId(app_id) = entry.image_hint {
            for asset in CDN_ASSETS {
                let url = format!("{}/{app_id}/{asset}", self.cdn_base_url);
                match self.download_png(&url).await {
                    Ok(png) => return Ok(Some(png)),
                    Err(e) if e.is_not_found() => debug!(app_id, asset, "not on CDN"),
                    Err(e) => {
                        debug!(app_id, asset, error = %e, "CDN attempt failed");
                        last_error = Some(e);
                    }
                }
            }
        }

        if let Some(griddb) = &self.griddb {
            match self.fetch_from_griddb(griddb, entry).await {
                Ok(Some(png)) => return Ok(Some(png)),
                Ok(None) => {}
                Err(e) if e.is_not_found() => {}
                Err(e) => last_error = Some(e),
            }
        }

        match last_error {
            Some(e) => Err(e),
            None => Ok(None),
        }
    }

    async fn fetch_from_griddb(
        &self,
        griddb: &Client,
        entry: &GameEntry,
    ) -> Result<Option<Vec<u8>>, ArtworkError> {
        let mut candidates = Vec::new();
        if let ImageHint::SteamAppId(app_id) = entry.image_hint {
            match self
                .retry
                .run("grids by steam id", GridError::is_transient, || {
                    griddb.grids_for_steam_app(app_id, &self.filters)
                })
                .await
            {
                Ok(grids) => candidates = grids,
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e.into()),
            }
        }
        if candidates.is_empty() {
            candidates = self.grids_by_name(griddb, &entry.display_name).await?;
        }

        let Some(best) = select_grid(&candidates) else {
            return Ok(None);
        };
        debug!(grid = best.id, score = best.score, url = %best.url, "selected grid");
        self.download_png(&best.url).await.map(Some)
    }

    async fn grids_by_name(&self, griddb: &Client, name: &str) -> Result<Vec<ImageData>, ArtworkError> {
        let results = self
            .retry
            .run("game search", GridError::is_transient, || griddb.search(name))
            .await?;
        let Some(game) = select_game(&results, name) else {
            return Ok(Vec::new());
        };
        debug!(name, game_id = game.id, matched = %game.name, "matched community game");
        let grids = self
            .retry
            .run("grids by game", GridError::is_transient, || {
                griddb.grids_for_game(game.id, &self.filters)
            })
            .await?;
        Ok(grids)
    }

    async fn download_png(&self, url: &str) -> Result<Vec<u8>, ArtworkError> {
        let payload = self
            .retry
            .run(url, GridError::is_transient, || download(&self.http, url))
            .await?;
        to_png(&payload.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::encode_sample;
    use gamesphere_sources::Origin;
    use image::ImageFormat;
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    struct Reply {
        status: u16,
        content_type: &'static str,
        body: Vec<u8>,
        delay_ms: u64,
    }

    impl Reply {
        fn ok(content_type: &'static str, body: Vec<u8>) -> Self {
            Self {
                status: 200,
                content_type,
                body,
                delay_ms: 0,
            }
        }

        fn status(status: u16) -> Self {
            Self {
                status,
                content_type: "text/plain",
                body: b"nope".to_vec(),
                delay_ms: 0,
            }
        }
    }

    /// Mock HTTP server recording every request path. The handler gets the
    /// server's base URL, the path, and how many times that path was hit
    /// before.
    struct MockServer {
        url: String,
        hits: Arc<Mutex<Vec<String>>>,
    }

    impl MockServer {
        async fn start<F>(handler: F) -> Self
        where
            F: Fn(&str, &str, usize) -> Reply + Send + Sync + 'static,
        {
            let handler = Arc::new(handler);
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let url = format!("http://127.0.0.1:{}", listener.local_addr().unwrap().port());
            let hits = Arc::new(Mutex::new(Vec::new()));

            let (base, log) = (url.clone(), hits.clone());
            tokio::spawn(async move {
                while let Ok((mut stream, _)) = listener.accept().await {
                    let (base, log, handler) = (base.clone(), log.clone(), handler.clone());
                    tokio::spawn(async move {
                        let mut buf = Vec::new();
                        let mut chunk = [0u8; 4096];
                        while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                            match stream.read(&mut chunk).await {
                                Ok(0) | Err(_) => break,
                                Ok(n) => buf.extend_from_slice(&chunk[..n]),
                            }
                        }
                        let request = String::from_utf8_lossy(&buf);
                        let path = request
                            .lines()
                            .next()
                            .and_then(|l| l.split_whitespace().nth(1))
                            .unwrap_or("/")
                            .to_string();
                        let seen = {
                            let mut log = log.lock().unwrap();
                            let seen = log.iter().filter(|p| **p == path).count();
                            log.push(path.clone());
                            seen
                        };
                        let reply = handler(&base, &path, seen);
                        if reply.delay_ms > 0 {
                            tokio::time::sleep(Duration::from_millis(reply.delay_ms)).await;
                        }
                        let head = format!(
                            "HTTP/1.1 {} Mock\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                            reply.status,
                            reply.content_type,
                            reply.body.len()
                        );
                        let _ = stream.write_all(head.as_bytes()).await;
                        let _ = stream.write_all(&reply.body).await;
                        let _ = stream.shutdown().await;
                    });
                }
            });

            Self { url, hits }
        }

        fn hits(&self) -> Vec<String> {
            self.hits.lock().unwrap().clone()
        }
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay_ms: 1,
            backoff_factor: 2.0,
            max_delay_ms: 4,
        }
    }

    fn resolver(dir: &Path, server: &MockServer, api_key: Option<&str>) -> ImageResolver {
        ImageResolver::new(
            dir,
            ResolverOptions {
                api_key: api_key.map(str::to_string),
                timeout: Duration::from_secs(5),
                retry: fast_retry(),
                cdn_base_url: format!("{}/steam/apps", server.url),
                api_base_url: Some(format!("{}/api", server.url)),
            },
        )
        .unwrap()
    }

    fn steam(app_id: u32) -> GameEntry {
        GameEntry {
            origin: Origin::Steam,
            stable_id: app_id.to_string(),
            display_name: format!("Game {app_id}"),
            launch_command: format!("steam://rungameid/{app_id}"),
            working_directory: None,
            image_hint: ImageHint::SteamAppId(app_id),
            shortcut: None,
        }
    }

    fn epic(id: &str, name: &str) -> GameEntry {
        GameEntry {
            origin: Origin::Epic,
            stable_id: id.into(),
            display_name: name.into(),
            launch_command: "epic".into(),
            working_directory: None,
            image_hint: ImageHint::Name(name.into()),
            shortcut: None,
        }
    }

    fn jpeg() -> Vec<u8> {
        encode_sample(ImageFormat::Jpeg)
    }

    #[tokio::test]
    async fn cdn_fetch_then_cache_hit() {
        let server = MockServer::start(|_, path, _| {
            if path == "/steam/apps/570/library_600x900.jpg" {
                Reply::ok("image/jpeg", jpeg())
            } else {
                Reply::status(404)
            }
        })
        .await;
        let tmp = tempfile::tempdir().unwrap();
        let resolver = resolver(tmp.path(), &server, None);
        let entry = steam(570);

        assert!(resolver.needs_fetch(&entry));
        let first = resolver.resolve(&entry).await;
        let ImageResult::Fetched(path) = &first else {
            panic!("expected a fetch, got {first:?}");
        };
        assert_eq!(path, &tmp.path().join("steam_570.png"));
        let bytes = std::fs::read(path).unwrap();
        assert_eq!(image::guess_format(&bytes).unwrap(), ImageFormat::Png);

        assert!(!resolver.needs_fetch(&entry));
        assert_eq!(resolver.resolve(&entry).await, ImageResult::Cached(path.clone()));
        assert_eq!(server.hits().len(), 1);
    }

    #[tokio::test]
    async fn cdn_falls_back_to_header() {
        let server = MockServer::start(|_, path, _| {
            if path.ends_with("/header.jpg") {
                Reply::ok("image/jpeg", jpeg())
            } else {
                Reply::status(404)
            }
        })
        .await;
        let tmp = tempfile::tempdir().unwrap();
        let result = resolver(tmp.path(), &server, None).resolve(&steam(10)).await;
        assert!(matches!(result, ImageResult::Fetched(_)), "{result:?}");
        assert_eq!(
            server.hits(),
            ["/steam/apps/10/library_600x900.jpg", "/steam/apps/10/header.jpg"]
        );
    }

    #[tokio::test]
    async fn concurrent_resolves_fetch_once() {
        let server = MockServer::start(|_, _, _| Reply {
            delay_ms: 50,
            ..Reply::ok("image/jpeg", jpeg())
        })
        .await;
        let tmp = tempfile::tempdir().unwrap();
        let resolver = Arc::new(resolver(tmp.path(), &server, None));

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..8 {
            let resolver = resolver.clone();
            tasks.spawn(async move { resolver.resolve(&steam(620)).await });
        }
        let mut fetched = 0;
        let mut cached = 0;
        while let Some(result) = tasks.join_next().await {
            match result.unwrap() {
                ImageResult::Fetched(_) => fetched += 1,
                ImageResult::Cached(_) => cached += 1,
                other => panic!("unexpected {other:?}"),
            }
        }
        assert_eq!((fetched, cached), (1, 7));
        assert_eq!(server.hits().len(), 1);
    }

    #[tokio::test]
    async fn transient_errors_are_retried() {
        let server = MockServer::start(|_, _, seen| {
            if seen < 2 {
                Reply::status(503)
            } else {
                Reply::ok("image/jpeg", jpeg())
            }
        })
        .await;
        let tmp = tempfile::tempdir().unwrap();
        let result = resolver(tmp.path(), &server, None).resolve(&steam(70)).await;
        assert!(matches!(result, ImageResult::Fetched(_)), "{result:?}");
        assert_eq!(server.hits().len(), 3);
    }

    #[tokio::test]
    async fn exhausted_retries_fail() {
        let server = MockServer::start(|_, _, _| Reply::status(500)).await;
        let tmp = tempfile::tempdir().unwrap();
        let result = resolver(tmp.path(), &server, None).resolve(&steam(70)).await;
        assert!(matches!(result, ImageResult::Failed(_)), "{result:?}");
        // Three attempts for each of the two CDN assets.
        assert_eq!(server.hits().len(), 6);
        assert!(tmp.path().read_dir().unwrap().next().is_none());
    }

    #[tokio::test]
    async fn undecodable_payload_is_not_retried() {
        let server = MockServer::start(|_, _, _| {
            Reply::ok("text/html", b"<html>moved</html>".to_vec())
        })
        .await;
        let tmp = tempfile::tempdir().unwrap();
        let result = resolver(tmp.path(), &server, None).resolve(&steam(80)).await;
        assert!(matches!(result, ImageResult::Failed(_)), "{result:?}");
        assert_eq!(server.hits().len(), 2);
    }

    #[tokio::test]
    async fn community_search_by_name() {
        let server = MockServer::start(|base, path, _| {
            if path.starts_with("/api/search/autocomplete/Hades") {
                Reply::ok(
                    "application/json",
                    br#"{"success":true,"data":[
                        {"id":7,"name":"Hades II","verified":true},
                        {"id":3,"name":"Hades","verified":true}
                    ]}"#
                    .to_vec(),
                )
            } else if path.starts_with("/api/grids/game/3") {
                let json = format!(
                    r#"{{"success":true,"data":[
                        {{"id":1,"score":1,"width":600,"height":900,"url":"{base}/img/low.png"}},
                        {{"id":2,"score":9,"width":600,"height":900,"url":"{base}/img/best.png"}}
                    ]}}"#
                );
                Reply::ok("application/json", json.into_bytes())
            } else if path == "/img/best.png" {
                Reply::ok("image/png", encode_sample(ImageFormat::Png))
            } else {
                Reply::status(404)
            }
        })
        .await;
        let tmp = tempfile::tempdir().unwrap();
        let resolver = resolver(tmp.path(), &server, Some("key"));

        let result = resolver.resolve(&epic("item1", "Hades")).await;
        assert_eq!(
            result,
            ImageResult::Fetched(tmp.path().join("epic_item1.png"))
        );
        let hits = server.hits();
        assert_eq!(hits.len(), 3, "{hits:?}");
        assert_eq!(hits[2], "/img/best.png");
    }

    #[tokio::test]
    async fn steam_falls_back_to_community_api() {
        let server = MockServer::start(|base, path, _| {
            if path.starts_with("/api/grids/steam/99") {
                let json = format!(
                    r#"{{"success":true,"data":[{{"id":5,"width":600,"height":900,"url":"{base}/img/5.png"}}]}}"#
                );
                Reply::ok("application/json", json.into_bytes())
            } else if path == "/img/5.png" {
                Reply::ok("image/png", encode_sample(ImageFormat::Png))
            } else {
                Reply::status(404)
            }
        })
        .await;
        let tmp = tempfile::tempdir().unwrap();
        let result = resolver(tmp.path(), &server, Some("key")).resolve(&steam(99)).await;
        assert!(matches!(result, ImageResult::Fetched(_)), "{result:?}");
    }

    #[tokio::test]
    async fn nothing_anywhere_is_not_found() {
        let server = MockServer::start(|_, path, _| {
            if path.starts_with("/api/") {
                Reply::ok("application/json", br#"{"success":true,"data":[]}"#.to_vec())
            } else {
                Reply::status(404)
            }
        })
        .await;
        let tmp = tempfile::tempdir().unwrap();
        let resolver = resolver(tmp.path(), &server, Some("key"));
        assert_eq!(resolver.resolve(&steam(1)).await, ImageResult::NotFound);
        assert_eq!(resolver.resolve(&epic("x", "Unknown")).await, ImageResult::NotFound);
    }

    #[tokio::test]
    async fn without_key_non_steam_games_never_hit_the_network() {
        let server = MockServer::start(|_, _, _| Reply::status(500)).await;
        let tmp = tempfile::tempdir().unwrap();
        let resolver = resolver(tmp.path(), &server, None);
        let entry = epic("item1", "Hades");
        assert!(!resolver.needs_fetch(&entry));
        assert_eq!(resolver.resolve(&entry).await, ImageResult::NotFound);
        assert!(server.hits().is_empty());
    }

    #[tokio::test]
    async fn user_supplied_file_is_used_as_is() {
        let server = MockServer::start(|_, _, _| Reply::status(500)).await;
        let tmp = tempfile::tempdir().unwrap();
        let art = tmp.path().join("mine.png");
        std::fs::write(&art, b"png").unwrap();
        let mut entry = epic("custom", "Mine");
        entry.origin = Origin::Custom;
        entry.image_hint = ImageHint::File(art.clone());

        let resolver = resolver(&tmp.path().join("covers"), &server, Some("key"));
        assert!(!resolver.needs_fetch(&entry));
        assert_eq!(resolver.resolve(&entry).await, ImageResult::Cached(art));
        assert!(server.hits().is_empty());
    }

    #[test]
    fn result_paths() {
        let p = PathBuf::from("/x.png");
        assert_eq!(ImageResult::Fetched(p.clone()).path(), Some(p.as_path()));
        assert!(ImageResult::Failed("x".into()).path().is_none());
    }
}
