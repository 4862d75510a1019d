//! SteamGridDB API client.
//!
//! Async HTTP client using `reqwest` with Bearer token authentication.

use std::time::Duration;

use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use tracing::debug;

use crate::types::{ApiResponse, GridFilters, ImageData, SearchResult};

const DEFAULT_BASE_URL: &str = "https://www.steamgriddb.com/api/v2";

/// Errors from the SteamGridDB client.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid API key")]
    InvalidKey,
}

impl Error {
    /// Timeouts, connection failures, 5xx and 429 are worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Http(e) => e.is_timeout() || e.is_connect() || e.is_request() || e.is_body(),
            Error::Api { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS.as_u16() || *status >= 500
            }
            Error::Json(_) | Error::InvalidKey => false,
        }
    }

    /// True when the API reports the game or asset does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Api { status, .. } if *status == StatusCode::NOT_FOUND.as_u16())
    }
}

/// A downloaded image payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    pub data: Vec<u8>,
    pub content_type: String,
}

/// SteamGridDB API client.
#[derive(Clone)]
pub struct Client {
    http: reqwest::Client,
    base_url: String,
}

impl Client {
    /// Creates a new client with the given API key and per-request timeout.
    pub fn new(api_key: &str, timeout: Duration) -> Result<Self, Error> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {api_key}")).map_err(|_| Error::InvalidKey)?,
        );

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(concat!("gamesphere/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http,
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Points the client at another API root (mirrors, test servers).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Performs an authenticated GET request.
    async fn get(&self, endpoint: &str, params: &[(String, String)]) -> Result<Vec<u8>, Error> {
        let url = format!("{}{}", self.base_url, endpoint);
        let resp = self.http.get(&url).query(params).send().await?;
        let status = resp.status();
        debug!(endpoint, status = status.as_u16(), "steamgriddb request");

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Api {
                status: status.as_u16(),
                body,
            });
        }

        Ok(resp.bytes().await?.to_vec())
    }

    /// Searches for games by name.
    pub async fn search(&self, term: &str) -> Result<Vec<SearchResult>, Error> {
        let encoded = utf8_percent_encode(term, NON_ALPHANUMERIC).to_string();
        let body = self
            .get(&format!("/search/autocomplete/{encoded}"), &[])
            .await?;
        let resp: ApiResponse<Vec<SearchResult>> = serde_json::from_slice(&body)?;
        Ok(resp.data)
    }

    /// Returns grid images for a SteamGridDB game ID.
    pub async fn grids_for_game(
        &self,
        game_id: i32,
        filters: &GridFilters,
    ) -> Result<Vec<ImageData>, Error> {
        let params = build_params(filters);
        let body = self.get(&format!("/grids/game/{game_id}"), &params).await?;
        let resp: ApiResponse<Vec<ImageData>> = serde_json::from_slice(&body)?;
        Ok(resp.data)
    }

    /// Returns grid images for a Steam app ID.
    pub async fn grids_for_steam_app(
        &self,
        app_id: u32,
        filters: &GridFilters,
    ) -> Result<Vec<ImageData>, Error> {
        let params = build_params(filters);
        let body = self.get(&format!("/grids/steam/{app_id}"), &params).await?;
        let resp: ApiResponse<Vec<ImageData>> = serde_json::from_slice(&body)?;
        Ok(resp.data)
    }

    /// Downloads image data from a URL.
    pub async fn download_image(&self, url: &str) -> Result<Download, Error> {
        download(&self.http, url).await
    }
}

/// Downloads a URL with any `reqwest` client, returning body and content type.
pub async fn download(http: &reqwest::Client, url: &str) -> Result<Download, Error> {
    let resp = http.get(url).send().await?;
    let status = resp.status();
    if !status.is_success() {
        return Err(Error::Api {
            status: status.as_u16(),
            body: "download failed".into(),
        });
    }
    let content_type = resp
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    Ok(Download {
        data: resp.bytes().await?.to_vec(),
        content_type,
    })
}

/// Builds query parameters from filters.
fn build_params(filters: &GridFilters) -> Vec<(String, String)> {
    let mut params = Vec::new();
    if !filters.dimensions.is_empty() {
        params.push(("dimensions".into(), filters.dimensions.clone()));
    }
    if !filters.mimes.is_empty() {
        params.push(("mimes".into(), filters.mimes.clone()));
    }
    if filters.static_only {
        params.push(("types".into(), "static".into()));
    }
    params.push(("nsfw".into(), "false".into()));
    params.push(("humor".into(), "false".into()));
    params
}
