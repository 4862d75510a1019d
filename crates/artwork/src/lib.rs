//! Thumbnail resolution for discovered games.

pub mod cache;
pub mod normalize;
pub mod resolver;
pub mod retry;
pub mod single_flight;

// Re-export primary types.
pub use cache::ThumbnailCache;
pub use resolver::{DEFAULT_CDN_BASE_URL, ImageResolver, ImageResult, ResolverOptions};
pub use retry::RetryPolicy;
pub use single_flight::{KeyGuard, KeyLocks};

/// Errors from one artwork lookup.
#[derive(Debug, thiserror::Error)]
pub enum ArtworkError {
    #[error(transparent)]
    Http(#[from] gamesphere_steamgriddb::Error),

    #[error("undecodable image: {0}")]
    Decode(String),

    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ArtworkError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ArtworkError::Http(e) if e.is_not_found())
    }
}
