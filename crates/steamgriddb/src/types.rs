//! API response types for SteamGridDB.

use serde::{Deserialize, Serialize};

/// A game search result from the SteamGridDB API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: i32,
    pub name: String,
    #[serde(default)]
    pub types: Vec<String>,
    #[serde(default)]
    pub verified: bool,
}

/// Grid image metadata from the SteamGridDB API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageData {
    pub id: i32,
    #[serde(default)]
    pub score: i32,
    #[serde(default)]
    pub style: String,
    #[serde(default)]
    pub width: i32,
    #[serde(default)]
    pub height: i32,
    #[serde(default)]
    pub nsfw: bool,
    #[serde(default)]
    pub humor: bool,
    #[serde(default)]
    pub epilepsy: bool,
    #[serde(default)]
    pub mime: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub upvotes: i32,
    #[serde(default)]
    pub downvotes: i32,
}

impl ImageData {
    /// True for images that should never become a thumbnail.
    pub fn is_flagged(&self) -> bool {
        self.nsfw || self.humor || self.epilepsy
    }
}

/// Filters for grid queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridFilters {
    /// `WxH` dimension list, e.g. `600x900`. Empty for any.
    pub dimensions: String,
    /// Comma-separated MIME list. Empty for any.
    pub mimes: String,
    /// Restrict to static images.
    pub static_only: bool,
}

impl Default for GridFilters {
    /// Portrait box art, static, in formats the thumbnail pipeline decodes.
    fn default() -> Self {
        Self {
            dimensions: "600x900".into(),
            mimes: "image/png,image/jpeg,image/webp".into(),
            static_only: true,
        }
    }
}

/// API response wrapper (internal).
#[derive(Debug, Deserialize)]
pub(crate) struct ApiResponse<T> {
    #[allow(dead_code)]
    pub success: bool,
    #[serde(default)]
    #[allow(dead_code)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub data: T,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_result_defaults() {
        let json = r#"{"id":1,"name":"Minimal"}"#;
        let result: SearchResult = serde_json::from_str(json).unwrap();
        assert!(!result.verified);
        assert!(result.types.is_empty());
    }

    #[test]
    fn image_data_ignores_unknown_fields() {
        let json = r#"{
            "id": 100,
            "score": 5,
            "style": "alternate",
            "width": 600,
            "height": 900,
            "mime": "image/png",
            "language": "en",
            "url": "https://cdn2.steamgriddb.com/grid/abc.png",
            "thumb": "https://cdn2.steamgriddb.com/thumb/abc.png",
            "lock": false,
            "upvotes": 10,
            "downvotes": 2,
            "author": {"name": "someone", "steam64": "1"}
        }"#;
        let img: ImageData = serde_json::from_str(json).unwrap();
        assert_eq!(img.id, 100);
        assert_eq!(img.height, 900);
        assert_eq!(img.upvotes, 10);
        assert!(!img.is_flagged());
    }

    #[test]
    fn flagged_images() {
        let img = ImageData {
            humor: true,
            ..Default::default()
        };
        assert!(img.is_flagged());
    }

    #[test]
    fn api_response_with_errors() {
        let json = r#"{"success":false,"errors":["Game not found"]}"#;
        let resp: ApiResponse<Vec<ImageData>> = serde_json::from_str(json).unwrap();
        assert!(!resp.success);
        assert!(resp.data.is_empty());
        assert_eq!(resp.errors, vec!["Game not found"]);
    }
}
