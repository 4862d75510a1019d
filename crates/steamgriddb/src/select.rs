//! Deterministic choice among search results and grid candidates.
//!
//! The API's response order is not stable across requests, so the choice
//! never depends on it except as the last tie-break.

use std::cmp::Reverse;

use crate::types::{ImageData, SearchResult};

/// Preferred grid size for host thumbnails.
const PREFERRED_SIZE: (i32, i32) = (600, 900);

/// Picks the game matching `name`.
///
/// Exact case-insensitive name match first, then a verified result, then
/// the first result returned.
pub fn select_game<'a>(results: &'a [SearchResult], name: &str) -> Option<&'a SearchResult> {
    let wanted = name.trim();
    results
        .iter()
        .find(|r| r.name.trim().eq_ignore_ascii_case(wanted))
        .or_else(|| results.iter().find(|r| r.verified))
        .or_else(|| results.first())
}

/// Picks the best grid image.
///
/// Flagged (NSFW, humor, epilepsy) and URL-less images are dropped. Among
/// the rest, ordering is: preferred 600x900 size, then highest `score`, then
/// most `upvotes`, then earliest position in the response.
pub fn select_grid(candidates: &[ImageData]) -> Option<&ImageData> {
    candidates
        .iter()
        .enumerate()
        .filter(|(_, img)| !img.is_flagged() && !img.url.is_empty())
        .min_by_key(|(index, img)| {
            (
                (img.width, img.height) != PREFERRED_SIZE,
                Reverse(img.score),
                Reverse(img.upvotes),
                *index,
            )
        })
        .map(|(_, img)| img)
}
