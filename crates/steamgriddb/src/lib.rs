//! SteamGridDB API client for thumbnail lookup.
//!
//! Provides an async client for the [SteamGridDB](https://www.steamgriddb.com)
//! API v2 and the deterministic rules used to pick one grid per game.

pub mod client;
pub mod select;
pub mod types;

pub use client::{Client, Download, Error, download};
pub use select::{select_game, select_grid};
pub use types::{GridFilters, ImageData, SearchResult};
