//! shelf-crawler - Top-listing scrapers for book and collectible marketplaces
//!
//! Reads seed URLs from a CSV file, fetches each page with browser-like
//! headers (optionally through forward proxies), extracts the first few
//! listings and writes them to a timestamped CSV feed.

pub mod commands;
pub mod config;
pub mod crawler;
pub mod fetch;
pub mod marketplace;
pub mod output;
pub mod seeds;

pub use config::Config;
pub use fetch::{FailureKind, FetchFailure, FetchedPage};
pub use marketplace::{ListingRecord, Marketplace};
