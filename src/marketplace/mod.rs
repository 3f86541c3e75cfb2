//! Marketplace definitions, selectors, extraction and data models.

pub mod models;
pub mod parser;
pub mod selectors;
pub mod sites;

pub use models::ListingRecord;
pub use parser::{Parser, MAX_LISTINGS_PER_PAGE};
pub use sites::{HeaderPolicy, Marketplace, ProxyMode};
