//! Data model for extracted listings.

use super::sites::Marketplace;
use serde::Serialize;

/// One extracted listing.
///
/// Every field is a plain string; a field the page did not provide stays empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ListingRecord {
    /// Page the listing was found on (final URL after redirects)
    pub url: String,
    /// Seed URL that produced the page
    pub request_url: String,
    /// Search keyword parsed from the seed URL
    pub keyword: String,
    pub image_url: String,
    pub title: String,
    pub price: String,
    pub shipping_fee: String,
    /// 1-based rank on the page
    pub position: String,
    /// ISBN (AbeBooks) or item number (eBay)
    pub identifier: String,
    pub seller_name: String,
    pub condition: String,
    pub isbn_13: String,
    pub isbn_10: String,
    /// EAN from the eBay detail page
    pub ean: String,
    /// Detail page link, not emitted
    #[serde(skip)]
    pub detail_link: String,
}

impl ListingRecord {
    /// Starts a record for the listing at `rank` (1-based) on `page_url`.
    pub fn ranked(page_url: &str, rank: usize) -> Self {
        Self { url: page_url.to_string(), position: rank.to_string(), ..Self::default() }
    }

    /// Merges the identifier extracted from a detail page.
    pub fn merge_identifier(&mut self, marketplace: Marketplace, value: String) {
        match marketplace {
            Marketplace::Ebay => self.ean = value,
            Marketplace::Abebooks => self.identifier = value,
            Marketplace::Wob => self.isbn_13 = value,
        }
    }

    /// Renders the record in the column order of `marketplace`.
    pub fn row(&self, marketplace: Marketplace) -> Vec<&str> {
        match marketplace {
            Marketplace::Abebooks => vec![
                &self.url,
                &self.image_url,
                &self.title,
                &self.price,
                &self.shipping_fee,
                &self.position,
                &self.identifier,
                &self.seller_name,
            ],
            Marketplace::Ebay => vec![
                &self.url,
                &self.keyword,
                &self.image_url,
                &self.title,
                &self.price,
                &self.shipping_fee,
                &self.position,
                &self.identifier,
                &self.seller_name,
                &self.ean,
            ],
            Marketplace::Wob => vec![
                &self.request_url,
                &self.url,
                &self.image_url,
                &self.title,
                &self.price,
                &self.position,
                &self.condition,
                &self.isbn_13,
                &self.isbn_10,
            ],
        }
        .into_iter()
        .map(String::as_str)
        .collect()
    }
}
