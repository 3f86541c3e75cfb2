//! HTML extraction for marketplace listing and detail pages.

use crate::fetch::FetchedPage;
use crate::marketplace::models::ListingRecord;
use crate::marketplace::selectors::{abebooks, ebay, ebay_detail, wob};
use crate::marketplace::sites::Marketplace;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info};

/// Listings taken per page, in document order.
pub const MAX_LISTINGS_PER_PAGE: usize = 3;

/// Parser for one marketplace's pages.
pub struct Parser {
    marketplace: Marketplace,
}

impl Parser {
    /// Creates a new parser for the given marketplace.
    pub fn new(marketplace: Marketplace) -> Self {
        Self { marketplace }
    }

    /// Extracts up to [`MAX_LISTINGS_PER_PAGE`] records from a fetched page.
    ///
    /// Non-markup pages yield nothing. Fields missing from the markup are left
    /// empty.
    pub fn extract(&self, page: &FetchedPage) -> Vec<ListingRecord> {
        info!("Processing URL: {}", page.final_url);

        if !page.is_markup() {
            info!(
                "Non-HTML response received from {} ({})",
                page.final_url,
                page.content_type.as_deref().unwrap_or("no content type")
            );
            return Vec::new();
        }

        let document = Html::parse_document(&page.body);
        let records = match self.marketplace {
            Marketplace::Abebooks => self.extract_abebooks(&document, page),
            Marketplace::Ebay => self.extract_ebay(&document, page),
            Marketplace::Wob => self.extract_wob(&document, page),
        };

        debug!("Extracted {} records from {}", records.len(), page.final_url);
        records
    }

    /// Extracts the supplemental identifier from a detail page.
    ///
    /// Returns an empty string when neither the primary nor the fallback
    /// query matches.
    pub fn extract_detail(&self, page: &FetchedPage) -> String {
        if !page.is_markup() {
            info!("Non-HTML detail response received from {}", page.final_url);
            return String::new();
        }

        let document = Html::parse_document(&page.body);
        match self.marketplace {
            Marketplace::Ebay => {
                let ean = ebay_ean_from_labels(&document);
                if ean.is_empty() {
                    ebay_ean_from_spec_names(&document)
                } else {
                    ean
                }
            }
            Marketplace::Abebooks | Marketplace::Wob => String::new(),
        }
    }

    fn extract_abebooks(&self, document: &Html, page: &FetchedPage) -> Vec<ListingRecord> {
        let listings: Vec<_> = document.select(&abebooks::LISTING).collect();
        info!("Found {} listings on {}", listings.len(), page.final_url);

        listings
            .into_iter()
            .take(MAX_LISTINGS_PER_PAGE)
            .enumerate()
            .map(|(i, listing)| {
                let record = ListingRecord {
                    title: own_text(listing, &abebooks::TITLE),
                    price: attr(listing, &abebooks::PRICE, "content"),
                    identifier: attr(listing, &abebooks::ISBN, "content"),
                    seller_name: own_text(listing, &abebooks::SELLER),
                    shipping_fee: own_text(listing, &abebooks::SHIPPING),
                    image_url: attr(listing, &abebooks::IMAGE, "src"),
                    request_url: page.context.seed_url.clone(),
                    ..ListingRecord::ranked(&page.final_url, i + 1)
                };

                info!(
                    "Listing found: {} - {} - {} - {} - {} - {}",
                    record.title,
                    record.price,
                    record.identifier,
                    record.seller_name,
                    record.shipping_fee,
                    record.image_url
                );
                record
            })
            .collect()
    }

    fn extract_ebay(&self, document: &Html, page: &FetchedPage) -> Vec<ListingRecord> {
        document
            .select(&ebay::LISTING)
            .take(MAX_LISTINGS_PER_PAGE)
            .enumerate()
            .map(|(i, listing)| {
                let link = attr(listing, &ebay::LINK, "href");

                let mut shipping_fee = own_text(listing, &ebay::SHIPPING);
                if shipping_fee.is_empty() {
                    shipping_fee = first_text(listing, &ebay::SHIPPING_FALLBACK);
                }

                let seller = first_text(listing, &ebay::SELLER);
                let seller_name = seller.split('(').next().unwrap_or_default().trim().to_string();

                ListingRecord {
                    keyword: format!("'{}", page.context.keyword),
                    image_url: attr(listing, &ebay::IMAGE, "src")
                        .replace(ebay::THUMBNAIL, ebay::FULL_IMAGE),
                    title: own_text(listing, &ebay::TITLE),
                    price: own_text(listing, &ebay::PRICE),
                    shipping_fee,
                    identifier: item_number(&link),
                    seller_name,
                    request_url: page.context.seed_url.clone(),
                    detail_link: link,
                    ..ListingRecord::ranked(&page.final_url, i + 1)
                }
            })
            .collect()
    }

    fn extract_wob(&self, document: &Html, page: &FetchedPage) -> Vec<ListingRecord> {
        let title = document
            .select(&wob::TITLE)
            .next()
            .map(|h| {
                h.text().map(str::trim).filter(|t| !t.is_empty()).collect::<Vec<_>>().join(" ")
            })
            .unwrap_or_default();
        let image_url = document
            .select(&wob::IMAGE)
            .next()
            .and_then(|e| e.value().attr("src"))
            .unwrap_or_default()
            .to_string();
        let isbn_13 = wob_attribute(document, wob::ISBN_13_LABEL);
        let isbn_10 = wob_attribute(document, wob::ISBN_10_LABEL);

        document
            .select(&wob::VARIANT)
            .take(MAX_LISTINGS_PER_PAGE)
            .enumerate()
            .map(|(i, variant)| ListingRecord {
                request_url: page.context.seed_url.clone(),
                image_url: image_url.clone(),
                title: title.clone(),
                price: own_text(variant, &wob::VARIANT_PRICE),
                condition: own_text(variant, &wob::VARIANT_NAME),
                isbn_13: isbn_13.clone(),
                isbn_10: isbn_10.clone(),
                ..ListingRecord::ranked(&page.final_url, i + 1)
            })
            .collect()
    }
}

/// Direct text children of `element`, joined and trimmed.
fn element_own_text(element: ElementRef) -> String {
    element
        .children()
        .filter_map(|node| node.value().as_text().map(|t| t.to_string()))
        .collect::<String>()
        .trim()
        .to_string()
}

/// Own text of the first match of `selector` under `scope`.
fn own_text(scope: ElementRef, selector: &Selector) -> String {
    scope.select(selector).next().map(element_own_text).unwrap_or_default()
}

/// First non-blank descendant text node of the first match, trimmed.
fn first_text(scope: ElementRef, selector: &Selector) -> String {
    scope
        .select(selector)
        .next()
        .and_then(|e| e.text().map(str::trim).find(|t| !t.is_empty()))
        .unwrap_or_default()
        .to_string()
}

fn attr(scope: ElementRef, selector: &Selector, name: &str) -> String {
    scope
        .select(selector)
        .next()
        .and_then(|e| e.value().attr(name))
        .unwrap_or_default()
        .trim()
        .to_string()
}

/// Element siblings after `element` that are `<div>`s.
fn following_divs(element: ElementRef<'_>) -> impl Iterator<Item = ElementRef<'_>> {
    element.next_siblings().filter_map(ElementRef::wrap).filter(|e| e.value().name() == "div")
}

/// Item number from an eBay `/itm/<number>?...` link.
pub fn item_number(link: &str) -> String {
    link.split_once("/itm/")
        .map(|(_, rest)| rest.split('?').next().unwrap_or_default().to_string())
        .unwrap_or_default()
}

/// Item-specifics row labelled `EAN:` → value spans in the sibling block.
fn ebay_ean_from_labels(document: &Html) -> String {
    document
        .select(&ebay_detail::LABELS)
        .filter(|labels| {
            labels
                .select(&ebay_detail::TEXT_SPANS)
                .any(|s| s.text().collect::<String>().trim() == ebay_detail::EAN_LABEL)
        })
        .flat_map(following_divs)
        .find_map(|values| {
            let text = first_text(values, &ebay_detail::TEXT_SPANS);
            (!text.is_empty()).then_some(text)
        })
        .unwrap_or_default()
}

/// Legacy layout: `div.s-name` containing `EAN` → sibling value text.
fn ebay_ean_from_spec_names(document: &Html) -> String {
    document
        .select(&ebay_detail::SPEC_NAME)
        .filter(|name| element_own_text(*name).contains(ebay_detail::EAN_NAME))
        .flat_map(following_divs)
        .find_map(|value| {
            let text = value.text().map(str::trim).find(|t| !t.is_empty())?;
            Some(text.to_string())
        })
        .unwrap_or_default()
}

/// Value of the World of Books attribute whose label contains `label`.
fn wob_attribute(document: &Html, label: &str) -> String {
    document
        .select(&wob::ATTRIBUTE_LABEL)
        .filter(|l| element_own_text(*l).contains(label))
        .flat_map(following_divs)
        .map(element_own_text)
        .next()
        .unwrap_or_default()
}
