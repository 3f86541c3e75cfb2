//! CSS selectors for marketplace HTML parsing.
//!
//! All structural queries live here. Update this file when a marketplace
//! changes its markup, and add a fixture to the parser tests.
//!
//! Exact-match attribute selectors (`[class="..."]`) are deliberate where the
//! site reuses a class name on unrelated elements.

use scraper::Selector;
use std::sync::LazyLock;

fn compile(css: &str) -> Selector {
    Selector::parse(css).unwrap_or_else(|e| panic!("invalid selector {css:?}: {e}"))
}

/// AbeBooks search results.
pub mod abebooks {
    use super::*;

    pub static LISTING: LazyLock<Selector> =
        LazyLock::new(|| compile("li[data-cy='listing-item']"));

    pub static TITLE: LazyLock<Selector> =
        LazyLock::new(|| compile("span[data-cy='listing-title']"));

    /// `content` attribute carries the price.
    pub static PRICE: LazyLock<Selector> = LazyLock::new(|| compile("meta[itemprop='price']"));

    /// `content` attribute carries the ISBN.
    pub static ISBN: LazyLock<Selector> = LazyLock::new(|| compile("meta[itemprop='isbn']"));

    pub static SELLER: LazyLock<Selector> =
        LazyLock::new(|| compile("a[data-cy='listing-seller-link']"));

    pub static SHIPPING: LazyLock<Selector> =
        LazyLock::new(|| compile("span[id*='item-shipping-price-']"));

    pub static IMAGE: LazyLock<Selector> =
        LazyLock::new(|| compile("div[data-cy='listing-image'] > img"));
}

/// eBay search results.
pub mod ebay {
    use super::*;

    pub static LISTING: LazyLock<Selector> =
        LazyLock::new(|| compile("ul div[class='s-item__wrapper clearfix']"));

    pub static LINK: LazyLock<Selector> = LazyLock::new(|| compile("a[href]"));

    pub static TITLE: LazyLock<Selector> = LazyLock::new(|| compile("span[role='heading']"));

    pub static PRICE: LazyLock<Selector> =
        LazyLock::new(|| compile("span[class='s-item__price']"));

    pub static IMAGE: LazyLock<Selector> =
        LazyLock::new(|| compile("div[class*='s-item__image'] img"));

    pub static SHIPPING: LazyLock<Selector> =
        LazyLock::new(|| compile("span[class='s-item__shipping s-item__logisticsCost']"));

    /// Free-delivery badge shown instead of a shipping cost.
    pub static SHIPPING_FALLBACK: LazyLock<Selector> =
        LazyLock::new(|| compile("span[class='s-item__dynamic s-item__freeXDays']"));

    pub static SELLER: LazyLock<Selector> = LazyLock::new(|| compile(".s-item__seller-info-text"));

    /// Thumbnail suffix and its larger replacement.
    pub const THUMBNAIL: &str = "s-l225.webp";
    pub const FULL_IMAGE: &str = "s-l500.jpg";
}

/// eBay item detail page.
pub mod ebay_detail {
    use super::*;

    /// Label column of an item-specifics row.
    pub static LABELS: LazyLock<Selector> =
        LazyLock::new(|| compile("div[class='ux-labels-values__labels']"));

    pub static TEXT_SPANS: LazyLock<Selector> =
        LazyLock::new(|| compile("span[class='ux-textspans']"));

    /// Older item-specifics layout.
    pub static SPEC_NAME: LazyLock<Selector> = LazyLock::new(|| compile("div[class='s-name']"));

    pub const EAN_LABEL: &str = "EAN:";
    pub const EAN_NAME: &str = "EAN";
}

/// World of Books product page.
pub mod wob {
    use super::*;

    pub static TITLE: LazyLock<Selector> =
        LazyLock::new(|| compile("h1[class='title d-none d-md-block']"));

    pub static IMAGE: LazyLock<Selector> =
        LazyLock::new(|| compile("div[class='imageHolder'] img"));

    pub static ATTRIBUTE_LABEL: LazyLock<Selector> =
        LazyLock::new(|| compile("label[class='attributeTitle']"));

    pub static VARIANT: LazyLock<Selector> =
        LazyLock::new(|| compile("div[class='variants order-md-2'] > a"));

    pub static VARIANT_NAME: LazyLock<Selector> =
        LazyLock::new(|| compile("span[class='variantName']"));

    pub static VARIANT_PRICE: LazyLock<Selector> =
        LazyLock::new(|| compile("span[class='variantPrice']"));

    pub const ISBN_13_LABEL: &str = "ISBN 13";
    pub const ISBN_10_LABEL: &str = "ISBN 10";
}
