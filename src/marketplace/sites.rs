//! Supported marketplaces and their per-site scraping policies.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Marketplaces with a scraper implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Marketplace {
    Abebooks,
    Ebay,
    Wob,
}

/// How outbound request headers are produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderPolicy {
    /// Freshly generated Chrome-on-Windows fingerprint per request.
    Generated,
    /// Constant Chrome header set announcing the given authority.
    Fixed { authority: &'static str },
}

/// How a proxy endpoint is drawn from the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyMode {
    /// Uniform random draw per request.
    Rotating,
    /// Always the first pool entry.
    Fixed,
}

impl Marketplace {
    /// Returns all supported marketplaces.
    pub fn all() -> &'static [Marketplace] {
        &[Marketplace::Abebooks, Marketplace::Ebay, Marketplace::Wob]
    }

    /// Returns the marketplace host name.
    pub fn host(&self) -> &'static str {
        match self {
            Marketplace::Abebooks => "www.abebooks.com",
            Marketplace::Ebay => "www.ebay.com",
            Marketplace::Wob => "www.wob.com",
        }
    }

    /// Suffix appended to the timestamp in output file names.
    pub fn feed_suffix(&self) -> &'static str {
        match self {
            Marketplace::Abebooks => "abebooks",
            Marketplace::Ebay => "ebay",
            Marketplace::Wob => "wob",
        }
    }

    /// Output column headers, in emission order.
    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            Marketplace::Abebooks => &[
                "URL",
                "Image URL",
                "Product Title",
                "Product Price",
                "Shipping Fee",
                "Position",
                "ISBN",
                "Seller Name",
            ],
            Marketplace::Ebay => &[
                "URL",
                "NKW",
                "Image URL",
                "Product Title",
                "Product Price",
                "Shipping Fee",
                "Position",
                "Item Number",
                "Seller Name",
                "EAN",
            ],
            Marketplace::Wob => &[
                "Request URL",
                "URL",
                "Image URL",
                "Product Title",
                "Product Price",
                "Position",
                "Condition",
                "ISBN 13",
                "ISBN 10",
            ],
        }
    }

    pub fn header_policy(&self) -> HeaderPolicy {
        match self {
            Marketplace::Abebooks => HeaderPolicy::Generated,
            Marketplace::Ebay | Marketplace::Wob => HeaderPolicy::Fixed { authority: self.host() },
        }
    }

    pub fn proxy_mode(&self) -> ProxyMode {
        match self {
            Marketplace::Abebooks => ProxyMode::Rotating,
            Marketplace::Ebay | Marketplace::Wob => ProxyMode::Fixed,
        }
    }

    /// Whether listings link to a detail page that must be fetched.
    pub fn has_detail_pages(&self) -> bool {
        matches!(self, Marketplace::Ebay)
    }

    /// Default number of concurrent page requests.
    pub fn concurrency(&self) -> usize {
        match self {
            Marketplace::Abebooks => 10,
            Marketplace::Ebay | Marketplace::Wob => 1,
        }
    }

    /// Human-readable marketplace name.
    pub fn display_name(&self) -> &'static str {
        match self {
            Marketplace::Abebooks => "AbeBooks",
            Marketplace::Ebay => "eBay",
            Marketplace::Wob => "World of Books",
        }
    }
}

impl fmt::Display for Marketplace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.feed_suffix())
    }
}

impl FromStr for Marketplace {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "abebooks" | "abe" => Ok(Marketplace::Abebooks),
            "ebay" => Ok(Marketplace::Ebay),
            "wob" | "worldofbooks" => Ok(Marketplace::Wob),
            _ => Err(format!("Unknown marketplace: {}. Use: abebooks, ebay, wob", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marketplace_parsing() {
        assert_eq!("abebooks".parse::<Marketplace>().unwrap(), Marketplace::Abebooks);
        assert_eq!("ABE".parse::<Marketplace>().unwrap(), Marketplace::Abebooks);
        assert_eq!("eBay".parse::<Marketplace>().unwrap(), Marketplace::Ebay);
        assert_eq!("wob".parse::<Marketplace>().unwrap(), Marketplace::Wob);
        assert_eq!("worldofbooks".parse::<Marketplace>().unwrap(), Marketplace::Wob);

        let err = "amazon".parse::<Marketplace>().unwrap_err();
        assert!(err.contains("Unknown marketplace"));
    }

    #[test]
    fn test_display_roundtrip() {
        for marketplace in Marketplace::all() {
            let parsed: Marketplace = marketplace.to_string().parse().unwrap();
            assert_eq!(parsed, *marketplace);
        }
    }

    #[test]
    fn test_policies() {
        assert_eq!(Marketplace::Abebooks.header_policy(), HeaderPolicy::Generated);
        assert_eq!(
            Marketplace::Ebay.header_policy(),
            HeaderPolicy::Fixed { authority: "www.ebay.com" }
        );
        assert_eq!(Marketplace::Abebooks.proxy_mode(), ProxyMode::Rotating);
        assert_eq!(Marketplace::Wob.proxy_mode(), ProxyMode::Fixed);
        assert!(Marketplace::Ebay.has_detail_pages());
        assert!(!Marketplace::Abebooks.has_detail_pages());
        assert!(!Marketplace::Wob.has_detail_pages());
    }

    #[test]
    fn test_columns() {
        assert_eq!(Marketplace::Abebooks.columns().len(), 8);
        assert!(Marketplace::Ebay.columns().contains(&"EAN"));
        assert!(Marketplace::Wob.columns().contains(&"ISBN 13"));
        assert!(Marketplace::Wob.columns().contains(&"Condition"));
        for marketplace in Marketplace::all() {
            assert!(marketplace.columns().contains(&"Position"));
        }
    }

    #[test]
    fn test_serde() {
        let parsed: Marketplace = serde_json::from_str("\"wob\"").unwrap();
        assert_eq!(parsed, Marketplace::Wob);
        assert_eq!(serde_json::to_string(&Marketplace::Ebay).unwrap(), "\"ebay\"");
    }
}
