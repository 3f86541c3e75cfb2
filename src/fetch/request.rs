//! Outbound request construction: browser headers, proxy choice and context.

use crate::marketplace::models::ListingRecord;
use crate::marketplace::sites::{HeaderPolicy, Marketplace, ProxyMode};
use rand::Rng;
use tracing::info;

/// Query-parameter marker preceding the eBay search keyword.
const KEYWORD_MARKER: &str = "_nkw=";

const ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8,application/signed-exchange;v=b3;q=0.9";

/// Chrome major versions drawn for generated fingerprints.
const CHROME_VERSIONS: &[u32] =
    &[118, 119, 120, 121, 122, 123, 124, 125, 126, 127, 128, 129, 130, 131];

/// Windows NT versions drawn for generated fingerprints.
const WINDOWS_VERSIONS: &[&str] = &["10.0", "6.3", "6.2", "6.1"];

const ACCEPT_LANGUAGES: &[&str] =
    &["en-US,en;q=0.9", "en-GB,en;q=0.9", "en-US,en;q=0.8", "en-US;q=0.9,en;q=0.7"];

/// Data carried from a request to the code that handles its response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    /// Seed URL the request descends from
    pub seed_url: String,
    /// Search keyword parsed from the seed URL, empty when absent
    pub keyword: String,
    /// Partially-built record awaiting a detail-page field
    pub partial: Option<ListingRecord>,
}

/// A fully-specified outbound GET request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub proxy: Option<String>,
    pub context: RequestContext,
}

/// Immutable list of forward-proxy endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProxyPool {
    endpoints: Vec<String>,
}

impl ProxyPool {
    pub fn new(endpoints: Vec<String>) -> Self {
        let endpoints = endpoints
            .into_iter()
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty())
            .collect();
        Self { endpoints }
    }

    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    /// Picks an endpoint. `draw` is only consulted in rotating mode.
    pub fn pick(&self, mode: ProxyMode, draw: usize) -> Option<&str> {
        if self.endpoints.is_empty() {
            return None;
        }

        let index = match mode {
            ProxyMode::Rotating => draw % self.endpoints.len(),
            ProxyMode::Fixed => 0,
        };
        Some(self.endpoints[index].as_str())
    }
}

/// Builds requests for one marketplace.
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    marketplace: Marketplace,
    proxies: ProxyPool,
}

impl RequestBuilder {
    pub fn new(marketplace: Marketplace, proxies: ProxyPool) -> Self {
        Self { marketplace, proxies }
    }

    pub fn marketplace(&self) -> Marketplace {
        self.marketplace
    }

    /// Builds the request for a seed URL.
    pub fn build(&self, seed: &str) -> FetchRequest {
        let context = RequestContext {
            seed_url: seed.to_string(),
            keyword: extract_keyword(seed),
            partial: None,
        };
        self.request(seed, context)
    }

    /// Builds the follow-up request for a listing's detail page.
    pub fn build_detail(&self, link: &str, partial: ListingRecord, seed_url: &str) -> FetchRequest {
        let context = RequestContext {
            seed_url: seed_url.to_string(),
            keyword: extract_keyword(seed_url),
            partial: Some(partial),
        };
        self.request(link, context)
    }

    fn request(&self, url: &str, context: RequestContext) -> FetchRequest {
        let mut rng = rand::rng();
        let draw = rng.random_range(0..usize::MAX);
        let proxy = self.proxies.pick(self.marketplace.proxy_mode(), draw).map(String::from);

        let headers = match self.marketplace.header_policy() {
            HeaderPolicy::Generated => generated_headers(
                CHROME_VERSIONS[rng.random_range(0..CHROME_VERSIONS.len())],
                WINDOWS_VERSIONS[rng.random_range(0..WINDOWS_VERSIONS.len())],
                ACCEPT_LANGUAGES[rng.random_range(0..ACCEPT_LANGUAGES.len())],
            ),
            HeaderPolicy::Fixed { authority } => fixed_headers(authority),
        };

        info!("Requesting URL: {} with proxy: {}", url, proxy.as_deref().unwrap_or("direct"));

        FetchRequest { url: url.to_string(), headers, proxy, context }
    }
}

/// Returns the substring between `_nkw=` and the next `&`, or empty.
pub fn extract_keyword(url: &str) -> String {
    url.split_once(KEYWORD_MARKER)
        .map(|(_, rest)| rest.split('&').next().unwrap_or_default().to_string())
        .unwrap_or_default()
}

/// Chrome-on-Windows header set for the given versions.
pub fn generated_headers(
    chrome: u32,
    windows: &str,
    accept_language: &str,
) -> Vec<(String, String)> {
    let user_agent = format!(
        "Mozilla/5.0 (Windows NT {windows}; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/{chrome}.0.0.0 Safari/537.36"
    );

    vec![
        ("Accept".to_string(), ACCEPT.to_string()),
        ("Accept-Language".to_string(), accept_language.to_string()),
        ("Upgrade-Insecure-Requests".to_string(), "1".to_string()),
        ("User-Agent".to_string(), user_agent),
        (
            "Sec-Ch-Ua".to_string(),
            format!("\"Chromium\";v=\"{chrome}\", \"Not_A Brand\";v=\"24\""),
        ),
        ("Sec-Ch-Ua-Mobile".to_string(), "?0".to_string()),
        ("Sec-Ch-Ua-Platform".to_string(), "\"Windows\"".to_string()),
    ]
}

/// Constant Chrome header set announcing `authority`.
pub fn fixed_headers(authority: &str) -> Vec<(String, String)> {
    [
        ("authority", authority),
        ("upgrade-insecure-requests", "1"),
        (
            "user-agent",
            "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/97.0.4692.99 Safari/537.36",
        ),
        ("accept", ACCEPT),
        ("sec-gpc", "1"),
        ("sec-fetch-site", "none"),
        ("sec-fetch-mode", "navigate"),
        ("sec-fetch-user", "?1"),
        ("sec-fetch-dest", "document"),
        ("accept-language", "en-US,en;q=0.9"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}
