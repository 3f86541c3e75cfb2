//! HTTP page fetching using wreq for TLS fingerprint emulation.

use super::failure::{FailureKind, FetchFailure};
use super::request::{FetchRequest, ProxyPool, RequestContext};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;
use wreq::Client;
use wreq_util::Emulation;

/// A response as handed to the extractor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    /// Requested URL
    pub url: String,
    /// URL after redirects
    pub final_url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
    /// Context of the request that produced this page
    pub context: RequestContext,
}

impl FetchedPage {
    /// A 200 `text/html` page; used by tests and fixtures.
    pub fn html(url: &str, body: impl Into<String>) -> Self {
        Self {
            url: url.to_string(),
            final_url: url.to_string(),
            status: 200,
            content_type: Some("text/html; charset=utf-8".to_string()),
            body: body.into(),
            context: RequestContext { seed_url: url.to_string(), ..RequestContext::default() },
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Whether the body is HTML/XHTML markup.
    ///
    /// Without a content type the body is sniffed for a leading `<`.
    pub fn is_markup(&self) -> bool {
        match &self.content_type {
            Some(ct) => {
                let ct = ct.to_lowercase();
                ct.contains("text/html") || ct.contains("application/xhtml+xml")
            }
            None => self.body.trim_start().starts_with('<'),
        }
    }
}

/// Trait for page fetching - enables mocking for tests.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Performs one GET. Any HTTP status is a page; only transport failures are errors.
    ///
    /// The returned page carries `request.context`, which the extractor reads
    /// for the seed URL and keyword.
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchedPage, FetchFailure>;
}

/// Production fetcher with browser impersonation.
///
/// One client is built per proxy endpoint because wreq binds proxies at
/// client construction.
pub struct HttpFetcher {
    direct: Client,
    proxied: HashMap<String, Client>,
}

impl HttpFetcher {
    /// Builds clients for direct access and for every endpoint in `proxies`.
    pub fn new(proxies: &ProxyPool) -> Result<Self> {
        let direct = Self::client(None)?;

        let mut proxied = HashMap::new();
        for endpoint in proxies.endpoints() {
            proxied.insert(endpoint.clone(), Self::client(Some(endpoint))?);
        }

        Ok(Self { direct, proxied })
    }

    fn client(proxy: Option<&str>) -> Result<Client> {
        let mut builder = Client::builder()
            .gzip(true)
            .brotli(true)
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10));

        if let Some(proxy_url) = proxy {
            debug!("Configuring proxy: {}", proxy_url);
            let proxy = wreq::Proxy::all(proxy_url).context("Failed to configure proxy")?;
            builder = builder.proxy(proxy);
        }

        builder.build().context("Failed to build HTTP client")
    }

    fn client_for(&self, proxy: Option<&str>) -> Option<&Client> {
        match proxy {
            Some(endpoint) => self.proxied.get(endpoint),
            None => Some(&self.direct),
        }
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchedPage, FetchFailure> {
        let client = self.client_for(request.proxy.as_deref()).ok_or_else(|| {
            FetchFailure::new(FailureKind::Other, &request.url, "proxy endpoint not in pool")
        })?;

        debug!("GET {}", request.url);

        let mut builder = client.get(request.url.as_str()).emulation(Emulation::Chrome131);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| FetchFailure::from_error(&request.url, &e, e.is_timeout()))?;

        let status = response.status().as_u16();
        let final_url = response.uri().to_string();
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        debug!("Response status: {} ({})", status, final_url);

        let body = response
            .text()
            .await
            .map_err(|e| FetchFailure::from_error(&request.url, &e, e.is_timeout()))?;

        Ok(FetchedPage {
            url: request.url.clone(),
            final_url,
            status,
            content_type,
            body,
            context: request.context.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::request::RequestBuilder;
    use crate::marketplace::Marketplace;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request_for(url: &str, marketplace: Marketplace) -> FetchRequest {
        RequestBuilder::new(marketplace, ProxyPool::default()).build(url)
    }

    #[test]
    fn test_is_markup() {
        let mut page = FetchedPage::html("https://example.com/", "<html></html>");
        assert!(page.is_markup());

        page.content_type = Some("application/xhtml+xml".to_string());
        assert!(page.is_markup());

        page.content_type = Some("application/json".to_string());
        assert!(!page.is_markup());

        page.content_type = None;
        assert!(page.is_markup());

        page.body = "{\"a\": 1}".to_string();
        assert!(!page.is_markup());
    }

    #[test]
    fn test_is_success() {
        let mut page = FetchedPage::html("https://example.com/", "");
        assert!(page.is_success());
        page.status = 404;
        assert!(!page.is_success());
    }

    #[tokio::test]
    async fn test_fetch_success() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/servlet/SearchResults"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_string("<html><body>Listing</body></html>"),
            )
            .mount(&mock_server)
            .await;

        let fetcher = HttpFetcher::new(&ProxyPool::default()).unwrap();
        let url = format!("{}/servlet/SearchResults?isbn=1", mock_server.uri());
        let request = request_for(&url, Marketplace::Abebooks);

        let page = fetcher.fetch(&request).await.unwrap();
        assert_eq!(page.status, 200);
        assert!(page.is_markup());
        assert!(page.body.contains("Listing"));
        assert_eq!(page.context.seed_url, url);
    }

    #[tokio::test]
    async fn test_fetch_sends_fixed_headers() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/sch/i.html"))
            .and(header("sec-fetch-mode", "navigate"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
            .mount(&mock_server)
            .await;

        let fetcher = HttpFetcher::new(&ProxyPool::default()).unwrap();
        let url = format!("{}/sch/i.html?_nkw=dune", mock_server.uri());
        let page = fetcher.fetch(&request_for(&url, Marketplace::Ebay)).await.unwrap();

        assert_eq!(page.status, 200);
        assert_eq!(page.context.keyword, "dune");
    }

    #[tokio::test]
    async fn test_fetch_error_status_is_a_page() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let fetcher = HttpFetcher::new(&ProxyPool::default()).unwrap();
        let url = format!("{}/missing", mock_server.uri());
        let page = fetcher.fetch(&request_for(&url, Marketplace::Wob)).await.unwrap();

        assert_eq!(page.status, 404);
        assert!(!page.is_success());
    }

    #[tokio::test]
    async fn test_fetch_unknown_proxy() {
        let fetcher = HttpFetcher::new(&ProxyPool::default()).unwrap();
        let mut request = request_for("http://127.0.0.1:9/", Marketplace::Ebay);
        request.proxy = Some("http://unlisted:1".to_string());

        let failure = fetcher.fetch(&request).await.unwrap_err();
        assert_eq!(failure.kind, FailureKind::Other);
    }
}
