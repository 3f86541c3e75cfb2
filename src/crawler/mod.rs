//! Crawl engine: bounded concurrency, retries, throttling and detail-page follow-up.

pub mod throttle;

use crate::fetch::{FetchFailure, FetchRequest, FetchedPage, PageFetcher, RequestBuilder};
use crate::marketplace::{ListingRecord, Marketplace, Parser};
use crate::output::{EmitError, RecordSink};
use futures::stream::{self, StreamExt};
use std::time::Instant;
use tracing::{debug, info, warn};

pub use throttle::AutoThrottle;

/// Engine limits for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrawlSettings {
    /// Seed pages in flight at once
    pub concurrency: usize,
    /// Extra attempts after the first failure
    pub retry_times: u32,
}

/// Counters reported at the end of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrawlStats {
    pub seeds: usize,
    /// Requests built (seed and detail), excluding retries
    pub requests: usize,
    /// Pages fetched successfully
    pub pages: usize,
    pub records: usize,
    /// Requests that failed after all retries
    pub failures: usize,
    /// Pages skipped because they were not markup
    pub skipped: usize,
}

/// Result of processing one seed.
#[derive(Debug, Default)]
struct SeedOutcome {
    records: Vec<ListingRecord>,
    stats: CrawlStats,
}

/// Drives fetch → extract → emit for one marketplace.
pub struct Crawler<F: PageFetcher> {
    marketplace: Marketplace,
    fetcher: F,
    builder: RequestBuilder,
    parser: Parser,
    throttle: AutoThrottle,
    settings: CrawlSettings,
}

impl<F: PageFetcher> Crawler<F> {
    pub fn new(
        fetcher: F,
        builder: RequestBuilder,
        throttle: AutoThrottle,
        settings: CrawlSettings,
    ) -> Self {
        let marketplace = builder.marketplace();
        Self {
            marketplace,
            fetcher,
            builder,
            parser: Parser::new(marketplace),
            throttle,
            settings,
        }
    }

    /// Crawls every seed and hands records to `sink` as pages complete.
    ///
    /// Fetch failures are logged and counted; only sink errors abort the run.
    pub async fn run<S: RecordSink>(
        &self,
        seeds: &[String],
        sink: &mut S,
    ) -> Result<CrawlStats, EmitError> {
        info!(
            "Crawling {} seeds on {} (concurrency {}, retries {})",
            seeds.len(),
            self.marketplace.display_name(),
            self.settings.concurrency,
            self.settings.retry_times
        );

        let mut stats = CrawlStats { seeds: seeds.len(), ..CrawlStats::default() };

        let mut outcomes = stream::iter(seeds)
            .map(|seed| self.process_seed(seed))
            .buffer_unordered(self.settings.concurrency.max(1));

        while let Some(outcome) = outcomes.next().await {
            for record in &outcome.records {
                sink.emit(record)?;
            }

            stats.requests += outcome.stats.requests;
            stats.pages += outcome.stats.pages;
            stats.failures += outcome.stats.failures;
            stats.skipped += outcome.stats.skipped;
            stats.records += outcome.records.len();
        }

        info!(
            "Crawl finished: {} records from {} pages ({} failed, {} skipped)",
            stats.records, stats.pages, stats.failures, stats.skipped
        );
        Ok(stats)
    }

    async fn process_seed(&self, seed: &str) -> SeedOutcome {
        let mut outcome = SeedOutcome::default();
        let request = self.builder.build(seed);
        outcome.stats.requests += 1;

        let page = match self.fetch_with_retry(&request).await {
            Ok(page) => page,
            Err(failure) => {
                failure.log();
                outcome.stats.failures += 1;
                return outcome;
            }
        };
        outcome.stats.pages += 1;

        if !page.is_markup() {
            outcome.stats.skipped += 1;
        }

        let records = self.parser.extract(&page);
        if !self.marketplace.has_detail_pages() {
            outcome.records = records;
            return outcome;
        }

        for partial in records {
            let record = self.complete_detail(partial, seed, &mut outcome.stats).await;
            outcome.records.push(record);
        }
        outcome
    }

    /// Fetches a listing's detail page and merges its identifier.
    ///
    /// A missing link or failed fetch yields the partial record unchanged.
    async fn complete_detail(
        &self,
        partial: ListingRecord,
        seed: &str,
        stats: &mut CrawlStats,
    ) -> ListingRecord {
        if partial.detail_link.is_empty() {
            warn!("Listing {} on {} has no detail link", partial.position, partial.url);
            return partial;
        }

        let link = partial.detail_link.clone();
        let request = self.builder.build_detail(&link, partial.clone(), seed);
        stats.requests += 1;

        let value = match self.fetch_with_retry(&request).await {
            Ok(page) => {
                stats.pages += 1;
                self.parser.extract_detail(&page)
            }
            Err(failure) => {
                failure.log();
                stats.failures += 1;
                warn!("Emitting listing without detail fields: {}", link);
                String::new()
            }
        };

        let mut record = partial;
        record.merge_identifier(self.marketplace, value);
        record
    }

    /// Fetches with throttling and bounded retries.
    ///
    /// Non-2xx responses are failures; only retryable ones are attempted again.
    async fn fetch_with_retry(&self, request: &FetchRequest) -> Result<FetchedPage, FetchFailure> {
        let attempts = self.settings.retry_times.saturating_add(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            self.throttle.wait().await;

            let started = Instant::now();
            let failure = match self.fetcher.fetch(request).await {
                Ok(page) => {
                    self.throttle.observe(started.elapsed(), page.is_success());
                    if page.is_success() {
                        return Ok(page);
                    }
                    FetchFailure::http_status(&request.url, page.status)
                }
                Err(failure) => failure,
            };

            if !failure.is_retryable() || attempt >= attempts {
                if attempt > 1 {
                    debug!("Gave up retrying {} (failed {} times)", request.url, attempt);
                }
                return Err(failure);
            }

            debug!("Retrying {} (failed {} times): {}", request.url, attempt, failure);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ThrottleConfig;
    use crate::fetch::{FailureKind, ProxyPool, RequestContext};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::time::Instant;

    /// Scripted fetcher: each URL answers from a queue, the last answer repeats.
    struct MockFetcher {
        responses: Mutex<HashMap<String, Vec<Result<(u16, &'static str, String), FailureKind>>>>,
        calls: AtomicUsize,
        starts: Mutex<Vec<Instant>>,
        echo_context: bool,
    }

    impl MockFetcher {
        fn new() -> Self {
            Self {
                responses: Mutex::new(HashMap::new()),
                calls: AtomicUsize::new(0),
                starts: Mutex::new(Vec::new()),
                echo_context: true,
            }
        }

        /// Detail pages come back without the request context.
        fn dropping_detail_context(mut self) -> Self {
            self.echo_context = false;
            self
        }

        fn page(self, url: &str, status: u16, content_type: &'static str, body: &str) -> Self {
            self.push(url, Ok((status, content_type, body.to_string())))
        }

        fn html(self, url: &str, body: &str) -> Self {
            self.page(url, 200, "text/html", body)
        }

        fn failure(self, url: &str, kind: FailureKind) -> Self {
            self.push(url, Err(kind))
        }

        fn push(
            self,
            url: &str,
            response: Result<(u16, &'static str, String), FailureKind>,
        ) -> Self {
            self.responses.lock().unwrap().entry(url.to_string()).or_default().push(response);
            self
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PageFetcher for MockFetcher {
        async fn fetch(&self, request: &FetchRequest) -> Result<FetchedPage, FetchFailure> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.starts.lock().unwrap().push(Instant::now());

            let context = if self.echo_context || request.context.partial.is_none() {
                request.context.clone()
            } else {
                RequestContext::default()
            };

            let mut responses = self.responses.lock().unwrap();
            let queue = responses.get_mut(&request.url).expect("unscripted URL");
            let response = if queue.len() > 1 { queue.remove(0) } else { queue[0].clone() };

            match response {
                Ok((status, content_type, body)) => Ok(FetchedPage {
                    url: request.url.clone(),
                    final_url: request.url.clone(),
                    status,
                    content_type: Some(content_type.to_string()),
                    body,
                    context,
                }),
                Err(kind) => Err(FetchFailure::new(kind, &request.url, "scripted")),
            }
        }
    }

    fn crawler(marketplace: Marketplace, fetcher: MockFetcher) -> Crawler<MockFetcher> {
        Crawler::new(
            fetcher,
            RequestBuilder::new(marketplace, ProxyPool::default()),
            AutoThrottle::disabled(),
            CrawlSettings { concurrency: 2, retry_times: 2 },
        )
    }

    const ABEBOOKS_PAGE: &str = r#"<ul>
        <li data-cy="listing-item"><span data-cy="listing-title">A</span></li>
        <li data-cy="listing-item"><span data-cy="listing-title">B</span></li>
        <li data-cy="listing-item"><span data-cy="listing-title">C</span></li>
        <li data-cy="listing-item"><span data-cy="listing-title">D</span></li>
    </ul>"#;

    fn ebay_page(links: &[&str]) -> String {
        let items: String = links
            .iter()
            .map(|link| {
                format!(
                    r#"<div class="s-item__wrapper clearfix"><a href="{link}">x</a><span role="heading">Item</span></div>"#
                )
            })
            .collect();
        format!("<ul>{items}</ul>")
    }

    #[tokio::test]
    async fn test_one_request_per_seed() {
        let fetcher = MockFetcher::new()
            .html("https://abe/1", ABEBOOKS_PAGE)
            .html("https://abe/2", "<ul></ul>");
        let crawler = crawler(Marketplace::Abebooks, fetcher);
        let seeds = vec!["https://abe/1".to_string(), "https://abe/2".to_string()];

        let mut sink = Vec::new();
        let stats = crawler.run(&seeds, &mut sink).await.unwrap();

        assert_eq!(crawler.fetcher.calls(), 2);
        assert_eq!(stats.requests, 2);
        assert_eq!(stats.pages, 2);
        assert_eq!(stats.records, 3);
        assert_eq!(sink.len(), 3);
    }

    #[tokio::test]
    async fn test_retries_transient_status() {
        let fetcher = MockFetcher::new()
            .page("https://abe/1", 503, "text/html", "")
            .page("https://abe/1", 503, "text/html", "")
            .html("https://abe/1", ABEBOOKS_PAGE);
        let crawler = crawler(Marketplace::Abebooks, fetcher);

        let mut sink = Vec::new();
        let stats = crawler.run(&["https://abe/1".to_string()], &mut sink).await.unwrap();

        assert_eq!(crawler.fetcher.calls(), 3);
        assert_eq!(stats.failures, 0);
        assert_eq!(sink.len(), 3);
    }

    #[tokio::test]
    async fn test_retry_limit() {
        let fetcher = MockFetcher::new().failure("https://abe/1", FailureKind::Timeout);
        let crawler = crawler(Marketplace::Abebooks, fetcher);

        let mut sink = Vec::new();
        let stats = crawler.run(&["https://abe/1".to_string()], &mut sink).await.unwrap();

        assert_eq!(crawler.fetcher.calls(), 3);
        assert_eq!(stats.failures, 1);
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn test_not_found_is_not_retried() {
        let fetcher = MockFetcher::new()
            .page("https://abe/404", 404, "text/html", "")
            .html("https://abe/ok", ABEBOOKS_PAGE);
        let crawler = crawler(Marketplace::Abebooks, fetcher);
        let seeds = vec!["https://abe/404".to_string(), "https://abe/ok".to_string()];

        let mut sink = Vec::new();
        let stats = crawler.run(&seeds, &mut sink).await.unwrap();

        assert_eq!(crawler.fetcher.calls(), 2);
        assert_eq!(stats.failures, 1);
        assert_eq!(stats.records, 3);
    }

    #[tokio::test]
    async fn test_non_markup_skipped() {
        let fetcher =
            MockFetcher::new().page("https://abe/feed", 200, "application/json", "{\"a\":1}");
        let crawler = crawler(Marketplace::Abebooks, fetcher);

        let mut sink = Vec::new();
        let stats = crawler.run(&["https://abe/feed".to_string()], &mut sink).await.unwrap();

        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.records, 0);
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn test_ebay_detail_merge() {
        let seed = "https://ebay/sch/i.html?_nkw=9780131103627";
        let fetcher = MockFetcher::new()
            .html(seed, &ebay_page(&["https://ebay/itm/111?x=1"]))
            .html(
                "https://ebay/itm/111?x=1",
                r#"<div class="s-name">EAN</div><div>9780131103627</div>"#,
            );
        let crawler = crawler(Marketplace::Ebay, fetcher);

        let mut sink = Vec::new();
        let stats = crawler.run(&[seed.to_string()], &mut sink).await.unwrap();

        assert_eq!(stats.requests, 2);
        assert_eq!(sink.len(), 1);
        assert_eq!(sink[0].ean, "9780131103627");
        assert_eq!(sink[0].identifier, "111");
        assert_eq!(sink[0].keyword, "'9780131103627");
        assert_eq!(sink[0].url, seed);
    }

    #[tokio::test]
    async fn test_ebay_detail_failure_emits_partial() {
        let seed = "https://ebay/sch/i.html?_nkw=x";
        let fetcher = MockFetcher::new()
            .html(seed, &ebay_page(&["https://ebay/itm/1", "https://ebay/itm/2"]))
            .failure("https://ebay/itm/1", FailureKind::Tunnel)
            .html("https://ebay/itm/2", r#"<div class="s-name">EAN</div><div>123</div>"#);
        let crawler = crawler(Marketplace::Ebay, fetcher);

        let mut sink = Vec::new();
        let stats = crawler.run(&[seed.to_string()], &mut sink).await.unwrap();

        assert_eq!(stats.failures, 1);
        assert_eq!(sink.len(), 2);
        assert_eq!(sink[0].identifier, "1");
        assert_eq!(sink[0].ean, "");
        assert_eq!(sink[1].ean, "123");
    }

    #[tokio::test]
    async fn test_ebay_missing_link_emits_partial() {
        let seed = "https://ebay/sch/i.html?_nkw=x";
        let page = r#"<ul><div class="s-item__wrapper clearfix"><span role="heading">No link</span></div></ul>"#;
        let fetcher = MockFetcher::new().html(seed, page);
        let crawler = crawler(Marketplace::Ebay, fetcher);

        let mut sink = Vec::new();
        let stats = crawler.run(&[seed.to_string()], &mut sink).await.unwrap();

        assert_eq!(crawler.fetcher.calls(), 1);
        assert_eq!(stats.requests, 1);
        assert_eq!(sink.len(), 1);
        assert_eq!(sink[0].title, "No link");
    }

    #[tokio::test]
    async fn test_ebay_detail_keeps_listing_without_context_echo() {
        let seed = "https://ebay/sch/i.html?_nkw=x";
        let fetcher = MockFetcher::new()
            .html(seed, &ebay_page(&["https://ebay/itm/222"]))
            .html("https://ebay/itm/222", r#"<div class="s-name">EAN</div><div>456</div>"#)
            .dropping_detail_context();
        let crawler = crawler(Marketplace::Ebay, fetcher);

        let mut sink = Vec::new();
        crawler.run(&[seed.to_string()], &mut sink).await.unwrap();

        assert_eq!(sink.len(), 1);
        assert_eq!(sink[0].identifier, "222");
        assert_eq!(sink[0].title, "Item");
        assert_eq!(sink[0].url, seed);
        assert_eq!(sink[0].ean, "456");
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttle_spaces_concurrent_requests() {
        let seeds: Vec<String> = (1..=6).map(|i| format!("https://abe/{i}")).collect();
        let fetcher = seeds.iter().fold(MockFetcher::new(), |f, seed| f.html(seed, "<ul></ul>"));
        let throttle = AutoThrottle::new(&ThrottleConfig {
            enabled: true,
            min_delay_ms: 1000,
            max_delay_ms: 30_000,
            jitter_ms: 0,
        });
        let crawler = Crawler::new(
            fetcher,
            RequestBuilder::new(Marketplace::Abebooks, ProxyPool::default()),
            throttle,
            CrawlSettings { concurrency: 4, retry_times: 0 },
        );

        let mut sink = Vec::new();
        crawler.run(&seeds, &mut sink).await.unwrap();

        let mut starts = crawler.fetcher.starts.lock().unwrap().clone();
        starts.sort();
        assert_eq!(starts.len(), 6);
        for pair in starts.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_millis(1000));
        }
    }
}
