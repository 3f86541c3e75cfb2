//! Crawl command implementation.

use crate::config::Config;
use crate::crawler::{AutoThrottle, CrawlSettings, CrawlStats, Crawler};
use crate::fetch::{HttpFetcher, PageFetcher, ProxyPool, RequestBuilder};
use crate::marketplace::Marketplace;
use crate::output::CsvEmitter;
use crate::seeds::{load_seeds, SeedSource};
use anyhow::{Context, Result};
use std::fmt;
use std::path::PathBuf;
use tracing::info;

/// Summary of a finished run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlReport {
    pub marketplace: Marketplace,
    pub output: PathBuf,
    pub stats: CrawlStats,
}

impl fmt::Display for CrawlReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Marketplace: {}", self.marketplace.display_name())?;
        writeln!(f, "Seeds:       {}", self.stats.seeds)?;
        writeln!(f, "Requests:    {}", self.stats.requests)?;
        writeln!(f, "Pages:       {}", self.stats.pages)?;
        writeln!(f, "Failed:      {}", self.stats.failures)?;
        writeln!(f, "Skipped:     {}", self.stats.skipped)?;
        writeln!(f, "Records:     {}", self.stats.records)?;
        write!(f, "Output:      {}", self.output.display())
    }
}

/// Runs one marketplace scraper over a seed file.
pub struct CrawlCommand {
    config: Config,
    marketplace: Marketplace,
}

impl CrawlCommand {
    /// Creates a new crawl command.
    pub fn new(config: Config, marketplace: Marketplace) -> Self {
        Self { config, marketplace }
    }

    fn proxies(&self) -> ProxyPool {
        ProxyPool::new(self.config.proxies.clone())
    }

    /// Loads seeds, crawls, and writes the CSV feed.
    pub async fn execute(&self) -> Result<CrawlReport> {
        let fetcher =
            HttpFetcher::new(&self.proxies()).context("Failed to create HTTP client")?;

        self.execute_with_fetcher(fetcher).await
    }

    /// Executes the crawl with a provided fetcher (for testing).
    pub async fn execute_with_fetcher(&self, fetcher: impl PageFetcher) -> Result<CrawlReport> {
        let source = self
            .config
            .seeds
            .as_deref()
            .map(SeedSource::from)
            .context("No seed file given. Pass --seeds or set `seeds` in the config file")?;

        let seeds = load_seeds(&source).await.context("Failed to load seed URLs")?;

        let mut emitter = CsvEmitter::create(
            &self.config.output_dir,
            self.marketplace,
            self.config.encoding,
        )
        .context("Failed to create output file")?;

        let settings = CrawlSettings {
            concurrency: self.config.concurrency_for(self.marketplace),
            retry_times: self.config.retry_times,
        };
        let crawler = Crawler::new(
            fetcher,
            RequestBuilder::new(self.marketplace, self.proxies()),
            AutoThrottle::new(&self.config.throttle),
            settings,
        );

        let stats = crawler.run(&seeds, &mut emitter).await.context("Failed to write records")?;
        let output = emitter.finish().context("Failed to finish output file")?;

        info!("Wrote {} records to {}", stats.records, output.display());
        Ok(CrawlReport { marketplace: self.marketplace, output, stats })
    }
}
