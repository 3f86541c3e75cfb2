//! shelf-crawler - Top-listing scrapers for book and collectible marketplaces.

use anyhow::Result;
use clap::{Parser, Subcommand};
use shelf_crawler::commands::CrawlCommand;
use shelf_crawler::config::Config;
use shelf_crawler::marketplace::Marketplace;
use shelf_crawler::output::Encoding;
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "shelf-crawler",
    version,
    about = "Top-listing scrapers for book and collectible marketplaces",
    long_about = "Fetches AbeBooks, eBay and World of Books listing pages from a seed file and writes the top listings of each page to a timestamped CSV feed."
)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape the seed URLs of one marketplace
    #[command(alias = "c")]
    Crawl {
        /// Marketplace scraper to run (abebooks, ebay, wob)
        marketplace: Marketplace,

        /// Seed CSV file path or URL (needs a `url` column)
        #[arg(short, long, env = "SHELF_SEEDS")]
        seeds: Option<String>,

        /// Maximum concurrent page requests
        #[arg(long)]
        concurrency: Option<usize>,

        /// Retries per failed request
        #[arg(long)]
        retries: Option<u32>,

        /// Forward proxy endpoint (repeatable)
        #[arg(long = "proxy")]
        proxies: Vec<String>,

        /// Directory for the CSV feed
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Output encoding (utf-8, utf-8-sig)
        #[arg(long)]
        encoding: Option<Encoding>,

        /// Disable the adaptive delay between requests
        #[arg(long)]
        no_throttle: bool,
    },

    /// List supported marketplaces
    Marketplaces,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load config with layered overrides
    let mut config = Config::load(cli.config.as_deref())?.with_env();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new(Level::DEBUG.to_string())
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level))
    };

    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();

    match cli.command {
        Commands::Crawl {
            marketplace,
            seeds,
            concurrency,
            retries,
            proxies,
            output_dir,
            encoding,
            no_throttle,
        } => {
            if let Some(seeds) = seeds {
                config.seeds = Some(seeds);
            }
            if let Some(c) = concurrency {
                config.concurrency = Some(c);
            }
            if let Some(r) = retries {
                config.retry_times = r;
            }
            if !proxies.is_empty() {
                config.proxies = proxies;
            }
            if let Some(dir) = output_dir {
                config.output_dir = dir;
            }
            if let Some(e) = encoding {
                config.encoding = e;
            }
            if no_throttle {
                config.throttle.enabled = false;
            }

            let cmd = CrawlCommand::new(config, marketplace);
            let report = cmd.execute().await?;
            println!("{}", report);
        }

        Commands::Marketplaces => {
            println!("Supported marketplaces:\n");
            println!("{:<10} {:<18} {:<18} {}", "Code", "Name", "Host", "Columns");
            println!("{:-<10} {:-<18} {:-<18} {:-<40}", "", "", "", "");

            for marketplace in Marketplace::all() {
                println!(
                    "{:<10} {:<18} {:<18} {}",
                    marketplace.to_string(),
                    marketplace.display_name(),
                    marketplace.host(),
                    marketplace.columns().join(", ")
                );
            }
        }
    }

    Ok(())
}
