//! Seed URL loading from a local or remote CSV file.

use std::fmt;
use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Column holding the seed URLs.
pub const URL_COLUMN: &str = "url";

/// Rows whose URL starts with this are skipped (comments and `#VALUE!` cells).
pub const SENTINEL_PREFIX: char = '#';

/// Errors that abort a run before any request is made.
#[derive(Debug, Error)]
pub enum SeedError {
    #[error("Failed to read seed file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to download seed file {url}: {message}")]
    Fetch { url: String, message: String },

    #[error("Malformed seed file: {0}")]
    Csv(#[from] csv::Error),

    #[error("Seed file has no '{0}' column")]
    MissingColumn(&'static str),
}

/// Where the seed file lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeedSource {
    Path(PathBuf),
    Url(String),
}

impl From<&str> for SeedSource {
    fn from(value: &str) -> Self {
        if value.starts_with("http://") || value.starts_with("https://") {
            SeedSource::Url(value.to_string())
        } else {
            SeedSource::Path(PathBuf::from(value))
        }
    }
}

impl fmt::Display for SeedSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeedSource::Path(path) => write!(f, "{}", path.display()),
            SeedSource::Url(url) => f.write_str(url),
        }
    }
}

/// Whether a cell value is a usable seed URL.
pub fn is_valid_seed(value: &str) -> bool {
    let value = value.trim();
    !value.is_empty() && !value.starts_with(SENTINEL_PREFIX)
}

/// Parses CSV content with a header row and returns the valid `url` cells in order.
pub fn parse_seeds<R: Read>(reader: R) -> Result<Vec<String>, SeedError> {
    let mut csv = csv::ReaderBuilder::new().flexible(true).from_reader(reader);

    let column = csv
        .headers()?
        .iter()
        .position(|h| h.trim() == URL_COLUMN)
        .ok_or(SeedError::MissingColumn(URL_COLUMN))?;

    let mut seeds = Vec::new();
    for record in csv.records() {
        let record = record?;
        let value = record.get(column).unwrap_or_default();
        if is_valid_seed(value) {
            seeds.push(value.trim().to_string());
        } else {
            debug!("Skipping seed row: {:?}", value);
        }
    }

    Ok(seeds)
}

/// Loads seeds from `source`.
pub async fn load_seeds(source: &SeedSource) -> Result<Vec<String>, SeedError> {
    let seeds = match source {
        SeedSource::Path(path) => {
            let file = std::fs::File::open(path)
                .map_err(|source| SeedError::Io { path: path.clone(), source })?;
            parse_seeds(file)?
        }
        SeedSource::Url(url) => {
            let body = download(url).await?;
            parse_seeds(body.as_bytes())?
        }
    };

    info!("Loaded {} seed URLs from {}", seeds.len(), source);
    Ok(seeds)
}

async fn download(url: &str) -> Result<String, SeedError> {
    let fetch_error = |message: String| SeedError::Fetch { url: url.to_string(), message };

    let client = wreq::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .map_err(|e| fetch_error(e.to_string()))?;

    let response = client.get(url).send().await.map_err(|e| fetch_error(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(fetch_error(format!("status {}", status)));
    }

    response.text().await.map_err(|e| fetch_error(e.to_string()))
}
