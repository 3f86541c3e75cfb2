//! Classification and logging of failed fetches.

use std::error::Error as StdError;
use std::fmt;
use tracing::error;

/// Kinds of fetch failure the crawler distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// The server answered with a non-success status.
    HttpStatus,
    /// Host name resolution failed.
    Dns,
    /// The request or connection timed out.
    Timeout,
    /// The forward proxy refused or broke the CONNECT tunnel.
    Tunnel,
    /// Anything else.
    Other,
}

impl FailureKind {
    pub fn label(&self) -> &'static str {
        match self {
            FailureKind::HttpStatus => "HTTP Error",
            FailureKind::Dns => "DNS Lookup Error",
            FailureKind::Timeout => "Timeout Error",
            FailureKind::Tunnel => "Tunnel Error",
            FailureKind::Other => "Other Error",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// HTTP statuses worth another attempt.
const RETRY_STATUSES: &[u16] = &[408, 429, 500, 502, 503, 504, 522, 524];

/// A classified fetch failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchFailure {
    pub kind: FailureKind,
    pub url: String,
    pub status: Option<u16>,
    pub message: String,
}

impl FetchFailure {
    /// Failure for a response with a non-success status.
    pub fn http_status(url: &str, status: u16) -> Self {
        Self {
            kind: FailureKind::HttpStatus,
            url: url.to_string(),
            status: Some(status),
            message: format!("status {status}"),
        }
    }

    /// Failure of the given kind with a free-form message.
    pub fn new(kind: FailureKind, url: &str, message: impl Into<String>) -> Self {
        Self { kind, url: url.to_string(), status: None, message: message.into() }
    }

    /// Classifies a transport error by walking its source chain.
    pub fn from_error(url: &str, err: &(dyn StdError + 'static), timed_out: bool) -> Self {
        let message = error_chain(err);
        let kind = if timed_out { FailureKind::Timeout } else { classify_message(&message) };
        Self::new(kind, url, message)
    }

    /// Whether the crawler should try the request again.
    pub fn is_retryable(&self) -> bool {
        match self.kind {
            FailureKind::HttpStatus => self.status.is_some_and(|s| RETRY_STATUSES.contains(&s)),
            _ => true,
        }
    }

    /// Logs the failure with its classification.
    pub fn log(&self) {
        match (self.kind, self.status) {
            (FailureKind::HttpStatus, Some(status)) => {
                error!("{} occurred: {} on {}", self.kind, status, self.url)
            }
            (FailureKind::Other, _) => {
                error!("{} occurred: {} ({})", self.kind, self.url, self.message)
            }
            _ => error!("{} occurred: {}", self.kind, self.url),
        }
    }
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} on {}: {}", self.kind, self.url, self.message)
    }
}

impl StdError for FetchFailure {}

/// Joins an error and its sources into one line.
fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut parts = vec![err.to_string()];
    let mut source = err.source();
    while let Some(cause) = source {
        parts.push(cause.to_string());
        source = cause.source();
    }
    parts.join(": ")
}

/// Classifies a transport failure from its rendered error chain.
pub fn classify_message(message: &str) -> FailureKind {
    let lower = message.to_lowercase();

    if lower.contains("timed out") || lower.contains("timeout") {
        FailureKind::Timeout
    } else if lower.contains("dns error")
        || lower.contains("failed to lookup address")
        || lower.contains("name or service not known")
        || lower.contains("no such host")
        || lower.contains("nodename nor servname")
    {
        FailureKind::Dns
    } else if lower.contains("tunnel") || lower.contains("proxy") {
        FailureKind::Tunnel
    } else {
        FailureKind::Other
    }
}
