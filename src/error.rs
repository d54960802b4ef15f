use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Coarse classification of acquisition failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Network failure or non-2xx status
    Unreachable,
    /// Navigation or selector wait exceeded its budget
    Timeout,
    /// The browser session could not be started
    LaunchFailure,
    /// A structured-data block was malformed (recorded, never raised)
    ParseSkipped,
    /// A browser command failed after launch
    Browser,
    /// Rejected by the URL policy
    Blocked,
    /// Rejected by the rate limiter
    RateLimited,
    /// Caller supplied a selector that does not parse
    InvalidSelector,
    /// Caller supplied a URL that does not parse
    InvalidUrl,
}

/// Phase of a rendered fetch that ran out of time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutStage {
    Navigation,
    Selector,
    Capture,
}

impl fmt::Display for TimeoutStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeoutStage::Navigation => f.write_str("navigation"),
            TimeoutStage::Selector => f.write_str("selector wait"),
            TimeoutStage::Capture => f.write_str("page capture"),
        }
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (status {s})")).unwrap_or_default()
}

/// Errors returned by the fetchers and the acquisition pipeline
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("{url} unreachable{}: {message}", status_suffix(.status))]
    Unreachable {
        url: String,
        status: Option<u16>,
        message: String,
    },
    #[error("{stage} timed out after {budget:?}")]
    Timeout {
        stage: TimeoutStage,
        budget: Duration,
    },
    #[error("browser launch failed: {0}")]
    LaunchFailure(String),
    #[error("browser command failed: {0}")]
    Browser(String),
    #[error("URL blocked by policy: {0}")]
    Blocked(String),
    #[error("rate limited, retry after {0:?}")]
    RateLimited(Duration),
    #[error("invalid selector `{selector}`: {message}")]
    InvalidSelector { selector: String, message: String },
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

impl FetchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FetchError::Unreachable { .. } => ErrorKind::Unreachable,
            FetchError::Timeout { .. } => ErrorKind::Timeout,
            FetchError::LaunchFailure(_) => ErrorKind::LaunchFailure,
            FetchError::Browser(_) => ErrorKind::Browser,
            FetchError::Blocked(_) => ErrorKind::Blocked,
            FetchError::RateLimited(_) => ErrorKind::RateLimited,
            FetchError::InvalidSelector { .. } => ErrorKind::InvalidSelector,
            FetchError::InvalidUrl(_) => ErrorKind::InvalidUrl,
        }
    }

    pub(crate) fn unreachable(url: &str, status: Option<u16>, message: impl Into<String>) -> Self {
        FetchError::Unreachable {
            url: url.to_string(),
            status,
            message: message.into(),
        }
    }
}

/// A JSON-LD block that was dropped from `structured_data`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseSkipped {
    /// Position of the block among the page's JSON-LD scripts
    pub index: usize,
    pub reason: String,
}

impl ParseSkipped {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::ParseSkipped
    }
}

/// Errors raised while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid URL pattern: {0}")]
    Pattern(#[from] regex::Error),
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}
