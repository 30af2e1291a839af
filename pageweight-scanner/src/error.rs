use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Failed to fetch {url}: {errors}")]
    FetchFailed { url: String, errors: String },

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Unexpected status {status} for {url}")]
    Status { status: u16, url: String },

    #[error("Relay response error: {0}")]
    Relay(String),

    #[error("No usable relay configured")]
    NoRelays,

    #[error("Analysis of {0} interrupted")]
    Interrupted(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ScanError {
    /// True for relay responses asking us to slow down (HTTP 429).
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ScanError::Status { status: 429, .. })
    }
}

pub type Result<T> = std::result::Result<T, ScanError>;
