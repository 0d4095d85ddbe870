use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScraperError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("invalid URL \"{url}\": {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("no Chromium executable found; set SLOTDATA_CHROMIUM_PATH or install chromium")]
    BrowserNotFound,

    #[error("browser error: {0}")]
    Browser(String),

    #[error("navigation to {url} timed out after {timeout_ms}ms")]
    NavigationTimeout { url: String, timeout_ms: u64 },
}

impl From<chromiumoxide::error::CdpError> for ScraperError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        ScraperError::Browser(err.to_string())
    }
}

/// Failure confined to one HTML fragment or one strategy.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExtractError {
    #[error("invalid CSS selector \"{selector}\": {reason}")]
    InvalidSelector { selector: String, reason: String },
}
