use slotdata_core::{CoreError, StoreErrorKind, StoreErrorReport};
use slotdata_scraper::ScraperError;
use thiserror::Error;

/// Failure of one attempt for one store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct TaskError {
    pub kind: StoreErrorKind,
    pub message: String,
    /// Page the attempt was working on; empty when unknown.
    pub url: String,
}

impl TaskError {
    #[must_use]
    pub fn new(kind: StoreErrorKind, message: impl Into<String>, url: &str) -> Self {
        Self {
            kind,
            message: message.into(),
            url: url.to_string(),
        }
    }

    /// Classify a capture failure.
    #[must_use]
    pub fn from_scraper(err: &ScraperError, url: &str) -> Self {
        let kind = match err {
            ScraperError::NavigationTimeout { .. } => StoreErrorKind::Timeout,
            ScraperError::BrowserNotFound | ScraperError::Browser(_) => StoreErrorKind::Render,
            ScraperError::Http(_)
            | ScraperError::UnexpectedStatus { .. }
            | ScraperError::InvalidUrl { .. } => StoreErrorKind::Fetch,
        };
        Self::new(kind, err.to_string(), url)
    }

    /// Error row for attempt number `attempt` (zero-based).
    #[must_use]
    pub fn report(&self, store_id: &str, attempt: u32) -> StoreErrorReport {
        StoreErrorReport {
            store_id: store_id.to_string(),
            kind: self.kind,
            message: self.message.clone(),
            url: self.url.clone(),
            retry_count: attempt,
        }
    }
}

/// Session-level failure; the session is forced to `failed`.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error(transparent)]
    Session(#[from] CoreError),

    #[error("session aggregator stopped: {0}")]
    Aggregator(String),
}

impl OrchestratorError {
    pub fn backend(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Backend(Box::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scraper_errors_are_classified() {
        let timeout = ScraperError::NavigationTimeout {
            url: "https://min-repo.com/1/".to_string(),
            timeout_ms: 60_000,
        };
        assert_eq!(
            TaskError::from_scraper(&timeout, "u").kind,
            StoreErrorKind::Timeout
        );
        assert_eq!(
            TaskError::from_scraper(&ScraperError::Browser("crash".into()), "u").kind,
            StoreErrorKind::Render
        );
        let status = ScraperError::UnexpectedStatus {
            status: 503,
            url: "u".to_string(),
        };
        let err = TaskError::from_scraper(&status, "https://min-repo.com/1/");
        assert_eq!(err.kind, StoreErrorKind::Fetch);
        assert_eq!(err.url, "https://min-repo.com/1/");
    }

    #[test]
    fn report_carries_attempt_number() {
        let err = TaskError::new(StoreErrorKind::NoData, "no rows", "https://min-repo.com/1/");
        let report = err.report("1", 2);
        assert_eq!(report.retry_count, 2);
        assert_eq!(report.kind, StoreErrorKind::NoData);
        assert_eq!(err.to_string(), "no_data: no rows");
    }
}
