use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE};
use reqwest::Client;
use slotdata_core::CaptureMode;

use super::{CaptureBundle, PageCapture};
use crate::error::ScraperError;

/// Plain HTTP fetcher; one GET, one snapshot.
#[derive(Debug, Clone)]
pub struct StaticFetcher {
    client: Client,
    accept_language: String,
}

impl StaticFetcher {
    /// Creates a fetcher with a request timeout, `User-Agent` and
    /// `Accept-Language`.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if the `reqwest::Client` cannot be built.
    pub fn new(
        timeout_secs: u64,
        user_agent: &str,
        accept_language: &str,
    ) -> Result<Self, ScraperError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;
        Ok(Self {
            client,
            accept_language: accept_language.to_string(),
        })
    }

    /// GET `url` and return the body text.
    ///
    /// # Errors
    ///
    /// - [`ScraperError::UnexpectedStatus`] for any non-2xx response.
    /// - [`ScraperError::Http`] for network, timeout or body-decoding failures.
    pub async fn fetch_html(&self, url: &str) -> Result<String, ScraperError> {
        let response = self
            .client
            .get(url)
            .header(ACCEPT, "text/html,application/xhtml+xml;q=0.9,*/*;q=0.8")
            .header(ACCEPT_LANGUAGE, &self.accept_language)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScraperError::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        Ok(response.text().await?)
    }
}

#[async_trait]
impl PageCapture for StaticFetcher {
    fn mode(&self) -> CaptureMode {
        CaptureMode::Static
    }

    async fn capture(&self, url: &str) -> Result<CaptureBundle, ScraperError> {
        let html = self.fetch_html(url).await?;
        Ok(CaptureBundle::from_html(url, html))
    }
}
