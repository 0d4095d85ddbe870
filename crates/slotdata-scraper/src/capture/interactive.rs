//! Interactive capture policy over a pluggable browser backend.
//!
//! The policy is: navigate (a timeout is not fatal), wait for the network to
//! settle, snapshot, then click up to N keyword-bearing tab controls and
//! snapshot after each. Click failures are skipped. The browser context is
//! opened for one store and closed before returning, whatever the outcome.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use slotdata_core::CaptureMode;

use super::{CaptureBundle, JsonPayload, PageCapture};
use crate::error::ScraperError;

/// One element found while scanning for tab controls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedElement {
    /// Handle the session can click by.
    pub index: usize,
    pub text: String,
}

/// Browser backend able to open isolated sessions.
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn open(&self) -> Result<Box<dyn RenderSession>, ScraperError>;
}

/// One isolated, stateful browser context bound to a single store.
#[async_trait]
pub trait RenderSession: Send {
    /// Load `url`. Returns [`ScraperError::NavigationTimeout`] when the load
    /// does not finish in time; the page stays usable.
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), ScraperError>;

    /// Wait until network activity settles or `timeout` elapses.
    async fn wait_for_idle(&mut self, timeout: Duration);

    async fn content(&mut self) -> Result<String, ScraperError>;

    /// Elements matched by each tag selector (in selector order) whose
    /// visible text contains one of `keywords`.
    async fn scan(
        &mut self,
        tags: &[String],
        keywords: &[String],
    ) -> Result<Vec<ScannedElement>, ScraperError>;

    async fn click(&mut self, index: usize, timeout: Duration) -> Result<(), ScraperError>;

    /// JSON bodies intercepted so far; drains the buffer.
    async fn take_json(&mut self) -> Vec<JsonPayload>;

    async fn close(self: Box<Self>);
}

/// Waits applied during an interactive capture.
#[derive(Debug, Clone, Copy)]
pub struct CaptureTimings {
    pub navigation: Duration,
    pub initial_idle: Duration,
    pub initial_grace: Duration,
    pub click: Duration,
    pub click_idle: Duration,
    pub click_pause: Duration,
}

impl Default for CaptureTimings {
    fn default() -> Self {
        Self {
            navigation: Duration::from_secs(60),
            initial_idle: Duration::from_secs(10),
            initial_grace: Duration::from_millis(1_200),
            click: Duration::from_secs(5),
            click_idle: Duration::from_secs(6),
            click_pause: Duration::from_millis(800),
        }
    }
}

impl CaptureTimings {
    /// No waiting at all; for tests with scripted sessions.
    #[must_use]
    pub fn immediate() -> Self {
        Self {
            navigation: Duration::from_secs(1),
            initial_idle: Duration::ZERO,
            initial_grace: Duration::ZERO,
            click: Duration::from_secs(1),
            click_idle: Duration::ZERO,
            click_pause: Duration::ZERO,
        }
    }
}

/// Pick tab controls to click: newline-collapsed text, keyword match,
/// deduplicated by text, at most `max` in scan order.
#[must_use]
pub fn select_tab_candidates(
    scanned: &[ScannedElement],
    keywords: &[String],
    max: usize,
) -> Vec<usize> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut picked = Vec::new();

    for element in scanned {
        if picked.len() >= max {
            break;
        }
        let text = element.text.split_whitespace().collect::<Vec<_>>().join(" ");
        if text.is_empty() || seen.contains(&text) {
            continue;
        }
        if keywords.iter().any(|k| text.contains(k.as_str())) {
            seen.insert(text);
            picked.push(element.index);
        }
    }

    picked
}

pub struct InteractiveCapture {
    renderer: Arc<dyn Renderer>,
    tab_selectors: Vec<String>,
    tab_keywords: Vec<String>,
    max_tab_clicks: usize,
    timings: CaptureTimings,
}

impl InteractiveCapture {
    #[must_use]
    pub fn new(
        renderer: Arc<dyn Renderer>,
        tab_selectors: Vec<String>,
        tab_keywords: Vec<String>,
        max_tab_clicks: usize,
        timings: CaptureTimings,
    ) -> Self {
        Self {
            renderer,
            tab_selectors,
            tab_keywords,
            max_tab_clicks,
            timings,
        }
    }

    async fn drive(
        &self,
        session: &mut dyn RenderSession,
        url: &str,
    ) -> Result<CaptureBundle, ScraperError> {
        let t = self.timings;

        match session.navigate(url, t.navigation).await {
            Ok(()) => {}
            Err(ScraperError::NavigationTimeout { timeout_ms, .. }) => {
                tracing::warn!(url, timeout_ms, "navigation timed out; continuing with current DOM");
            }
            Err(e) => return Err(e),
        }

        session.wait_for_idle(t.initial_idle).await;
        tokio::time::sleep(t.initial_grace).await;

        let mut snapshots = Vec::new();
        match session.content().await {
            Ok(html) => snapshots.push(html),
            Err(e) => tracing::warn!(url, error = %e, "initial snapshot failed"),
        }

        let scanned = match session.scan(&self.tab_selectors, &self.tab_keywords).await {
            Ok(found) => found,
            Err(e) => {
                tracing::debug!(url, error = %e, "tab scan failed; no tabs clicked");
                Vec::new()
            }
        };

        let candidates = select_tab_candidates(&scanned, &self.tab_keywords, self.max_tab_clicks);
        for index in candidates {
            if let Err(e) = session.click(index, t.click).await {
                tracing::debug!(url, index, error = %e, "tab click failed; skipping");
                continue;
            }
            session.wait_for_idle(t.click_idle).await;
            tokio::time::sleep(t.click_pause).await;
            match session.content().await {
                Ok(html) => snapshots.push(html),
                Err(e) => tracing::debug!(url, index, error = %e, "post-click snapshot failed"),
            }
        }

        let json_payloads = session.take_json().await;
        tracing::debug!(
            url,
            snapshots = snapshots.len(),
            json_payloads = json_payloads.len(),
            "interactive capture finished"
        );

        Ok(CaptureBundle {
            mode: CaptureMode::Interactive,
            url: url.to_string(),
            snapshots,
            json_payloads,
        })
    }
}

#[async_trait]
impl PageCapture for InteractiveCapture {
    fn mode(&self) -> CaptureMode {
        CaptureMode::Interactive
    }

    async fn capture(&self, url: &str) -> Result<CaptureBundle, ScraperError> {
        let mut session = self.renderer.open().await?;
        let result = self.drive(session.as_mut(), url).await;
        session.close().await;
        result
    }
}
