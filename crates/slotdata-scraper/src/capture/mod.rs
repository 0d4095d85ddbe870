//! Page capture: static HTTP fetch or interactive browser rendering.
//!
//! Both produce a [`CaptureBundle`] of HTML snapshots plus any JSON bodies
//! intercepted while the page loaded.

pub mod chromium;
pub mod fetch;
pub mod interactive;

use async_trait::async_trait;
use reqwest::Url;
use slotdata_core::CaptureMode;

use crate::error::ScraperError;

pub use chromium::{find_chromium, ChromiumRenderer};
pub use fetch::StaticFetcher;
pub use interactive::{
    select_tab_candidates, CaptureTimings, InteractiveCapture, RenderSession, Renderer,
};

/// Parsed JSON response body and the URL it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonPayload {
    pub url: String,
    pub body: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct CaptureBundle {
    pub mode: CaptureMode,
    /// URL the capture was asked for.
    pub url: String,
    /// Initial snapshot first, then one per successful tab click.
    pub snapshots: Vec<String>,
    pub json_payloads: Vec<JsonPayload>,
}

impl CaptureBundle {
    /// Single-snapshot static bundle.
    #[must_use]
    pub fn from_html(url: &str, html: String) -> Self {
        Self {
            mode: CaptureMode::Static,
            url: url.to_string(),
            snapshots: vec![html],
            json_payloads: Vec::new(),
        }
    }
}

/// Anything that can turn a store URL into a capture bundle.
#[async_trait]
pub trait PageCapture: Send + Sync {
    fn mode(&self) -> CaptureMode;

    async fn capture(&self, url: &str) -> Result<CaptureBundle, ScraperError>;
}

/// `true` for responses that look like JSON data endpoints: a JSON MIME
/// type, or a URL ending in `.json` or containing `api` / `ajax`.
#[must_use]
pub fn is_json_response(url: &str, mime_type: &str) -> bool {
    let url = url.to_ascii_lowercase();
    mime_type.to_ascii_lowercase().contains("json")
        || url.ends_with(".json")
        || url.contains("ajax")
        || url.contains("api")
}

/// Scheme, host and port all match.
#[must_use]
pub fn same_origin(a: &str, b: &str) -> bool {
    match (Url::parse(a), Url::parse(b)) {
        (Ok(a), Ok(b)) => a.origin() == b.origin(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_mime_is_candidate() {
        assert!(is_json_response(
            "https://min-repo.com/x",
            "application/json; charset=utf-8"
        ));
    }

    #[test]
    fn url_patterns_are_candidates() {
        assert!(is_json_response("https://min-repo.com/data.json", "text/plain"));
        assert!(is_json_response("https://min-repo.com/wp-admin/admin-ajax.php", "text/html"));
        assert!(is_json_response("https://min-repo.com/API/machines", ""));
    }

    #[test]
    fn ordinary_assets_are_not() {
        assert!(!is_json_response("https://min-repo.com/style.css", "text/css"));
        assert!(!is_json_response("https://min-repo.com/2564229/", "text/html"));
    }

    #[test]
    fn origin_comparison() {
        assert!(same_origin(
            "https://min-repo.com/2564229/",
            "https://min-repo.com/api/x"
        ));
        assert!(!same_origin(
            "https://min-repo.com/2564229/",
            "https://ads.example.com/api/x"
        ));
        assert!(!same_origin("not a url", "https://min-repo.com/"));
    }
}
