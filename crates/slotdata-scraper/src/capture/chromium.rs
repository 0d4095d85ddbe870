//! Chromium backend for [`InteractiveCapture`](super::InteractiveCapture).
//!
//! One browser process is shared; every store gets its own browser context
//! (cookies and storage isolated) which is disposed when the session closes.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams, EventResponseReceived, GetResponseBodyParams, RequestId,
    SetUserAgentOverrideParams,
};
use chromiumoxide::cdp::browser_protocol::browser::BrowserContextId;
use chromiumoxide::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams, DisposeBrowserContextParams,
};
use chromiumoxide::page::Page;
use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::interactive::{RenderSession, Renderer, ScannedElement};
use super::{is_json_response, same_origin, JsonPayload};
use crate::error::ScraperError;

/// Attribute used to tag scanned elements so they can be clicked later.
const TAB_ATTR: &str = "data-slotdata-tab";
const IDLE_POLL: Duration = Duration::from_millis(250);
const IDLE_STABLE_POLLS: u32 = 2;

/// Locate a Chrome/Chromium binary: `SLOTDATA_CHROMIUM_PATH` first, then
/// the usual names on `PATH`.
#[must_use]
pub fn find_chromium() -> Option<PathBuf> {
    if let Ok(p) = std::env::var("SLOTDATA_CHROMIUM_PATH") {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    ["google-chrome", "google-chrome-stable", "chromium", "chromium-browser"]
        .into_iter()
        .find_map(|name| which::which(name).ok())
}

pub struct ChromiumRenderer {
    browser: Arc<Browser>,
    handler: JoinHandle<()>,
    user_agent: String,
    accept_language: String,
    json_body_limit: usize,
}

impl ChromiumRenderer {
    /// Launch a Chromium process.
    ///
    /// # Errors
    ///
    /// - [`ScraperError::BrowserNotFound`] when no executable is found.
    /// - [`ScraperError::Browser`] when the config is rejected or launch fails.
    pub async fn launch(
        headless: bool,
        user_agent: &str,
        accept_language: &str,
        json_body_limit: usize,
    ) -> Result<Self, ScraperError> {
        let chrome_path = find_chromium().ok_or(ScraperError::BrowserNotFound)?;

        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-blink-features=AutomationControlled");
        if !headless {
            builder = builder.with_head();
        }
        let config = builder
            .build()
            .map_err(|e| ScraperError::Browser(format!("invalid browser config: {e}")))?;

        let (browser, mut handler) = Browser::launch(config).await?;
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!(error = %e, "chromium handler event error");
                }
            }
        });

        tracing::info!(headless, "chromium launched");
        Ok(Self {
            browser: Arc::new(browser),
            handler,
            user_agent: user_agent.to_string(),
            accept_language: accept_language.to_string(),
            json_body_limit,
        })
    }
}

impl Drop for ChromiumRenderer {
    fn drop(&mut self) {
        self.handler.abort();
    }
}

#[async_trait]
impl Renderer for ChromiumRenderer {
    async fn open(&self) -> Result<Box<dyn RenderSession>, ScraperError> {
        let created = self
            .browser
            .execute(CreateBrowserContextParams::default())
            .await?;
        let context_id = created.result.browser_context_id.clone();

        let target = CreateTargetParams::builder()
            .url("about:blank")
            .browser_context_id(context_id.clone())
            .build()
            .map_err(ScraperError::Browser)?;
        let page = match self.browser.new_page(target).await {
            Ok(page) => page,
            Err(e) => {
                dispose_context(&self.browser, context_id).await;
                return Err(e.into());
            }
        };

        match ChromiumSession::start(self, context_id.clone(), page).await {
            Ok(session) => Ok(Box::new(session)),
            Err(e) => {
                dispose_context(&self.browser, context_id).await;
                Err(e)
            }
        }
    }
}

async fn dispose_context(browser: &Browser, context_id: BrowserContextId) {
    if let Err(e) = browser
        .execute(DisposeBrowserContextParams::new(context_id))
        .await
    {
        tracing::debug!(error = %e, "failed to dispose browser context");
    }
}

/// Response seen on the network that may carry JSON data.
struct PendingResponse {
    request_id: RequestId,
    url: String,
}

struct ChromiumSession {
    browser: Arc<Browser>,
    context_id: BrowserContextId,
    page: Page,
    page_url: String,
    pending: Arc<Mutex<Vec<PendingResponse>>>,
    listener: JoinHandle<()>,
    json_body_limit: usize,
}

impl ChromiumSession {
    async fn start(
        renderer: &ChromiumRenderer,
        context_id: BrowserContextId,
        page: Page,
    ) -> Result<Self, ScraperError> {
        let user_agent = SetUserAgentOverrideParams::builder()
            .user_agent(renderer.user_agent.clone())
            .accept_language(renderer.accept_language.clone())
            .build()
            .map_err(ScraperError::Browser)?;
        page.execute(user_agent).await?;
        page.execute(EnableParams::default()).await?;
        let mut responses = page.event_listener::<EventResponseReceived>().await?;

        let pending: Arc<Mutex<Vec<PendingResponse>>> = Arc::default();
        let sink = Arc::clone(&pending);
        let listener = tokio::spawn(async move {
            while let Some(event) = responses.next().await {
                if is_json_response(&event.response.url, &event.response.mime_type) {
                    sink.lock().await.push(PendingResponse {
                        request_id: event.request_id.clone(),
                        url: event.response.url.clone(),
                    });
                }
            }
        });

        Ok(Self {
            browser: Arc::clone(&renderer.browser),
            context_id,
            page,
            page_url: String::new(),
            pending,
            listener,
            json_body_limit: renderer.json_body_limit,
        })
    }

    async fn response_body(&self, request_id: RequestId) -> Option<String> {
        let response = match self
            .page
            .execute(GetResponseBodyParams::new(request_id))
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!(error = %e, "response body unavailable");
                return None;
            }
        };
        if response.result.base64_encoded {
            let bytes = BASE64.decode(&response.result.body).ok()?;
            String::from_utf8(bytes).ok()
        } else {
            Some(response.result.body.clone())
        }
    }
}

#[async_trait]
impl RenderSession for ChromiumSession {
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), ScraperError> {
        self.page_url = url.to_string();
        match tokio::time::timeout(timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err(ScraperError::NavigationTimeout {
                url: url.to_string(),
                timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        }
    }

    async fn wait_for_idle(&mut self, timeout: Duration) {
        let deadline = Instant::now() + timeout;
        let mut last: Option<u64> = None;
        let mut stable = 0;

        while Instant::now() < deadline {
            let count = match self
                .page
                .evaluate("performance.getEntriesByType('resource').length")
                .await
            {
                Ok(result) => result.into_value::<u64>().ok(),
                Err(_) => None,
            };
            if count.is_some() && count == last {
                stable += 1;
                if stable >= IDLE_STABLE_POLLS {
                    return;
                }
            } else {
                stable = 0;
            }
            last = count;
            tokio::time::sleep(IDLE_POLL).await;
        }
    }

    async fn content(&mut self) -> Result<String, ScraperError> {
        Ok(self.page.content().await?)
    }

    async fn scan(
        &mut self,
        tags: &[String],
        keywords: &[String],
    ) -> Result<Vec<ScannedElement>, ScraperError> {
        let script = scan_script(tags, keywords)
            .map_err(|e| ScraperError::Browser(format!("scan script: {e}")))?;
        let found: Vec<(usize, String)> = self
            .page
            .evaluate(script)
            .await?
            .into_value()
            .map_err(|e| ScraperError::Browser(format!("scan result: {e}")))?;
        Ok(found
            .into_iter()
            .map(|(index, text)| ScannedElement { index, text })
            .collect())
    }

    async fn click(&mut self, index: usize, timeout: Duration) -> Result<(), ScraperError> {
        let selector = format!("[{TAB_ATTR}=\"{index}\"]");
        let native = async {
            let element = self.page.find_element(selector.as_str()).await?;
            element.scroll_into_view().await?;
            element.click().await?;
            Ok::<(), chromiumoxide::error::CdpError>(())
        };

        match tokio::time::timeout(timeout, native).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                // Overlays can intercept a pointer click; fall back to a DOM click.
                tracing::debug!(index, error = %e, "pointer click failed; trying DOM click");
                let script = format!("document.querySelector('{selector}')?.click()");
                self.page.evaluate(script).await?;
                Ok(())
            }
            Err(_) => Err(ScraperError::Browser(format!(
                "click on tab {index} timed out"
            ))),
        }
    }

    async fn take_json(&mut self) -> Vec<JsonPayload> {
        let pending = std::mem::take(&mut *self.pending.lock().await);
        let mut payloads = Vec::new();

        for response in pending {
            if !same_origin(&self.page_url, &response.url) {
                continue;
            }
            let Some(body) = self.response_body(response.request_id).await else {
                continue;
            };
            if body.is_empty() || body.len() >= self.json_body_limit {
                continue;
            }
            match serde_json::from_str(&body) {
                Ok(value) => payloads.push(JsonPayload {
                    url: response.url,
                    body: value,
                }),
                Err(e) => tracing::debug!(url = %response.url, error = %e, "not a JSON body"),
            }
        }

        payloads
    }

    async fn close(self: Box<Self>) {
        self.listener.abort();
        if let Err(e) = self.page.clone().close().await {
            tracing::debug!(error = %e, "failed to close page");
        }
        dispose_context(&self.browser, self.context_id.clone()).await;
    }
}

/// Script tagging every element matched by `tags` (in order) with a running
/// index and returning `[index, text]` for those whose text holds a keyword.
fn scan_script(tags: &[String], keywords: &[String]) -> Result<String, serde_json::Error> {
    let tags = serde_json::to_string(tags)?;
    let keywords = serde_json::to_string(keywords)?;
    Ok(format!(
        r"(() => {{
  const tags = {tags};
  const keywords = {keywords};
  const found = [];
  let idx = 0;
  for (const tag of tags) {{
    for (const el of document.querySelectorAll(tag)) {{
      el.setAttribute('{TAB_ATTR}', String(idx));
      const text = (el.innerText || '').replace(/\n/g, ' ').trim();
      if (text && keywords.some((k) => text.includes(k))) {{
        found.push([idx, text]);
      }}
      idx += 1;
    }}
  }}
  return found;
}})()"
    ))
}
