//! Store id discovery from a prefecture's category listing.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use reqwest::Url;
use scraper::Html;
use slotdata_core::SiteProfile;

use crate::capture::StaticFetcher;
use crate::error::ScraperError;
use crate::extract::selector;

static STORE_PATH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/(\d+)/?$").expect("valid regex"));

/// Numeric store ids linked from `html`, in first-seen order. Links are
/// resolved against `page_url` and only same-origin store paths count.
#[must_use]
pub fn store_ids_from_html(html: &str, page_url: &str) -> Vec<String> {
    let (Ok(page), Ok(links)) = (Url::parse(page_url), selector("a[href]")) else {
        return Vec::new();
    };

    let document = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut ids = Vec::new();

    for href in document.select(&links).filter_map(|a| a.value().attr("href")) {
        let Ok(url) = page.join(href.trim()) else {
            continue;
        };
        if url.origin() != page.origin() {
            continue;
        }
        let Some(id) = STORE_PATH_RE
            .captures(url.path())
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
        else {
            continue;
        };
        if seen.insert(id.clone()) {
            ids.push(id);
        }
    }

    ids
}

/// Fetch the category page for `prefecture` and list its store ids.
///
/// # Errors
///
/// Returns [`ScraperError`] when the listing page cannot be fetched.
pub async fn discover_store_ids(
    fetcher: &StaticFetcher,
    profile: &SiteProfile,
    prefecture: &str,
) -> Result<Vec<String>, ScraperError> {
    let url = profile.category_url(prefecture);
    let html = fetcher.fetch_html(&url).await?;
    let ids = store_ids_from_html(&html, &url);
    tracing::info!(prefecture, url = %url, count = ids.len(), "discovered store ids");
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = "https://min-repo.com/category/tokyo/";

    #[test]
    fn collects_store_links_in_order() {
        let html = r#"
            <a href="https://min-repo.com/2564229/">A</a>
            <a href="/2583253/">B</a>
            <a href="https://min-repo.com/2564229/">A again</a>
            <a href="https://min-repo.com/category/osaka/">category</a>
            <a href="https://other.example.com/1234/">offsite</a>
            <a href="https://min-repo.com/2564229/page/2/">nested</a>
        "#;
        assert_eq!(store_ids_from_html(html, PAGE), vec!["2564229", "2583253"]);
    }

    #[test]
    fn empty_page_has_no_ids() {
        assert!(store_ids_from_html("<p>none</p>", PAGE).is_empty());
        assert!(store_ids_from_html("<a href='/1/'>x</a>", "not a url").is_empty());
    }
}
