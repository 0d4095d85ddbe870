//! Scrape, retry and inspection command handlers.

use std::sync::Arc;

use chrono::NaiveDate;
use slotdata_core::{AppConfig, CaptureMode, SiteProfile};
use slotdata_orchestrator::{
    Orchestrator, OrchestratorConfig, RunSummary, ScrapeWorker, StoreSelection, WorkerSettings,
};
use slotdata_scraper::{
    extract_records, summarize_tables, CaptureTimings, ChromiumRenderer, ExtractContext,
    FieldMapper, IdentityContext, InteractiveCapture, PageCapture, StaticFetcher,
};
use sqlx::PgPool;

use crate::pg::{PgLedger, PgRecordSink};

/// Which earlier session `retry-failed` works from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RetryTarget {
    Session(i64),
    LatestFor(NaiveDate),
}

/// Build the page capture selected by `SLOTDATA_CAPTURE_MODE`.
///
/// # Errors
///
/// Returns an error if the HTTP client cannot be built or no browser can be
/// launched.
pub(crate) async fn build_capture(
    config: &AppConfig,
    profile: &SiteProfile,
) -> anyhow::Result<Arc<dyn PageCapture>> {
    match config.capture_mode {
        CaptureMode::Static => {
            let fetcher = StaticFetcher::new(
                config.request_timeout_secs,
                &config.user_agent,
                &config.accept_language,
            )
            .map_err(|e| anyhow::anyhow!("failed to build HTTP client: {e}"))?;
            Ok(Arc::new(fetcher))
        }
        CaptureMode::Interactive => {
            let renderer = ChromiumRenderer::launch(
                config.browser_headless,
                &config.user_agent,
                &config.accept_language,
                config.json_body_limit_bytes,
            )
            .await
            .map_err(|e| anyhow::anyhow!("failed to launch browser: {e}"))?;
            Ok(Arc::new(InteractiveCapture::new(
                Arc::new(renderer),
                profile.selectors.tab_candidates.clone(),
                profile.tab_keywords.clone(),
                config.max_tab_clicks,
                CaptureTimings::default(),
            )))
        }
    }
}

pub(crate) fn worker_settings(config: &AppConfig) -> WorkerSettings {
    WorkerSettings {
        identity_mode: config.identity_mode,
        merge_policy: config.merge_policy,
        upsert_batch_size: config.upsert_batch_size,
        polite_delay_min_ms: config.polite_delay_min_ms,
        polite_delay_max_ms: config.polite_delay_max_ms,
    }
}

async fn build_orchestrator(
    pool: &PgPool,
    config: &AppConfig,
    profile: &SiteProfile,
    sync: bool,
) -> anyhow::Result<Orchestrator> {
    let capture = build_capture(config, profile).await?;
    let worker = ScrapeWorker::new(
        capture,
        Arc::new(PgRecordSink::new(pool.clone())),
        Arc::new(profile.clone()),
        worker_settings(config),
    );

    let mut orchestrator_config = OrchestratorConfig::from_app_config(config);
    if sync {
        orchestrator_config = orchestrator_config.sequential();
    }

    Ok(Orchestrator::new(
        Arc::new(worker),
        Arc::new(PgLedger::new(pool.clone())),
        orchestrator_config,
        profile.seed_stores.clone(),
    ))
}

/// Scrape `stores` (or every active store) for `date`.
///
/// # Errors
///
/// Returns an error if capture setup fails or the session cannot be opened
/// or finalized. Per-store failures are recorded on the session instead.
pub(crate) async fn run_scrape(
    pool: &PgPool,
    config: &AppConfig,
    profile: &SiteProfile,
    date: NaiveDate,
    stores: Vec<String>,
    sync: bool,
) -> anyhow::Result<()> {
    let selection = if stores.is_empty() {
        StoreSelection::AllActive
    } else {
        StoreSelection::Explicit(stores)
    };

    let orchestrator = build_orchestrator(pool, config, profile, sync).await?;
    let summary = orchestrator.run(date, selection).await?;
    print_summary(&summary);
    Ok(())
}

/// Re-scrape the stores with unresolved errors in an earlier session and
/// resolve those errors for every store that now succeeds.
///
/// # Errors
///
/// Returns an error if the earlier session cannot be found or the new
/// session fails as a whole.
pub(crate) async fn run_retry_failed(
    pool: &PgPool,
    config: &AppConfig,
    profile: &SiteProfile,
    target: RetryTarget,
    sync: bool,
) -> anyhow::Result<()> {
    let previous = match target {
        RetryTarget::Session(id) => slotdata_db::get_session(pool, id).await?,
        RetryTarget::LatestFor(date) => slotdata_db::latest_session_for_date(pool, date)
            .await?
            .ok_or_else(|| anyhow::anyhow!("no scraping session found for {date}"))?,
    };

    let store_ids = slotdata_db::failed_store_ids_for_session(pool, previous.id).await?;
    if store_ids.is_empty() {
        println!("session {} has no unresolved store errors", previous.id);
        return Ok(());
    }

    tracing::info!(
        previous_session = previous.id,
        date = %previous.date,
        stores = store_ids.len(),
        "retrying failed stores"
    );

    let orchestrator = build_orchestrator(pool, config, profile, sync).await?;
    let summary = orchestrator
        .run(previous.date, StoreSelection::Explicit(store_ids))
        .await?;

    for store_id in &summary.succeeded {
        match slotdata_db::resolve_store_errors(pool, previous.id, store_id).await {
            Ok(resolved) => tracing::debug!(store_id, resolved, "store errors resolved"),
            Err(e) => tracing::warn!(store_id, error = %e, "failed to resolve store errors"),
        }
    }

    print_summary(&summary);
    Ok(())
}

/// Capture one store and print what extraction finds. Nothing is persisted.
///
/// # Errors
///
/// Returns an error if capture setup or the capture itself fails.
pub(crate) async fn run_debug_store(
    config: &AppConfig,
    profile: &SiteProfile,
    store_id: &str,
    date: NaiveDate,
) -> anyhow::Result<()> {
    let capture = build_capture(config, profile).await?;
    let url = profile.store_url(store_id);
    let bundle = capture.capture(&url).await?;

    println!(
        "{url}: {} snapshot(s), {} JSON payload(s) [{}]",
        bundle.snapshots.len(),
        bundle.json_payloads.len(),
        bundle.mode
    );
    for (idx, html) in bundle.snapshots.iter().enumerate() {
        let tables = summarize_tables(html)?;
        println!("snapshot {idx}: {} bytes, {} table(s)", html.len(), tables.len());
        for table in &tables {
            println!("  {} row(s): {}", table.rows, table.headers.join(" | "));
        }
    }
    for payload in &bundle.json_payloads {
        println!("json: {}", payload.url);
    }

    let mapper = FieldMapper::from_profile(profile);
    let identity = IdentityContext::new(store_id, date, config.identity_mode);
    let ctx = ExtractContext {
        mapper: &mapper,
        identity: &identity,
        selectors: &profile.selectors,
        source_url: &url,
    };
    let extraction = extract_records(&bundle, &ctx, config.merge_policy);

    println!(
        "extracted {} record(s) from {:?} ({} duplicate(s) dropped)",
        extraction.records.len(),
        extraction.source,
        extraction.duplicates_dropped
    );
    for record in &extraction.records {
        println!(
            "{:>6}  {:<28}  {:>8}  {:>7}  {:>6}",
            fmt_opt(record.machine_number),
            record.machine_name.as_deref().unwrap_or("-"),
            fmt_opt(record.credit_difference),
            fmt_opt(record.game_count),
            fmt_opt(record.payout_rate),
        );
    }

    Ok(())
}

fn fmt_opt<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

fn print_summary(summary: &RunSummary) {
    println!(
        "session {}: {} ({}/{} stores ok, {} failed, {} records{})",
        summary.session_id,
        summary.status,
        summary.successful_stores,
        summary.total_stores,
        summary.failed_stores,
        summary.total_records,
        if summary.timed_out { ", timed out" } else { "" }
    );
}
