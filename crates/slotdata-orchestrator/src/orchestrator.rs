//! One scraping session from store selection to finalization.
//!
//! The orchestrator resolves the store list, opens a session, runs one unit
//! per store on the [`TaskQueue`], and hands completion events to the
//! [`SessionAggregator`]. Per-store failures never abort the session; only
//! backend failures while opening or finalizing do, and those force the
//! session to `failed`.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use slotdata_core::{AppConfig, SeedStore, Session, SessionStatus};
use tokio::sync::{mpsc, Semaphore};

use crate::aggregator::{CompletionEvent, SessionAggregator, StoreOutcome};
use crate::error::OrchestratorError;
use crate::queue::TaskQueue;
use crate::retry::RetryPolicy;
use crate::traits::{Ledger, StoreWorker};

/// Note left in the error log for stores cut off by the session timeout.
pub const TIMED_OUT_MESSAGE: &str = "session timed out before the store finished";

#[derive(Debug, Clone, Copy)]
pub struct OrchestratorConfig {
    pub max_concurrent_stores: usize,
    pub retry: RetryPolicy,
    pub session_timeout: Duration,
}

impl OrchestratorConfig {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            max_concurrent_stores: config.max_concurrent_stores,
            retry: RetryPolicy::new(config.max_retries, config.retry_backoff_base_secs),
            session_timeout: Duration::from_secs(config.session_timeout_secs),
        }
    }

    /// Same settings, one store at a time.
    #[must_use]
    pub fn sequential(mut self) -> Self {
        self.max_concurrent_stores = 1;
        self
    }
}

/// Which stores a run covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreSelection {
    /// Exactly these ids; unknown ids are registered first.
    Explicit(Vec<String>),
    /// Every active store, seeding the store table when it is empty.
    AllActive,
}

/// Outcome of [`Orchestrator::run`].
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub session_id: i64,
    pub status: SessionStatus,
    pub total_stores: u32,
    pub successful_stores: u32,
    pub failed_stores: u32,
    pub total_records: i64,
    pub timed_out: bool,
    pub succeeded: Vec<String>,
}

pub struct Orchestrator {
    worker: Arc<dyn StoreWorker>,
    ledger: Arc<dyn Ledger>,
    config: OrchestratorConfig,
    seed_stores: Vec<SeedStore>,
}

impl Orchestrator {
    #[must_use]
    pub fn new(
        worker: Arc<dyn StoreWorker>,
        ledger: Arc<dyn Ledger>,
        config: OrchestratorConfig,
        seed_stores: Vec<SeedStore>,
    ) -> Self {
        Self {
            worker,
            ledger,
            config,
            seed_stores,
        }
    }

    /// Run one session for `date`.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError`] when the store list cannot be resolved,
    /// the session cannot be opened or finalized, or the aggregator dies.
    /// Once a session exists, any such error also forces it to `failed`.
    pub async fn run(
        &self,
        date: NaiveDate,
        selection: StoreSelection,
    ) -> Result<RunSummary, OrchestratorError> {
        let store_ids = self.resolve_stores(selection).await?;
        let total = u32::try_from(store_ids.len()).unwrap_or(u32::MAX);

        let session_id = self.ledger.open_session(date, total).await?;
        let mut session = Session::new(session_id, date, total);
        session.start()?;

        tracing::info!(
            session_id,
            %date,
            total_stores = total,
            max_concurrent = self.config.max_concurrent_stores,
            "scraping session started"
        );

        let (events_tx, events_rx) = mpsc::channel(store_ids.len().max(1));
        let aggregator = SessionAggregator::new(session.clone(), Arc::clone(&self.ledger));
        let aggregator = tokio::spawn(aggregator.run(events_rx));

        let mut queue = TaskQueue::new(self.config.max_concurrent_stores);
        for store_id in &store_ids {
            let unit = StoreUnit {
                store_id: store_id.clone(),
                date,
                session_id,
                worker: Arc::clone(&self.worker),
                ledger: Arc::clone(&self.ledger),
                permits: queue.permits(),
                retry: self.config.retry,
                events: events_tx.clone(),
            };
            queue.submit(unit.run());
        }
        drop(events_tx);

        let report = queue.join(self.config.session_timeout).await;

        let summary = match aggregator.await {
            Ok(summary) => summary,
            Err(e) => {
                let err = OrchestratorError::Aggregator(e.to_string());
                self.fail_best_effort(&mut session, &err).await;
                return Err(err);
            }
        };
        let mut session = summary.session;

        if report.timed_out {
            for store_id in store_ids.iter().filter(|id| !summary.reported.contains(*id)) {
                session.note_error(store_id, TIMED_OUT_MESSAGE);
            }
        }

        let mut finished = session.clone();
        let status = finished.finalize()?;
        if let Err(err) = self.ledger.finalize_session(&finished).await {
            self.fail_best_effort(&mut session, &err).await;
            return Err(err);
        }
        let session = finished;

        tracing::info!(
            session_id,
            %status,
            total_stores = session.total_stores,
            successful = session.successful_stores,
            failed = session.failed_stores,
            records = session.total_records,
            timed_out = report.timed_out,
            aborted = report.aborted,
            panicked = report.panicked,
            "scraping session finished"
        );

        Ok(RunSummary {
            session_id,
            status,
            total_stores: session.total_stores,
            successful_stores: session.successful_stores,
            failed_stores: session.failed_stores,
            total_records: session.total_records,
            timed_out: report.timed_out,
            succeeded: summary.succeeded,
        })
    }

    async fn resolve_stores(
        &self,
        selection: StoreSelection,
    ) -> Result<Vec<String>, OrchestratorError> {
        match selection {
            StoreSelection::Explicit(ids) => {
                let mut seen = HashSet::new();
                let mut unique = Vec::new();
                for id in ids {
                    let id = id.trim().to_string();
                    if !id.is_empty() && seen.insert(id.clone()) {
                        unique.push(id);
                    }
                }
                for id in &unique {
                    self.ledger.ensure_store(id).await?;
                }
                Ok(unique)
            }
            StoreSelection::AllActive => {
                let ids = self.ledger.active_store_ids().await?;
                if !ids.is_empty() || self.seed_stores.is_empty() {
                    return Ok(ids);
                }
                let added = self.ledger.seed_stores(&self.seed_stores).await?;
                tracing::info!(added, "store table was empty; seeded from site profile");
                self.ledger.active_store_ids().await
            }
        }
    }

    async fn fail_best_effort(&self, session: &mut Session, err: &OrchestratorError) {
        tracing::error!(session_id = session.id, error = %err, "scraping session failed");
        if let Err(e) = session.fail(err.to_string()) {
            tracing::warn!(session_id = session.id, error = %e, "session already terminal");
            return;
        }
        if let Err(e) = self.ledger.fail_session(session).await {
            tracing::warn!(
                session_id = session.id,
                error = %e,
                "failed to mark session as failed"
            );
        }
    }
}

/// Everything one store's unit needs, owned so it can be spawned.
struct StoreUnit {
    store_id: String,
    date: NaiveDate,
    session_id: i64,
    worker: Arc<dyn StoreWorker>,
    ledger: Arc<dyn Ledger>,
    permits: Arc<Semaphore>,
    retry: RetryPolicy,
    events: mpsc::Sender<CompletionEvent>,
}

impl StoreUnit {
    /// Attempt the store up to `retry.total_attempts()` times, then emit
    /// exactly one completion event. A permit is held only while an attempt
    /// runs, never during backoff.
    async fn run(self) {
        let store_id = self.store_id.as_str();
        let attempts = self.retry.total_attempts();
        let mut messages = Vec::new();

        for attempt in 0..attempts {
            let result = {
                let Ok(_permit) = self.permits.acquire().await else {
                    tracing::error!(store_id, "task queue closed; store not scraped");
                    return;
                };
                self.worker
                    .scrape(store_id, self.date, self.session_id)
                    .await
            };

            match result {
                Ok(records) => {
                    if let Err(e) = self.ledger.mark_store_success(store_id).await {
                        tracing::warn!(store_id, error = %e, "failed to record store success");
                    }
                    if attempt > 0 {
                        if let Err(e) = self
                            .ledger
                            .resolve_store_errors(self.session_id, store_id)
                            .await
                        {
                            tracing::warn!(store_id, error = %e, "failed to resolve store errors");
                        }
                    }
                    tracing::info!(store_id, attempt, records, "store finished");
                    self.emit(StoreOutcome::Succeeded { records }).await;
                    return;
                }
                Err(err) => {
                    tracing::warn!(
                        store_id,
                        session_id = self.session_id,
                        attempt,
                        kind = %err.kind,
                        error = %err.message,
                        "store attempt failed"
                    );
                    let report = err.report(store_id, attempt);
                    if let Err(e) = self.ledger.record_store_error(self.session_id, &report).await {
                        tracing::warn!(store_id, error = %e, "failed to persist store error");
                    }
                    messages.push(format!("attempt {}: {err}", attempt + 1));

                    if attempt + 1 < attempts {
                        tokio::time::sleep(self.retry.delay(attempt)).await;
                    }
                }
            }
        }

        if let Err(e) = self.ledger.mark_store_failure(store_id).await {
            tracing::warn!(store_id, error = %e, "failed to bump store failure counter");
        }
        tracing::error!(
            store_id,
            session_id = self.session_id,
            attempts,
            "store failed after all attempts"
        );
        self.emit(StoreOutcome::Failed { messages }).await;
    }

    async fn emit(&self, outcome: StoreOutcome) {
        let event = CompletionEvent {
            store_id: self.store_id.clone(),
            outcome,
        };
        if self.events.send(event).await.is_err() {
            tracing::warn!(store_id = %self.store_id, "session aggregator gone; event dropped");
        }
    }
}
