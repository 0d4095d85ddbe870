//! Collaborator seams: the orchestrator never touches the database or the
//! network directly.

use async_trait::async_trait;
use chrono::NaiveDate;
use slotdata_core::{SeedStore, Session, SlotRecord, StoreErrorReport};

use crate::error::{OrchestratorError, TaskError};

/// Scrapes and persists one store once. Returns the number of records
/// written.
#[async_trait]
pub trait StoreWorker: Send + Sync {
    async fn scrape(
        &self,
        store_id: &str,
        date: NaiveDate,
        session_id: i64,
    ) -> Result<u64, TaskError>;
}

/// Idempotent bulk writer for slot records.
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Insert in chunks of `batch_size`; ids that already exist are skipped.
    /// Returns the number of rows inserted.
    async fn upsert_records(
        &self,
        records: &[SlotRecord],
        batch_size: usize,
    ) -> Result<u64, OrchestratorError>;
}

/// Store, session and error bookkeeping.
#[async_trait]
pub trait Ledger: Send + Sync {
    async fn active_store_ids(&self) -> Result<Vec<String>, OrchestratorError>;

    /// Insert seed stores that are missing; returns how many were added.
    async fn seed_stores(&self, seeds: &[SeedStore]) -> Result<u64, OrchestratorError>;

    /// Make sure a store row exists for an explicitly requested id.
    async fn ensure_store(&self, store_id: &str) -> Result<(), OrchestratorError>;

    /// Create a session for `date` and move it to running. Returns its id.
    async fn open_session(&self, date: NaiveDate, total_stores: u32)
        -> Result<i64, OrchestratorError>;

    async fn save_progress(&self, session: &Session) -> Result<(), OrchestratorError>;

    /// Persist the terminal status and final counters.
    async fn finalize_session(&self, session: &Session) -> Result<(), OrchestratorError>;

    /// Force the session to failed with its error log.
    async fn fail_session(&self, session: &Session) -> Result<(), OrchestratorError>;

    async fn record_store_error(
        &self,
        session_id: i64,
        report: &StoreErrorReport,
    ) -> Result<(), OrchestratorError>;

    /// Mark the store's earlier error rows in `session_id` as resolved.
    /// Returns how many rows changed.
    async fn resolve_store_errors(
        &self,
        session_id: i64,
        store_id: &str,
    ) -> Result<u64, OrchestratorError>;

    async fn mark_store_success(&self, store_id: &str) -> Result<(), OrchestratorError>;

    async fn mark_store_failure(&self, store_id: &str) -> Result<(), OrchestratorError>;
}
