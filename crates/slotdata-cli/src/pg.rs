//! Postgres-backed implementations of the orchestrator's collaborator traits.

use async_trait::async_trait;
use chrono::NaiveDate;
use slotdata_core::{SeedStore, Session, SlotRecord, StoreErrorReport};
use slotdata_db::SessionProgress;
use slotdata_orchestrator::{Ledger, OrchestratorError, RecordSink};
use sqlx::PgPool;

#[derive(Debug, Clone)]
pub(crate) struct PgLedger {
    pool: PgPool,
}

impl PgLedger {
    pub(crate) fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Ledger for PgLedger {
    async fn active_store_ids(&self) -> Result<Vec<String>, OrchestratorError> {
        slotdata_db::list_active_store_ids(&self.pool)
            .await
            .map_err(OrchestratorError::backend)
    }

    async fn seed_stores(&self, seeds: &[SeedStore]) -> Result<u64, OrchestratorError> {
        slotdata_db::seed_stores(&self.pool, seeds)
            .await
            .map_err(OrchestratorError::backend)
    }

    async fn ensure_store(&self, store_id: &str) -> Result<(), OrchestratorError> {
        slotdata_db::get_or_create_store(&self.pool, store_id)
            .await
            .map(|_| ())
            .map_err(OrchestratorError::backend)
    }

    async fn open_session(
        &self,
        date: NaiveDate,
        total_stores: u32,
    ) -> Result<i64, OrchestratorError> {
        let row = slotdata_db::create_session(&self.pool, date, total_stores)
            .await
            .map_err(OrchestratorError::backend)?;
        slotdata_db::start_session(&self.pool, row.id)
            .await
            .map_err(OrchestratorError::backend)?;
        Ok(row.id)
    }

    async fn save_progress(&self, session: &Session) -> Result<(), OrchestratorError> {
        slotdata_db::update_session_progress(
            &self.pool,
            session.id,
            &SessionProgress::from_session(session),
        )
        .await
        .map_err(OrchestratorError::backend)
    }

    async fn finalize_session(&self, session: &Session) -> Result<(), OrchestratorError> {
        slotdata_db::finalize_session(
            &self.pool,
            session.id,
            session.status,
            &SessionProgress::from_session(session),
        )
        .await
        .map_err(OrchestratorError::backend)
    }

    async fn fail_session(&self, session: &Session) -> Result<(), OrchestratorError> {
        slotdata_db::fail_session(&self.pool, session.id, &session.error_log_json())
            .await
            .map_err(OrchestratorError::backend)
    }

    async fn record_store_error(
        &self,
        session_id: i64,
        report: &StoreErrorReport,
    ) -> Result<(), OrchestratorError> {
        slotdata_db::insert_store_error(&self.pool, session_id, report)
            .await
            .map(|_| ())
            .map_err(OrchestratorError::backend)
    }

    async fn resolve_store_errors(
        &self,
        session_id: i64,
        store_id: &str,
    ) -> Result<u64, OrchestratorError> {
        slotdata_db::resolve_store_errors(&self.pool, session_id, store_id)
            .await
            .map_err(OrchestratorError::backend)
    }

    async fn mark_store_success(&self, store_id: &str) -> Result<(), OrchestratorError> {
        slotdata_db::mark_store_success(&self.pool, store_id)
            .await
            .map_err(OrchestratorError::backend)
    }

    async fn mark_store_failure(&self, store_id: &str) -> Result<(), OrchestratorError> {
        slotdata_db::increment_store_failures(&self.pool, store_id)
            .await
            .map_err(OrchestratorError::backend)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct PgRecordSink {
    pool: PgPool,
}

impl PgRecordSink {
    pub(crate) fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordSink for PgRecordSink {
    async fn upsert_records(
        &self,
        records: &[SlotRecord],
        batch_size: usize,
    ) -> Result<u64, OrchestratorError> {
        slotdata_db::upsert_slot_records(&self.pool, records, batch_size)
            .await
            .map_err(OrchestratorError::backend)
    }
}
