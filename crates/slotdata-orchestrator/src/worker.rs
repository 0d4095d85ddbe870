//! Default [`StoreWorker`]: polite delay, capture, extract, persist.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use rand::Rng;
use slotdata_core::{IdentityMode, MergePolicy, SiteProfile, StoreErrorKind};
use slotdata_scraper::{
    extract_records, ExtractContext, FieldMapper, IdentityContext, PageCapture,
};

use crate::error::TaskError;
use crate::traits::{RecordSink, StoreWorker};

/// Knobs for [`ScrapeWorker`].
#[derive(Debug, Clone, Copy)]
pub struct WorkerSettings {
    pub identity_mode: IdentityMode,
    pub merge_policy: MergePolicy,
    pub upsert_batch_size: usize,
    pub polite_delay_min_ms: u64,
    pub polite_delay_max_ms: u64,
}

pub struct ScrapeWorker {
    capture: Arc<dyn PageCapture>,
    sink: Arc<dyn RecordSink>,
    profile: Arc<SiteProfile>,
    mapper: FieldMapper,
    settings: WorkerSettings,
}

impl ScrapeWorker {
    #[must_use]
    pub fn new(
        capture: Arc<dyn PageCapture>,
        sink: Arc<dyn RecordSink>,
        profile: Arc<SiteProfile>,
        settings: WorkerSettings,
    ) -> Self {
        let mapper = FieldMapper::from_profile(&profile);
        Self {
            capture,
            sink,
            profile,
            mapper,
            settings,
        }
    }

    fn polite_delay(&self) -> Duration {
        let min = self.settings.polite_delay_min_ms;
        let max = self.settings.polite_delay_max_ms.max(min);
        Duration::from_millis(rand::rng().random_range(min..=max))
    }
}

#[async_trait]
impl StoreWorker for ScrapeWorker {
    async fn scrape(
        &self,
        store_id: &str,
        date: NaiveDate,
        session_id: i64,
    ) -> Result<u64, TaskError> {
        tokio::time::sleep(self.polite_delay()).await;

        let url = self.profile.store_url(store_id);
        let bundle = self
            .capture
            .capture(&url)
            .await
            .map_err(|e| TaskError::from_scraper(&e, &url))?;

        let identity = IdentityContext::new(store_id, date, self.settings.identity_mode);
        let ctx = ExtractContext {
            mapper: &self.mapper,
            identity: &identity,
            selectors: &self.profile.selectors,
            source_url: &url,
        };
        let extraction = extract_records(&bundle, &ctx, self.settings.merge_policy);

        if extraction.records.is_empty() {
            return Err(TaskError::new(
                StoreErrorKind::NoData,
                format!(
                    "no records extracted from {} snapshot(s) and {} JSON payload(s)",
                    bundle.snapshots.len(),
                    bundle.json_payloads.len()
                ),
                &url,
            ));
        }

        let mut records = extraction.records;
        for record in &mut records {
            record.session_id = Some(session_id);
        }

        let inserted = self
            .sink
            .upsert_records(&records, self.settings.upsert_batch_size)
            .await
            .map_err(|e| TaskError::new(StoreErrorKind::Persistence, e.to_string(), &url))?;

        tracing::info!(
            store_id,
            session_id,
            source = ?extraction.source,
            extracted = records.len(),
            duplicates_dropped = extraction.duplicates_dropped,
            inserted,
            "store scraped"
        );
        Ok(inserted)
    }
}
