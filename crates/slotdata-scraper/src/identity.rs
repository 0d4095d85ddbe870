//! Record id derivation and intra-batch deduplication.
//!
//! An id is the first 15 hex digits of
//! `SHA-256("{store}_{YYYYMMDD}_{key}[_{nonce}]")`, which always fits in a
//! non-negative `i64`. In run-scoped mode the nonce is taken once per
//! extraction pass, so equal keys inside a pass collide (and dedupe) while a
//! re-scrape of the same day produces fresh ids.

use std::collections::HashMap;

use chrono::{NaiveDate, Utc};
use sha2::{Digest, Sha256};
use slotdata_core::{IdentityMode, SlotRecord};

#[derive(Debug, Clone)]
pub struct IdentityContext {
    store_id: String,
    date: NaiveDate,
    nonce: Option<i64>,
}

impl IdentityContext {
    /// Context for one extraction pass; captures the nonce now.
    #[must_use]
    pub fn new(store_id: &str, date: NaiveDate, mode: IdentityMode) -> Self {
        let nonce = match mode {
            IdentityMode::RunScoped => Some(
                Utc::now()
                    .timestamp_nanos_opt()
                    .unwrap_or_else(|| Utc::now().timestamp_micros()),
            ),
            IdentityMode::Stable => None,
        };
        Self::with_nonce(store_id, date, nonce)
    }

    #[must_use]
    pub fn with_nonce(store_id: &str, date: NaiveDate, nonce: Option<i64>) -> Self {
        Self {
            store_id: store_id.to_string(),
            date,
            nonce,
        }
    }

    #[must_use]
    pub fn store_id(&self) -> &str {
        &self.store_id
    }

    #[must_use]
    pub fn date(&self) -> NaiveDate {
        self.date
    }

    /// Unsalted `store|YYYYMMDD|key`, kept on the record for diagnostics.
    #[must_use]
    pub fn natural_key(&self, unique_key: &str) -> String {
        format!(
            "{}|{}|{}",
            self.store_id,
            self.date.format("%Y%m%d"),
            unique_key
        )
    }

    #[must_use]
    pub fn record_id(&self, unique_key: &str) -> i64 {
        let date = self.date.format("%Y%m%d");
        let raw = match self.nonce {
            Some(nonce) => format!("{}_{date}_{unique_key}_{nonce}", self.store_id),
            None => format!("{}_{date}_{unique_key}", self.store_id),
        };
        let digest = Sha256::digest(raw.as_bytes());
        let mut head = [0u8; 8];
        head.copy_from_slice(&digest[..8]);
        // 64 bits >> 4 keeps the first 15 hex digits: always < 2^60.
        let value = u64::from_be_bytes(head) >> 4;
        i64::try_from(value).unwrap_or(i64::MAX)
    }
}

/// Bounded (24-bit) key for rows with no machine number or name.
#[must_use]
pub fn fallback_key(raw_text: &str) -> String {
    let digest = Sha256::digest(raw_text.as_bytes());
    let value = (u32::from(digest[0]) << 16) | (u32::from(digest[1]) << 8) | u32::from(digest[2]);
    value.to_string()
}

/// Drop records whose id repeats. The last occurrence wins, placed where
/// the id was first seen.
#[must_use]
pub fn dedup_records(records: Vec<SlotRecord>) -> Vec<SlotRecord> {
    let mut positions: HashMap<i64, usize> = HashMap::with_capacity(records.len());
    let mut out: Vec<SlotRecord> = Vec::with_capacity(records.len());

    for record in records {
        if let Some(&idx) = positions.get(&record.id) {
            out[idx] = record;
        } else {
            positions.insert(record.id, out.len());
            out.push(record);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 1).unwrap()
    }

    fn record(id: i64, credit: i64) -> SlotRecord {
        SlotRecord {
            id,
            date: date(),
            store_id: "2564229".to_string(),
            machine_id: None,
            machine_number: Some(id),
            machine_name: None,
            credit_difference: Some(credit),
            game_count: None,
            payout_rate: None,
            bb: None,
            rb: None,
            synthesis: None,
            bb_rate: None,
            rb_rate: None,
            win_rate: None,
            source_url: "https://min-repo.com/2564229/".to_string(),
            session_id: None,
            natural_key: String::new(),
            aux: None,
        }
    }

    #[test]
    fn same_key_same_pass_collides() {
        let ctx = IdentityContext::with_nonce("2564229", date(), Some(42));
        assert_eq!(ctx.record_id("101"), ctx.record_id("101"));
        assert_ne!(ctx.record_id("101"), ctx.record_id("102"));
    }

    #[test]
    fn different_nonce_changes_id() {
        let a = IdentityContext::with_nonce("2564229", date(), Some(1));
        let b = IdentityContext::with_nonce("2564229", date(), Some(2));
        assert_ne!(a.record_id("101"), b.record_id("101"));
    }

    #[test]
    fn stable_mode_is_reproducible() {
        let a = IdentityContext::new("2564229", date(), IdentityMode::Stable);
        let b = IdentityContext::new("2564229", date(), IdentityMode::Stable);
        assert_eq!(a.record_id("101"), b.record_id("101"));
    }

    #[test]
    fn ids_are_non_negative_and_60_bit() {
        let ctx = IdentityContext::with_nonce("2583253", date(), Some(7));
        for key in ["1", "2", "ジャグラー", "9999999"] {
            let id = ctx.record_id(key);
            assert!(id >= 0);
            assert!(id < (1i64 << 60));
        }
    }

    #[test]
    fn natural_key_format() {
        let ctx = IdentityContext::with_nonce("2564229", date(), Some(7));
        assert_eq!(ctx.natural_key("101"), "2564229|20250301|101");
    }

    #[test]
    fn fallback_key_is_24_bit() {
        let key: u32 = fallback_key("row text").parse().unwrap();
        assert!(key <= 0x00FF_FFFF);
        assert_eq!(fallback_key("row text"), fallback_key("row text"));
    }

    #[test]
    fn dedup_drops_exactly_the_duplicates() {
        let rows = vec![record(1, 10), record(2, 20), record(1, 30), record(3, 40)];
        let deduped = dedup_records(rows);
        assert_eq!(deduped.len(), 3);
        let ids: Vec<i64> = deduped.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        // last occurrence wins
        assert_eq!(deduped[0].credit_difference, Some(30));
    }
}
