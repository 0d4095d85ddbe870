use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One machine's performance figures for a store and date.
///
/// `id` is derived from the store, date and row key (see the scraper's
/// identity module); it is unique within a write batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotRecord {
    pub id: i64,
    pub date: NaiveDate,
    pub store_id: String,
    pub machine_id: Option<String>,
    pub machine_number: Option<i64>,
    pub machine_name: Option<String>,
    pub credit_difference: Option<i64>,
    pub game_count: Option<i64>,
    pub payout_rate: Option<Decimal>,
    pub bb: Option<i64>,
    pub rb: Option<i64>,
    pub synthesis: Option<String>,
    pub bb_rate: Option<String>,
    pub rb_rate: Option<String>,
    /// Percentage, two decimal places.
    pub win_rate: Option<Decimal>,
    pub source_url: String,
    pub session_id: Option<i64>,
    /// `store_id|YYYYMMDD|unique_key`, unsalted.
    pub natural_key: String,
    pub aux: Option<serde_json::Value>,
}

impl SlotRecord {
    /// `true` when the row carries at least one identifying value.
    #[must_use]
    pub fn has_identity(&self) -> bool {
        self.machine_number.is_some()
            || self.machine_name.is_some()
            || self.credit_difference.is_some()
    }
}
