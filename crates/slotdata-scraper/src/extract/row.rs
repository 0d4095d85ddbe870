//! Accumulates canonical values for one row before it becomes a record.

use rust_decimal::Decimal;
use serde_json::{json, Map, Value};
use slotdata_core::{CanonicalField, SlotRecord};

use crate::fields::{clean_text, parse_int, parse_percent, parse_win_rate};
use crate::identity::{fallback_key, IdentityContext};

#[derive(Debug, Default, Clone)]
pub(crate) struct RowFields {
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
    pub win_rate: Option<Decimal>,
    pub wins: Option<i64>,
    pub win_total: Option<i64>,
    pub unmapped: Map<String, Value>,
}

impl RowFields {
    /// Parse `raw` according to `field`'s kind. An unparseable value never
    /// clobbers one already set from another column.
    pub fn set(&mut self, field: CanonicalField, raw: &str) {
        fn keep<T>(slot: &mut Option<T>, value: Option<T>) {
            if value.is_some() {
                *slot = value;
            }
        }

        match field {
            CanonicalField::MachineNumber => keep(&mut self.machine_number, parse_int(raw)),
            CanonicalField::MachineName => keep(&mut self.machine_name, clean_text(raw)),
            CanonicalField::CreditDifference => keep(&mut self.credit_difference, parse_int(raw)),
            CanonicalField::GameCount => keep(&mut self.game_count, parse_int(raw)),
            CanonicalField::Bb => keep(&mut self.bb, parse_int(raw)),
            CanonicalField::Rb => keep(&mut self.rb, parse_int(raw)),
            CanonicalField::Synthesis => keep(&mut self.synthesis, clean_text(raw)),
            CanonicalField::PayoutRate => keep(&mut self.payout_rate, parse_percent(raw)),
            CanonicalField::BbRate => keep(&mut self.bb_rate, clean_text(raw)),
            CanonicalField::RbRate => keep(&mut self.rb_rate, clean_text(raw)),
            CanonicalField::WinRate => {
                let rate = parse_win_rate(raw);
                keep(&mut self.win_rate, rate.percent);
                keep(&mut self.wins, rate.wins);
                keep(&mut self.win_total, rate.total);
            }
            CanonicalField::MachineId => keep(&mut self.machine_id, clean_text(raw)),
        }
    }

    pub fn set_unmapped(&mut self, key: &str, value: &str) {
        self.unmapped
            .insert(key.to_string(), Value::String(value.to_string()));
    }

    /// At least one of machine number, machine name or differential.
    pub fn has_identity(&self) -> bool {
        self.machine_number.is_some()
            || self.machine_name.is_some()
            || self.credit_difference.is_some()
    }

    /// At least one numeric column parsed.
    pub fn has_numeric_signal(&self) -> bool {
        self.machine_number.is_some()
            || self.credit_difference.is_some()
            || self.game_count.is_some()
            || self.bb.is_some()
            || self.rb.is_some()
            || self.payout_rate.is_some()
            || self.win_rate.is_some()
    }

    /// Machine number, else machine name, else a short hash of `raw_text`.
    pub fn unique_key(&self, raw_text: &str) -> String {
        self.machine_number
            .map(|n| n.to_string())
            .or_else(|| self.machine_name.clone())
            .unwrap_or_else(|| fallback_key(raw_text))
    }

    /// Auxiliary payload for DOM rows: unmapped cells plus the raw win ratio.
    pub fn dom_aux(&self) -> Option<Value> {
        let has_ratio = self.wins.is_some() || self.win_total.is_some();
        if self.unmapped.is_empty() && !has_ratio {
            return None;
        }
        let mut aux = Map::new();
        if !self.unmapped.is_empty() {
            aux.insert("unmapped".to_string(), Value::Object(self.unmapped.clone()));
        }
        if has_ratio {
            aux.insert(
                "win".to_string(),
                json!({ "wins": self.wins, "total": self.win_total }),
            );
        }
        aux.insert(
            "parsed_at".to_string(),
            Value::String(chrono::Utc::now().to_rfc3339()),
        );
        Some(Value::Object(aux))
    }

    pub fn into_record(
        self,
        identity: &IdentityContext,
        unique_key: &str,
        source_url: &str,
        aux: Option<Value>,
    ) -> SlotRecord {
        SlotRecord {
            id: identity.record_id(unique_key),
            date: identity.date(),
            store_id: identity.store_id().to_string(),
            machine_id: self.machine_id,
            machine_number: self.machine_number,
            machine_name: self.machine_name,
            credit_difference: self.credit_difference,
            game_count: self.game_count,
            payout_rate: self.payout_rate,
            bb: self.bb,
            rb: self.rb,
            synthesis: self.synthesis,
            bb_rate: self.bb_rate,
            rb_rate: self.rb_rate,
            win_rate: self.win_rate,
            source_url: source_url.to_string(),
            session_id: None,
            natural_key: identity.natural_key(unique_key),
            aux,
        }
    }
}
