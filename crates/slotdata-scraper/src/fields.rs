//! Header/key → canonical field translation and value cleanup.
//!
//! Table headers are matched exactly after trimming; JSON keys and `data-*`
//! attribute names are matched lowercased. Numeric parsers return `None` for
//! anything they cannot read rather than failing the row.

use std::collections::HashMap;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde_json::{Map, Value};
use slotdata_core::{CanonicalField, SiteProfile};

/// Unit suffixes stripped before integer parsing.
const UNIT_CHARS: [char; 3] = ['枚', '回', '円'];

#[derive(Debug, Clone)]
pub struct FieldMapper {
    headers: HashMap<String, CanonicalField>,
    json_keys: Vec<(CanonicalField, Vec<String>)>,
    attr_names: HashMap<String, CanonicalField>,
}

impl FieldMapper {
    #[must_use]
    pub fn from_profile(profile: &SiteProfile) -> Self {
        let mut headers = HashMap::new();
        let mut json_keys = Vec::new();
        let mut attr_names = HashMap::new();

        for (field, synonyms) in &profile.fields {
            for header in &synonyms.headers {
                headers.insert(header.trim().to_string(), *field);
            }
            let keys: Vec<String> = synonyms
                .json_keys
                .iter()
                .map(|k| k.to_lowercase())
                .collect();
            for key in &keys {
                attr_names.entry(key.replace('-', "_")).or_insert(*field);
            }
            attr_names.insert(field.as_str().to_string(), *field);
            json_keys.push((*field, keys));
        }

        Self {
            headers,
            json_keys,
            attr_names,
        }
    }

    /// Field for a table header or free-text label, if mapped.
    #[must_use]
    pub fn field_for_header(&self, header: &str) -> Option<CanonicalField> {
        self.headers.get(header.trim()).copied()
    }

    /// Field for a `data-*` attribute name, with the `data-` prefix already
    /// removed. Dashes are treated as underscores.
    #[must_use]
    pub fn field_for_attr(&self, name: &str) -> Option<CanonicalField> {
        let key = name.to_lowercase().replace('-', "_");
        self.attr_names
            .get(&key)
            .copied()
            .or_else(|| self.field_for_header(name))
    }

    /// First value in `item` whose (lowercased) key is a synonym for `field`.
    #[must_use]
    pub fn json_value<'a>(
        &self,
        field: CanonicalField,
        item: &'a HashMap<String, &'a Value>,
    ) -> Option<&'a Value> {
        let (_, keys) = self.json_keys.iter().find(|(f, _)| *f == field)?;
        keys.iter().find_map(|k| item.get(k).copied())
    }

    /// Lowercase-keyed view of a JSON object.
    #[must_use]
    pub fn lowercase_keys(object: &Map<String, Value>) -> HashMap<String, &Value> {
        object.iter().map(|(k, v)| (k.to_lowercase(), v)).collect()
    }
}

/// Parse an integer the way site cells are written: `1,234枚`, `+42`, `-500`,
/// `1234G`, `12.7` (truncates to 12). `-`, empty, `null` and `none` are absent.
#[must_use]
pub fn parse_int(raw: &str) -> Option<i64> {
    let mut s: String = raw
        .trim()
        .chars()
        .filter(|c| *c != ',' && !UNIT_CHARS.contains(c))
        .collect();
    if s.ends_with('G') || s.ends_with('g') {
        s.pop();
    }
    let s = s.trim();
    let s = s.strip_prefix('+').unwrap_or(s);
    if is_absent(s) {
        return None;
    }

    let value = s.parse::<f64>().ok()?;
    if !value.is_finite() {
        return None;
    }
    let truncated = value.trunc();
    #[allow(clippy::cast_precision_loss)]
    let in_range = truncated >= i64::MIN as f64 && truncated <= i64::MAX as f64;
    if !in_range {
        return None;
    }
    #[allow(clippy::cast_possible_truncation)]
    Some(truncated as i64)
}

/// Parse a percentage cell (`98.5%`, `1,002.3`) into a decimal.
#[must_use]
pub fn parse_percent(raw: &str) -> Option<Decimal> {
    let s: String = raw
        .trim()
        .chars()
        .filter(|c| *c != '%' && *c != ',')
        .collect();
    let s = s.trim();
    if is_absent(s) {
        return None;
    }
    Decimal::from_str(s).ok()
}

/// Parsed `wins/total` or `NN%` cell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WinRate {
    pub wins: Option<i64>,
    pub total: Option<i64>,
    /// Rounded to two decimal places.
    pub percent: Option<Decimal>,
}

/// Parse a win-rate cell.
///
/// `"3/5"` → wins 3, total 5, 60%. A zero or missing total leaves the
/// percentage absent. `"45.5%"` yields only the percentage.
#[must_use]
pub fn parse_win_rate(raw: &str) -> WinRate {
    let text = raw.trim();
    if text.is_empty() {
        return WinRate::default();
    }

    if text.contains('/') {
        let mut parts = text.split('/');
        let wins = parts.next().and_then(parse_int);
        let total = parts.next().and_then(parse_int);
        let percent = match (wins, total) {
            (Some(w), Some(t)) if t > 0 => {
                Some((Decimal::from(w) * Decimal::ONE_HUNDRED / Decimal::from(t)).round_dp(2))
            }
            _ => None,
        };
        return WinRate {
            wins,
            total,
            percent,
        };
    }

    if text.contains('%') {
        return WinRate {
            wins: None,
            total: None,
            percent: parse_percent(text).map(|p| p.round_dp(2)),
        };
    }

    WinRate::default()
}

/// Trimmed text, or `None` for blank and placeholder cells.
#[must_use]
pub fn clean_text(raw: &str) -> Option<String> {
    let s = raw.trim();
    if is_absent(s) {
        None
    } else {
        Some(s.to_string())
    }
}

/// JSON scalar as the text a cell would have shown.
#[must_use]
pub fn json_scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

fn is_absent(s: &str) -> bool {
    s.is_empty() || s == "-" || s.eq_ignore_ascii_case("null") || s.eq_ignore_ascii_case("none")
}

#[cfg(test)]
#[path = "fields_test.rs"]
mod tests;
