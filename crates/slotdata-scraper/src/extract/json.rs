use serde_json::{json, Map, Value};
use slotdata_core::{CanonicalField, SlotRecord};

use super::row::RowFields;
use super::ExtractContext;
use crate::capture::JsonPayload;
use crate::fields::{json_scalar_text, FieldMapper};

/// Records from intercepted JSON bodies shaped as a list of objects, or an
/// object holding such lists.
pub(crate) fn extract(payloads: &[JsonPayload], ctx: &ExtractContext<'_>) -> Vec<SlotRecord> {
    let mut records = Vec::new();

    for payload in payloads {
        for list in candidate_lists(&payload.body) {
            for item in list.iter().filter_map(Value::as_object) {
                if let Some(record) = record_from_item(item, &payload.url, ctx) {
                    records.push(record);
                }
            }
        }
    }

    records
}

fn candidate_lists(body: &Value) -> Vec<&Vec<Value>> {
    match body {
        Value::Array(items) => vec![items],
        Value::Object(map) => map
            .values()
            .filter_map(Value::as_array)
            .filter(|items| items.first().is_some_and(Value::is_object))
            .collect(),
        _ => Vec::new(),
    }
}

fn record_from_item(
    item: &Map<String, Value>,
    payload_url: &str,
    ctx: &ExtractContext<'_>,
) -> Option<SlotRecord> {
    let keyed = FieldMapper::lowercase_keys(item);
    let mut row = RowFields::default();

    for field in CanonicalField::ALL {
        if let Some(text) = ctx
            .mapper
            .json_value(field, &keyed)
            .and_then(json_scalar_text)
        {
            row.set(field, &text);
        }
    }

    if row.machine_number.is_none() && row.credit_difference.is_none() {
        return None;
    }

    let item_value = Value::Object(item.clone());
    let unique_key = row
        .machine_number
        .map(|n| n.to_string())
        .or_else(|| row.machine_name.clone())
        .or_else(|| row.machine_id.clone())
        .unwrap_or_else(|| crate::identity::fallback_key(&item_value.to_string()));

    let aux = json!({ "source": payload_url, "payload_item": item_value });
    Some(row.into_record(ctx.identity, &unique_key, ctx.source_url, Some(aux)))
}
