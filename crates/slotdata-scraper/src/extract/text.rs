//! Free-text row parsing for div and list containers without data attributes.

use scraper::ElementRef;

use super::row::RowFields;
use crate::fields::{parse_int, FieldMapper};

/// Visible text of an element, one space between text nodes.
pub(crate) fn element_text(el: &ElementRef<'_>) -> String {
    el.text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Read `label value` pairs whose label is a known header. When no label
/// matches, fall back to position: a leading unsigned integer is the machine
/// number and the next explicitly signed number is the differential.
pub(crate) fn fields_from_text(text: &str, mapper: &FieldMapper) -> RowFields {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    let mut row = RowFields::default();
    let mut labelled = false;

    let mut i = 0;
    while i < tokens.len() {
        let token = tokens[i];

        // `台番号:123` / `差枚：-500` in a single token
        if let Some((label, value)) = token.split_once([':', '：']) {
            if let Some(field) = mapper.field_for_header(label) {
                if !value.is_empty() {
                    row.set(field, value);
                    labelled = true;
                    i += 1;
                    continue;
                }
            }
        }

        let label = token.trim_end_matches([':', '：']);
        if let Some(field) = mapper.field_for_header(label) {
            if let Some(value) = tokens.get(i + 1) {
                row.set(field, value);
                labelled = true;
                i += 2;
                continue;
            }
        }

        i += 1;
    }

    if !labelled {
        positional(&tokens, &mut row);
    }

    row
}

fn positional(tokens: &[&str], row: &mut RowFields) {
    let Some(first) = tokens.first() else {
        return;
    };
    if !first.chars().all(|c| c.is_ascii_digit() || c == ',') {
        return;
    }
    let Some(number) = parse_int(first) else {
        return;
    };
    row.machine_number = Some(number);

    row.credit_difference = tokens[1..]
        .iter()
        .filter(|t| t.starts_with('+') || t.starts_with('-'))
        .find_map(|t| parse_int(t));
}
