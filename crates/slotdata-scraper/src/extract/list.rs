use scraper::{ElementRef, Html};
use slotdata_core::SlotRecord;

use super::row::RowFields;
use super::text::element_text;
use super::{leaf_matches, row_from_element, selector, ExtractContext};
use crate::error::ExtractError;

/// Rows from list items (`li`) and definition lists (`dl` with `dt`/`dd`).
pub(crate) fn extract(
    html: &Html,
    ctx: &ExtractContext<'_>,
) -> Result<Vec<SlotRecord>, ExtractError> {
    let configured = selector(&ctx.selectors.list_rows)?;
    let dt_sel = selector("dt")?;

    let mut records = Vec::new();
    for el in leaf_matches(html, &configured) {
        let record = if el.value().name() == "dl" && el.select(&dt_sel).next().is_some() {
            row_from_definition_list(&el, ctx)
        } else {
            row_from_element(&el, ctx)
        };
        records.extend(record);
    }
    Ok(records)
}

/// `<dt>` labels paired with the `<dd>` that follows them.
fn row_from_definition_list(el: &ElementRef<'_>, ctx: &ExtractContext<'_>) -> Option<SlotRecord> {
    let mut row = RowFields::default();
    let mut pending_label: Option<String> = None;

    for child in el.children().filter_map(ElementRef::wrap) {
        match child.value().name() {
            "dt" => pending_label = Some(element_text(&child)),
            "dd" => {
                let Some(label) = pending_label.take() else {
                    continue;
                };
                let value = element_text(&child);
                match ctx.mapper.field_for_header(&label) {
                    Some(field) => row.set(field, &value),
                    None => row.set_unmapped(&label, &value),
                }
            }
            _ => {}
        }
    }

    if !row.has_identity() || !row.has_numeric_signal() {
        return None;
    }
    let unique_key = row.unique_key(&element_text(el));
    let aux = row.dom_aux();
    Some(row.into_record(ctx.identity, &unique_key, ctx.source_url, aux))
}
