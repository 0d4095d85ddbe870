use std::collections::HashSet;

use scraper::{ElementRef, Html};
use slotdata_core::SlotRecord;

use super::{leaf_matches, row_from_element, selector, ExtractContext};
use crate::error::ExtractError;

/// Rows from `<div>` containers: either the configured row selector or any
/// `<div>` whose `data-*` attributes name a known field.
pub(crate) fn extract(
    html: &Html,
    ctx: &ExtractContext<'_>,
) -> Result<Vec<SlotRecord>, ExtractError> {
    let configured = selector(&ctx.selectors.div_rows)?;
    let any_div = selector("div")?;

    let mut candidates: Vec<ElementRef<'_>> = html
        .select(&any_div)
        .filter(|el| has_mapped_data_attr(el, ctx))
        .collect();
    let attr_rows: HashSet<_> = candidates.iter().map(|c| c.id()).collect();
    for el in leaf_matches(html, &configured) {
        // Containers wrapping attribute rows would only re-read their text.
        let wraps_attr_row = el.descendants().any(|d| attr_rows.contains(&d.id()));
        if !wraps_attr_row {
            candidates.push(el);
        }
    }

    Ok(candidates
        .iter()
        .filter_map(|el| row_from_element(el, ctx))
        .collect())
}

fn has_mapped_data_attr(el: &ElementRef<'_>, ctx: &ExtractContext<'_>) -> bool {
    el.value().attrs().any(|(name, _)| {
        name.strip_prefix("data-")
            .is_some_and(|key| ctx.mapper.field_for_attr(key).is_some())
    })
}
