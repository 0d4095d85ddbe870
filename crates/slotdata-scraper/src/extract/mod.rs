//! Multi-strategy extraction of slot records from a capture bundle.
//!
//! JSON payloads are tried first; if they yield nothing, the DOM strategies
//! (table, div, list) run in order against each HTML snapshot and the first
//! strategy with rows wins for that snapshot. The merge policy decides
//! whether the first productive snapshot ends the pass or every snapshot is
//! unioned. Rows are deduplicated by id before they are returned.

mod div;
mod json;
mod list;
mod row;
mod table;
mod text;

use std::collections::HashSet;

use scraper::{ElementRef, Html, Selector};
use slotdata_core::{CaptureMode, MergePolicy, SiteSelectors, SlotRecord};

use crate::capture::CaptureBundle;
use crate::error::ExtractError;
use crate::fields::FieldMapper;
use crate::identity::{dedup_records, IdentityContext};

use row::RowFields;
use text::{element_text, fields_from_text};

/// Everything a strategy needs besides the document itself.
pub struct ExtractContext<'a> {
    pub mapper: &'a FieldMapper,
    pub identity: &'a IdentityContext,
    pub selectors: &'a SiteSelectors,
    /// The store page URL recorded on every row.
    pub source_url: &'a str,
}

pub type DomStrategy =
    fn(&Html, &ExtractContext<'_>) -> Result<Vec<SlotRecord>, ExtractError>;

/// DOM strategies in the order they are tried.
pub const DOM_STRATEGIES: &[(&str, DomStrategy)] = &[
    ("table", table::extract),
    ("div", div::extract),
    ("list", list::extract),
];

/// Which part of the bundle produced the records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionSource {
    Json,
    Dom,
    Nothing,
}

#[derive(Debug, Clone)]
pub struct Extraction {
    pub records: Vec<SlotRecord>,
    pub source: ExtractionSource,
    /// Rows dropped because their id repeated within the pass.
    pub duplicates_dropped: usize,
}

/// Shape of one `<table>`, for inspecting a page by hand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSummary {
    pub headers: Vec<String>,
    /// Rows with at least one `<td>`.
    pub rows: usize,
}

/// Every table in one HTML snapshot.
///
/// # Errors
///
/// Returns [`ExtractError::InvalidSelector`] only if a built-in selector fails
/// to parse.
pub fn summarize_tables(html: &str) -> Result<Vec<TableSummary>, ExtractError> {
    table::summarize(&Html::parse_document(html))
}

/// Resolve [`MergePolicy::Auto`] against the capture mode.
#[must_use]
pub fn effective_policy(policy: MergePolicy, mode: CaptureMode) -> MergePolicy {
    match (policy, mode) {
        (MergePolicy::Auto, CaptureMode::Static) => MergePolicy::FirstMatch,
        (MergePolicy::Auto, CaptureMode::Interactive) => MergePolicy::UnionAll,
        (explicit, _) => explicit,
    }
}

/// Run the full pipeline over one capture bundle.
#[must_use]
pub fn extract_records(
    bundle: &CaptureBundle,
    ctx: &ExtractContext<'_>,
    policy: MergePolicy,
) -> Extraction {
    let json_rows = json::extract(&bundle.json_payloads, ctx);
    if !json_rows.is_empty() {
        tracing::debug!(
            store_id = ctx.identity.store_id(),
            count = json_rows.len(),
            "extracted rows from JSON payloads"
        );
        return finish(json_rows, ExtractionSource::Json);
    }

    let policy = effective_policy(policy, bundle.mode);
    let mut all_rows = Vec::new();

    for (index, snapshot) in bundle.snapshots.iter().enumerate() {
        let document = Html::parse_document(snapshot);
        let rows = extract_snapshot(&document, ctx, index);
        if rows.is_empty() {
            continue;
        }
        all_rows.extend(rows);
        if policy == MergePolicy::FirstMatch {
            break;
        }
    }

    let source = if all_rows.is_empty() {
        ExtractionSource::Nothing
    } else {
        ExtractionSource::Dom
    };
    finish(all_rows, source)
}

/// First DOM strategy with rows for one snapshot. A failing strategy is
/// logged and skipped.
fn extract_snapshot(
    document: &Html,
    ctx: &ExtractContext<'_>,
    snapshot: usize,
) -> Vec<SlotRecord> {
    for (name, strategy) in DOM_STRATEGIES {
        match strategy(document, ctx) {
            Ok(rows) if !rows.is_empty() => {
                tracing::debug!(
                    store_id = ctx.identity.store_id(),
                    strategy = *name,
                    snapshot,
                    count = rows.len(),
                    "strategy produced rows"
                );
                return rows;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(
                    store_id = ctx.identity.store_id(),
                    strategy = *name,
                    snapshot,
                    error = %e,
                    "strategy skipped"
                );
            }
        }
    }
    Vec::new()
}

fn finish(rows: Vec<SlotRecord>, source: ExtractionSource) -> Extraction {
    let rows: Vec<SlotRecord> = rows.into_iter().filter(SlotRecord::has_identity).collect();
    let before = rows.len();
    let records = dedup_records(rows);
    Extraction {
        duplicates_dropped: before - records.len(),
        records,
        source,
    }
}

pub(crate) fn selector(css: &str) -> Result<Selector, ExtractError> {
    Selector::parse(css).map_err(|e| ExtractError::InvalidSelector {
        selector: css.to_string(),
        reason: format!("{e:?}"),
    })
}

/// Matches of `sel` that do not contain another match.
pub(crate) fn leaf_matches<'a>(html: &'a Html, sel: &Selector) -> Vec<ElementRef<'a>> {
    let matched: Vec<ElementRef<'a>> = html.select(sel).collect();
    let ids: HashSet<_> = matched.iter().map(|el| el.id()).collect();
    matched
        .into_iter()
        .filter(|el| !el.descendants().skip(1).any(|d| ids.contains(&d.id())))
        .collect()
}

/// Record from a container element: mapped `data-*` attributes first, then
/// free text. Rejects rows without identity or any numeric value.
pub(crate) fn row_from_element(
    el: &ElementRef<'_>,
    ctx: &ExtractContext<'_>,
) -> Option<SlotRecord> {
    let mut row = RowFields::default();
    let mut from_attrs = false;

    for (name, value) in el.value().attrs() {
        let Some(key) = name.strip_prefix("data-") else {
            continue;
        };
        match ctx.mapper.field_for_attr(key) {
            Some(field) => {
                row.set(field, value);
                from_attrs = true;
            }
            None => row.set_unmapped(name, value),
        }
    }

    let text = element_text(el);
    if !from_attrs {
        let unmapped = std::mem::take(&mut row.unmapped);
        row = fields_from_text(&text, ctx.mapper);
        row.unmapped = unmapped;
    }

    if !row.has_identity() || !row.has_numeric_signal() {
        return None;
    }

    let unique_key = row.unique_key(&text);
    let aux = row.dom_aux();
    Some(row.into_record(ctx.identity, &unique_key, ctx.source_url, aux))
}

#[cfg(test)]
#[path = "extract_test.rs"]
mod tests;
