use reqwest::Url;
use scraper::{ElementRef, Html};
use slotdata_core::SlotRecord;

use super::row::RowFields;
use super::{selector, ExtractContext, TableSummary};
use crate::error::ExtractError;

/// One record per `<tr>` with `<td>` cells, headers from `<th>` or positional.
pub(crate) fn extract(
    html: &Html,
    ctx: &ExtractContext<'_>,
) -> Result<Vec<SlotRecord>, ExtractError> {
    let table_sel = selector("table")?;
    let th_sel = selector("th")?;
    let tr_sel = selector("tr")?;
    let td_sel = selector("td")?;
    let link_sel = selector("a[href]")?;

    let mut records = Vec::new();

    for table in html.select(&table_sel) {
        let mut headers: Vec<String> = table.select(&th_sel).map(|th| cell_text(&th)).collect();
        if headers.is_empty() {
            let Some(first_row) = table.select(&tr_sel).next() else {
                continue;
            };
            let width = first_row.select(&td_sel).count();
            headers = (0..width).map(|i| format!("col_{i}")).collect();
        }

        for tr in table.select(&tr_sel) {
            let cells: Vec<String> = tr.select(&td_sel).map(|td| cell_text(&td)).collect();
            if cells.is_empty() {
                continue;
            }

            let mut row = RowFields::default();
            for (idx, text) in cells.iter().enumerate() {
                let header = headers
                    .get(idx)
                    .cloned()
                    .unwrap_or_else(|| format!("col_{idx}"));
                match ctx.mapper.field_for_header(&header) {
                    Some(field) => row.set(field, text),
                    None => row.set_unmapped(&header, text),
                }
            }

            if !row.has_identity() {
                continue;
            }

            if row.machine_id.is_none() {
                row.machine_id = tr
                    .select(&link_sel)
                    .next()
                    .and_then(|a| a.value().attr("href"))
                    .and_then(|href| query_param(ctx.source_url, href, "num"));
            }

            let unique_key = row.unique_key(&cells.concat());
            let aux = row.dom_aux();
            records.push(row.into_record(ctx.identity, &unique_key, ctx.source_url, aux));
        }
    }

    Ok(records)
}

/// Header texts and data-row count of every table in `html`.
pub(crate) fn summarize(html: &Html) -> Result<Vec<TableSummary>, ExtractError> {
    let table_sel = selector("table")?;
    let th_sel = selector("th")?;
    let tr_sel = selector("tr")?;
    let td_sel = selector("td")?;

    Ok(html
        .select(&table_sel)
        .map(|table| TableSummary {
            headers: table.select(&th_sel).map(|th| cell_text(&th)).collect(),
            rows: table
                .select(&tr_sel)
                .filter(|tr| tr.select(&td_sel).next().is_some())
                .count(),
        })
        .collect())
}

/// Cell text with each text node trimmed and concatenated.
fn cell_text(el: &ElementRef<'_>) -> String {
    el.text().map(str::trim).collect()
}

/// Value of `name` in the query of `href`, resolved against `base`.
fn query_param(base: &str, href: &str, name: &str) -> Option<String> {
    let url = Url::parse(base)
        .and_then(|b| b.join(href))
        .or_else(|_| Url::parse(href))
        .ok()?;
    url.query_pairs()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
