use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde_json::json;
use slotdata_core::{default_site_profile, CaptureMode, MergePolicy, SiteProfile};

use super::*;
use crate::capture::JsonPayload;

const URL: &str = "https://min-repo.com/2564229/";

struct Fixture {
    profile: SiteProfile,
    mapper: FieldMapper,
    identity: IdentityContext,
}

impl Fixture {
    fn new() -> Self {
        let profile = default_site_profile().unwrap();
        let mapper = FieldMapper::from_profile(&profile);
        let identity = IdentityContext::with_nonce(
            "2564229",
            NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            Some(99),
        );
        Self {
            profile,
            mapper,
            identity,
        }
    }

    fn ctx(&self) -> ExtractContext<'_> {
        ExtractContext {
            mapper: &self.mapper,
            identity: &self.identity,
            selectors: &self.profile.selectors,
            source_url: URL,
        }
    }
}

fn bundle(mode: CaptureMode, snapshots: &[&str], json: Vec<JsonPayload>) -> CaptureBundle {
    CaptureBundle {
        mode,
        url: URL.to_string(),
        snapshots: snapshots.iter().map(|s| (*s).to_string()).collect(),
        json_payloads: json,
    }
}

fn table_page(rows: &[(i64, &str, &str)]) -> String {
    let body: String = rows
        .iter()
        .map(|(num, name, diff)| {
            format!(
                "<tr><td><a href=\"?num={num}\">{num}</a></td><td>{name}</td><td>{diff}</td><td>4,012G</td></tr>"
            )
        })
        .collect();
    format!(
        "<html><body><table><tr><th>台番号</th><th>機種名</th><th>差枚</th><th>ゲーム数</th></tr>{body}</table></body></html>"
    )
}

// ---------------------------------------------------------------------------
// table strategy
// ---------------------------------------------------------------------------

#[test]
fn table_rows_map_headers_and_links() {
    let fx = Fixture::new();
    let html = table_page(&[(101, "マイジャグラーV", "+1,250"), (102, "ハナハナ", "-300枚")]);
    let result = extract_records(
        &bundle(CaptureMode::Static, &[&html], Vec::new()),
        &fx.ctx(),
        MergePolicy::Auto,
    );

    assert_eq!(result.source, ExtractionSource::Dom);
    assert_eq!(result.records.len(), 2);
    let first = &result.records[0];
    assert_eq!(first.machine_number, Some(101));
    assert_eq!(first.machine_name.as_deref(), Some("マイジャグラーV"));
    assert_eq!(first.credit_difference, Some(1250));
    assert_eq!(first.game_count, Some(4012));
    assert_eq!(first.machine_id.as_deref(), Some("101"));
    assert_eq!(first.store_id, "2564229");
    assert_eq!(first.source_url, URL);
    assert_eq!(first.natural_key, "2564229|20250301|101");
    assert_eq!(result.records[1].credit_difference, Some(-300));
}

#[test]
fn unmapped_columns_land_in_aux() {
    let fx = Fixture::new();
    let html = "<table><tr><th>台番号</th><th>差枚</th><th>備考</th><th>勝率</th></tr>\
                <tr><td>7</td><td>+10</td><td>角台</td><td>3/5</td></tr></table>";
    let result = extract_records(
        &bundle(CaptureMode::Static, &[html], Vec::new()),
        &fx.ctx(),
        MergePolicy::Auto,
    );

    let record = &result.records[0];
    assert_eq!(record.win_rate, Some(Decimal::new(6000, 2)));
    let aux = record.aux.as_ref().unwrap();
    assert_eq!(aux["unmapped"]["備考"], json!("角台"));
    assert_eq!(aux["win"], json!({ "wins": 3, "total": 5 }));
    assert!(aux.get("parsed_at").is_some());
}

#[test]
fn headerless_table_is_positional_and_unmapped() {
    let fx = Fixture::new();
    let html = "<table><tr><td>a</td><td>b</td></tr></table>";
    let result = extract_records(
        &bundle(CaptureMode::Static, &[html], Vec::new()),
        &fx.ctx(),
        MergePolicy::Auto,
    );
    assert_eq!(result.source, ExtractionSource::Nothing);
    assert!(result.records.is_empty());
}

#[test]
fn table_summaries_report_headers_and_data_rows() {
    let html = table_page(&[(1, "A", "+1"), (2, "B", "-2")]);
    let tables = summarize_tables(&format!("{html}<table><tr><td>x</td></tr></table>")).unwrap();
    assert_eq!(tables.len(), 2);
    assert_eq!(tables[0].headers, vec!["台番号", "機種名", "差枚", "ゲーム数"]);
    assert_eq!(tables[0].rows, 2);
    assert!(tables[1].headers.is_empty());
    assert_eq!(tables[1].rows, 1);
}

// ---------------------------------------------------------------------------
// div / list strategies
// ---------------------------------------------------------------------------

#[test]
fn div_rows_from_data_attributes() {
    let fx = Fixture::new();
    let html = r#"<div class="wrapper">
        <div data-machine-number="21" data-difference="+640" data-extra="x">21番台</div>
        <div data-machine-number="22" data-difference="-80"></div>
    </div>"#;
    let result = extract_records(
        &bundle(CaptureMode::Static, &[html], Vec::new()),
        &fx.ctx(),
        MergePolicy::Auto,
    );

    assert_eq!(result.records.len(), 2);
    assert_eq!(result.records[0].machine_number, Some(21));
    assert_eq!(result.records[0].credit_difference, Some(640));
    assert_eq!(
        result.records[0].aux.as_ref().unwrap()["unmapped"]["data-extra"],
        json!("x")
    );
    assert_eq!(result.records[1].credit_difference, Some(-80));
}

#[test]
fn div_rows_from_labelled_text() {
    let fx = Fixture::new();
    let html = r#"<div class="data-list">
        <div class="machine-row">台番号 301 差枚 +1,000</div>
        <div class="machine-row">台番号 302 差枚 -50</div>
    </div>"#;
    let result = extract_records(
        &bundle(CaptureMode::Static, &[html], Vec::new()),
        &fx.ctx(),
        MergePolicy::Auto,
    );

    let numbers: Vec<_> = result.records.iter().map(|r| r.machine_number).collect();
    assert_eq!(numbers, vec![Some(301), Some(302)]);
    assert_eq!(result.records[0].credit_difference, Some(1000));
}

#[test]
fn list_items_and_definition_lists() {
    let fx = Fixture::new();
    let html = r"<ul><li>401 アイムジャグラー 3,100G +420</li><li>お知らせ</li></ul>
        <dl><dt>台番号</dt><dd>402</dd><dt>差枚</dt><dd>-1,200</dd><dt>BB</dt><dd>4</dd></dl>";
    let result = extract_records(
        &bundle(CaptureMode::Static, &[html], Vec::new()),
        &fx.ctx(),
        MergePolicy::Auto,
    );

    assert_eq!(result.records.len(), 2);
    assert_eq!(result.records[0].machine_number, Some(401));
    assert_eq!(result.records[0].credit_difference, Some(420));
    assert_eq!(result.records[1].machine_number, Some(402));
    assert_eq!(result.records[1].credit_difference, Some(-1200));
    assert_eq!(result.records[1].bb, Some(4));
}

#[test]
fn table_wins_over_div_in_same_snapshot() {
    let fx = Fixture::new();
    let html = format!(
        "{}<div class=\"machine\">台番号 999 差枚 +1</div>",
        table_page(&[(101, "A", "+1")])
    );
    let result = extract_records(
        &bundle(CaptureMode::Static, &[&html], Vec::new()),
        &fx.ctx(),
        MergePolicy::Auto,
    );
    assert_eq!(result.records.len(), 1);
    assert_eq!(result.records[0].machine_number, Some(101));
}

// ---------------------------------------------------------------------------
// merge policy and dedup
// ---------------------------------------------------------------------------

#[test]
fn first_match_stops_at_first_productive_snapshot() {
    let fx = Fixture::new();
    let a = table_page(&[(1, "A", "+1")]);
    let b = table_page(&[(2, "B", "+2")]);
    let result = extract_records(
        &bundle(CaptureMode::Interactive, &["<p>empty</p>", &a, &b], Vec::new()),
        &fx.ctx(),
        MergePolicy::FirstMatch,
    );
    assert_eq!(result.records.len(), 1);
    assert_eq!(result.records[0].machine_number, Some(1));
}

#[test]
fn auto_unions_interactive_snapshots_and_dedups() {
    let fx = Fixture::new();
    let a = table_page(&[(1, "A", "+1"), (2, "B", "+2")]);
    let b = table_page(&[(2, "B", "+5"), (3, "C", "+3")]);
    let result = extract_records(
        &bundle(CaptureMode::Interactive, &[&a, &b], Vec::new()),
        &fx.ctx(),
        MergePolicy::Auto,
    );

    let numbers: Vec<_> = result.records.iter().map(|r| r.machine_number).collect();
    assert_eq!(numbers, vec![Some(1), Some(2), Some(3)]);
    assert_eq!(result.duplicates_dropped, 1);
    // the later tab's values replace the earlier row
    assert_eq!(result.records[1].credit_difference, Some(5));
}

#[test]
fn union_takes_first_productive_strategy_per_snapshot() {
    let fx = Fixture::new();
    let a = format!(
        "{}<div class=\"machine\">台番号 999 差枚 +1</div>",
        table_page(&[(1, "A", "+1")])
    );
    let b = "<ul><li>2 ハナハナ 1,200G +80</li></ul>";
    let result = extract_records(
        &bundle(CaptureMode::Interactive, &[&a, b], Vec::new()),
        &fx.ctx(),
        MergePolicy::UnionAll,
    );

    let numbers: Vec<_> = result.records.iter().map(|r| r.machine_number).collect();
    assert_eq!(numbers, vec![Some(1), Some(2)]);
}

#[test]
fn auto_policy_resolution() {
    assert_eq!(
        effective_policy(MergePolicy::Auto, CaptureMode::Static),
        MergePolicy::FirstMatch
    );
    assert_eq!(
        effective_policy(MergePolicy::Auto, CaptureMode::Interactive),
        MergePolicy::UnionAll
    );
    assert_eq!(
        effective_policy(MergePolicy::UnionAll, CaptureMode::Static),
        MergePolicy::UnionAll
    );
}

// ---------------------------------------------------------------------------
// JSON payloads
// ---------------------------------------------------------------------------

#[test]
fn json_payload_takes_precedence_over_dom() {
    let fx = Fixture::new();
    let payload = JsonPayload {
        url: "https://min-repo.com/api/machines".to_string(),
        body: json!({
            "meta": { "count": 2 },
            "machines": [
                { "No": "101", "Name": "ジャグラー", "difference": "+500", "G": "4,000" },
                { "no": 102, "difference": -120, "rate": "97.5%" }
            ]
        }),
    };
    let html = table_page(&[(900, "X", "+1")]);
    let result = extract_records(
        &bundle(CaptureMode::Interactive, &[&html], vec![payload]),
        &fx.ctx(),
        MergePolicy::Auto,
    );

    assert_eq!(result.source, ExtractionSource::Json);
    assert_eq!(result.records.len(), 2);
    let first = &result.records[0];
    assert_eq!(first.machine_number, Some(101));
    assert_eq!(first.machine_name.as_deref(), Some("ジャグラー"));
    assert_eq!(first.credit_difference, Some(500));
    assert_eq!(first.game_count, Some(4000));
    assert_eq!(
        first.aux.as_ref().unwrap()["source"],
        json!("https://min-repo.com/api/machines")
    );
    assert_eq!(result.records[1].payout_rate, Some(Decimal::new(975, 1)));
}

#[test]
fn json_items_without_number_or_difference_fall_back_to_dom() {
    let fx = Fixture::new();
    let payload = JsonPayload {
        url: "https://min-repo.com/api/banner".to_string(),
        body: json!([{ "title": "campaign" }]),
    };
    let html = table_page(&[(5, "E", "+5")]);
    let result = extract_records(
        &bundle(CaptureMode::Interactive, &[&html], vec![payload]),
        &fx.ctx(),
        MergePolicy::Auto,
    );
    assert_eq!(result.source, ExtractionSource::Dom);
    assert_eq!(result.records[0].machine_number, Some(5));
}

#[test]
fn invalid_configured_selector_skips_strategy() {
    let mut fx = Fixture::new();
    fx.profile.selectors.div_rows = "div[".to_string();
    let html = "<ul><li>11 +30</li></ul>";
    let result = extract_records(
        &bundle(CaptureMode::Static, &[html], Vec::new()),
        &fx.ctx(),
        MergePolicy::Auto,
    );
    assert_eq!(result.records.len(), 1);
    assert_eq!(result.records[0].machine_number, Some(11));
}

#[test]
fn selector_error_names_the_selector() {
    let err = selector("div[").unwrap_err();
    assert!(matches!(err, ExtractError::InvalidSelector { ref selector, .. } if selector == "div["));
}
