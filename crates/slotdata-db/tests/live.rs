//! Live integration tests for slotdata-db using `#[sqlx::test]`.
//!
//! Each test gets a fresh, fully-migrated Postgres database spun up by the
//! sqlx test harness. The `migrations` path is relative to the crate root
//! (`crates/slotdata-db/`), so `"../../migrations"` resolves to the workspace
//! migration directory.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde_json::json;
use slotdata_core::{SeedStore, SessionStatus, SlotRecord, StoreErrorKind, StoreErrorReport};
use slotdata_db::{
    count_slot_records, create_session, fail_session, failed_store_ids_for_session,
    finalize_session, get_or_create_store, get_session, get_store, increment_store_failures,
    insert_store_error, latest_session_for_date, list_active_store_ids, list_store_errors,
    mark_store_success, resolve_store_errors, seed_stores, start_session,
    update_session_progress, upsert_slot_records, DbError, SessionProgress,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 1).unwrap()
}

fn progress(successful: u32, failed: u32, records: i64) -> SessionProgress {
    SessionProgress {
        successful_stores: successful,
        failed_stores: failed,
        total_records: records,
        error_log: json!({}),
    }
}

fn make_record(id: i64, store_id: &str, machine_number: i64) -> SlotRecord {
    SlotRecord {
        id,
        date: date(),
        store_id: store_id.to_string(),
        machine_id: Some(machine_number.to_string()),
        machine_number: Some(machine_number),
        machine_name: Some("マイジャグラーV".to_string()),
        credit_difference: Some(-320),
        game_count: Some(4012),
        payout_rate: Some(Decimal::new(9875, 2)),
        bb: Some(12),
        rb: Some(8),
        synthesis: Some("1/136.4".to_string()),
        bb_rate: Some("1/280.5".to_string()),
        rb_rate: Some("1/310.2".to_string()),
        win_rate: Some(Decimal::new(6000, 2)),
        source_url: format!("https://min-repo.com/{store_id}/"),
        session_id: None,
        natural_key: format!("{store_id}|20250301|{machine_number}"),
        aux: Some(json!({ "unmapped": { "備考": "角台" } })),
    }
}

async fn running_session(pool: &sqlx::PgPool, total: u32) -> i64 {
    let session = create_session(pool, date(), total)
        .await
        .expect("create_session failed");
    start_session(pool, session.id)
        .await
        .expect("start_session failed");
    session.id
}

// ---------------------------------------------------------------------------
// Section 1: Stores
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn get_or_create_store_is_idempotent(pool: sqlx::PgPool) {
    let first = get_or_create_store(&pool, "2564229").await.unwrap();
    let second = get_or_create_store(&pool, "2564229").await.unwrap();

    assert_eq!(first.id, second.id);
    assert!(first.is_active);
    assert_eq!(first.consecutive_failures, 0);
    assert!(first.last_success_at.is_none());
}

#[sqlx::test(migrations = "../../migrations")]
async fn seed_stores_inserts_only_missing_rows(pool: sqlx::PgPool) {
    get_or_create_store(&pool, "2564229").await.unwrap();
    let seeds = vec![
        SeedStore {
            store_id: "2564229".to_string(),
            name: Some("Sample Store 1".to_string()),
            prefecture: Some("Tokyo".to_string()),
        },
        SeedStore {
            store_id: "2583253".to_string(),
            name: Some("Sample Store 2".to_string()),
            prefecture: Some("Osaka".to_string()),
        },
    ];

    let inserted = seed_stores(&pool, &seeds).await.unwrap();
    assert_eq!(inserted, 1);

    let ids = list_active_store_ids(&pool).await.unwrap();
    assert_eq!(ids, vec!["2564229".to_string(), "2583253".to_string()]);

    let existing = get_store(&pool, "2564229").await.unwrap();
    assert!(existing.name.is_none(), "existing rows must not be overwritten");
}

#[sqlx::test(migrations = "../../migrations")]
async fn failure_streak_resets_on_success(pool: sqlx::PgPool) {
    get_or_create_store(&pool, "2582885").await.unwrap();
    increment_store_failures(&pool, "2582885").await.unwrap();
    increment_store_failures(&pool, "2582885").await.unwrap();
    assert_eq!(
        get_store(&pool, "2582885").await.unwrap().consecutive_failures,
        2
    );

    mark_store_success(&pool, "2582885").await.unwrap();
    let store = get_store(&pool, "2582885").await.unwrap();
    assert_eq!(store.consecutive_failures, 0);
    assert!(store.last_success_at.is_some());
}

#[sqlx::test(migrations = "../../migrations")]
async fn store_updates_on_unknown_store_are_not_found(pool: sqlx::PgPool) {
    let err = mark_store_success(&pool, "0000000").await.unwrap_err();
    assert!(matches!(err, DbError::NotFound), "got: {err:?}");
}

// ---------------------------------------------------------------------------
// Section 2: Session lifecycle
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn session_lifecycle_pending_to_partial(pool: sqlx::PgPool) {
    let session = create_session(&pool, date(), 3).await.unwrap();
    assert_eq!(session.status, "pending");
    assert_eq!(session.total_stores, 3);

    start_session(&pool, session.id).await.unwrap();
    update_session_progress(&pool, session.id, &progress(1, 0, 40))
        .await
        .unwrap();

    let mut last = progress(2, 1, 95);
    last.error_log = json!({ "2583824": ["no data extracted"] });
    finalize_session(&pool, session.id, SessionStatus::Partial, &last)
        .await
        .unwrap();

    let row = get_session(&pool, session.id).await.unwrap();
    assert_eq!(row.status, "partial");
    assert_eq!(row.successful_stores, 2);
    assert_eq!(row.failed_stores, 1);
    assert_eq!(row.total_records, 95);
    assert_eq!(row.error_log, json!({ "2583824": ["no data extracted"] }));
    assert!(row.started_at.is_some());
    assert!(row.ended_at.is_some());
}

#[sqlx::test(migrations = "../../migrations")]
async fn terminal_session_rejects_further_transitions(pool: sqlx::PgPool) {
    let id = running_session(&pool, 1).await;
    finalize_session(&pool, id, SessionStatus::Completed, &progress(1, 0, 10))
        .await
        .unwrap();

    let again = finalize_session(&pool, id, SessionStatus::Failed, &progress(0, 1, 0)).await;
    assert!(matches!(
        again,
        Err(DbError::InvalidSessionTransition { expected_status: "running", .. })
    ));
    let fail = fail_session(&pool, id, &json!({})).await;
    assert!(matches!(fail, Err(DbError::InvalidSessionTransition { .. })));
    assert!(matches!(
        update_session_progress(&pool, id, &progress(0, 0, 0)).await,
        Err(DbError::InvalidSessionTransition { .. })
    ));

    assert_eq!(get_session(&pool, id).await.unwrap().status, "completed");
}

#[sqlx::test(migrations = "../../migrations")]
async fn finalize_rejects_non_terminal_status(pool: sqlx::PgPool) {
    let id = running_session(&pool, 1).await;
    let err = finalize_session(&pool, id, SessionStatus::Running, &progress(0, 0, 0))
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::NonTerminalFinalStatus { .. }));
}

#[sqlx::test(migrations = "../../migrations")]
async fn counters_cannot_exceed_total_in_schema(pool: sqlx::PgPool) {
    let id = running_session(&pool, 1).await;
    let result = update_session_progress(&pool, id, &progress(1, 1, 0)).await;
    assert!(matches!(result, Err(DbError::Sqlx(_))), "got: {result:?}");
}

#[sqlx::test(migrations = "../../migrations")]
async fn fail_session_records_error_log(pool: sqlx::PgPool) {
    let id = running_session(&pool, 4).await;
    fail_session(&pool, id, &json!({ "orchestration_error": ["queue closed"] }))
        .await
        .unwrap();

    let row = get_session(&pool, id).await.unwrap();
    assert_eq!(row.status, "failed");
    assert_eq!(row.error_log["orchestration_error"][0], "queue closed");
}

#[sqlx::test(migrations = "../../migrations")]
async fn latest_session_for_date_picks_newest(pool: sqlx::PgPool) {
    assert!(latest_session_for_date(&pool, date()).await.unwrap().is_none());

    let older = create_session(&pool, date(), 1).await.unwrap();
    let newer = create_session(&pool, date(), 2).await.unwrap();
    create_session(&pool, date().succ_opt().unwrap(), 3)
        .await
        .unwrap();

    let latest = latest_session_for_date(&pool, date()).await.unwrap().unwrap();
    assert_eq!(latest.id, newer.id);
    assert_ne!(latest.id, older.id);
}

// ---------------------------------------------------------------------------
// Section 3: Store errors
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn store_errors_track_distinct_failed_stores(pool: sqlx::PgPool) {
    let id = running_session(&pool, 3).await;
    for (store_id, attempt) in [("2583250", 0), ("2583250", 1), ("2582867", 0)] {
        insert_store_error(
            &pool,
            id,
            &StoreErrorReport {
                store_id: store_id.to_string(),
                kind: StoreErrorKind::Fetch,
                message: "unexpected HTTP status 503".to_string(),
                url: format!("https://min-repo.com/{store_id}/"),
                retry_count: attempt,
            },
        )
        .await
        .unwrap();
    }

    let failed = failed_store_ids_for_session(&pool, id).await.unwrap();
    assert_eq!(failed, vec!["2582867".to_string(), "2583250".to_string()]);

    let rows = list_store_errors(&pool, id).await.unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[1].retry_count, 1);
    assert_eq!(rows[0].error_kind, "fetch");
    assert!(!rows[0].resolved);

    let resolved = resolve_store_errors(&pool, id, "2583250").await.unwrap();
    assert_eq!(resolved, 2);
    let failed = failed_store_ids_for_session(&pool, id).await.unwrap();
    assert_eq!(failed, vec!["2582867".to_string()]);
}

// ---------------------------------------------------------------------------
// Section 4: Slot records
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn upsert_inserts_in_batches_and_ignores_conflicts(pool: sqlx::PgPool) {
    let records: Vec<SlotRecord> = (1..=5)
        .map(|n| make_record(1_000 + n, "2564229", n))
        .collect();

    let inserted = upsert_slot_records(&pool, &records, 2).await.unwrap();
    assert_eq!(inserted, 5);
    assert_eq!(count_slot_records(&pool, "2564229", date()).await.unwrap(), 5);

    // Same ids again, different values: nothing inserted, nothing overwritten.
    let mut again = records.clone();
    again[0].credit_difference = Some(99_999);
    let inserted = upsert_slot_records(&pool, &again, 1000).await.unwrap();
    assert_eq!(inserted, 0);

    let stored: Option<i64> =
        sqlx::query_scalar("SELECT credit_difference FROM daily_slot_data WHERE id = $1")
            .bind(1_001_i64)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(stored, Some(-320));
}

#[sqlx::test(migrations = "../../migrations")]
async fn upsert_round_trips_optional_columns(pool: sqlx::PgPool) {
    let session_id = running_session(&pool, 1).await;
    let mut sparse = make_record(7, "2583824", 51);
    sparse.session_id = Some(session_id);
    sparse.machine_name = None;
    sparse.payout_rate = None;
    sparse.aux = None;

    upsert_slot_records(&pool, &[sparse], 1000).await.unwrap();

    let (name, payout, aux, session): (
        Option<String>,
        Option<Decimal>,
        Option<serde_json::Value>,
        Option<i64>,
    ) = sqlx::query_as(
        "SELECT machine_name, payout_rate, aux, session_id FROM daily_slot_data WHERE id = 7",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert!(name.is_none());
    assert!(payout.is_none());
    assert!(aux.is_none());
    assert_eq!(session, Some(session_id));
}

#[sqlx::test(migrations = "../../migrations")]
async fn upsert_empty_slice_is_noop(pool: sqlx::PgPool) {
    assert_eq!(upsert_slot_records(&pool, &[], 1000).await.unwrap(), 0);
}
