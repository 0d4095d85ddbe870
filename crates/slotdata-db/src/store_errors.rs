//! Database operations for `scraping_errors`: one row per failed attempt.

use chrono::{DateTime, Utc};
use slotdata_core::StoreErrorReport;
use sqlx::PgPool;

use crate::{to_i32, DbError};

/// A row from the `scraping_errors` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StoreErrorRow {
    pub id: i64,
    pub session_id: i64,
    pub store_id: String,
    pub error_kind: String,
    pub message: String,
    pub url: Option<String>,
    pub retry_count: i32,
    pub resolved: bool,
    pub occurred_at: DateTime<Utc>,
}

/// Appends one error row for `session_id`. Returns the new row id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn insert_store_error(
    pool: &PgPool,
    session_id: i64,
    report: &StoreErrorReport,
) -> Result<i64, DbError> {
    let url = (!report.url.is_empty()).then_some(report.url.as_str());
    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO scraping_errors \
             (session_id, store_id, error_kind, message, url, retry_count) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         RETURNING id",
    )
    .bind(session_id)
    .bind(&report.store_id)
    .bind(report.kind.as_str())
    .bind(&report.message)
    .bind(url)
    .bind(to_i32(report.retry_count))
    .fetch_one(pool)
    .await?;

    Ok(id)
}

/// Distinct store ids with unresolved errors in `session_id`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn failed_store_ids_for_session(
    pool: &PgPool,
    session_id: i64,
) -> Result<Vec<String>, DbError> {
    let ids = sqlx::query_scalar::<_, String>(
        "SELECT DISTINCT store_id FROM scraping_errors \
         WHERE session_id = $1 AND resolved = FALSE \
         ORDER BY store_id",
    )
    .bind(session_id)
    .fetch_all(pool)
    .await?;

    Ok(ids)
}

/// Marks every unresolved error for one store in one session as resolved.
///
/// Returns the number of rows updated.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn resolve_store_errors(
    pool: &PgPool,
    session_id: i64,
    store_id: &str,
) -> Result<u64, DbError> {
    let result = sqlx::query(
        "UPDATE scraping_errors SET resolved = TRUE \
         WHERE session_id = $1 AND store_id = $2 AND resolved = FALSE",
    )
    .bind(session_id)
    .bind(store_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// All error rows for a session in insertion order.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_store_errors(
    pool: &PgPool,
    session_id: i64,
) -> Result<Vec<StoreErrorRow>, DbError> {
    let rows = sqlx::query_as::<_, StoreErrorRow>(
        "SELECT id, session_id, store_id, error_kind, message, url, retry_count, \
                resolved, occurred_at \
         FROM scraping_errors \
         WHERE session_id = $1 \
         ORDER BY id",
    )
    .bind(session_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
