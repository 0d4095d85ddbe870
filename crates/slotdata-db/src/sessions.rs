//! Database operations for `scraping_sessions`.
//!
//! Status transitions are guarded in SQL: an update that finds the session
//! in the wrong status affects no rows and is reported as
//! [`DbError::InvalidSessionTransition`].

use chrono::{DateTime, NaiveDate, Utc};
use slotdata_core::{Session, SessionStatus};
use sqlx::PgPool;

use crate::{to_i32, DbError};

/// A row from the `scraping_sessions` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SessionRow {
    pub id: i64,
    pub date: NaiveDate,
    pub status: String,
    pub total_stores: i32,
    pub successful_stores: i32,
    pub failed_stores: i32,
    pub total_records: i64,
    pub error_log: serde_json::Value,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Counter snapshot written while a session runs.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionProgress {
    pub successful_stores: u32,
    pub failed_stores: u32,
    pub total_records: i64,
    pub error_log: serde_json::Value,
}

impl SessionProgress {
    #[must_use]
    pub fn from_session(session: &Session) -> Self {
        Self {
            successful_stores: session.successful_stores,
            failed_stores: session.failed_stores,
            total_records: session.total_records,
            error_log: session.error_log_json(),
        }
    }
}

const SESSION_COLUMNS: &str = "id, date, status, total_stores, successful_stores, failed_stores, \
                               total_records, error_log, started_at, ended_at, created_at";

/// Creates a session for `date` in `pending` status.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn create_session(
    pool: &PgPool,
    date: NaiveDate,
    total_stores: u32,
) -> Result<SessionRow, DbError> {
    let row = sqlx::query_as::<_, SessionRow>(&format!(
        "INSERT INTO scraping_sessions (date, status, total_stores) \
         VALUES ($1, 'pending', $2) \
         RETURNING {SESSION_COLUMNS}"
    ))
    .bind(date)
    .bind(to_i32(total_stores))
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// `pending → running`, stamping `started_at`.
///
/// # Errors
///
/// Returns [`DbError::InvalidSessionTransition`] unless the session is
/// pending, or [`DbError::Sqlx`] if the update fails.
pub async fn start_session(pool: &PgPool, id: i64) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE scraping_sessions \
         SET status = 'running', started_at = NOW() \
         WHERE id = $1 AND status = 'pending'",
    )
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidSessionTransition {
            id,
            expected_status: "pending",
        });
    }

    Ok(())
}

/// Writes the running counters and error log.
///
/// # Errors
///
/// Returns [`DbError::InvalidSessionTransition`] unless the session is
/// running, or [`DbError::Sqlx`] if the update fails.
pub async fn update_session_progress(
    pool: &PgPool,
    id: i64,
    progress: &SessionProgress,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE scraping_sessions \
         SET successful_stores = $1, failed_stores = $2, total_records = $3, error_log = $4 \
         WHERE id = $5 AND status = 'running'",
    )
    .bind(to_i32(progress.successful_stores))
    .bind(to_i32(progress.failed_stores))
    .bind(progress.total_records)
    .bind(&progress.error_log)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidSessionTransition {
            id,
            expected_status: "running",
        });
    }

    Ok(())
}

/// `running → status` (one of the terminal statuses), with final counters
/// and `ended_at = NOW()`.
///
/// # Errors
///
/// Returns [`DbError::NonTerminalFinalStatus`] for a non-terminal `status`,
/// [`DbError::InvalidSessionTransition`] unless the session is running, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn finalize_session(
    pool: &PgPool,
    id: i64,
    status: SessionStatus,
    progress: &SessionProgress,
) -> Result<(), DbError> {
    if !status.is_terminal() {
        return Err(DbError::NonTerminalFinalStatus {
            id,
            status: status.to_string(),
        });
    }

    let result = sqlx::query(
        "UPDATE scraping_sessions \
         SET status = $1, successful_stores = $2, failed_stores = $3, total_records = $4, \
             error_log = $5, ended_at = NOW() \
         WHERE id = $6 AND status = 'running'",
    )
    .bind(status.as_str())
    .bind(to_i32(progress.successful_stores))
    .bind(to_i32(progress.failed_stores))
    .bind(progress.total_records)
    .bind(&progress.error_log)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidSessionTransition {
            id,
            expected_status: "running",
        });
    }

    Ok(())
}

/// Forces a non-terminal session to `failed` and records the error log.
///
/// # Errors
///
/// Returns [`DbError::InvalidSessionTransition`] if the session is already
/// terminal, or [`DbError::Sqlx`] if the update fails.
pub async fn fail_session(
    pool: &PgPool,
    id: i64,
    error_log: &serde_json::Value,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE scraping_sessions \
         SET status = 'failed', error_log = $1, ended_at = NOW() \
         WHERE id = $2 AND status IN ('pending', 'running')",
    )
    .bind(error_log)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidSessionTransition {
            id,
            expected_status: "pending or running",
        });
    }

    Ok(())
}

/// Fetches a single session by id.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists, or [`DbError::Sqlx`] if
/// the query fails.
pub async fn get_session(pool: &PgPool, id: i64) -> Result<SessionRow, DbError> {
    let row = sqlx::query_as::<_, SessionRow>(&format!(
        "SELECT {SESSION_COLUMNS} FROM scraping_sessions WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    Ok(row)
}

/// Most recently created session for `date`, if any.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn latest_session_for_date(
    pool: &PgPool,
    date: NaiveDate,
) -> Result<Option<SessionRow>, DbError> {
    let row = sqlx::query_as::<_, SessionRow>(&format!(
        "SELECT {SESSION_COLUMNS} FROM scraping_sessions \
         WHERE date = $1 \
         ORDER BY created_at DESC, id DESC \
         LIMIT 1"
    ))
    .bind(date)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}
