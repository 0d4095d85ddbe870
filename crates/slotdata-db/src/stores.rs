//! Database operations for the `stores` table.

use chrono::{DateTime, Utc};
use slotdata_core::SeedStore;
use sqlx::PgPool;

use crate::DbError;

/// A row from the `stores` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StoreRow {
    pub id: i64,
    pub store_id: String,
    pub name: Option<String>,
    pub prefecture: Option<String>,
    pub is_active: bool,
    pub last_success_at: Option<DateTime<Utc>>,
    pub consecutive_failures: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const STORE_COLUMNS: &str = "id, store_id, name, prefecture, is_active, last_success_at, \
                             consecutive_failures, created_at, updated_at";

/// Returns the store with `store_id`, creating an active, unnamed row on
/// first encounter.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn get_or_create_store(pool: &PgPool, store_id: &str) -> Result<StoreRow, DbError> {
    // The no-op update makes RETURNING yield the existing row on conflict.
    let row = sqlx::query_as::<_, StoreRow>(&format!(
        "INSERT INTO stores (store_id) VALUES ($1) \
         ON CONFLICT (store_id) DO UPDATE SET store_id = EXCLUDED.store_id \
         RETURNING {STORE_COLUMNS}"
    ))
    .bind(store_id)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Fetches a store by its site id.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists, or [`DbError::Sqlx`] if
/// the query fails.
pub async fn get_store(pool: &PgPool, store_id: &str) -> Result<StoreRow, DbError> {
    let row = sqlx::query_as::<_, StoreRow>(&format!(
        "SELECT {STORE_COLUMNS} FROM stores WHERE store_id = $1"
    ))
    .bind(store_id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    Ok(row)
}

/// Site ids of every active store, ordered by id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_active_store_ids(pool: &PgPool) -> Result<Vec<String>, DbError> {
    let ids = sqlx::query_scalar::<_, String>(
        "SELECT store_id FROM stores WHERE is_active = TRUE ORDER BY store_id",
    )
    .fetch_all(pool)
    .await?;

    Ok(ids)
}

/// Inserts seed stores that do not exist yet. Existing rows are untouched.
///
/// Returns the number of stores inserted.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if an insert fails.
pub async fn seed_stores(pool: &PgPool, seeds: &[SeedStore]) -> Result<u64, DbError> {
    let mut inserted = 0;
    for seed in seeds {
        let result = sqlx::query(
            "INSERT INTO stores (store_id, name, prefecture) VALUES ($1, $2, $3) \
             ON CONFLICT (store_id) DO NOTHING",
        )
        .bind(&seed.store_id)
        .bind(seed.name.as_deref())
        .bind(seed.prefecture.as_deref())
        .execute(pool)
        .await?;
        inserted += result.rows_affected();
    }

    Ok(inserted)
}

/// Stamps `last_success_at = NOW()` and resets the failure streak.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the store does not exist, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn mark_store_success(pool: &PgPool, store_id: &str) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE stores \
         SET last_success_at = NOW(), consecutive_failures = 0, updated_at = NOW() \
         WHERE store_id = $1",
    )
    .bind(store_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }

    Ok(())
}

/// Adds one to the store's consecutive-failure count.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the store does not exist, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn increment_store_failures(pool: &PgPool, store_id: &str) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE stores \
         SET consecutive_failures = consecutive_failures + 1, updated_at = NOW() \
         WHERE store_id = $1",
    )
    .bind(store_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }

    Ok(())
}
