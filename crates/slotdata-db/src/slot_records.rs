//! Bulk writes for `daily_slot_data`.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use slotdata_core::SlotRecord;
use sqlx::PgPool;

use crate::DbError;

/// Inserts `records` in chunks of `batch_size`, skipping ids that already
/// exist. All chunks share one transaction, so a failure writes nothing.
///
/// Returns the number of rows actually inserted.
///
/// Each chunk is a single `INSERT … SELECT * FROM UNNEST(…)` with
/// `ON CONFLICT (id) DO NOTHING`; existing rows are never overwritten.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any chunk fails or the commit fails.
pub async fn upsert_slot_records(
    pool: &PgPool,
    records: &[SlotRecord],
    batch_size: usize,
) -> Result<u64, DbError> {
    if records.is_empty() {
        return Ok(0);
    }

    let mut tx = pool.begin().await?;
    let mut inserted = 0;

    for chunk in records.chunks(batch_size.max(1)) {
        let columns = Columns::from_records(chunk);
        let result = sqlx::query(
            "INSERT INTO daily_slot_data \
                 (id, date, store_id, machine_id, machine_number, machine_name, \
                  credit_difference, game_count, payout_rate, bb, rb, synthesis, \
                  bb_rate, rb_rate, win_rate, source_url, session_id, natural_key, aux) \
             SELECT * FROM UNNEST(\
                  $1::int8[], $2::date[], $3::text[], $4::text[], $5::int8[], $6::text[], \
                  $7::int8[], $8::int8[], $9::numeric[], $10::int8[], $11::int8[], $12::text[], \
                  $13::text[], $14::text[], $15::numeric[], $16::text[], $17::int8[], \
                  $18::text[], $19::jsonb[]) \
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(&columns.ids)
        .bind(&columns.dates)
        .bind(&columns.store_ids)
        .bind(&columns.machine_ids)
        .bind(&columns.machine_numbers)
        .bind(&columns.machine_names)
        .bind(&columns.credit_differences)
        .bind(&columns.game_counts)
        .bind(&columns.payout_rates)
        .bind(&columns.bbs)
        .bind(&columns.rbs)
        .bind(&columns.synthesis)
        .bind(&columns.bb_rates)
        .bind(&columns.rb_rates)
        .bind(&columns.win_rates)
        .bind(&columns.source_urls)
        .bind(&columns.session_ids)
        .bind(&columns.natural_keys)
        .bind(&columns.aux)
        .execute(&mut *tx)
        .await?;
        inserted += result.rows_affected();
    }

    tx.commit().await?;
    Ok(inserted)
}

/// Rows stored for one store and date.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn count_slot_records(
    pool: &PgPool,
    store_id: &str,
    date: NaiveDate,
) -> Result<i64, DbError> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM daily_slot_data WHERE store_id = $1 AND date = $2",
    )
    .bind(store_id)
    .bind(date)
    .fetch_one(pool)
    .await?;

    Ok(count)
}

/// Parallel column vectors for UNNEST binding.
#[derive(Default)]
struct Columns {
    ids: Vec<i64>,
    dates: Vec<NaiveDate>,
    store_ids: Vec<String>,
    machine_ids: Vec<Option<String>>,
    machine_numbers: Vec<Option<i64>>,
    machine_names: Vec<Option<String>>,
    credit_differences: Vec<Option<i64>>,
    game_counts: Vec<Option<i64>>,
    payout_rates: Vec<Option<Decimal>>,
    bbs: Vec<Option<i64>>,
    rbs: Vec<Option<i64>>,
    synthesis: Vec<Option<String>>,
    bb_rates: Vec<Option<String>>,
    rb_rates: Vec<Option<String>>,
    win_rates: Vec<Option<Decimal>>,
    source_urls: Vec<String>,
    session_ids: Vec<Option<i64>>,
    natural_keys: Vec<String>,
    aux: Vec<Option<serde_json::Value>>,
}

impl Columns {
    fn from_records(records: &[SlotRecord]) -> Self {
        let mut c = Columns::default();
        for r in records {
            c.ids.push(r.id);
            c.dates.push(r.date);
            c.store_ids.push(r.store_id.clone());
            c.machine_ids.push(r.machine_id.clone());
            c.machine_numbers.push(r.machine_number);
            c.machine_names.push(r.machine_name.clone());
            c.credit_differences.push(r.credit_difference);
            c.game_counts.push(r.game_count);
            c.payout_rates.push(r.payout_rate);
            c.bbs.push(r.bb);
            c.rbs.push(r.rb);
            c.synthesis.push(r.synthesis.clone());
            c.bb_rates.push(r.bb_rate.clone());
            c.rb_rates.push(r.rb_rate.clone());
            c.win_rates.push(r.win_rate);
            c.source_urls.push(r.source_url.clone());
            c.session_ids.push(r.session_id);
            c.natural_keys.push(r.natural_key.clone());
            c.aux.push(r.aux.clone());
        }
        c
    }
}
