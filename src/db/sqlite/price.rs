//! Price history access

use super::models::{PriceRecord, StoredPrice};
use crate::error::{classify_store_error, Result};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};

/// Re-fetched keys overwrite prices and volume and refresh `updated_at`;
/// `created_at` keeps its first-insert value.
const UPSERT_PRICE: &str = "
    INSERT INTO price_history (symbol, date, open, high, low, close, volume)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
    ON CONFLICT (symbol, date) DO UPDATE SET
        open = excluded.open,
        high = excluded.high,
        low = excluded.low,
        close = excluded.close,
        volume = excluded.volume,
        updated_at = strftime('%Y-%m-%d %H:%M:%f', 'now')";

/// Most recent persisted trading date for a symbol
pub fn last_price_date(conn: &Connection, symbol: &str) -> Result<Option<NaiveDate>> {
    let last: Option<NaiveDate> = conn
        .query_row(
            "SELECT MAX(date) FROM price_history WHERE symbol = ?1",
            params![symbol],
            |row| row.get(0),
        )
        .optional()
        .map_err(classify_store_error)?
        .flatten();
    Ok(last)
}

/// Upsert one batch atomically; returns rows inserted or updated
pub fn upsert_prices(conn: &mut Connection, records: &[PriceRecord]) -> Result<usize> {
    let tx = conn.transaction().map_err(classify_store_error)?;

    let mut count = 0;
    {
        let mut stmt = tx.prepare_cached(UPSERT_PRICE).map_err(classify_store_error)?;
        for record in records {
            count += stmt
                .execute(params![
                    record.symbol,
                    record.date,
                    record.open,
                    record.high,
                    record.low,
                    record.close,
                    record.volume,
                ])
                .map_err(classify_store_error)?;
        }
    }

    tx.commit().map_err(classify_store_error)?;
    Ok(count)
}

/// All stored rows for a symbol in date order
pub fn load_prices(conn: &Connection, symbol: &str) -> Result<Vec<StoredPrice>> {
    let mut stmt = conn
        .prepare(
            "SELECT symbol, date, open, high, low, close, volume, created_at, updated_at
             FROM price_history
             WHERE symbol = ?1
             ORDER BY date",
        )
        .map_err(classify_store_error)?;

    let rows = stmt
        .query_map(params![symbol], |row| {
            Ok(StoredPrice {
                record: PriceRecord {
                    symbol: row.get(0)?,
                    date: row.get(1)?,
                    open: row.get(2)?,
                    high: row.get(3)?,
                    low: row.get(4)?,
                    close: row.get(5)?,
                    volume: row.get(6)?,
                },
                created_at: row.get(7)?,
                updated_at: row.get(8)?,
            })
        })
        .map_err(classify_store_error)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(classify_store_error)?;

    Ok(rows)
}

/// Row count, for one symbol or the whole table
pub fn count_prices(conn: &Connection, symbol: Option<&str>) -> Result<i64> {
    let count = match symbol {
        Some(s) => conn.query_row(
            "SELECT COUNT(*) FROM price_history WHERE symbol = ?1",
            params![s],
            |row| row.get(0),
        ),
        None => conn.query_row("SELECT COUNT(*) FROM price_history", [], |row| row.get(0)),
    }
    .map_err(classify_store_error)?;
    Ok(count)
}
