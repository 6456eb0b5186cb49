//! Symbol mapping access
//!
//! `symbol_mappings` is maintained by an administrative process; the sync
//! only reads it. `insert_mapping` exists for seeding.

use super::models::SymbolMapping;
use crate::error::{classify_store_error, Result};
use rusqlite::{params, Connection, Row};

fn map_row(row: &Row<'_>) -> rusqlite::Result<SymbolMapping> {
    Ok(SymbolMapping {
        id: row.get(0)?,
        broker_symbol: row.get(1)?,
        provider_symbol: row.get(2)?,
        name: row.get(3)?,
        exchange: row.get(4)?,
        asset_type: row.get(5)?,
        is_active: row.get(6)?,
    })
}

/// Active mappings in id order
pub fn load_active_mappings(conn: &Connection) -> Result<Vec<SymbolMapping>> {
    let mut stmt = conn
        .prepare(
            "SELECT id, broker_symbol, provider_symbol, name, exchange, asset_type, is_active
             FROM symbol_mappings
             WHERE is_active = 1
             ORDER BY id",
        )
        .map_err(classify_store_error)?;

    let mappings = stmt
        .query_map([], map_row)
        .map_err(classify_store_error)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(classify_store_error)?;

    tracing::info!("Found {} active symbol mappings", mappings.len());
    Ok(mappings)
}

/// Insert or replace a mapping by id
pub fn insert_mapping(conn: &Connection, mapping: &SymbolMapping) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO symbol_mappings
            (id, broker_symbol, provider_symbol, name, exchange, asset_type, is_active)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            mapping.id,
            mapping.broker_symbol,
            mapping.provider_symbol,
            mapping.name,
            mapping.exchange,
            mapping.asset_type,
            mapping.is_active,
        ],
    )
    .map_err(classify_store_error)?;
    Ok(())
}
