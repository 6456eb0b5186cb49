//! SQLite database module

pub mod models;
mod connection;
mod migrations;
mod price;
mod symbol;

use crate::config::DatabaseConfig;
use crate::error::Result;
use chrono::NaiveDate;
use connection::SqlitePool;
use models::*;

/// SQLite database wrapper
///
/// Each operation checks a connection out of the pool and returns it when
/// done, so nothing is held between symbols.
#[derive(Clone)]
pub struct SqliteDb {
    pool: SqlitePool,
}

impl SqliteDb {
    /// Open the configured database file and run migrations
    pub fn new(config: &DatabaseConfig) -> Result<Self> {
        let path = config.sqlite_path();
        tracing::info!("Connecting to {}", config.describe());

        let db = Self {
            pool: connection::create_pool(&path, config.pool_size)?,
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// Private in-memory database, migrated
    pub fn in_memory() -> Result<Self> {
        let db = Self {
            pool: connection::create_memory_pool()?,
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// Run database migrations
    pub fn run_migrations(&self) -> Result<()> {
        let conn = self.pool.get()?;
        migrations::run_migrations(&conn)
    }

    /// Round-trip a trivial query
    pub fn ping(&self) -> Result<()> {
        let conn = self.pool.get()?;
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .map_err(crate::error::classify_store_error)?;
        Ok(())
    }

    // ========== Symbol Methods ==========

    /// Load active symbol mappings ordered by id
    pub fn load_active_mappings(&self) -> Result<Vec<SymbolMapping>> {
        let conn = self.pool.get()?;
        symbol::load_active_mappings(&conn)
    }

    /// Insert or replace a symbol mapping
    pub fn insert_mapping(&self, mapping: &SymbolMapping) -> Result<()> {
        let conn = self.pool.get()?;
        symbol::insert_mapping(&conn, mapping)
    }

    // ========== Price Methods ==========

    /// Last persisted trading date for a provider symbol
    pub fn last_price_date(&self, symbol: &str) -> Result<Option<NaiveDate>> {
        let conn = self.pool.get()?;
        price::last_price_date(&conn, symbol)
    }

    /// Upsert one batch of price records in a single transaction
    pub fn upsert_prices(&self, records: &[PriceRecord]) -> Result<usize> {
        let mut conn = self.pool.get()?;
        price::upsert_prices(&mut conn, records)
    }

    /// Stored rows for a provider symbol in date order
    pub fn load_prices(&self, symbol: &str) -> Result<Vec<StoredPrice>> {
        let conn = self.pool.get()?;
        price::load_prices(&conn, symbol)
    }

    /// Number of stored rows, optionally for one symbol
    pub fn count_prices(&self, symbol: Option<&str>) -> Result<i64> {
        let conn = self.pool.get()?;
        price::count_prices(&conn, symbol)
    }
}
