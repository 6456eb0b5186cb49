//! SQLite database migrations

use crate::error::{classify_store_error, Result};
use rusqlite::Connection;

/// Run all database migrations
pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS migrations (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        [],
    )
    .map_err(classify_store_error)?;

    run_migration(conn, "001_symbol_mappings", CREATE_SYMBOL_MAPPINGS_TABLE)?;
    run_migration(conn, "002_price_history", CREATE_PRICE_HISTORY_TABLE)?;

    tracing::info!("Price history table created/verified successfully");
    Ok(())
}

fn run_migration(conn: &Connection, name: &str, sql: &str) -> Result<()> {
    let exists: bool = conn
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM migrations WHERE name = ?)",
            [name],
            |row| row.get(0),
        )
        .map_err(classify_store_error)?;

    if !exists {
        tracing::info!("Running migration: {}", name);
        conn.execute_batch(sql)
            .map_err(classify_store_error)?;
        conn.execute("INSERT INTO migrations (name) VALUES (?)", [name])
            .map_err(classify_store_error)?;
    }

    Ok(())
}

const CREATE_SYMBOL_MAPPINGS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS symbol_mappings (
    id INTEGER PRIMARY KEY,
    broker_symbol TEXT NOT NULL,
    provider_symbol TEXT NOT NULL,
    name TEXT,
    exchange TEXT,
    asset_type TEXT,
    is_active INTEGER NOT NULL DEFAULT 1
);
CREATE INDEX IF NOT EXISTS idx_symbol_mappings_active ON symbol_mappings(is_active);
"#;

const CREATE_PRICE_HISTORY_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS price_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    symbol TEXT NOT NULL,
    date TEXT NOT NULL,
    open REAL,
    high REAL,
    low REAL,
    close REAL,
    volume INTEGER CHECK (volume IS NULL OR volume >= 0),
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now')),
    updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now')),
    UNIQUE(symbol, date)
);
CREATE INDEX IF NOT EXISTS idx_price_history_symbol ON price_history(symbol);
CREATE INDEX IF NOT EXISTS idx_price_history_date ON price_history(date);
CREATE INDEX IF NOT EXISTS idx_price_history_symbol_date ON price_history(symbol, date);
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        let applied: i64 = conn
            .query_row("SELECT COUNT(*) FROM migrations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(applied, 2);
    }

    #[test]
    fn test_natural_key_is_unique() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        conn.execute(
            "INSERT INTO price_history (symbol, date, close) VALUES ('ABC', '2024-06-03', 1.0)",
            [],
        )
        .unwrap();
        let dup = conn.execute(
            "INSERT INTO price_history (symbol, date, close) VALUES ('ABC', '2024-06-03', 2.0)",
            [],
        );
        assert!(dup.is_err());
    }
}
