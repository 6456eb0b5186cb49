//! SQLite connection pool

use crate::error::{AppError, Result};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use std::path::Path;

pub type SqlitePool = Pool<SqliteConnectionManager>;

/// Per-connection setup: WAL for concurrent readers, and wait on locks
/// instead of failing immediately
const CONNECTION_PRAGMAS: &str =
    "PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL; PRAGMA busy_timeout=5000;";

/// Create a pool over a database file
pub fn create_pool(path: &Path, max_size: u32) -> Result<SqlitePool> {
    let manager = SqliteConnectionManager::file(path)
        .with_init(|conn| conn.execute_batch(CONNECTION_PRAGMAS));

    Pool::builder()
        .max_size(max_size)
        .build(manager)
        .map_err(|e| AppError::StoreUnavailable {
            batch: 0,
            committed: 0,
            reason: format!("Failed to open {}: {}", path.display(), e),
        })
}

/// Single-connection pool over a private in-memory database
///
/// Every pooled in-memory connection is its own database, so the pool is
/// capped at one connection.
pub fn create_memory_pool() -> Result<SqlitePool> {
    let manager = SqliteConnectionManager::memory();
    Pool::builder()
        .max_size(1)
        .build(manager)
        .map_err(AppError::from)
}
