//! Relational store access

pub mod sqlite;

pub use sqlite::models::{PriceRecord, StoredPrice, SymbolMapping};
pub use sqlite::SqliteDb;
