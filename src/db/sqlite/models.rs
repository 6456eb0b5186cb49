//! SQLite database models

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One row of `symbol_mappings`: a security as the broker and the data
/// provider each name it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolMapping {
    pub id: i64,
    pub broker_symbol: String,
    /// Fetch and storage key
    pub provider_symbol: String,
    pub name: Option<String>,
    pub exchange: Option<String>,
    pub asset_type: Option<String>,
    pub is_active: bool,
}

/// One trading day's bar for one provider symbol. `(symbol, date)` is the natural key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRecord {
    pub symbol: String,
    pub date: NaiveDate,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<i64>,
}

/// A persisted price row with its bookkeeping timestamps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredPrice {
    pub record: PriceRecord,
    pub created_at: String,
    pub updated_at: String,
}
