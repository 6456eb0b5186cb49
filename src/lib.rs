//! Price Sync - historical price synchronisation
//!
//! Keeps a daily OHLCV history table current for every active symbol
//! mapping, pulling bars from a market-data provider and upserting them
//! idempotently.

pub mod check;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod providers;
pub mod scheduler;
pub mod state;
pub mod sync;

pub use config::SyncConfig;
pub use error::{AppError, Result};
pub use state::AppState;
pub use sync::{RunMode, RunSummary, SyncOrchestrator};
