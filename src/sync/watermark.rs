//! Fetch window derivation
//!
//! All comparisons are on calendar dates. The time of day a job runs never
//! moves a window boundary.

use crate::db::SqliteDb;
use crate::error::Result;
use chrono::{Days, NaiveDate};
use serde::Serialize;
use std::sync::Arc;

/// Source of the last persisted date per symbol
pub trait WatermarkSource: Send + Sync {
    fn last_price_date(&self, symbol: &str) -> Result<Option<NaiveDate>>;
}

impl WatermarkSource for SqliteDb {
    fn last_price_date(&self, symbol: &str) -> Result<Option<NaiveDate>> {
        SqliteDb::last_price_date(self, symbol)
    }
}

/// Date range to request for one symbol, both ends inclusive
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchWindow {
    pub symbol: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// Outcome of window resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowDecision {
    Fetch(FetchWindow),
    /// Already up to date; not an error
    NoFetchNeeded,
}

impl FetchWindow {
    /// `[start, today]`, or `NoFetchNeeded` unless `start` is strictly before `today`
    pub fn catch_up(symbol: &str, start: NaiveDate, today: NaiveDate) -> WindowDecision {
        if start >= today {
            return WindowDecision::NoFetchNeeded;
        }
        WindowDecision::Fetch(FetchWindow {
            symbol: symbol.to_string(),
            start,
            end: today,
        })
    }

    /// Fixed yesterday-through-today window used by the daily run.
    ///
    /// Ignores what is already stored, so a missed day is not backfilled here.
    pub fn daily(symbol: &str, today: NaiveDate) -> FetchWindow {
        FetchWindow {
            symbol: symbol.to_string(),
            start: today.checked_sub_days(Days::new(1)).unwrap_or(today),
            end: today,
        }
    }
}

/// Works out the next window from the stored watermark
pub struct WatermarkResolver {
    source: Arc<dyn WatermarkSource>,
}

impl WatermarkResolver {
    pub fn new(source: Arc<dyn WatermarkSource>) -> Self {
        Self { source }
    }

    /// No history: `[configured_start, today]`. Watermark `D`: `[D + 1, today]`.
    pub fn resolve(
        &self,
        symbol: &str,
        configured_start: NaiveDate,
        today: NaiveDate,
    ) -> Result<WindowDecision> {
        let start = match self.source.last_price_date(symbol)? {
            Some(last) => {
                let next = last.checked_add_days(Days::new(1)).unwrap_or(last);
                tracing::info!("Updating {} from {}", symbol, next);
                next
            }
            None => {
                tracing::info!(
                    "First time fetching data for {} from {}",
                    symbol,
                    configured_start
                );
                configured_start
            }
        };

        let decision = FetchWindow::catch_up(symbol, start, today);
        if decision == WindowDecision::NoFetchNeeded {
            tracing::info!("No new data needed for {}", symbol);
        }
        Ok(decision)
    }
}
