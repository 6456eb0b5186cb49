//! Operator diagnostics: setup smoke test and symbol overview

use crate::db::{SqliteDb, SymbolMapping};
use crate::error::Result;
use chrono::NaiveDate;
use serde::Serialize;

/// Number of sample mappings printed by the setup check
const SAMPLE_MAPPINGS: usize = 3;

/// Verify connectivity, the registry, and the price table
///
/// Returns the number of active mappings. Zero mappings is a warning, not
/// an error; the sync would simply have nothing to do.
pub fn run_setup_check(db: &SqliteDb) -> Result<usize> {
    tracing::info!("Testing setup and connectivity...");

    tracing::info!("Testing database connection...");
    db.ping()?;
    tracing::info!("Database connection successful");

    tracing::info!("Testing symbol mappings fetch...");
    let mappings = db.load_active_mappings()?;
    if mappings.is_empty() {
        tracing::warn!("No symbol mappings found. Please check your symbol_mappings table.");
    } else {
        tracing::info!("Found {} symbol mappings", mappings.len());
        tracing::info!("Sample mappings:");
        for (i, m) in mappings.iter().take(SAMPLE_MAPPINGS).enumerate() {
            tracing::info!("  {}. {} -> {}", i + 1, m.broker_symbol, m.provider_symbol);
        }
    }

    tracing::info!("Testing price_history table creation...");
    db.run_migrations()?;
    tracing::info!("Price history table created/verified successfully");

    tracing::info!("Setup test completed successfully!");
    tracing::info!("Next steps:");
    tracing::info!("1. Run 'price-sync backfill' for the initial data fetch");
    tracing::info!("2. Run 'price-sync update daily' for daily updates");
    tracing::info!("3. Run 'price-sync schedule --daemon' or add 'price-sync schedule' to cron");

    Ok(mappings.len())
}

/// One active mapping with its stored history extent
#[derive(Debug, Clone, Serialize)]
pub struct SymbolOverview {
    pub broker_symbol: String,
    pub provider_symbol: String,
    pub name: Option<String>,
    pub last_date: Option<NaiveDate>,
    pub rows: i64,
}

impl SymbolOverview {
    fn from_mapping(mapping: SymbolMapping, last_date: Option<NaiveDate>, rows: i64) -> Self {
        Self {
            broker_symbol: mapping.broker_symbol,
            provider_symbol: mapping.provider_symbol,
            name: mapping.name,
            last_date,
            rows,
        }
    }
}

/// Active mappings in processing order with their watermark and row count
pub fn symbol_overview(db: &SqliteDb) -> Result<Vec<SymbolOverview>> {
    db.load_active_mappings()?
        .into_iter()
        .map(|mapping| {
            let last_date = db.last_price_date(&mapping.provider_symbol)?;
            let rows = db.count_prices(Some(&mapping.provider_symbol))?;
            Ok(SymbolOverview::from_mapping(mapping, last_date, rows))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::PriceRecord;

    fn mapping(id: i64, broker: &str, provider: &str) -> SymbolMapping {
        SymbolMapping {
            id,
            broker_symbol: broker.to_string(),
            provider_symbol: provider.to_string(),
            name: None,
            exchange: None,
            asset_type: None,
            is_active: true,
        }
    }

    #[test]
    fn test_check_on_empty_registry() {
        let db = SqliteDb::in_memory().unwrap();
        assert_eq!(run_setup_check(&db).unwrap(), 0);
    }

    #[test]
    fn test_check_counts_mappings() {
        let db = SqliteDb::in_memory().unwrap();
        for (i, s) in ["AAA", "BBB", "CCC", "DDD"].iter().enumerate() {
            db.insert_mapping(&mapping(i as i64 + 1, s, s)).unwrap();
        }
        assert_eq!(run_setup_check(&db).unwrap(), 4);
    }

    #[test]
    fn test_overview_reports_watermarks() {
        let db = SqliteDb::in_memory().unwrap();
        db.insert_mapping(&mapping(1, "VOD", "VOD.L")).unwrap();
        db.insert_mapping(&mapping(2, "AAPL", "AAPL")).unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 5, 31).unwrap();
        db.upsert_prices(&[PriceRecord {
            symbol: "VOD.L".to_string(),
            date,
            open: Some(70.0),
            high: Some(71.0),
            low: Some(69.5),
            close: Some(70.4),
            volume: Some(1_000),
        }])
        .unwrap();

        let overview = symbol_overview(&db).unwrap();
        assert_eq!(overview.len(), 2);
        assert_eq!(overview[0].provider_symbol, "VOD.L");
        assert_eq!(overview[0].last_date, Some(date));
        assert_eq!(overview[0].rows, 1);
        assert_eq!(overview[1].last_date, None);
        assert_eq!(overview[1].rows, 0);
    }
}
