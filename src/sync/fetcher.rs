//! Provider fetch and normalisation

use crate::db::PriceRecord;
use crate::error::{AppError, Result};
use crate::providers::{PriceProvider, ProviderBar};
use crate::sync::watermark::FetchWindow;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Retrieves one symbol's bars for a window and shapes them into records
///
/// No retries here; retry policy belongs to the orchestrator.
pub struct PriceFetcher {
    provider: Arc<dyn PriceProvider>,
}

impl PriceFetcher {
    pub fn new(provider: Arc<dyn PriceProvider>) -> Self {
        Self { provider }
    }

    pub fn provider_id(&self) -> &'static str {
        self.provider.id()
    }

    /// Fetch `window`. An empty result is valid and is not an error.
    pub async fn fetch(&self, window: &FetchWindow) -> Result<Vec<PriceRecord>> {
        tracing::info!(
            "Fetching data for {} from {} to {}",
            window.symbol,
            window.start,
            window.end
        );

        let bars = self
            .provider
            .fetch_daily_bars(&window.symbol, window.start, window.end)
            .await
            .map_err(|source| AppError::FetchFailed {
                symbol: window.symbol.clone(),
                source,
            })?;

        let records = normalize(window, bars);
        if records.is_empty() {
            tracing::warn!("No data found for symbol: {}", window.symbol);
        } else {
            tracing::info!(
                "Successfully fetched {} records for {}",
                records.len(),
                window.symbol
            );
        }
        Ok(records)
    }
}

/// Tag bars with the symbol, keep those inside the window, drop bars with
/// nothing reported, and collapse repeated dates (last one wins).
/// Output is in date order.
fn normalize(window: &FetchWindow, bars: Vec<ProviderBar>) -> Vec<PriceRecord> {
    let mut by_date = BTreeMap::new();

    for bar in bars {
        if bar.date < window.start || bar.date > window.end {
            continue;
        }
        if bar.open.is_none()
            && bar.high.is_none()
            && bar.low.is_none()
            && bar.close.is_none()
            && bar.volume.is_none()
        {
            continue;
        }
        by_date.insert(
            bar.date,
            PriceRecord {
                symbol: window.symbol.clone(),
                date: bar.date,
                open: bar.open,
                high: bar.high,
                low: bar.low,
                close: bar.close,
                volume: bar.volume,
            },
        );
    }

    by_date.into_values().collect()
}
