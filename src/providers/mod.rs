//! Market-data provider adapters

pub mod yahoo;

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

pub use yahoo::YahooProvider;

/// Daily bar as reported by a provider, before it is tagged with a symbol
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderBar {
    pub date: NaiveDate,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<i64>,
}

/// Transport and protocol failures of a provider call
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("network unreachable: {0}")]
    Network(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("HTTP {status}")]
    Http { status: u16 },

    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl ProviderError {
    /// Failures that may clear up on their own
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::Network(_)
            | ProviderError::Timeout(_)
            | ProviderError::RateLimited { .. } => true,
            ProviderError::Http { status } => *status >= 500,
            ProviderError::MalformedResponse(_) => false,
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout(err.to_string())
        } else if err.is_decode() {
            ProviderError::MalformedResponse(err.to_string())
        } else if let Some(status) = err.status() {
            ProviderError::Http {
                status: status.as_u16(),
            }
        } else {
            ProviderError::Network(err.to_string())
        }
    }
}

/// Trait that every market-data provider implements
///
/// `start` and `end` are both inclusive calendar dates. An empty vector is a
/// valid answer (holidays, delisted or untraded securities).
#[async_trait]
pub trait PriceProvider: Send + Sync {
    /// Provider ID (e.g., "yahoo")
    fn id(&self) -> &'static str;

    /// Fetch daily bars for `symbol` over `[start, end]`
    async fn fetch_daily_bars(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> std::result::Result<Vec<ProviderBar>, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(ProviderError::Network("reset".into()).is_transient());
        assert!(ProviderError::RateLimited { retry_after_secs: 60 }.is_transient());
        assert!(ProviderError::Http { status: 503 }.is_transient());
        assert!(!ProviderError::Http { status: 404 }.is_transient());
        assert!(!ProviderError::MalformedResponse("bad json".into()).is_transient());
    }
}
