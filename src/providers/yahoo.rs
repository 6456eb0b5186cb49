//! Yahoo Finance provider adapter
//!
//! Talks to the v8 chart endpoint. The endpoint has no official contract, so
//! every shape assumption is checked and reported as a malformed response.

use crate::config::ProviderConfig;
use crate::error::{AppError, Result};
use crate::providers::{PriceProvider, ProviderBar, ProviderError};
use async_trait::async_trait;
use chrono::{DateTime, Days, FixedOffset, NaiveDate};
use chrono_tz::Tz;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 price-sync";

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    #[serde(default)]
    meta: ChartMeta,
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

/// Exchange clock of the listing; timestamps are session opens in that clock
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ChartMeta {
    exchange_timezone_name: Option<String>,
    gmtoffset: Option<i32>,
}

impl ChartMeta {
    /// Trading date of a session timestamp: exchange timezone, else the
    /// reported GMT offset, else UTC
    fn session_date(&self, ts: i64) -> Option<NaiveDate> {
        let utc = DateTime::from_timestamp(ts, 0)?;
        if let Some(tz) = self
            .exchange_timezone_name
            .as_deref()
            .and_then(|name| name.parse::<Tz>().ok())
        {
            return Some(utc.with_timezone(&tz).date_naive());
        }
        if let Some(offset) = self.gmtoffset.and_then(FixedOffset::east_opt) {
            return Some(utc.with_timezone(&offset).date_naive());
        }
        Some(utc.date_naive())
    }
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct QuoteData {
    open: Vec<Option<f64>>,
    high: Vec<Option<f64>>,
    low: Vec<Option<f64>>,
    close: Vec<Option<f64>>,
    volume: Vec<Option<f64>>,
}

/// Yahoo Finance daily-bar provider
pub struct YahooProvider {
    client: Client,
    base_url: String,
}

impl YahooProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| AppError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Chart URL for an inclusive date range.
    ///
    /// `period2` is exclusive on Yahoo's side, so it points at midnight after `end`.
    fn chart_url(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> String {
        let period1 = start.and_time(chrono::NaiveTime::MIN).and_utc().timestamp();
        let period2 = end
            .checked_add_days(Days::new(1))
            .unwrap_or(end)
            .and_time(chrono::NaiveTime::MIN)
            .and_utc()
            .timestamp();

        format!(
            "{}/v8/finance/chart/{}?period1={}&period2={}&interval=1d&events=history",
            self.base_url,
            urlencoding::encode(symbol),
            period1,
            period2
        )
    }
}

/// Turn a chart payload into bars.
///
/// Yahoo answers "Not Found" for symbols it has no history for; that is an
/// empty result here, not a failure.
fn parse_chart(symbol: &str, resp: ChartResponse) -> std::result::Result<Vec<ProviderBar>, ProviderError> {
    if let Some(err) = resp.chart.error {
        if err.code == "Not Found" {
            tracing::warn!("No data found for symbol: {}", symbol);
            return Ok(Vec::new());
        }
        return Err(ProviderError::MalformedResponse(format!(
            "{}: {}",
            err.code,
            err.description.unwrap_or_default()
        )));
    }

    let data = match resp.chart.result.and_then(|r| r.into_iter().next()) {
        Some(data) => data,
        None => return Ok(Vec::new()),
    };

    // A range with no sessions comes back without timestamps
    let timestamps = match data.timestamp {
        Some(ts) => ts,
        None => return Ok(Vec::new()),
    };

    let quote = data
        .indicators
        .quote
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::MalformedResponse("no quote data".to_string()))?;

    let mut bars = Vec::with_capacity(timestamps.len());
    for (i, &ts) in timestamps.iter().enumerate() {
        let date = data
            .meta
            .session_date(ts)
            .ok_or_else(|| ProviderError::MalformedResponse(format!("invalid timestamp: {}", ts)))?;

        let volume = match quote.volume.get(i).copied().flatten() {
            Some(v) if v.is_finite() && v >= 0.0 => Some(v.round() as i64),
            Some(v) => {
                return Err(ProviderError::MalformedResponse(format!(
                    "invalid volume {} on {}",
                    v, date
                )))
            }
            None => None,
        };

        bars.push(ProviderBar {
            date,
            open: quote.open.get(i).copied().flatten(),
            high: quote.high.get(i).copied().flatten(),
            low: quote.low.get(i).copied().flatten(),
            close: quote.close.get(i).copied().flatten(),
            volume,
        });
    }

    Ok(bars)
}

#[async_trait]
impl PriceProvider for YahooProvider {
    fn id(&self) -> &'static str {
        "yahoo"
    }

    async fn fetch_daily_bars(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> std::result::Result<Vec<ProviderBar>, ProviderError> {
        let url = self.chart_url(symbol, start, end);
        tracing::debug!("GET {}", url);

        let response = self.client.get(&url).send().await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(60);
            return Err(ProviderError::RateLimited { retry_after_secs });
        }

        // Yahoo reports unknown symbols as 404 with a chart error body
        if !status.is_success() && status != StatusCode::NOT_FOUND {
            return Err(ProviderError::Http {
                status: status.as_u16(),
            });
        }

        let chart = response.json::<ChartResponse>().await?;

        parse_chart(symbol, chart)
    }
}
