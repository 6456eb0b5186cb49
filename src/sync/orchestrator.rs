//! Per-run driver: registry → (watermark → fetch → upsert) per symbol → summary
//!
//! Symbols are processed strictly one after another. A failing symbol is
//! recorded and the run moves on; only an unreadable registry ends the run.
//! Pacing and retry backoff go through [`Pacer`], and "today" comes from
//! [`Clock`], so both can be faked in tests.

use crate::config::SyncSettings;
use crate::db::{SqliteDb, SymbolMapping};
use crate::error::{AppError, Result};
use crate::providers::{PriceProvider, ProviderError};
use crate::sync::fetcher::PriceFetcher;
use crate::sync::registry::SymbolRegistry;
use crate::sync::store::UpsertStore;
use crate::sync::summary::{RunSummary, SymbolStatus};
use crate::sync::watermark::{FetchWindow, WatermarkResolver, WindowDecision};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;

/// Upper bound on a single retry backoff
const MAX_BACKOFF: Duration = Duration::from_secs(300);

/// Window selection strategy; the per-symbol flow is shared
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Catch up from the stored watermark to today
    Incremental,
    /// Yesterday through today, watermark not consulted
    Daily,
    /// Configured start date through today for every symbol
    Backfill,
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunMode::Incremental => "incremental",
            RunMode::Daily => "daily",
            RunMode::Backfill => "backfill",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    Completed,
    Fatal,
}

/// Suspension point between symbols and between retries
#[async_trait]
pub trait Pacer: Send + Sync {
    async fn pause(&self, duration: Duration);
}

/// Real-time pacing on the tokio timer
pub struct TokioPacer;

#[async_trait]
impl Pacer for TokioPacer {
    async fn pause(&self, duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }
}

/// Source of the current calendar date
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

/// Local wall-clock date
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        chrono::Local::now().date_naive()
    }
}

/// Run parameters taken from configuration
#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub start_date: NaiveDate,
    pub rate_limit_delay: Duration,
    /// Extra attempts for retryable failures; 0 means a single attempt
    pub max_retries: u32,
    pub retry_base_delay: Duration,
}

impl SyncOptions {
    pub fn from_settings(settings: &SyncSettings) -> Result<Self> {
        Ok(Self {
            start_date: settings.start_date()?,
            rate_limit_delay: settings.rate_limit_delay(),
            max_retries: settings.max_retries,
            retry_base_delay: settings.retry_base_delay(),
        })
    }
}

/// Final result for one symbol after any retries
struct SymbolOutcome {
    result: Result<SymbolStatus>,
    /// Rows written across every attempt
    rows: usize,
    attempts: u32,
}

/// Drives one synchronisation pass over all active symbols
pub struct SyncOrchestrator {
    registry: SymbolRegistry,
    resolver: WatermarkResolver,
    fetcher: PriceFetcher,
    store: UpsertStore,
    options: SyncOptions,
    pacer: Arc<dyn Pacer>,
    clock: Arc<dyn Clock>,
    shutdown: Arc<AtomicBool>,
    state: RunState,
}

impl SyncOrchestrator {
    pub fn new(
        registry: SymbolRegistry,
        resolver: WatermarkResolver,
        fetcher: PriceFetcher,
        store: UpsertStore,
        options: SyncOptions,
    ) -> Self {
        Self {
            registry,
            resolver,
            fetcher,
            store,
            options,
            pacer: Arc::new(TokioPacer),
            clock: Arc::new(SystemClock),
            shutdown: Arc::new(AtomicBool::new(false)),
            state: RunState::Idle,
        }
    }

    /// Wire every component to one database and one provider
    pub fn from_parts(
        db: Arc<SqliteDb>,
        provider: Arc<dyn PriceProvider>,
        settings: &SyncSettings,
    ) -> Result<Self> {
        let options = SyncOptions::from_settings(settings)?;
        Ok(Self::new(
            SymbolRegistry::new(db.clone()),
            WatermarkResolver::new(db.clone()),
            PriceFetcher::new(provider),
            UpsertStore::new(db, settings.batch_size),
            options,
        ))
    }

    pub fn with_pacer(mut self, pacer: Arc<dyn Pacer>) -> Self {
        self.pacer = pacer;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Flag checked between symbols; setting it ends the run early but cleanly
    pub fn with_shutdown(mut self, shutdown: Arc<AtomicBool>) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Run one pass. `Err` only for fatal conditions; per-symbol failures
    /// are inside the summary.
    pub async fn run(&mut self, mode: RunMode) -> Result<RunSummary> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let span = tracing::info_span!("sync_run", run_id = %run_id, mode = %mode);
        self.run_inner(run_id, mode).instrument(span).await
    }

    async fn run_inner(&mut self, run_id: String, mode: RunMode) -> Result<RunSummary> {
        self.state = RunState::Running;
        tracing::info!(
            "Starting {} price data update process via {}",
            mode,
            self.fetcher.provider_id()
        );

        let mappings = match self.registry.list_active() {
            Ok(m) => m,
            Err(e) => {
                tracing::error!("Error fetching symbol mappings: {}", e);
                self.state = RunState::Fatal;
                return Err(e);
            }
        };

        let today = self.clock.today();
        let mut summary = RunSummary::new(run_id, mode.to_string());

        if mappings.is_empty() {
            tracing::warn!("No symbol mappings found");
        }

        let total = mappings.len();
        for (i, mapping) in mappings.iter().enumerate() {
            if self.shutdown.load(Ordering::SeqCst) {
                tracing::warn!(
                    "Stop requested; {} of {} symbols not processed",
                    total - i,
                    total
                );
                summary.interrupted = true;
                break;
            }

            let span = tracing::info_span!("symbol", symbol = %mapping.provider_symbol);
            let outcome = self
                .process_with_retry(mapping, mode, today)
                .instrument(span)
                .await;

            match outcome.result {
                Ok(status) => {
                    summary.record_success(&mapping.provider_symbol, status, outcome.rows);
                }
                Err(e) => {
                    tracing::error!(
                        "Error processing symbol {} ({}): {}",
                        mapping.provider_symbol,
                        mapping.broker_symbol,
                        e
                    );
                    summary.record_failure(
                        &mapping.provider_symbol,
                        outcome.attempts,
                        outcome.rows,
                        &e,
                    );
                }
            }

            if i + 1 < total {
                self.pacer.pause(self.options.rate_limit_delay).await;
            }
        }

        summary.log();
        self.state = RunState::Completed;
        Ok(summary)
    }

    /// Process one symbol, retrying retryable failures with exponential
    /// backoff. Rows committed by a failed attempt count toward the outcome.
    async fn process_with_retry(
        &self,
        mapping: &SymbolMapping,
        mode: RunMode,
        today: NaiveDate,
    ) -> SymbolOutcome {
        let mut attempt: u32 = 1;
        let mut carried = 0;
        loop {
            let result = self.process_symbol(mapping, mode, today).await;
            match result {
                Ok((status, rows)) => {
                    let rows = carried + rows;
                    let status = if rows > 0 { SymbolStatus::Updated } else { status };
                    return SymbolOutcome {
                        result: Ok(status),
                        rows,
                        attempts: attempt,
                    };
                }
                Err(e) if e.is_retryable() && attempt <= self.options.max_retries => {
                    carried += e.committed_rows();
                    let delay = self.backoff(attempt, &e);
                    tracing::warn!(
                        "Attempt {} for {} failed ({}); retrying in {:?}",
                        attempt,
                        mapping.provider_symbol,
                        e,
                        delay
                    );
                    self.pacer.pause(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    return SymbolOutcome {
                        rows: carried + e.committed_rows(),
                        result: Err(e),
                        attempts: attempt,
                    };
                }
            }
        }
    }

    fn backoff(&self, attempt: u32, err: &AppError) -> Duration {
        let exp = 2u32.saturating_pow(attempt.saturating_sub(1));
        let mut delay = self.options.retry_base_delay.saturating_mul(exp);
        if let AppError::FetchFailed {
            source: ProviderError::RateLimited { retry_after_secs },
            ..
        } = err
        {
            delay = delay.max(Duration::from_secs(*retry_after_secs));
        }
        delay.min(MAX_BACKOFF)
    }

    /// resolve window → fetch → upsert
    async fn process_symbol(
        &self,
        mapping: &SymbolMapping,
        mode: RunMode,
        today: NaiveDate,
    ) -> Result<(SymbolStatus, usize)> {
        let symbol = mapping.provider_symbol.as_str();
        tracing::info!("Processing {} -> {}", mapping.broker_symbol, symbol);

        let decision = match mode {
            RunMode::Incremental => self.resolver.resolve(symbol, self.options.start_date, today)?,
            RunMode::Daily => WindowDecision::Fetch(FetchWindow::daily(symbol, today)),
            RunMode::Backfill => FetchWindow::catch_up(symbol, self.options.start_date, today),
        };

        let window = match decision {
            WindowDecision::Fetch(window) => window,
            WindowDecision::NoFetchNeeded => return Ok((SymbolStatus::UpToDate, 0)),
        };

        let records = self.fetcher.fetch(&window).await?;
        if records.is_empty() {
            tracing::warn!("No new data found for {}", symbol);
            return Ok((SymbolStatus::NoData, 0));
        }

        let rows = self.store.upsert(&records)?;
        tracing::info!("Successfully processed {} with {} new records", symbol, rows);
        Ok((SymbolStatus::Updated, rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn orchestrator_with(options: SyncOptions) -> SyncOrchestrator {
        struct NoProvider;

        #[async_trait]
        impl PriceProvider for NoProvider {
            fn id(&self) -> &'static str {
                "none"
            }

            async fn fetch_daily_bars(
                &self,
                _symbol: &str,
                _start: NaiveDate,
                _end: NaiveDate,
            ) -> std::result::Result<Vec<crate::providers::ProviderBar>, ProviderError> {
                Ok(Vec::new())
            }
        }

        let db = Arc::new(SqliteDb::in_memory().unwrap());
        SyncOrchestrator::new(
            SymbolRegistry::new(db.clone()),
            WatermarkResolver::new(db.clone()),
            PriceFetcher::new(Arc::new(NoProvider)),
            UpsertStore::new(db, 100),
            options,
        )
    }

    fn options() -> SyncOptions {
        SyncOptions {
            start_date: NaiveDate::from_ymd_opt(2000, 1, 1).unwrap(),
            rate_limit_delay: Duration::from_secs(1),
            max_retries: 3,
            retry_base_delay: Duration::from_millis(500),
        }
    }

    fn fetch_error(source: ProviderError) -> AppError {
        AppError::FetchFailed {
            symbol: "ABC".to_string(),
            source,
        }
    }

    #[test]
    fn test_backoff_doubles() {
        let orch = orchestrator_with(options());
        let err = fetch_error(ProviderError::Timeout("slow".into()));
        assert_eq!(orch.backoff(1, &err), Duration::from_millis(500));
        assert_eq!(orch.backoff(2, &err), Duration::from_millis(1000));
        assert_eq!(orch.backoff(3, &err), Duration::from_millis(2000));
    }

    #[test]
    fn test_backoff_honours_retry_after_and_cap() {
        let orch = orchestrator_with(options());
        let limited = fetch_error(ProviderError::RateLimited { retry_after_secs: 30 });
        assert_eq!(orch.backoff(1, &limited), Duration::from_secs(30));

        let forever = fetch_error(ProviderError::RateLimited { retry_after_secs: 86_400 });
        assert_eq!(orch.backoff(1, &forever), MAX_BACKOFF);
        assert_eq!(orch.backoff(40, &fetch_error(ProviderError::Timeout("slow".into()))), MAX_BACKOFF);
    }

    #[tokio::test]
    async fn test_empty_registry_completes() {
        let mut orch = orchestrator_with(options());
        assert_eq!(orch.state(), RunState::Idle);
        let summary = orch.run(RunMode::Incremental).await.unwrap();
        assert_eq!(summary.attempted, 0);
        assert_eq!(orch.state(), RunState::Completed);
    }

    #[test]
    fn test_mode_names() {
        assert_eq!(RunMode::Incremental.to_string(), "incremental");
        assert_eq!(RunMode::Daily.to_string(), "daily");
        assert_eq!(RunMode::Backfill.to_string(), "backfill");
    }
}
