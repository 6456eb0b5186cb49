//! price-sync CLI
//!
//! Commands:
//! - `backfill` - fetch full history from the configured start date
//! - `update [incremental|daily]` - catch up from stored watermarks, or refresh yesterday and today
//! - `schedule [--daemon]` - run the daily update now, or every day at the configured time
//! - `check` - verify connectivity, mappings and schema
//! - `symbols` - list active mappings with their last stored date

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use price_sync_lib::check::{run_setup_check, symbol_overview};
use price_sync_lib::scheduler::DailyScheduler;
use price_sync_lib::{logging, AppState, RunMode, RunSummary, SyncConfig};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::Ordering;

#[derive(Parser)]
#[command(
    name = "price-sync",
    about = "Historical daily price synchronisation for mapped securities"
)]
struct Cli {
    /// Path to a JSON config file. Defaults to ./price-sync.json when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the full history for every active symbol from the configured start date.
    Backfill,
    /// Bring stored history up to date.
    Update {
        /// incremental: from each symbol's last stored date; daily: yesterday and today only.
        #[arg(value_enum, default_value_t = UpdateMode::Incremental)]
        mode: UpdateMode,
    },
    /// Run the daily update once, or keep running it at the configured time.
    Schedule {
        /// Stay in the foreground and run every day.
        #[arg(long, default_value_t = false)]
        daemon: bool,
    },
    /// Test database connectivity, symbol mappings and the price table.
    Check,
    /// List active symbol mappings with their stored history.
    Symbols,
}

#[derive(Clone, Copy, ValueEnum)]
enum UpdateMode {
    Incremental,
    Daily,
}

impl From<UpdateMode> for RunMode {
    fn from(mode: UpdateMode) -> Self {
        match mode {
            UpdateMode::Incremental => RunMode::Incremental,
            UpdateMode::Daily => RunMode::Daily,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match SyncConfig::load(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = logging::init(&config.log) {
        eprintln!("Error: failed to initialise logging: {e}");
        return ExitCode::FAILURE;
    }

    match run(cli.command, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("Fatal error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Commands, config: SyncConfig) -> Result<()> {
    let state = AppState::new(config)?;

    let shutdown = state.shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received; stopping after the current symbol");
            shutdown.store(true, Ordering::SeqCst);
        }
    });

    match command {
        Commands::Backfill => {
            sync_once(&state, RunMode::Backfill).await?;
        }
        Commands::Update { mode } => {
            sync_once(&state, mode.into()).await?;
        }
        Commands::Schedule { daemon } => {
            let scheduler = DailyScheduler::new(&state.config.schedule)?;
            let job = || daily_job(&state);
            if daemon {
                let stop = async {
                    let _ = tokio::signal::ctrl_c().await;
                };
                scheduler.run_forever(job, stop).await;
            } else {
                scheduler.run_once(job).await?;
            }
        }
        Commands::Check => {
            run_setup_check(&state.db)?;
        }
        Commands::Symbols => {
            print_symbols(&state)?;
        }
    }

    Ok(())
}

async fn sync_once(state: &AppState, mode: RunMode) -> Result<RunSummary> {
    let mut orchestrator = state.orchestrator()?;
    let summary = orchestrator.run(mode).await?;
    Ok(summary)
}

async fn daily_job(state: &AppState) -> price_sync_lib::Result<RunSummary> {
    let mut orchestrator = state.orchestrator()?;
    orchestrator.run(RunMode::Daily).await
}

fn print_symbols(state: &AppState) -> Result<()> {
    let overview = symbol_overview(&state.db)?;
    if overview.is_empty() {
        println!("No active symbol mappings.");
        return Ok(());
    }

    println!(
        "{:<16} {:<16} {:<12} {:>8}  Name",
        "Broker", "Provider", "Last date", "Rows"
    );
    for s in &overview {
        let last = s
            .last_date
            .map(|d| d.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<16} {:<16} {:<12} {:>8}  {}",
            s.broker_symbol,
            s.provider_symbol,
            last,
            s.rows,
            s.name.as_deref().unwrap_or("")
        );
    }
    println!("\n{} active symbol(s)", overview.len());
    Ok(())
}
