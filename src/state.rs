//! Shared application state
//!
//! Built once per process from the loaded configuration. Every command
//! draws its database handle and provider from here.

use crate::config::SyncConfig;
use crate::db::SqliteDb;
use crate::error::Result;
use crate::providers::{PriceProvider, YahooProvider};
use crate::sync::SyncOrchestrator;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Application state shared across commands
pub struct AppState {
    pub config: SyncConfig,

    /// Price store and symbol registry
    pub db: Arc<SqliteDb>,

    /// Market-data provider
    pub provider: Arc<dyn PriceProvider>,

    /// Set on Ctrl-C; runs stop between symbols
    pub shutdown: Arc<AtomicBool>,
}

impl AppState {
    /// Open the database (running migrations) and build the default provider
    pub fn new(config: SyncConfig) -> Result<Self> {
        let db = Arc::new(SqliteDb::new(&config.database)?);
        let provider: Arc<dyn PriceProvider> = Arc::new(YahooProvider::new(&config.provider)?);
        Ok(Self::with_parts(config, db, provider))
    }

    /// Assemble state around an existing database and provider
    pub fn with_parts(config: SyncConfig, db: Arc<SqliteDb>, provider: Arc<dyn PriceProvider>) -> Self {
        Self {
            config,
            db,
            provider,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Fresh orchestrator wired to this state's store, provider and stop flag
    pub fn orchestrator(&self) -> Result<SyncOrchestrator> {
        Ok(SyncOrchestrator::from_parts(self.db.clone(), self.provider.clone(), &self.config.sync)?
            .with_shutdown(self.shutdown.clone()))
    }
}
