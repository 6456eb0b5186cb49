//! Configuration
//!
//! Built once by the binary and handed to each component. Values come from
//! defaults, then an optional JSON file, then environment variables.

use crate::error::{AppError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "price-sync.json";

/// Relational store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: Option<String>,
    pub password: Option<String>,
    pub name: String,
    /// SQLite file; `{name}.db` when unset
    pub path: Option<PathBuf>,
    pub pool_size: u32,
}

/// Synchronisation behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    /// Backfill start (YYYY-MM-DD)
    pub start_date: String,
    /// Pause between symbols, in seconds
    pub rate_limit_delay_secs: f64,
    pub batch_size: usize,
    /// Extra attempts for transient failures; 0 keeps one attempt per symbol
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
}

/// Market-data provider client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

/// Log settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// trace, debug, info, warn, error
    pub level: String,
    /// Append-only log file; `None` logs to stdout only
    pub file: Option<PathBuf>,
}

/// Daily schedule for the `schedule --daemon` loop
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub hour: u32,
    pub minute: u32,
    pub timezone: String,
}

/// Full application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub database: DatabaseConfig,
    pub sync: SyncSettings,
    pub provider: ProviderConfig,
    pub log: LogConfig,
    pub schedule: ScheduleConfig,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 6543,
            user: None,
            password: None,
            name: "portfolio".to_string(),
            path: None,
            pool_size: 4,
        }
    }
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            start_date: "2000-01-01".to_string(),
            rate_limit_delay_secs: 1.0,
            batch_size: 1000,
            max_retries: 0,
            retry_base_delay_ms: 500,
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://query2.finance.yahoo.com".to_string(),
            timeout_secs: 30,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: Some(PathBuf::from("historical_prices.log")),
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            hour: 18,
            minute: 30,
            timezone: "America/New_York".to_string(),
        }
    }
}

impl DatabaseConfig {
    /// SQLite file backing the store
    pub fn sqlite_path(&self) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("{}.db", self.name)))
    }

    /// Human-readable target for logs, password redacted
    pub fn describe(&self) -> String {
        let user = self.user.as_deref().unwrap_or("<none>");
        let password = if self.password.is_some() { "****" } else { "<none>" };
        format!(
            "{}@{}:{}/{} (password {}, file {})",
            user,
            self.host,
            self.port,
            self.name,
            password,
            self.sqlite_path().display()
        )
    }
}

impl SyncSettings {
    pub fn start_date(&self) -> Result<NaiveDate> {
        NaiveDate::parse_from_str(&self.start_date, "%Y-%m-%d").map_err(|e| {
            AppError::Config(format!("Invalid start date '{}': {}", self.start_date, e))
        })
    }

    pub fn rate_limit_delay(&self) -> Duration {
        Duration::from_secs_f64(self.rate_limit_delay_secs)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }
}

impl ScheduleConfig {
    pub fn timezone(&self) -> Result<chrono_tz::Tz> {
        self.timezone
            .parse::<chrono_tz::Tz>()
            .map_err(|e| AppError::Config(format!("Invalid timezone '{}': {}", self.timezone, e)))
    }
}

impl SyncConfig {
    /// Load from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config: SyncConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Defaults, then `path` (or the default file if present), then the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => Self::from_file(DEFAULT_CONFIG_FILE)?,
            None => Self::default(),
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from an environment lookup
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("DB_HOST") {
            self.database.host = v;
        }
        if let Some(v) = lookup("DB_PORT") {
            self.database.port = parse_env("DB_PORT", &v)?;
        }
        if let Some(v) = lookup("DB_USER") {
            self.database.user = Some(v);
        }
        if let Some(v) = lookup("DB_PASSWORD") {
            self.database.password = Some(v);
        }
        if let Some(v) = lookup("DB_NAME") {
            self.database.name = v;
        }
        if let Some(v) = lookup("DB_PATH") {
            self.database.path = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("START_DATE") {
            self.sync.start_date = v;
        }
        if let Some(v) = lookup("RATE_LIMIT_DELAY") {
            self.sync.rate_limit_delay_secs = parse_env("RATE_LIMIT_DELAY", &v)?;
        }
        if let Some(v) = lookup("BATCH_SIZE") {
            self.sync.batch_size = parse_env("BATCH_SIZE", &v)?;
        }
        if let Some(v) = lookup("MAX_RETRIES") {
            self.sync.max_retries = parse_env("MAX_RETRIES", &v)?;
        }
        if let Some(v) = lookup("PROVIDER_BASE_URL") {
            self.provider.base_url = v;
        }
        if let Some(v) = lookup("LOG_LEVEL") {
            self.log.level = v.to_lowercase();
        }
        if let Some(v) = lookup("LOG_FILE") {
            self.log.file = if v.is_empty() { None } else { Some(PathBuf::from(v)) };
        }
        if let Some(v) = lookup("SCHEDULE_TZ") {
            self.schedule.timezone = v;
        }
        Ok(())
    }

    /// Reject configurations no run can work with
    pub fn validate(&self) -> Result<()> {
        if self.sync.batch_size == 0 {
            return Err(AppError::Config("batch_size must be at least 1".to_string()));
        }
        if self.database.pool_size == 0 {
            return Err(AppError::Config("pool_size must be at least 1".to_string()));
        }
        if !self.sync.rate_limit_delay_secs.is_finite() || self.sync.rate_limit_delay_secs < 0.0 {
            return Err(AppError::Config(format!(
                "rate_limit_delay_secs must be a non-negative number, got {}",
                self.sync.rate_limit_delay_secs
            )));
        }
        if self.provider.timeout_secs == 0 {
            return Err(AppError::Config("provider timeout must be at least 1 second".to_string()));
        }
        if self.schedule.hour > 23 || self.schedule.minute > 59 {
            return Err(AppError::Config(format!(
                "Invalid schedule time {:02}:{:02}",
                self.schedule.hour, self.schedule.minute
            )));
        }
        self.sync.start_date()?;
        self.schedule.timezone()?;
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|e| AppError::Config(format!("Invalid {} '{}': {}", key, value, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.database.port, 6543);
        assert_eq!(config.sync.start_date, "2000-01-01");
        assert_eq!(config.sync.batch_size, 1000);
        assert_eq!(config.sync.max_retries, 0);
        assert_eq!(config.sync.rate_limit_delay(), Duration::from_secs(1));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("DB_HOST", "db.internal"),
            ("DB_PORT", "5432"),
            ("DB_PASSWORD", "secret"),
            ("BATCH_SIZE", "250"),
            ("RATE_LIMIT_DELAY", "0.25"),
            ("LOG_LEVEL", "DEBUG"),
            ("LOG_FILE", ""),
        ]
        .into_iter()
        .collect();

        let mut config = SyncConfig::default();
        config
            .apply_env(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.database.host, "db.internal");
        assert_eq!(config.database.port, 5432);
        assert_eq!(config.sync.batch_size, 250);
        assert_eq!(config.sync.rate_limit_delay(), Duration::from_millis(250));
        assert_eq!(config.log.level, "debug");
        assert!(config.log.file.is_none());
        assert!(!config.database.describe().contains("secret"));
    }

    #[test]
    fn test_bad_env_value_is_config_error() {
        let mut config = SyncConfig::default();
        let err = config
            .apply_env(|k| (k == "DB_PORT").then(|| "not-a-port".to_string()))
            .unwrap_err();
        assert_eq!(err.code(), "CONFIG_ERROR");
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = SyncConfig::default();
        config.sync.batch_size = 0;
        assert!(config.validate().is_err());

        let mut config = SyncConfig::default();
        config.sync.start_date = "01/01/2000".to_string();
        assert!(config.validate().is_err());

        let mut config = SyncConfig::default();
        config.schedule.timezone = "Mars/Olympus".to_string();
        assert!(config.validate().is_err());

        let mut config = SyncConfig::default();
        config.sync.rate_limit_delay_secs = -1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"database": {{"name": "prices"}}, "sync": {{"batch_size": 50}}}}"#).unwrap();

        let config = SyncConfig::from_file(file.path()).unwrap();
        assert_eq!(config.database.name, "prices");
        assert_eq!(config.database.sqlite_path(), PathBuf::from("prices.db"));
        assert_eq!(config.sync.batch_size, 50);
        assert_eq!(config.sync.max_retries, 0);
    }
}
