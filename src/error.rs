//! Application error types

use crate::providers::ProviderError;
use rusqlite::ErrorCode;
use serde::Serialize;
use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    /// The symbol registry could not be read. Fatal to the whole run.
    #[error("Registry unavailable: {0}")]
    RegistryUnavailable(String),

    #[error("Fetch failed for {symbol}: {source}")]
    FetchFailed {
        symbol: String,
        #[source]
        source: ProviderError,
    },

    /// Transient store failure. Earlier batches of the same upsert stay committed.
    #[error("Store unavailable at batch {batch} ({committed} rows committed): {reason}")]
    StoreUnavailable {
        batch: usize,
        committed: usize,
        reason: String,
    },

    #[error("Store rejected batch {batch} ({committed} rows committed): {reason}")]
    StoreRejected {
        batch: usize,
        committed: usize,
        reason: String,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    /// Stable code used in run summaries and logs
    pub fn code(&self) -> &'static str {
        match self {
            AppError::RegistryUnavailable(_) => "REGISTRY_UNAVAILABLE",
            AppError::FetchFailed { .. } => "FETCH_FAILED",
            AppError::StoreUnavailable { .. } => "STORE_UNAVAILABLE",
            AppError::StoreRejected { .. } => "STORE_REJECTED",
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::Serialization(_) => "SERIALIZATION_ERROR",
            AppError::Io(_) => "IO_ERROR",
        }
    }

    /// Whether the orchestrator may try the same symbol again
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::StoreUnavailable { .. } => true,
            AppError::FetchFailed { source, .. } => source.is_transient(),
            _ => false,
        }
    }

    /// Errors that end the run before any per-symbol work
    pub fn is_fatal(&self) -> bool {
        matches!(self, AppError::RegistryUnavailable(_) | AppError::Config(_))
    }

    /// Rows an upsert committed before this error interrupted it
    pub fn committed_rows(&self) -> usize {
        match self {
            AppError::StoreUnavailable { committed, .. } | AppError::StoreRejected { committed, .. } => *committed,
            _ => 0,
        }
    }

    /// Rebuild a store error with the batch position it happened at.
    pub(crate) fn at_batch(self, batch: usize, committed: usize) -> Self {
        match self {
            AppError::StoreUnavailable { reason, .. } => AppError::StoreUnavailable {
                batch,
                committed,
                reason,
            },
            AppError::StoreRejected { reason, .. } => AppError::StoreRejected {
                batch,
                committed,
                reason,
            },
            other => other,
        }
    }
}

/// Map a SQLite error onto the store half of the taxonomy.
///
/// Lock contention and I/O trouble are transient; anything the engine refused
/// on its merits (constraints, type mismatch, missing table) is a rejection.
pub fn classify_store_error(err: rusqlite::Error) -> AppError {
    let transient = match &err {
        rusqlite::Error::SqliteFailure(e, _) => matches!(
            e.code,
            ErrorCode::DatabaseBusy
                | ErrorCode::DatabaseLocked
                | ErrorCode::CannotOpen
                | ErrorCode::SystemIoFailure
                | ErrorCode::DiskFull
                | ErrorCode::FileLockingProtocolFailed
        ),
        _ => false,
    };

    if transient {
        AppError::StoreUnavailable {
            batch: 0,
            committed: 0,
            reason: err.to_string(),
        }
    } else {
        AppError::StoreRejected {
            batch: 0,
            committed: 0,
            reason: err.to_string(),
        }
    }
}

impl From<r2d2::Error> for AppError {
    fn from(err: r2d2::Error) -> Self {
        AppError::StoreUnavailable {
            batch: 0,
            committed: 0,
            reason: format!("connection pool: {}", err),
        }
    }
}

/// Serializable error entry for run reports
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl From<&AppError> for ErrorResponse {
    fn from(err: &AppError) -> Self {
        ErrorResponse {
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
