//! Run-level outcome reporting

use crate::error::{AppError, ErrorResponse};
use serde::Serialize;

/// How a successful symbol finished
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolStatus {
    /// Rows were written
    Updated,
    /// Provider had nothing for the window
    NoData,
    /// Watermark already current; nothing fetched
    UpToDate,
}

#[derive(Debug, Clone, Serialize)]
pub struct SymbolSuccess {
    pub symbol: String,
    pub status: SymbolStatus,
    pub rows: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SymbolFailure {
    pub symbol: String,
    pub attempts: u32,
    /// Rows still committed across all attempts before the final failure
    pub rows: usize,
    pub error: ErrorResponse,
}

/// Aggregate outcome of one orchestration pass
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub mode: String,
    pub attempted: usize,
    pub records_written: usize,
    /// Stopped between symbols before the list was exhausted
    pub interrupted: bool,
    pub successes: Vec<SymbolSuccess>,
    pub failures: Vec<SymbolFailure>,
}

impl RunSummary {
    pub fn new(run_id: impl Into<String>, mode: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            mode: mode.into(),
            attempted: 0,
            records_written: 0,
            interrupted: false,
            successes: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn succeeded(&self) -> usize {
        self.successes.len()
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn record_success(&mut self, symbol: &str, status: SymbolStatus, rows: usize) {
        self.attempted += 1;
        self.records_written += rows;
        self.successes.push(SymbolSuccess {
            symbol: symbol.to_string(),
            status,
            rows,
        });
    }

    /// `rows` counts batches committed before the failure, across attempts
    pub fn record_failure(&mut self, symbol: &str, attempts: u32, rows: usize, error: &AppError) {
        self.attempted += 1;
        self.records_written += rows;
        self.failures.push(SymbolFailure {
            symbol: symbol.to_string(),
            attempts,
            rows,
            error: ErrorResponse::from(error),
        });
    }

    /// Emit the operator-facing trail
    pub fn log(&self) {
        tracing::info!(
            "{} update completed. {}/{} symbols processed successfully.",
            self.mode,
            self.succeeded(),
            self.attempted
        );
        tracing::info!("Total new records added: {}", self.records_written);

        for failure in &self.failures {
            tracing::warn!(
                "Failed {} after {} attempt(s): [{}] {}",
                failure.symbol,
                failure.attempts,
                failure.error.code,
                failure.error.message
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::ProviderError;

    #[test]
    fn test_counts_and_rows() {
        let mut summary = RunSummary::new("run-1", "incremental");
        summary.record_success("AAA", SymbolStatus::Updated, 20);
        summary.record_failure(
            "BBB",
            1,
            0,
            &AppError::FetchFailed {
                symbol: "BBB".to_string(),
                source: ProviderError::MalformedResponse("no quote data".to_string()),
            },
        );
        summary.record_success("CCC", SymbolStatus::UpToDate, 0);

        assert_eq!(summary.attempted, 3);
        assert_eq!(summary.succeeded(), 2);
        assert_eq!(summary.failed(), 1);
        assert_eq!(summary.records_written, 20);
        assert_eq!(summary.failures[0].error.code, "FETCH_FAILED");
        assert!(!summary.all_succeeded());
    }

    #[test]
    fn test_partial_store_failure_counts_committed_rows() {
        let mut summary = RunSummary::new("run-2", "backfill");
        let err = AppError::StoreRejected {
            batch: 3,
            committed: 2000,
            reason: "CHECK constraint failed".to_string(),
        };
        summary.record_failure("AAA", 1, err.committed_rows(), &err);
        assert_eq!(summary.records_written, 2000);
        assert_eq!(summary.failures[0].rows, 2000);
    }

    #[test]
    fn test_serializes_for_reports() {
        let mut summary = RunSummary::new("run-3", "daily");
        summary.record_success("AAA", SymbolStatus::NoData, 0);
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["successes"][0]["status"], "no_data");
        assert_eq!(json["mode"], "daily");
    }
}
