//! Batched idempotent upsert

use crate::db::{PriceRecord, SqliteDb};
use crate::error::Result;
use std::sync::Arc;

/// Target that applies one batch atomically and reports rows affected
pub trait PriceSink: Send + Sync {
    fn upsert_batch(&self, records: &[PriceRecord]) -> Result<usize>;
}

impl PriceSink for SqliteDb {
    fn upsert_batch(&self, records: &[PriceRecord]) -> Result<usize> {
        self.upsert_prices(records)
    }
}

/// Persists records in bounded batches
///
/// Batches run in order, each in its own transaction. When batch `n` fails,
/// batches `1..n` stay committed and the error says how far it got.
pub struct UpsertStore {
    sink: Arc<dyn PriceSink>,
    batch_size: usize,
}

impl UpsertStore {
    pub fn new(sink: Arc<dyn PriceSink>, batch_size: usize) -> Self {
        Self {
            sink,
            batch_size: batch_size.max(1),
        }
    }

    /// Upsert `records`; returns rows inserted or updated
    pub fn upsert(&self, records: &[PriceRecord]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let total_batches = records.len().div_ceil(self.batch_size);
        let mut committed = 0;

        for (i, batch) in records.chunks(self.batch_size).enumerate() {
            let affected = self
                .sink
                .upsert_batch(batch)
                .map_err(|e| e.at_batch(i + 1, committed))?;
            committed += affected;
            tracing::debug!("Processed batch {}/{}", i + 1, total_batches);
        }

        tracing::info!("Successfully stored {} price records", committed);
        Ok(committed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use chrono::{Days, NaiveDate};
    use parking_lot::Mutex;

    fn records(n: usize) -> Vec<PriceRecord> {
        let first = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        (0..n)
            .map(|i| PriceRecord {
                symbol: "ABC".to_string(),
                date: first.checked_add_days(Days::new(i as u64)).unwrap(),
                open: Some(1.0),
                high: Some(2.0),
                low: Some(0.5),
                close: Some(1.5),
                volume: Some(10),
            })
            .collect()
    }

    /// Records batch sizes and fails the batch at `fail_at` (1-based)
    struct FlakySink {
        batches: Mutex<Vec<usize>>,
        fail_at: Option<usize>,
    }

    impl PriceSink for FlakySink {
        fn upsert_batch(&self, records: &[PriceRecord]) -> Result<usize> {
            let mut batches = self.batches.lock();
            if Some(batches.len() + 1) == self.fail_at {
                return Err(AppError::StoreUnavailable {
                    batch: 0,
                    committed: 0,
                    reason: "database is locked".to_string(),
                });
            }
            batches.push(records.len());
            Ok(records.len())
        }
    }

    #[test]
    fn test_splits_into_bounded_batches() {
        let sink = Arc::new(FlakySink { batches: Mutex::new(Vec::new()), fail_at: None });
        let store = UpsertStore::new(sink.clone(), 1000);

        assert_eq!(store.upsert(&records(2500)).unwrap(), 2500);
        assert_eq!(*sink.batches.lock(), vec![1000, 1000, 500]);
    }

    #[test]
    fn test_failure_reports_batch_and_committed_rows() {
        let sink = Arc::new(FlakySink { batches: Mutex::new(Vec::new()), fail_at: Some(3) });
        let store = UpsertStore::new(sink.clone(), 10);

        let err = store.upsert(&records(45)).unwrap_err();
        match err {
            AppError::StoreUnavailable { batch, committed, .. } => {
                assert_eq!(batch, 3);
                assert_eq!(committed, 20);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(*sink.batches.lock(), vec![10, 10]);
    }

    #[test]
    fn test_upsert_twice_is_idempotent() {
        let db = Arc::new(SqliteDb::in_memory().unwrap());
        let store = UpsertStore::new(db.clone(), 7);
        let batch = records(30);

        let first = store.upsert(&batch).unwrap();
        let before = db.load_prices("ABC").unwrap();
        let second = store.upsert(&batch).unwrap();
        let after = db.load_prices("ABC").unwrap();

        assert_eq!(first, 30);
        assert_eq!(second, 30);
        assert_eq!(db.count_prices(Some("ABC")).unwrap(), 30);
        let values = |rows: &[crate::db::StoredPrice]| rows.iter().map(|r| r.record.clone()).collect::<Vec<_>>();
        assert_eq!(values(&before), values(&after));
    }

    #[test]
    fn test_empty_input_touches_nothing() {
        let sink = Arc::new(FlakySink { batches: Mutex::new(Vec::new()), fail_at: Some(1) });
        let store = UpsertStore::new(sink.clone(), 10);
        assert_eq!(store.upsert(&[]).unwrap(), 0);
        assert!(sink.batches.lock().is_empty());
    }
}
