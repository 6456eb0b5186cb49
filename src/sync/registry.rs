//! Active symbol registry

use crate::db::{SqliteDb, SymbolMapping};
use crate::error::{AppError, Result};
use std::sync::Arc;

/// Backing store for symbol mappings
pub trait MappingSource: Send + Sync {
    fn active_mappings(&self) -> Result<Vec<SymbolMapping>>;
}

impl MappingSource for SqliteDb {
    fn active_mappings(&self) -> Result<Vec<SymbolMapping>> {
        self.load_active_mappings()
    }
}

/// Reads the set of securities a run processes
pub struct SymbolRegistry {
    source: Arc<dyn MappingSource>,
}

impl SymbolRegistry {
    pub fn new(source: Arc<dyn MappingSource>) -> Self {
        Self { source }
    }

    /// Active mappings ordered by id ascending.
    ///
    /// Any failure is `RegistryUnavailable`: a partial list would silently
    /// skip securities, so there is no fallback.
    pub fn list_active(&self) -> Result<Vec<SymbolMapping>> {
        let mut mappings = self.source.active_mappings().map_err(|e| match e {
            AppError::RegistryUnavailable(_) => e,
            other => AppError::RegistryUnavailable(other.to_string()),
        })?;

        mappings.retain(|m| m.is_active);
        mappings.sort_by_key(|m| m.id);
        Ok(mappings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(id: i64, symbol: &str, active: bool) -> SymbolMapping {
        SymbolMapping {
            id,
            broker_symbol: symbol.to_string(),
            provider_symbol: symbol.to_string(),
            name: None,
            exchange: Some("NASDAQ".to_string()),
            asset_type: Some("STK".to_string()),
            is_active: active,
        }
    }

    struct Unreachable;

    impl MappingSource for Unreachable {
        fn active_mappings(&self) -> Result<Vec<SymbolMapping>> {
            Err(AppError::StoreUnavailable {
                batch: 0,
                committed: 0,
                reason: "connection refused".to_string(),
            })
        }
    }

    #[test]
    fn test_lists_active_in_id_order() {
        let db = SqliteDb::in_memory().unwrap();
        db.insert_mapping(&mapping(3, "MSFT", true)).unwrap();
        db.insert_mapping(&mapping(1, "AAPL", true)).unwrap();
        db.insert_mapping(&mapping(2, "DEAD", false)).unwrap();

        let registry = SymbolRegistry::new(Arc::new(db));
        let ids: Vec<i64> = registry.list_active().unwrap().iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn test_unreachable_store_is_registry_unavailable() {
        let registry = SymbolRegistry::new(Arc::new(Unreachable));
        let err = registry.list_active().unwrap_err();
        assert!(matches!(err, AppError::RegistryUnavailable(_)));
        assert!(err.is_fatal());
    }
}
