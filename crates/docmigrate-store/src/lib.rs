//! # docmigrate-store
//!
//! Target store adapters for docmigrate. Every adapter implements the
//! [`DocumentStore`] trait: table description and creation, key lookups,
//! scans and atomic multi-item writes with optional put conditions.
//!
//! Supported stores:
//! - In-memory ([`MemoryStore`])
//! - `SQLite` ([`SqliteStore`], behind the `sqlite` feature)

pub mod base;
pub mod memory;
pub mod schema;
#[cfg(feature = "sqlite")]
pub mod sqlite;

use std::sync::Arc;

use docmigrate_core::{MigrateError, StoreEngine, StoreSettings};

pub use base::{ensure_table, DocumentStore, EnsureOutcome, Put, PutCondition, WaitConfig};
pub use memory::MemoryStore;
pub use schema::{
    validate_key_schema, AttributeDefinition, AttributeType, Item, ItemKey, KeySchemaElement,
    KeyType, ProvisionedThroughput, TableDefinition, TableDescription, TableStatus,
};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;

/// Opens the store selected by `settings.engine`.
///
/// Fails with [`MigrateError::ConfigInvalid`] when the engine was compiled out.
pub fn open_store(settings: &StoreSettings) -> Result<Arc<dyn DocumentStore>, MigrateError> {
    match settings.engine {
        StoreEngine::Memory => Ok(Arc::new(MemoryStore::new())),
        #[cfg(feature = "sqlite")]
        StoreEngine::Sqlite => {
            tracing::debug!(path = %settings.path.display(), "Opening SQLite store");
            Ok(Arc::new(SqliteStore::open(&settings.path)?))
        }
        #[cfg(not(feature = "sqlite"))]
        StoreEngine::Sqlite => Err(MigrateError::ConfigInvalid(
            "the sqlite store engine requires the `sqlite` feature".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_memory_store() {
        let settings = StoreSettings {
            engine: StoreEngine::Memory,
            ..StoreSettings::default()
        };
        let store = open_store(&settings).unwrap();
        assert_eq!(store.vendor(), "memory");
    }

    #[cfg(feature = "sqlite")]
    #[tokio::test]
    async fn test_open_sqlite_store() {
        let dir = tempfile::tempdir().unwrap();
        let settings = StoreSettings {
            engine: StoreEngine::Sqlite,
            path: dir.path().join("store.sqlite3"),
            ..StoreSettings::default()
        };
        let store = open_store(&settings).unwrap();
        assert_eq!(store.vendor(), "sqlite");
    }

    #[cfg(not(feature = "sqlite"))]
    #[test]
    fn test_sqlite_engine_without_feature() {
        let err = open_store(&StoreSettings::default()).err().unwrap();
        assert_eq!(err.kind(), docmigrate_core::ErrorKind::ConfigInvalid);
    }
}
