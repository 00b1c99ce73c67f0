//! Wiring shared by the commands that talk to the target store.

use std::sync::Arc;

use docmigrate_core::{MigrateError, Settings};
use docmigrate_migrations::{
    DirectoryMigrationSource, JsonContentParser, LedgerStore, MigrationOrchestrator,
    StoreChangeExecutor,
};
use docmigrate_store::{DocumentStore, ProvisionedThroughput, WaitConfig};

/// Validates `settings`, connects the ledger and builds an orchestrator over `store`.
pub async fn build_orchestrator(
    settings: &Settings,
    store: Arc<dyn DocumentStore>,
) -> Result<MigrationOrchestrator, MigrateError> {
    settings.validate()?;

    let wait = WaitConfig::from(&settings.store);
    let throughput = ProvisionedThroughput::from(&settings.store);
    let ledger =
        LedgerStore::connect(store.clone(), &settings.migrations_table, throughput, &wait).await?;
    tracing::debug!(
        store = store.vendor(),
        table = ledger.table_name(),
        "Connected migrations ledger"
    );

    Ok(MigrationOrchestrator::new(
        Box::new(DirectoryMigrationSource::new(&settings.migrations_dir)?),
        Box::new(ledger),
        Box::new(JsonContentParser::new()),
        Box::new(
            StoreChangeExecutor::new(store)
                .with_throughput(throughput)
                .with_wait(wait),
        ),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use docmigrate_core::ErrorKind;
    use docmigrate_store::MemoryStore;

    #[tokio::test]
    async fn test_invalid_settings_fail_before_touching_store() {
        let store = Arc::new(MemoryStore::new());
        let settings = Settings {
            migrations_table: String::new(),
            ..Settings::default()
        };
        let err = build_orchestrator(&settings, store.clone()).await.err().unwrap();
        assert_eq!(err.kind(), ErrorKind::ConfigInvalid);
        assert!(store.table_names().await.is_empty());
    }

    #[tokio::test]
    async fn test_creates_ledger_table() {
        let store = Arc::new(MemoryStore::new());
        let settings = Settings {
            migrations_table: "applied_migrations".to_string(),
            ..Settings::default()
        };
        build_orchestrator(&settings, store.clone()).await.unwrap();
        assert_eq!(store.table_names().await, vec!["applied_migrations".to_string()]);
    }
}
