//! The applied-migration ledger.
//!
//! Every applied migration is recorded as one item keyed by its version
//! identifier:
//!
//! ```json
//! {"version": "1.0.0", "name": "1.0.0_users.json",
//!  "metadata": {"start_time": 1700000000, "execution_time": 2}}
//! ```
//!
//! Items are written once with an insert-if-absent condition and never
//! updated or deleted.

use std::sync::Arc;

use docmigrate_core::{MigrateError, StoreError};
use docmigrate_store::{
    ensure_table, DocumentStore, Item, ProvisionedThroughput, Put, TableDefinition, WaitConfig,
};
use serde_json::Value;

use crate::migration::{Metadata, MigrationRecord};
use crate::version::Version;

const FIELD_VERSION: &str = "version";
const FIELD_NAME: &str = "name";
const FIELD_METADATA: &str = "metadata";

/// Tracks which migrations have been applied.
#[async_trait::async_trait]
pub trait BookkeepingStore: Send + Sync {
    /// Returns whether `version` is recorded as applied.
    async fn exists(&self, version: &Version) -> Result<bool, MigrateError>;

    /// Records a migration as applied.
    ///
    /// Fails with [`MigrateError::LedgerConflict`] if the version is already
    /// recorded, including when another runner recorded it concurrently.
    async fn record_applied(&self, record: &MigrationRecord) -> Result<(), MigrateError>;
}

/// A ledger kept in a table of a [`DocumentStore`].
pub struct LedgerStore {
    store: Arc<dyn DocumentStore>,
    table_name: String,
}

impl LedgerStore {
    /// Opens the ledger, creating its table if needed.
    pub async fn connect(
        store: Arc<dyn DocumentStore>,
        table_name: impl Into<String>,
        throughput: ProvisionedThroughput,
        wait: &WaitConfig,
    ) -> Result<Self, MigrateError> {
        let table_name = table_name.into();
        if table_name.is_empty() {
            return Err(MigrateError::ConfigInvalid(
                "Migrations table name required".to_string(),
            ));
        }

        let mut definition = TableDefinition::with_hash_key(&table_name, FIELD_VERSION);
        definition.provisioned_throughput = throughput;
        ensure_table(store.as_ref(), &definition, wait).await?;

        Ok(Self { store, table_name })
    }

    /// Returns the ledger table name.
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Returns every recorded migration, sorted by version.
    pub async fn applied_records(&self) -> Result<Vec<MigrationRecord>, MigrateError> {
        let mut records = self
            .store
            .scan(&self.table_name)
            .await?
            .iter()
            .map(decode_record)
            .collect::<Result<Vec<_>, _>>()?;
        records.sort_by(|a, b| a.version.cmp(&b.version));
        Ok(records)
    }
}

fn version_key(version: &Version) -> Item {
    let mut key = Item::new();
    key.insert(FIELD_VERSION.to_string(), Value::String(version.id()));
    key
}

fn encode_record(record: &MigrationRecord) -> Item {
    let mut metadata = Item::new();
    metadata.insert("start_time".to_string(), record.metadata.start_time.into());
    metadata.insert("execution_time".to_string(), record.metadata.execution_time.into());

    let mut item = version_key(&record.version);
    item.insert(FIELD_NAME.to_string(), Value::String(record.name.clone()));
    item.insert(FIELD_METADATA.to_string(), Value::Object(metadata));
    item
}

fn decode_record(item: &Item) -> Result<MigrationRecord, MigrateError> {
    let malformed =
        |what: &str| StoreError::Backend(format!("Malformed ledger entry: {what}"));
    let version: Version = item
        .get(FIELD_VERSION)
        .and_then(Value::as_str)
        .ok_or_else(|| malformed("missing version"))?
        .parse()
        .map_err(|_| malformed("invalid version"))?;
    let name = item
        .get(FIELD_NAME)
        .and_then(Value::as_str)
        .ok_or_else(|| malformed("missing name"))?;
    let metadata: Metadata = match item.get(FIELD_METADATA) {
        Some(value) => {
            serde_json::from_value(value.clone()).map_err(|_| malformed("invalid metadata"))?
        }
        None => Metadata::default(),
    };
    Ok(MigrationRecord {
        version,
        name: name.to_string(),
        metadata,
    })
}

#[async_trait::async_trait]
impl BookkeepingStore for LedgerStore {
    async fn exists(&self, version: &Version) -> Result<bool, MigrateError> {
        let item = self
            .store
            .get_item(&self.table_name, &version_key(version))
            .await?;
        Ok(item.is_some_and(|i| !i.is_empty()))
    }

    async fn record_applied(&self, record: &MigrationRecord) -> Result<(), MigrateError> {
        let put = Put::new(&self.table_name, encode_record(record))
            .if_attribute_not_exists(FIELD_VERSION);
        match self.store.transact_write(vec![put]).await {
            Ok(()) => Ok(()),
            Err(StoreError::ConditionalCheckFailed(_)) => Err(MigrateError::LedgerConflict {
                version: record.version.id(),
            }),
            Err(e) => Err(e.into()),
        }
    }
}
