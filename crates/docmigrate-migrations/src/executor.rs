//! Applies normalized changes to the target store.
//!
//! One call to [`ChangeExecutor::execute`] handles all changes of one
//! migration: every change is validated up front, every schema definition is
//! ensured as a table (in file order), and finally every data row is written
//! in a single all-or-nothing transaction.

use std::sync::Arc;

use docmigrate_core::MigrateError;
use docmigrate_store::{ensure_table, DocumentStore, ProvisionedThroughput, Put, WaitConfig};

use crate::change::NormalizedChange;

/// Applies the changes of one migration.
#[async_trait::async_trait]
pub trait ChangeExecutor: Send + Sync {
    async fn execute(&self, changes: &[NormalizedChange]) -> Result<(), MigrateError>;
}

/// Executes changes against a [`DocumentStore`].
pub struct StoreChangeExecutor {
    store: Arc<dyn DocumentStore>,
    throughput: ProvisionedThroughput,
    wait: WaitConfig,
}

impl StoreChangeExecutor {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            throughput: ProvisionedThroughput::default(),
            wait: WaitConfig::default(),
        }
    }

    /// Sets the throughput used for tables created by migrations.
    #[must_use]
    pub fn with_throughput(mut self, throughput: ProvisionedThroughput) -> Self {
        self.throughput = throughput;
        self
    }

    /// Sets how long to wait for newly created tables.
    #[must_use]
    pub fn with_wait(mut self, wait: WaitConfig) -> Self {
        self.wait = wait;
        self
    }
}

#[async_trait::async_trait]
impl ChangeExecutor for StoreChangeExecutor {
    async fn execute(&self, changes: &[NormalizedChange]) -> Result<(), MigrateError> {
        let mut tables = Vec::new();
        let mut puts = Vec::new();
        for change in changes {
            change.validate()?;
            for schema in &change.schema {
                tables.push(schema.to_table_definition(&change.table_name, self.throughput));
            }
            for row in &change.data {
                if row.is_empty() {
                    return Err(MigrateError::EmptyItem {
                        table: change.table_name.clone(),
                    });
                }
                puts.push(Put::new(&change.table_name, row.clone()));
            }
        }

        for definition in &tables {
            ensure_table(self.store.as_ref(), definition, &self.wait).await?;
        }

        if !puts.is_empty() {
            let count = puts.len();
            self.store.transact_write(puts).await?;
            tracing::debug!(items = count, "Wrote data items");
        }
        Ok(())
    }
}
