//! In-memory document store.
//!
//! [`MemoryStore`] keeps tables and items in a process-local map. It is the
//! store used by tests and by `--store-engine memory` runs. Table activation
//! can be delayed to reproduce stores that create tables asynchronously.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use chrono::{DateTime, Utc};
use docmigrate_core::StoreError;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::base::{resolve_puts, DocumentStore, Put};
use crate::schema::{Item, ItemKey, TableDefinition, TableDescription, TableStatus};

struct MemoryTable {
    definition: TableDefinition,
    created_at: DateTime<Utc>,
    active_at: Instant,
    items: BTreeMap<ItemKey, Item>,
}

impl MemoryTable {
    fn status(&self, now: Instant) -> TableStatus {
        if now >= self.active_at {
            TableStatus::Active
        } else {
            TableStatus::Creating
        }
    }

    fn describe(&self, now: Instant) -> TableDescription {
        TableDescription {
            definition: self.definition.clone(),
            status: self.status(now),
            item_count: self.items.len(),
            created_at: self.created_at,
        }
    }
}

/// A document store held entirely in memory.
///
/// # Examples
///
/// ```
/// use docmigrate_store::{DocumentStore, MemoryStore, TableDefinition};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let store = MemoryStore::new();
/// store.create_table(&TableDefinition::with_hash_key("users", "id")).await.unwrap();
/// assert!(store.describe_table("users").await.unwrap().is_some());
/// # }
/// ```
pub struct MemoryStore {
    tables: Mutex<HashMap<String, MemoryTable>>,
    activation_delay: Duration,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Creates an empty store whose tables are active as soon as they are created.
    pub fn new() -> Self {
        Self::with_activation_delay(Duration::ZERO)
    }

    /// Creates an empty store whose new tables stay `CREATING` for `delay`.
    pub fn with_activation_delay(delay: Duration) -> Self {
        Self {
            tables: Mutex::new(HashMap::new()),
            activation_delay: delay,
        }
    }

    /// Returns the names of all tables, sorted.
    pub async fn table_names(&self) -> Vec<String> {
        let tables = self.tables.lock().await;
        let mut names: Vec<String> = tables.keys().cloned().collect();
        names.sort_unstable();
        names
    }
}

#[async_trait::async_trait]
impl DocumentStore for MemoryStore {
    fn vendor(&self) -> &str {
        "memory"
    }

    async fn describe_table(
        &self,
        table_name: &str,
    ) -> Result<Option<TableDescription>, StoreError> {
        let tables = self.tables.lock().await;
        let now = Instant::now();
        Ok(tables.get(table_name).map(|t| t.describe(now)))
    }

    async fn create_table(
        &self,
        definition: &TableDefinition,
    ) -> Result<TableDescription, StoreError> {
        definition.validate()?;
        let mut tables = self.tables.lock().await;
        if tables.contains_key(&definition.table_name) {
            return Err(StoreError::ResourceInUse(definition.table_name.clone()));
        }
        let now = Instant::now();
        let table = MemoryTable {
            definition: definition.clone(),
            created_at: Utc::now(),
            active_at: now + self.activation_delay,
            items: BTreeMap::new(),
        };
        let description = table.describe(now);
        tables.insert(definition.table_name.clone(), table);
        Ok(description)
    }

    async fn get_item(&self, table_name: &str, key: &Item) -> Result<Option<Item>, StoreError> {
        let tables = self.tables.lock().await;
        let table = tables
            .get(table_name)
            .filter(|t| t.status(Instant::now()) == TableStatus::Active)
            .ok_or_else(|| StoreError::ResourceNotFound(table_name.to_string()))?;
        let key = table.definition.item_key(key)?;
        Ok(table.items.get(&key).cloned())
    }

    async fn scan(&self, table_name: &str) -> Result<Vec<Item>, StoreError> {
        let tables = self.tables.lock().await;
        let table = tables
            .get(table_name)
            .filter(|t| t.status(Instant::now()) == TableStatus::Active)
            .ok_or_else(|| StoreError::ResourceNotFound(table_name.to_string()))?;
        Ok(table.items.values().cloned().collect())
    }

    async fn transact_write(&self, puts: Vec<Put>) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        let now = Instant::now();

        let resolved = resolve_puts(puts, |name| {
            tables
                .get(name)
                .filter(|t| t.status(now) == TableStatus::Active)
                .map(|t| &t.definition)
        })?;

        for r in &resolved {
            let existing = tables
                .get(&r.put.table_name)
                .and_then(|t| t.items.get(&r.key));
            if !r.put.condition_holds(existing) {
                return Err(StoreError::ConditionalCheckFailed(r.put.table_name.clone()));
            }
        }

        for r in resolved {
            if let Some(table) = tables.get_mut(&r.put.table_name) {
                table.items.insert(r.key, r.put.item);
            }
        }
        Ok(())
    }
}
