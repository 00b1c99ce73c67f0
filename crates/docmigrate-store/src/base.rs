//! Base document store trait and common operations.
//!
//! This module defines the [`DocumentStore`] trait that every store adapter
//! implements, the [`Put`] request used for transactional writes, and
//! [`ensure_table`], the single idempotent "create if missing" operation used
//! by both the ledger and the change executor.

use std::collections::HashSet;
use std::time::Duration;

use docmigrate_core::{StoreError, StoreSettings};

use crate::schema::{Item, ItemKey, TableDefinition, TableDescription, TableStatus};

/// A precondition attached to a [`Put`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PutCondition {
    /// The existing item (if any) must not carry this attribute.
    ///
    /// With the partition key attribute this means "insert if absent".
    AttributeNotExists(String),
}

/// One item write inside a transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct Put {
    pub table_name: String,
    pub item: Item,
    pub condition: Option<PutCondition>,
}

impl Put {
    /// An unconditional put that replaces any item with the same key.
    pub fn new(table_name: impl Into<String>, item: Item) -> Self {
        Self {
            table_name: table_name.into(),
            item,
            condition: None,
        }
    }

    /// A put that only succeeds if no item with the same key carries `attribute`.
    #[must_use]
    pub fn if_attribute_not_exists(mut self, attribute: impl Into<String>) -> Self {
        self.condition = Some(PutCondition::AttributeNotExists(attribute.into()));
        self
    }

    /// Returns whether this put's condition holds against the current item.
    pub fn condition_holds(&self, existing: Option<&Item>) -> bool {
        match (&self.condition, existing) {
            (None, _) | (Some(_), None) => true,
            (Some(PutCondition::AttributeNotExists(attr)), Some(item)) => !item.contains_key(attr),
        }
    }
}

/// How long and how often to poll a table that is being created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitConfig {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            poll_interval: Duration::from_millis(200),
        }
    }
}

impl From<&StoreSettings> for WaitConfig {
    fn from(settings: &StoreSettings) -> Self {
        Self {
            timeout: settings.table_wait_timeout(),
            poll_interval: settings.table_poll_interval(),
        }
    }
}

/// The core trait for target stores.
///
/// Each adapter (in-memory, SQLite) implements this trait to provide a uniform
/// interface for table management and item writes. Methods are async because
/// store operations are I/O-bound; synchronous drivers run their work on the
/// blocking pool.
#[async_trait::async_trait]
pub trait DocumentStore: Send + Sync {
    /// Returns the vendor name (e.g. "memory", "sqlite").
    fn vendor(&self) -> &str;

    /// Describes the named table, or returns `None` if it does not exist.
    async fn describe_table(&self, table_name: &str)
        -> Result<Option<TableDescription>, StoreError>;

    /// Creates a table.
    ///
    /// Fails with [`StoreError::ResourceInUse`] if the table already exists.
    async fn create_table(&self, definition: &TableDefinition)
        -> Result<TableDescription, StoreError>;

    /// Reads the item whose key attributes match those in `key`.
    async fn get_item(&self, table_name: &str, key: &Item) -> Result<Option<Item>, StoreError>;

    /// Returns every item of the table, ordered by key.
    async fn scan(&self, table_name: &str) -> Result<Vec<Item>, StoreError>;

    /// Applies all puts atomically: either every put is written or none is.
    ///
    /// A failed [`PutCondition`] cancels the whole transaction with
    /// [`StoreError::ConditionalCheckFailed`]. Two puts on the same item are
    /// rejected with [`StoreError::Validation`].
    async fn transact_write(&self, puts: Vec<Put>) -> Result<(), StoreError>;

    /// Polls until the table exists and is active.
    ///
    /// Fails with [`StoreError::Timeout`] once `config.timeout` has elapsed.
    async fn wait_until_table_exists(
        &self,
        table_name: &str,
        config: &WaitConfig,
    ) -> Result<(), StoreError> {
        let deadline = tokio::time::Instant::now() + config.timeout;
        loop {
            if let Some(description) = self.describe_table(table_name).await? {
                if description.status == TableStatus::Active {
                    return Ok(());
                }
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(StoreError::Timeout(table_name.to_string()));
            }
            tokio::time::sleep(config.poll_interval).await;
        }
    }
}

/// The result of [`ensure_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnsureOutcome {
    /// This call created the table.
    Created,
    /// The table was already there, or another writer created it concurrently.
    AlreadyExists,
}

/// Makes sure a table exists and is active, creating it if needed.
///
/// Existence is checked immediately before creating. A creation that loses a
/// race against another writer ([`StoreError::ResourceInUse`]) is treated as
/// [`EnsureOutcome::AlreadyExists`]. Any table that is not yet active is
/// waited for.
pub async fn ensure_table(
    store: &dyn DocumentStore,
    definition: &TableDefinition,
    wait: &WaitConfig,
) -> Result<EnsureOutcome, StoreError> {
    let name = definition.table_name.as_str();

    if let Some(description) = store.describe_table(name).await? {
        tracing::info!(table = name, "Skipping table creation because the table already exists");
        if !description.is_active() {
            store.wait_until_table_exists(name, wait).await?;
        }
        return Ok(EnsureOutcome::AlreadyExists);
    }

    let outcome = match store.create_table(definition).await {
        Ok(_) => {
            tracing::info!(table = name, "Created table");
            EnsureOutcome::Created
        }
        Err(StoreError::ResourceInUse(_)) => {
            tracing::warn!(table = name, "Table was created concurrently by another writer");
            EnsureOutcome::AlreadyExists
        }
        Err(e) => return Err(e),
    };

    store.wait_until_table_exists(name, wait).await?;
    Ok(outcome)
}

/// A put whose table and key have been resolved.
#[derive(Debug, Clone)]
pub(crate) struct ResolvedPut {
    pub key: ItemKey,
    pub put: Put,
}

/// Resolves the key of every put and rejects transactions touching one item twice.
///
/// `definition_of` returns the definition of an active table, or `None` if the
/// table does not exist (or is not active yet).
pub(crate) fn resolve_puts<'a, F>(puts: Vec<Put>, definition_of: F) -> Result<Vec<ResolvedPut>, StoreError>
where
    F: Fn(&str) -> Option<&'a TableDefinition>,
{
    let mut seen = HashSet::new();
    let mut resolved = Vec::with_capacity(puts.len());
    for put in puts {
        let definition = definition_of(&put.table_name)
            .ok_or_else(|| StoreError::ResourceNotFound(put.table_name.clone()))?;
        let key = definition.item_key(&put.item)?;
        if !seen.insert((put.table_name.clone(), key.clone())) {
            return Err(StoreError::Validation(
                "Transaction request cannot include multiple operations on one item".to_string(),
            ));
        }
        resolved.push(ResolvedPut { key, put });
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item(value: serde_json::Value) -> Item {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_put_condition_holds() {
        let put = Put::new("t", item(json!({"version": "1.0.0"}))).if_attribute_not_exists("version");
        assert!(put.condition_holds(None));
        assert!(!put.condition_holds(Some(&item(json!({"version": "1.0.0"})))));
        assert!(put.condition_holds(Some(&item(json!({"other": 1})))));
    }

    #[test]
    fn test_unconditional_put_always_holds() {
        let put = Put::new("t", item(json!({"id": "1"})));
        assert!(put.condition_holds(Some(&item(json!({"id": "1"})))));
    }

    #[test]
    fn test_wait_config_from_settings() {
        let settings = StoreSettings {
            table_wait_timeout_secs: 3,
            table_poll_interval_ms: 50,
            ..StoreSettings::default()
        };
        let wait = WaitConfig::from(&settings);
        assert_eq!(wait.timeout, Duration::from_secs(3));
        assert_eq!(wait.poll_interval, Duration::from_millis(50));
    }

    #[test]
    fn test_resolve_puts_rejects_duplicate_item() {
        let def = TableDefinition::with_hash_key("users", "id");
        let puts = vec![
            Put::new("users", item(json!({"id": "1", "n": 1}))),
            Put::new("users", item(json!({"id": "1", "n": 2}))),
        ];
        let err = resolve_puts(puts, |name| (name == "users").then_some(&def)).unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[test]
    fn test_resolve_puts_unknown_table() {
        let puts = vec![Put::new("missing", item(json!({"id": "1"})))];
        let err = resolve_puts(puts, |_| None).unwrap_err();
        assert_eq!(err, StoreError::ResourceNotFound("missing".into()));
    }

    /// Reports the table as missing and always loses the creation race.
    struct LateCreatorStore {
        inner: crate::memory::MemoryStore,
    }

    #[async_trait::async_trait]
    impl DocumentStore for LateCreatorStore {
        fn vendor(&self) -> &str {
            "late-creator"
        }

        async fn describe_table(
            &self,
            table_name: &str,
        ) -> Result<Option<TableDescription>, StoreError> {
            self.inner.describe_table(table_name).await
        }

        async fn create_table(
            &self,
            definition: &TableDefinition,
        ) -> Result<TableDescription, StoreError> {
            self.inner.create_table(definition).await?;
            Err(StoreError::ResourceInUse(definition.table_name.clone()))
        }

        async fn get_item(&self, table_name: &str, key: &Item) -> Result<Option<Item>, StoreError> {
            self.inner.get_item(table_name, key).await
        }

        async fn scan(&self, table_name: &str) -> Result<Vec<Item>, StoreError> {
            self.inner.scan(table_name).await
        }

        async fn transact_write(&self, puts: Vec<Put>) -> Result<(), StoreError> {
            self.inner.transact_write(puts).await
        }
    }

    #[tokio::test]
    async fn test_ensure_table_tolerates_lost_creation_race() {
        let store = LateCreatorStore {
            inner: crate::memory::MemoryStore::new(),
        };
        let def = TableDefinition::with_hash_key("ledger", "version");
        assert!(store.describe_table("ledger").await.unwrap().is_none());

        let outcome = ensure_table(&store, &def, &WaitConfig::default()).await;
        assert_eq!(outcome, Ok(EnsureOutcome::AlreadyExists));
        assert!(store.describe_table("ledger").await.unwrap().unwrap().is_active());
    }

    #[tokio::test]
    async fn test_ensure_table_propagates_other_create_errors() {
        let store = crate::memory::MemoryStore::new();
        let mut def = TableDefinition::with_hash_key("ledger", "version");
        def.key_schema.clear();
        let err = ensure_table(&store, &def, &WaitConfig::default()).await.unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }
}
