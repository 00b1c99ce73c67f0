//! SQLite document store using `rusqlite`.
//!
//! This module provides the [`SqliteStore`] which implements the
//! [`DocumentStore`](crate::base::DocumentStore) trait on top of a single
//! SQLite file, wrapping `rusqlite` in `tokio::task::spawn_blocking` for async
//! compatibility.
//!
//! Features:
//! - WAL mode enabled by default for file-based databases
//! - In-memory database support via `:memory:` path (great for testing)
//! - Each `transact_write` runs inside one SQLite transaction
//!
//! Tables are rows of `docmigrate_tables` (name, JSON definition, creation
//! time); items are rows of `docmigrate_items` keyed by table name and the
//! item's canonical partition/sort key. Tables are active as soon as they are
//! created.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use docmigrate_core::StoreError;
use rusqlite::{params, OptionalExtension};
use tokio::sync::Mutex;

use crate::base::{resolve_puts, DocumentStore, Put};
use crate::schema::{Item, TableDefinition, TableDescription, TableStatus};

const SCHEMA_SQL: &str = "\
    CREATE TABLE IF NOT EXISTS \"docmigrate_tables\" (\
        \"name\" TEXT PRIMARY KEY, \
        \"definition\" TEXT NOT NULL, \
        \"created_at\" TEXT NOT NULL\
    );\
    CREATE TABLE IF NOT EXISTS \"docmigrate_items\" (\
        \"table_name\" TEXT NOT NULL, \
        \"partition_key\" TEXT NOT NULL, \
        \"sort_key\" TEXT NOT NULL DEFAULT '', \
        \"item\" TEXT NOT NULL, \
        PRIMARY KEY (\"table_name\", \"partition_key\", \"sort_key\")\
    );";

/// A document store persisted in a SQLite database.
///
/// Uses `rusqlite` with a `Mutex`-guarded connection. All operations are run
/// via `tokio::task::spawn_blocking` to avoid blocking the async runtime.
pub struct SqliteStore {
    /// The path to the database file (or ":memory:").
    path: PathBuf,
    /// The connection, guarded by an async mutex.
    conn: Arc<Mutex<rusqlite::Connection>>,
}

fn backend_error(e: impl std::fmt::Display) -> StoreError {
    StoreError::Backend(e.to_string())
}

impl SqliteStore {
    /// Opens (or creates) a store at the given path.
    ///
    /// If the path is `:memory:`, an in-memory database is created.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let in_memory = path.to_str() == Some(":memory:");
        let conn = if in_memory {
            rusqlite::Connection::open_in_memory()
        } else {
            rusqlite::Connection::open(&path)
        }
        .map_err(|e| StoreError::Backend(format!("SQLite open failed: {e}")))?;

        if !in_memory {
            conn.execute_batch("PRAGMA journal_mode=WAL;")
                .map_err(|e| StoreError::Backend(format!("Failed to set pragmas: {e}")))?;
        }
        conn.execute_batch(SCHEMA_SQL)
            .map_err(|e| StoreError::Backend(format!("Failed to create store schema: {e}")))?;

        Ok(Self {
            path,
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Opens an in-memory database (convenience constructor).
    pub fn memory() -> Result<Self, StoreError> {
        Self::open(":memory:")
    }

    /// Returns the database file path.
    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Runs `f` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut rusqlite::Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.blocking_lock();
            f(&mut *conn)
        })
        .await
        .map_err(|e| StoreError::Backend(format!("Task join error: {e}")))?
    }

    fn load_definition(
        conn: &rusqlite::Connection,
        table_name: &str,
    ) -> Result<Option<(TableDefinition, DateTime<Utc>)>, StoreError> {
        let row: Option<(String, String)> = conn
            .query_row(
                "SELECT \"definition\", \"created_at\" FROM \"docmigrate_tables\" WHERE \"name\" = ?1",
                params![table_name],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(backend_error)?;

        row.map(|(definition, created_at)| {
            let definition: TableDefinition =
                serde_json::from_str(&definition).map_err(backend_error)?;
            let created_at = DateTime::parse_from_rfc3339(&created_at)
                .map_err(backend_error)?
                .with_timezone(&Utc);
            Ok((definition, created_at))
        })
        .transpose()
    }

    fn require_definition(
        conn: &rusqlite::Connection,
        table_name: &str,
    ) -> Result<TableDefinition, StoreError> {
        Self::load_definition(conn, table_name)?
            .map(|(definition, _)| definition)
            .ok_or_else(|| StoreError::ResourceNotFound(table_name.to_string()))
    }

    fn decode_item(raw: &str) -> Result<Item, StoreError> {
        serde_json::from_str(raw).map_err(backend_error)
    }
}

#[async_trait::async_trait]
impl DocumentStore for SqliteStore {
    fn vendor(&self) -> &str {
        "sqlite"
    }

    async fn describe_table(
        &self,
        table_name: &str,
    ) -> Result<Option<TableDescription>, StoreError> {
        let table_name = table_name.to_string();
        self.with_conn(move |conn| {
            let Some((definition, created_at)) = Self::load_definition(conn, &table_name)? else {
                return Ok(None);
            };
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM \"docmigrate_items\" WHERE \"table_name\" = ?1",
                    params![table_name],
                    |row| row.get(0),
                )
                .map_err(backend_error)?;
            Ok(Some(TableDescription {
                definition,
                status: TableStatus::Active,
                item_count: usize::try_from(count).unwrap_or_default(),
                created_at,
            }))
        })
        .await
    }

    async fn create_table(
        &self,
        definition: &TableDefinition,
    ) -> Result<TableDescription, StoreError> {
        definition.validate()?;
        let definition = definition.clone();
        self.with_conn(move |conn| {
            let encoded = serde_json::to_string(&definition).map_err(backend_error)?;
            let created_at = Utc::now();
            let result = conn.execute(
                "INSERT INTO \"docmigrate_tables\" (\"name\", \"definition\", \"created_at\") \
                 VALUES (?1, ?2, ?3)",
                params![definition.table_name, encoded, created_at.to_rfc3339()],
            );
            match result {
                Ok(_) => Ok(TableDescription {
                    definition,
                    status: TableStatus::Active,
                    item_count: 0,
                    created_at,
                }),
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    Err(StoreError::ResourceInUse(definition.table_name))
                }
                Err(e) => Err(backend_error(e)),
            }
        })
        .await
    }

    async fn get_item(&self, table_name: &str, key: &Item) -> Result<Option<Item>, StoreError> {
        let table_name = table_name.to_string();
        let key = key.clone();
        self.with_conn(move |conn| {
            let definition = Self::require_definition(conn, &table_name)?;
            let key = definition.item_key(&key)?;
            let raw: Option<String> = conn
                .query_row(
                    "SELECT \"item\" FROM \"docmigrate_items\" \
                     WHERE \"table_name\" = ?1 AND \"partition_key\" = ?2 AND \"sort_key\" = ?3",
                    params![table_name, key.partition, key.sort.unwrap_or_default()],
                    |row| row.get(0),
                )
                .optional()
                .map_err(backend_error)?;
            raw.as_deref().map(Self::decode_item).transpose()
        })
        .await
    }

    async fn scan(&self, table_name: &str) -> Result<Vec<Item>, StoreError> {
        let table_name = table_name.to_string();
        self.with_conn(move |conn| {
            Self::require_definition(conn, &table_name)?;
            let mut stmt = conn
                .prepare(
                    "SELECT \"item\" FROM \"docmigrate_items\" WHERE \"table_name\" = ?1 \
                     ORDER BY \"partition_key\", \"sort_key\"",
                )
                .map_err(backend_error)?;
            let rows = stmt
                .query_map(params![table_name], |row| row.get::<_, String>(0))
                .map_err(backend_error)?;

            let mut items = Vec::new();
            for raw in rows {
                items.push(Self::decode_item(&raw.map_err(backend_error)?)?);
            }
            Ok(items)
        })
        .await
    }

    async fn transact_write(&self, puts: Vec<Put>) -> Result<(), StoreError> {
        if puts.is_empty() {
            return Ok(());
        }
        self.with_conn(move |conn| {
            let tx = conn.transaction().map_err(backend_error)?;

            let mut definitions = std::collections::HashMap::new();
            for put in &puts {
                if !definitions.contains_key(&put.table_name) {
                    if let Some((definition, _)) = Self::load_definition(&tx, &put.table_name)? {
                        definitions.insert(put.table_name.clone(), definition);
                    }
                }
            }
            let resolved = resolve_puts(puts, |name| definitions.get(name))?;

            for r in &resolved {
                let existing: Option<String> = tx
                    .query_row(
                        "SELECT \"item\" FROM \"docmigrate_items\" \
                         WHERE \"table_name\" = ?1 AND \"partition_key\" = ?2 AND \"sort_key\" = ?3",
                        params![
                            r.put.table_name,
                            r.key.partition,
                            r.key.sort.clone().unwrap_or_default()
                        ],
                        |row| row.get(0),
                    )
                    .optional()
                    .map_err(backend_error)?;
                let existing = existing.as_deref().map(Self::decode_item).transpose()?;
                if !r.put.condition_holds(existing.as_ref()) {
                    // Dropping `tx` rolls the transaction back.
                    return Err(StoreError::ConditionalCheckFailed(r.put.table_name.clone()));
                }
            }

            for r in resolved {
                let encoded = serde_json::to_string(&r.put.item).map_err(backend_error)?;
                tx.execute(
                    "INSERT OR REPLACE INTO \"docmigrate_items\" \
                     (\"table_name\", \"partition_key\", \"sort_key\", \"item\") \
                     VALUES (?1, ?2, ?3, ?4)",
                    params![
                        r.put.table_name,
                        r.key.partition,
                        r.key.sort.unwrap_or_default(),
                        encoded
                    ],
                )
                .map_err(backend_error)?;
            }

            tx.commit().map_err(backend_error)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::{ensure_table, EnsureOutcome, WaitConfig};
    use crate::schema::{AttributeDefinition, AttributeType, KeySchemaElement};
    use serde_json::json;

    fn item(value: serde_json::Value) -> Item {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_open_memory() {
        let store = SqliteStore::memory().unwrap();
        assert_eq!(store.vendor(), "sqlite");
        assert_eq!(store.path(), &PathBuf::from(":memory:"));
        assert!(store.describe_table("users").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_table_twice() {
        let store = SqliteStore::memory().unwrap();
        let def = TableDefinition::with_hash_key("users", "id");
        let description = store.create_table(&def).await.unwrap();
        assert_eq!(description.status, TableStatus::Active);
        let err = store.create_table(&def).await.unwrap_err();
        assert_eq!(err, StoreError::ResourceInUse("users".into()));
    }

    #[tokio::test]
    async fn test_describe_roundtrips_definition() {
        let store = SqliteStore::memory().unwrap();
        let mut def = TableDefinition::with_hash_key("contacts", "user_id");
        def.attribute_definitions
            .push(AttributeDefinition::new("contact_id", AttributeType::String));
        def.key_schema.push(KeySchemaElement::range("contact_id"));
        store.create_table(&def).await.unwrap();

        let description = store.describe_table("contacts").await.unwrap().unwrap();
        assert_eq!(description.definition, def);
        assert_eq!(description.item_count, 0);
    }

    #[tokio::test]
    async fn test_transact_write_and_read_back() {
        let store = SqliteStore::memory().unwrap();
        store
            .create_table(&TableDefinition::with_hash_key("users", "id"))
            .await
            .unwrap();
        store
            .transact_write(vec![
                Put::new("users", item(json!({"id": "b", "active": true}))),
                Put::new("users", item(json!({"id": "a", "nested": {"x": [1, 2]}}))),
            ])
            .await
            .unwrap();

        let found = store
            .get_item("users", &item(json!({"id": "a"})))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found["nested"]["x"][1], 2);

        let all = store.scan("users").await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0]["id"], "a");
        assert_eq!(
            store.describe_table("users").await.unwrap().unwrap().item_count,
            2
        );
    }

    #[tokio::test]
    async fn test_failed_condition_rolls_back() {
        let store = SqliteStore::memory().unwrap();
        store
            .create_table(&TableDefinition::with_hash_key("ledger", "version"))
            .await
            .unwrap();
        store
            .transact_write(vec![
                Put::new("ledger", item(json!({"version": "1.0.0"}))).if_attribute_not_exists("version"),
            ])
            .await
            .unwrap();

        let err = store
            .transact_write(vec![
                Put::new("ledger", item(json!({"version": "2.0.0"}))),
                Put::new("ledger", item(json!({"version": "1.0.0"}))).if_attribute_not_exists("version"),
            ])
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::ConditionalCheckFailed("ledger".into()));
        assert_eq!(store.scan("ledger").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_write_to_unknown_table() {
        let store = SqliteStore::memory().unwrap();
        let err = store
            .transact_write(vec![Put::new("ghost", item(json!({"id": "1"})))])
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::ResourceNotFound("ghost".into()));
        assert!(matches!(
            store.scan("ghost").await,
            Err(StoreError::ResourceNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_file_store_persists_between_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.sqlite3");
        {
            let store = SqliteStore::open(&path).unwrap();
            let outcome = ensure_table(
                &store,
                &TableDefinition::with_hash_key("users", "id"),
                &WaitConfig::default(),
            )
            .await
            .unwrap();
            assert_eq!(outcome, EnsureOutcome::Created);
            store
                .transact_write(vec![Put::new("users", item(json!({"id": "1"})))])
                .await
                .unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        let outcome = ensure_table(
            &store,
            &TableDefinition::with_hash_key("users", "id"),
            &WaitConfig::default(),
        )
        .await
        .unwrap();
        assert_eq!(outcome, EnsureOutcome::AlreadyExists);
        assert_eq!(store.scan("users").await.unwrap().len(), 1);
    }
}
