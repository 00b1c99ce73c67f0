//! Table and item model shared by every store adapter.
//!
//! A table is described by a [`TableDefinition`]: its name, the attributes
//! used as keys, the key schema (one partition key, optionally one sort key)
//! and provisioned throughput. Items are JSON objects; the key attributes of
//! an item must be present and carry scalar values of the declared type.

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use docmigrate_core::{StoreError, StoreSettings};
use serde::{Deserialize, Serialize};

/// A stored record: attribute name to JSON value.
pub type Item = serde_json::Map<String, serde_json::Value>;

/// Scalar type of a key attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttributeType {
    /// String.
    #[serde(rename = "S")]
    String,
    /// Number.
    #[serde(rename = "N")]
    Number,
    /// Binary, carried as a base64 string.
    #[serde(rename = "B")]
    Binary,
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String => f.write_str("S"),
            Self::Number => f.write_str("N"),
            Self::Binary => f.write_str("B"),
        }
    }
}

/// Declares the type of an attribute that takes part in the key schema.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttributeDefinition {
    #[serde(rename = "name")]
    pub attribute_name: String,
    #[serde(rename = "type")]
    pub attribute_type: AttributeType,
}

impl AttributeDefinition {
    pub fn new(name: impl Into<String>, attribute_type: AttributeType) -> Self {
        Self {
            attribute_name: name.into(),
            attribute_type,
        }
    }
}

/// Role of an attribute in the primary key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyType {
    /// Partition key.
    #[serde(rename = "HASH")]
    Hash,
    /// Sort key.
    #[serde(rename = "RANGE")]
    Range,
}

/// One element of a key schema.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeySchemaElement {
    #[serde(rename = "name")]
    pub attribute_name: String,
    #[serde(rename = "type")]
    pub key_type: KeyType,
}

impl KeySchemaElement {
    pub fn hash(name: impl Into<String>) -> Self {
        Self {
            attribute_name: name.into(),
            key_type: KeyType::Hash,
        }
    }

    pub fn range(name: impl Into<String>) -> Self {
        Self {
            attribute_name: name.into(),
            key_type: KeyType::Range,
        }
    }
}

/// Read/write capacity recorded for a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionedThroughput {
    pub read_capacity_units: u64,
    pub write_capacity_units: u64,
}

impl Default for ProvisionedThroughput {
    fn default() -> Self {
        Self {
            read_capacity_units: 10,
            write_capacity_units: 10,
        }
    }
}

impl From<&StoreSettings> for ProvisionedThroughput {
    fn from(settings: &StoreSettings) -> Self {
        Self {
            read_capacity_units: settings.read_capacity_units,
            write_capacity_units: settings.write_capacity_units,
        }
    }
}

/// Everything needed to create a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDefinition {
    pub table_name: String,
    pub attribute_definitions: Vec<AttributeDefinition>,
    pub key_schema: Vec<KeySchemaElement>,
    pub provisioned_throughput: ProvisionedThroughput,
}

impl TableDefinition {
    /// Creates a definition with a single string partition key.
    pub fn with_hash_key(table_name: impl Into<String>, key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            table_name: table_name.into(),
            attribute_definitions: vec![AttributeDefinition::new(key.clone(), AttributeType::String)],
            key_schema: vec![KeySchemaElement::hash(key)],
            provisioned_throughput: ProvisionedThroughput::default(),
        }
    }

    /// Checks the table name and key schema.
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.table_name.is_empty() {
            return Err(StoreError::Validation("Table name required".to_string()));
        }
        validate_key_schema(&self.attribute_definitions, &self.key_schema).map_err(|reason| {
            StoreError::Validation(format!("Invalid key schema for {}: {reason}", self.table_name))
        })
    }

    /// Returns the partition key element.
    pub fn hash_key(&self) -> Option<&KeySchemaElement> {
        self.key_schema.iter().find(|k| k.key_type == KeyType::Hash)
    }

    /// Returns the sort key element, if the table has one.
    pub fn range_key(&self) -> Option<&KeySchemaElement> {
        self.key_schema.iter().find(|k| k.key_type == KeyType::Range)
    }

    fn attribute_type(&self, name: &str) -> Option<AttributeType> {
        self.attribute_definitions
            .iter()
            .find(|a| a.attribute_name == name)
            .map(|a| a.attribute_type)
    }

    /// Extracts the primary key of `item` under this definition.
    ///
    /// Fails with [`StoreError::Validation`] when a key attribute is missing
    /// or its value does not match the declared type.
    pub fn item_key(&self, item: &Item) -> Result<ItemKey, StoreError> {
        let hash = self.hash_key().ok_or_else(|| {
            StoreError::Validation(format!("Table {} has no partition key", self.table_name))
        })?;
        let partition = self.key_component(hash, item)?;
        let sort = match self.range_key() {
            Some(range) => Some(self.key_component(range, item)?),
            None => None,
        };
        Ok(ItemKey { partition, sort })
    }

    fn key_component(&self, key: &KeySchemaElement, item: &Item) -> Result<String, StoreError> {
        let name = &key.attribute_name;
        let value = item.get(name).ok_or_else(|| {
            StoreError::Validation(format!(
                "One or more parameter values were invalid: Missing the key {name} in the item for {}",
                self.table_name
            ))
        })?;
        let expected = self.attribute_type(name).unwrap_or(AttributeType::String);
        match (expected, value) {
            (AttributeType::String | AttributeType::Binary, serde_json::Value::String(s))
                if !s.is_empty() =>
            {
                Ok(s.clone())
            }
            (AttributeType::Number, serde_json::Value::Number(n)) => Ok(canonical_number(n)),
            _ => Err(StoreError::Validation(format!(
                "One or more parameter values were invalid: Type mismatch for key {name} in {}, expected {expected}",
                self.table_name
            ))),
        }
    }
}

/// Renders a number key so that equal values share one text form.
///
/// `1`, `1.0` and `1e0` all become `"1"`; `-0.0` becomes `"0"`.
#[allow(clippy::float_cmp)]
fn canonical_number(n: &serde_json::Number) -> String {
    if n.is_i64() || n.is_u64() {
        return n.to_string();
    }
    match n.as_f64() {
        Some(f) if f == 0.0 => "0".to_string(),
        Some(f) if f.fract() == 0.0 => format!("{f:.0}"),
        Some(f) => f.to_string(),
        None => n.to_string(),
    }
}

/// Checks that a key schema is usable.
///
/// Requires exactly one partition key listed first, at most one sort key, no
/// repeated key attributes, and a type declaration for every key attribute.
pub fn validate_key_schema(
    attributes: &[AttributeDefinition],
    keys: &[KeySchemaElement],
) -> Result<(), String> {
    let Some(first) = keys.first() else {
        return Err("key schema must not be empty".to_string());
    };
    if first.key_type != KeyType::Hash {
        return Err("the first key schema element must be the HASH key".to_string());
    }
    let hash_count = keys.iter().filter(|k| k.key_type == KeyType::Hash).count();
    let range_count = keys.iter().filter(|k| k.key_type == KeyType::Range).count();
    if hash_count != 1 || range_count > 1 {
        return Err("expected exactly one HASH key and at most one RANGE key".to_string());
    }

    let mut seen = HashSet::new();
    for key in keys {
        if key.attribute_name.is_empty() {
            return Err("key attribute names must not be empty".to_string());
        }
        if !seen.insert(key.attribute_name.as_str()) {
            return Err(format!("key attribute {} is repeated", key.attribute_name));
        }
        if !attributes.iter().any(|a| a.attribute_name == key.attribute_name) {
            return Err(format!(
                "key attribute {} has no attribute definition",
                key.attribute_name
            ));
        }
    }
    Ok(())
}

/// Canonical form of an item's primary key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ItemKey {
    pub partition: String,
    pub sort: Option<String>,
}

/// Lifecycle state of a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TableStatus {
    Creating,
    Active,
}

/// What a store reports about an existing table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDescription {
    pub definition: TableDefinition,
    pub status: TableStatus,
    pub item_count: usize,
    pub created_at: DateTime<Utc>,
}

impl TableDescription {
    pub fn is_active(&self) -> bool {
        self.status == TableStatus::Active
    }
}
