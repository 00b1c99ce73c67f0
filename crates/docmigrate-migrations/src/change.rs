//! Normalized change descriptions.
//!
//! The parser turns every element of a migration file into a
//! [`NormalizedChange`]: one table, the schema definitions to ensure for it
//! and the data rows to write into it.

use docmigrate_core::MigrateError;
use docmigrate_store::{
    validate_key_schema, AttributeDefinition, Item, KeySchemaElement, ProvisionedThroughput,
    TableDefinition,
};
use serde::{Deserialize, Serialize};

/// The attributes and key schema of a table to ensure.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SchemaDefinition {
    #[serde(default)]
    pub attribute_definitions: Vec<AttributeDefinition>,
    #[serde(default)]
    pub key_schema: Vec<KeySchemaElement>,
}

impl SchemaDefinition {
    /// Builds the store table definition for `table_name`.
    pub fn to_table_definition(
        &self,
        table_name: &str,
        throughput: ProvisionedThroughput,
    ) -> TableDefinition {
        TableDefinition {
            table_name: table_name.to_string(),
            attribute_definitions: self.attribute_definitions.clone(),
            key_schema: self.key_schema.clone(),
            provisioned_throughput: throughput,
        }
    }
}

/// One table's worth of changes from a migration file.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NormalizedChange {
    pub table_name: String,
    #[serde(default)]
    pub schema: Vec<SchemaDefinition>,
    #[serde(default)]
    pub data: Vec<Item>,
}

impl NormalizedChange {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_schema(mut self, schema: SchemaDefinition) -> Self {
        self.schema.push(schema);
        self
    }

    #[must_use]
    pub fn with_row(mut self, row: Item) -> Self {
        self.data.push(row);
        self
    }

    /// Checks that the change names a table and actually does something.
    ///
    /// Every schema definition must also describe a usable key schema.
    pub fn validate(&self) -> Result<(), MigrateError> {
        if self.table_name.is_empty() {
            return Err(MigrateError::ChangeInvalid("Table name required".to_string()));
        }
        if self.schema.is_empty() && self.data.is_empty() {
            return Err(MigrateError::ChangeInvalid(format!(
                "Either schema or data must be specified for {}",
                self.table_name
            )));
        }
        for schema in &self.schema {
            validate_key_schema(&schema.attribute_definitions, &schema.key_schema).map_err(
                |reason| {
                    MigrateError::ChangeInvalid(format!(
                        "Invalid schema for {}: {reason}",
                        self.table_name
                    ))
                },
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docmigrate_core::ErrorKind;
    use docmigrate_store::AttributeType;
    use serde_json::json;

    fn id_schema() -> SchemaDefinition {
        SchemaDefinition {
            attribute_definitions: vec![AttributeDefinition::new("id", AttributeType::String)],
            key_schema: vec![KeySchemaElement::hash("id")],
        }
    }

    #[test]
    fn test_validate_ok() {
        assert!(NormalizedChange::new("t").with_schema(id_schema()).validate().is_ok());
        let row = json!({"id": "1"}).as_object().cloned().unwrap();
        assert!(NormalizedChange::new("t").with_row(row).validate().is_ok());
    }

    #[test]
    fn test_validate_empty_table_name() {
        let err = NormalizedChange::new("").with_schema(id_schema()).validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ChangeInvalid);
        assert_eq!(err.to_string(), "Invalid change: Table name required");
    }

    #[test]
    fn test_validate_change_without_schema_or_data() {
        let err = NormalizedChange::new("t").validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ChangeInvalid);
    }

    #[test]
    fn test_validate_bad_key_schema() {
        let schema = SchemaDefinition {
            attribute_definitions: vec![],
            key_schema: vec![KeySchemaElement::hash("id")],
        };
        let err = NormalizedChange::new("t").with_schema(schema).validate().unwrap_err();
        assert!(err.to_string().contains("Invalid schema for t"));
    }

    #[test]
    fn test_to_table_definition() {
        let def = id_schema().to_table_definition("users", ProvisionedThroughput::default());
        assert_eq!(def.table_name, "users");
        assert_eq!(def.hash_key().unwrap().attribute_name, "id");
        assert_eq!(def.provisioned_throughput.read_capacity_units, 10);
    }
}
