//! Migration content parsing.
//!
//! Migration files are JSON arrays of change objects:
//!
//! ```json
//! [
//!   {
//!     "table_name": "users",
//!     "schema": {
//!       "attribute_definitions": [{"name": "id", "type": "S"}],
//!       "key_schema": [{"name": "id", "type": "HASH"}]
//!     },
//!     "data": [{"id": "1", "email": "a@example.com"}]
//!   }
//! ]
//! ```
//!
//! `schema` and `data` may each be a single object or an array of objects;
//! both shapes normalize to an array. Either may be omitted.

use docmigrate_core::ParseError;
use docmigrate_store::Item;
use serde_json::Value;

use crate::change::{NormalizedChange, SchemaDefinition};

const FIELD_TABLE_NAME: &str = "table_name";
const FIELD_SCHEMA: &str = "schema";
const FIELD_DATA: &str = "data";

/// Turns raw migration content into normalized changes.
pub trait ContentParser: Send + Sync {
    /// Parses `content`, preserving the order of its change entries.
    fn parse_content(&self, content: &[u8]) -> Result<Vec<NormalizedChange>, ParseError>;
}

/// The JSON migration format.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonContentParser;

impl JsonContentParser {
    pub const fn new() -> Self {
        Self
    }
}

impl ContentParser for JsonContentParser {
    fn parse_content(&self, content: &[u8]) -> Result<Vec<NormalizedChange>, ParseError> {
        if content.is_empty() {
            return Err(ParseError::EmptyContent);
        }
        let value: Value = serde_json::from_slice(content)
            .map_err(|e| ParseError::MalformedContent(e.to_string()))?;
        let Value::Array(entries) = value else {
            return Err(ParseError::MalformedContent(
                "expected a JSON array of change objects".to_string(),
            ));
        };

        entries
            .into_iter()
            .enumerate()
            .map(|(index, entry)| parse_change(index, entry))
            .collect()
    }
}

fn parse_change(index: usize, entry: Value) -> Result<NormalizedChange, ParseError> {
    let Value::Object(mut fields) = entry else {
        return Err(ParseError::MalformedContent(format!(
            "change #{index} is not a JSON object"
        )));
    };
    let table_name = match fields.remove(FIELD_TABLE_NAME) {
        Some(Value::String(name)) => name,
        _ => return Err(ParseError::MissingTableName { index }),
    };
    let schema = match fields.remove(FIELD_SCHEMA) {
        Some(value) => parse_schema(&table_name, value)?,
        None => Vec::new(),
    };
    let data = match fields.remove(FIELD_DATA) {
        Some(value) => parse_data(&table_name, value)?,
        None => Vec::new(),
    };
    Ok(NormalizedChange {
        table_name,
        schema,
        data,
    })
}

fn parse_schema(table: &str, value: Value) -> Result<Vec<SchemaDefinition>, ParseError> {
    let invalid = |reason: String| ParseError::InvalidSchema {
        table: table.to_string(),
        reason,
    };
    let elements = match value {
        Value::Object(_) => vec![value],
        Value::Array(elements) => elements,
        other => {
            return Err(invalid(format!(
                "expected an object or an array of objects, got {}",
                json_type(&other)
            )))
        }
    };
    elements
        .into_iter()
        .map(|element| serde_json::from_value(element).map_err(|e| invalid(e.to_string())))
        .collect()
}

fn parse_data(table: &str, value: Value) -> Result<Vec<Item>, ParseError> {
    let invalid = |reason: String| ParseError::InvalidData {
        table: table.to_string(),
        reason,
    };
    match value {
        Value::Object(row) => Ok(vec![row]),
        Value::Array(rows) => rows
            .into_iter()
            .enumerate()
            .map(|(i, row)| match row {
                Value::Object(row) => Ok(row),
                other => Err(invalid(format!(
                    "row #{i} is {}, expected an object",
                    json_type(&other)
                ))),
            })
            .collect(),
        other => Err(invalid(format!(
            "expected an object or an array of objects, got {}",
            json_type(&other)
        ))),
    }
}

const fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
