//! Settings loading from configuration files and the environment.
//!
//! ## Loading Order
//!
//! 1. Start with default settings.
//! 2. Load from a TOML or JSON file (overriding defaults).
//! 3. Apply environment variable overrides.
//! 4. Command-line flags are applied last by the CLI.
//!
//! ## Environment Variable Mapping
//!
//! | Env Var | Setting |
//! |---|---|
//! | `DOCMIGRATE_MIGRATIONS_DIR` | `migrations_dir` |
//! | `DOCMIGRATE_MIGRATIONS_TABLE` | `migrations_table` |
//! | `DOCMIGRATE_DEBUG` | `debug` |
//! | `DOCMIGRATE_LOG_LEVEL` | `log_level` |
//! | `DOCMIGRATE_STORE_ENGINE` | `store.engine` |
//! | `DOCMIGRATE_STORE_PATH` | `store.path` |
//! | `DOCMIGRATE_TABLE_WAIT_TIMEOUT_SECS` | `store.table_wait_timeout_secs` |
//!
//! ## Examples
//!
//! ```rust,no_run
//! use docmigrate_core::settings_loader;
//!
//! let mut settings = settings_loader::from_file("docmigrate.toml").unwrap();
//! settings_loader::apply_overrides(&mut settings, |key| std::env::var(key).ok()).unwrap();
//! ```

use std::path::{Path, PathBuf};

use crate::error::MigrateError;
use crate::settings::Settings;

/// Loads settings from a TOML string, keeping defaults for absent keys.
pub fn from_toml_str(toml_str: &str) -> Result<Settings, MigrateError> {
    let toml_value: toml::Value = toml::from_str(toml_str)
        .map_err(|e| MigrateError::ConfigInvalid(format!("Failed to parse TOML: {e}")))?;
    from_json_value(toml_to_json(toml_value), "TOML")
}

/// Loads settings from a JSON string, keeping defaults for absent keys.
pub fn from_json_str(json_str: &str) -> Result<Settings, MigrateError> {
    let json_value: serde_json::Value = serde_json::from_str(json_str)
        .map_err(|e| MigrateError::ConfigInvalid(format!("Failed to parse JSON: {e}")))?;
    from_json_value(json_value, "JSON")
}

/// Loads settings from a file, choosing the format from its extension.
///
/// `.toml` and `.json` are supported.
pub fn from_file(path: impl AsRef<Path>) -> Result<Settings, MigrateError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| {
        MigrateError::ConfigInvalid(format!(
            "Failed to read config file '{}': {e}",
            path.display()
        ))
    })?;
    match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => from_toml_str(&content),
        Some("json") => from_json_str(&content),
        _ => Err(MigrateError::ConfigInvalid(format!(
            "Unsupported config file format: '{}' (expected .toml or .json)",
            path.display()
        ))),
    }
}

/// Applies overrides read through `lookup`, keyed by environment variable name.
///
/// Malformed numeric or engine values are reported as
/// [`MigrateError::ConfigInvalid`] rather than silently ignored.
pub fn apply_overrides<F>(settings: &mut Settings, lookup: F) -> Result<(), MigrateError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(val) = lookup("DOCMIGRATE_MIGRATIONS_DIR") {
        settings.migrations_dir = PathBuf::from(val);
    }

    if let Some(val) = lookup("DOCMIGRATE_MIGRATIONS_TABLE") {
        settings.migrations_table = val;
    }

    if let Some(val) = lookup("DOCMIGRATE_DEBUG") {
        settings.debug = matches!(val.to_lowercase().as_str(), "true" | "1" | "yes");
    }

    if let Some(val) = lookup("DOCMIGRATE_LOG_LEVEL") {
        settings.log_level = val;
    }

    if let Some(val) = lookup("DOCMIGRATE_STORE_ENGINE") {
        settings.store.engine = val.parse()?;
    }

    if let Some(val) = lookup("DOCMIGRATE_STORE_PATH") {
        settings.store.path = PathBuf::from(val);
    }

    if let Some(val) = lookup("DOCMIGRATE_TABLE_WAIT_TIMEOUT_SECS") {
        settings.store.table_wait_timeout_secs = val.trim().parse().map_err(|_| {
            MigrateError::ConfigInvalid(format!(
                "DOCMIGRATE_TABLE_WAIT_TIMEOUT_SECS must be a number of seconds, got '{val}'"
            ))
        })?;
    }

    Ok(())
}

// ============================================================
// Helpers
// ============================================================

fn from_json_value(value: serde_json::Value, format: &str) -> Result<Settings, MigrateError> {
    let default_json = serde_json::to_value(Settings::default()).map_err(|e| {
        MigrateError::ConfigInvalid(format!("Failed to serialize default settings: {e}"))
    })?;

    let merged = merge_json(default_json, value);
    serde_json::from_value(merged).map_err(|e| {
        MigrateError::ConfigInvalid(format!("Failed to deserialize settings from {format}: {e}"))
    })
}

/// Converts a TOML value to a `serde_json::Value`.
fn toml_to_json(value: toml::Value) -> serde_json::Value {
    match value {
        toml::Value::String(s) => serde_json::Value::String(s),
        toml::Value::Integer(i) => serde_json::json!(i),
        toml::Value::Float(f) => serde_json::json!(f),
        toml::Value::Boolean(b) => serde_json::Value::Bool(b),
        toml::Value::Datetime(dt) => serde_json::Value::String(dt.to_string()),
        toml::Value::Array(arr) => {
            serde_json::Value::Array(arr.into_iter().map(toml_to_json).collect())
        }
        toml::Value::Table(table) => {
            let map: serde_json::Map<String, serde_json::Value> = table
                .into_iter()
                .map(|(k, v)| (k, toml_to_json(v)))
                .collect();
            serde_json::Value::Object(map)
        }
    }
}

/// Deep-merges two JSON values. The `override_val` takes precedence.
fn merge_json(base: serde_json::Value, override_val: serde_json::Value) -> serde_json::Value {
    match (base, override_val) {
        (serde_json::Value::Object(mut base_map), serde_json::Value::Object(override_map)) => {
            for (key, override_v) in override_map {
                let merged = if let Some(base_v) = base_map.remove(&key) {
                    merge_json(base_v, override_v)
                } else {
                    override_v
                };
                base_map.insert(key, merged);
            }
            serde_json::Value::Object(base_map)
        }
        (_, override_val) => override_val,
    }
}
