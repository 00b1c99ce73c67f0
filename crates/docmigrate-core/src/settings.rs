//! Settings for a docmigrate run.
//!
//! [`Settings`] holds everything the runner needs: where the migration files
//! live, which table records applied migrations, how to reach the target store
//! and how to log. All fields have defaults matching the command-line defaults,
//! so a partial configuration file only needs to name what it changes.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::MigrateError;

/// The storage engine backing the target store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreEngine {
    /// A SQLite file holding tables and items.
    #[default]
    Sqlite,
    /// A process-local store; nothing survives the run.
    Memory,
}

impl fmt::Display for StoreEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sqlite => f.write_str("sqlite"),
            Self::Memory => f.write_str("memory"),
        }
    }
}

impl FromStr for StoreEngine {
    type Err = MigrateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Ok(Self::Sqlite),
            "memory" => Ok(Self::Memory),
            other => Err(MigrateError::ConfigInvalid(format!(
                "Unknown store engine '{other}' (expected 'sqlite' or 'memory')"
            ))),
        }
    }
}

/// Target store configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSettings {
    /// The storage engine.
    pub engine: StoreEngine,
    /// The database file for file-backed engines.
    pub path: PathBuf,
    /// Read capacity recorded on every table the runner creates.
    pub read_capacity_units: u64,
    /// Write capacity recorded on every table the runner creates.
    pub write_capacity_units: u64,
    /// Upper bound on waiting for a freshly created table to become active.
    pub table_wait_timeout_secs: u64,
    /// Delay between table status polls while waiting.
    pub table_poll_interval_ms: u64,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            engine: StoreEngine::Sqlite,
            path: PathBuf::from("docmigrate.sqlite3"),
            read_capacity_units: 10,
            write_capacity_units: 10,
            table_wait_timeout_secs: 60,
            table_poll_interval_ms: 200,
        }
    }
}

impl StoreSettings {
    pub const fn table_wait_timeout(&self) -> Duration {
        Duration::from_secs(self.table_wait_timeout_secs)
    }

    pub const fn table_poll_interval(&self) -> Duration {
        Duration::from_millis(self.table_poll_interval_ms)
    }
}

/// The complete set of runner settings.
///
/// # Examples
///
/// ```
/// use docmigrate_core::settings::Settings;
///
/// let settings = Settings::default();
/// assert_eq!(settings.migrations_table, "x_migrations");
/// assert!(settings.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Directory where the migration files are located.
    pub migrations_dir: PathBuf,
    /// Name of the ledger table recording applied migrations.
    pub migrations_table: String,
    /// Enables human-readable log output.
    pub debug: bool,
    /// The log filter (e.g. "info", "debug", "docmigrate_migrations=trace").
    pub log_level: String,
    /// Target store configuration.
    pub store: StoreSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            migrations_dir: PathBuf::from("migrations"),
            migrations_table: "x_migrations".to_string(),
            debug: false,
            log_level: "info".to_string(),
            store: StoreSettings::default(),
        }
    }
}

impl Settings {
    /// Checks that the settings describe a runnable configuration.
    ///
    /// This must pass before a run starts; a failure is always
    /// [`MigrateError::ConfigInvalid`].
    pub fn validate(&self) -> Result<(), MigrateError> {
        if self.migrations_dir.as_os_str().is_empty() {
            return Err(MigrateError::ConfigInvalid(
                "Migrations directory required".to_string(),
            ));
        }
        if self.migrations_table.trim().is_empty() {
            return Err(MigrateError::ConfigInvalid(
                "Migrations table name required".to_string(),
            ));
        }
        if self.store.engine == StoreEngine::Sqlite && self.store.path.as_os_str().is_empty() {
            return Err(MigrateError::ConfigInvalid(
                "Store path required for the sqlite engine".to_string(),
            ));
        }
        if self.store.table_poll_interval_ms == 0 {
            return Err(MigrateError::ConfigInvalid(
                "Table poll interval must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.migrations_dir, PathBuf::from("migrations"));
        assert_eq!(settings.migrations_table, "x_migrations");
        assert!(!settings.debug);
        assert_eq!(settings.log_level, "info");
        assert_eq!(settings.store.engine, StoreEngine::Sqlite);
        assert_eq!(settings.store.read_capacity_units, 10);
        assert_eq!(settings.store.write_capacity_units, 10);
    }

    #[test]
    fn test_validate_default_ok() {
        assert!(Settings::default().validate().is_ok());
    }

    #[test]
    fn test_validate_missing_dir() {
        let settings = Settings {
            migrations_dir: PathBuf::new(),
            ..Settings::default()
        };
        let err = settings.validate().unwrap_err();
        assert!(matches!(err, MigrateError::ConfigInvalid(_)));
        assert!(err.to_string().contains("Migrations directory required"));
    }

    #[test]
    fn test_validate_missing_table() {
        let settings = Settings {
            migrations_table: "  ".to_string(),
            ..Settings::default()
        };
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("Migrations table name required"));
    }

    #[test]
    fn test_validate_memory_engine_ignores_path() {
        let mut settings = Settings::default();
        settings.store.engine = StoreEngine::Memory;
        settings.store.path = PathBuf::new();
        assert!(settings.validate().is_ok());

        settings.store.engine = StoreEngine::Sqlite;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validate_zero_poll_interval() {
        let mut settings = Settings::default();
        settings.store.table_poll_interval_ms = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_store_engine_from_str() {
        assert_eq!("sqlite".parse::<StoreEngine>().unwrap(), StoreEngine::Sqlite);
        assert_eq!(" Memory ".parse::<StoreEngine>().unwrap(), StoreEngine::Memory);
        assert!("dynamo".parse::<StoreEngine>().is_err());
        assert_eq!(StoreEngine::Memory.to_string(), "memory");
    }

    #[test]
    fn test_durations() {
        let store = StoreSettings::default();
        assert_eq!(store.table_wait_timeout(), Duration::from_secs(60));
        assert_eq!(store.table_poll_interval(), Duration::from_millis(200));
    }

    #[test]
    fn test_settings_serde_roundtrip() {
        let settings = Settings::default();
        let json = serde_json::to_value(&settings).unwrap();
        assert_eq!(json["store"]["engine"], "sqlite");
        let back: Settings = serde_json::from_value(json).unwrap();
        assert_eq!(back, settings);
    }
}
