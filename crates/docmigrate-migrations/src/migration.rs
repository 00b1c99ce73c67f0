//! Migration identity and metadata.
//!
//! A [`Migration`] is a discovered file: its [`MigrationRecord`] (version,
//! name, metadata) plus the raw content. Only the record is persisted, and
//! only after the migration's changes have been applied.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::version::Version;

/// Timing information stored with an applied migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Metadata {
    /// Unix timestamp (seconds) at which execution started.
    pub start_time: i64,
    /// Whole seconds spent executing the changes.
    pub execution_time: i64,
}

/// A migration's persisted identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationRecord {
    pub version: Version,
    pub name: String,
    #[serde(default)]
    pub metadata: Metadata,
}

impl MigrationRecord {
    pub fn new(version: Version, name: impl Into<String>) -> Self {
        Self {
            version,
            name: name.into(),
            metadata: Metadata::default(),
        }
    }
}

/// A discovered migration file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migration {
    pub record: MigrationRecord,
    pub content: Vec<u8>,
}

impl Migration {
    pub fn new(version: Version, name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            record: MigrationRecord::new(version, name),
            content: content.into(),
        }
    }

    pub const fn version(&self) -> Version {
        self.record.version
    }

    pub fn name(&self) -> &str {
        &self.record.name
    }

    /// Stores the start time and the elapsed whole seconds between `start` and `end`.
    pub fn set_execution_time(&mut self, start: DateTime<Utc>, end: DateTime<Utc>) {
        self.record.metadata.start_time = start.timestamp();
        self.record.metadata.execution_time = end.timestamp() - start.timestamp();
    }
}

impl fmt::Display for Migration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.record.version, self.record.name)
    }
}
