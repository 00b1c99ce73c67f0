//! Core error types for docmigrate.
//!
//! [`MigrateError`] is the error returned by every stage of a migration run.
//! Parsing failures are described by [`ParseError`] and failures talking to the
//! target store by [`StoreError`]; both convert into [`MigrateError`] with `?`.
//! [`ErrorKind`] groups the variants into the categories reported to operators.

use std::fmt;

use thiserror::Error;

/// An error raised while turning migration file content into normalized changes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The migration file has zero bytes.
    #[error("Cannot parse empty migration content")]
    EmptyContent,

    /// The content is not a JSON array of objects.
    #[error("Malformed migration content: {0}")]
    MalformedContent(String),

    /// A change entry has no string `table_name` field.
    #[error("Cannot parse table name of change #{index}")]
    MissingTableName {
        /// Zero-based position of the offending entry.
        index: usize,
    },

    /// The `schema` field is neither a schema object nor an array of them.
    #[error("Cannot parse schema for {table}: {reason}")]
    InvalidSchema { table: String, reason: String },

    /// The `data` field is neither a record nor an array of records.
    #[error("Cannot parse data for {table}: {reason}")]
    InvalidData { table: String, reason: String },
}

/// An error reported by a document store adapter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The named table does not exist.
    #[error("Requested resource not found: table {0}")]
    ResourceNotFound(String),

    /// The named table already exists (or is being created).
    #[error("Resource in use: table {0} already exists")]
    ResourceInUse(String),

    /// A conditional write found its precondition violated.
    #[error("Conditional check failed for an item in table {0}")]
    ConditionalCheckFailed(String),

    /// The request itself is invalid (bad key, duplicate item, bad definition).
    #[error("Validation error: {0}")]
    Validation(String),

    /// A table did not become active within the configured wait.
    #[error("Timed out waiting for table {0} to become active")]
    Timeout(String),

    /// Any other failure of the underlying storage engine.
    #[error("Store backend error: {0}")]
    Backend(String),
}

/// The primary error type for docmigrate.
#[derive(Error, Debug)]
pub enum MigrateError {
    // ── Configuration ────────────────────────────────────────────────

    /// A required setting is missing or invalid.
    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),

    // ── Discovery ────────────────────────────────────────────────────

    /// The migrations location could not be enumerated or read.
    #[error("Migration discovery failed: {0}")]
    Discovery(String),

    /// A file in the migrations location does not follow the naming pattern.
    #[error("File is ignored, naming pattern is wrong: {path}")]
    NamingPatternViolation { path: String },

    // ── Content ──────────────────────────────────────────────────────

    /// The migration content could not be parsed.
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// A parsed change is structurally valid but semantically unusable.
    #[error("Invalid change: {0}")]
    ChangeInvalid(String),

    /// A data row resolved to an empty item.
    #[error("Items cannot be empty for {table}")]
    EmptyItem { table: String },

    // ── Store ────────────────────────────────────────────────────────

    /// The target store or the ledger failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// The insert-if-absent ledger write found the version already recorded.
    #[error("Migration {version} is already recorded in the ledger")]
    LedgerConflict { version: String },

    // ── Context ──────────────────────────────────────────────────────

    /// An error raised while processing the named migration.
    #[error("Migration failed: {name}, error: {source}")]
    Migration {
        name: String,
        #[source]
        source: Box<MigrateError>,
    },
}

/// The operator-facing category of a [`MigrateError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ConfigInvalid,
    DiscoveryError,
    ParseError,
    ChangeInvalid,
    StoreError,
    LedgerConflict,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ConfigInvalid => "ConfigInvalid",
            Self::DiscoveryError => "DiscoveryError",
            Self::ParseError => "ParseError",
            Self::ChangeInvalid => "ChangeInvalid",
            Self::StoreError => "StoreError",
            Self::LedgerConflict => "LedgerConflict",
        };
        f.write_str(name)
    }
}

impl MigrateError {
    /// Returns the category of this error, looking through migration context.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ConfigInvalid(_) => ErrorKind::ConfigInvalid,
            Self::Discovery(_) | Self::NamingPatternViolation { .. } => ErrorKind::DiscoveryError,
            Self::Parse(_) => ErrorKind::ParseError,
            Self::ChangeInvalid(_) | Self::EmptyItem { .. } => ErrorKind::ChangeInvalid,
            Self::Store(_) => ErrorKind::StoreError,
            Self::LedgerConflict { .. } => ErrorKind::LedgerConflict,
            Self::Migration { source, .. } => source.kind(),
        }
    }

    /// Wraps this error with the name of the migration being processed.
    #[must_use]
    pub fn within_migration(self, name: impl Into<String>) -> Self {
        Self::Migration {
            name: name.into(),
            source: Box::new(self),
        }
    }

    /// Returns the innermost error, skipping migration context wrappers.
    pub fn root_cause(&self) -> &Self {
        match self {
            Self::Migration { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

/// A convenience type alias for `Result<T, MigrateError>`.
pub type MigrateResult<T> = Result<T, MigrateError>;
