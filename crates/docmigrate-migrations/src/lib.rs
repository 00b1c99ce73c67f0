//! # docmigrate-migrations
//!
//! Migration engine for docmigrate. Discovers versioned migration files,
//! parses them into normalized changes, applies them to a document store and
//! records each applied migration exactly once in a ledger table.
//!
//! ## Architecture
//!
//! - [`MigrationSource`] lists candidate migrations (files named
//!   `<major>.<minor>.<patch>*.json`).
//! - [`ContentParser`] turns file content into [`NormalizedChange`]s.
//! - [`ChangeExecutor`] ensures tables and writes data rows atomically.
//! - [`BookkeepingStore`] answers "already applied?" and records applied
//!   migrations with an insert-if-absent write.
//! - [`MigrationOrchestrator`] ties them together in version order.
//!
//! ## Module Overview
//!
//! - [`version`] - `Version` and the run-order comparator
//! - [`migration`] - `Migration`, `MigrationRecord`, `Metadata`
//! - [`change`] - `NormalizedChange`, `SchemaDefinition`
//! - [`parser`] - `ContentParser`, `JsonContentParser`
//! - [`source`] - `MigrationSource`, `DirectoryMigrationSource`
//! - [`ledger`] - `BookkeepingStore`, `LedgerStore`
//! - [`executor`] - `ChangeExecutor`, `StoreChangeExecutor`
//! - [`orchestrator`] - `MigrationOrchestrator`, `MigrationReport`, `RunError`

// Clippy overrides appropriate for a migration crate.
#![allow(clippy::result_large_err)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::module_name_repetitions)]

pub mod change;
pub mod executor;
pub mod ledger;
pub mod migration;
pub mod orchestrator;
pub mod parser;
pub mod source;
pub mod version;

pub use change::{NormalizedChange, SchemaDefinition};
pub use executor::{ChangeExecutor, StoreChangeExecutor};
pub use ledger::{BookkeepingStore, LedgerStore};
pub use migration::{Metadata, Migration, MigrationRecord};
pub use orchestrator::{
    MigrationOrchestrator, MigrationOutcome, MigrationReport, MigrationState, PlannedMigration,
    RunError,
};
pub use parser::{ContentParser, JsonContentParser};
pub use source::{
    parse_migration_filename, DirectoryMigrationSource, MigrationFilePattern, MigrationSource,
};
pub use version::Version;
