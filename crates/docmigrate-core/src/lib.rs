//! # docmigrate-core
//!
//! Core types shared by every docmigrate crate: the error taxonomy, runner
//! settings and their loaders, and logging setup.
//!
//! ## Modules
//!
//! - [`error`] - Error types and result aliases
//! - [`settings`] - Runner settings and validation
//! - [`settings_loader`] - Loading settings from TOML/JSON files and the environment
//! - [`logging`] - Tracing-based logging integration

pub mod error;
pub mod logging;
pub mod settings;
pub mod settings_loader;

// Re-export the most commonly used types at the crate root.
pub use error::{ErrorKind, MigrateError, MigrateResult, ParseError, StoreError};
pub use settings::{Settings, StoreEngine, StoreSettings};
