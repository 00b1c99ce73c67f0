//! # docmigrate-cli
//!
//! The `docmigrate` command line: a small management command framework plus
//! the built-in `migrate`, `showmigrations` and `check` commands.
//!
//! ## Quick Start
//!
//! ```rust
//! use docmigrate_cli::command::CommandRegistry;
//! use docmigrate_cli::commands::register_builtin_commands;
//!
//! let mut registry = CommandRegistry::new();
//! register_builtin_commands(&mut registry);
//!
//! assert_eq!(registry.list_commands(), vec!["check", "migrate", "showmigrations"]);
//! ```

// These clippy lints are intentionally allowed:
// - result_large_err: MigrateError is the crate-wide error type
// - doc_markdown: backtick requirements for documentation items are too strict
// - missing_const_for_fn: some functions may gain runtime logic later
// - unused_async: command handlers maintain consistent async signatures
#![allow(clippy::result_large_err)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::unused_async)]

pub mod command;
pub mod commands;
pub mod runner;

pub use command::{resolve_settings, CommandRegistry, ManagementCommand};
pub use commands::register_builtin_commands;
