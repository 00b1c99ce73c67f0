//! Management command framework for docmigrate.
//!
//! This module provides the [`ManagementCommand`] trait for defining CLI
//! commands and [`CommandRegistry`] for registering them and building the
//! `docmigrate` command line, including the global runner options shared by
//! every command.
//!
//! ## Defining a Custom Command
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use docmigrate_cli::command::ManagementCommand;
//! use docmigrate_core::{MigrateError, Settings};
//!
//! struct WhereCommand;
//!
//! #[async_trait]
//! impl ManagementCommand for WhereCommand {
//!     fn name(&self) -> &str { "where" }
//!     fn help(&self) -> &str { "Print the migrations directory" }
//!
//!     async fn handle(
//!         &self,
//!         _matches: &clap::ArgMatches,
//!         settings: &Settings,
//!     ) -> Result<(), MigrateError> {
//!         println!("{}", settings.migrations_dir.display());
//!         Ok(())
//!     }
//! }
//! ```

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use docmigrate_core::{settings_loader, MigrateError, Settings, StoreEngine};

/// A management command that can be registered and invoked through the CLI.
#[async_trait]
pub trait ManagementCommand: Send + Sync {
    /// Returns the name of this command (used to invoke it from the CLI).
    fn name(&self) -> &str;

    /// Returns a short help description for this command.
    fn help(&self) -> &str;

    /// Adds custom arguments to the clap command.
    ///
    /// The default implementation returns the command unchanged.
    fn add_arguments(&self, cmd: clap::Command) -> clap::Command {
        cmd
    }

    /// Executes the command with the given argument matches and settings.
    async fn handle(&self, matches: &clap::ArgMatches, settings: &Settings)
        -> Result<(), MigrateError>;
}

/// A registry of management commands.
///
/// Commands are registered by name and can be looked up, listed, or executed.
pub struct CommandRegistry {
    commands: HashMap<String, Box<dyn ManagementCommand>>,
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRegistry {
    /// Creates a new empty command registry.
    pub fn new() -> Self {
        Self {
            commands: HashMap::new(),
        }
    }

    /// Registers a management command.
    ///
    /// If a command with the same name already exists, it is replaced.
    pub fn register(&mut self, command: Box<dyn ManagementCommand>) {
        let name = command.name().to_string();
        self.commands.insert(name, command);
    }

    /// Returns a reference to the command with the given name, if registered.
    pub fn get(&self, name: &str) -> Option<&dyn ManagementCommand> {
        self.commands.get(name).map(AsRef::as_ref)
    }

    /// Returns a sorted list of all registered command names.
    pub fn list_commands(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.commands.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Builds the top-level `docmigrate` command with every registered subcommand.
    pub fn build_cli(&self) -> clap::Command {
        let mut app = global_arguments(
            clap::Command::new("docmigrate")
                .about("Applies versioned migrations to a document store exactly once")
                .version(env!("CARGO_PKG_VERSION"))
                .subcommand_required(true),
        );

        let mut entries: Vec<_> = self.commands.iter().collect();
        entries.sort_by_key(|(name, _)| (*name).clone());

        for (name, cmd) in entries {
            // clap wants `&'static str` names; commands are registered once at startup.
            let static_name: &'static str = Box::leak(name.clone().into_boxed_str());
            let subcmd = clap::Command::new(static_name).about(cmd.help().to_string());
            app = app.subcommand(cmd.add_arguments(subcmd));
        }

        app
    }

    /// Executes the command identified by the given argument matches.
    pub async fn execute(
        &self,
        matches: &clap::ArgMatches,
        settings: &Settings,
    ) -> Result<(), MigrateError> {
        let (name, sub_matches) = matches
            .subcommand()
            .ok_or_else(|| MigrateError::ConfigInvalid("No subcommand specified".to_string()))?;

        let cmd = self
            .get(name)
            .ok_or_else(|| MigrateError::ConfigInvalid(format!("Unknown command: {name}")))?;

        cmd.handle(sub_matches, settings).await
    }
}

fn global_arguments(cmd: clap::Command) -> clap::Command {
    cmd.arg(
        clap::Arg::new("config")
            .long("config")
            .value_name("FILE")
            .value_parser(clap::value_parser!(PathBuf))
            .help("Settings file (.toml or .json)"),
    )
    .arg(
        clap::Arg::new("migrations")
            .long("migrations")
            .value_name("DIR")
            .value_parser(clap::value_parser!(PathBuf))
            .help("Directory where the migration files are located"),
    )
    .arg(
        clap::Arg::new("x-migrations-table")
            .long("x-migrations-table")
            .value_name("NAME")
            .help("Table recording applied migrations"),
    )
    .arg(
        clap::Arg::new("store-path")
            .long("store-path")
            .value_name("PATH")
            .value_parser(clap::value_parser!(PathBuf))
            .help("Database file of the target store"),
    )
    .arg(
        clap::Arg::new("store-engine")
            .long("store-engine")
            .value_name("ENGINE")
            .value_parser(["sqlite", "memory"])
            .help("Target store engine"),
    )
    .arg(
        clap::Arg::new("log-level")
            .long("log-level")
            .value_name("LEVEL")
            .help("Log filter, e.g. info or docmigrate_migrations=debug"),
    )
}

/// Resolves the settings for a run.
///
/// Starts from the `--config` file (or defaults), applies `DOCMIGRATE_*`
/// environment overrides, then the command-line flags.
pub fn resolve_settings(matches: &clap::ArgMatches) -> Result<Settings, MigrateError> {
    resolve_settings_with(matches, |key| std::env::var(key).ok())
}

/// [`resolve_settings`] with an explicit environment lookup.
pub fn resolve_settings_with<F>(
    matches: &clap::ArgMatches,
    lookup: F,
) -> Result<Settings, MigrateError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut settings = match matches.get_one::<PathBuf>("config") {
        Some(path) => settings_loader::from_file(path)?,
        None => Settings::default(),
    };
    settings_loader::apply_overrides(&mut settings, lookup)?;

    if let Some(dir) = matches.get_one::<PathBuf>("migrations") {
        settings.migrations_dir.clone_from(dir);
    }
    if let Some(table) = matches.get_one::<String>("x-migrations-table") {
        settings.migrations_table.clone_from(table);
    }
    if let Some(path) = matches.get_one::<PathBuf>("store-path") {
        settings.store.path.clone_from(path);
    }
    if let Some(engine) = matches.get_one::<String>("store-engine") {
        settings.store.engine = engine.parse::<StoreEngine>()?;
    }
    if let Some(level) = matches.get_one::<String>("log-level") {
        settings.log_level.clone_from(level);
    }
    Ok(settings)
}
