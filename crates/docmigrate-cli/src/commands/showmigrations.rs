//! The `showmigrations` management command.
//!
//! Lists every discovered migration in run order, marking applied ones:
//!
//! ```text
//! [X] 1.0.0  1.0.0_users.json
//! [ ] 1.1.0  1.1.0_roles.json
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use docmigrate_core::{MigrateError, Settings};
use docmigrate_migrations::PlannedMigration;
use docmigrate_store::{open_store, DocumentStore};

use crate::command::ManagementCommand;
use crate::runner::build_orchestrator;

/// Lists migrations and their applied status.
pub struct ShowmigrationsCommand;

impl ShowmigrationsCommand {
    /// Returns the status lines for every migration, in run order.
    pub async fn status_lines(
        settings: &Settings,
        store: Arc<dyn DocumentStore>,
    ) -> Result<Vec<String>, MigrateError> {
        let plan = build_orchestrator(settings, store).await?.plan().await?;
        Ok(plan.iter().map(format_entry).collect())
    }
}

fn format_entry(entry: &PlannedMigration) -> String {
    let marker = if entry.applied { "[X]" } else { "[ ]" };
    format!("{marker} {}  {}", entry.version, entry.name)
}

#[async_trait]
impl ManagementCommand for ShowmigrationsCommand {
    fn name(&self) -> &'static str {
        "showmigrations"
    }

    fn help(&self) -> &'static str {
        "Show migration status"
    }

    async fn handle(
        &self,
        _matches: &clap::ArgMatches,
        settings: &Settings,
    ) -> Result<(), MigrateError> {
        let store = open_store(&settings.store)?;
        let lines = Self::status_lines(settings, store).await?;
        if lines.is_empty() {
            tracing::info!("No migrations found");
        }
        for line in lines {
            println!("{line}");
        }
        Ok(())
    }
}
