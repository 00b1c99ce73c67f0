//! The `migrate` management command.
//!
//! Applies every pending migration from the migrations directory to the
//! configured store, in version order, recording each one in the ledger.

use std::sync::Arc;

use async_trait::async_trait;
use docmigrate_core::{MigrateError, Settings};
use docmigrate_migrations::MigrationReport;
use docmigrate_store::{open_store, DocumentStore};

use crate::command::ManagementCommand;
use crate::runner::build_orchestrator;

/// Applies pending migrations.
pub struct MigrateCommand;

impl MigrateCommand {
    /// Runs the migrations against an already opened store.
    pub async fn run(
        settings: &Settings,
        store: Arc<dyn DocumentStore>,
    ) -> Result<MigrationReport, MigrateError> {
        let orchestrator = build_orchestrator(settings, store).await?;
        match orchestrator.migrate().await {
            Ok(report) => {
                tracing::info!(skipped = report.skipped(), "Done {}", report.applied());
                Ok(report)
            }
            Err(err) => {
                tracing::error!(
                    applied = err.applied(),
                    "Migration run aborted after applying {} migration(s)",
                    err.applied()
                );
                Err(err.source)
            }
        }
    }
}

#[async_trait]
impl ManagementCommand for MigrateCommand {
    fn name(&self) -> &'static str {
        "migrate"
    }

    fn help(&self) -> &'static str {
        "Apply pending migrations"
    }

    async fn handle(
        &self,
        _matches: &clap::ArgMatches,
        settings: &Settings,
    ) -> Result<(), MigrateError> {
        settings.validate()?;
        let store = open_store(&settings.store)?;
        tracing::info!(
            store = store.vendor(),
            migrations = %settings.migrations_dir.display(),
            "Running migrations"
        );
        Self::run(settings, store).await.map(|_| ())
    }
}
