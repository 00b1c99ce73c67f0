//! Migration orchestration.
//!
//! The [`MigrationOrchestrator`] runs every discovered migration exactly once,
//! in version order:
//!
//! 1. List the candidates and stable-sort them by run order.
//! 2. For each migration, skip it if the ledger already has its version.
//! 3. Otherwise parse its content, execute the changes, and only then record
//!    it in the ledger with an insert-if-absent write.
//!
//! The first error of any kind aborts the run. Migrations after the failing
//! one are not attempted, and changes already applied by the failing
//! migration are not rolled back.

use std::fmt;

use chrono::Utc;
use docmigrate_core::logging::migration_span;
use docmigrate_core::MigrateError;
use thiserror::Error;
use tracing::Instrument;

use crate::executor::ChangeExecutor;
use crate::ledger::BookkeepingStore;
use crate::migration::Migration;
use crate::parser::ContentParser;
use crate::source::MigrationSource;
use crate::version::Version;

/// The lifecycle of one migration within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MigrationState {
    Discovered,
    AlreadyApplied,
    Executing,
    Applied,
    Failed,
}

impl fmt::Display for MigrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Discovered => "discovered",
            Self::AlreadyApplied => "already applied",
            Self::Executing => "executing",
            Self::Applied => "applied",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// The final state of one processed migration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationOutcome {
    pub version: Version,
    pub name: String,
    pub state: MigrationState,
}

/// What a run did, in processing order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    pub outcomes: Vec<MigrationOutcome>,
}

impl MigrationReport {
    /// Number of migrations applied by this run.
    pub fn applied(&self) -> usize {
        self.count(MigrationState::Applied)
    }

    /// Number of migrations skipped because they were already applied.
    pub fn skipped(&self) -> usize {
        self.count(MigrationState::AlreadyApplied)
    }

    fn count(&self, state: MigrationState) -> usize {
        self.outcomes.iter().filter(|o| o.state == state).count()
    }

    fn push(&mut self, migration: &Migration, state: MigrationState) {
        self.outcomes.push(MigrationOutcome {
            version: migration.version(),
            name: migration.name().to_string(),
            state,
        });
    }
}

/// An aborted run.
///
/// Carries the report of everything processed before the abort, so callers
/// can tell how many migrations were applied.
#[derive(Error, Debug)]
#[error("{source}")]
pub struct RunError {
    pub report: MigrationReport,
    /// Name of the migration being processed when the run aborted.
    pub migration: Option<String>,
    pub source: MigrateError,
}

impl RunError {
    /// Number of migrations applied before the abort.
    pub fn applied(&self) -> usize {
        self.report.applied()
    }
}

/// One entry of a migration plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedMigration {
    pub version: Version,
    pub name: String,
    pub applied: bool,
}

/// Runs migrations from a source against an executor and a ledger.
pub struct MigrationOrchestrator {
    source: Box<dyn MigrationSource>,
    ledger: Box<dyn BookkeepingStore>,
    parser: Box<dyn ContentParser>,
    executor: Box<dyn ChangeExecutor>,
}

impl MigrationOrchestrator {
    pub fn new(
        source: Box<dyn MigrationSource>,
        ledger: Box<dyn BookkeepingStore>,
        parser: Box<dyn ContentParser>,
        executor: Box<dyn ChangeExecutor>,
    ) -> Self {
        Self {
            source,
            ledger,
            parser,
            executor,
        }
    }

    /// Lists the candidates in run order.
    fn candidates(&self) -> Result<Vec<Migration>, MigrateError> {
        let mut migrations = self.source.list_candidates()?;
        // `sort_by` is stable: equal run order keeps discovery order.
        migrations.sort_by(|a, b| a.version().run_order_cmp(&b.version()));
        Ok(migrations)
    }

    /// Returns the migrations in run order with their applied status.
    ///
    /// Nothing is parsed or executed.
    pub async fn plan(&self) -> Result<Vec<PlannedMigration>, MigrateError> {
        let mut plan = Vec::new();
        for migration in self.candidates()? {
            let applied = self.ledger.exists(&migration.version()).await?;
            plan.push(PlannedMigration {
                version: migration.version(),
                name: migration.name().to_string(),
                applied,
            });
        }
        Ok(plan)
    }

    /// Applies every pending migration.
    pub async fn migrate(&self) -> Result<MigrationReport, RunError> {
        let mut report = MigrationReport::default();

        let migrations = match self.candidates() {
            Ok(migrations) => migrations,
            Err(source) => {
                return Err(RunError {
                    report,
                    migration: None,
                    source,
                })
            }
        };
        tracing::info!(count = migrations.len(), "Discovered migrations");

        for mut migration in migrations {
            let span = migration_span(&migration.version().id(), migration.name());
            match self.run_migration(&mut migration).instrument(span).await {
                Ok(state) => report.push(&migration, state),
                Err(source) => {
                    report.push(&migration, MigrationState::Failed);
                    return Err(RunError {
                        report,
                        migration: Some(migration.name().to_string()),
                        source: source.within_migration(migration.name()),
                    });
                }
            }
        }

        Ok(report)
    }

    async fn run_migration(&self, migration: &mut Migration) -> Result<MigrationState, MigrateError> {
        let mut state = MigrationState::Discovered;
        tracing::trace!(%state, "Checking ledger");

        if self.ledger.exists(&migration.version()).await? {
            state = MigrationState::AlreadyApplied;
            tracing::info!("Migration exists: {}", migration.name());
            return Ok(state);
        }

        let changes = self.parser.parse_content(&migration.content)?;

        state = MigrationState::Executing;
        tracing::debug!(%state, changes = changes.len(), "Executing changes");
        let start = Utc::now();
        self.executor.execute(&changes).await?;
        migration.set_execution_time(start, Utc::now());

        self.ledger.record_applied(&migration.record).await?;
        state = MigrationState::Applied;
        tracing::info!(
            execution_time = migration.record.metadata.execution_time,
            "Migration applied: {}",
            migration.name()
        );
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::NormalizedChange;
    use crate::migration::MigrationRecord;
    use crate::parser::JsonContentParser;
    use docmigrate_core::{ErrorKind, StoreError};
    use std::collections::HashSet;
    use std::sync::{Arc, Mutex};

    // ── Fakes ───────────────────────────────────────────────────────────

    struct FixedSource(Vec<Migration>);

    impl MigrationSource for FixedSource {
        fn list_candidates(&self) -> Result<Vec<Migration>, MigrateError> {
            Ok(self.0.clone())
        }
    }

    struct FailingSource;

    impl MigrationSource for FailingSource {
        fn list_candidates(&self) -> Result<Vec<Migration>, MigrateError> {
            Err(MigrateError::NamingPatternViolation {
                path: "migrations/readme.md".into(),
            })
        }
    }

    #[derive(Default)]
    struct FakeLedger {
        applied: Mutex<HashSet<Version>>,
        records: Mutex<Vec<MigrationRecord>>,
        /// Versions another runner records between our check and our write.
        raced: HashSet<Version>,
    }

    impl FakeLedger {
        fn with_applied(versions: &[Version]) -> Self {
            let ledger = Self::default();
            ledger.applied.lock().unwrap().extend(versions.iter().copied());
            ledger
        }
    }

    #[async_trait::async_trait]
    impl BookkeepingStore for Arc<FakeLedger> {
        async fn exists(&self, version: &Version) -> Result<bool, MigrateError> {
            Ok(self.applied.lock().unwrap().contains(version))
        }

        async fn record_applied(&self, record: &MigrationRecord) -> Result<(), MigrateError> {
            if self.raced.contains(&record.version)
                || !self.applied.lock().unwrap().insert(record.version)
            {
                return Err(MigrateError::LedgerConflict {
                    version: record.version.id(),
                });
            }
            self.records.lock().unwrap().push(record.clone());
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingExecutor {
        calls: Mutex<Vec<Vec<NormalizedChange>>>,
        fail_on_table: Option<String>,
    }

    #[async_trait::async_trait]
    impl ChangeExecutor for Arc<RecordingExecutor> {
        async fn execute(&self, changes: &[NormalizedChange]) -> Result<(), MigrateError> {
            for change in changes {
                change.validate()?;
                if self.fail_on_table.as_deref() == Some(change.table_name.as_str()) {
                    return Err(StoreError::Backend("boom".into()).into());
                }
            }
            self.calls.lock().unwrap().push(changes.to_vec());
            Ok(())
        }
    }

    fn migration(major: u64, minor: u64, patch: u64, table: &str) -> Migration {
        let version = Version::new(major, minor, patch);
        let content = format!(r#"[{{"table_name":"{table}","data":{{"id":"{version}"}}}}]"#);
        Migration::new(version, format!("{version}_{table}.json"), content.into_bytes())
    }

    fn orchestrator(
        migrations: Vec<Migration>,
        ledger: &Arc<FakeLedger>,
        executor: &Arc<RecordingExecutor>,
    ) -> MigrationOrchestrator {
        MigrationOrchestrator::new(
            Box::new(FixedSource(migrations)),
            Box::new(ledger.clone()),
            Box::new(JsonContentParser::new()),
            Box::new(executor.clone()),
        )
    }

    fn executed_tables(executor: &RecordingExecutor) -> Vec<String> {
        executor
            .calls
            .lock()
            .unwrap()
            .iter()
            .flat_map(|call| call.iter().map(|c| c.table_name.clone()))
            .collect()
    }

    // ── Ordering and idempotency ────────────────────────────────────────

    #[tokio::test]
    async fn test_applies_pending_in_version_order() {
        let ledger = Arc::new(FakeLedger::with_applied(&[Version::new(1, 1, 0)]));
        let executor = Arc::new(RecordingExecutor::default());
        let migrations = vec![
            migration(2, 0, 0, "c"),
            migration(1, 1, 0, "b"),
            migration(1, 0, 0, "a"),
        ];

        let report = orchestrator(migrations, &ledger, &executor)
            .migrate()
            .await
            .unwrap();
        assert_eq!(report.applied(), 2);
        assert_eq!(report.skipped(), 1);
        assert_eq!(executed_tables(&executor), vec!["a", "c"]);

        let states: Vec<MigrationState> = report.outcomes.iter().map(|o| o.state).collect();
        assert_eq!(
            states,
            vec![
                MigrationState::Applied,
                MigrationState::AlreadyApplied,
                MigrationState::Applied
            ]
        );
    }

    #[tokio::test]
    async fn test_rerun_applies_nothing() {
        let ledger = Arc::new(FakeLedger::default());
        let executor = Arc::new(RecordingExecutor::default());
        let migrations = vec![migration(1, 0, 0, "a"), migration(1, 1, 0, "b")];

        let first = orchestrator(migrations.clone(), &ledger, &executor);
        assert_eq!(first.migrate().await.unwrap().applied(), 2);
        let second = orchestrator(migrations, &ledger, &executor);
        let report = second.migrate().await.unwrap();
        assert_eq!(report.applied(), 0);
        assert_eq!(report.skipped(), 2);
        assert_eq!(executor.calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_patch_only_difference_keeps_discovery_order() {
        let ledger = Arc::new(FakeLedger::default());
        let executor = Arc::new(RecordingExecutor::default());
        let migrations = vec![migration(1, 0, 5, "first"), migration(1, 0, 2, "second")];

        orchestrator(migrations, &ledger, &executor)
            .migrate()
            .await
            .unwrap();
        assert_eq!(executed_tables(&executor), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_metadata_recorded_after_execution() {
        let ledger = Arc::new(FakeLedger::default());
        let executor = Arc::new(RecordingExecutor::default());
        let before = Utc::now().timestamp();

        orchestrator(vec![migration(1, 0, 0, "a")], &ledger, &executor)
            .migrate()
            .await
            .unwrap();
        let records = ledger.records.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "1.0.0_a.json");
        assert!(records[0].metadata.start_time >= before);
        assert!(records[0].metadata.execution_time >= 0);
    }

    #[tokio::test]
    async fn test_no_migrations_is_success() {
        let ledger = Arc::new(FakeLedger::default());
        let executor = Arc::new(RecordingExecutor::default());
        let report = orchestrator(Vec::new(), &ledger, &executor)
            .migrate()
            .await
            .unwrap();
        assert_eq!(report, MigrationReport::default());
    }

    // ── Failures ────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_discovery_failure_applies_nothing() {
        let ledger = Arc::new(FakeLedger::default());
        let executor = Arc::new(RecordingExecutor::default());
        let orchestrator = MigrationOrchestrator::new(
            Box::new(FailingSource),
            Box::new(ledger.clone()),
            Box::new(JsonContentParser::new()),
            Box::new(executor.clone()),
        );
        let err = orchestrator.migrate().await.unwrap_err();
        assert_eq!(err.applied(), 0);
        assert!(err.migration.is_none());
        assert_eq!(err.source.kind(), ErrorKind::DiscoveryError);
    }

    #[tokio::test]
    async fn test_parse_failure_aborts_run() {
        let ledger = Arc::new(FakeLedger::default());
        let executor = Arc::new(RecordingExecutor::default());
        let broken = Migration::new(Version::new(1, 1, 0), "1.1.0_broken.json", Vec::new());
        let migrations = vec![migration(1, 0, 0, "a"), broken, migration(2, 0, 0, "c")];

        let err = orchestrator(migrations, &ledger, &executor)
            .migrate()
            .await
            .unwrap_err();
        assert_eq!(err.applied(), 1);
        assert_eq!(err.migration.as_deref(), Some("1.1.0_broken.json"));
        assert_eq!(err.source.kind(), ErrorKind::ParseError);
        assert_eq!(
            err.to_string(),
            "Migration failed: 1.1.0_broken.json, error: Parse error: Cannot parse empty migration content"
        );
        assert_eq!(executed_tables(&executor), vec!["a"]);
    }

    #[tokio::test]
    async fn test_change_without_schema_or_data_fails_validation() {
        let ledger = Arc::new(FakeLedger::default());
        let executor = Arc::new(RecordingExecutor::default());
        let empty = Migration::new(
            Version::new(1, 0, 0),
            "1.0.0_empty.json",
            br#"[{"table_name":"t"}]"#.to_vec(),
        );

        let err = orchestrator(vec![empty], &ledger, &executor)
            .migrate()
            .await
            .unwrap_err();
        assert_eq!(err.source.kind(), ErrorKind::ChangeInvalid);
        assert!(ledger.records.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_table_name_is_never_recorded() {
        let ledger = Arc::new(FakeLedger::default());
        let executor = Arc::new(RecordingExecutor::default());
        let bad = Migration::new(
            Version::new(1, 0, 0),
            "1.0.0_bad.json",
            br#"[{"table_name":"","data":{"id":"1"}}]"#.to_vec(),
        );

        let err = orchestrator(vec![bad], &ledger, &executor)
            .migrate()
            .await
            .unwrap_err();
        assert_eq!(err.applied(), 0);
        assert_eq!(err.source.kind(), ErrorKind::ChangeInvalid);
        assert!(ledger.records.lock().unwrap().is_empty());
        assert!(!ledger.applied.lock().unwrap().contains(&Version::new(1, 0, 0)));
    }

    #[tokio::test]
    async fn test_execution_failure_is_not_recorded() {
        let ledger = Arc::new(FakeLedger::default());
        let executor = Arc::new(RecordingExecutor {
            fail_on_table: Some("b".into()),
            ..RecordingExecutor::default()
        });
        let migrations = vec![migration(1, 0, 0, "a"), migration(1, 1, 0, "b")];

        let err = orchestrator(migrations, &ledger, &executor)
            .migrate()
            .await
            .unwrap_err();
        assert_eq!(err.applied(), 1);
        assert_eq!(err.source.kind(), ErrorKind::StoreError);
        let recorded: Vec<String> = ledger
            .records
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.name.clone())
            .collect();
        assert_eq!(recorded, vec!["1.0.0_a.json"]);
        assert_eq!(err.report.outcomes[1].state, MigrationState::Failed);
    }

    #[tokio::test]
    async fn test_ledger_race_aborts_without_counting() {
        let ledger = Arc::new(FakeLedger {
            raced: [Version::new(1, 0, 0)].into_iter().collect(),
            ..FakeLedger::default()
        });
        let executor = Arc::new(RecordingExecutor::default());

        let err = orchestrator(vec![migration(1, 0, 0, "a"), migration(2, 0, 0, "b")], &ledger, &executor)
            .migrate()
            .await
            .unwrap_err();
        assert_eq!(err.applied(), 0);
        assert!(matches!(
            err.source.root_cause(),
            MigrateError::LedgerConflict { version } if version == "1.0.0"
        ));
        // The losing run's changes were executed and are not undone.
        assert_eq!(executed_tables(&executor), vec!["a"]);
    }

    // ── Planning ────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_plan_lists_run_order_with_status() {
        let ledger = Arc::new(FakeLedger::with_applied(&[Version::new(1, 0, 0)]));
        let executor = Arc::new(RecordingExecutor::default());
        let orchestrator = orchestrator(
            vec![migration(2, 0, 0, "b"), migration(1, 0, 0, "a")],
            &ledger,
            &executor,
        );

        let plan = orchestrator.plan().await.unwrap();
        let summary: Vec<(String, bool)> = plan.into_iter().map(|p| (p.name, p.applied)).collect();
        assert_eq!(
            summary,
            vec![
                ("1.0.0_a.json".to_string(), true),
                ("2.0.0_b.json".to_string(), false)
            ]
        );
        assert!(executor.calls.lock().unwrap().is_empty());
    }
}
