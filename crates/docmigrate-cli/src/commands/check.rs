//! The `check` management command.
//!
//! Validates the settings and every migration file without touching the
//! target store: file naming, content parsing, change validation and version
//! collisions. Unlike `migrate`, it keeps going after the first problem and
//! reports all of them.

use std::collections::HashMap;

use async_trait::async_trait;
use docmigrate_core::{MigrateError, Settings};
use docmigrate_migrations::{ContentParser, DirectoryMigrationSource, JsonContentParser, Version};

use crate::command::ManagementCommand;

/// Runs offline checks on the settings and migration files.
pub struct CheckCommand;

/// The result of a single check.
#[derive(Debug, Clone)]
pub struct CheckMessage {
    /// The severity level of this check result.
    pub level: CheckLevel,
    /// A human-readable description of the issue.
    pub msg: String,
    /// An optional hint for how to resolve the issue.
    pub hint: Option<String>,
    /// A unique identifier for this check (e.g. "migrations.E002").
    pub id: String,
}

impl CheckMessage {
    fn new(level: CheckLevel, id: &str, msg: impl Into<String>) -> Self {
        Self {
            level,
            msg: msg.into(),
            hint: None,
            id: id.to_string(),
        }
    }

    fn hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Severity levels for check results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CheckLevel {
    Info,
    Warning,
    Error,
}

impl std::fmt::Display for CheckLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warning => write!(f, "WARNING"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

/// Runs every check against the given settings and their migrations directory.
pub fn run_checks(settings: &Settings) -> Vec<CheckMessage> {
    let mut messages = Vec::new();

    if let Err(e) = settings.validate() {
        messages.push(CheckMessage::new(CheckLevel::Error, "config.E001", e.to_string()));
        return messages;
    }

    let source = match DirectoryMigrationSource::new(&settings.migrations_dir) {
        Ok(source) => source,
        Err(e) => {
            messages.push(CheckMessage::new(CheckLevel::Error, "config.E002", e.to_string()));
            return messages;
        }
    };
    let files = match source.files() {
        Ok(files) => files,
        Err(e) => {
            messages.push(
                CheckMessage::new(CheckLevel::Error, "migrations.E001", e.to_string())
                    .hint("Create the directory or point --migrations at it"),
            );
            return messages;
        }
    };
    if files.is_empty() {
        messages.push(CheckMessage::new(
            CheckLevel::Info,
            "migrations.I001",
            format!("No migrations found in {}", settings.migrations_dir.display()),
        ));
    }

    let parser = JsonContentParser::new();
    let mut seen: HashMap<Version, String> = HashMap::new();
    let mut by_minor: HashMap<(u64, u64), Vec<(u64, String)>> = HashMap::new();

    for path in &files {
        let (version, name) = match source.identify(path) {
            Ok(identity) => identity,
            Err(e) => {
                messages.push(
                    CheckMessage::new(CheckLevel::Error, "migrations.E002", e.to_string())
                        .hint("Name migration files <major>.<minor>.<patch>_<description>.json"),
                );
                continue;
            }
        };

        if let Some(previous) = seen.insert(version, name.clone()) {
            messages.push(
                CheckMessage::new(
                    CheckLevel::Error,
                    "migrations.E005",
                    format!("{name} and {previous} share version {version}"),
                )
                .hint("Only the first of them would ever be applied"),
            );
        }
        by_minor
            .entry((version.major, version.minor))
            .or_default()
            .push((version.patch, name.clone()));

        let content = match std::fs::read(path) {
            Ok(content) => content,
            Err(e) => {
                messages.push(CheckMessage::new(
                    CheckLevel::Error,
                    "migrations.E001",
                    format!("Cannot read {name}: {e}"),
                ));
                continue;
            }
        };
        let changes = match parser.parse_content(&content) {
            Ok(changes) => changes,
            Err(e) => {
                messages.push(CheckMessage::new(
                    CheckLevel::Error,
                    "migrations.E003",
                    format!("{name}: {e}"),
                ));
                continue;
            }
        };
        for change in &changes {
            let problem = change.validate().err().or_else(|| {
                change
                    .data
                    .iter()
                    .any(|row| row.is_empty())
                    .then(|| MigrateError::EmptyItem {
                        table: change.table_name.clone(),
                    })
            });
            if let Some(e) = problem {
                messages.push(CheckMessage::new(
                    CheckLevel::Error,
                    "migrations.E004",
                    format!("{name}: {e}"),
                ));
            }
        }
    }

    // Identical versions are reported by migrations.E005 instead.
    let mut shared: Vec<Vec<String>> = by_minor
        .into_values()
        .filter(|group| group.iter().any(|(patch, _)| *patch != group[0].0))
        .map(|group| group.into_iter().map(|(_, name)| name).collect())
        .collect();
    shared.sort();
    for names in shared {
        messages.push(
            CheckMessage::new(
                CheckLevel::Warning,
                "migrations.W001",
                format!("{} differ only in patch version", names.join(", ")),
            )
            .hint("They run in file-name order, not patch order"),
        );
    }

    messages
}

#[async_trait]
impl ManagementCommand for CheckCommand {
    fn name(&self) -> &'static str {
        "check"
    }

    fn help(&self) -> &'static str {
        "Validate settings and migration files without applying them"
    }

    async fn handle(
        &self,
        _matches: &clap::ArgMatches,
        settings: &Settings,
    ) -> Result<(), MigrateError> {
        let messages = run_checks(settings);

        let errors = messages.iter().filter(|m| m.level >= CheckLevel::Error).count();
        let warnings = messages.iter().filter(|m| m.level == CheckLevel::Warning).count();

        for msg in &messages {
            let hint_text = msg
                .hint
                .as_ref()
                .map_or(String::new(), |h| format!("\n\tHINT: {h}"));
            match msg.level {
                CheckLevel::Info => tracing::info!("{} ({}): {}{}", msg.level, msg.id, msg.msg, hint_text),
                _ => tracing::warn!("{} ({}): {}{}", msg.level, msg.id, msg.msg, hint_text),
            }
        }

        if errors == 0 && warnings == 0 {
            tracing::info!("Check identified no issues");
            return Ok(());
        }
        tracing::info!(
            "Check identified {} issue(s) ({} error(s), {} warning(s))",
            errors + warnings,
            errors,
            warnings
        );

        if errors > 0 {
            return Err(MigrateError::ConfigInvalid(format!(
                "Check found {errors} error(s)"
            )));
        }
        Ok(())
    }
}
