//! Migration discovery from the filesystem.
//!
//! The [`DirectoryMigrationSource`] walks a migrations directory recursively
//! and turns every file into a [`Migration`]. Every file must be named
//! `<major>.<minor>.<patch><anything>.json`; anything else aborts discovery.
//!
//! ```text
//! migrations/
//!     1.0.0_create_users.json
//!     1.1.0_seed_roles.json
//!     2024/
//!         2.0.0_contacts.json
//! ```

use std::path::{Path, PathBuf};

use docmigrate_core::MigrateError;
use regex::Regex;

use crate::migration::Migration;
use crate::version::Version;

const MIGRATION_FILE_PATTERN: &str = r"(.*/)?((\d+)\.(\d+)\.(\d+)[^/]*\.json)$";

/// Lists the migrations available to a run.
pub trait MigrationSource: Send + Sync {
    /// Returns every candidate migration, in discovery order.
    fn list_candidates(&self) -> Result<Vec<Migration>, MigrateError>;
}

/// The migration file naming rule.
#[derive(Debug, Clone)]
pub struct MigrationFilePattern {
    regex: Regex,
}

impl MigrationFilePattern {
    pub fn new() -> Result<Self, MigrateError> {
        let regex = Regex::new(MIGRATION_FILE_PATTERN)
            .map_err(|e| MigrateError::ConfigInvalid(format!("Invalid migration file pattern: {e}")))?;
        Ok(Self { regex })
    }

    /// Extracts the version and migration name from a file path.
    ///
    /// The name is the file name including its extension. Returns `None` when
    /// the path does not follow the naming pattern.
    pub fn parse(&self, path: &str) -> Option<(Version, String)> {
        let caps = self.regex.captures(path)?;
        let component = |i: usize| caps.get(i)?.as_str().parse::<u64>().ok();
        let version = Version::new(component(3)?, component(4)?, component(5)?);
        Some((version, caps.get(2)?.as_str().to_string()))
    }
}

/// Parses a migration file path with the default naming pattern.
pub fn parse_migration_filename(path: &str) -> Result<(Version, String), MigrateError> {
    MigrationFilePattern::new()?
        .parse(path)
        .ok_or_else(|| MigrateError::NamingPatternViolation {
            path: path.to_string(),
        })
}

/// Reads migrations from a directory tree.
pub struct DirectoryMigrationSource {
    /// The root directory containing migration files.
    migrations_dir: PathBuf,
    pattern: MigrationFilePattern,
}

impl DirectoryMigrationSource {
    /// Creates a source for the given migrations directory.
    pub fn new(migrations_dir: impl Into<PathBuf>) -> Result<Self, MigrateError> {
        Ok(Self {
            migrations_dir: migrations_dir.into(),
            pattern: MigrationFilePattern::new()?,
        })
    }

    /// Returns the migrations directory.
    pub fn migrations_dir(&self) -> &Path {
        &self.migrations_dir
    }

    /// Returns every file below the migrations directory, in lexical file-name
    /// order with subdirectories expanded in place.
    pub fn files(&self) -> Result<Vec<PathBuf>, MigrateError> {
        let mut files = Vec::new();
        walk(&self.migrations_dir, &mut files)?;
        Ok(files)
    }

    /// Matches one file path against the naming pattern.
    pub fn identify(&self, path: &Path) -> Result<(Version, String), MigrateError> {
        let display = path.to_string_lossy();
        self.pattern
            .parse(&display)
            .ok_or_else(|| MigrateError::NamingPatternViolation {
                path: display.into_owned(),
            })
    }
}

fn walk(dir: &Path, files: &mut Vec<PathBuf>) -> Result<(), MigrateError> {
    let entries = std::fs::read_dir(dir).map_err(|e| {
        MigrateError::Discovery(format!("Cannot read migrations directory {}: {e}", dir.display()))
    })?;

    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| {
            MigrateError::Discovery(format!("Cannot read directory entry: {e}"))
        })?;
        // Symlinks are not followed; they are listed like regular files.
        let is_dir = entry
            .file_type()
            .map_err(|e| {
                MigrateError::Discovery(format!(
                    "Cannot read file type of {}: {e}",
                    entry.path().display()
                ))
            })?
            .is_dir();
        paths.push((entry.path(), is_dir));
    }
    paths.sort_by(|(a, _), (b, _)| a.file_name().cmp(&b.file_name()));

    for (path, is_dir) in paths {
        if is_dir {
            walk(&path, files)?;
        } else {
            files.push(path);
        }
    }
    Ok(())
}

impl MigrationSource for DirectoryMigrationSource {
    fn list_candidates(&self) -> Result<Vec<Migration>, MigrateError> {
        let mut migrations = Vec::new();
        for path in self.files()? {
            let (version, name) = self.identify(&path)?;
            let content = std::fs::read(&path).map_err(|e| {
                MigrateError::Discovery(format!("Cannot read migration file {}: {e}", path.display()))
            })?;
            tracing::debug!(%version, name = %name, "Discovered migration");
            migrations.push(Migration::new(version, name, content));
        }
        Ok(migrations)
    }
}
