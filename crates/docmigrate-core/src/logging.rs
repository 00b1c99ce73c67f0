//! Logging integration for docmigrate.
//!
//! Provides helpers for configuring [`tracing`]-based logging from
//! [`Settings`](crate::settings::Settings) and for creating per-migration spans.

use crate::settings::Settings;

/// Sets up the global tracing subscriber based on the given settings.
///
/// The filter is read from `settings.log_level` (e.g. "debug", "info", "warn",
/// or any `EnvFilter` directive). In debug mode a pretty, human-readable format
/// is used; otherwise a structured JSON format is used. Installing a second
/// subscriber is a no-op.
pub fn setup_logging(settings: &Settings) {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_new(&settings.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    if settings.debug {
        fmt::Subscriber::builder()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(false)
            .with_file(true)
            .with_line_number(true)
            .pretty()
            .try_init()
            .ok();
    } else {
        fmt::Subscriber::builder()
            .with_env_filter(filter)
            .with_target(true)
            .json()
            .try_init()
            .ok();
    }
}

/// Creates a tracing span for one migration.
///
/// Every event emitted while the migration is checked, parsed, executed and
/// recorded carries its version and name.
///
/// # Examples
///
/// ```
/// use docmigrate_core::logging::migration_span;
///
/// let span = migration_span("1.2.0", "1.2.0_add_roles.json");
/// let _guard = span.enter();
/// tracing::info!("applying");
/// ```
pub fn migration_span(version: &str, name: &str) -> tracing::Span {
    tracing::info_span!("migration", version = version, name = name)
}
