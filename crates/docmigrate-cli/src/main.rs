use std::process::ExitCode;

use docmigrate_cli::{register_builtin_commands, resolve_settings, CommandRegistry};
use docmigrate_core::logging::setup_logging;

#[tokio::main]
async fn main() -> ExitCode {
    let mut registry = CommandRegistry::new();
    register_builtin_commands(&mut registry);
    let matches = registry.build_cli().get_matches();

    let settings = match resolve_settings(&matches) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("docmigrate: {e}");
            return ExitCode::FAILURE;
        }
    };
    setup_logging(&settings);

    match registry.execute(&matches, &settings).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(kind = %e.kind(), "{e}");
            ExitCode::FAILURE
        }
    }
}
