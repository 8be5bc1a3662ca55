use crate::cli::{actions::Action, commands, dispatch::handler, telemetry};
use anyhow::Result;

fn verbosity(level: u8) -> tracing::Level {
    match level {
        0 => tracing::Level::ERROR,
        1 => tracing::Level::WARN,
        2 => tracing::Level::INFO,
        3 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    }
}

/// Start the CLI
/// # Errors
/// Returns an error if logging cannot be initialized or arguments are inconsistent.
pub fn start() -> Result<Action> {
    let matches = commands::new().get_matches();

    let level = verbosity(matches.get_one::<u8>("verbosity").copied().unwrap_or(0));

    telemetry::init(Some(level))?;

    handler(&matches)
}
