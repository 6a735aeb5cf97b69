//! Logging setup for the binaries.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::PerilError;

/// Installs the global `tracing` subscriber.
///
/// `RUST_LOG` takes precedence over `default_level`. Logs go to stderr so
/// they don't interleave with the prompt on stdout.
pub fn init_tracing(default_level: &str) -> Result<(), PerilError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_level)
            .map_err(|e| PerilError::Config(format!("log level '{default_level}': {e}")))?,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_target(false).with_writer(std::io::stderr))
        .try_init()
        .map_err(|e| PerilError::Config(e.to_string()))
}
