//! Tracing initialization for test suites that use the mongo test server.
//!
//! Libraries only emit events; a test binary that wants to see them calls
//! [`init`] once (repeated calls report an error that can be ignored).

use crate::error::{MongoTestError, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the tracing subscriber with environment-based configuration
///
/// Uses standard RUST_LOG environment variable for filtering:
/// - `RUST_LOG=debug` - Set global level
/// - `RUST_LOG=mongo_test_server=debug` - Set per-module levels
///
/// Uses RUST_LOG_FORMAT for output format (optional):
/// - `json` - JSON formatted output
/// - `pretty` - Pretty formatted output (default)
/// - `compact` - Compact single-line output
pub fn init() -> Result<()> {
    init_with_defaults("info")
}

/// Initialize with a default filter if RUST_LOG is not set
pub fn init_with_defaults(default_filter: &str) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let result = match format.as_str() {
        "json" => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_ansi(false).json())
            .try_init(),
        "compact" => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().compact())
            .try_init(),
        _ => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().pretty())
            .try_init(),
    };

    result.map_err(|e| MongoTestError::Config(format!("Failed to initialize tracing: {}", e)))
}

/// Initialize a subscriber that writes through the libtest capture.
pub fn init_for_testing() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::new("debug"))
        .with(fmt::layer().with_test_writer())
        .try_init()
        .map_err(|e| {
            MongoTestError::Config(format!("Failed to initialize test tracing: {}", e))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::{debug, info, info_span};

    #[test]
    fn test_tracing_initialization() {
        // Only the first initialization in a process succeeds
        if init_for_testing().is_ok() {
            info!("Test info message");
            debug!("Test debug message");

            let span = info_span!("mongod", port = 27017);
            let _enter = span.enter();
            info!("Message within span");
        }
        assert!(init_for_testing().is_err());
    }
}
