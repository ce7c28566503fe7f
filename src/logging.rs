// Logging, powered by tracing-subscriber
//
// The crate only emits `tracing` events. Applications that do not install
// their own subscriber can call `init_logging` once at startup.

use crate::core::{GridError, Result};
use tracing_subscriber::EnvFilter;

/// Log format type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Compact text format: timestamp LEVEL target - message
    #[default]
    Compact,
    /// JSON Lines format for structured logging
    Json,
}

impl LogFormat {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" | "jsonl" => LogFormat::Json,
            _ => LogFormat::Compact,
        }
    }
}

/// Build the `EnvFilter`: `RUST_LOG` wins when set, otherwise `level`.
fn build_env_filter(level: &str) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(level)
        .map_err(|e| GridError::Config(format!("invalid log level '{}': {}", level, e)))
}

/// Installs a global fmt subscriber.
///
/// Returns `Ok(false)` when a subscriber was already installed.
pub fn init_logging(level: &str, format: LogFormat) -> Result<bool> {
    let filter = build_env_filter(level)?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let installed = match format {
        LogFormat::Compact => builder.compact().try_init().is_ok(),
        LogFormat::Json => builder.json().try_init().is_ok(),
    };
    Ok(installed)
}
