//! Logging setup for binaries.
//!
//! The library only emits `tracing` events; installing a subscriber is up to
//! the entry point.

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Write events to stderr. stdout is left to the caller's own output.
    pub console: bool,
    /// Lower the default level from `info` to `debug`.
    pub verbose: bool,
    /// One JSON object per event.
    pub json: bool,
    pub no_color: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            console: true,
            verbose: false,
            json: false,
            no_color: false,
        }
    }
}

impl LoggingConfig {
    fn default_directive(&self) -> &'static str {
        if self.verbose { "debug" } else { "info" }
    }
}

/// Install the global subscriber. `RUST_LOG` overrides the level derived
/// from `verbose`. A subscriber that is already installed is left in place.
pub fn init(config: &LoggingConfig) {
    if !config.console {
        return;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.default_directive()));

    let installed = if config.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .json()
            .with_writer(std::io::stderr)
            .try_init()
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(!config.no_color)
            .with_writer(std::io::stderr)
            .try_init()
    };

    if installed.is_ok() {
        tracing::info!(
            json = config.json,
            verbose = config.verbose,
            no_color = config.no_color,
            "logging configured"
        );
    }
}
