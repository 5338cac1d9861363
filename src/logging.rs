//! Process-wide `tracing` subscriber setup.

use tracing_subscriber::EnvFilter;

use crate::config::{LogConfig, DEFAULT_LOG_FILTER};

/// Installs the global fmt subscriber, writing to stderr.
///
/// Returns `false` when a subscriber was already installed; calling this
/// more than once is harmless.
pub fn init(config: &LogConfig) -> bool {
    let filter = build_filter(&config.filter);
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true);

    if config.json {
        builder.json().try_init().is_ok()
    } else {
        builder.try_init().is_ok()
    }
}

fn build_filter(directive: &str) -> EnvFilter {
    EnvFilter::try_new(directive).unwrap_or_else(|error| {
        eprintln!("invalid log filter {directive:?} ({error}); using {DEFAULT_LOG_FILTER:?}");
        EnvFilter::new(DEFAULT_LOG_FILTER)
    })
}
