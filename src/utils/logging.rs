//! Logging initialization
//!
//! `RUST_LOG` always wins over a configured filter. Initializing more than once
//! keeps the first subscriber.

use crate::config::LoggingConfig;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info";

fn build_filter(filter: Option<&str>) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter.unwrap_or(DEFAULT_FILTER)))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Initialize human-readable logging
pub fn init_logging(filter: Option<&str>) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(build_filter(filter))
        .with_target(true)
        .try_init();
}

/// Initialize JSON logging
#[cfg(feature = "json-logging")]
pub fn init_json_logging(filter: Option<&str>) {
    let _ = tracing_subscriber::fmt()
        .json()
        .with_env_filter(build_filter(filter))
        .try_init();
}

/// Initialize logging from configuration, falling back to defaults
pub fn init_logging_from_config(config: Option<&LoggingConfig>) {
    let filter = config.and_then(|c| c.filter.as_deref());

    #[cfg(feature = "json-logging")]
    {
        if config.map(|c| c.json_format).unwrap_or(false) {
            init_json_logging(filter);
            return;
        }
    }

    init_logging(filter);
}
