//! Tracing subscriber setup from the config file's logger block.

use std::sync::Arc;

use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;

use crate::config::{ConfigError, LogConfig};

/// Initialise the global tracing subscriber.
///
/// Debug mode forces the `debug` filter; otherwise `RUST_LOG` is
/// respected with an `info` default. Output goes to stderr unless a log
/// file is configured, in which case lines are appended there.
///
/// # Errors
///
/// Returns [`ConfigError::LogFile`] if the configured file cannot be
/// opened for appending.
pub fn init(config: &LogConfig) -> Result<(), ConfigError> {
    let filter = if config.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let writer = if config.file.is_empty() {
        BoxMakeWriter::new(std::io::stderr)
    } else {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&config.file)
            .map_err(|source| ConfigError::LogFile {
                path: config.file.clone(),
                source,
            })?;
        BoxMakeWriter::new(Arc::new(file))
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer);

    if config.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}
