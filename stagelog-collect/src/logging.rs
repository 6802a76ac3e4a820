//! Tracing setup for the collector binary.

use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::{CollectError, Result};

/// Logging options resolved from config and CLI flags.
pub struct LogConfig<'a> {
    /// Filter directive used when `RUST_LOG` is not set, e.g. `info`.
    pub level: &'a str,
    pub verbose: bool,
    /// Also append log lines (without ANSI colours) to this file.
    pub file: Option<&'a Path>,
}

fn filter_for(config: &LogConfig<'_>) -> EnvFilter {
    if config.verbose {
        return EnvFilter::new("debug");
    }
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.level))
}

/// Install the global subscriber: stderr always, plus an optional file.
pub fn init_logging(config: LogConfig<'_>) -> Result<()> {
    let file_layer = match config.file {
        Some(path) => {
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
            {
                fs::create_dir_all(parent).map_err(|e| CollectError::io(parent, e))?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| CollectError::io(path, e))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false)
                    .with_filter(filter_for(&config)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(filter_for(&config)),
        )
        .with(file_layer)
        .try_init()
        .map_err(|e| CollectError::Config(format!("failed to install logger: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbose_forces_debug() {
        let filter = filter_for(&LogConfig {
            level: "warn",
            verbose: true,
            file: None,
        });
        assert_eq!(filter.to_string(), "debug");
    }
}
