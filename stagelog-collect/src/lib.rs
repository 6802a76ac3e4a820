//! File-level plumbing around the stagelog engine.
//!
//! This crate finds log files, decodes them, feeds their lines to one
//! [`stagelog::LogEngine`] per file and writes the completed records as CSV.

pub mod collect;
pub mod config;
pub mod csv_out;
pub mod discover;
pub mod encoding;
pub mod error;
pub mod logging;
pub mod rename;
pub mod timestamp;

pub use collect::{Collector, RunSummary};
pub use config::{CollectConfig, LoadedConfig};
pub use csv_out::{CsvSink, RowContext};
pub use error::{CollectError, Result};
pub use logging::{LogConfig, init_logging};
