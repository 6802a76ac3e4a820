//! Configuration errors raised while building a [`LogEngine`](crate::LogEngine).
//!
//! Per-line mismatches are never errors; they are routed through sequencer
//! transitions and show up only in [`EngineStats`](crate::EngineStats).

use thiserror::Error;

/// Structural defect in a stage sequence, detected at construction.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("stage sequence is empty")]
    EmptySequence,

    #[error("invalid pattern for stage '{stage}': {message}")]
    InvalidPattern { stage: String, message: String },

    #[error("capture '{field}' is declared by both required stages '{first}' and '{second}'")]
    DuplicateFieldName {
        field: String,
        first: String,
        second: String,
    },

    #[error("stage name '{0}' is used more than once")]
    DuplicateStageName(String),
}
