//! # stagelog
//!
//! A stage-sequence matching engine for instrument log files.
//!
//! Instrument logs describe one measurement cycle as a sequence of events
//! spread over several lines. This library walks a user-defined sequence of
//! named stages over a stream of log lines and emits one structured record
//! every time the whole sequence has matched.
//!
//! ## Overview
//!
//! - **Pattern matcher**: one compiled regex per stage, named groups become fields
//! - **Stage sequencer**: the state machine deciding advance, stay, abort, complete
//! - **Record assembler**: merges captured fields into the in-progress record
//! - **Log engine**: drives the three and yields records lazily
//!
//! ## Example
//!
//! ```
//! use stagelog::{EngineConfig, LogEngine, StageDefinition};
//!
//! let config = EngineConfig::new(vec![
//!     StageDefinition::new("A", r"^A:(?P<a>\S+)"),
//!     StageDefinition::new("B", r"^B:(?P<b>\S+)"),
//!     StageDefinition::new("C", r"^C:(?P<c>\S+)"),
//! ]);
//! let mut engine = LogEngine::new(config).unwrap();
//!
//! let lines = ["A:1", "B:2", "C:3", "junk", "A:9", "B:8", "C:7"];
//! let records: Vec<_> = engine
//!     .process(lines.iter().enumerate().map(|(i, l)| (i + 1, *l)))
//!     .collect();
//!
//! assert_eq!(records.len(), 2);
//! assert_eq!(records[1].get("a"), Some("9"));
//! assert_eq!(engine.stats().completed, 2);
//! ```

pub mod assembler;
pub mod engine;
pub mod error;
pub mod matcher;
pub mod sequencer;
pub mod stage;

pub use assembler::{CompletedRecord, InProgressRecord, RecordAssembler, SourceSpan};
pub use engine::{EngineConfig, EngineStats, LogEngine, Records, validate_stages};
pub use error::ConfigError;
pub use matcher::{MatchResult, PatternMatcher};
pub use sequencer::{SequencerAction, SequencerState, StageSequencer};
pub use stage::{MismatchPolicy, StageDefinition};
