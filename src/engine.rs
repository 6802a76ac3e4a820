//! Line-at-a-time log engine.
//!
//! Each input line is pushed through matcher, sequencer and assembler before
//! the next line is read. Completed records are yielded lazily by the
//! [`Records`] iterator; nothing is read ahead of the current line, so a
//! caller cancels simply by dropping the iterator. Dropping it closes the
//! stream the same way exhausting it does.

use std::collections::{HashSet, VecDeque};

use crate::assembler::{CompletedRecord, RecordAssembler, check_duplicate_fields, default_columns};
use crate::error::ConfigError;
use crate::matcher::{MatchResult, PatternMatcher};
use crate::sequencer::{SequencerAction, StageSequencer};
use crate::stage::{MismatchPolicy, StageDefinition};

/// Everything needed to build a [`LogEngine`].
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub stages: Vec<StageDefinition>,
    /// Policy for stages without their own override.
    pub default_policy: MismatchPolicy,
    /// Output column order. Empty means every capture name in stage order.
    pub output_fields: Vec<String>,
}

impl EngineConfig {
    pub fn new(stages: Vec<StageDefinition>) -> Self {
        Self {
            stages,
            ..Self::default()
        }
    }

    pub fn with_policy(mut self, policy: MismatchPolicy) -> Self {
        self.default_policy = policy;
        self
    }

    pub fn with_output_fields(mut self, fields: Vec<String>) -> Self {
        self.output_fields = fields;
        self
    }
}

/// Running counters of one engine instance.
///
/// Every sequence attempt ends up in exactly one of `completed`, `aborted`
/// or `discarded` once the stream is exhausted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub lines_processed: usize,
    /// Attempts started by a first matching stage.
    pub sequences_started: usize,
    pub completed: usize,
    pub aborted: usize,
    /// Partial records dropped at end of stream.
    pub discarded: usize,
    /// Lines absorbed by repeatable stages.
    pub repetitions: usize,
}

impl EngineStats {
    pub fn attempts_accounted(&self) -> usize {
        self.completed + self.aborted + self.discarded
    }
}

/// Validate a stage list without building an engine.
///
/// Returns the compiled patterns so the caller does not compile twice.
pub fn validate_stages(stages: &[StageDefinition]) -> Result<PatternMatcher, ConfigError> {
    if stages.is_empty() {
        return Err(ConfigError::EmptySequence);
    }
    let mut names = HashSet::new();
    for stage in stages {
        if !names.insert(stage.name.as_str()) {
            return Err(ConfigError::DuplicateStageName(stage.name.clone()));
        }
    }
    let matcher = PatternMatcher::compile(stages)?;
    check_duplicate_fields(stages, &matcher)?;
    Ok(matcher)
}

/// Turns a stream of numbered lines into completed records.
///
/// One engine serves one stream at a time; run independent engines for
/// independent files.
pub struct LogEngine {
    matcher: PatternMatcher,
    sequencer: StageSequencer,
    assembler: RecordAssembler,
    stats: EngineStats,
}

impl LogEngine {
    /// Build an engine, failing fast on any structural defect.
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        let matcher = validate_stages(&config.stages)?;
        let columns = if config.output_fields.is_empty() {
            default_columns(&matcher)
        } else {
            config.output_fields
        };
        Ok(Self {
            sequencer: StageSequencer::new(&config.stages, config.default_policy),
            assembler: RecordAssembler::new(columns).with_repeatable(&config.stages),
            matcher,
            stats: EngineStats::default(),
        })
    }

    /// Output column layout of every record this engine produces.
    pub fn columns(&self) -> &[String] {
        self.assembler.columns()
    }

    pub fn stats(&self) -> EngineStats {
        self.stats
    }

    /// Lazily process `lines`, yielding each record as soon as it completes.
    ///
    /// When the returned iterator is exhausted or dropped, a partial record
    /// is counted as discarded and the engine is ready for the next stream.
    pub fn process<I, S>(&mut self, lines: I) -> Records<'_, I::IntoIter>
    where
        I: IntoIterator<Item = (usize, S)>,
        S: AsRef<str>,
    {
        Records {
            engine: self,
            lines: lines.into_iter(),
            ready: VecDeque::new(),
            exhausted: false,
        }
    }

    /// Close the current stream. Returns true if a partial record was dropped.
    pub fn finish(&mut self) -> bool {
        let partial = self.sequencer.in_progress();
        if partial {
            self.stats.discarded += 1;
        }
        self.sequencer.reset();
        self.assembler.discard();
        partial
    }

    fn evaluate(&self, line: &str) -> MatchResult {
        let primary = self.matcher.evaluate(line, self.sequencer.current_index());
        if primary.matched {
            return primary;
        }
        if let Some(prev) = self.sequencer.repeat_stage() {
            let again = self.matcher.evaluate(line, prev);
            if again.matched {
                return again;
            }
        }
        primary
    }

    /// Push one line through the machine.
    ///
    /// An unconsumed line is re-offered: to the next stage after a lenient
    /// skip (bounded by the sequence length), and once to stage 0 after an
    /// abort or a completion by skipping.
    fn feed(&mut self, line_number: usize, line: &str, out: &mut VecDeque<CompletedRecord>) {
        self.stats.lines_processed += 1;
        let mut retried = false;

        loop {
            let was_started = self.sequencer.in_progress();
            let result = self.evaluate(line);
            let action = self.sequencer.advance(&result);

            if result.matched && !was_started {
                self.stats.sequences_started += 1;
            }
            if let Some(record) = self.assembler.accumulate(action, &result, line_number) {
                out.push_back(record);
            }
            debug_assert!(
                !self.sequencer.in_progress()
                    || self.assembler.current().current_stage_index
                        == self.sequencer.current_index()
            );

            match action {
                SequencerAction::Stay => {
                    if result.matched {
                        self.stats.repetitions += 1;
                    }
                    return;
                }
                SequencerAction::AdvanceTo(_) => {
                    if result.matched {
                        return;
                    }
                }
                SequencerAction::Complete => {
                    self.stats.completed += 1;
                    if result.matched || retried {
                        return;
                    }
                    retried = true;
                }
                SequencerAction::Abort => {
                    self.stats.aborted += 1;
                    if retried {
                        return;
                    }
                    retried = true;
                }
            }
        }
    }
}

/// Lazy sequence of completed records returned by [`LogEngine::process`].
///
/// Records already completed but not yet yielded are lost on drop.
pub struct Records<'a, I> {
    engine: &'a mut LogEngine,
    lines: I,
    ready: VecDeque<CompletedRecord>,
    exhausted: bool,
}

impl<I, S> Iterator for Records<'_, I>
where
    I: Iterator<Item = (usize, S)>,
    S: AsRef<str>,
{
    type Item = CompletedRecord;

    fn next(&mut self) -> Option<CompletedRecord> {
        loop {
            if let Some(record) = self.ready.pop_front() {
                return Some(record);
            }
            if self.exhausted {
                return None;
            }
            match self.lines.next() {
                Some((number, line)) => self.engine.feed(number, line.as_ref(), &mut self.ready),
                None => {
                    self.engine.finish();
                    self.exhausted = true;
                }
            }
        }
    }
}

impl<I> Drop for Records<'_, I> {
    fn drop(&mut self) {
        if !self.exhausted {
            self.engine.finish();
        }
    }
}
