//! Stage sequencer: the state machine that walks the stage list.
//!
//! The sequencer only decides *what happens* for a line; it never sees the
//! line text. The engine evaluates the line with the [`PatternMatcher`] and
//! hands the [`MatchResult`] to [`StageSequencer::advance`], which is the
//! single transition function of the machine.
//!
//! ```text
//!            match(last)             (assembler consumes)
//!   Idle ──match(0)──▶ InSequence(i) ──────────▶ Completed ──▶ Idle
//!    ▲                   │  │
//!    │      mismatch     │  │ match(i<last): AdvanceTo(i+1)
//!    └───── (Abort) ─────┘  └ lenient skip:  AdvanceTo(i+1), line re-offered
//! ```
//!
//! [`PatternMatcher`]: crate::matcher::PatternMatcher

use crate::matcher::MatchResult;
use crate::stage::{MismatchPolicy, StageDefinition};

/// Transition produced for one evaluation.
///
/// Paired with the [`MatchResult`] that produced it, the action also says
/// whether the line was consumed: a matched result means the stage took the
/// line, an unmatched one means the engine must offer the line elsewhere
/// (next stage after a skip, stage 0 after an abort) or drop it (`Stay`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencerAction {
    /// Position unchanged. Matched: a repeatable stage absorbed the line.
    /// Unmatched: nothing in progress, line ignored.
    Stay,
    /// Position moved to the given stage index.
    AdvanceTo(usize),
    /// The last stage was passed; the record is ready.
    Complete,
    /// The in-progress record must be discarded.
    Abort,
}

/// Observable position of the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencerState {
    Idle,
    InSequence(usize),
    /// Transient; the next call to `advance` starts from `Idle`.
    Completed,
}

#[derive(Debug, Clone)]
struct StageRule {
    required: bool,
    policy: MismatchPolicy,
    repeatable: bool,
}

/// Tracks the current stage of one stream.
#[derive(Debug, Clone)]
pub struct StageSequencer {
    rules: Vec<StageRule>,
    index: usize,
    /// At least one stage matched in the current attempt.
    started: bool,
    last_matched: Option<usize>,
    completed: bool,
}

impl StageSequencer {
    pub fn new(stages: &[StageDefinition], default_policy: MismatchPolicy) -> Self {
        let rules = stages
            .iter()
            .map(|s| StageRule {
                required: s.required,
                policy: s.effective_policy(default_policy),
                repeatable: s.repeatable,
            })
            .collect();
        Self {
            rules,
            index: 0,
            started: false,
            last_matched: None,
            completed: false,
        }
    }

    /// Index of the stage the next line should be evaluated against.
    pub fn current_index(&self) -> usize {
        self.index
    }

    pub fn state(&self) -> SequencerState {
        if self.completed {
            SequencerState::Completed
        } else if self.started {
            SequencerState::InSequence(self.index)
        } else {
            SequencerState::Idle
        }
    }

    /// True while a sequence attempt holds matched stages.
    pub fn in_progress(&self) -> bool {
        self.started
    }

    /// Stage that may absorb a line the current stage rejected.
    pub fn repeat_stage(&self) -> Option<usize> {
        let prev = self.last_matched?;
        (self.started && self.rules[prev].repeatable).then_some(prev)
    }

    /// Apply one evaluation result.
    ///
    /// `result` is either the evaluation of the current stage or, when the
    /// current stage missed, a matched evaluation of [`repeat_stage`].
    ///
    /// [`repeat_stage`]: StageSequencer::repeat_stage
    pub fn advance(&mut self, result: &MatchResult) -> SequencerAction {
        self.completed = false;

        if result.matched {
            if result.stage_index != self.index {
                debug_assert_eq!(Some(result.stage_index), self.repeat_stage());
                return SequencerAction::Stay;
            }
            self.started = true;
            self.last_matched = Some(self.index);
            return self.step_forward();
        }

        let rule = &self.rules[self.index];
        if rule.policy == MismatchPolicy::Lenient && !rule.required {
            return self.step_forward();
        }

        let was_started = self.started;
        self.reset();
        if was_started {
            SequencerAction::Abort
        } else {
            SequencerAction::Stay
        }
    }

    /// Drop the current attempt and return to `Idle`.
    pub fn reset(&mut self) {
        self.index = 0;
        self.started = false;
        self.last_matched = None;
    }

    fn step_forward(&mut self) -> SequencerAction {
        let next = self.index + 1;
        if next < self.rules.len() {
            self.index = next;
            return SequencerAction::AdvanceTo(next);
        }

        // Skipping every stage from Idle is not a record.
        let was_started = self.started;
        self.reset();
        if was_started {
            self.completed = true;
            SequencerAction::Complete
        } else {
            SequencerAction::Stay
        }
    }
}
