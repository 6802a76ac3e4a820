//! Stage definitions.
//!
//! A stage is one named step in the expected sequence of log events. The
//! ordered list of stages describes one output record: every required stage
//! has to match, in order, before the record is emitted.

use serde::{Deserialize, Serialize};

/// What the sequencer does when the current stage does not match a line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MismatchPolicy {
    /// Any mismatch aborts the in-progress record.
    #[default]
    Strict,
    /// A mismatch on a non-required stage skips that stage and re-offers
    /// the line to the next one. Required stages still abort.
    Lenient,
}

/// One named step of the sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageDefinition {
    /// Unique within a sequence.
    pub name: String,
    /// Regex with zero or more named capture groups.
    pub pattern: String,
    #[serde(default = "default_required")]
    pub required: bool,
    /// Per-stage override of the engine's default policy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<MismatchPolicy>,
    /// Further lines matching this stage are absorbed while the sequencer
    /// waits for the next stage.
    #[serde(default)]
    pub repeatable: bool,
}

fn default_required() -> bool {
    true
}

impl StageDefinition {
    /// A required stage with the engine's default policy.
    pub fn new(name: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pattern: pattern.into(),
            required: true,
            policy: None,
            repeatable: false,
        }
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn with_policy(mut self, policy: MismatchPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    pub fn repeatable(mut self) -> Self {
        self.repeatable = true;
        self
    }

    /// The policy in force for this stage, given the engine default.
    pub fn effective_policy(&self, default: MismatchPolicy) -> MismatchPolicy {
        self.policy.unwrap_or(default)
    }
}
