//! Pattern matching for individual stages.
//!
//! Every stage pattern is compiled exactly once, when the matcher is built,
//! into an arena indexed by stage position. Evaluating a line is a pure
//! function of the line and the stage index.

use std::collections::HashMap;

use regex::Regex;

use crate::error::ConfigError;
use crate::stage::StageDefinition;

/// Outcome of evaluating one line against one stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    pub stage_name: String,
    /// Position of the evaluated stage in the sequence.
    pub stage_index: usize,
    /// Every named group of the pattern when `matched`; empty otherwise.
    /// Groups that did not participate map to `""`, never to a missing key.
    pub captured: HashMap<String, String>,
    pub matched: bool,
}

impl MatchResult {
    pub fn miss(stage_name: impl Into<String>, stage_index: usize) -> Self {
        Self {
            stage_name: stage_name.into(),
            stage_index,
            captured: HashMap::new(),
            matched: false,
        }
    }
}

struct CompiledPattern {
    stage_name: String,
    regex: Regex,
    captures: Vec<String>,
}

/// Compiled patterns for a whole stage sequence.
pub struct PatternMatcher {
    patterns: Vec<CompiledPattern>,
}

impl PatternMatcher {
    /// Compile every stage pattern, failing on the first invalid one.
    pub fn compile(stages: &[StageDefinition]) -> Result<Self, ConfigError> {
        let mut patterns = Vec::with_capacity(stages.len());
        for stage in stages {
            let regex = Regex::new(&stage.pattern).map_err(|e| ConfigError::InvalidPattern {
                stage: stage.name.clone(),
                message: e.to_string(),
            })?;
            let captures = regex
                .capture_names()
                .flatten()
                .map(str::to_string)
                .collect();
            patterns.push(CompiledPattern {
                stage_name: stage.name.clone(),
                regex,
                captures,
            });
        }
        Ok(Self { patterns })
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Named capture groups declared by the stage at `index`, in pattern order.
    pub fn capture_names(&self, index: usize) -> &[String] {
        &self.patterns[index].captures
    }

    /// Apply the pattern of stage `index` to `line`.
    ///
    /// Panics if `index` is out of range; the sequencer never produces one.
    pub fn evaluate(&self, line: &str, index: usize) -> MatchResult {
        let pattern = &self.patterns[index];
        let Some(caps) = pattern.regex.captures(line) else {
            return MatchResult::miss(pattern.stage_name.as_str(), index);
        };

        let captured = pattern
            .captures
            .iter()
            .map(|name| {
                let value = caps.name(name).map(|m| m.as_str().trim()).unwrap_or("");
                (name.clone(), value.to_string())
            })
            .collect();

        MatchResult {
            stage_name: pattern.stage_name.clone(),
            stage_index: index,
            captured,
            matched: true,
        }
    }
}
