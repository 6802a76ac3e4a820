//! Record assembly across stages.
//!
//! The assembler owns the single in-progress record of a stream. Captured
//! values are merged stage by stage (first write wins) and projected onto
//! the output column layout when the sequence completes. Lines taken by a
//! repeatable stage are also kept as per-field samples, so every frame of a
//! cycle is available to the caller, not only the first one.

use std::collections::{BTreeMap, HashMap};

use crate::error::ConfigError;
use crate::matcher::{MatchResult, PatternMatcher};
use crate::sequencer::SequencerAction;
use crate::stage::StageDefinition;

/// First and last source line of a completed record (1-based, inclusive).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceSpan {
    pub first: usize,
    pub last: usize,
}

/// A finished row, fields in output column order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedRecord {
    /// One `(column, value)` pair per output column; absent captures are `""`.
    pub fields: Vec<(String, String)>,
    pub source_span: SourceSpan,
    /// Lines absorbed by repeatable stages.
    pub repetitions: usize,
    /// Lines matched by repeatable stages, first match included.
    pub frames: usize,
    /// Values captured on those lines, in line order.
    pub samples: BTreeMap<String, Vec<String>>,
}

impl CompletedRecord {
    /// Value of `column`, if the column is part of the layout.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(_, value)| value.as_str())
    }

    /// Mean of the numeric samples of `field`; non-numeric values are skipped.
    pub fn average(&self, field: &str) -> Option<f64> {
        let values: Vec<f64> = self
            .samples
            .get(field)?
            .iter()
            .filter_map(|v| v.parse::<f64>().ok())
            .collect();
        if values.is_empty() {
            return None;
        }
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// State of the record currently being built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InProgressRecord {
    pub fields: HashMap<String, String>,
    pub current_stage_index: usize,
    pub started_at_line: Option<usize>,
    pub last_line: usize,
    pub repetitions: usize,
    pub frames: usize,
    pub samples: BTreeMap<String, Vec<String>>,
}

impl InProgressRecord {
    fn merge(&mut self, result: &MatchResult, line_number: usize, sampled: bool) {
        for (name, value) in &result.captured {
            self.fields
                .entry(name.clone())
                .or_insert_with(|| value.clone());
            if sampled {
                self.samples
                    .entry(name.clone())
                    .or_default()
                    .push(value.clone());
            }
        }
        if sampled {
            self.frames += 1;
        }
        self.started_at_line.get_or_insert(line_number);
        self.last_line = line_number;
    }
}

/// Builds [`CompletedRecord`]s out of sequencer actions.
#[derive(Debug, Clone)]
pub struct RecordAssembler {
    columns: Vec<String>,
    /// Indexed by stage; true where the stage's lines are sampled.
    repeatable: Vec<bool>,
    current: InProgressRecord,
}

impl RecordAssembler {
    /// `columns` is the output layout every completed record is projected onto.
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            repeatable: Vec::new(),
            current: InProgressRecord::default(),
        }
    }

    /// Mark the stages whose matched lines are kept as samples.
    pub fn with_repeatable(mut self, stages: &[StageDefinition]) -> Self {
        self.repeatable = stages.iter().map(|s| s.repeatable).collect();
        self
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn current(&self) -> &InProgressRecord {
        &self.current
    }

    /// Apply one sequencer action. Returns the record on `Complete`.
    ///
    /// Unmatched results carry no values and leave the fields untouched.
    pub fn accumulate(
        &mut self,
        action: SequencerAction,
        result: &MatchResult,
        line_number: usize,
    ) -> Option<CompletedRecord> {
        match action {
            SequencerAction::Stay => {
                if result.matched {
                    self.merge(result, line_number);
                    self.current.repetitions += 1;
                }
                None
            }
            SequencerAction::AdvanceTo(next) => {
                if result.matched {
                    self.merge(result, line_number);
                }
                self.current.current_stage_index = next;
                None
            }
            SequencerAction::Complete => {
                if result.matched {
                    self.merge(result, line_number);
                }
                Some(self.finalize())
            }
            SequencerAction::Abort => {
                self.discard();
                None
            }
        }
    }

    fn merge(&mut self, result: &MatchResult, line_number: usize) {
        let sampled = self
            .repeatable
            .get(result.stage_index)
            .copied()
            .unwrap_or(false);
        self.current.merge(result, line_number, sampled);
    }

    /// Drop the in-progress record.
    pub fn discard(&mut self) {
        self.current = InProgressRecord::default();
    }

    fn finalize(&mut self) -> CompletedRecord {
        let mut done = std::mem::take(&mut self.current);
        let first = done.started_at_line.unwrap_or(done.last_line);
        let fields = self
            .columns
            .iter()
            .map(|column| {
                let value = done.fields.remove(column).unwrap_or_default();
                (column.clone(), value)
            })
            .collect();
        CompletedRecord {
            fields,
            source_span: SourceSpan {
                first,
                last: done.last_line,
            },
            repetitions: done.repetitions,
            frames: done.frames,
            samples: done.samples,
        }
    }
}

/// Reject two required stages that capture the same field name.
pub fn check_duplicate_fields(
    stages: &[StageDefinition],
    matcher: &PatternMatcher,
) -> Result<(), ConfigError> {
    let mut owners: HashMap<&str, &str> = HashMap::new();
    for (index, stage) in stages.iter().enumerate() {
        if !stage.required {
            continue;
        }
        for field in matcher.capture_names(index) {
            if let Some(first) = owners.insert(field.as_str(), stage.name.as_str()) {
                return Err(ConfigError::DuplicateFieldName {
                    field: field.clone(),
                    first: first.to_string(),
                    second: stage.name.clone(),
                });
            }
        }
    }
    Ok(())
}

/// Default column layout: every capture name in stage order, first occurrence kept.
pub fn default_columns(matcher: &PatternMatcher) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for index in 0..matcher.len() {
        for name in matcher.capture_names(index) {
            if !columns.contains(name) {
                columns.push(name.clone());
            }
        }
    }
    columns
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(index: usize, pairs: &[(&str, &str)]) -> MatchResult {
        MatchResult {
            stage_name: format!("s{index}"),
            stage_index: index,
            captured: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            matched: true,
        }
    }

    fn columns(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_complete_projects_onto_columns() {
        let mut asm = RecordAssembler::new(columns(&["b", "a", "missing"]));
        assert!(
            asm.accumulate(SequencerAction::AdvanceTo(1), &result(0, &[("a", "1")]), 3)
                .is_none()
        );
        let rec = asm
            .accumulate(SequencerAction::Complete, &result(1, &[("b", "2")]), 5)
            .unwrap();
        assert_eq!(
            rec.fields,
            vec![
                ("b".to_string(), "2".to_string()),
                ("a".to_string(), "1".to_string()),
                ("missing".to_string(), String::new()),
            ]
        );
        assert_eq!(rec.source_span, SourceSpan { first: 3, last: 5 });
        assert_eq!(rec.get("a"), Some("1"));
        assert_eq!(rec.get("zzz"), None);
    }

    #[test]
    fn test_first_write_wins() {
        let mut asm = RecordAssembler::new(columns(&["id"]));
        asm.accumulate(SequencerAction::AdvanceTo(1), &result(0, &[("id", "first")]), 1);
        let rec = asm
            .accumulate(SequencerAction::Complete, &result(1, &[("id", "second")]), 2)
            .unwrap();
        assert_eq!(rec.get("id"), Some("first"));
    }

    #[test]
    fn test_abort_discards_and_resets() {
        let mut asm = RecordAssembler::new(columns(&["a"]));
        asm.accumulate(SequencerAction::AdvanceTo(1), &result(0, &[("a", "1")]), 1);
        let miss = MatchResult::miss("s1", 1);
        assert!(asm.accumulate(SequencerAction::Abort, &miss, 2).is_none());
        assert_eq!(asm.current(), &InProgressRecord::default());
    }

    #[test]
    fn test_state_resets_after_complete() {
        let mut asm = RecordAssembler::new(columns(&["a"]));
        asm.accumulate(SequencerAction::Complete, &result(0, &[("a", "1")]), 7)
            .unwrap();
        assert_eq!(asm.current(), &InProgressRecord::default());
        let rec = asm
            .accumulate(SequencerAction::Complete, &result(0, &[("a", "2")]), 9)
            .unwrap();
        assert_eq!(rec.get("a"), Some("2"));
        assert_eq!(rec.source_span, SourceSpan { first: 9, last: 9 });
    }

    #[test]
    fn test_stay_counts_repetitions() {
        let mut asm = RecordAssembler::new(columns(&["v"]));
        asm.accumulate(SequencerAction::AdvanceTo(1), &result(0, &[("v", "1")]), 1);
        asm.accumulate(SequencerAction::Stay, &result(0, &[("v", "2")]), 2);
        asm.accumulate(SequencerAction::Stay, &result(0, &[("v", "3")]), 3);
        let rec = asm
            .accumulate(SequencerAction::Complete, &result(1, &[]), 4)
            .unwrap();
        assert_eq!(rec.repetitions, 2);
        assert_eq!(rec.get("v"), Some("1"));
        assert_eq!(rec.source_span, SourceSpan { first: 1, last: 4 });
    }

    #[test]
    fn test_repeatable_stage_lines_are_sampled() {
        let stages = vec![
            StageDefinition::new("s0", "start"),
            StageDefinition::new("s1", "frame").repeatable(),
            StageDefinition::new("s2", "end"),
        ];
        let mut asm = RecordAssembler::new(columns(&["t"])).with_repeatable(&stages);
        asm.accumulate(SequencerAction::AdvanceTo(1), &result(0, &[("id", "7")]), 1);
        asm.accumulate(SequencerAction::AdvanceTo(2), &result(1, &[("t", "0.50")]), 2);
        asm.accumulate(SequencerAction::Stay, &result(1, &[("t", "0.52")]), 3);
        asm.accumulate(SequencerAction::Stay, &result(1, &[("t", "n/a")]), 4);
        let rec = asm
            .accumulate(SequencerAction::Complete, &result(2, &[("status", "ok")]), 5)
            .unwrap();
        assert_eq!(rec.get("t"), Some("0.50"));
        assert_eq!(rec.frames, 3);
        assert_eq!(rec.repetitions, 2);
        assert_eq!(rec.samples["t"], vec!["0.50", "0.52", "n/a"]);
        assert!(!rec.samples.contains_key("id"));
        assert!((rec.average("t").unwrap() - 0.51).abs() < 1e-9);
        assert_eq!(rec.average("id"), None);
    }

    #[test]
    fn test_samples_reset_between_records() {
        let stages = vec![StageDefinition::new("s0", "frame").repeatable()];
        let mut asm = RecordAssembler::new(columns(&["t"])).with_repeatable(&stages);
        let first = asm
            .accumulate(SequencerAction::Complete, &result(0, &[("t", "1")]), 1)
            .unwrap();
        let second = asm
            .accumulate(SequencerAction::Complete, &result(0, &[("t", "3")]), 2)
            .unwrap();
        assert_eq!(first.average("t"), Some(1.0));
        assert_eq!(second.average("t"), Some(3.0));
        assert_eq!(second.frames, 1);
    }

    #[test]
    fn test_unmatched_skip_does_not_touch_span() {
        let mut asm = RecordAssembler::new(columns(&["a"]));
        asm.accumulate(SequencerAction::AdvanceTo(1), &result(0, &[("a", "1")]), 1);
        asm.accumulate(SequencerAction::AdvanceTo(2), &MatchResult::miss("s1", 1), 2);
        assert_eq!(asm.current().current_stage_index, 2);
        assert_eq!(asm.current().last_line, 1);
    }

    #[test]
    fn test_duplicate_required_fields_rejected() {
        let stages = vec![
            StageDefinition::new("a", r"A:(?P<id>\d+)"),
            StageDefinition::new("b", r"B:(?P<id>\d+)"),
        ];
        let matcher = PatternMatcher::compile(&stages).unwrap();
        assert_eq!(
            check_duplicate_fields(&stages, &matcher),
            Err(ConfigError::DuplicateFieldName {
                field: "id".to_string(),
                first: "a".to_string(),
                second: "b".to_string(),
            })
        );
    }

    #[test]
    fn test_duplicate_with_optional_stage_allowed() {
        let stages = vec![
            StageDefinition::new("a", r"A:(?P<id>\d+)"),
            StageDefinition::new("b", r"B:(?P<id>\d+)").optional(),
        ];
        let matcher = PatternMatcher::compile(&stages).unwrap();
        assert!(check_duplicate_fields(&stages, &matcher).is_ok());
        assert_eq!(default_columns(&matcher), vec!["id".to_string()]);
    }
}
