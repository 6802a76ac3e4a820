//! CSV output of completed records.
//!
//! The header is the declared column list. Each record becomes one row;
//! columns the record has no value for are filled from derived metadata
//! when their name is one of `SourceFile`, `StartLine`, `EndLine`,
//! `StartTime`, `EndTime`, `Duration(s)`, `Repeats` or `Frames`, or has the
//! form `Avg<field>`. Anything else is left empty.
//!
//! `Duration(s)` spans the record's first to last line. `Avg<field>` is the
//! mean of the numeric values a repeatable stage captured for `field`.

use std::fs::{self, File};
use std::io;
use std::path::Path;

use chrono::NaiveDateTime;
use stagelog::CompletedRecord;

use crate::error::{CollectError, Result};
use crate::timestamp::{duration_secs, format_start};

/// Columns placed before the captures when no header is configured.
pub const LEADING_COLUMNS: [&str; 3] = ["SourceFile", "StartLine", "EndLine"];

/// Where a record came from, for the derived columns.
#[derive(Debug, Clone, Default)]
pub struct RowContext {
    pub source_file: String,
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
}

fn derived(column: &str, record: &CompletedRecord, ctx: &RowContext) -> Option<String> {
    let value = match column {
        "SourceFile" => ctx.source_file.clone(),
        "StartLine" => record.source_span.first.to_string(),
        "EndLine" => record.source_span.last.to_string(),
        "StartTime" => format_start(ctx.start?),
        "EndTime" => format_start(ctx.end?),
        "Duration(s)" => format!("{:.3}", duration_secs(ctx.start?, ctx.end?)),
        "Repeats" => record.repetitions.to_string(),
        "Frames" => record.frames.to_string(),
        _ => {
            let field = column.strip_prefix("Avg")?;
            format!("{:.2}", record.average(field)?)
        }
    };
    Some(value)
}

/// Streaming CSV writer with a fixed column layout.
pub struct CsvSink<W: io::Write> {
    writer: csv::Writer<W>,
    columns: Vec<String>,
    rows: usize,
}

impl CsvSink<File> {
    /// Create `path` (and its parent directories) and write the header.
    pub fn create(path: &Path, columns: Vec<String>) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| CollectError::io(parent, e))?;
        }
        let file = File::create(path).map_err(|e| CollectError::io(path, e))?;
        Self::from_writer(file, columns)
    }
}

impl<W: io::Write> CsvSink<W> {
    pub fn from_writer(inner: W, columns: Vec<String>) -> Result<Self> {
        let mut writer = csv::Writer::from_writer(inner);
        writer.write_record(&columns)?;
        Ok(Self {
            writer,
            columns,
            rows: 0,
        })
    }

    pub fn write(&mut self, record: &CompletedRecord, ctx: &RowContext) -> Result<()> {
        let row: Vec<String> = self
            .columns
            .iter()
            .map(|column| match record.get(column) {
                Some(value) if !value.is_empty() => value.to_string(),
                _ => derived(column, record, ctx).unwrap_or_default(),
            })
            .collect();
        self.writer.write_record(&row)?;
        self.rows += 1;
        Ok(())
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Flush and hand back the underlying writer.
    pub fn finish(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| CollectError::Output(e.into_error()))
    }
}
