//! One collection run: rename, discover, decode, match, write.
//!
//! Every discovered file is its own stream with its own [`LogEngine`]. A file
//! that cannot be read is logged and skipped; failing to write the CSV
//! output ends the run.

use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};

use stagelog::{EngineStats, LogEngine};
use tracing::{debug, info, warn};

use crate::config::CollectConfig;
use crate::csv_out::{CsvSink, LEADING_COLUMNS, RowContext};
use crate::discover::find_log_files;
use crate::encoding::TextReader;
use crate::error::Result;
use crate::rename::rename_logs;
use crate::timestamp::TimestampParser;

/// Counters for a whole run, summed over files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub files_found: usize,
    pub files_processed: usize,
    pub files_failed: usize,
    /// Lines dropped for lacking a timestamp.
    pub lines_skipped: usize,
    pub lines_processed: usize,
    pub records_completed: usize,
    pub sequences_aborted: usize,
    pub partials_discarded: usize,
    pub repetitions: usize,
    pub records_saved: usize,
    pub output: Option<PathBuf>,
}

impl RunSummary {
    fn add_engine(&mut self, stats: &EngineStats) {
        self.lines_processed += stats.lines_processed;
        self.records_completed += stats.completed;
        self.sequences_aborted += stats.aborted;
        self.partials_discarded += stats.discarded;
        self.repetitions += stats.repetitions;
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "===== Processing Summary =====")?;
        writeln!(f, "Files processed:     {}", self.files_processed)?;
        if self.files_failed > 0 {
            writeln!(f, "Files failed:        {}", self.files_failed)?;
        }
        writeln!(f, "Lines processed:     {}", self.lines_processed)?;
        if self.lines_skipped > 0 {
            writeln!(f, "Lines skipped:       {}", self.lines_skipped)?;
        }
        writeln!(f, "Records completed:   {}", self.records_completed)?;
        writeln!(f, "Sequences aborted:   {}", self.sequences_aborted)?;
        writeln!(f, "Partials discarded:  {}", self.partials_discarded)?;
        writeln!(f, "Repeated lines:      {}", self.repetitions)?;
        write!(f, "Records saved:       {}", self.records_saved)
    }
}

/// Drives a run described by a [`CollectConfig`].
pub struct Collector {
    config: CollectConfig,
    columns: Vec<String>,
    reader: TextReader,
    timestamps: TimestampParser,
}

impl Collector {
    /// Validate `config` and prepare the output layout.
    pub fn new(config: CollectConfig) -> Result<Self> {
        config.validate()?;
        let columns = if config.csv_fields.is_empty() {
            let probe = LogEngine::new(config.engine_config())?;
            LEADING_COLUMNS
                .iter()
                .map(|c| c.to_string())
                .chain(probe.columns().iter().cloned())
                .collect()
        } else {
            config.csv_fields.clone()
        };
        Ok(Self {
            timestamps: TimestampParser::new(config.timestamp_formats.clone()),
            reader: TextReader::new(),
            columns,
            config,
        })
    }

    /// CSV header of this run.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Process every log file and write the records to `output`.
    ///
    /// The output file is only created once the first record exists.
    pub fn run(&mut self, output: &Path) -> Result<RunSummary> {
        let mut summary = RunSummary::default();

        if self.config.rename_logs {
            let renamed = rename_logs(
                &self.config.folder_path,
                &self.config.log_extensions,
                &self.config.new_ext,
            )?;
            info!("Renamed {} log files", renamed.len());
        }

        let files = find_log_files(&self.config.folder_path, &self.config.log_extensions)?;
        summary.files_found = files.len();
        if files.is_empty() {
            warn!("No log files found in {}", self.config.folder_path.display());
            return Ok(summary);
        }
        info!("Found {} log files", files.len());

        let mut sink: Option<CsvSink<File>> = None;
        for path in &files {
            self.process_file(path, output, &mut sink, &mut summary)?;
        }

        match sink {
            Some(sink) => {
                summary.records_saved = sink.rows();
                sink.finish()?;
                info!(
                    "Saved {} records to {}",
                    summary.records_saved,
                    output.display()
                );
                summary.output = Some(output.to_path_buf());
            }
            None => warn!("No results to save"),
        }
        Ok(summary)
    }

    fn process_file(
        &mut self,
        path: &Path,
        output: &Path,
        sink: &mut Option<CsvSink<File>>,
        summary: &mut RunSummary,
    ) -> Result<()> {
        let text = match self.reader.read(path) {
            Ok((text, encoding)) => {
                debug!("Decoding {} as {}", path.display(), encoding);
                text
            }
            Err(e) => {
                warn!("Error processing {}: {}", path.display(), e);
                summary.files_failed += 1;
                return Ok(());
            }
        };

        let lines: Vec<&str> = text.lines().collect();
        let require_timestamp = self.config.require_timestamp;
        let timestamps = &self.timestamps;
        let mut skipped = 0;
        let numbered = lines.iter().enumerate().filter_map(|(i, line)| {
            if require_timestamp && timestamps.parse(line).is_none() {
                skipped += 1;
                return None;
            }
            Some((i + 1, *line))
        });

        let source_file = path
            .strip_prefix(&self.config.folder_path)
            .unwrap_or(path)
            .display()
            .to_string();

        let mut engine = LogEngine::new(self.config.engine_config())?;
        for record in engine.process(numbered) {
            let ctx = RowContext {
                source_file: source_file.clone(),
                start: timestamps.parse(lines[record.source_span.first - 1]),
                end: timestamps.parse(lines[record.source_span.last - 1]),
            };
            if sink.is_none() {
                *sink = Some(CsvSink::create(output, self.columns.clone())?);
            }
            if let Some(sink) = sink.as_mut() {
                sink.write(&record, &ctx)?;
            }
        }

        let stats = engine.stats();
        if stats.discarded > 0 {
            warn!(
                "{}: incomplete sequence at end of file discarded",
                path.display()
            );
        }
        debug!(
            "{}: {} lines, {} completed, {} aborted",
            path.display(),
            stats.lines_processed,
            stats.completed,
            stats.aborted
        );
        summary.add_engine(&stats);
        summary.lines_skipped += skipped;
        summary.files_processed += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stagelog::StageDefinition;
    use std::fs;
    use tempfile::TempDir;

    fn stages() -> Vec<StageDefinition> {
        vec![
            StageDefinition::new("init", r"Step=(?P<Step>\d+)"),
            StageDefinition::new("execute", r"Value=(?P<Value>\d+)"),
        ]
    }

    fn config(dir: &TempDir) -> CollectConfig {
        CollectConfig {
            folder_path: dir.path().join("logs"),
            log_extensions: vec![".log".to_string()],
            stages: stages(),
            ..CollectConfig::default()
        }
    }

    #[test]
    fn test_full_cycle() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("logs")).unwrap();
        fs::write(
            dir.path().join("logs").join("sample.log"),
            "[2025/07/09 00:00:00.000] Step=1\n[2025/07/09 00:00:01.000] Value=100\n",
        )
        .unwrap();
        let cfg = CollectConfig {
            csv_fields: vec![
                "SourceFile".to_string(),
                "StartTime".to_string(),
                "Step".to_string(),
                "Value".to_string(),
                "Duration(s)".to_string(),
            ],
            ..config(&dir)
        };
        let out = dir.path().join("results").join("out.csv");

        let summary = Collector::new(cfg).unwrap().run(&out).unwrap();

        assert_eq!(summary.files_processed, 1);
        assert_eq!(summary.records_completed, 1);
        assert_eq!(summary.records_saved, 1);
        assert_eq!(summary.output.as_deref(), Some(out.as_path()));
        let csv = fs::read_to_string(&out).unwrap();
        assert_eq!(
            csv,
            "SourceFile,StartTime,Step,Value,Duration(s)\n\
             sample.log,25/07/09 00:00:00,1,100,1.000\n"
        );
    }

    #[test]
    fn test_default_columns() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("logs")).unwrap();
        let collector = Collector::new(config(&dir)).unwrap();
        assert_eq!(
            collector.columns(),
            ["SourceFile", "StartLine", "EndLine", "Step", "Value"]
        );
    }

    #[test]
    fn test_no_records_writes_nothing() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("logs")).unwrap();
        fs::write(dir.path().join("logs").join("a.log"), "Step=1\n").unwrap();
        let out = dir.path().join("out.csv");

        let summary = Collector::new(config(&dir)).unwrap().run(&out).unwrap();

        assert_eq!(summary.partials_discarded, 1);
        assert_eq!(summary.records_saved, 0);
        assert_eq!(summary.output, None);
        assert!(!out.exists());
    }

    #[test]
    fn test_require_timestamp_drops_lines() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("logs")).unwrap();
        fs::write(
            dir.path().join("logs").join("a.log"),
            "[2025/07/09 00:00:00.000] Step=1\nValue=5 without time\n[2025/07/09 00:00:02.000] Value=7\n",
        )
        .unwrap();
        let cfg = CollectConfig {
            require_timestamp: true,
            csv_fields: vec!["Step".to_string(), "Value".to_string(), "EndLine".to_string()],
            ..config(&dir)
        };
        let out = dir.path().join("out.csv");

        let summary = Collector::new(cfg).unwrap().run(&out).unwrap();

        assert_eq!(summary.lines_skipped, 1);
        assert_eq!(summary.lines_processed, 2);
        assert_eq!(fs::read_to_string(&out).unwrap(), "Step,Value,EndLine\n1,7,3\n");
    }

    #[test]
    fn test_files_are_independent_streams() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("logs")).unwrap();
        fs::write(dir.path().join("logs").join("run1.log"), "Step=1\n").unwrap();
        fs::write(dir.path().join("logs").join("run2.log"), "Value=2\nStep=3\nValue=4\n").unwrap();
        let cfg = CollectConfig {
            csv_fields: vec!["SourceFile".to_string(), "Step".to_string(), "Value".to_string()],
            ..config(&dir)
        };
        let out = dir.path().join("out.csv");

        let summary = Collector::new(cfg).unwrap().run(&out).unwrap();

        assert_eq!(summary.files_processed, 2);
        assert_eq!(summary.partials_discarded, 1);
        assert_eq!(
            fs::read_to_string(&out).unwrap(),
            "SourceFile,Step,Value\nrun2.log,3,4\n"
        );
    }

    #[test]
    fn test_rename_before_discovery() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("logs")).unwrap();
        fs::write(dir.path().join("logs").join("a.raw"), "Step=1\nValue=2\n").unwrap();
        let cfg = CollectConfig {
            rename_logs: true,
            log_extensions: vec![".raw".to_string(), ".txt".to_string()],
            ..config(&dir)
        };
        let out = dir.path().join("out.csv");

        let summary = Collector::new(cfg).unwrap().run(&out).unwrap();

        assert!(dir.path().join("logs").join("a.txt").exists());
        assert_eq!(summary.files_found, 1);
        assert_eq!(summary.records_saved, 1);
    }

    #[test]
    fn test_invalid_stage_config_fails_before_run() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("logs")).unwrap();
        let cfg = CollectConfig {
            stages: vec![
                StageDefinition::new("a", r"id=(?P<id>\d+)"),
                StageDefinition::new("b", r"ID=(?P<id>\d+)"),
            ],
            ..config(&dir)
        };
        assert!(Collector::new(cfg).is_err());
    }

    #[test]
    fn test_instrument_fixture() {
        let specs = Path::new(env!("CARGO_MANIFEST_DIR")).join("specs");
        let loaded = CollectConfig::load(&specs.join("instrument.json")).unwrap();
        assert!(loaded.from_file);
        let cfg = CollectConfig {
            folder_path: specs.join("logs"),
            ..loaded.config
        };
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("instrument.csv");

        let summary = Collector::new(cfg).unwrap().run(&out).unwrap();

        assert_eq!(summary.files_processed, 3);
        assert_eq!(summary.records_completed, 3);
        assert_eq!(summary.partials_discarded, 1);
        assert_eq!(summary.sequences_aborted, 0);
        assert_eq!(summary.repetitions, 2);
        assert_eq!(
            fs::read_to_string(&out).unwrap(),
            "SourceFile,StartTime,Technique,Query,FrameTime,AvgFrameTime,Frames,Status,Repeats,Duration(s)\n\
             run1.log,25/07/09 08:00:01,XRD,sample-A,0.50,0.51,3,OK,2,3.250\n\
             run1.log,25/07/09 08:01:00,SAXS,,1.10,1.10,1,OK,0,4.000\n\
             run2.log,25/07/09 09:00:00,XRD,échantillon-B,0.40,0.40,1,WARN,0,3.000\n"
        );
    }

    #[test]
    fn test_summary_display() {
        let summary = RunSummary {
            files_processed: 2,
            records_completed: 3,
            repetitions: 4,
            records_saved: 3,
            ..RunSummary::default()
        };
        let text = summary.to_string();
        assert!(text.starts_with("===== Processing Summary ====="));
        assert!(text.contains("Files processed:     2"));
        assert!(!text.contains("Files failed"));
        assert!(text.contains("Repeated lines:      4"));
        assert!(text.ends_with("Records saved:       3"));
    }
}
