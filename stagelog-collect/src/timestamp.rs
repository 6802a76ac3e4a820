//! Bracketed timestamp extraction, e.g. `[2025/07/09 00:00:01.250] Value=100`.

use chrono::NaiveDateTime;

/// Parses the first `[...]` group of a line against a list of formats.
#[derive(Debug, Clone)]
pub struct TimestampParser {
    formats: Vec<String>,
}

impl TimestampParser {
    pub fn new(formats: Vec<String>) -> Self {
        Self { formats }
    }

    /// The timestamp of `line`, or `None` when there is no bracketed group or
    /// no format fits it.
    pub fn parse(&self, line: &str) -> Option<NaiveDateTime> {
        let raw = bracketed(line)?;
        self.formats
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
    }
}

fn bracketed(line: &str) -> Option<&str> {
    let start = line.find('[')? + 1;
    let len = line[start..].find(']')?;
    (len > 0).then(|| &line[start..start + len])
}

/// Start-time rendering used in CSV rows.
pub fn format_start(ts: NaiveDateTime) -> String {
    ts.format("%y/%m/%d %H:%M:%S").to_string()
}

/// Seconds between two timestamps at millisecond precision.
pub fn duration_secs(start: NaiveDateTime, end: NaiveDateTime) -> f64 {
    let millis = (end - start).num_milliseconds();
    millis as f64 / 1000.0
}
