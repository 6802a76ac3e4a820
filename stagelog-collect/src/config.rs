//! JSON configuration for a collection run.
//!
//! Every key is optional; missing keys take the defaults below. A missing
//! config file is not fatal (defaults are used and a warning is logged), but
//! malformed JSON is.
//!
//! ```json
//! {
//!   "folder_path": "./logs",
//!   "output_csv": "./results/output.csv",
//!   "stages": [
//!     { "name": "init", "pattern": "Step=(?P<Step>\\d+)" },
//!     { "name": "execute", "pattern": "Value=(?P<Value>\\d+)" }
//!   ],
//!   "csv_fields": ["SourceFile", "StartTime", "Step", "Value"]
//! }
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use stagelog::{EngineConfig, MismatchPolicy, StageDefinition};

use crate::error::{CollectError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectConfig {
    pub folder_path: PathBuf,
    pub output_csv: PathBuf,
    /// Rename matching log files to `new_ext` before discovery.
    pub rename_logs: bool,
    pub new_ext: String,
    pub log_extensions: Vec<String>,
    /// chrono format strings tried in order on the first `[...]` of a line.
    pub timestamp_formats: Vec<String>,
    /// Drop lines without a parseable timestamp before they reach the engine.
    pub require_timestamp: bool,
    pub mismatch_policy: MismatchPolicy,
    pub stages: Vec<StageDefinition>,
    pub csv_fields: Vec<String>,
    pub log_level: String,
    pub log_file: Option<PathBuf>,
}

impl Default for CollectConfig {
    fn default() -> Self {
        Self {
            folder_path: PathBuf::from("./logs"),
            output_csv: PathBuf::from("./results/output.csv"),
            rename_logs: false,
            new_ext: ".txt".to_string(),
            log_extensions: vec![".log".to_string(), ".txt".to_string()],
            timestamp_formats: vec![
                "%Y/%m/%d %H:%M:%S%.f".to_string(),
                "%Y-%m-%d %H:%M:%S%.f".to_string(),
                "%d/%m/%Y %H:%M:%S%.f".to_string(),
            ],
            require_timestamp: false,
            mismatch_policy: MismatchPolicy::Strict,
            stages: Vec::new(),
            csv_fields: Vec::new(),
            log_level: "info".to_string(),
            log_file: None,
        }
    }
}

/// Result of reading a config path.
#[derive(Debug)]
pub struct LoadedConfig {
    pub config: CollectConfig,
    /// False when the file did not exist and defaults were used.
    pub from_file: bool,
}

impl CollectConfig {
    /// Read `path`, falling back to defaults when it does not exist.
    ///
    /// Logging is usually not initialised yet at this point, so the caller
    /// reports a missing file once the subscriber is up.
    pub fn load(path: &Path) -> Result<LoadedConfig> {
        match fs::read_to_string(path) {
            Ok(text) => Ok(LoadedConfig {
                config: Self::from_json(&text)?,
                from_file: true,
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(LoadedConfig {
                config: Self::default(),
                from_file: false,
            }),
            Err(e) => Err(CollectError::io(path, e)),
        }
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Check everything that would make the run pointless, including the
    /// stage list itself.
    pub fn validate(&self) -> Result<()> {
        if self.stages.is_empty() {
            return Err(CollectError::Config(
                "at least one stage must be configured".to_string(),
            ));
        }
        if self.log_extensions.is_empty() {
            return Err(CollectError::Config(
                "log_extensions must not be empty".to_string(),
            ));
        }
        if !self.folder_path.is_dir() {
            return Err(CollectError::Config(format!(
                "invalid folder_path: {}",
                self.folder_path.display()
            )));
        }
        stagelog::validate_stages(&self.stages)?;
        Ok(())
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig::new(self.stages.clone())
            .with_policy(self.mismatch_policy)
            .with_output_fields(self.csv_fields.clone())
    }
}
