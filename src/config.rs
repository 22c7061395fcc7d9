//! Experiment configuration
//!
//! Loaded from a JSON file; every field has a default, so `{}` is a valid
//! configuration. The file itself is the run's parameter source and gets
//! copied into the output directory for provenance.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;

use crate::{Error, Result};

/// Default output root, relative to the working directory.
pub const DEFAULT_OUTPUT_ROOT: &str = "output";

/// Default cap on `+<n>` collision retries.
pub const DEFAULT_MAX_SUFFIX_ATTEMPTS: u32 = 1000;

/// Default metrics file inside the output directory.
pub const DEFAULT_RESULTS_FILE: &str = "results.parquet";

/// Default text log file inside the output directory.
pub const DEFAULT_LOG_FILE: &str = "logfile.txt";

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Console level (`error`, `warn`, `info`, `debug`, `trace`). `RUST_LOG` overrides it.
    pub level: String,
    /// Text log file name inside the output directory.
    pub log_file: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_file: DEFAULT_LOG_FILE.to_string(),
        }
    }
}

impl LogConfig {
    /// Parse the configured console level.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` for an unknown level name.
    pub fn level_filter(&self) -> Result<LevelFilter> {
        self.level
            .parse::<LevelFilter>()
            .map_err(|e| Error::Configuration(format!("invalid log level '{}': {e}", self.level)))
    }
}

/// Configuration of one experiment run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    /// Experiment name; falls back to the parameter file path.
    pub name: Option<String>,
    /// Root under which output directories are allocated.
    pub output_root: PathBuf,
    /// Append a job-id or timestamp suffix to the directory name.
    pub with_suffix: bool,
    /// Maximum number of directory creation attempts with a suffix.
    pub max_suffix_attempts: u32,
    /// Metrics file name inside the output directory.
    pub results_file: String,
    /// Logging settings.
    pub log: LogConfig,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            name: None,
            output_root: PathBuf::from(DEFAULT_OUTPUT_ROOT),
            with_suffix: true,
            max_suffix_attempts: DEFAULT_MAX_SUFFIX_ATTEMPTS,
            results_file: DEFAULT_RESULTS_FILE.to_string(),
            log: LogConfig::default(),
        }
    }
}

impl ExperimentConfig {
    /// Load and validate a configuration file.
    ///
    /// # Errors
    ///
    /// Returns `Io`/`Json` if the file cannot be read or parsed, and
    /// `Configuration` if a value is out of range.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` describing the first invalid value.
    pub fn validate(&self) -> Result<()> {
        if self.max_suffix_attempts == 0 {
            return Err(Error::Configuration(
                "max_suffix_attempts must be at least 1".to_string(),
            ));
        }
        if self.results_file.is_empty() || self.log.log_file.is_empty() {
            return Err(Error::Configuration(
                "results_file and log.log_file must not be empty".to_string(),
            ));
        }
        if matches!(&self.name, Some(name) if name.is_empty()) {
            return Err(Error::Configuration("name must not be empty".to_string()));
        }
        self.log.level_filter()?;
        Ok(())
    }
}
