//! Run Record - one lifecycle attempt of an experiment

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    /// Run is configured but not yet started.
    Pending,
    /// Trainer is executing.
    Running,
    /// Learning completed.
    Success,
    /// A lifecycle step failed.
    Failed,
}

/// Run Record tracks one execution (fresh or resumed) of an experiment.
///
/// The output path is fixed once at allocation; the record then follows
/// exactly one execution from `Pending` to `Success` or `Failed`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunRecord {
    param_source: Option<PathBuf>,
    output_path: Option<PathBuf>,
    resumed_from: Option<PathBuf>,
    status: RunStatus,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
}

impl Default for RunRecord {
    fn default() -> Self {
        Self::new(None)
    }
}

impl RunRecord {
    /// Create a pending run record.
    ///
    /// # Arguments
    ///
    /// * `param_source` - Configuration file the run was launched with, if any
    #[must_use]
    pub const fn new(param_source: Option<PathBuf>) -> Self {
        Self {
            param_source,
            output_path: None,
            resumed_from: None,
            status: RunStatus::Pending,
            started_at: None,
            ended_at: None,
        }
    }

    /// Get the parameter source.
    #[must_use]
    pub fn param_source(&self) -> Option<&Path> {
        self.param_source.as_deref()
    }

    /// Get the allocated output directory.
    #[must_use]
    pub fn output_path(&self) -> Option<&Path> {
        self.output_path.as_deref()
    }

    /// Get the checkpoint this run resumed from.
    #[must_use]
    pub fn resumed_from(&self) -> Option<&Path> {
        self.resumed_from.as_deref()
    }

    /// Get the run ID (output directory name), once allocated.
    #[must_use]
    pub fn run_id(&self) -> Option<String> {
        self.output_path
            .as_deref()
            .and_then(Path::file_name)
            .map(|name| name.to_string_lossy().into_owned())
    }

    /// Get the current run status.
    #[must_use]
    pub const fn status(&self) -> RunStatus {
        self.status
    }

    /// Get the start timestamp, if the run has started.
    #[must_use]
    pub const fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// Get the end timestamp, if the run has completed.
    #[must_use]
    pub const fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    /// Fix the output directory.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if an output directory was already set.
    pub fn set_output_path(&mut self, path: PathBuf) -> Result<()> {
        if let Some(existing) = &self.output_path {
            return Err(Error::Configuration(format!(
                "output directory already allocated at {}",
                existing.display()
            )));
        }
        self.output_path = Some(path);
        Ok(())
    }

    /// Start the run, transitioning from Pending to Running.
    ///
    /// # Arguments
    ///
    /// * `resumed_from` - Checkpoint the run continues from, if any
    pub fn start(&mut self, resumed_from: Option<PathBuf>) {
        self.status = RunStatus::Running;
        self.resumed_from = resumed_from;
        self.started_at = Some(Utc::now());
    }

    /// Complete the run with the given final status.
    pub fn complete(&mut self, status: RunStatus) {
        self.status = status;
        self.ended_at = Some(Utc::now());
    }
}
