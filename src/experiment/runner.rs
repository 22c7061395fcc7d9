//! Experiment Runner - drives one run of a trainer
//!
//! ## Lifecycle
//!
//! ```text
//! new / from_config_file
//!   └─ allocate_output      output/<name>[.<suffix>[+<n>]]/
//!       └─ wire_persistence results table file + logfile.txt
//!           ├─ run            sanity_check → load_data → compile → perform_learning
//!           └─ continue_run   sanity_check → replay metrics → load_data → compile
//!                             → restore parameters → perform_learning
//! ```
//!
//! A resumed run shares the data-loading and compile path with a fresh run;
//! only parameter initialization and metric history differ.

use std::path::{Component, Path, PathBuf};

use tracing::{error, info, warn};

use super::allocator::OutputDirectoryAllocator;
use super::run_record::{RunRecord, RunStatus};
use super::trainer::{EpochMonitor, ModelParamsMonitor, Trainer};
use crate::config::ExperimentConfig;
use crate::logging::Logging;
use crate::metrics::{Backend, MetricsLog};
use crate::storage::TableFile;
use crate::{Error, Result};

/// Orchestrates output allocation, persistence wiring and execution of a
/// bound [`Trainer`].
pub struct ExperimentRunner {
    config: ExperimentConfig,
    logging: Logging,
    trainer: Option<Box<dyn Trainer>>,
    metrics: MetricsLog,
    record: RunRecord,
    persistence_wired: bool,
}

impl std::fmt::Debug for ExperimentRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExperimentRunner")
            .field("config", &self.config)
            .field("trainer_bound", &self.trainer.is_some())
            .field("record", &self.record)
            .finish_non_exhaustive()
    }
}

impl ExperimentRunner {
    /// Runner with the default configuration and no trainer bound.
    #[must_use]
    pub fn new(logging: Logging) -> Self {
        Self {
            config: ExperimentConfig::default(),
            logging,
            trainer: None,
            metrics: MetricsLog::new(),
            record: RunRecord::default(),
            persistence_wired: false,
        }
    }

    /// Load the configuration at `path` and bind `trainer`.
    ///
    /// The file becomes the run's parameter source.
    ///
    /// # Errors
    ///
    /// Returns error if the configuration cannot be loaded or is invalid.
    pub fn from_config_file<P: AsRef<Path>>(
        path: P,
        trainer: Box<dyn Trainer>,
        logging: Logging,
    ) -> Result<Self> {
        let path = path.as_ref();
        let config = ExperimentConfig::from_file(path)?;
        let mut runner = Self::new(logging).with_config(config);
        runner.record = RunRecord::new(Some(path.to_path_buf()));
        runner.set_trainer(trainer);
        Ok(runner)
    }

    /// Replace the configuration.
    #[must_use]
    pub fn with_config(mut self, config: ExperimentConfig) -> Self {
        self.config = config;
        self
    }

    /// Bind the trainer.
    pub fn set_trainer(&mut self, trainer: Box<dyn Trainer>) {
        self.trainer = Some(trainer);
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    /// Logging handle.
    #[must_use]
    pub const fn logging(&self) -> &Logging {
        &self.logging
    }

    /// Allocated output directory.
    #[must_use]
    pub fn output_path(&self) -> Option<&Path> {
        self.record.output_path()
    }

    /// Run record.
    #[must_use]
    pub const fn run_record(&self) -> &RunRecord {
        &self.record
    }

    /// Live metrics log.
    #[must_use]
    pub const fn metrics(&self) -> &MetricsLog {
        &self.metrics
    }

    /// Mutable metrics log (extra handlers, manual records).
    pub fn metrics_mut(&mut self) -> &mut MetricsLog {
        &mut self.metrics
    }

    /// Bound trainer.
    #[must_use]
    pub fn trainer(&self) -> Option<&dyn Trainer> {
        self.trainer.as_deref()
    }

    /// Allocate the output directory.
    ///
    /// The name is `name_hint` if given, else the configured name, else the
    /// parameter file path (only its file name if the path is absolute or
    /// climbs out of the working directory).
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if called twice or no name can be derived,
    /// and allocator errors otherwise.
    pub fn allocate_output(&mut self, name_hint: Option<&str>, with_suffix: bool) -> Result<PathBuf> {
        let logging = self.logging.clone();
        logging.in_scope(|| {
            if let Some(existing) = self.record.output_path() {
                return Err(Error::Configuration(format!(
                    "output directory already allocated at {}",
                    existing.display()
                )));
            }

            let name = self.experiment_name(name_hint).ok_or_else(|| {
                Error::Configuration(
                    "no usable experiment name: pass a name or a parameter file".to_string(),
                )
            })?;

            let allocator = OutputDirectoryAllocator::new(&self.config.output_root)
                .with_max_attempts(self.config.max_suffix_attempts);
            let dir = allocator.allocate(&name, with_suffix, self.record.param_source())?;

            self.record.set_output_path(dir.clone())?;
            Ok(dir)
        })
    }

    /// Allocate the output directory with the configured suffix setting.
    ///
    /// # Errors
    ///
    /// See [`ExperimentRunner::allocate_output`].
    pub fn allocate_configured_output(&mut self) -> Result<PathBuf> {
        self.allocate_output(None, self.config.with_suffix)
    }

    fn experiment_name(&self, name_hint: Option<&str>) -> Option<String> {
        let non_empty = |s: &&str| !s.is_empty();

        name_hint
            .filter(non_empty)
            .or_else(|| self.config.name.as_deref().filter(non_empty))
            .map(str::to_string)
            .or_else(|| {
                let source = self.record.param_source()?;
                let leaves_cwd = source.is_absolute()
                    || source.components().any(|c| c == Component::ParentDir);
                let name = if leaves_cwd {
                    Path::new(source.file_name()?)
                } else {
                    source
                };
                Some(name.to_string_lossy().into_owned())
            })
    }

    /// Bind all metric streams to the results table file and attach the
    /// text log file, both inside the output directory.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` before [`ExperimentRunner::allocate_output`]
    /// or when called twice, and `Io` if the log file cannot be opened.
    pub fn wire_persistence(&mut self) -> Result<()> {
        let dir = self
            .record
            .output_path()
            .ok_or_else(|| {
                Error::Configuration("allocate_output must be called before wire_persistence".to_string())
            })?
            .to_path_buf();
        if self.persistence_wired {
            return Err(Error::Configuration("persistence is already wired".to_string()));
        }

        let results = dir.join(&self.config.results_file);
        let log_file = dir.join(&self.config.log.log_file);

        self.metrics.set_handler("*", Backend::TableFile(results.clone()));
        self.logging.attach_file(&log_file)?;
        self.persistence_wired = true;

        self.logging.in_scope(|| {
            info!(
                results = %results.display(),
                log_file = %log_file.display(),
                "persistence wired"
            );
        });
        Ok(())
    }

    /// Log the parameter file, output directory, numeric trainer
    /// hyperparameters and the model description.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if no trainer is bound.
    pub fn print_summary(&self) -> Result<()> {
        let trainer = self.trainer.as_deref().ok_or_else(trainer_not_set)?;

        self.logging.in_scope(|| {
            let param_file = self
                .record
                .param_source()
                .map_or_else(|| "-".to_string(), |p| p.display().to_string());
            let output_dir = self
                .record
                .output_path()
                .map_or_else(|| "-".to_string(), |p| p.display().to_string());

            info!("Parameter file:   {param_file}");
            info!("Output directory: {output_dir}");
            info!("-- Trainer hyperparameters --");
            for (name, value) in trainer.hyper_params() {
                if value.is_numeric() {
                    info!("  {name:>20}: {value}");
                }
            }
            info!("-- Model --");
            for (label, value) in trainer.model().describe() {
                info!("  {label:>20}: {value}");
            }
        });
        Ok(())
    }

    /// Verify a trainer is bound and that one of its epoch monitors persists
    /// model parameters; if none does, warn and append a
    /// [`ModelParamsMonitor`].
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if no trainer is bound.
    pub fn sanity_check(&mut self) -> Result<()> {
        let logging = self.logging.clone();
        logging.in_scope(|| self.check_trainer())
    }

    fn check_trainer(&mut self) -> Result<()> {
        let trainer = self.trainer.as_deref_mut().ok_or_else(trainer_not_set)?;

        let persists = trainer
            .epoch_monitors()
            .iter()
            .any(|m| m.persists_model_parameters());
        if !persists {
            warn!(
                "no epoch monitor persists model parameters; adding default {}",
                ModelParamsMonitor.name()
            );
            trainer
                .epoch_monitors_mut()
                .push(Box::new(ModelParamsMonitor));
        }
        Ok(())
    }

    /// Fresh run: sanity check, then load data, compile and learn.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if no trainer is bound, otherwise the first
    /// trainer or persistence error (the run is then marked `Failed`).
    pub fn run(&mut self) -> Result<()> {
        let logging = self.logging.clone();
        logging.in_scope(|| {
            self.check_trainer()?;
            self.record.start(None);
            let result = self.execute(None);
            self.finish(result)
        })
    }

    /// Resume from the table file at `checkpoint`.
    ///
    /// Every table in the checkpoint is replayed, row by row in stored order,
    /// into the live metrics log before the trainer runs, so new values are
    /// appended behind the old history. The model parameters are restored
    /// after `compile` and before `perform_learning`.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if no trainer is bound, `Storage` or
    /// `DataIntegrity` if the checkpoint is unreadable or corrupt, and
    /// trainer errors otherwise.
    pub fn continue_run<P: AsRef<Path>>(&mut self, checkpoint: P) -> Result<()> {
        let checkpoint = checkpoint.as_ref();
        let logging = self.logging.clone();
        logging.in_scope(|| {
            self.check_trainer()?;

            info!(path = %checkpoint.display(), "copying results from checkpoint");
            let table_file = TableFile::open(checkpoint)?;
            self.replay(&table_file)?;

            self.record.start(Some(checkpoint.to_path_buf()));
            let result = self.execute(Some(&table_file));
            self.finish(result)
        })
    }

    fn replay(&mut self, table_file: &TableFile) -> Result<()> {
        let mut rows = 0;
        for (name, observations) in table_file.iter() {
            for observation in observations {
                self.metrics.append(name, observation.clone())?;
            }
            rows += observations.len();
        }
        info!(tables = table_file.len(), rows, "replayed checkpoint metrics");
        Ok(())
    }

    fn execute(&mut self, checkpoint: Option<&TableFile>) -> Result<()> {
        let trainer = self.trainer.as_deref_mut().ok_or_else(trainer_not_set)?;

        info!("loading data");
        trainer.load_data()?;
        info!("compiling");
        trainer.compile()?;

        if let Some(checkpoint) = checkpoint {
            let params = checkpoint.model_parameters();
            info!(parameters = params.len(), "restoring model parameters");
            trainer.model_mut().restore_parameters(&params)?;
        }

        info!("performing learning");
        trainer.perform_learning(&mut self.metrics)?;
        self.metrics.flush()
    }

    fn finish(&mut self, result: Result<()>) -> Result<()> {
        match &result {
            Ok(()) => {
                self.record.complete(RunStatus::Success);
                info!("Finished");
            }
            Err(e) => {
                self.record.complete(RunStatus::Failed);
                error!(error = %e, "run failed");
                if self.persistence_wired {
                    if let Err(flush_err) = self.metrics.flush() {
                        error!(error = %flush_err, "could not persist metrics of failed run");
                    }
                }
            }
        }
        result
    }
}

fn trainer_not_set() -> Error {
    Error::Configuration("trainer not set".to_string())
}
