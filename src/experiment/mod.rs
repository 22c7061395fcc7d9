//! Experiment lifecycle
//!
//! ## Overview
//!
//! ```text
//! OutputDirectoryAllocator ──> output/<name>.<suffix>/
//!                                  ├── paramfile.<ext>
//!                                  ├── results.parquet   (MetricsLog, all streams)
//!                                  └── logfile.txt       (Logging file layer)
//!
//! ExperimentRunner ── drives ──> dyn Trainer ── model() ──> dyn Model
//!        │                            └─ epoch_monitors() ─> dyn EpochMonitor
//!        └── RunRecord (status, timestamps, checkpoint)
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use lab_runner::experiment::ExperimentRunner;
//! use lab_runner::logging::Logging;
//! # fn trainer() -> Box<dyn lab_runner::experiment::Trainer> { unimplemented!() }
//!
//! let mut runner = ExperimentRunner::new(Logging::file_only());
//! runner.set_trainer(trainer());
//! runner.allocate_output(Some("bars"), true)?;
//! runner.wire_persistence()?;
//! runner.print_summary()?;
//! runner.run()?;
//! # Ok::<(), lab_runner::Error>(())
//! ```

mod allocator;
mod run_record;
mod runner;
mod trainer;

pub use allocator::{
    current_suffix, derive_suffix, AllocationRequest, OutputDirectoryAllocator, JOB_ID_VARS,
    PARAM_FILE_COPY, TIMESTAMP_FORMAT,
};
pub use run_record::{RunRecord, RunStatus};
pub use runner::ExperimentRunner;
pub use trainer::{
    run_epoch_monitors, EpochMonitor, HyperParam, HyperParams, Model, ModelParamsMonitor, Trainer,
};
