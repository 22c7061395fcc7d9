//! # Lab-Runner: Experiment Lifecycle for Learning Runs
//!
//! **Version**: 0.1.0
//!
//! Lab-Runner gives every training run a collision-free output directory,
//! persists all metric streams to a single Parquet table file, mirrors the
//! run log to a text file, and resumes interrupted runs from their own
//! results file. It also ships the small datasets the runs train on.
//!
//! ## Design Principles (Toyota Way Aligned)
//!
//! - **Poka-Yoke safety**: Output directories are created atomically, never reused by accident
//! - **Jidoka**: Corrupt checkpoints stop the run instead of resuming silently
//! - **Genchi Genbutsu**: Every metric row carries its position; order is verified on read
//! - **Kaizen**: A resumed run appends to the history of the run it continues
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use lab_runner::config::ExperimentConfig;
//! use lab_runner::experiment::ExperimentRunner;
//! use lab_runner::logging::Logging;
//! # fn trainer() -> Box<dyn lab_runner::experiment::Trainer> { unimplemented!() }
//!
//! let config = ExperimentConfig::from_file("params/bars.json")?;
//! let logging = Logging::new(&config.log)?;
//! let mut runner = ExperimentRunner::from_config_file("params/bars.json", trainer(), logging)?;
//!
//! runner.allocate_output(None, true)?;
//! runner.wire_persistence()?;
//! runner.continue_run("output/bars.json.j41/results.parquet")?;
//! # Ok::<(), lab_runner::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod config;
pub mod dataset;
pub mod error;
pub mod experiment;
pub mod logging;
pub mod metrics;
pub mod storage;

pub use error::{Error, Result};
