//! Metric streams for experiment runs
//!
//! ## Overview
//!
//! ```text
//! MetricsLog ──< stream "loss"      : [Observation, Observation, ...]
//!            ──< stream "model.W0"  : [Observation, ...]
//!            ──> handlers: pattern → Backend (TableFile | Memory | Text)
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use lab_runner::metrics::{Backend, MetricsLog};
//!
//! let mut log = MetricsLog::new();
//! log.set_handler("*", Backend::Memory);
//!
//! log.append("loss", 0.9)?;
//! log.append("loss", 0.8)?;
//!
//! assert_eq!(log.table("loss").map(<[_]>::len), Some(2));
//! # Ok::<(), lab_runner::Error>(())
//! ```

mod log;
mod observation;

pub use log::{pattern_matches, Backend, MetricsLog};
pub use observation::Observation;
