//! Trainer contract
//!
//! The learning algorithm lives outside this crate. The runner drives it
//! through these traits:
//!
//! ```text
//! Trainer ── model() ──────────> Model (parameters, restore, describe)
//!         └─ epoch_monitors() ─> [Box<dyn EpochMonitor>]
//! ```

use std::collections::BTreeMap;
use std::fmt;

use crate::metrics::{MetricsLog, Observation};
use crate::storage::{ModelParameters, PARAMETER_PREFIX};
use crate::Result;

/// A reported hyperparameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum HyperParam {
    /// Integer value (batch size, sample count, ...).
    Int(i64),
    /// Float value (learning rate, discount, ...).
    Float(f64),
    /// Boolean flag.
    Bool(bool),
    /// Free-form text; not shown in the run summary.
    Text(String),
}

impl HyperParam {
    /// Check whether this value is numeric.
    #[must_use]
    pub const fn is_numeric(&self) -> bool {
        matches!(self, Self::Int(_) | Self::Float(_))
    }
}

impl fmt::Display for HyperParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
        }
    }
}

impl From<i64> for HyperParam {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for HyperParam {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for HyperParam {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for HyperParam {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

/// Hyperparameters by name.
pub type HyperParams = BTreeMap<String, HyperParam>;

/// The trained model.
pub trait Model {
    /// Current parameters, by name.
    fn parameters(&self) -> Vec<(String, Observation)>;

    /// Replace the parameters with values restored from a checkpoint.
    ///
    /// # Errors
    ///
    /// Implementations return `DataIntegrity` when a parameter is missing or
    /// has the wrong shape.
    fn restore_parameters(&mut self, params: &ModelParameters) -> Result<()>;

    /// `(label, value)` lines for the run summary.
    fn describe(&self) -> Vec<(String, String)> {
        Vec::new()
    }
}

/// Called once per epoch by the trainer.
pub trait EpochMonitor: fmt::Debug {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Whether this monitor persists the model parameters.
    fn persists_model_parameters(&self) -> bool {
        false
    }

    /// Observe the model after `epoch`.
    ///
    /// # Errors
    ///
    /// Returns error if logging or persistence fails.
    fn on_epoch(&mut self, epoch: usize, model: &dyn Model, log: &mut MetricsLog) -> Result<()>;
}

/// Logs every model parameter under `model.<name>` and flushes the log, so
/// the results file is a usable checkpoint after each epoch.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModelParamsMonitor;

impl EpochMonitor for ModelParamsMonitor {
    fn name(&self) -> &str {
        "model-params"
    }

    fn persists_model_parameters(&self) -> bool {
        true
    }

    fn on_epoch(&mut self, _epoch: usize, model: &dyn Model, log: &mut MetricsLog) -> Result<()> {
        for (name, value) in model.parameters() {
            log.append(&format!("{PARAMETER_PREFIX}{name}"), value)?;
        }
        log.flush()
    }
}

/// Run every monitor for one epoch, in order.
///
/// # Errors
///
/// Returns the first monitor error.
pub fn run_epoch_monitors(
    monitors: &mut [Box<dyn EpochMonitor>],
    epoch: usize,
    model: &dyn Model,
    log: &mut MetricsLog,
) -> Result<()> {
    for monitor in monitors {
        monitor.on_epoch(epoch, model, log)?;
    }
    Ok(())
}

/// The learning algorithm driven by the experiment runner.
///
/// The runner always calls `load_data`, then `compile`, then (when
/// resuming) restores the model, then `perform_learning`.
pub trait Trainer {
    /// Load training and monitoring data.
    ///
    /// # Errors
    ///
    /// Returns error if a dataset cannot be loaded.
    fn load_data(&mut self) -> Result<()>;

    /// Build whatever the learning loop needs; data is loaded at this point.
    ///
    /// # Errors
    ///
    /// Returns error if compilation fails.
    fn compile(&mut self) -> Result<()>;

    /// Run the learning loop, appending metrics to `log`.
    ///
    /// # Errors
    ///
    /// Returns error if learning fails.
    fn perform_learning(&mut self, log: &mut MetricsLog) -> Result<()>;

    /// The model being trained.
    fn model(&self) -> &dyn Model;

    /// Mutable access to the model (parameter restore).
    fn model_mut(&mut self) -> &mut dyn Model;

    /// Monitors invoked after every epoch.
    fn epoch_monitors(&self) -> &[Box<dyn EpochMonitor>];

    /// Mutable monitor list (the runner may append a default monitor).
    fn epoch_monitors_mut(&mut self) -> &mut Vec<Box<dyn EpochMonitor>>;

    /// Hyperparameters for the run summary.
    fn hyper_params(&self) -> HyperParams {
        HyperParams::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Bias(Vec<f64>);

    impl Model for Bias {
        fn parameters(&self) -> Vec<(String, Observation)> {
            vec![("b".to_string(), Observation::from(self.0.clone()))]
        }

        fn restore_parameters(&mut self, params: &ModelParameters) -> Result<()> {
            if let Some(b) = params.get("b") {
                self.0 = b.values().to_vec();
            }
            Ok(())
        }
    }

    #[test]
    fn test_model_params_monitor_logs_prefixed_tables() {
        let model = Bias(vec![0.1, 0.2]);
        let mut log = MetricsLog::new();
        let mut monitors: Vec<Box<dyn EpochMonitor>> = vec![Box::new(ModelParamsMonitor)];

        run_epoch_monitors(&mut monitors, 0, &model, &mut log).unwrap();
        run_epoch_monitors(&mut monitors, 1, &model, &mut log).unwrap();

        assert_eq!(log.table("model.b").unwrap().len(), 2);
        assert!(monitors[0].persists_model_parameters());
    }

    #[test]
    fn test_hyper_param_numeric() {
        assert!(HyperParam::from(10_i64).is_numeric());
        assert!(HyperParam::from(1e-3).is_numeric());
        assert!(!HyperParam::from(true).is_numeric());
        assert!(!HyperParam::from("sbn").is_numeric());
        assert_eq!(HyperParam::from(0.5).to_string(), "0.5");
    }
}
