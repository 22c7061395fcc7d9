//! Metrics Log - append-only named metric streams
//!
//! Every appended observation is kept in memory, in append order, per stream.
//! Handlers bind stream-name patterns to backends; table-file backends are
//! persisted on [`MetricsLog::flush`].
//!
//! ## Flush cost
//!
//! A flush rewrites each table file with the complete history, so its cost
//! grows with `epochs × rows per epoch`. With
//! [`ModelParamsMonitor`](crate::experiment::ModelParamsMonitor) every epoch
//! adds a full copy of the model parameters. For large models, route
//! `model.*` to [`Backend::Memory`] or a separate file, or log parameters
//! every few epochs from a custom monitor.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::Observation;
use crate::storage::TableFile;
use crate::{Error, Result};

/// Where a matched metric stream goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    /// Persist to a named-table file on flush.
    TableFile(PathBuf),
    /// Keep in memory only.
    Memory,
    /// Echo every observation through `tracing` at INFO.
    Text,
}

#[derive(Debug, Clone)]
struct Handler {
    pattern: String,
    backend: Backend,
}

/// Check whether `name` matches a handler pattern.
///
/// Patterns are `*` (every stream), `prefix*`, or an exact stream name.
#[must_use]
pub fn pattern_matches(pattern: &str, name: &str) -> bool {
    pattern
        .strip_suffix('*')
        .map_or(pattern == name, |prefix| name.starts_with(prefix))
}

/// Append-only log of named metric streams.
///
/// ## Ordering
///
/// [`MetricsLog::table`] returns observations in exactly the order they were
/// appended. Resuming a run relies on this: a checkpoint's rows are replayed
/// first, then the new run keeps appending behind them.
#[derive(Debug, Default)]
pub struct MetricsLog {
    tables: BTreeMap<String, Vec<Observation>>,
    handlers: Vec<Handler>,
}

impl MetricsLog {
    /// Create an empty log with no handlers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind all streams matching `pattern` to `backend`.
    ///
    /// A stream is routed to the first handler whose pattern matches it.
    pub fn set_handler(&mut self, pattern: impl Into<String>, backend: Backend) {
        let pattern = pattern.into();
        debug!(%pattern, ?backend, "binding metric handler");
        self.handlers.push(Handler { pattern, backend });
    }

    /// Append one observation to the stream `name`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if `name` is empty.
    pub fn append(&mut self, name: &str, observation: impl Into<Observation>) -> Result<()> {
        if name.is_empty() {
            return Err(Error::InvalidInput("metric name must not be empty".to_string()));
        }
        let observation = observation.into();

        if matches!(self.backend_for(name), Some(Backend::Text)) {
            info!(target: "metrics", "{name} = {observation}");
        }

        self.tables
            .entry(name.to_string())
            .or_default()
            .push(observation);
        Ok(())
    }

    /// Observations of one stream, in append order.
    #[must_use]
    pub fn table(&self, name: &str) -> Option<&[Observation]> {
        self.tables.get(name).map(Vec::as_slice)
    }

    /// Names of all streams.
    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    /// Total number of observations across all streams.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.tables.values().map(Vec::len).sum()
    }

    /// Check if nothing has been appended.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Table-file destinations currently bound.
    pub fn table_file_paths(&self) -> impl Iterator<Item = &Path> {
        self.handlers.iter().filter_map(|h| match &h.backend {
            Backend::TableFile(path) => Some(path.as_path()),
            _ => None,
        })
    }

    /// Persist every stream routed to a table-file backend.
    ///
    /// Each table file is rewritten with the complete history of its streams.
    ///
    /// # Errors
    ///
    /// Returns error if a table file cannot be written.
    pub fn flush(&self) -> Result<()> {
        let mut routed: BTreeMap<&Path, Vec<(&str, &[Observation])>> = BTreeMap::new();

        for handler in &self.handlers {
            if let Backend::TableFile(path) = &handler.backend {
                routed.entry(path.as_path()).or_default();
            }
        }

        for (name, rows) in &self.tables {
            if let Some(Backend::TableFile(path)) = self.backend_for(name) {
                routed
                    .entry(path.as_path())
                    .or_default()
                    .push((name.as_str(), rows.as_slice()));
            }
        }

        for (path, tables) in routed {
            TableFile::write(path, tables)?;
        }
        Ok(())
    }

    fn backend_for(&self, name: &str) -> Option<&Backend> {
        self.handlers
            .iter()
            .find(|h| pattern_matches(&h.pattern, name))
            .map(|h| &h.backend)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_matching() {
        assert!(pattern_matches("*", "loss"));
        assert!(pattern_matches("model.*", "model.W0"));
        assert!(!pattern_matches("model.*", "loss"));
        assert!(pattern_matches("loss", "loss"));
        assert!(!pattern_matches("loss", "loss.valid"));
    }

    #[test]
    fn test_append_preserves_order() {
        let mut log = MetricsLog::new();
        for v in [3.0, 1.0, 2.0] {
            log.append("loss", v).unwrap();
        }

        let values: Vec<f64> = log
            .table("loss")
            .unwrap()
            .iter()
            .filter_map(Observation::as_scalar)
            .collect();
        assert_eq!(values, vec![3.0, 1.0, 2.0]);
        assert_eq!(log.row_count(), 3);
    }

    #[test]
    fn test_append_rejects_empty_name() {
        let mut log = MetricsLog::new();
        assert!(log.append("", 1.0).is_err());
        assert!(log.is_empty());
    }

    #[test]
    fn test_flush_routes_to_first_matching_handler() {
        let dir = tempfile::tempdir().unwrap();
        let params = dir.path().join("params.parquet");
        let results = dir.path().join("results.parquet");

        let mut log = MetricsLog::new();
        log.set_handler("model.*", Backend::TableFile(params.clone()));
        log.set_handler("*", Backend::TableFile(results.clone()));
        log.append("model.W", vec![1.0, 2.0]).unwrap();
        log.append("loss", 0.5).unwrap();
        log.flush().unwrap();

        let params = TableFile::open(&params).unwrap();
        let results = TableFile::open(&results).unwrap();
        assert_eq!(params.table_names().collect::<Vec<_>>(), vec!["model.W"]);
        assert_eq!(results.table_names().collect::<Vec<_>>(), vec!["loss"]);
    }

    #[test]
    fn test_text_backend_echoes_to_log_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logfile.txt");
        let logging = crate::logging::Logging::file_only();
        logging.attach_file(&path).unwrap();

        let mut log = MetricsLog::new();
        log.set_handler("*", Backend::Text);
        logging.in_scope(|| log.append("loss", 0.5)).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("loss = 0.5"), "log was: {contents}");
        assert!(contents.contains("metrics"), "log was: {contents}");
        assert_eq!(log.table("loss").unwrap().len(), 1);
    }

    #[test]
    fn test_flush_without_handlers_is_noop() {
        let mut log = MetricsLog::new();
        log.set_handler("*", Backend::Memory);
        log.append("loss", 0.5).unwrap();
        assert!(log.flush().is_ok());
        assert_eq!(log.table_file_paths().count(), 0);
    }
}
