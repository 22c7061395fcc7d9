//! Logging handle
//!
//! A [`Logging`] value is created once at startup and handed to the
//! experiment runner. It owns a `tracing` dispatcher with two layers:
//!
//! - console: stderr, filtered by the configured level (`RUST_LOG` overrides)
//! - log file: INFO and above, `HH:MM:SS` timestamp and module target, written
//!   to whatever file is currently attached (nothing until one is)
//!
//! Code runs under the handle with [`Logging::in_scope`]; no global
//! subscriber is needed unless a binary asks for one.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

use tracing::level_filters::LevelFilter;
use tracing::Dispatch;
use tracing_subscriber::fmt::{self, time::ChronoLocal, MakeWriter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::LogConfig;
use crate::{Error, Result};

/// Timestamp format of the text log file.
pub const LOG_TIME_FORMAT: &str = "%H:%M:%S";

/// Shared slot holding the attached log file.
#[derive(Debug, Clone, Default)]
struct LogFileSlot {
    file: Arc<Mutex<Option<File>>>,
}

/// Writer handed to the fmt layer; discards output while no file is attached.
#[derive(Debug)]
pub struct LogFileWriter {
    file: Arc<Mutex<Option<File>>>,
}

impl Write for LogFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut guard = self
            .file
            .lock()
            .map_err(|_| io::Error::other("log file lock poisoned"))?;
        match guard.as_mut() {
            Some(file) => file.write(buf),
            None => Ok(buf.len()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut guard = self
            .file
            .lock()
            .map_err(|_| io::Error::other("log file lock poisoned"))?;
        guard.as_mut().map_or(Ok(()), File::flush)
    }
}

impl<'a> MakeWriter<'a> for LogFileSlot {
    type Writer = LogFileWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LogFileWriter {
            file: Arc::clone(&self.file),
        }
    }
}

/// Explicit logging handle threaded through the experiment runner.
#[derive(Debug, Clone)]
pub struct Logging {
    dispatch: Dispatch,
    slot: LogFileSlot,
}

impl Logging {
    /// Build the handle from a log configuration.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if the level cannot be parsed.
    pub fn new(config: &LogConfig) -> Result<Self> {
        let level = config.level_filter()?;
        let console = EnvFilter::builder()
            .with_default_directive(level.into())
            .from_env_lossy();
        Ok(Self::build(console))
    }

    /// Handle with the console layer switched off; only the attached log
    /// file receives output.
    #[must_use]
    pub fn file_only() -> Self {
        Self::build(EnvFilter::new("off"))
    }

    fn build(console: EnvFilter) -> Self {
        let slot = LogFileSlot::default();

        let subscriber = tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(io::stderr)
                    .with_filter(console),
            )
            .with(
                fmt::layer()
                    .with_ansi(false)
                    .with_timer(ChronoLocal::new(LOG_TIME_FORMAT.to_string()))
                    .with_target(true)
                    .with_writer(slot.clone())
                    .with_filter(LevelFilter::INFO),
            );

        Self {
            dispatch: Dispatch::new(subscriber),
            slot,
        }
    }

    /// Direct the file layer to `path` (created, or appended to if it exists).
    ///
    /// # Errors
    ///
    /// Returns `Io` if the file cannot be opened.
    pub fn attach_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())?;
        let mut guard = self
            .slot
            .file
            .lock()
            .map_err(|_| Error::Configuration("log file lock poisoned".to_string()))?;
        *guard = Some(file);
        Ok(())
    }

    /// Check whether a log file is attached.
    #[must_use]
    pub fn has_file(&self) -> bool {
        self.slot
            .file
            .lock()
            .map(|guard| guard.is_some())
            .unwrap_or(false)
    }

    /// Run `f` with this handle as the current dispatcher.
    pub fn in_scope<T>(&self, f: impl FnOnce() -> T) -> T {
        tracing::dispatcher::with_default(&self.dispatch, f)
    }

    /// Install this handle as the process-wide default (for binaries).
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if a global default is already set.
    pub fn install_global(&self) -> Result<()> {
        tracing::dispatcher::set_global_default(self.dispatch.clone())
            .map_err(|e| Error::Configuration(format!("cannot install global logger: {e}")))
    }

    /// Underlying dispatcher.
    #[must_use]
    pub const fn dispatch(&self) -> &Dispatch {
        &self.dispatch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_layer_writes_after_attach() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logfile.txt");
        let logging = Logging::file_only();

        logging.in_scope(|| tracing::info!("before attach"));
        assert!(!logging.has_file());

        logging.attach_file(&path).unwrap();
        logging.in_scope(|| {
            tracing::info!("after attach");
            tracing::debug!("too verbose for the file");
        });

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("after attach"));
        assert!(contents.contains("lab_runner::logging"));
        assert!(!contents.contains("before attach"));
        assert!(!contents.contains("too verbose"));
    }

    #[test]
    fn test_new_rejects_bad_level() {
        let config = LogConfig {
            level: "shouty".to_string(),
            ..LogConfig::default()
        };
        assert!(Logging::new(&config).is_err());
    }
}
