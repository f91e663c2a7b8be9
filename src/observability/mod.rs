//! Logging setup.
//!
//! The library only emits `tracing` events and `metrics` counters. Binaries
//! call [`init_logging`] once to install a subscriber; no metrics exporter is
//! installed here.

use crate::config::LoggingSettings;
use crate::{Error, Result};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Default filter directive when neither env var nor config sets one.
const DEFAULT_FILTER: &str = "info";

static LOGGING_INIT: OnceLock<()> = OnceLock::new();

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable multi-line output.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

impl LogFormat {
    /// Parses a format name, defaulting to pretty.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Pretty
        }
    }
}

/// Resolved logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Output format.
    pub format: LogFormat,
    /// Log file; stderr when `None`.
    pub file: Option<PathBuf>,
    /// `EnvFilter` directive.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Pretty,
            file: None,
            filter: DEFAULT_FILTER.to_string(),
        }
    }
}

impl LoggingConfig {
    /// Builds the configuration from file settings and the environment.
    ///
    /// The filter comes from `REFCONTEXT_LOG`, then `RUST_LOG`, then the
    /// settings, then `debug` when `verbose` or `info` otherwise.
    /// `REFCONTEXT_LOG_FORMAT` and `REFCONTEXT_LOG_FILE` override the
    /// settings.
    #[must_use]
    pub fn from_settings(settings: &LoggingSettings, verbose: bool) -> Self {
        let env_filter = std::env::var("REFCONTEXT_LOG")
            .or_else(|_| std::env::var("RUST_LOG"))
            .ok();
        Self::resolve(
            settings,
            verbose,
            env_filter,
            std::env::var("REFCONTEXT_LOG_FORMAT").ok(),
            std::env::var("REFCONTEXT_LOG_FILE").ok(),
        )
    }

    fn resolve(
        settings: &LoggingSettings,
        verbose: bool,
        env_filter: Option<String>,
        env_format: Option<String>,
        env_file: Option<String>,
    ) -> Self {
        let fallback = if verbose { "debug" } else { DEFAULT_FILTER };
        let filter = env_filter
            .or_else(|| settings.filter.clone())
            .filter(|f| !f.trim().is_empty())
            .unwrap_or_else(|| fallback.to_string());
        let format = env_format
            .or_else(|| settings.format.clone())
            .map(|f| LogFormat::parse(&f))
            .unwrap_or_default();
        let file = env_file
            .or_else(|| settings.file.clone())
            .filter(|f| !f.trim().is_empty())
            .map(PathBuf::from);

        Self {
            format,
            file,
            filter,
        }
    }

    /// Sets the format.
    #[must_use]
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }
}

/// Installs the global `tracing` subscriber.
///
/// # Errors
///
/// Returns an error if logging was already initialized, the filter does not
/// parse, or the log file cannot be opened.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    if LOGGING_INIT.get().is_some() {
        return Err(Error::OperationFailed {
            operation: "logging_init".to_string(),
            cause: "logging already initialized".to_string(),
        });
    }

    let filter = EnvFilter::try_new(&config.filter).map_err(|e| Error::InvalidInput(format!(
        "invalid log filter '{}': {e}",
        config.filter
    )))?;

    match (&config.file, config.format) {
        (Some(path), LogFormat::Json) => tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(open_log_file(path)?)
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_target(true),
            )
            .with(filter)
            .try_init(),
        (Some(path), LogFormat::Pretty) => tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(open_log_file(path)?)
                    .with_ansi(false)
                    .with_target(true),
            )
            .with(filter)
            .try_init(),
        (None, LogFormat::Json) => tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(io::stderr)
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_target(true),
            )
            .with(filter)
            .try_init(),
        (None, LogFormat::Pretty) => tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .pretty()
                    .with_writer(io::stderr)
                    .with_target(true),
            )
            .with(filter)
            .try_init(),
    }
    .map_err(|e| Error::OperationFailed {
        operation: "logging_init".to_string(),
        cause: e.to_string(),
    })?;

    LOGGING_INIT.set(()).map_err(|()| Error::OperationFailed {
        operation: "logging_init".to_string(),
        cause: "failed to mark logging initialized".to_string(),
    })
}

/// Thread-safe file writer for logging.
#[derive(Clone)]
struct LogFileWriter {
    file: Arc<Mutex<File>>,
}

impl Write for LogFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut guard = self
            .file
            .lock()
            .map_err(|e| io::Error::other(e.to_string()))?;
        guard.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut guard = self
            .file
            .lock()
            .map_err(|e| io::Error::other(e.to_string()))?;
        guard.flush()
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for LogFileWriter {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Opens a log file for appending, creating parent directories.
fn open_log_file(path: &Path) -> Result<LogFileWriter> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| Error::OperationFailed {
            operation: "create_log_dir".to_string(),
            cause: e.to_string(),
        })?;
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| Error::OperationFailed {
            operation: "open_log_file".to_string(),
            cause: format!("{}: {e}", path.display()),
        })?;

    Ok(LogFileWriter {
        file: Arc::new(Mutex::new(file)),
    })
}
