//! Global subscriber setup.

use serde_json::json;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use super::format::{ConsoleFormat, FileFormat};
use super::{LogParams, Logger};
use crate::config::{self, ConfigError};
use crate::error::{KitError, KitResult};

/// Environment variable reported as `env` in the startup line.
pub const ENVIRONMENT_VAR: &str = "NODE_ENV";

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    pub log_level: String,
    /// Emit JSON to the console instead of the colorized format
    pub json_output: bool,
    /// Colorize the console
    pub ansi: bool,
    /// Directory for rotated files; no files are written when unset
    pub log_dir: Option<PathBuf>,
    /// File name prefix
    pub file_prefix: String,
    /// Rotated files kept per sink
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_output: false,
            ansi: true,
            log_dir: None,
            file_prefix: "application".to_string(),
            max_files: 14,
        }
    }
}

impl LoggingConfig {
    /// Loads `LOG_LEVEL`, `LOG_JSON` and `LOG_DIR`.
    ///
    /// # Errors
    ///
    /// Returns an error if `LOG_JSON` is not a boolean.
    pub fn from_env() -> Result<Self, ConfigError> {
        config::load_dotenv();
        let defaults = Self::default();
        Ok(Self {
            log_level: config::string_env("LOG_LEVEL", &defaults.log_level),
            json_output: config::parse_env("LOG_JSON", defaults.json_output)?,
            log_dir: config::optional_env("LOG_DIR").map(PathBuf::from),
            ..defaults
        })
    }

    /// Set the default filter directive.
    #[must_use]
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Enable JSON console output.
    #[must_use]
    pub const fn with_json_output(mut self) -> Self {
        self.json_output = true;
        self
    }

    /// Write rotated files under `dir`.
    #[must_use]
    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(dir.into());
        self
    }

    /// Disable console colors.
    #[must_use]
    pub const fn without_ansi(mut self) -> Self {
        self.ansi = false;
        self
    }
}

/// Keeps the file writers flushing; drop it at shutdown.
#[must_use = "dropping the guard stops file logging"]
pub struct LoggingGuard {
    _guards: Vec<WorkerGuard>,
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

fn file_appender(config: &LoggingConfig, dir: &Path, suffix: &str) -> KitResult<RollingFileAppender> {
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(&config.file_prefix)
        .filename_suffix(suffix)
        .max_log_files(config.max_files)
        .build(dir)
        .map_err(|e| KitError::Internal(format!("log file setup failed: {e}")))
}

/// Install the global subscriber.
///
/// The console always logs; with a `log_dir`, `<prefix>.<date>.info.log`
/// receives INFO and above and `<prefix>.<date>.error.log` ERROR only.
///
/// # Errors
///
/// Returns an error if the log directory cannot be used or a global
/// subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> KitResult<LoggingGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let mut layers: Vec<BoxedLayer> = Vec::new();
    let mut guards = Vec::new();

    if config.json_output {
        layers.push(tracing_subscriber::fmt::layer().json().boxed());
    } else {
        layers.push(
            tracing_subscriber::fmt::layer()
                .with_ansi(config.ansi)
                .event_format(ConsoleFormat)
                .boxed(),
        );
    }

    if let Some(dir) = &config.log_dir {
        for (suffix, level) in [("info.log", LevelFilter::INFO), ("error.log", LevelFilter::ERROR)] {
            let (writer, guard) = tracing_appender::non_blocking(file_appender(config, dir, suffix)?);
            guards.push(guard);
            layers.push(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(writer)
                    .event_format(FileFormat)
                    .with_filter(level)
                    .boxed(),
            );
        }
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .map_err(|e| KitError::Internal(format!("logging already initialized: {e}")))?;

    Ok(LoggingGuard { _guards: guards })
}

/// Install the subscriber and announce it.
///
/// # Errors
///
/// See [`init_logging`].
pub fn init_logger(config: &LoggingConfig) -> KitResult<(Logger, LoggingGuard)> {
    let guard = init_logging(config)?;
    let logger = Logger::new();
    logger.info(
        "Logger initialized",
        LogParams::new("LOGGER_INIT").with_metadata(json!({
            "pid": std::process::id(),
            "env": std::env::var(ENVIRONMENT_VAR).ok(),
        })),
    );
    Ok((logger, guard))
}

/// Log a startup step under the `SYSTEM` context.
pub fn log_init_step(logger: &Logger, step: &str, metadata: serde_json::Value) {
    logger.info(step, LogParams::new("SYSTEM").with_metadata(metadata));
}
