//! Application logging facade over `tracing`.
//!
//! [`Logger`] turns a message plus [`LogParams`] (context, request id,
//! metadata) into a `tracing` event. Sensitive metadata is masked before it
//! is recorded. The events are rendered by the formats in [`format`] once
//! [`init_logging`] has installed the subscriber.

pub mod format;
mod init;

use serde_json::Value;
use tracing::{debug, error, info, trace, warn};

pub use format::{ConsoleFormat, FileFormat};
pub use init::{LoggingConfig, LoggingGuard, init_logger, init_logging, log_init_step};

/// Target used for every event emitted through [`Logger`].
pub const LOG_TARGET: &str = "backend_kit::app";

/// Metadata keys whose values are masked when truthy.
pub const SENSITIVE_KEYS: [&str; 5] = ["password", "token", "email", "creditCard", "username"];

/// Replacement for masked values.
pub const MASK: &str = "******";

/// Log levels exposed by the facade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    /// Failures
    Error,
    /// Unexpected but handled
    Warn,
    /// Lifecycle and request lines
    Info,
    /// Extra detail, recorded at DEBUG
    Verbose,
    /// Debugging detail
    Debug,
    /// Everything, recorded at TRACE
    Silly,
}

impl LogLevel {
    /// Lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Verbose => "verbose",
            Self::Debug => "debug",
            Self::Silly => "silly",
        }
    }

    /// The `tracing` level events are recorded at.
    #[must_use]
    pub const fn tracing_level(self) -> tracing::Level {
        match self {
            Self::Error => tracing::Level::ERROR,
            Self::Warn => tracing::Level::WARN,
            Self::Info => tracing::Level::INFO,
            Self::Verbose | Self::Debug => tracing::Level::DEBUG,
            Self::Silly => tracing::Level::TRACE,
        }
    }
}

/// Per-call logging parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogParams {
    /// Category such as `REQUEST`, `DATABASE` or `SYSTEM`
    pub context: Option<String>,
    /// Request the line belongs to
    pub request_id: Option<String>,
    /// Structured detail; masked before recording
    pub metadata: Option<Value>,
}

impl LogParams {
    /// Parameters with only a context.
    #[must_use]
    pub fn new(context: impl Into<String>) -> Self {
        Self {
            context: Some(context.into()),
            ..Self::default()
        }
    }

    /// Attach a request id.
    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Attach metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

impl From<&str> for LogParams {
    fn from(context: &str) -> Self {
        Self::new(context)
    }
}

impl From<String> for LogParams {
    fn from(context: String) -> Self {
        Self::new(context)
    }
}

/// Mask sensitive keys of a metadata object.
///
/// Only top-level keys are inspected, and only truthy values are replaced;
/// non-object values are returned unchanged.
///
/// ```
/// use backend_kit::logging::sanitize_metadata;
/// use serde_json::json;
///
/// let clean = sanitize_metadata(&json!({"token": "abc", "email": "", "id": 7}));
/// assert_eq!(clean, json!({"token": "******", "email": "", "id": 7}));
/// ```
#[must_use]
pub fn sanitize_metadata(metadata: &Value) -> Value {
    let Value::Object(map) = metadata else {
        return metadata.clone();
    };

    let mut masked = map.clone();
    for key in SENSITIVE_KEYS {
        if let Some(value) = masked.get_mut(key) {
            if is_truthy(value) {
                *value = Value::String(MASK.to_string());
            }
        }
    }
    Value::Object(masked)
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Logging facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct Logger;

impl Logger {
    /// Create a logger.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Record `message` at `level`.
    pub fn log_at(&self, level: LogLevel, message: &str, params: impl Into<LogParams>) {
        let params = params.into();
        let context = params.context.as_deref().unwrap_or_default();
        let request_id = params.request_id.as_deref().unwrap_or_default();
        let metadata = params
            .metadata
            .as_ref()
            .map(|m| sanitize_metadata(m).to_string())
            .unwrap_or_default();
        let log_level = level.as_str();

        macro_rules! emit {
            ($mac:ident) => {
                $mac!(
                    target: LOG_TARGET,
                    log_level,
                    context,
                    request_id,
                    metadata = %metadata,
                    "{message}"
                )
            };
        }

        match level {
            LogLevel::Error => emit!(error),
            LogLevel::Warn => emit!(warn),
            LogLevel::Info => emit!(info),
            LogLevel::Verbose | LogLevel::Debug => emit!(debug),
            LogLevel::Silly => emit!(trace),
        }
    }

    /// Info line; same as [`Logger::info`].
    pub fn log(&self, message: &str, params: impl Into<LogParams>) {
        self.log_at(LogLevel::Info, message, params);
    }

    /// Info line.
    pub fn info(&self, message: &str, params: impl Into<LogParams>) {
        self.log_at(LogLevel::Info, message, params);
    }

    /// Error line.
    pub fn error(&self, message: &str, params: impl Into<LogParams>) {
        self.log_at(LogLevel::Error, message, params);
    }

    /// Warning line.
    pub fn warn(&self, message: &str, params: impl Into<LogParams>) {
        self.log_at(LogLevel::Warn, message, params);
    }

    /// Warning line; same as [`Logger::warn`].
    pub fn warning(&self, message: &str, params: impl Into<LogParams>) {
        self.log_at(LogLevel::Warn, message, params);
    }

    /// Debug line.
    pub fn debug(&self, message: &str, params: impl Into<LogParams>) {
        self.log_at(LogLevel::Debug, message, params);
    }

    /// Verbose line.
    pub fn verbose(&self, message: &str, params: impl Into<LogParams>) {
        self.log_at(LogLevel::Verbose, message, params);
    }

    /// Most detailed line.
    pub fn silly(&self, message: &str, params: impl Into<LogParams>) {
        self.log_at(LogLevel::Silly, message, params);
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use parking_lot::Mutex;
    use std::io;
    use std::sync::Arc;
    use tracing_subscriber::fmt::MakeWriter;

    /// In-memory writer for capturing formatted output.
    #[derive(Clone, Default)]
    pub struct Capture(Arc<Mutex<Vec<u8>>>);

    impl Capture {
        pub fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock()).into_owned()
        }
    }

    impl io::Write for Capture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for Capture {
        type Writer = Self;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }
}
