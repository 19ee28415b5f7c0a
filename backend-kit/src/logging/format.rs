//! Line formats for the console and the log files.
//!
//! Both formats read the fields written by [`Logger`](super::Logger)
//! (`log_level`, `context`, `request_id`, `metadata`). Events from plain
//! `tracing` macros work too; their extra fields become metadata.

use serde_json::{Map, Value};
use std::fmt;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;

const RESET: &str = "\x1b[0m";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Fields extracted from one event.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventRecord {
    /// Lowercase level name (`info`, `verbose`, ...)
    pub level: String,
    /// Rendered message
    pub message: String,
    /// Context, empty when absent
    pub context: String,
    /// Request id, empty when absent
    pub request_id: String,
    /// Remaining structured fields
    pub metadata: Map<String, Value>,
}

impl EventRecord {
    /// Collect the fields of an event.
    #[must_use]
    pub fn from_event(event: &Event<'_>) -> Self {
        let mut record = Self::default();
        event.record(&mut RecordVisitor(&mut record));
        if record.level.is_empty() {
            record.level = event.metadata().level().as_str().to_lowercase();
        }
        record
    }
}

struct RecordVisitor<'a>(&'a mut EventRecord);

impl RecordVisitor<'_> {
    fn store_text(&mut self, name: &str, text: String) {
        match name {
            "message" => self.0.message = text,
            "log_level" => self.0.level = text,
            "context" => self.0.context = text,
            "request_id" => self.0.request_id = text,
            "metadata" if text.is_empty() => {}
            "metadata" => match serde_json::from_str::<Value>(&text) {
                Ok(Value::Object(map)) => self.0.metadata.extend(map),
                Ok(other) => {
                    self.0.metadata.insert(name.to_string(), other);
                }
                Err(_) => {
                    self.0.metadata.insert(name.to_string(), Value::String(text));
                }
            },
            _ => {
                self.0.metadata.insert(name.to_string(), Value::String(text));
            }
        }
    }
}

impl Visit for RecordVisitor<'_> {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.store_text(field.name(), value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.store_text(field.name(), format!("{value:?}"));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.0.metadata.insert(field.name().to_string(), value.into());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.0.metadata.insert(field.name().to_string(), value.into());
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.0.metadata.insert(field.name().to_string(), value.into());
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.0.metadata.insert(field.name().to_string(), value.into());
    }
}

/// ANSI color for a level name.
#[must_use]
pub fn level_color(level: &str) -> &'static str {
    match level {
        "error" => "\x1b[31m",
        "warn" => "\x1b[33m",
        "info" => "\x1b[36m",
        "debug" => "\x1b[35m",
        "verbose" => "\x1b[37m",
        "silly" | "trace" => "\x1b[90m",
        _ => RESET,
    }
}

/// Icon shown before console lines of a context.
#[must_use]
pub fn context_icon(context: &str) -> &'static str {
    match context {
        "REQUEST" => "🌐",
        "RESPONSE" => "📤",
        "ERROR" => "❌",
        "DATABASE" => "🗄️",
        "AUTH" => "🔐",
        "API" => "🔌",
        "SYSTEM" => "⚙️",
        "PERFORMANCE" => "⚡",
        "SECURITY" => "🛡️",
        "SERVER" => "🚀",
        "LOGGER_INIT" => "📝",
        _ => "📄",
    }
}

/// Render a console line.
#[must_use]
pub fn render_console(record: &EventRecord, timestamp: &str, ansi: bool) -> String {
    let (color, reset) = if ansi {
        (level_color(&record.level), RESET)
    } else {
        ("", "")
    };
    let icon = context_icon(&record.context);
    let level = record.level.to_uppercase();
    let context = if record.context.is_empty() {
        String::new()
    } else {
        format!("[{}]", record.context)
    };
    let request_id = if record.request_id.is_empty() {
        String::new()
    } else {
        format!("({})", record.request_id)
    };

    let mut metadata = String::new();
    if !record.metadata.is_empty() {
        let pretty = serde_json::to_string_pretty(&record.metadata).unwrap_or_default();
        let indented = pretty
            .lines()
            .enumerate()
            .map(|(i, line)| if i == 0 { line.to_string() } else { format!("     {line}") })
            .collect::<Vec<_>>()
            .join("\n");
        metadata = format!("\n  📋 {reset}{indented}");
    }

    format!(
        "{color}{icon} {timestamp} {level:<7}{reset} {context:<12}{request_id} {}{metadata}{reset}",
        record.message
    )
}

/// Render a file line: `ts::LEVEL::context::request_id::message::metadata`.
#[must_use]
pub fn render_file(record: &EventRecord, timestamp: &str) -> String {
    format!(
        "{timestamp}::{}::{}::{}::{}::{}",
        record.level.to_uppercase(),
        record.context,
        record.request_id,
        record.message,
        Value::Object(record.metadata.clone())
    )
}

fn now() -> String {
    chrono::Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Colorized, human-oriented console format.
///
/// Colors are emitted only when the layer has ANSI enabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleFormat;

impl<S, N> FormatEvent<S, N> for ConsoleFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let record = EventRecord::from_event(event);
        let ansi = writer.has_ansi_escapes();
        writeln!(writer, "{}", render_console(&record, &now(), ansi))
    }
}

/// Plain `::`-separated format for log files.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileFormat;

impl<S, N> FormatEvent<S, N> for FileFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let record = EventRecord::from_event(event);
        writeln!(writer, "{}", render_file(&record, &now()))
    }
}
