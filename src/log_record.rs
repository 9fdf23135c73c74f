//! Default record type shipped by the handler.
//!
//! The delivery pipeline never inspects records; it hands them to a
//! [`FrameEncoder`](crate::socket_handler::FrameEncoder). `LogRecord` is the
//! record understood by the bundled JSON encoder and carries the context a
//! Logstash pipeline usually indexes: logger name, level, source location,
//! timestamp, thread and free-form key/values.

use std::collections::BTreeMap;
use std::fmt;
use std::thread;
use std::time::SystemTime;

use crate::level::Level;

/// Additional context associated with a log record.
#[derive(Clone, Debug)]
pub struct RecordMetadata {
    /// Rust module path where the log call originated.
    pub module_path: String,
    /// Source file name for the log call.
    pub filename: String,
    /// Line number in the source file.
    pub line_number: u32,
    /// Time the record was created.
    pub timestamp: SystemTime,
    /// Name of the thread that created the record (if any).
    pub thread_name: Option<String>,
    /// Structured key-value pairs attached to the record.
    pub key_values: BTreeMap<String, String>,
}

impl Default for RecordMetadata {
    fn default() -> Self {
        Self {
            module_path: String::new(),
            filename: String::new(),
            line_number: 0,
            timestamp: SystemTime::now(),
            thread_name: thread::current().name().map(ToString::to_string),
            key_values: BTreeMap::new(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct LogRecord {
    /// Name of the logger that created this record.
    pub logger: String,
    pub level: Level,
    /// The log message content.
    pub message: String,
    /// Contextual metadata for the record.
    pub metadata: RecordMetadata,
}

impl LogRecord {
    /// Construct a new log record from logger `name`, `level`, and `message`.
    pub fn new(logger: &str, level: Level, message: &str) -> Self {
        Self {
            logger: logger.to_owned(),
            level,
            message: message.to_owned(),
            metadata: RecordMetadata::default(),
        }
    }

    /// Construct a log record with explicit source location and key-values.
    pub fn with_metadata(logger: &str, level: Level, message: &str, metadata: RecordMetadata) -> Self {
        Self {
            logger: logger.to_owned(),
            level,
            message: message.to_owned(),
            metadata,
        }
    }

    /// Attach a structured key/value pair.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.key_values.insert(key.into(), value.into());
        self
    }

    /// Build a record from a `log` crate record, capturing its source location.
    pub fn from_log(record: &log::Record<'_>) -> Self {
        let metadata = RecordMetadata {
            module_path: record.module_path().unwrap_or_default().to_owned(),
            filename: record.file().unwrap_or_default().to_owned(),
            line_number: record.line().unwrap_or_default(),
            ..RecordMetadata::default()
        };
        Self::with_metadata(
            record.target(),
            record.level().into(),
            &record.args().to_string(),
            metadata,
        )
    }
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.level, self.message)
    }
}
