//! Frame encoding.
//!
//! A [`Frame`] is one encoded record followed by the `\n` delimiter expected
//! by line-oriented collectors. [`JsonEncoder`] renders [`LogRecord`] values
//! as Logstash-style JSON documents.

use std::{collections::BTreeMap, fmt, sync::Arc};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::log_record::LogRecord;

use super::config::DEFAULT_MAX_FRAME_SIZE;

/// Errors raised while turning a record into a frame.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("failed to serialise record: {0}")]
    Serialise(#[from] serde_json::Error),
    #[error("encoded record contains a newline delimiter")]
    EmbeddedNewline,
    #[error("encoded record is {size} bytes, above the {limit} byte limit")]
    TooLarge { size: usize, limit: usize },
}

/// One newline-terminated payload, immutable and cheap to clone.
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    bytes: Arc<[u8]>,
}

impl Frame {
    /// Wrap `payload`, appending the delimiter.
    pub fn new(payload: &[u8]) -> Result<Self, EncodeError> {
        if payload.contains(&b'\n') {
            return Err(EncodeError::EmbeddedNewline);
        }
        let mut bytes = Vec::with_capacity(payload.len() + 1);
        bytes.extend_from_slice(payload);
        bytes.push(b'\n');
        Ok(Self {
            bytes: bytes.into(),
        })
    }

    /// Payload without the trailing delimiter.
    pub fn payload(&self) -> &[u8] {
        &self.bytes[..self.bytes.len() - 1]
    }

    /// Bytes as written to the wire, delimiter included.
    pub fn as_wire_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Frame")
            .field(&String::from_utf8_lossy(self.payload()))
            .finish()
    }
}

/// Turns records into frames.
///
/// Implementations must be deterministic and free of side effects; the handler
/// calls them on the producer's thread before queueing.
pub trait FrameEncoder: Send + Sync + 'static {
    type Record: ?Sized;

    fn encode(&self, record: &Self::Record) -> Result<Frame, EncodeError>;
}

#[derive(Serialize)]
struct LogstashDocument<'a> {
    #[serde(rename = "@timestamp")]
    timestamp: String,
    #[serde(rename = "@version")]
    version: &'static str,
    message: &'a str,
    logger_name: &'a str,
    level: &'static str,
    path: &'a str,
    lineno: u32,
    module: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    thread_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    host: Option<&'a str>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    extra: BTreeMap<&'a str, &'a str>,
}

/// Encoder producing one Logstash `json_lines` document per record.
#[derive(Clone, Debug)]
pub struct JsonEncoder {
    host: Option<String>,
    static_fields: BTreeMap<String, String>,
    max_frame_size: usize,
}

impl Default for JsonEncoder {
    fn default() -> Self {
        Self {
            host: None,
            static_fields: BTreeMap::new(),
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

impl JsonEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report `host` in every document.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Add a field merged into every document's `extra` object. Record
    /// key/values with the same name take precedence.
    pub fn with_static_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.static_fields.insert(key.into(), value.into());
        self
    }

    pub fn with_max_frame_size(mut self, max_frame_size: usize) -> Self {
        self.max_frame_size = max_frame_size;
        self
    }

    fn document<'a>(&'a self, record: &'a LogRecord) -> LogstashDocument<'a> {
        let timestamp = DateTime::<Utc>::from(record.metadata.timestamp)
            .to_rfc3339_opts(SecondsFormat::Micros, true);
        let mut extra: BTreeMap<&str, &str> = self
            .static_fields
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        extra.extend(
            record
                .metadata
                .key_values
                .iter()
                .map(|(k, v)| (k.as_str(), v.as_str())),
        );
        LogstashDocument {
            timestamp,
            version: "1",
            message: &record.message,
            logger_name: &record.logger,
            level: record.level.as_str(),
            path: &record.metadata.filename,
            lineno: record.metadata.line_number,
            module: &record.metadata.module_path,
            thread_name: record.metadata.thread_name.as_deref(),
            host: self.host.as_deref(),
            extra,
        }
    }
}

impl FrameEncoder for JsonEncoder {
    type Record = LogRecord;

    fn encode(&self, record: &LogRecord) -> Result<Frame, EncodeError> {
        let payload = serde_json::to_vec(&self.document(record))?;
        if payload.len() > self.max_frame_size {
            return Err(EncodeError::TooLarge {
                size: payload.len(),
                limit: self.max_frame_size,
            });
        }
        Frame::new(&payload)
    }
}
