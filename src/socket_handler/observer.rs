//! Observability hook for delivery events.
//!
//! Failures on the writer thread never reach producers; they are reported
//! here instead. [`LogObserver`] is installed by default and emits
//! rate-limited warnings through the `log` facade.

use std::{io, time::Duration};

use log::{info, warn};
use thiserror::Error;

use crate::rate_limited_warner::RateLimitedWarner;

use super::{config::BackpressurePolicy, serialise::EncodeError};

/// Network-side failures absorbed by the supervisor.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The transport could not be established.
    #[error("connect failed: {0}")]
    Connect(#[source] io::Error),
    /// The transport broke while a frame was being written.
    #[error("write failed: {0}")]
    Write(#[source] io::Error),
}

/// Receives delivery events. Every method has an empty default.
pub trait DeliveryObserver: Send + Sync + 'static {
    /// A full queue dropped a frame under a drop policy.
    fn queue_overflow(&self, _policy: BackpressurePolicy) {}

    /// A record could not be encoded and was dropped.
    fn encode_failed(&self, _err: &EncodeError) {}

    /// A connection attempt failed; the supervisor waits `retry_in`.
    fn connect_failed(&self, _err: &DeliveryError, _attempt: u32, _retry_in: Duration) {}

    /// A connection was established after `attempts` failures.
    fn connected(&self, _endpoint: &str, _attempts: u32) {}

    /// A frame was lost because the transport broke mid-write.
    fn write_failed(&self, _err: &DeliveryError) {}

    /// A frame was discarded because the drain deadline expired after close.
    fn frame_abandoned(&self) {}
}

/// Default observer logging through the `log` crate.
#[derive(Debug)]
pub struct LogObserver {
    overflow: RateLimitedWarner,
    encode: RateLimitedWarner,
    connect: RateLimitedWarner,
    abandoned: RateLimitedWarner,
}

impl LogObserver {
    pub fn new(warn_interval: Duration) -> Self {
        Self {
            overflow: RateLimitedWarner::new(warn_interval),
            encode: RateLimitedWarner::new(warn_interval),
            connect: RateLimitedWarner::new(warn_interval),
            abandoned: RateLimitedWarner::new(warn_interval),
        }
    }
}

impl Default for LogObserver {
    fn default() -> Self {
        Self::new(crate::rate_limited_warner::DEFAULT_WARN_INTERVAL)
    }
}

impl DeliveryObserver for LogObserver {
    fn queue_overflow(&self, policy: BackpressurePolicy) {
        self.overflow.record_drop();
        self.overflow.warn_if_due(|count| {
            warn!("LogstashHandler queue full ({policy:?}); dropped {count} records");
        });
    }

    fn encode_failed(&self, err: &EncodeError) {
        self.encode.record_drop();
        self.encode.warn_if_due(|count| {
            warn!("LogstashHandler encoding error: {err}; dropped {count} records");
        });
    }

    fn connect_failed(&self, err: &DeliveryError, attempt: u32, retry_in: Duration) {
        self.connect.record_drop();
        self.connect.warn_if_due(|count| {
            warn!(
                "LogstashHandler {err} (attempt {attempt}, {count} failures since last report); \
                 retrying in {retry_in:?}"
            );
        });
    }

    fn connected(&self, endpoint: &str, attempts: u32) {
        if attempts > 0 {
            info!("LogstashHandler reconnected to {endpoint} after {attempts} failed attempts");
        }
    }

    fn write_failed(&self, err: &DeliveryError) {
        warn!("LogstashHandler {err}; frame dropped");
    }

    fn frame_abandoned(&self) {
        self.abandoned.record_drop();
        self.abandoned.warn_if_due(|count| {
            warn!("LogstashHandler drain deadline expired; abandoned {count} records");
        });
    }
}

impl Drop for LogObserver {
    fn drop(&mut self) {
        self.overflow.flush(|count| {
            warn!("LogstashHandler dropped {count} records on full queue");
        });
        self.encode.flush(|count| {
            warn!("LogstashHandler dropped {count} records that failed to encode");
        });
        self.connect.flush(|count| {
            warn!("LogstashHandler {count} connect failures not yet reported");
        });
        self.abandoned.flush(|count| {
            warn!("LogstashHandler abandoned {count} records at shutdown");
        });
    }
}
