//! Configuration structures consumed by the handler lifecycle.
//!
//! [`LogstashHandlerBuilder`](crate::handlers::LogstashHandlerBuilder)
//! validates and constructs these values before passing them to
//! [`LogstashHandler`](super::LogstashHandler) for runtime use.

use std::{num::NonZeroUsize, time::Duration};

use crate::rate_limited_warner::DEFAULT_WARN_INTERVAL;

use super::transport::TcpTransport;

/// Default connection timeout applied when establishing sockets.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Default write timeout applied to socket writes.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(1);
/// Default maximum payload size (in bytes) accepted by the encoder.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 1 << 20; // 1 MiB
/// Default first delay between reconnection attempts.
pub const DEFAULT_BACKOFF_INITIAL: Duration = Duration::from_millis(100);
/// Default ceiling for reconnection delays.
pub const DEFAULT_BACKOFF_MAX: Duration = Duration::from_secs(10);
/// Default growth factor applied after each failed attempt.
pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;
/// Default time allowed for reconnecting after `close()` before queued
/// frames are abandoned.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Determines how the delivery queue reacts when it is full.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BackpressurePolicy {
    /// Block the producer until the writer frees a slot.
    #[default]
    Block,
    /// Evict the oldest queued frame to make room.
    DropOldest,
    /// Discard the incoming frame.
    DropNewest,
}

/// Queue sizing and overflow behaviour.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueConfig {
    /// Maximum buffered frames; `None` means unbounded.
    pub capacity: Option<NonZeroUsize>,
    pub policy: BackpressurePolicy,
    /// Longest a blocked producer waits before failing with a timeout.
    /// Only meaningful for [`BackpressurePolicy::Block`].
    pub enqueue_timeout: Option<Duration>,
}

/// Exponential backoff policy for reconnection attempts.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BackoffPolicy {
    pub initial: Duration,
    pub max: Duration,
    pub multiplier: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial: DEFAULT_BACKOFF_INITIAL,
            max: DEFAULT_BACKOFF_MAX,
            multiplier: DEFAULT_BACKOFF_MULTIPLIER,
        }
    }
}

/// Runtime settings shared by the handler, the writer thread and the
/// connection supervisor.
#[derive(Clone, Debug)]
pub struct DeliveryConfig {
    pub queue: QueueConfig,
    pub backoff: BackoffPolicy,
    pub drain_timeout: Duration,
    /// Upper bound for establishing one connection, TLS handshake included.
    pub connect_timeout: Duration,
    /// Upper bound for a single write.
    pub write_timeout: Duration,
    pub warn_interval: Duration,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            queue: QueueConfig::default(),
            backoff: BackoffPolicy::default(),
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            warn_interval: DEFAULT_WARN_INTERVAL,
        }
    }
}

impl DeliveryConfig {
    /// How long `Drop` waits for the writer: the drain window plus one
    /// connect attempt started just before it closes and one write.
    pub fn shutdown_grace(&self) -> Duration {
        self.drain_timeout
            .saturating_add(self.connect_timeout)
            .saturating_add(self.write_timeout)
    }
}

/// Everything needed to build a TCP-backed handler with the JSON encoder.
#[derive(Clone, Debug)]
pub struct SocketHandlerConfig {
    pub transport: TcpTransport,
    pub max_frame_size: usize,
    pub delivery: DeliveryConfig,
}

/// Provide defaults that favour local development whilst encouraging
/// production callers to override the transport via the builder APIs.
impl Default for SocketHandlerConfig {
    fn default() -> Self {
        Self {
            transport: TcpTransport {
                host: "localhost".into(),
                port: 5000,
                tls: None,
            },
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            delivery: DeliveryConfig::default(),
        }
    }
}
