//! Socket-based delivery pipeline.
//!
//! This module defines [`LogstashHandler`], which encodes records into
//! newline-delimited JSON frames and forwards them to a remote collector. A
//! dedicated writer thread drains the [`DeliveryQueue`] through the
//! [`ConnectionSupervisor`], which owns the connection and transparently
//! reconnects using exponential backoff. Failures on that side are reported
//! to a [`DeliveryObserver`] and never block or fail producers.

mod backoff;
mod config;
mod handler;
mod observer;
mod queue;
mod serialise;
mod signal;
mod supervisor;
mod transport;
mod worker;

#[cfg(any(test, feature = "test-util"))]
pub mod test_support;

#[cfg(test)]
mod tests;

pub use backoff::{BackoffState, MIN_BACKOFF_DELAY};
pub use config::{
    BackoffPolicy, BackpressurePolicy, DEFAULT_BACKOFF_INITIAL, DEFAULT_BACKOFF_MAX,
    DEFAULT_BACKOFF_MULTIPLIER, DEFAULT_CONNECT_TIMEOUT, DEFAULT_DRAIN_TIMEOUT,
    DEFAULT_MAX_FRAME_SIZE, DEFAULT_WRITE_TIMEOUT, DeliveryConfig, QueueConfig,
    SocketHandlerConfig,
};
pub use handler::{Lifecycle, LogstashHandler};
pub use observer::{DeliveryError, DeliveryObserver, LogObserver};
pub use queue::{DeliveryQueue, PushOutcome, QueueClosed, QueueError};
pub use serialise::{EncodeError, Frame, FrameEncoder, JsonEncoder};
pub use supervisor::{ConnectionState, ConnectionSupervisor, SendError};
pub use signal::CloseSignal;
pub use transport::{ActiveConnection, Connector, TcpConnector, TcpTransport, TlsOptions};
