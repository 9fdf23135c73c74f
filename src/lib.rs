//! Non-blocking log shipping to Logstash-style collectors.
//!
//! Records handed to a [`LogstashHandler`] are encoded into newline-delimited
//! JSON frames and queued; a single writer thread drains the queue over a
//! persistent TCP or TLS connection, reconnecting with exponential backoff
//! when the collector goes away. Producers never wait on the network.
//!
//! ```no_run
//! use logship::{Level, LogRecord, LogstashHandlerBuilder};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let handler = LogstashHandlerBuilder::new()
//!     .with_tcp("127.0.0.1", 5000)
//!     .with_capacity(10_000)
//!     .build()?;
//! handler.enqueue(&LogRecord::new("billing", Level::Info, "invoice sent"))?;
//! handler.close();
//! handler.wait_closed();
//! # Ok(())
//! # }
//! ```

pub mod config_file;
mod handler;
pub mod handlers;
mod level;
mod log_record;
mod rate_limited_warner;
pub mod socket_handler;

pub use config_file::{ConfigFileError, builder_from_ini, builder_from_ini_str};
pub use handler::HandlerError;
pub use handlers::{BackoffOverrides, HandlerBuildError, LogstashHandlerBuilder};
pub use level::{Level, ParseLevelError};
pub use log_record::{LogRecord, RecordMetadata};
pub use rate_limited_warner::{DEFAULT_WARN_INTERVAL, RateLimitedWarner};
pub use socket_handler::{
    BackpressurePolicy, Connector, DeliveryError, DeliveryObserver, EncodeError, Frame,
    FrameEncoder, JsonEncoder, Lifecycle, LogObserver, LogstashHandler, TcpConnector,
};
