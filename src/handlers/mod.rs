//! Handler builders.
//!
//! Provides a validated builder API for constructing
//! [`LogstashHandler`](crate::socket_handler::LogstashHandler) instances.

use std::io;

use thiserror::Error;

pub(crate) mod policy;
pub mod socket_builder;

pub use policy::parse_policy_string;
pub use socket_builder::{BackoffOverrides, LogstashHandlerBuilder};

/// Errors that may occur while building a handler.
#[derive(Debug, Error)]
pub enum HandlerBuildError {
    /// Invalid user supplied configuration.
    #[error("invalid handler configuration: {0}")]
    InvalidConfig(String),
    /// Underlying I/O error whilst creating the handler.
    #[error(transparent)]
    Io(#[from] io::Error),
}
