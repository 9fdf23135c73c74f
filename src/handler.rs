//! Errors surfaced synchronously to producers.

use std::time::Duration;

use thiserror::Error;

use crate::socket_handler::EncodeError;

/// Reasons an `enqueue` call can fail.
///
/// Network failures never appear here: they are absorbed by the writer
/// thread and reported through the
/// [`DeliveryObserver`](crate::socket_handler::DeliveryObserver).
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The handler is closing or closed and no longer accepts records.
    #[error("handler is closed")]
    Closed,
    /// A bounded queue stayed full for longer than the configured timeout.
    #[error("timed out after {0:?} waiting for queue space")]
    Timeout(Duration),
    /// The record could not be encoded into a frame.
    #[error(transparent)]
    Encode(#[from] EncodeError),
}

impl PartialEq for HandlerError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Closed, Self::Closed) => true,
            (Self::Timeout(a), Self::Timeout(b)) => a == b,
            (Self::Encode(a), Self::Encode(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
