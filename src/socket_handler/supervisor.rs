//! Connection supervisor: sole owner of the transport.
//!
//! The writer thread hands every frame to [`ConnectionSupervisor::send`].
//! When no connection is live the supervisor reconnects in place, waiting out
//! the backoff schedule between failures. A frame whose write fails is lost;
//! the next frame triggers a reconnect.

use std::{io::Write, sync::Arc};

use log::debug;
use thiserror::Error;

use super::{
    backoff::BackoffState,
    config::BackoffPolicy,
    observer::{DeliveryError, DeliveryObserver},
    serialise::Frame,
    signal::CloseSignal,
    transport::Connector,
};

/// Connection lifecycle as seen by the supervisor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    /// Terminal: the supervisor stopped retrying and released the transport.
    Closing,
}

/// Why a frame was not confirmed delivered.
#[derive(Debug, Error)]
pub enum SendError {
    /// Close was requested and the drain deadline passed before a connection
    /// could be established.
    #[error("supervisor is closing")]
    Closing,
    /// The transport broke during the write; the frame is not replayed.
    #[error(transparent)]
    Write(DeliveryError),
}

pub struct ConnectionSupervisor<C: Connector> {
    connector: C,
    stream: Option<C::Stream>,
    state: ConnectionState,
    backoff: BackoffState,
    signal: Arc<CloseSignal>,
    observer: Arc<dyn DeliveryObserver>,
}

impl<C: Connector> ConnectionSupervisor<C> {
    pub fn new(
        connector: C,
        backoff: BackoffPolicy,
        signal: Arc<CloseSignal>,
        observer: Arc<dyn DeliveryObserver>,
    ) -> Self {
        Self {
            connector,
            stream: None,
            state: ConnectionState::Disconnected,
            backoff: BackoffState::new(backoff),
            signal,
            observer,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Write `frame` to the transport, connecting first if necessary.
    pub fn send(&mut self, frame: &Frame) -> Result<(), SendError> {
        self.ensure_connected()?;
        let Some(stream) = self.stream.as_mut() else {
            return Err(SendError::Closing);
        };
        let written = stream
            .write_all(frame.as_wire_bytes())
            .and_then(|()| stream.flush());
        match written {
            Ok(()) => Ok(()),
            Err(err) => {
                self.stream = None;
                self.state = ConnectionState::Disconnected;
                let err = DeliveryError::Write(err);
                self.observer.write_failed(&err);
                Err(SendError::Write(err))
            }
        }
    }

    fn ensure_connected(&mut self) -> Result<(), SendError> {
        loop {
            match self.state {
                ConnectionState::Connected if self.stream.is_some() => return Ok(()),
                ConnectionState::Closing => return Err(SendError::Closing),
                _ => {}
            }
            if self.signal.drain_expired() {
                self.state = ConnectionState::Closing;
                return Err(SendError::Closing);
            }
            self.state = ConnectionState::Connecting;
            match self.connector.connect() {
                Ok(stream) => {
                    self.observer
                        .connected(&self.connector.describe(), self.backoff.attempts());
                    self.backoff.reset();
                    self.stream = Some(stream);
                    self.state = ConnectionState::Connected;
                }
                Err(err) => {
                    self.state = ConnectionState::Disconnected;
                    let delay = self.backoff.next_delay();
                    self.observer.connect_failed(
                        &DeliveryError::Connect(err),
                        self.backoff.attempts(),
                        delay,
                    );
                    self.signal.pause(delay);
                }
            }
        }
    }

    /// Flush and release the transport; the supervisor accepts no more work.
    pub fn shutdown(&mut self) {
        if let Some(mut stream) = self.stream.take()
            && let Err(err) = stream.flush()
        {
            debug!("LogstashHandler final flush failed: {err}");
        }
        self.state = ConnectionState::Closing;
    }
}
