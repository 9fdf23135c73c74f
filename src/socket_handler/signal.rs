//! Close request shared by the handler and the connection supervisor.
//!
//! The signal is a `crossbeam-channel` whose only sender is dropped when
//! close is requested: every receiver then observes `Disconnected`
//! immediately, which wakes supervisors parked in a backoff wait.

use std::{
    thread,
    time::{Duration, Instant},
};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded};
use parking_lot::Mutex;

#[derive(Debug)]
pub struct CloseSignal {
    trigger: Mutex<Option<Sender<()>>>,
    deadline: Mutex<Option<Instant>>,
    rx: Receiver<()>,
}

impl Default for CloseSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl CloseSignal {
    pub fn new() -> Self {
        let (tx, rx) = bounded(0);
        Self {
            trigger: Mutex::new(Some(tx)),
            deadline: Mutex::new(None),
            rx,
        }
    }

    /// Request close, allowing reconnection attempts for `drain_timeout`.
    ///
    /// Returns `false` when close had already been requested; the first
    /// deadline stays in force.
    pub fn request(&self, drain_timeout: Duration) -> bool {
        let Some(trigger) = self.trigger.lock().take() else {
            return false;
        };
        *self.deadline.lock() = Some(Instant::now() + drain_timeout);
        drop(trigger);
        true
    }

    /// True once close was requested and the drain deadline has passed.
    pub fn drain_expired(&self) -> bool {
        self.deadline
            .lock()
            .is_some_and(|deadline| Instant::now() >= deadline)
    }

    /// Wait for `delay`, returning early when close is requested or, after
    /// close, when the drain deadline arrives.
    pub fn pause(&self, delay: Duration) {
        match self.rx.recv_timeout(delay) {
            Err(RecvTimeoutError::Timeout) | Ok(()) => {}
            Err(RecvTimeoutError::Disconnected) => {
                let remaining = self
                    .deadline
                    .lock()
                    .map(|deadline| deadline.saturating_duration_since(Instant::now()))
                    .unwrap_or_default();
                thread::sleep(delay.min(remaining));
            }
        }
    }
}
