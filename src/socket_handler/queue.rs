//! Ordered buffer between producers and the writer thread.
//!
//! Producers [`push`](DeliveryQueue::push) frames from any thread; the writer
//! thread [`pop`](DeliveryQueue::pop)s them in FIFO order. A popped frame
//! stays "in flight" and keeps its capacity slot until the writer calls
//! [`complete`](DeliveryQueue::complete), so a blocked producer is released
//! only once the previous frame has been handed to the transport.

use std::{
    collections::VecDeque,
    time::{Duration, Instant},
};

use parking_lot::{Condvar, Mutex};
use thiserror::Error;

use super::{
    config::{BackpressurePolicy, QueueConfig},
    serialise::Frame,
};

/// Reasons a push is refused.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("queue closed")]
    Closed,
    #[error("timed out waiting for queue space")]
    Timeout,
}

/// Returned by [`DeliveryQueue::pop`] once the queue is closed and empty.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[error("queue closed and drained")]
pub struct QueueClosed;

/// Result of a successful push.
#[derive(Debug, PartialEq, Eq)]
pub enum PushOutcome {
    Queued,
    /// The queue was full; the oldest waiting frame was evicted.
    DroppedOldest(Frame),
    /// The queue was full; the pushed frame was discarded.
    DroppedNewest(Frame),
}

#[derive(Debug, Default)]
struct QueueState {
    frames: VecDeque<Frame>,
    in_flight: bool,
    closed: bool,
}

impl QueueState {
    fn occupied(&self) -> usize {
        self.frames.len() + usize::from(self.in_flight)
    }
}

#[derive(Debug)]
pub struct DeliveryQueue {
    config: QueueConfig,
    state: Mutex<QueueState>,
    not_empty: Condvar,
    not_full: Condvar,
}

impl DeliveryQueue {
    pub fn new(config: QueueConfig) -> Self {
        Self {
            config,
            state: Mutex::new(QueueState::default()),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
        }
    }

    /// Append `frame`, applying the configured backpressure policy when full.
    pub fn push(&self, frame: Frame) -> Result<PushOutcome, QueueError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(QueueError::Closed);
        }
        let Some(capacity) = self.config.capacity.map(|c| c.get()) else {
            return Ok(self.append(&mut state, frame));
        };
        if state.occupied() < capacity {
            return Ok(self.append(&mut state, frame));
        }
        match self.config.policy {
            BackpressurePolicy::DropNewest => Ok(PushOutcome::DroppedNewest(frame)),
            BackpressurePolicy::DropOldest => match state.frames.pop_front() {
                Some(evicted) => {
                    state.frames.push_back(frame);
                    Ok(PushOutcome::DroppedOldest(evicted))
                }
                // Only the in-flight frame holds the slot; it cannot be recalled.
                None => Ok(PushOutcome::DroppedNewest(frame)),
            },
            BackpressurePolicy::Block => {
                let deadline = self.config.enqueue_timeout.map(|t| Instant::now() + t);
                while !state.closed && state.occupied() >= capacity {
                    match deadline {
                        Some(deadline) => {
                            if self.not_full.wait_until(&mut state, deadline).timed_out()
                                && !state.closed
                                && state.occupied() >= capacity
                            {
                                return Err(QueueError::Timeout);
                            }
                        }
                        None => self.not_full.wait(&mut state),
                    }
                }
                if state.closed {
                    return Err(QueueError::Closed);
                }
                Ok(self.append(&mut state, frame))
            }
        }
    }

    fn append(&self, state: &mut QueueState, frame: Frame) -> PushOutcome {
        state.frames.push_back(frame);
        self.not_empty.notify_one();
        PushOutcome::Queued
    }

    /// Take the head frame, blocking while the queue is open and empty.
    ///
    /// The frame stays in flight until [`complete`](Self::complete) is called.
    pub fn pop(&self) -> Result<Frame, QueueClosed> {
        let mut state = self.state.lock();
        loop {
            if let Some(frame) = state.frames.pop_front() {
                state.in_flight = true;
                return Ok(frame);
            }
            if state.closed {
                return Err(QueueClosed);
            }
            self.not_empty.wait(&mut state);
        }
    }

    /// Release the slot held by the frame returned from the last `pop`.
    pub fn complete(&self) {
        let mut state = self.state.lock();
        if state.in_flight {
            state.in_flight = false;
            self.not_full.notify_one();
        }
    }

    /// Reject further pushes; queued frames remain poppable.
    pub fn drain_and_close(&self) {
        let mut state = self.state.lock();
        if state.closed {
            return;
        }
        state.closed = true;
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    pub fn policy(&self) -> BackpressurePolicy {
        self.config.policy
    }

    pub fn enqueue_timeout(&self) -> Option<Duration> {
        self.config.enqueue_timeout
    }

    /// Frames waiting to be popped, excluding the one in flight.
    pub fn len(&self) -> usize {
        self.state.lock().frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}
