//! Public handler type exported by the crate.

use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU8, Ordering},
    },
    thread,
    time::Duration,
};

use crossbeam_channel::{Receiver, RecvTimeoutError, bounded};
use log::warn;
use parking_lot::Mutex;

use crate::handler::HandlerError;

use super::{
    config::DeliveryConfig,
    observer::DeliveryObserver,
    queue::{DeliveryQueue, PushOutcome, QueueError},
    serialise::{FrameEncoder, JsonEncoder},
    signal::CloseSignal,
    supervisor::ConnectionSupervisor,
    transport::Connector,
    worker::spawn_worker,
};

/// Handler lifecycle as visible to producers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lifecycle {
    /// Accepting records.
    Open,
    /// `close()` was called; queued frames are still being delivered.
    Closing,
    /// The writer thread has exited and the transport was released.
    Closed,
}

const OPEN: u8 = 0;
const CLOSING: u8 = 1;

/// Handler shipping records as newline-delimited JSON to a remote collector.
///
/// `enqueue` encodes on the caller's thread and queues the frame; a dedicated
/// writer thread owns the connection. `close` starts a drain without
/// blocking and `wait_closed` blocks until the writer has finished.
pub struct LogstashHandler<E: FrameEncoder = JsonEncoder> {
    encoder: E,
    queue: Arc<DeliveryQueue>,
    signal: Arc<CloseSignal>,
    observer: Arc<dyn DeliveryObserver>,
    state: AtomicU8,
    done_rx: Receiver<()>,
    handle: Mutex<Option<thread::JoinHandle<()>>>,
    drain_timeout: Duration,
    shutdown_grace: Duration,
}

impl<E: FrameEncoder> LogstashHandler<E> {
    /// Assemble a handler from explicit collaborators and start its writer
    /// thread.
    pub fn with_parts<C: Connector>(
        config: DeliveryConfig,
        connector: C,
        encoder: E,
        observer: Arc<dyn DeliveryObserver>,
    ) -> std::io::Result<Self> {
        let queue = Arc::new(DeliveryQueue::new(config.queue));
        let signal = Arc::new(CloseSignal::new());
        let supervisor = ConnectionSupervisor::new(
            connector,
            config.backoff,
            Arc::clone(&signal),
            Arc::clone(&observer),
        );
        let (done_tx, done_rx) = bounded(0);
        let handle = spawn_worker(
            Arc::clone(&queue),
            supervisor,
            Arc::clone(&observer),
            done_tx,
        )?;
        Ok(Self {
            encoder,
            queue,
            signal,
            observer,
            state: AtomicU8::new(OPEN),
            done_rx,
            handle: Mutex::new(Some(handle)),
            drain_timeout: config.drain_timeout,
            shutdown_grace: config.shutdown_grace(),
        })
    }

    /// Encode `record` and queue it for delivery.
    ///
    /// Blocks only when the queue is bounded, full and configured to block.
    /// Frames dropped under a drop policy still count as success.
    pub fn enqueue(&self, record: &E::Record) -> Result<(), HandlerError> {
        if self.state.load(Ordering::Acquire) != OPEN {
            return Err(HandlerError::Closed);
        }
        let frame = self.encoder.encode(record).inspect_err(|err| {
            self.observer.encode_failed(err);
        })?;
        match self.queue.push(frame) {
            Ok(PushOutcome::Queued) => Ok(()),
            Ok(PushOutcome::DroppedOldest(_) | PushOutcome::DroppedNewest(_)) => {
                self.observer.queue_overflow(self.queue.policy());
                Ok(())
            }
            Err(QueueError::Closed) => Err(HandlerError::Closed),
            Err(QueueError::Timeout) => Err(HandlerError::Timeout(
                self.queue.enqueue_timeout().unwrap_or_default(),
            )),
        }
    }

    /// Stop accepting records and start draining. Never blocks; repeated
    /// calls have no further effect.
    pub fn close(&self) {
        if self
            .state
            .compare_exchange(OPEN, CLOSING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        self.signal.request(self.drain_timeout);
        self.queue.drain_and_close();
    }

    /// Block until the writer thread has exited and released the transport.
    ///
    /// Does not itself request a close; pair it with [`close`](Self::close).
    pub fn wait_closed(&self) {
        // The writer drops its sender on exit, so `recv` fails with
        // `Disconnected` now and on every later call.
        let _ = self.done_rx.recv();
        self.join_worker();
    }

    /// Like [`wait_closed`](Self::wait_closed) but gives up after `timeout`.
    /// Returns `true` once the writer has exited.
    pub fn wait_closed_timeout(&self, timeout: Duration) -> bool {
        match self.done_rx.recv_timeout(timeout) {
            Err(RecvTimeoutError::Timeout) => false,
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                self.join_worker();
                true
            }
        }
    }

    pub fn lifecycle(&self) -> Lifecycle {
        if self.state.load(Ordering::Acquire) == OPEN {
            return Lifecycle::Open;
        }
        if self.writer_exited() {
            Lifecycle::Closed
        } else {
            Lifecycle::Closing
        }
    }

    /// Frames waiting for the writer thread.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    fn writer_exited(&self) -> bool {
        matches!(
            self.done_rx.try_recv(),
            Err(crossbeam_channel::TryRecvError::Disconnected)
        )
    }

    fn join_worker(&self) {
        let Some(handle) = self.handle.lock().take() else {
            return;
        };
        if handle.join().is_err() {
            warn!("LogstashHandler: writer thread panicked");
        }
    }
}

impl<E: FrameEncoder> Drop for LogstashHandler<E> {
    fn drop(&mut self) {
        self.close();
        if !self.wait_closed_timeout(self.shutdown_grace) {
            warn!(
                "LogstashHandler: writer thread did not shut down within {:?}",
                self.shutdown_grace
            );
        }
    }
}

impl<E: FrameEncoder> fmt::Debug for LogstashHandler<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogstashHandler")
            .field("lifecycle", &self.lifecycle())
            .field("pending", &self.pending())
            .field("drain_timeout", &self.drain_timeout)
            .finish()
    }
}
