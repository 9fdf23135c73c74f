//! Writer thread driving socket I/O.
//!
//! The thread pops frames in order, hands each to the connection supervisor
//! and never stops on a send failure. It exits once the queue is closed and
//! drained, releases the transport and then drops its completion sender so
//! every [`LogstashHandler::wait_closed`](super::LogstashHandler::wait_closed)
//! caller wakes.

use std::{io, sync::Arc, thread};

use crossbeam_channel::Sender;
use log::debug;

use super::{
    observer::DeliveryObserver,
    queue::DeliveryQueue,
    supervisor::{ConnectionSupervisor, SendError},
    transport::Connector,
};

const WORKER_THREAD_NAME: &str = "logship-writer";

pub fn spawn_worker<C: Connector>(
    queue: Arc<DeliveryQueue>,
    supervisor: ConnectionSupervisor<C>,
    observer: Arc<dyn DeliveryObserver>,
    done_tx: Sender<()>,
) -> io::Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name(WORKER_THREAD_NAME.into())
        .spawn(move || writer_loop(&queue, supervisor, observer.as_ref(), done_tx))
}

fn writer_loop<C: Connector>(
    queue: &DeliveryQueue,
    mut supervisor: ConnectionSupervisor<C>,
    observer: &dyn DeliveryObserver,
    done_tx: Sender<()>,
) {
    let mut sent = 0u64;
    while let Ok(frame) = queue.pop() {
        match supervisor.send(&frame) {
            Ok(()) => sent += 1,
            // Already reported by the supervisor.
            Err(SendError::Write(_)) => {}
            Err(SendError::Closing) => observer.frame_abandoned(),
        }
        queue.complete();
    }
    supervisor.shutdown();
    debug!("LogstashHandler writer exiting after {sent} frames");
    drop(done_tx);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::socket_handler::{
        config::{BackoffPolicy, QueueConfig},
        serialise::Frame,
        signal::CloseSignal,
        test_support::{RecordingObserver, ScriptedConnector, Step},
    };
    use crossbeam_channel::{RecvTimeoutError, bounded};
    use rstest::rstest;
    use std::time::Duration;

    fn start(
        connector: ScriptedConnector,
    ) -> (
        Arc<DeliveryQueue>,
        Arc<RecordingObserver>,
        crossbeam_channel::Receiver<()>,
        thread::JoinHandle<()>,
    ) {
        let queue = Arc::new(DeliveryQueue::new(QueueConfig::default()));
        let observer = Arc::new(RecordingObserver::default());
        let supervisor = ConnectionSupervisor::new(
            connector,
            BackoffPolicy {
                initial: Duration::from_millis(1),
                max: Duration::from_millis(2),
                multiplier: 2.0,
            },
            Arc::new(CloseSignal::new()),
            observer.clone(),
        );
        let (done_tx, done_rx) = bounded(0);
        let handle = spawn_worker(Arc::clone(&queue), supervisor, observer.clone(), done_tx)
            .expect("spawn writer");
        (queue, observer, done_rx, handle)
    }

    fn push(queue: &DeliveryQueue, text: &str) {
        queue
            .push(Frame::new(text.as_bytes()).expect("valid frame"))
            .expect("queue open");
    }

    #[rstest]
    fn keeps_running_after_write_failure() {
        let connector = ScriptedConnector::new([Step::AcceptFailingAfter(2)]);
        let wire = connector.wire();
        let (queue, observer, done_rx, handle) = start(connector);
        for text in ["1", "2", "3", "4", "5"] {
            push(&queue, text);
        }
        queue.drain_and_close();
        assert_eq!(
            done_rx.recv_timeout(Duration::from_secs(2)),
            Err(RecvTimeoutError::Disconnected)
        );
        handle.join().expect("writer thread");
        assert_eq!(wire.lines(), vec!["1", "2", "4", "5"]);
        assert_eq!(observer.write_failures(), 1);
        assert!(wire.is_released());
    }

    #[rstest]
    fn completion_is_signalled_only_after_exit() {
        let (queue, _observer, done_rx, handle) = start(ScriptedConnector::new([]));
        assert_eq!(
            done_rx.recv_timeout(Duration::from_millis(30)),
            Err(RecvTimeoutError::Timeout)
        );
        queue.drain_and_close();
        assert_eq!(
            done_rx.recv_timeout(Duration::from_secs(2)),
            Err(RecvTimeoutError::Disconnected)
        );
        handle.join().expect("writer thread");
    }

    #[rstest]
    fn writer_thread_is_named() {
        let (queue, _observer, _done_rx, handle) = start(ScriptedConnector::new([]));
        assert_eq!(handle.thread().name(), Some(WORKER_THREAD_NAME));
        queue.drain_and_close();
        handle.join().expect("writer thread");
    }
}
