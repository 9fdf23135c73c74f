//! Tests for the handler facade running over scripted transports.

use std::{
    num::NonZeroUsize,
    sync::{Arc, mpsc},
    thread,
    time::{Duration, Instant},
};

use crossbeam_channel::unbounded;
use rstest::{fixture, rstest};

use crate::handler::HandlerError;

use super::{
    BackoffPolicy, BackpressurePolicy, DeliveryConfig, EncodeError, Frame, FrameEncoder,
    Lifecycle, LogstashHandler, QueueConfig,
    test_support::{Event, RecordingObserver, ScriptedConnector, Step},
};

/// Encoder shipping string records verbatim.
struct TextEncoder;

impl FrameEncoder for TextEncoder {
    type Record = str;

    fn encode(&self, record: &str) -> Result<Frame, EncodeError> {
        Frame::new(record.as_bytes())
    }
}

#[fixture]
fn delivery_config() -> DeliveryConfig {
    DeliveryConfig {
        backoff: BackoffPolicy {
            initial: Duration::from_millis(2),
            max: Duration::from_millis(8),
            multiplier: 2.0,
        },
        drain_timeout: Duration::from_secs(2),
        ..DeliveryConfig::default()
    }
}

fn bounded_queue(capacity: usize, policy: BackpressurePolicy) -> QueueConfig {
    QueueConfig {
        capacity: NonZeroUsize::new(capacity),
        policy,
        enqueue_timeout: None,
    }
}

fn start(
    config: DeliveryConfig,
    connector: ScriptedConnector,
) -> (LogstashHandler<TextEncoder>, Arc<RecordingObserver>) {
    let observer = Arc::new(RecordingObserver::default());
    let handler = LogstashHandler::with_parts(config, connector, TextEncoder, observer.clone())
        .expect("spawn writer");
    (handler, observer)
}

fn shut_down(handler: &LogstashHandler<TextEncoder>) {
    handler.close();
    assert!(
        handler.wait_closed_timeout(Duration::from_secs(5)),
        "writer did not finish"
    );
}

#[rstest]
fn healthy_transport_receives_records_in_order(delivery_config: DeliveryConfig) {
    let connector = ScriptedConnector::new([]);
    let wire = connector.wire();
    let (handler, _observer) = start(delivery_config, connector);
    let records: Vec<String> = (0..50).map(|i| format!("{{\"n\":{i}}}")).collect();
    for record in &records {
        handler.enqueue(record).expect("enqueue");
    }
    shut_down(&handler);

    let expected: String = records.iter().map(|r| format!("{r}\n")).collect();
    assert_eq!(wire.contents(), expected.into_bytes());
}

#[rstest]
fn close_drains_queued_frames_before_wait_returns(delivery_config: DeliveryConfig) {
    let connector = ScriptedConnector::new([]);
    let wire = connector.wire();
    let (handler, _observer) = start(delivery_config, connector);
    for record in ["1", "2", "3", "4", "5"] {
        handler.enqueue(record).expect("enqueue");
    }
    handler.close();
    handler.wait_closed();
    assert_eq!(wire.lines(), vec!["1", "2", "3", "4", "5"]);
    assert!(wire.is_released());
}

#[rstest]
fn close_and_wait_closed_are_idempotent(delivery_config: DeliveryConfig) {
    let (handler, _observer) = start(delivery_config, ScriptedConnector::new([]));
    assert_eq!(handler.lifecycle(), Lifecycle::Open);
    handler.close();
    handler.close();
    assert_ne!(handler.lifecycle(), Lifecycle::Open);
    handler.wait_closed();
    handler.wait_closed();
    assert!(handler.wait_closed_timeout(Duration::ZERO));
    handler.close();
    assert_eq!(handler.lifecycle(), Lifecycle::Closed);
}

#[rstest]
fn enqueue_after_close_is_rejected(delivery_config: DeliveryConfig) {
    let (handler, _observer) = start(delivery_config, ScriptedConnector::new([]));
    handler.close();
    assert_eq!(handler.enqueue("late"), Err(HandlerError::Closed));
    handler.wait_closed();
    assert_eq!(handler.enqueue("later"), Err(HandlerError::Closed));
}

#[rstest]
fn blocked_enqueue_waits_for_previous_frame(mut delivery_config: DeliveryConfig) {
    delivery_config.queue = bounded_queue(1, BackpressurePolicy::Block);
    let (gate_tx, gate_rx) = unbounded();
    let connector = ScriptedConnector::new([Step::AcceptGated(gate_rx)]);
    let wire = connector.wire();
    let (handler, _observer) = start(delivery_config, connector);
    let handler = Arc::new(handler);

    handler.enqueue("first").expect("first enqueue");
    let (done_tx, done_rx) = mpsc::channel();
    let producer = {
        let handler = Arc::clone(&handler);
        thread::spawn(move || {
            let result = handler.enqueue("second");
            done_tx.send(()).expect("signal done");
            result
        })
    };

    assert!(
        done_rx.recv_timeout(Duration::from_millis(100)).is_err(),
        "second enqueue must wait while the first frame holds the only slot"
    );
    gate_tx.send(()).expect("release first write");
    done_rx
        .recv_timeout(Duration::from_secs(2))
        .expect("second enqueue released");
    assert_eq!(producer.join().expect("producer thread"), Ok(()));

    drop(gate_tx);
    shut_down(&handler);
    assert_eq!(wire.lines(), vec!["first", "second"]);
}

#[rstest]
fn enqueue_timeout_surfaces_to_caller(mut delivery_config: DeliveryConfig) {
    delivery_config.queue = QueueConfig {
        enqueue_timeout: Some(Duration::from_millis(20)),
        ..bounded_queue(1, BackpressurePolicy::Block)
    };
    let (gate_tx, gate_rx) = unbounded();
    let (handler, _observer) = start(
        delivery_config,
        ScriptedConnector::new([Step::AcceptGated(gate_rx)]),
    );
    handler.enqueue("first").expect("first enqueue");
    assert_eq!(
        handler.enqueue("second"),
        Err(HandlerError::Timeout(Duration::from_millis(20)))
    );
    drop(gate_tx);
    shut_down(&handler);
}

#[rstest]
fn drop_newest_reports_overflow_and_succeeds(mut delivery_config: DeliveryConfig) {
    delivery_config.queue = bounded_queue(1, BackpressurePolicy::DropNewest);
    let (gate_tx, gate_rx) = unbounded();
    let connector = ScriptedConnector::new([Step::AcceptGated(gate_rx)]);
    let wire = connector.wire();
    let (handler, observer) = start(delivery_config, connector);

    handler.enqueue("kept").expect("first enqueue");
    handler.enqueue("dropped").expect("overflow is not an error");
    assert_eq!(observer.overflows(), 1);
    assert!(
        observer
            .events()
            .contains(&Event::Overflow(BackpressurePolicy::DropNewest))
    );

    drop(gate_tx);
    shut_down(&handler);
    assert_eq!(wire.lines(), vec!["kept"]);
}

#[rstest]
fn drop_oldest_evicts_waiting_frame_and_reports_overflow(mut delivery_config: DeliveryConfig) {
    delivery_config.queue = bounded_queue(2, BackpressurePolicy::DropOldest);
    let (gate_tx, gate_rx) = unbounded();
    let connector = ScriptedConnector::new([Step::AcceptGated(gate_rx)]);
    let wire = connector.wire();
    let (handler, observer) = start(delivery_config, connector);

    handler.enqueue("in-flight").expect("first enqueue");
    // Wait until the writer holds the first frame on the gated transport.
    let deadline = Instant::now() + Duration::from_secs(2);
    while handler.pending() > 0 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(1));
    }
    assert_eq!(handler.pending(), 0, "writer never picked up the first frame");

    handler.enqueue("evicted").expect("fills the queue");
    handler.enqueue("newest").expect("overflow is not an error");
    assert_eq!(observer.overflows(), 1);
    assert!(
        observer
            .events()
            .contains(&Event::Overflow(BackpressurePolicy::DropOldest))
    );

    drop(gate_tx);
    shut_down(&handler);
    assert_eq!(wire.lines(), vec!["in-flight", "newest"]);
}

#[rstest]
fn reconnects_with_bounded_non_decreasing_delays(delivery_config: DeliveryConfig) {
    let connector = ScriptedConnector::new([Step::Refuse, Step::Refuse, Step::Accept]);
    let wire = connector.wire();
    let attempts = connector.attempts();
    let (handler, observer) = start(delivery_config, connector);
    for record in ["a", "b", "c"] {
        handler.enqueue(record).expect("enqueue");
    }
    shut_down(&handler);

    let delays = observer.retry_delays();
    assert_eq!(delays.len(), 2);
    assert!(delays.windows(2).all(|w| w[0] <= w[1]), "{delays:?}");
    assert!(delays.iter().all(|d| *d <= Duration::from_millis(8)));
    assert_eq!(*attempts.lock(), 3);
    assert_eq!(observer.connections(), vec![2]);
    assert_eq!(wire.lines(), vec!["a", "b", "c"]);
}

#[rstest]
fn frame_lost_mid_write_is_not_replayed(delivery_config: DeliveryConfig) {
    let connector = ScriptedConnector::new([Step::AcceptFailingAfter(2), Step::Accept]);
    let wire = connector.wire();
    let (handler, observer) = start(delivery_config, connector);
    for record in ["k1", "k2", "k3", "k4", "k5"] {
        handler.enqueue(record).expect("enqueue");
    }
    shut_down(&handler);

    assert_eq!(wire.lines(), vec!["k1", "k2", "k4", "k5"]);
    assert_eq!(observer.write_failures(), 1);
}

#[rstest]
fn unreachable_endpoint_is_abandoned_after_drain_timeout(mut delivery_config: DeliveryConfig) {
    delivery_config.drain_timeout = Duration::from_millis(50);
    let (handler, observer) = start(delivery_config, ScriptedConnector::refusing());
    for record in ["x", "y", "z"] {
        handler.enqueue(record).expect("producer never sees network failure");
    }
    shut_down(&handler);
    assert_eq!(observer.abandoned(), 3);
    assert!(!observer.retry_delays().is_empty());
}

#[rstest]
fn encode_failures_are_reported_and_returned(delivery_config: DeliveryConfig) {
    let (handler, observer) = start(delivery_config, ScriptedConnector::new([]));
    let err = handler
        .enqueue("two\nlines")
        .expect_err("embedded newline rejected");
    assert!(matches!(err, HandlerError::Encode(EncodeError::EmbeddedNewline)));
    assert!(matches!(observer.events().as_slice(), [Event::EncodeFailed(_)]));
    handler.enqueue("fine").expect("pipeline still healthy");
    shut_down(&handler);
}

#[rstest]
fn drop_closes_and_releases_transport(delivery_config: DeliveryConfig) {
    let connector = ScriptedConnector::new([]);
    let wire = connector.wire();
    let (handler, _observer) = start(delivery_config, connector);
    handler.enqueue("bye").expect("enqueue");
    drop(handler);
    assert_eq!(wire.lines(), vec!["bye"]);
    assert!(wire.is_released());
}
