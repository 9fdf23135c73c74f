//! Deterministic collaborators for exercising the delivery pipeline without
//! a network: a scripted [`Connector`] writing into shared memory and an
//! observer that records every event.

use std::{
    collections::VecDeque,
    io::{self, Write},
    sync::Arc,
    time::Duration,
};

use crossbeam_channel::Receiver;
use parking_lot::Mutex;

use super::{
    config::BackpressurePolicy,
    observer::{DeliveryError, DeliveryObserver},
    serialise::EncodeError,
    transport::Connector,
};

/// Outcome of one scripted connection attempt.
#[derive(Debug)]
pub enum Step {
    /// Fail with `ConnectionRefused`.
    Refuse,
    /// Hand out a healthy stream.
    Accept,
    /// Hand out a stream whose writes fail after `n` successful frames.
    AcceptFailingAfter(usize),
    /// Hand out a stream where each write first waits for a message on the
    /// receiver (or its disconnection).
    AcceptGated(Receiver<()>),
}

#[derive(Debug, Default)]
struct WireState {
    bytes: Vec<u8>,
    live_streams: usize,
}

/// Bytes written by every stream a [`ScriptedConnector`] produced.
#[derive(Clone, Debug, Default)]
pub struct MemoryWire {
    state: Arc<Mutex<WireState>>,
}

impl MemoryWire {
    pub fn contents(&self) -> Vec<u8> {
        self.state.lock().bytes.clone()
    }

    /// Complete lines received so far.
    pub fn lines(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.contents())
            .lines()
            .map(str::to_owned)
            .collect()
    }

    /// True when no stream handed out by the connector is still alive.
    pub fn is_released(&self) -> bool {
        self.state.lock().live_streams == 0
    }
}

#[derive(Debug)]
pub struct ScriptedStream {
    wire: MemoryWire,
    remaining: Option<usize>,
    gate: Option<Receiver<()>>,
}

impl Write for ScriptedStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_all(buf)?;
        Ok(buf.len())
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        if let Some(gate) = &self.gate {
            let _ = gate.recv();
        }
        if let Some(remaining) = self.remaining.as_mut() {
            if *remaining == 0 {
                return Err(io::Error::from(io::ErrorKind::ConnectionReset));
            }
            *remaining -= 1;
        }
        self.wire.state.lock().bytes.extend_from_slice(buf);
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for ScriptedStream {
    fn drop(&mut self) {
        self.wire.state.lock().live_streams -= 1;
    }
}

/// Connector following a fixed script. Once the script runs out it accepts
/// every attempt, or refuses every attempt when built with
/// [`refusing`](Self::refusing).
#[derive(Debug)]
pub struct ScriptedConnector {
    script: VecDeque<Step>,
    refuse_when_exhausted: bool,
    attempts: Arc<Mutex<usize>>,
    wire: MemoryWire,
}

impl ScriptedConnector {
    /// Follow `steps`, then accept every further attempt.
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            script: steps.into_iter().collect(),
            refuse_when_exhausted: false,
            attempts: Arc::default(),
            wire: MemoryWire::default(),
        }
    }

    /// Refuse every attempt.
    pub fn refusing() -> Self {
        Self {
            refuse_when_exhausted: true,
            ..Self::new([])
        }
    }

    pub fn wire(&self) -> MemoryWire {
        self.wire.clone()
    }

    /// Shared counter of connection attempts.
    pub fn attempts(&self) -> Arc<Mutex<usize>> {
        Arc::clone(&self.attempts)
    }

    fn stream(&self, remaining: Option<usize>, gate: Option<Receiver<()>>) -> ScriptedStream {
        self.wire.state.lock().live_streams += 1;
        ScriptedStream {
            wire: self.wire.clone(),
            remaining,
            gate,
        }
    }
}

impl Connector for ScriptedConnector {
    type Stream = ScriptedStream;

    fn connect(&mut self) -> io::Result<ScriptedStream> {
        *self.attempts.lock() += 1;
        let step = self.script.pop_front().unwrap_or(if self.refuse_when_exhausted {
            Step::Refuse
        } else {
            Step::Accept
        });
        match step {
            Step::Refuse => Err(io::Error::from(io::ErrorKind::ConnectionRefused)),
            Step::Accept => Ok(self.stream(None, None)),
            Step::AcceptFailingAfter(n) => Ok(self.stream(Some(n), None)),
            Step::AcceptGated(gate) => Ok(self.stream(None, Some(gate))),
        }
    }

    fn describe(&self) -> String {
        "scripted://memory".to_owned()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    Overflow(BackpressurePolicy),
    EncodeFailed(String),
    ConnectFailed { attempt: u32, retry_in: Duration },
    Connected { attempts: u32 },
    WriteFailed,
    Abandoned,
}

/// Observer capturing events for assertions.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<Event>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    pub fn retry_delays(&self) -> Vec<Duration> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                Event::ConnectFailed { retry_in, .. } => Some(*retry_in),
                _ => None,
            })
            .collect()
    }

    /// Failed attempts preceding each successful connection.
    pub fn connections(&self) -> Vec<u32> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                Event::Connected { attempts } => Some(*attempts),
                _ => None,
            })
            .collect()
    }

    pub fn write_failures(&self) -> usize {
        self.count(|e| matches!(e, Event::WriteFailed))
    }

    pub fn overflows(&self) -> usize {
        self.count(|e| matches!(e, Event::Overflow(_)))
    }

    pub fn abandoned(&self) -> usize {
        self.count(|e| matches!(e, Event::Abandoned))
    }

    fn count(&self, pred: impl Fn(&Event) -> bool) -> usize {
        self.events.lock().iter().filter(|e| pred(e)).count()
    }

    fn push(&self, event: Event) {
        self.events.lock().push(event);
    }
}

impl DeliveryObserver for RecordingObserver {
    fn queue_overflow(&self, policy: BackpressurePolicy) {
        self.push(Event::Overflow(policy));
    }

    fn encode_failed(&self, err: &EncodeError) {
        self.push(Event::EncodeFailed(err.to_string()));
    }

    fn connect_failed(&self, _err: &DeliveryError, attempt: u32, retry_in: Duration) {
        self.push(Event::ConnectFailed { attempt, retry_in });
    }

    fn connected(&self, _endpoint: &str, attempts: u32) {
        self.push(Event::Connected { attempts });
    }

    fn write_failed(&self, _err: &DeliveryError) {
        self.push(Event::WriteFailed);
    }

    fn frame_abandoned(&self) {
        self.push(Event::Abandoned);
    }
}
