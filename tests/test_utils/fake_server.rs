//! In-process stand-in for a Logstash `json_lines` TCP input.
//!
//! Accepts any number of connections, splits each stream on `\n` and parses
//! every line as JSON. Tests wait on [`FakeLogstash::wait_for`] rather than
//! sleeping.

use std::{
    io::{BufRead, BufReader},
    net::{Shutdown, SocketAddr, TcpListener, TcpStream},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

use parking_lot::{Condvar, Mutex};
use serde_json::Value;

#[derive(Default)]
struct Received {
    documents: Vec<Value>,
    connections: usize,
}

#[derive(Default)]
struct Shared {
    received: Mutex<Received>,
    changed: Condvar,
    streams: Mutex<Vec<TcpStream>>,
    stopped: AtomicBool,
}

pub struct FakeLogstash {
    addr: SocketAddr,
    shared: Arc<Shared>,
    acceptor: Option<thread::JoinHandle<()>>,
}

impl FakeLogstash {
    /// Listen on an ephemeral loopback port.
    pub fn start() -> Self {
        Self::bind("127.0.0.1:0".parse().expect("loopback address"))
    }

    /// Listen on `addr`, typically a port freed by an earlier server.
    pub fn bind(addr: SocketAddr) -> Self {
        let listener = TcpListener::bind(addr).expect("bind fake logstash");
        let addr = listener.local_addr().expect("local addr");
        let shared = Arc::new(Shared::default());
        let acceptor = {
            let shared = Arc::clone(&shared);
            thread::spawn(move || accept_loop(listener, shared))
        };
        Self {
            addr,
            shared,
            acceptor: Some(acceptor),
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn documents(&self) -> Vec<Value> {
        self.shared.received.lock().documents.clone()
    }

    pub fn connections(&self) -> usize {
        self.shared.received.lock().connections
    }

    /// Block until at least `count` documents arrived or `timeout` elapses.
    pub fn wait_for(&self, count: usize, timeout: Duration) -> Vec<Value> {
        let deadline = Instant::now() + timeout;
        let mut received = self.shared.received.lock();
        while received.documents.len() < count {
            if self
                .shared
                .changed
                .wait_until(&mut received, deadline)
                .timed_out()
            {
                break;
            }
        }
        received.documents.clone()
    }

    /// Stop accepting and reset every open connection.
    pub fn stop(mut self) -> SocketAddr {
        self.shutdown();
        self.addr
    }

    fn shutdown(&mut self) {
        if self.shared.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        // Unblock `accept`.
        let _ = TcpStream::connect(self.addr);
        for stream in self.shared.streams.lock().drain(..) {
            let _ = stream.shutdown(Shutdown::Both);
        }
        if let Some(acceptor) = self.acceptor.take() {
            let _ = acceptor.join();
        }
    }
}

impl Drop for FakeLogstash {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn accept_loop(listener: TcpListener, shared: Arc<Shared>) {
    for stream in listener.incoming() {
        if shared.stopped.load(Ordering::SeqCst) {
            break;
        }
        let Ok(stream) = stream else { continue };
        if let Ok(clone) = stream.try_clone() {
            shared.streams.lock().push(clone);
        }
        shared.received.lock().connections += 1;
        let shared = Arc::clone(&shared);
        thread::spawn(move || read_lines(stream, shared));
    }
}

fn read_lines(stream: TcpStream, shared: Arc<Shared>) {
    for line in BufReader::new(stream).lines() {
        let Ok(line) = line else { break };
        if line.is_empty() {
            continue;
        }
        let document = serde_json::from_str(&line).expect("collector received valid json");
        shared.received.lock().documents.push(document);
        shared.changed.notify_all();
    }
}
