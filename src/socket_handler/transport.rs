//! Transport primitives for the handler.
//!
//! The connection supervisor only knows the [`Connector`] trait; the
//! [`TcpConnector`] implementation dials plain TCP or wraps the stream in TLS.

use std::{
    io::{self, Write},
    net::{SocketAddr, TcpStream, ToSocketAddrs},
    time::Duration,
};

use native_tls::{TlsConnector, TlsStream};

/// Produces connected byte streams on demand.
///
/// The supervisor calls [`connect`](Connector::connect) every time it needs a
/// fresh connection, including after a write failure, so implementations must
/// be reusable.
pub trait Connector: Send + 'static {
    type Stream: Write + Send;

    /// Establish a new connection or report why it could not be opened.
    fn connect(&mut self) -> io::Result<Self::Stream>;

    /// Human-readable endpoint description used in diagnostics.
    fn describe(&self) -> String {
        "remote endpoint".to_owned()
    }
}

/// TCP endpoint configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TcpTransport {
    /// Hostname or IP address to connect to.
    pub host: String,
    /// TCP port number.
    pub port: u16,
    /// Optional TLS configuration.
    pub tls: Option<TlsOptions>,
}

impl TcpTransport {
    fn socket_addrs(&self) -> io::Result<Vec<SocketAddr>> {
        (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map(|iter| iter.collect())
    }
}

/// TLS connection options.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TlsOptions {
    /// Domain name presented during the TLS handshake.
    pub domain: String,
    /// Validate the peer certificate and hostname.
    pub verify: bool,
}

impl TlsOptions {
    fn connector(&self) -> io::Result<TlsConnector> {
        let mut builder = TlsConnector::builder();
        if !self.verify {
            builder.danger_accept_invalid_certs(true);
            builder.danger_accept_invalid_hostnames(true);
        }
        builder.build().map_err(io::Error::other)
    }
}

/// Active socket connection produced by [`TcpConnector`].
#[derive(Debug)]
pub enum ActiveConnection {
    PlainTcp(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl Write for ActiveConnection {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            ActiveConnection::PlainTcp(stream) => stream.write(buf),
            ActiveConnection::Tls(stream) => stream.write(buf),
        }
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        match self {
            ActiveConnection::PlainTcp(stream) => stream.write_all(buf),
            ActiveConnection::Tls(stream) => stream.write_all(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            ActiveConnection::PlainTcp(stream) => stream.flush(),
            ActiveConnection::Tls(stream) => stream.flush(),
        }
    }
}

/// Connector dialling a [`TcpTransport`], optionally over TLS.
#[derive(Clone, Debug)]
pub struct TcpConnector {
    transport: TcpTransport,
    connect_timeout: Duration,
    write_timeout: Duration,
}

impl TcpConnector {
    pub fn new(transport: TcpTransport, connect_timeout: Duration, write_timeout: Duration) -> Self {
        Self {
            transport,
            connect_timeout,
            write_timeout,
        }
    }
}

impl Connector for TcpConnector {
    type Stream = ActiveConnection;

    fn connect(&mut self) -> io::Result<ActiveConnection> {
        let stream = connect_tcp(&self.transport, self.connect_timeout)?;
        stream.set_nodelay(true)?;
        let Some(tls) = &self.transport.tls else {
            stream.set_write_timeout(Some(self.write_timeout))?;
            return Ok(ActiveConnection::PlainTcp(stream));
        };
        let connector = tls.connector()?;
        stream.set_read_timeout(Some(self.connect_timeout))?;
        stream.set_write_timeout(Some(self.connect_timeout))?;
        let stream = connector
            .connect(&tls.domain, stream)
            .map_err(io::Error::other)?;
        let tcp_ref = stream.get_ref();
        tcp_ref.set_read_timeout(None)?;
        tcp_ref.set_write_timeout(Some(self.write_timeout))?;
        Ok(ActiveConnection::Tls(Box::new(stream)))
    }

    fn describe(&self) -> String {
        let scheme = if self.transport.tls.is_some() { "tls" } else { "tcp" };
        format!("{scheme}://{}:{}", self.transport.host, self.transport.port)
    }
}

fn connect_tcp(config: &TcpTransport, timeout: Duration) -> io::Result<TcpStream> {
    let mut last_err = None;
    for addr in config.socket_addrs()? {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(err) => last_err = Some(err),
        }
    }
    Err(last_err.unwrap_or_else(|| {
        io::Error::new(
            io::ErrorKind::NotFound,
            format!("no addresses resolved for {}:{}", config.host, config.port),
        )
    }))
}
