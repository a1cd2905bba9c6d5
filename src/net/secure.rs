//! TLS line reader.
//!
//! # Responsibilities
//! - Accept raw TCP connections and run the TLS handshake
//! - Read a single newline-terminated line from each client
//! - Log the line (and optionally forward it to a tap)
//! - Close the connection as soon as the line has been handled
//!
//! # Design Decisions
//! - Each connection is handled on its own task; the accept loop never
//!   waits for a slow client
//! - Per-connection failures are logged and do not end the loop
//! - Closing the listener ends the loop cleanly and aborts in-flight
//!   connections

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time;
use tokio_rustls::TlsAcceptor;

use crate::config::SecureConfig;
use crate::net::connection::{ConnectionGuard, ConnectionId, ConnectionTracker};
use crate::net::listener::{ConnectionPermit, Listener, ListenerError};
use crate::net::tls::TlsCredentials;
use crate::observability::metrics;

/// Errors that end the line reader.
#[derive(Debug, Error)]
pub enum SecureError {
    #[error("secure listener: {0}")]
    Listener(#[from] ListenerError),
}

/// Failure handling one connection. Logged, never propagated.
#[derive(Debug, Error)]
enum ConnectionError {
    #[error("TLS handshake failed: {0}")]
    Handshake(#[source] std::io::Error),
    #[error("read failed: {0}")]
    Read(#[source] std::io::Error),
    #[error("line longer than {0} bytes")]
    LineTooLong(usize),
    #[error("line is not valid UTF-8: {0}")]
    NotUtf8(#[source] std::string::FromUtf8Error),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// A line received from a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedLine {
    pub connection: ConnectionId,
    pub peer: SocketAddr,
    pub line: String,
}

/// Per-connection limits.
#[derive(Debug, Clone, Copy)]
pub struct LineSettings {
    /// Deadline for handshake plus read.
    pub read_timeout: Duration,
    /// Longest accepted line, newline included.
    pub max_line_bytes: usize,
}

impl From<&SecureConfig> for LineSettings {
    fn from(config: &SecureConfig) -> Self {
        Self {
            read_timeout: Duration::from_secs(config.read_timeout_secs),
            max_line_bytes: config.max_line_bytes,
        }
    }
}

/// Accept loop for the TLS line protocol.
pub struct SecureLineReader {
    listener: Listener,
    acceptor: TlsAcceptor,
    settings: LineSettings,
    tracker: ConnectionTracker,
    tap: Option<mpsc::UnboundedSender<ReceivedLine>>,
}

impl SecureLineReader {
    pub fn new(listener: Listener, credentials: &TlsCredentials, settings: LineSettings) -> Self {
        Self {
            listener,
            acceptor: credentials.acceptor(),
            settings,
            tracker: ConnectionTracker::new(),
            tap: None,
        }
    }

    /// Forward every received line to `tap` in addition to logging it.
    pub fn with_tap(mut self, tap: mpsc::UnboundedSender<ReceivedLine>) -> Self {
        self.tap = Some(tap);
        self
    }

    /// Accept connections until the listener is closed.
    pub async fn run(mut self) -> Result<(), SecureError> {
        tracing::info!(
            address = ?self.listener.local_addr().ok(),
            "Secure line reader starting"
        );

        let mut connections = JoinSet::new();
        let outcome = loop {
            let (stream, peer, permit) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(ListenerError::Closed) => break Ok(()),
                Err(e) => {
                    tracing::error!(error = %e, "Secure accept failed");
                    break Err(SecureError::from(e));
                }
            };

            let connection = Connection {
                guard: self.tracker.track(),
                _permit: permit,
                peer,
            };
            connections.spawn(connection.handle(
                stream,
                self.acceptor.clone(),
                self.settings,
                self.tap.clone(),
            ));

            // Reap finished connections so the set does not grow unbounded.
            while connections.try_join_next().is_some() {}
        };

        connections.shutdown().await;
        tracing::info!(open = self.tracker.open_count(), "Secure line reader stopped");
        outcome
    }
}

/// An accepted connection and the resources it holds until closed.
struct Connection {
    guard: ConnectionGuard,
    _permit: ConnectionPermit,
    peer: SocketAddr,
}

impl Connection {
    async fn handle(
        self,
        stream: TcpStream,
        acceptor: TlsAcceptor,
        settings: LineSettings,
        tap: Option<mpsc::UnboundedSender<ReceivedLine>>,
    ) {
        let id = self.guard.id();
        let exchange = read_line(stream, acceptor, settings.max_line_bytes);

        let line = match time::timeout(settings.read_timeout, exchange).await {
            Ok(Ok(line)) => line,
            Ok(Err(e)) => return self.fail(e),
            Err(_) => return self.fail(ConnectionError::Timeout(settings.read_timeout)),
        };

        match line {
            Some(line) => {
                tracing::info!(connection_id = %id, peer = %self.peer, line = %line, "Line received");
                metrics::record_line();
                if let Some(tap) = tap {
                    let _ = tap.send(ReceivedLine {
                        connection: id,
                        peer: self.peer,
                        line,
                    });
                }
            }
            None => {
                tracing::debug!(connection_id = %id, peer = %self.peer, "Connection closed without data");
            }
        }
    }

    fn fail(self, error: ConnectionError) {
        tracing::warn!(
            connection_id = %self.guard.id(),
            peer = %self.peer,
            error = %error,
            "Secure connection failed"
        );
        metrics::record_connection_error();
    }
}

/// Handshake, read one line, then close. Returns `None` on immediate EOF.
async fn read_line(
    stream: TcpStream,
    acceptor: TlsAcceptor,
    max_line_bytes: usize,
) -> Result<Option<String>, ConnectionError> {
    let tls = acceptor
        .accept(stream)
        .await
        .map_err(ConnectionError::Handshake)?;

    // One byte past the limit tells an exact fit from an overflow.
    let limit = (max_line_bytes as u64).saturating_add(1);
    let mut reader = BufReader::new(tls);
    let mut buf = Vec::new();
    let read = (&mut reader)
        .take(limit)
        .read_until(b'\n', &mut buf)
        .await
        .map_err(ConnectionError::Read)?;

    let mut tls = reader.into_inner();
    let _ = tls.shutdown().await;

    if read == 0 {
        return Ok(None);
    }
    decode_line(buf, max_line_bytes).map(Some)
}

/// Reject over-long or non-UTF-8 input, then strip the line terminator.
fn decode_line(mut buf: Vec<u8>, max_line_bytes: usize) -> Result<String, ConnectionError> {
    if buf.len() > max_line_bytes {
        return Err(ConnectionError::LineTooLong(max_line_bytes));
    }
    let trimmed = buf
        .iter()
        .rposition(|b| !matches!(b, b'\r' | b'\n'))
        .map_or(0, |last| last + 1);
    buf.truncate(trimmed);
    String::from_utf8(buf).map_err(ConnectionError::NotUtf8)
}
