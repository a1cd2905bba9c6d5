//! Closable TCP listener with backpressure.
//!
//! # Responsibilities
//! - Bind to the configured address
//! - Accept incoming TCP connections
//! - Enforce a connection limit via semaphore
//! - Return promptly with [`ListenerError::Closed`] once closed
//!
//! # Design Decisions
//! - Closing is a [`Shutdown`] latch handed out by [`Listener::closer`], so
//!   the run-group interrupt does not need access to the listener itself

use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::lifecycle::shutdown::{Shutdown, ShutdownSignal};

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// Failed to bind to address.
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },
    /// Failed to accept connection.
    #[error("failed to accept: {0}")]
    Accept(#[source] std::io::Error),
    /// The listener was closed.
    #[error("use of closed listener")]
    Closed,
}

/// A bounded TCP listener that can be closed from another task.
pub struct Listener {
    inner: TcpListener,
    connection_limit: Arc<Semaphore>,
    max_connections: usize,
    closer: Shutdown,
    closed: ShutdownSignal,
}

impl Listener {
    /// Bind to `address`, allowing at most `max_connections` open at once.
    pub async fn bind(address: &str, max_connections: usize) -> Result<Self, ListenerError> {
        let bind_error = |source: std::io::Error| ListenerError::Bind {
            address: address.to_string(),
            source,
        };

        let addr: SocketAddr = address.parse().map_err(|e| {
            bind_error(std::io::Error::new(std::io::ErrorKind::InvalidInput, e))
        })?;
        let inner = TcpListener::bind(addr).await.map_err(bind_error)?;
        let local_addr = inner.local_addr().map_err(bind_error)?;

        tracing::info!(
            address = %local_addr,
            max_connections,
            "Listener bound"
        );

        Ok(Self::from_tcp(inner, max_connections))
    }

    /// Wrap an already bound Tokio listener.
    ///
    /// `max_connections` is capped at [`Semaphore::MAX_PERMITS`].
    pub fn from_tcp(inner: TcpListener, max_connections: usize) -> Self {
        let max_connections = max_connections.min(Semaphore::MAX_PERMITS);
        let closer = Shutdown::new();
        let closed = closer.subscribe();
        Self {
            inner,
            connection_limit: Arc::new(Semaphore::new(max_connections)),
            max_connections,
            closer,
            closed,
        }
    }

    /// Handle that closes this listener when triggered.
    pub fn closer(&self) -> Shutdown {
        self.closer.clone()
    }

    /// Accept a new connection, respecting the connection limit.
    ///
    /// Waits while the limit is reached. The returned permit must be held for
    /// the connection's lifetime. Once the listener is closed every call,
    /// including one already waiting, returns [`ListenerError::Closed`].
    pub async fn accept(
        &mut self,
    ) -> Result<(TcpStream, SocketAddr, ConnectionPermit), ListenerError> {
        if self.closed.is_triggered() {
            return Err(ListenerError::Closed);
        }

        tokio::select! {
            biased;
            _ = self.closed.wait() => Err(ListenerError::Closed),
            accepted = accept_within_limit(&self.inner, &self.connection_limit) => accepted,
        }
    }

    /// Get the local address this listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.inner.local_addr()
    }

    /// Get current available connection slots.
    pub fn available_permits(&self) -> usize {
        self.connection_limit.available_permits()
    }

    pub fn max_connections(&self) -> usize {
        self.max_connections
    }
}

async fn accept_within_limit(
    inner: &TcpListener,
    limit: &Arc<Semaphore>,
) -> Result<(TcpStream, SocketAddr, ConnectionPermit), ListenerError> {
    // Acquire permit first (backpressure). The semaphore is never closed.
    let permit = limit
        .clone()
        .acquire_owned()
        .await
        .map_err(|e| ListenerError::Accept(std::io::Error::other(e)))?;

    let (stream, addr) = inner.accept().await.map_err(ListenerError::Accept)?;

    tracing::debug!(
        peer_addr = %addr,
        available_permits = limit.available_permits(),
        "Connection accepted"
    );

    Ok((stream, addr, ConnectionPermit { _permit: permit }))
}

/// A connection slot, released when dropped.
#[derive(Debug)]
pub struct ConnectionPermit {
    _permit: OwnedSemaphorePermit,
}
