//! Startup orchestration.
//!
//! # Responsibilities
//! - Bind both listeners from a validated configuration
//! - Wire the HTTP server, the secure line reader and the signal waiter into
//!   one run group, each with its own interrupt
//!
//! # Design Decisions
//! - Fail fast: bind errors surface before any actor runs
//! - Credentials are passed in, never read from global state

use std::net::SocketAddr;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use crate::config::ServiceConfig;
use crate::http::{BaseEndpoint, HttpServer};
use crate::lifecycle::group::Group;
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::signals::{SignalError, SignalSource, SignalWaiter};
use crate::net::listener::{Listener, ListenerError};
use crate::net::secure::{LineSettings, ReceivedLine, SecureError, SecureLineReader};
use crate::net::tls::TlsCredentials;

/// Fatal problems found before the group is launched.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to bind HTTP listener {address}: {source}")]
    HttpBind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    SecureBind(#[from] ListenerError),
}

/// Why the service stopped: the result of the first actor to exit.
#[derive(Debug, Error)]
pub enum ExitError {
    #[error(transparent)]
    Signal(#[from] SignalError),

    #[error("http server: {0}")]
    Http(#[source] std::io::Error),

    #[error(transparent)]
    Secure(#[from] SecureError),
}

impl ExitError {
    /// Whether the exit was requested by a termination signal.
    pub fn is_signal(&self) -> bool {
        matches!(self, ExitError::Signal(_))
    }
}

/// The assembled, not yet running, service.
#[derive(Debug)]
pub struct Service {
    group: Group<ExitError>,
    http_addr: SocketAddr,
    secure_addr: SocketAddr,
}

impl Service {
    /// Bind listeners and register the `http`, `secure-lines` and `signals`
    /// actors.
    ///
    /// Lines read by the secure listener are forwarded to `tap` when given.
    pub async fn assemble<S: SignalSource>(
        config: &ServiceConfig,
        credentials: &TlsCredentials,
        signals: S,
        tap: Option<mpsc::UnboundedSender<ReceivedLine>>,
    ) -> Result<Self, StartupError> {
        let http_listener = TcpListener::bind(&config.http.bind_address)
            .await
            .map_err(|source| StartupError::HttpBind {
                address: config.http.bind_address.clone(),
                source,
            })?;
        let http_addr = http_listener
            .local_addr()
            .map_err(|source| StartupError::HttpBind {
                address: config.http.bind_address.clone(),
                source,
            })?;

        let secure_listener =
            Listener::bind(&config.secure.bind_address, config.secure.max_connections).await?;
        let secure_addr = secure_listener
            .local_addr()
            .map_err(|source| ListenerError::Bind {
                address: config.secure.bind_address.clone(),
                source,
            })?;

        let mut group: Group<ExitError> = Group::new();

        {
            let server = HttpServer::new(&config.http, BaseEndpoint);
            let close = Shutdown::new();
            let closed = close.subscribe();
            group.add_named(
                "http",
                move || async move { server.run(http_listener, closed).await.map_err(ExitError::Http) },
                move |_| close.trigger(),
            );
        }
        {
            let close = secure_listener.closer();
            let mut reader = SecureLineReader::new(
                secure_listener,
                credentials,
                LineSettings::from(&config.secure),
            );
            if let Some(tap) = tap {
                reader = reader.with_tap(tap);
            }
            group.add_named(
                "secure-lines",
                move || async move { reader.run().await.map_err(ExitError::from) },
                move |_| close.trigger(),
            );
        }
        {
            // Waits for SIGINT/SIGTERM; cancelled by closing its channel.
            let (waiter, canceller) = SignalWaiter::new(signals);
            group.add_named(
                "signals",
                move || async move { waiter.wait().await.map_err(ExitError::from) },
                move |_| canceller.cancel(),
            );
        }

        tracing::info!(
            http_address = %http_addr,
            secure_address = %secure_addr,
            actors = group.len(),
            "Service assembled"
        );

        Ok(Self {
            group,
            http_addr,
            secure_addr,
        })
    }

    pub fn http_addr(&self) -> SocketAddr {
        self.http_addr
    }

    pub fn secure_addr(&self) -> SocketAddr {
        self.secure_addr
    }

    /// Run until the first actor exits; every other actor is then
    /// interrupted and awaited.
    pub async fn run(self) -> Result<(), ExitError> {
        self.group.run().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::signals::Signal;

    #[test]
    fn exit_error_messages() {
        let err = ExitError::from(SignalError::Received(Signal::Interrupt));
        assert!(err.is_signal());
        assert_eq!(err.to_string(), "received signal SIGINT");

        let err = ExitError::Http(std::io::Error::other("listener gone"));
        assert!(!err.is_signal());
        assert_eq!(err.to_string(), "http server: listener gone");

        let err = ExitError::from(SecureError::from(ListenerError::Closed));
        assert_eq!(err.to_string(), "secure listener: use of closed listener");
    }
}
