//! OS signal handling.
//!
//! # Responsibilities
//! - Subscribe to termination requests (SIGINT, SIGTERM)
//! - Park a run-group actor until a request arrives or the actor is cancelled
//! - Translate the outcome: a signal is an error, cancellation is clean
//!
//! # Design Decisions
//! - The subscription is behind [`SignalSource`] so tests inject signals
//!   through a channel instead of raising real ones
//! - Cancellation closes a private oneshot channel; the waiter treats the
//!   closed channel as a clean exit

use std::fmt;
use std::future::{self, Future};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

/// A termination request delivered to the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// SIGINT (Ctrl+C).
    Interrupt,
    /// SIGTERM.
    Terminate,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Interrupt => f.write_str("SIGINT"),
            Signal::Terminate => f.write_str("SIGTERM"),
        }
    }
}

/// Errors produced by the signal waiter.
#[derive(Debug, Error)]
pub enum SignalError {
    #[error("received signal {0}")]
    Received(Signal),
}

/// Anything that can deliver termination requests.
pub trait SignalSource: Send + 'static {
    /// Wait for the next request. `None` means the source can never deliver
    /// again.
    fn recv(&mut self) -> impl Future<Output = Option<Signal>> + Send;
}

/// Termination requests from the operating system.
#[derive(Debug)]
pub struct OsSignals {
    #[cfg(unix)]
    interrupt: tokio::signal::unix::Signal,
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
}

impl OsSignals {
    /// Register the process-wide handlers. Call once per process.
    #[cfg(unix)]
    pub fn subscribe() -> std::io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
        })
    }

    #[cfg(not(unix))]
    pub fn subscribe() -> std::io::Result<Self> {
        Ok(Self {})
    }
}

impl SignalSource for OsSignals {
    #[cfg(unix)]
    async fn recv(&mut self) -> Option<Signal> {
        tokio::select! {
            Some(()) = self.interrupt.recv() => Some(Signal::Interrupt),
            Some(()) = self.terminate.recv() => Some(Signal::Terminate),
            else => None,
        }
    }

    #[cfg(not(unix))]
    async fn recv(&mut self) -> Option<Signal> {
        tokio::signal::ctrl_c().await.ok().map(|()| Signal::Interrupt)
    }
}

impl SignalSource for mpsc::Receiver<Signal> {
    async fn recv(&mut self) -> Option<Signal> {
        mpsc::Receiver::recv(self).await
    }
}

/// Run half of the signal actor.
#[derive(Debug)]
pub struct SignalWaiter<S> {
    source: S,
    cancelled: oneshot::Receiver<()>,
}

/// Interrupt half of the signal actor.
#[derive(Debug)]
pub struct SignalCanceller {
    _tx: oneshot::Sender<()>,
}

impl SignalCanceller {
    /// Close the waiter's cancellation channel. Dropping has the same effect.
    pub fn cancel(self) {}
}

impl<S: SignalSource> SignalWaiter<S> {
    pub fn new(source: S) -> (Self, SignalCanceller) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                source,
                cancelled: rx,
            },
            SignalCanceller { _tx: tx },
        )
    }

    /// Block until a signal arrives (error) or the canceller fires (clean).
    pub async fn wait(self) -> Result<(), SignalError> {
        let Self {
            mut source,
            cancelled,
        } = self;

        let delivered = async move {
            match source.recv().await {
                Some(signal) => signal,
                None => future::pending().await,
            }
        };

        tokio::select! {
            signal = delivered => {
                tracing::info!(signal = %signal, "Termination signal received");
                Err(SignalError::Received(signal))
            }
            _ = cancelled => {
                tracing::debug!("Signal waiter cancelled");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn signal_is_reported_as_error() {
        let (tx, rx) = mpsc::channel(1);
        let (waiter, _canceller) = SignalWaiter::new(rx);

        tx.send(Signal::Terminate).await.unwrap();
        let err = waiter.wait().await.unwrap_err();
        assert!(matches!(err, SignalError::Received(Signal::Terminate)));
        assert_eq!(err.to_string(), "received signal SIGTERM");
    }

    #[tokio::test]
    async fn cancel_is_clean() {
        let (_tx, rx) = mpsc::channel::<Signal>(1);
        let (waiter, canceller) = SignalWaiter::new(rx);

        let handle = tokio::spawn(waiter.wait());
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!handle.is_finished());

        canceller.cancel();
        assert!(handle.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn exhausted_source_keeps_waiting_for_cancel() {
        let (tx, rx) = mpsc::channel::<Signal>(1);
        drop(tx);
        let (waiter, canceller) = SignalWaiter::new(rx);

        let handle = tokio::spawn(waiter.wait());
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!handle.is_finished());

        drop(canceller);
        assert!(handle.await.unwrap().is_ok());
    }

    #[test]
    fn signal_names() {
        assert_eq!(Signal::Interrupt.to_string(), "SIGINT");
        assert_eq!(Signal::Terminate.to_string(), "SIGTERM");
    }
}
