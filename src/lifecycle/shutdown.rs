//! Close latch used to unblock listeners.

use std::sync::Arc;
use tokio::sync::watch;

/// One-way latch that "closes" whatever is waiting on it.
///
/// Cloning yields another handle to the same latch. Triggering is idempotent,
/// and dropping every handle counts as a trigger for the waiters.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: Arc<watch::Sender<bool>>,
}

impl Shutdown {
    /// Create an untriggered latch.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Subscribe to the latch.
    pub fn subscribe(&self) -> ShutdownSignal {
        ShutdownSignal {
            rx: self.tx.subscribe(),
        }
    }

    /// Trip the latch. Safe to call any number of times.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    /// Whether the latch has been tripped.
    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving side of a [`Shutdown`] latch.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// Resolve once the latch is tripped or all of its handles are gone.
    pub async fn wait(&mut self) {
        let _ = self.rx.wait_for(|closed| *closed).await;
    }

    /// Non-blocking check.
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn wait_resolves_after_trigger() {
        let shutdown = Shutdown::new();
        let mut signal = shutdown.subscribe();

        let waiter = tokio::spawn(async move {
            signal.wait().await;
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());

        shutdown.trigger();
        waiter.await.unwrap();
        assert!(shutdown.is_triggered());
    }

    #[tokio::test]
    async fn trigger_is_idempotent_and_sticky() {
        let shutdown = Shutdown::new();
        shutdown.trigger();
        shutdown.trigger();

        // Subscribing after the fact still observes the closed state.
        let mut late = shutdown.subscribe();
        assert!(late.is_triggered());
        late.wait().await;
    }

    #[tokio::test]
    async fn dropping_all_handles_releases_waiters() {
        let shutdown = Shutdown::new();
        let mut signal = shutdown.subscribe();
        drop(shutdown);

        tokio::time::timeout(Duration::from_secs(1), signal.wait())
            .await
            .expect("waiter should be released");
    }
}
