//! Connection identity and open-connection tracking.
//!
//! # Responsibilities
//! - Generate unique connection IDs for tracing
//! - Count connections that are still open
//! - Publish the open-connection gauge

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::observability::metrics;

/// Relaxed ordering is enough, IDs only need to be unique.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for an accepted connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn next() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Counts connections that have been accepted and not yet closed.
#[derive(Debug, Clone, Default)]
pub struct ConnectionTracker {
    open: Arc<AtomicU64>,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a newly accepted connection. The returned guard marks it closed
    /// when dropped.
    pub fn track(&self) -> ConnectionGuard {
        let open = self.open.fetch_add(1, Ordering::SeqCst) + 1;
        metrics::set_open_connections(open);
        ConnectionGuard {
            open: Arc::clone(&self.open),
            id: ConnectionId::next(),
        }
    }

    /// Connections currently open.
    pub fn open_count(&self) -> u64 {
        self.open.load(Ordering::SeqCst)
    }
}

/// Marks one connection as open for as long as it lives.
#[derive(Debug)]
pub struct ConnectionGuard {
    open: Arc<AtomicU64>,
    id: ConnectionId,
}

impl ConnectionGuard {
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        let open = self.open.fetch_sub(1, Ordering::SeqCst) - 1;
        metrics::set_open_connections(open);
        tracing::trace!(connection_id = %self.id, "Connection closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_ids_are_unique() {
        let first = ConnectionId::next();
        let second = ConnectionId::next();
        assert_ne!(first, second);
        assert!(second.as_u64() > first.as_u64());
        assert_eq!(format!("{}", ConnectionId(7)), "conn-7");
    }

    #[test]
    fn tracker_counts_open_connections() {
        let tracker = ConnectionTracker::new();
        assert_eq!(tracker.open_count(), 0);

        let first = tracker.track();
        let second = tracker.track();
        assert_eq!(tracker.open_count(), 2);
        assert_ne!(first.id(), second.id());

        drop(first);
        assert_eq!(tracker.open_count(), 1);

        drop(second);
        assert_eq!(tracker.open_count(), 0);
    }
}
