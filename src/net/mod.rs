//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept, connection limits, close)
//!     → tls.rs (credentials → acceptor)
//!     → connection.rs (IDs, open-connection tracking)
//!     → secure.rs (handshake, read one line, close)
//! ```
//!
//! # Design Decisions
//! - Bounded accept queue prevents resource exhaustion
//! - Listeners are closed through a latch so any task can unblock them
//! - Connections are closed as soon as they are handled

pub mod connection;
pub mod listener;
pub mod secure;
pub mod tls;

pub use listener::{Listener, ListenerError};
pub use secure::{LineSettings, ReceivedLine, SecureError, SecureLineReader};
pub use tls::{TlsCredentials, TlsError};
