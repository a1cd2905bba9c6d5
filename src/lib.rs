//! Dual listener service.
//!
//! A plaintext HTTP endpoint and a TLS line reader run side by side under a
//! run group. The first actor to exit (a listener failure or a termination
//! signal) interrupts the others, and the process exits once all of them
//! have returned.
//!
//! ```text
//!                 ┌──────────────────── Group ────────────────────┐
//!                 │                                                │
//!  HTTP client ──▶│  http          (axum, interrupt: close latch)  │
//!                 │                                                │
//!  TLS client  ──▶│  secure-lines  (tokio-rustls, interrupt: close)│
//!                 │                                                │
//!  SIGINT/TERM ──▶│  signals       (interrupt: close channel)      │
//!                 └────────────────────────────────────────────────┘
//!                               first exit → interrupt all → drain
//! ```

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;

pub use config::ServiceConfig;
pub use lifecycle::{ExitError, Group, Service};
pub use net::TlsCredentials;
