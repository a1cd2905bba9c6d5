//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Validated config + credentials → bind listeners → assemble group
//!
//! Group (group.rs):
//!     Run all actors → first exit → interrupt all → drain → first result
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → signal actor exits with an error → group shuts down
//!
//! Shutdown (shutdown.rs):
//!     Close latch used by the listener actors' interrupts
//! ```
//!
//! # Design Decisions
//! - No shared cancellation token: every actor is unblocked its own way
//! - Listeners bind before the group exists, so bind errors are fatal early

pub mod group;
pub mod shutdown;
pub mod signals;
pub mod startup;

pub use group::Group;
pub use shutdown::{Shutdown, ShutdownSignal};
pub use signals::{OsSignals, Signal, SignalError, SignalSource, SignalWaiter};
pub use startup::{ExitError, Service, StartupError};
