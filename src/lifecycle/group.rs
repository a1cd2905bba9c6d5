//! Actor run group.
//!
//! A [`Group`] runs a set of actors concurrently. Each actor is a `run`
//! operation paired with an `interrupt` operation. When the first `run`
//! returns, every registered interrupt is invoked (including the one whose
//! actor just finished) and the group waits for all remaining runs to
//! return before handing back the first actor's result.
//!
//! # Example
//! ```no_run
//! # async fn demo() -> Result<(), String> {
//! use dual_listener::lifecycle::Group;
//! use tokio::sync::oneshot;
//!
//! let mut group: Group<String> = Group::new();
//!
//! let (stop_tx, stop_rx) = oneshot::channel::<()>();
//! group.add(
//!     move || async move {
//!         let _ = stop_rx.await;
//!         Ok(())
//!     },
//!     move |_| drop(stop_tx),
//! );
//! group.add(|| async { Err("done".to_string()) }, |_| {});
//!
//! group.run().await
//! # }
//! ```
//!
//! # Design Decisions
//! - `run` consumes the group: no actor can be added after launch and a
//!   group cannot be reused.
//! - Each actor brings its own unblocking mechanism; there is no shared
//!   cancellation token.
//! - Panics are not contained. A panicking actor brings the caller down.
//! - Only the first result is reported; later errors are logged and dropped.

use std::fmt;
use std::future::Future;
use std::panic;
use std::pin::Pin;
use tokio::task::{JoinError, JoinSet};
use tracing::Instrument;

type RunFuture<E> = Pin<Box<dyn Future<Output = Result<(), E>> + Send>>;
type Interrupt<E> = Box<dyn FnOnce(Option<&E>) + Send>;

enum Launch<E> {
    /// Started as a task on the async runtime.
    Async(Box<dyn FnOnce() -> RunFuture<E> + Send>),
    /// Started on the blocking thread pool.
    Blocking(Box<dyn FnOnce() -> Result<(), E> + Send>),
}

struct Actor<E> {
    name: String,
    launch: Launch<E>,
    interrupt: Interrupt<E>,
}

/// A set of actors that live and die together.
pub struct Group<E> {
    actors: Vec<Actor<E>>,
}

impl<E> Group<E>
where
    E: fmt::Display + Send + 'static,
{
    /// Create an empty group.
    pub fn new() -> Self {
        Self { actors: Vec::new() }
    }

    /// Register an actor labelled `actor-<index>`.
    ///
    /// `run` is only called when the group is launched. `interrupt` must make
    /// a still-running `run` return promptly and must tolerate being called
    /// after `run` already returned. It receives the error of the first actor
    /// to exit, or `None` if that actor exited cleanly.
    pub fn add<R, Fut, I>(&mut self, run: R, interrupt: I)
    where
        R: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        I: FnOnce(Option<&E>) + Send + 'static,
    {
        let name = format!("actor-{}", self.actors.len());
        self.add_named(name, run, interrupt);
    }

    /// Register an actor under a name used in log output.
    pub fn add_named<R, Fut, I>(&mut self, name: impl Into<String>, run: R, interrupt: I)
    where
        R: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        I: FnOnce(Option<&E>) + Send + 'static,
    {
        self.actors.push(Actor {
            name: name.into(),
            launch: Launch::Async(Box::new(move || -> RunFuture<E> { Box::pin(run()) })),
            interrupt: Box::new(interrupt),
        });
    }

    /// Register an actor whose `run` blocks its thread.
    ///
    /// The run executes on Tokio's blocking pool so it never stalls the
    /// runtime's worker threads.
    pub fn add_blocking<R, I>(&mut self, name: impl Into<String>, run: R, interrupt: I)
    where
        R: FnOnce() -> Result<(), E> + Send + 'static,
        I: FnOnce(Option<&E>) + Send + 'static,
    {
        self.actors.push(Actor {
            name: name.into(),
            launch: Launch::Blocking(Box::new(run)),
            interrupt: Box::new(interrupt),
        });
    }

    /// Number of registered actors.
    pub fn len(&self) -> usize {
        self.actors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }

    /// Run every actor until the first one exits, then interrupt and drain
    /// the rest.
    ///
    /// Returns the result of the first actor to exit. An empty group returns
    /// `Ok(())` immediately.
    ///
    /// Interrupts are called one after another on the calling task, so they
    /// must not block.
    pub async fn run(self) -> Result<(), E> {
        if self.actors.is_empty() {
            return Ok(());
        }

        let total = self.actors.len();
        let mut names = Vec::with_capacity(total);
        let mut interrupts = Vec::with_capacity(total);
        let mut tasks = JoinSet::new();

        for (index, actor) in self.actors.into_iter().enumerate() {
            let span = tracing::info_span!("actor", name = %actor.name);
            match actor.launch {
                Launch::Async(run) => {
                    tasks.spawn(async move { (index, run().await) }.instrument(span));
                }
                Launch::Blocking(run) => {
                    tasks.spawn_blocking(move || (index, span.in_scope(run)));
                }
            }
            names.push(actor.name);
            interrupts.push(actor.interrupt);
        }

        tracing::debug!(actors = total, "Run group launched");

        let (first, result) = match tasks.join_next().await {
            Some(joined) => settle(joined),
            None => return Ok(()),
        };
        let first_name = first.map(|index| names[index].as_str()).unwrap_or("unknown");

        match &result {
            Ok(()) => tracing::info!(actor = first_name, "Actor exited, interrupting group"),
            Err(e) => tracing::info!(actor = first_name, error = %e, "Actor failed, interrupting group"),
        }

        let reason = result.as_ref().err();
        for interrupt in interrupts {
            interrupt(reason);
        }

        while let Some(joined) = tasks.join_next().await {
            let (index, outcome) = settle(joined);
            let name = index.map(|index| names[index].as_str()).unwrap_or("unknown");
            match outcome {
                Ok(()) => tracing::debug!(actor = name, "Actor drained"),
                Err(e) => tracing::debug!(actor = name, error = %e, "Actor drained with error (discarded)"),
            }
        }

        tracing::debug!(actors = total, "Run group finished");
        result
    }
}

impl<E> Default for Group<E>
where
    E: fmt::Display + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for Group<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Group")
            .field("actors", &self.actors.iter().map(|a| a.name.as_str()).collect::<Vec<_>>())
            .finish()
    }
}

/// Unpack a joined task. Panics are resumed on the caller.
fn settle<E>(joined: Result<(usize, Result<(), E>), JoinError>) -> (Option<usize>, Result<(), E>) {
    match joined {
        Ok((index, outcome)) => (Some(index), outcome),
        Err(err) if err.is_panic() => panic::resume_unwind(err.into_panic()),
        Err(err) => {
            // Only reachable when the runtime itself is shutting down.
            tracing::warn!(error = %err, "Actor task cancelled");
            (None, Ok(()))
        }
    }
}
