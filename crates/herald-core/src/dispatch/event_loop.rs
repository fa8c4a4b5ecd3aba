//! Single-consumer execution strategy
//!
//! One dedicated thread drains the backlog in FIFO order and executes tasks.
//! A failure inside one task (a router error or a panic) is contained to that
//! task; the loop keeps going. No two tasks of one dispatcher ever execute
//! concurrently.

use crate::dispatch::dispatcher::{DispatchStats, Dispatcher, DispatcherConfig, FailureHandler};
use crate::dispatch::state::DispatcherState;
use crate::dispatch::task::TaskLease;
use crate::error::DispatchError;
use crate::routing::{Consumer, Fault, Registry, Router};
use parking_lot::Mutex;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Event dispatcher executing tasks on one dedicated loop thread
///
/// Built inert: `new` allocates the core but spawns nothing, so dispatches
/// buffer in the backlog until [`start`](EventLoop::start) activates the loop.
pub struct EventLoop<K, E> {
    core: Arc<Dispatcher<K, E>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl<K: Send + 'static, E: Send + 'static> EventLoop<K, E> {
    /// Build an inert dispatcher around `router`
    pub fn new(config: DispatcherConfig, router: Arc<dyn Router<K, E>>) -> Self {
        Self {
            core: Arc::new(Dispatcher::new(config, router, None)),
            handle: Mutex::new(None),
        }
    }

    /// Build with a handler for failures no error consumer absorbed
    pub fn with_failure_handler(
        config: DispatcherConfig,
        router: Arc<dyn Router<K, E>>,
        on_failure: FailureHandler,
    ) -> Self {
        Self {
            core: Arc::new(Dispatcher::new(config, router, Some(on_failure))),
            handle: Mutex::new(None),
        }
    }

    /// Spawn the execution thread
    ///
    /// Idempotent, and refused once the dispatcher has shut down or halted.
    pub fn start(&self) {
        if !self.core.activate() {
            return;
        }

        let core = Arc::clone(&self.core);
        let handle = thread::Builder::new()
            .name(format!("{}-dispatch", core.name()))
            .spawn(move || run_loop(core))
            .expect("Failed to spawn dispatch thread");

        *self.handle.lock() = Some(handle);
    }
}

impl<K, E> EventLoop<K, E> {
    /// Submit one event for asynchronous routing
    ///
    /// See [`Dispatcher::dispatch`] for blocking and failure semantics.
    pub fn dispatch(
        &self,
        key: K,
        event: E,
        registry: Option<Arc<dyn Registry<K, E>>>,
        on_complete: Option<Arc<dyn Consumer<E>>>,
        on_error: Option<Arc<dyn Consumer<Fault>>>,
    ) -> Result<(), DispatchError> {
        self.core.dispatch(key, event, registry, on_complete, on_error)
    }

    /// Stop accepting work; the loop drains what is already queued
    pub fn shutdown(&self) {
        self.core.shutdown();
    }

    /// Terminate immediately, discarding queued tasks
    ///
    /// The loop exits at its next poll; `shutdown_and_wait` or drop joins the
    /// thread.
    pub fn halt(&self) {
        self.core.halt();
    }

    /// Shut down, then wait up to `timeout` for the loop thread to finish
    ///
    /// Returns true when the thread terminated inside the window. On timeout
    /// the handle is dropped and the detached loop keeps draining; the timeout
    /// is reported as false rather than swallowed.
    pub fn shutdown_and_wait(&self, timeout: Duration) -> bool {
        self.shutdown();

        let Some(handle) = self.handle.lock().take() else {
            // Never started: shutdown() already completed the lifecycle
            return true;
        };

        let start = Instant::now();
        loop {
            if handle.is_finished() {
                let _ = handle.join();
                return true;
            }
            if start.elapsed() > timeout {
                drop(handle);
                return false;
            }
            thread::sleep(Duration::from_millis(5));
        }
    }

    /// Current lifecycle stage
    pub fn state(&self) -> DispatcherState {
        self.core.state()
    }

    /// Counters snapshot
    pub fn stats(&self) -> DispatchStats {
        self.core.stats()
    }

    /// Context name
    pub fn name(&self) -> &str {
        self.core.name()
    }

    /// Whether the execution thread has been spawned
    pub fn is_started(&self) -> bool {
        self.handle.lock().is_some()
    }
}

impl<K, E> Drop for EventLoop<K, E> {
    fn drop(&mut self) {
        self.core.halt();
        if let Some(handle) = self.handle.lock().take() {
            let _ = handle.join();
        }
    }
}

/// Loop body of the execution thread
///
/// Polls with a bounded wait so an idle loop periodically re-checks
/// termination instead of blocking forever. Exits when the dispatcher is
/// terminated, or once it is draining and the backlog has emptied.
fn run_loop<K, E>(core: Arc<Dispatcher<K, E>>) {
    loop {
        match core.poll_next() {
            Some(lease) => {
                if core.state() == DispatcherState::Terminated {
                    // Halted between enqueue and poll: recycle unexecuted
                    core.note_discarded(1);
                    continue;
                }
                execute(&core, lease);
            }
            None => match core.state() {
                DispatcherState::Terminated => break,
                DispatcherState::Draining if core.backlog_drained() => {
                    core.mark_terminated();
                    break;
                }
                _ => {}
            },
        }
    }

    tracing::debug!("Dispatcher '{}' loop thread exiting", core.name());
}

/// Execute one task, containing any failure to this iteration
///
/// The lease drops on every path out, returning the task to the pool.
fn execute<K, E>(core: &Dispatcher<K, E>, lease: TaskLease<K, E>) {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| lease.lock().execute()));
    match outcome {
        Ok(Ok(())) => core.note_executed(),
        Ok(Err(fault)) => core.report_failure(fault),
        Err(payload) => core.report_failure(panic_fault(payload)),
    }
}

fn panic_fault(payload: Box<dyn Any + Send>) -> Fault {
    let message = if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "task panicked".to_string()
    };
    message.into()
}
