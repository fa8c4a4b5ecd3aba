//! Shared dispatcher core: lifecycle, backlog, pool, and accounting
//!
//! Concrete execution strategies compose this core instead of subclassing it.
//! The core gates and enqueues dispatches, owns the shutdown/halt state
//! machine, and reports failures; it never spawns threads itself. That is the
//! strategy's job (see `EventLoop`).

use crate::dispatch::backlog::Backlog;
use crate::dispatch::pool::SlotPool;
use crate::dispatch::state::{DispatcherState, Lifecycle};
use crate::dispatch::task::{DispatchTask, TaskLease};
use crate::error::DispatchError;
use crate::routing::{Consumer, Fault, Registry, Router};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::Thread;
use std::time::Duration;

/// Handler invoked with the executing thread and the fault for failures no
/// error consumer absorbed
pub type FailureHandler = Arc<dyn Fn(&Thread, &Fault) + Send + Sync>;

/// Dispatcher construction parameters
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Context name used for diagnostics and thread naming
    pub name: String,
    /// Maximum queued, not-yet-executed tasks
    pub capacity: usize,
    /// Bound of one poll cycle; the loop re-checks termination at this cadence
    pub poll_interval: Duration,
}

impl DispatcherConfig {
    /// Config with the given name and backlog capacity
    pub fn new(name: impl Into<String>, capacity: usize) -> Self {
        Self {
            name: name.into(),
            capacity,
            poll_interval: Duration::from_secs(1),
        }
    }
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self::new("dispatcher", 128)
    }
}

/// Dispatcher counters snapshot
#[derive(Debug, Clone, Default)]
pub struct DispatchStats {
    /// Tasks successfully enqueued
    pub dispatched: u64,
    /// Tasks whose router call returned cleanly
    pub executed: u64,
    /// Tasks whose execution failed (router error or panic)
    pub failed: u64,
    /// Tasks discarded unexecuted by halt or a never-started shutdown
    pub discarded: u64,
}

#[derive(Default)]
struct Counters {
    dispatched: AtomicU64,
    executed: AtomicU64,
    failed: AtomicU64,
    discarded: AtomicU64,
}

/// Shared lifecycle/queue/pool core of one dispatch channel
///
/// Arbitrarily many producer threads may call `dispatch` concurrently; the
/// backlog is the sole synchronization boundary toward the consumer side.
pub struct Dispatcher<K, E> {
    name: String,
    poll_interval: Duration,
    backlog: Backlog<TaskLease<K, E>>,
    pool: SlotPool<DispatchTask<K, E>>,
    lifecycle: Lifecycle,
    router: Arc<dyn Router<K, E>>,
    on_failure: Option<FailureHandler>,
    counters: Counters,
}

impl<K: 'static, E: 'static> Dispatcher<K, E> {
    /// Build an inert dispatcher core around `router`
    pub fn new(
        config: DispatcherConfig,
        router: Arc<dyn Router<K, E>>,
        on_failure: Option<FailureHandler>,
    ) -> Self {
        Self {
            backlog: Backlog::new(config.capacity),
            pool: SlotPool::new(DispatchTask::new),
            lifecycle: Lifecycle::new(),
            name: config.name,
            poll_interval: config.poll_interval,
            router,
            on_failure,
            counters: Counters::default(),
        }
    }
}

impl<K, E> Dispatcher<K, E> {
    /// Submit one event for asynchronous routing
    ///
    /// Acquires a task lease from the pool, populates it, and enqueues it.
    /// Blocks the calling thread while the backlog is at capacity; no event is
    /// ever dropped. Fails with [`DispatchError::Closed`] once the dispatcher
    /// stops accepting work.
    pub fn dispatch(
        &self,
        key: K,
        event: E,
        registry: Option<Arc<dyn Registry<K, E>>>,
        on_complete: Option<Arc<dyn Consumer<E>>>,
        on_error: Option<Arc<dyn Consumer<Fault>>>,
    ) -> Result<(), DispatchError> {
        if !self.lifecycle.accepts() {
            return Err(DispatchError::Closed(self.name.clone()));
        }

        let lease = self.pool.acquire();
        lease.lock().populate(
            key,
            event,
            Arc::clone(&self.router),
            registry,
            on_complete,
            on_error,
        );

        // A concurrent shutdown may close the backlog after the gate check;
        // the push reports it and the rejected lease recycles on drop.
        self.backlog
            .push(lease)
            .map_err(|_| DispatchError::Closed(self.name.clone()))?;
        self.counters.dispatched.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Stop accepting work, leaving queued tasks for the loop to drain
    ///
    /// A dispatcher whose loop never started has nothing to drain: it goes
    /// straight to Terminated and the queue is discarded.
    pub fn shutdown(&self) {
        match self.lifecycle.drain() {
            DispatcherState::Running => self.backlog.close(),
            DispatcherState::Created => {
                self.backlog.close();
                let dropped = self.backlog.discard();
                self.note_discarded(dropped as u64);
                self.lifecycle.terminate();
            }
            _ => {}
        }
    }

    /// Terminate immediately, discarding queued-but-unpolled tasks
    ///
    /// Blocked producers and the polling loop wake right away; their leases
    /// recycle unexecuted.
    pub fn halt(&self) {
        self.lifecycle.terminate();
        self.backlog.close();
        let dropped = self.backlog.discard();
        if dropped > 0 {
            self.note_discarded(dropped as u64);
            tracing::debug!("Dispatcher '{}' halted, {} tasks discarded", self.name, dropped);
        }
    }

    /// Current lifecycle stage
    pub fn state(&self) -> DispatcherState {
        self.lifecycle.current()
    }

    /// Counters snapshot
    pub fn stats(&self) -> DispatchStats {
        DispatchStats {
            dispatched: self.counters.dispatched.load(Ordering::Relaxed),
            executed: self.counters.executed.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            discarded: self.counters.discarded.load(Ordering::Relaxed),
        }
    }

    /// Context name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of queued, not-yet-polled tasks
    pub fn backlog_len(&self) -> usize {
        self.backlog.len()
    }

    /// Created -> Running; false once the dispatcher left Created
    pub(crate) fn activate(&self) -> bool {
        self.lifecycle.activate()
    }

    /// One bounded poll cycle of the backlog
    pub(crate) fn poll_next(&self) -> Option<TaskLease<K, E>> {
        self.backlog.poll(self.poll_interval)
    }

    pub(crate) fn backlog_drained(&self) -> bool {
        self.backlog.is_empty()
    }

    pub(crate) fn mark_terminated(&self) {
        self.lifecycle.terminate();
    }

    pub(crate) fn note_executed(&self) {
        self.counters.executed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn note_discarded(&self, count: u64) {
        if count > 0 {
            self.counters.discarded.fetch_add(count, Ordering::Relaxed);
        }
    }

    /// Contain one task's failure: count it, hand it to the configured
    /// handler, and log it. Never propagates.
    pub(crate) fn report_failure(&self, fault: Fault) {
        self.counters.failed.fetch_add(1, Ordering::Relaxed);
        if let Some(handler) = &self.on_failure {
            handler(&std::thread::current(), &fault);
        }
        tracing::error!("Dispatcher '{}' task execution failed: {}", self.name, fault);
    }
}
