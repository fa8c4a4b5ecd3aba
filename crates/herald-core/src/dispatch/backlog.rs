//! Bounded FIFO handoff between producer threads and the consumer thread
//!
//! This is a thread-safe, blocking queue built on parking_lot. It supports:
//! - Blocking push: waits while the queue is at capacity (backpressure)
//! - Timed poll: waits up to a bound for the next item, then yields to the
//!   caller so it can re-check termination conditions
//! - Close: rejects further pushes and wakes every waiter
//! - Discard: drops all queued items (forced halt)

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Returned when pushing to a backlog that has been closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("backlog is closed")]
pub struct BacklogClosed;

struct BacklogInner<T> {
    queue: VecDeque<T>,
    closed: bool,
}

/// Bounded FIFO queue connecting producers to a single consumer
///
/// Length never exceeds the configured capacity, and items come out in the
/// order their pushes completed, across the queue's whole lifetime.
pub struct Backlog<T> {
    inner: Mutex<BacklogInner<T>>,
    capacity: usize,
    /// Signalled when an item is removed or the queue closes
    not_full: Condvar,
    /// Signalled when an item is added or the queue closes
    not_empty: Condvar,
}

impl<T> Backlog<T> {
    /// Create a backlog holding at most `capacity` items
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "backlog capacity must be positive");
        Self {
            inner: Mutex::new(BacklogInner {
                queue: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            capacity,
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
        }
    }

    /// Append an item, blocking while the queue is at capacity
    ///
    /// Returns an error once the backlog is closed; the item is dropped, not
    /// silently queued.
    pub fn push(&self, item: T) -> Result<(), BacklogClosed> {
        let mut inner = self.inner.lock();
        loop {
            if inner.closed {
                return Err(BacklogClosed);
            }
            if inner.queue.len() < self.capacity {
                inner.queue.push_back(item);
                self.not_empty.notify_one();
                return Ok(());
            }
            self.not_full.wait(&mut inner);
        }
    }

    /// Remove the head, waiting up to `timeout` while the queue is empty
    ///
    /// `None` after the wait is a heartbeat, not an error. Once the backlog is
    /// closed and empty, `None` comes back immediately: no item will ever
    /// arrive.
    pub fn poll(&self, timeout: Duration) -> Option<T> {
        let deadline = Instant::now() + timeout;
        let mut inner = self.inner.lock();
        loop {
            if let Some(item) = inner.queue.pop_front() {
                self.not_full.notify_one();
                return Some(item);
            }
            if inner.closed {
                return None;
            }
            if self.not_empty.wait_until(&mut inner, deadline).timed_out() {
                let item = inner.queue.pop_front();
                if item.is_some() {
                    self.not_full.notify_one();
                }
                return item;
            }
        }
    }

    /// Stop accepting pushes and wake every waiter
    ///
    /// Queued items stay pollable; blocked pushers fail with `BacklogClosed`.
    pub fn close(&self) {
        let mut inner = self.inner.lock();
        inner.closed = true;
        self.not_full.notify_all();
        self.not_empty.notify_all();
    }

    /// Drop everything queued, returning how many items were discarded
    pub fn discard(&self) -> usize {
        let drained: Vec<T> = {
            let mut inner = self.inner.lock();
            let items = inner.queue.drain(..).collect();
            self.not_full.notify_all();
            items
        };
        // Dropped outside the lock: item destructors may take other locks
        drained.len()
    }

    /// Number of queued items
    pub fn len(&self) -> usize {
        self.inner.lock().queue.len()
    }

    /// Whether the queue is empty
    pub fn is_empty(&self) -> bool {
        self.inner.lock().queue.is_empty()
    }

    /// Whether the queue has been closed
    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    /// Configured capacity bound
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
