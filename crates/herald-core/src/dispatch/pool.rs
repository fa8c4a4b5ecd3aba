//! Slot pool for reusing task allocations across dispatch cycles
//!
//! When a task finishes, its slot is returned to the pool. The next dispatch
//! acquires a recycled slot, reusing the allocation instead of constructing a
//! fresh task. Slots are handed out as counted leases: a slot only re-enters
//! the free list when the last holder releases it, so a concurrent holder can
//! never observe its task being recycled.

use parking_lot::{Mutex, MutexGuard};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Restores a pooled value to its vacant state before reuse
pub trait Reset {
    /// Clear any state left behind by the previous holder
    fn reset(&mut self);
}

struct Slot<T> {
    value: Mutex<T>,
    /// Number of live leases over this slot; 0 while on the free list
    holders: AtomicUsize,
}

struct PoolInner<T> {
    /// Every slot ever created, keyed by index
    slots: Mutex<Vec<Arc<Slot<T>>>>,
    /// Indices of slots with no live lease
    free: Mutex<Vec<usize>>,
    factory: Box<dyn Fn() -> T + Send + Sync>,
}

/// Owning pool of reusable slots
///
/// `acquire` pops a recycled slot or constructs a new one through the factory
/// when the free list is empty. Slots are never destroyed while the pool
/// lives. Safe under concurrent acquire from producer threads and concurrent
/// release from the consumer thread.
pub struct SlotPool<T: Reset> {
    inner: Arc<PoolInner<T>>,
}

impl<T: Reset> SlotPool<T> {
    /// Create an empty pool backed by `factory`
    pub fn new(factory: impl Fn() -> T + Send + Sync + 'static) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                slots: Mutex::new(Vec::new()),
                free: Mutex::new(Vec::new()),
                factory: Box::new(factory),
            }),
        }
    }

    /// Lease a slot, recycling a free one or constructing a new one
    pub fn acquire(&self) -> Lease<T> {
        let recycled = self.inner.free.lock().pop();
        let (slot, index) = match recycled {
            Some(index) => (self.inner.slots.lock()[index].clone(), index),
            None => {
                let slot = Arc::new(Slot {
                    value: Mutex::new((self.inner.factory)()),
                    holders: AtomicUsize::new(0),
                });
                let mut slots = self.inner.slots.lock();
                slots.push(slot.clone());
                (slot, slots.len() - 1)
            }
        };

        let previous = slot.holders.swap(1, Ordering::AcqRel);
        debug_assert_eq!(previous, 0, "acquired a slot that still had holders");

        Lease {
            slot,
            index,
            pool: Arc::clone(&self.inner),
        }
    }

    /// Total slots ever created
    pub fn slot_count(&self) -> usize {
        self.inner.slots.lock().len()
    }

    /// Slots currently available for reuse
    pub fn free_count(&self) -> usize {
        self.inner.free.lock().len()
    }
}

/// Counted handle to one pooled slot
///
/// Cloning increments the holder count, dropping decrements it. The holder
/// that was the sole owner at release resets the value and returns the slot to
/// the free list, so release runs on every exit path and never recycles a slot
/// another holder still depends on.
pub struct Lease<T: Reset> {
    slot: Arc<Slot<T>>,
    index: usize,
    pool: Arc<PoolInner<T>>,
}

impl<T: Reset> Lease<T> {
    /// Lock the leased value
    ///
    /// Holders never mutate concurrently in practice (one populate before
    /// enqueue, one execute after poll); the lock makes that safe rather than
    /// assumed.
    pub fn lock(&self) -> MutexGuard<'_, T> {
        self.slot.value.lock()
    }

    /// Number of live leases over this slot, including this one
    pub fn holder_count(&self) -> usize {
        self.slot.holders.load(Ordering::Acquire)
    }
}

impl<T: Reset> Clone for Lease<T> {
    fn clone(&self) -> Self {
        self.slot.holders.fetch_add(1, Ordering::AcqRel);
        Self {
            slot: Arc::clone(&self.slot),
            index: self.index,
            pool: Arc::clone(&self.pool),
        }
    }
}

impl<T: Reset> Drop for Lease<T> {
    fn drop(&mut self) {
        // Sole holder at release: reset the value, then make the slot
        // available again. Resetting before publication keeps half-populated
        // state out of the free list.
        if self.slot.holders.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.slot.value.lock().reset();
            self.pool.free.lock().push(self.index);
        }
    }
}
