//! Collaborator seams consumed by the dispatch core
//!
//! The core never interprets events or routing failures. It hands each task to
//! these traits and isolates whatever comes back, so routing strategy and
//! consumer selection live entirely outside this crate.

use std::error::Error;
use std::sync::Arc;

/// Opaque failure raised by a router or a consumer
///
/// The dispatch core forwards faults; it never inspects them.
pub type Fault = Box<dyn Error + Send + Sync + 'static>;

/// A handler that accepts values of one kind
///
/// Used for event delivery (`Consumer<E>`) and for per-event fault delivery
/// (`Consumer<Fault>`).
pub trait Consumer<T>: Send + Sync {
    /// Deliver one value to this consumer
    fn accept(&self, value: &T);
}

impl<T, F> Consumer<T> for F
where
    F: Fn(&T) + Send + Sync,
{
    fn accept(&self, value: &T) {
        self(value)
    }
}

/// Selects the consumers interested in a routing key
pub trait Registry<K, E>: Send + Sync {
    /// Consumers matching `key`, in delivery order
    fn select(&self, key: &K) -> Vec<Arc<dyn Consumer<E>>>;
}

/// Delivers one event to the selected consumers
///
/// The router owns completion and error consumer invocation. Faults that
/// escape `route` (an `Err` or a panic) become the dispatcher's problem to
/// contain, not to interpret.
pub trait Router<K, E>: Send + Sync {
    /// Route `event` under `key` to `consumers`
    ///
    /// `on_complete` is invoked by the router after delivery; `on_error`
    /// receives per-consumer faults the router chooses to absorb.
    fn route(
        &self,
        key: &K,
        event: &E,
        consumers: &[Arc<dyn Consumer<E>>],
        on_complete: Option<&Arc<dyn Consumer<E>>>,
        on_error: Option<&Arc<dyn Consumer<Fault>>>,
    ) -> Result<(), Fault>;
}
