//! Reusable dispatch task: the parameters of one routed event

use crate::dispatch::pool::{Lease, Reset};
use crate::routing::{Consumer, Fault, Registry, Router};
use std::sync::Arc;

/// Counted lease over a pooled dispatch task
pub type TaskLease<K, E> = Lease<DispatchTask<K, E>>;

/// Parameters stamped in by `populate`, consumed by `execute`
struct Request<K, E> {
    key: K,
    event: E,
    router: Arc<dyn Router<K, E>>,
    registry: Option<Arc<dyn Registry<K, E>>>,
    on_complete: Option<Arc<dyn Consumer<E>>>,
    on_error: Option<Arc<dyn Consumer<Fault>>>,
}

/// A reusable unit of dispatch work
///
/// Vacant between recycles; carries the full parameter set of one event while
/// queued or executing. Fields are overwritten on every populate and cleared
/// when the pool recycles the slot.
pub struct DispatchTask<K, E> {
    request: Option<Request<K, E>>,
}

impl<K, E> DispatchTask<K, E> {
    /// Create a vacant task
    pub fn new() -> Self {
        Self { request: None }
    }

    /// Whether this task currently carries a request
    pub fn is_populated(&self) -> bool {
        self.request.is_some()
    }

    /// Stamp the parameters of one dispatch into this task
    pub fn populate(
        &mut self,
        key: K,
        event: E,
        router: Arc<dyn Router<K, E>>,
        registry: Option<Arc<dyn Registry<K, E>>>,
        on_complete: Option<Arc<dyn Consumer<E>>>,
        on_error: Option<Arc<dyn Consumer<Fault>>>,
    ) {
        self.request = Some(Request {
            key,
            event,
            router,
            registry,
            on_complete,
            on_error,
        });
    }

    /// Route the carried event
    ///
    /// Selects consumers through the registry (empty selection when none is
    /// configured) and delegates to the router. Consumes the request; a vacant
    /// task is a no-op.
    pub fn execute(&mut self) -> Result<(), Fault> {
        let Some(request) = self.request.take() else {
            return Ok(());
        };

        let consumers = match &request.registry {
            Some(registry) => registry.select(&request.key),
            None => Vec::new(),
        };

        request.router.route(
            &request.key,
            &request.event,
            &consumers,
            request.on_complete.as_ref(),
            request.on_error.as_ref(),
        )
    }
}

impl<K, E> Default for DispatchTask<K, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, E> Reset for DispatchTask<K, E> {
    fn reset(&mut self) {
        self.request = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct RecordingRouter {
        /// (event, consumer-count) per route call
        calls: Mutex<Vec<(u64, usize)>>,
    }

    impl Router<String, u64> for RecordingRouter {
        fn route(
            &self,
            _key: &String,
            event: &u64,
            consumers: &[Arc<dyn Consumer<u64>>],
            on_complete: Option<&Arc<dyn Consumer<u64>>>,
            _on_error: Option<&Arc<dyn Consumer<Fault>>>,
        ) -> Result<(), Fault> {
            self.calls.lock().unwrap().push((*event, consumers.len()));
            for consumer in consumers {
                consumer.accept(event);
            }
            if let Some(done) = on_complete {
                done.accept(event);
            }
            Ok(())
        }
    }

    struct SingleRegistry {
        consumer: Arc<dyn Consumer<u64>>,
    }

    impl Registry<String, u64> for SingleRegistry {
        fn select(&self, _key: &String) -> Vec<Arc<dyn Consumer<u64>>> {
            vec![Arc::clone(&self.consumer)]
        }
    }

    #[test]
    fn test_execute_routes_selected_consumers() {
        let router = Arc::new(RecordingRouter {
            calls: Mutex::new(Vec::new()),
        });
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let registry = Arc::new(SingleRegistry {
            consumer: Arc::new(move |event: &u64| sink.lock().unwrap().push(*event)),
        });

        let mut task = DispatchTask::new();
        task.populate(
            "orders".to_string(),
            42,
            router.clone(),
            Some(registry),
            None,
            None,
        );
        assert!(task.is_populated());

        task.execute().unwrap();

        assert_eq!(*router.calls.lock().unwrap(), vec![(42, 1)]);
        assert_eq!(*seen.lock().unwrap(), vec![42]);
        // The request is consumed with the call
        assert!(!task.is_populated());
    }

    #[test]
    fn test_execute_without_registry_gets_empty_selection() {
        let router = Arc::new(RecordingRouter {
            calls: Mutex::new(Vec::new()),
        });

        let mut task = DispatchTask::new();
        task.populate("orders".to_string(), 7, router.clone(), None, None, None);
        task.execute().unwrap();

        assert_eq!(*router.calls.lock().unwrap(), vec![(7, 0)]);
    }

    #[test]
    fn test_completion_consumer_invoked_by_router() {
        let router = Arc::new(RecordingRouter {
            calls: Mutex::new(Vec::new()),
        });
        let completed = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&completed);

        let mut task = DispatchTask::new();
        task.populate(
            "orders".to_string(),
            9,
            router,
            None,
            Some(Arc::new(move |event: &u64| {
                sink.lock().unwrap().push(*event)
            })),
            None,
        );
        task.execute().unwrap();

        assert_eq!(*completed.lock().unwrap(), vec![9]);
    }

    #[test]
    fn test_vacant_execute_is_noop() {
        let mut task: DispatchTask<String, u64> = DispatchTask::new();
        assert!(task.execute().is_ok());
    }

    #[test]
    fn test_reset_clears_request() {
        let router = Arc::new(RecordingRouter {
            calls: Mutex::new(Vec::new()),
        });

        let mut task = DispatchTask::new();
        task.populate("orders".to_string(), 1, router.clone(), None, None, None);
        task.reset();

        assert!(!task.is_populated());
        task.execute().unwrap();
        assert!(router.calls.lock().unwrap().is_empty());
    }
}
