//! Dispatcher lifecycle state machine

use std::sync::atomic::{AtomicU8, Ordering};

const CREATED: u8 = 0;
const RUNNING: u8 = 1;
const DRAINING: u8 = 2;
const TERMINATED: u8 = 3;

/// Lifecycle stage of a dispatcher
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DispatcherState {
    /// Built but not started; dispatches buffer in the backlog
    Created,
    /// Execution loop running
    Running,
    /// No new dispatches accepted; queued work still drains
    Draining,
    /// Absorbing final state; nothing further executes
    Terminated,
}

/// Atomic lifecycle cell with the legal transitions baked in
pub(crate) struct Lifecycle {
    stage: AtomicU8,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            stage: AtomicU8::new(CREATED),
        }
    }

    pub fn current(&self) -> DispatcherState {
        decode(self.stage.load(Ordering::Acquire))
    }

    /// Created -> Running; false from any later stage
    pub fn activate(&self) -> bool {
        self.stage
            .compare_exchange(CREATED, RUNNING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Move toward Draining, returning the stage held before the call
    ///
    /// Terminated is absorbing and a Draining dispatcher stays Draining; in
    /// both cases the prior stage comes back unchanged.
    pub fn drain(&self) -> DispatcherState {
        let mut current = self.stage.load(Ordering::Acquire);
        loop {
            if current == DRAINING || current == TERMINATED {
                return decode(current);
            }
            match self.stage.compare_exchange(
                current,
                DRAINING,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(previous) => return decode(previous),
                Err(actual) => current = actual,
            }
        }
    }

    /// Move to Terminated from any stage
    pub fn terminate(&self) {
        self.stage.store(TERMINATED, Ordering::Release);
    }

    /// Whether dispatch is currently accepted
    pub fn accepts(&self) -> bool {
        matches!(
            self.current(),
            DispatcherState::Created | DispatcherState::Running
        )
    }
}

fn decode(stage: u8) -> DispatcherState {
    match stage {
        CREATED => DispatcherState::Created,
        RUNNING => DispatcherState::Running,
        DRAINING => DispatcherState::Draining,
        _ => DispatcherState::Terminated,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activate_once() {
        let lifecycle = Lifecycle::new();
        assert_eq!(lifecycle.current(), DispatcherState::Created);

        assert!(lifecycle.activate());
        assert_eq!(lifecycle.current(), DispatcherState::Running);

        // Second activation is refused
        assert!(!lifecycle.activate());
        assert_eq!(lifecycle.current(), DispatcherState::Running);
    }

    #[test]
    fn test_drain_reports_prior_stage() {
        let lifecycle = Lifecycle::new();
        lifecycle.activate();

        assert_eq!(lifecycle.drain(), DispatcherState::Running);
        assert_eq!(lifecycle.current(), DispatcherState::Draining);

        // Draining again changes nothing
        assert_eq!(lifecycle.drain(), DispatcherState::Draining);
    }

    #[test]
    fn test_drain_before_start() {
        let lifecycle = Lifecycle::new();
        assert_eq!(lifecycle.drain(), DispatcherState::Created);
        assert_eq!(lifecycle.current(), DispatcherState::Draining);
    }

    #[test]
    fn test_terminated_is_absorbing() {
        let lifecycle = Lifecycle::new();
        lifecycle.terminate();
        assert_eq!(lifecycle.current(), DispatcherState::Terminated);

        assert!(!lifecycle.activate());
        assert_eq!(lifecycle.drain(), DispatcherState::Terminated);
        assert_eq!(lifecycle.current(), DispatcherState::Terminated);
    }

    #[test]
    fn test_accepts_by_stage() {
        let lifecycle = Lifecycle::new();
        assert!(lifecycle.accepts());

        lifecycle.activate();
        assert!(lifecycle.accepts());

        lifecycle.drain();
        assert!(!lifecycle.accepts());

        lifecycle.terminate();
        assert!(!lifecycle.accepts());
    }
}
