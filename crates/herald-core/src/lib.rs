//! Herald dispatch core
//!
//! The dispatch backbone of an event-driven messaging runtime:
//! - **Routing seams**: the `Consumer`, `Registry`, and `Router` collaborator
//!   traits (`routing` module)
//! - **Dispatch**: reference-counted task pool, bounded backlog, lifecycle
//!   state machine, and the single-consumer execution loop (`dispatch` module)
//!
//! Producer threads call `dispatch`; a dedicated loop thread routes each event
//! to the consumers a registry selects, in strict FIFO order, with one task's
//! failure never touching the next.
//!
//! # Example
//!
//! ```rust,ignore
//! use herald_core::{DispatcherConfig, EventLoop};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let dispatcher = EventLoop::new(
//!     DispatcherConfig::new("orders", 128),
//!     Arc::new(MyRouter::new()),
//! );
//! dispatcher.start();
//!
//! dispatcher.dispatch("order.created".to_string(), event, Some(registry), None, None)?;
//!
//! // Drain what is queued, then stop
//! dispatcher.shutdown_and_wait(Duration::from_secs(5));
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

/// Dispatch module: task pool, backlog, lifecycle, and the execution loop
pub mod dispatch;

/// Error module: dispatcher-level error types
pub mod error;

/// Routing module: collaborator traits consumed by the dispatch core
pub mod routing;

pub use dispatch::{
    Backlog, BacklogClosed, DispatchStats, DispatchTask, Dispatcher, DispatcherConfig,
    DispatcherState, EventLoop, FailureHandler, Lease, Reset, SlotPool, TaskLease,
};
pub use error::DispatchError;
pub use routing::{Consumer, Fault, Registry, Router};
