//! Dispatcher-level error types

use thiserror::Error;

/// Errors surfaced by dispatcher operations
///
/// Failures inside one task never reach callers; only lifecycle conditions do.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The dispatcher no longer accepts work (draining or terminated)
    #[error("dispatcher '{0}' is closed")]
    Closed(String),
}
