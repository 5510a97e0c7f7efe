//! Errors raised by bus operations.
//!
//! Listener-level failures are never errors of the bus itself; they are
//! reported through [`crate::ListenerOutcome`].

use thiserror::Error;

/// Errors from event bus operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BusError {
    /// A wildcard pattern could not be compiled.
    #[error("Invalid wildcard pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },
}
