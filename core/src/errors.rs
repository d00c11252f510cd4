//! Error types for circuit breaker operations

use std::time::Duration;
use thiserror::Error;

/// Outcome of a guarded call that did not succeed
///
/// Together with `Ok`, the variants form the full set of call outcomes:
/// success, qualifying failure, non-qualifying failure and circuit open.
/// Operation errors are carried unchanged and display as themselves.
#[derive(Debug, Error)]
pub enum CircuitError<E> {
    /// Circuit is open; the operation was not invoked
    #[error("circuit '{circuit}' is open (retry after {retry_after:?})")]
    Open {
        circuit: String,
        /// Time left in the current break, zero while a trial call is running
        retry_after: Duration,
    },

    /// The operation failed and the failure counted toward tripping
    #[error(transparent)]
    Failure(E),

    /// The operation failed but the classifier excluded it from accounting
    #[error(transparent)]
    Ignored(E),
}

impl<E> CircuitError<E> {
    /// Whether the call was rejected without invoking the operation
    pub fn is_open(&self) -> bool {
        matches!(self, CircuitError::Open { .. })
    }

    /// The operation's own error, if it ran
    pub fn inner(&self) -> Option<&E> {
        match self {
            CircuitError::Failure(e) | CircuitError::Ignored(e) => Some(e),
            CircuitError::Open { .. } => None,
        }
    }

    /// Unwrap into the operation's own error, if it ran
    pub fn into_inner(self) -> Option<E> {
        match self {
            CircuitError::Failure(e) | CircuitError::Ignored(e) => Some(e),
            CircuitError::Open { .. } => None,
        }
    }
}

/// Rejected circuit breaker configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("failure threshold must be at least 1")]
    ZeroFailureThreshold,

    #[error("break duration must be greater than zero")]
    ZeroBreakDuration,
}
