//! Error types for the circuit breaker library.

use thiserror::Error;

/// Result type for calls wrapped by a circuit breaker.
pub type BreakerResult<T, E> = Result<T, BreakerError<E>>;

/// Reasons an attempt is refused admission.
///
/// Both are expected signals rather than faults: callers branch on them to
/// skip the call, fall back, or report upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AllowError {
    /// The breaker is open and blocks every call.
    #[error("circuit breaker is open")]
    OpenState,

    /// The breaker is half-open and its probe quota is used up.
    #[error("too many requests")]
    TooManyRequests,
}

/// Error type for calls executed through a circuit breaker.
#[derive(Debug, Error)]
pub enum BreakerError<E> {
    /// The breaker refused the call; the operation never ran.
    #[error(transparent)]
    Rejected(#[from] AllowError),

    /// The underlying operation failed.
    #[error("operation error: {0}")]
    Operation(#[source] E),

    /// The operation did not finish within its deadline.
    #[error("operation timed out")]
    Timeout,
}

impl<E> BreakerError<E> {
    /// Returns true if the breaker refused the call.
    pub fn is_rejected(&self) -> bool {
        matches!(self, BreakerError::Rejected(_))
    }

    /// Returns the operation's own error, if that is what failed.
    pub fn into_operation(self) -> Option<E> {
        match self {
            BreakerError::Operation(e) => Some(e),
            _ => None,
        }
    }
}
