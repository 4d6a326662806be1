//! Error types and handling for taskpace

use std::time::Duration;
use thiserror::Error;

/// Result type alias for taskpace operations
pub type Result<T> = std::result::Result<T, Error>;

/// Taskpace error types
#[derive(Debug, Error)]
pub enum Error {
    /// A configured delay, window, or hold duration was not strictly
    /// positive. Raised when the wrapper or processor is constructed,
    /// never at call time.
    #[error("duration must be greater than zero, got {0:?}")]
    InvalidDuration(Duration),

    /// Work was submitted to a processor after it was disposed.
    #[error("background processor is disposed")]
    ProcessorDisposed,

    /// A deferred computation was settled with a failure.
    #[error("deferred rejected: {0}")]
    Rejected(String),

    /// A deferred computation was dropped before it settled, or its
    /// settled value was already consumed by an earlier wait.
    #[error("deferred abandoned before a value could be observed")]
    Abandoned,

    /// A background action or error handler panicked; the payload is the
    /// captured panic message.
    #[error("task panicked: {0}")]
    Task(String),
}

impl Error {
    /// Validate a configured pacing duration.
    ///
    /// Durations in Rust cannot be negative, so the only invalid value is
    /// zero.
    pub(crate) fn check_duration(duration: Duration) -> Result<Duration> {
        if duration.is_zero() {
            Err(Error::InvalidDuration(duration))
        } else {
            Ok(duration)
        }
    }
}
