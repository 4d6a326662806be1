//! Serialize every call through a FIFO mutex

use std::time::Duration;

use futures::future::BoxFuture;

use crate::delay::delay;
use crate::error::{Error, Result};
use crate::mutex::FifoMutex;
use crate::pace::PacedOp;

/// Wrapper that queues and runs every call, strictly serialized in
/// arrival order.
///
/// No call is ever dropped: callers that arrive while another call runs
/// wait their turn on a per-wrapper [`FifoMutex`]. An optional `hold`
/// duration is slept *before* the lock is released, deliberately
/// throttling how fast the lock becomes available to the next waiter.
/// Each caller receives its own call's outcome.
pub struct Synchronize<Args, T, E> {
    op: PacedOp<Args, T, E>,
    hold: Option<Duration>,
    mutex: FifoMutex,
}

impl<Args, T, E> Synchronize<Args, T, E> {
    /// Wrap `op` with an optional post-call hold on the lock; zero is a
    /// usage error.
    pub fn new(
        op: impl Fn(Args) -> BoxFuture<'static, std::result::Result<T, E>> + Send + Sync + 'static,
        hold: Option<Duration>,
    ) -> Result<Self> {
        if let Some(hold) = hold {
            Error::check_duration(hold)?;
        }
        Ok(Self {
            op: Box::new(op),
            hold,
            mutex: FifoMutex::new(),
        })
    }

    /// Run the operation under the wrapper's lock.
    ///
    /// The guard releases on every exit path, so a failing or panicking
    /// operation never wedges later callers.
    pub async fn call(&self, args: Args) -> std::result::Result<T, E> {
        let _guard = self.mutex.acquire().await;
        let result = (self.op)(args).await;
        if let Some(hold) = self.hold {
            // Part of the critical section by design.
            delay(hold, None).await;
        }
        result
    }
}
