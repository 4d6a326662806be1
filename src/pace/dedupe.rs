//! Drop calls that arrive while one is in flight

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures::future::BoxFuture;

use crate::delay::delay;
use crate::error::{Error, Result};
use crate::pace::PacedOp;

/// Wrapper that runs at most one call at a time and drops the rest.
///
/// A call arriving while another is running (or while the configured
/// window after a run is still open) is dropped entirely: no execution,
/// no error, `Ok(None)`. The call that does run receives the operation's
/// outcome directly.
pub struct Dedupe<Args, T, E> {
    op: PacedOp<Args, T, E>,
    window: Option<Duration>,
    busy: AtomicBool,
}

// Clears the busy flag on every exit from the executing call, including
// a dropped future (timeout, select!, task abort), so one cancelled
// call cannot leave the wrapper dropping everything forever.
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl<Args, T, E> Dedupe<Args, T, E> {
    /// Wrap `op`. A `window`, if given, extends the busy period past
    /// each completion; zero is a usage error.
    pub fn new(
        op: impl Fn(Args) -> BoxFuture<'static, std::result::Result<T, E>> + Send + Sync + 'static,
        window: Option<Duration>,
    ) -> Result<Self> {
        if let Some(window) = window {
            Error::check_duration(window)?;
        }
        Ok(Self {
            op: Box::new(op),
            window,
            busy: AtomicBool::new(false),
        })
    }

    /// Run the operation, unless a call is already in flight.
    ///
    /// Returns `Ok(None)` for dropped calls, `Ok(Some(value))` or the
    /// operation's error for the call that ran. The window sleep happens
    /// on the success and the failure path alike, so errors do not
    /// shorten the busy period. Dropping the returned future mid-run
    /// reopens the wrapper immediately.
    pub async fn call(&self, args: Args) -> std::result::Result<Option<T>, E> {
        if self.busy.swap(true, Ordering::SeqCst) {
            return Ok(None);
        }
        // Dropped at the end of the window, or wherever this future is
        // abandoned.
        let _reset = BusyGuard(&self.busy);

        let result = (self.op)(args).await;
        if let Some(window) = self.window {
            delay(window, None).await;
        }

        result.map(Some)
    }
}
