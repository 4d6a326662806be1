//! Rate-limit bursts of calls, executing the first immediately

use std::time::Duration;

use futures::future::BoxFuture;
use parking_lot::Mutex;

use crate::delay::delay;
use crate::error::{Error, Result};
use crate::pace::PacedOp;

struct State<Args> {
    busy: bool,
    slot: Option<Args>,
}

// Resets the wrapper to idle if the draining call's future is dropped
// mid-flight (timeout, select!, task abort); absorbed arguments stay in
// the slot for the next call to drain.
struct DrainGuard<'a, Args> {
    state: &'a Mutex<State<Args>>,
    done: bool,
}

impl<Args> Drop for DrainGuard<'_, Args> {
    fn drop(&mut self) {
        if !self.done {
            self.state.lock().busy = false;
        }
    }
}

/// Wrapper that runs the first call of a burst immediately and enforces
/// a minimum gap before any later queued execution.
///
/// Structurally [`Debounce`](crate::pace::Debounce) with the sleep moved
/// after the execution: the drain loop executes the freshest arguments,
/// sleeps `gap`, and repeats while new calls keep refilling the slot.
/// Calls that find the wrapper busy are absorbed silently, exactly as
/// with debounce.
pub struct Throttle<Args, E> {
    op: PacedOp<Args, (), E>,
    gap: Duration,
    state: Mutex<State<Args>>,
}

impl<Args, E> Throttle<Args, E> {
    /// Wrap `op` with a mandatory post-execution gap; zero is a usage
    /// error.
    pub fn new(
        op: impl Fn(Args) -> BoxFuture<'static, std::result::Result<(), E>> + Send + Sync + 'static,
        gap: Duration,
    ) -> Result<Self> {
        Error::check_duration(gap)?;
        Ok(Self {
            op: Box::new(op),
            gap,
            state: Mutex::new(State {
                busy: false,
                slot: None,
            }),
        })
    }

    /// Deposit this call's arguments and, if idle, drain the slot.
    ///
    /// Dropping the returned future mid-drain (timeout, task abort)
    /// resets the wrapper to idle, so a cancelled drainer never wedges
    /// it.
    pub async fn call(&self, args: Args) -> std::result::Result<(), E> {
        {
            let mut state = self.state.lock();
            state.slot = Some(args);
            if state.busy {
                // Absorbed.
                return Ok(());
            }
            state.busy = true;
        }
        let mut guard = DrainGuard {
            state: &self.state,
            done: false,
        };

        loop {
            let next = {
                let mut state = self.state.lock();
                match state.slot.take() {
                    Some(args) => Some(args),
                    None => {
                        state.busy = false;
                        guard.done = true;
                        None
                    }
                }
            };
            let Some(args) = next else {
                return Ok(());
            };

            if let Err(err) = (self.op)(args).await {
                // The guard resets to idle on the way out.
                return Err(err);
            }

            // The gap trails the execution, so a burst's first call ran
            // with no delay at all.
            delay(self.gap, None).await;
        }
    }
}
