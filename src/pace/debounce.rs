//! Merge bursts of calls, keeping only the newest arguments

use std::time::Duration;

use futures::future::BoxFuture;
use parking_lot::Mutex;

use crate::delay::delay;
use crate::error::{Error, Result};
use crate::pace::PacedOp;

struct State<Args> {
    busy: bool,
    // Most recent call's arguments; later calls overwrite earlier ones.
    slot: Option<Args>,
}

// Resets the wrapper to idle if the draining call's future is dropped
// mid-flight (timeout, select!, task abort). The slot keeps whatever
// arguments were absorbed, so the next call drains them instead of
// finding the wrapper wedged busy forever.
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

/// Wrapper that collapses a burst of calls into one execution with the
/// freshest arguments.
///
/// Every call deposits its arguments in the latest-call slot. The call
/// that finds the wrapper idle becomes the drainer: it sleeps `wait`
/// (if configured), takes whatever arguments are in the slot at that
/// moment (possibly newer than its own), executes, and keeps draining
/// while new calls keep landing. Calls that find the wrapper busy return
/// `Ok(())` immediately and get no signal about whether their arguments
/// ever ran.
pub struct Debounce<Args, E> {
    op: PacedOp<Args, (), E>,
    wait: Option<Duration>,
    state: Mutex<State<Args>>,
}

impl<Args, E> Debounce<Args, E> {
    /// Wrap `op` with an optional pre-execution wait; zero is a usage
    /// error.
    pub fn new(
        op: impl Fn(Args) -> BoxFuture<'static, std::result::Result<(), E>> + Send + Sync + 'static,
        wait: Option<Duration>,
    ) -> Result<Self> {
        if let Some(wait) = wait {
            Error::check_duration(wait)?;
        }
        Ok(Self {
            op: Box::new(op),
            wait,
            state: Mutex::new(State {
                busy: false,
                slot: None,
            }),
        })
    }

    /// Deposit this call's arguments and, if idle, drain the slot.
    ///
    /// An operation error goes to the caller that started the drain and
    /// resets the wrapper to idle; any absorbed arguments left in the
    /// slot stay there until a later call drains them. Dropping the
    /// returned future mid-drain (timeout, task abort) also resets to
    /// idle, so a cancelled drainer never wedges the wrapper.
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
            if let Some(wait) = self.wait {
                delay(wait, None).await;
            }

            // Take-and-clear and the idle transition must be one
            // critical section, or a call landing in between would see
            // busy and get stranded.
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

            let mut state = self.state.lock();
            if state.slot.is_none() {
                state.busy = false;
                guard.done = true;
                return Ok(());
            }
            // Slot refilled while executing: drain again.
        }
    }
}
