//! Call-pacing wrappers
//!
//! Four wrappers that reshape how repeated calls to one async operation
//! are admitted and sequenced. Each is an explicit per-instance wrapper
//! object: construct it once around the operation (typically a closure
//! capturing an `Arc` of the receiver) and route every call through it.
//!
//! All four guarantee at most one in-flight invocation of the wrapped
//! operation per wrapper. They differ in what happens to calls that
//! arrive while one is in flight:
//!
//! - [`Dedupe`]: drop them.
//! - [`Debounce`]: merge them, keeping only the newest arguments.
//! - [`Throttle`]: as debounce, but the enforced gap follows each
//!   execution instead of preceding it, so the first call of a burst
//!   runs immediately.
//! - [`Synchronize`]: queue them all, FIFO.

mod debounce;
mod dedupe;
mod synchronize;
mod throttle;

pub use debounce::Debounce;
pub use dedupe::Dedupe;
pub use synchronize::Synchronize;
pub use throttle::Throttle;

use futures::future::BoxFuture;

/// The wrapped operation: type-erased so wrappers compose with any async
/// callable, sync-returning methods included (box a ready future).
pub type PacedOp<Args, T, E> =
    Box<dyn Fn(Args) -> BoxFuture<'static, std::result::Result<T, E>> + Send + Sync>;
