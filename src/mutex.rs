//! FIFO mutual exclusion for async tasks
//!
//! [`FifoMutex`] grants exclusive access to waiters strictly in the
//! order they asked for it. It is built from a queue of [`Deferred`]
//! handles: the queue head is always the current holder and its grant
//! has already fired; everyone behind it waits on their own entry.
//!
//! Known limitations, kept deliberately:
//! - Not re-entrant. A holder calling `lock` again queues behind itself
//!   and deadlocks.
//! - No cancellation. A waiter that drops its `lock` future stays in the
//!   queue; the grant it eventually receives is lost and every later
//!   waiter deadlocks. Do not drop a pending `lock` call.

use std::collections::VecDeque;

use parking_lot::Mutex;

use crate::deferred::Deferred;

/// A mutual-exclusion lock with strict FIFO grant order.
///
/// Prefer [`FifoMutex::acquire`], which releases on every exit path. The
/// raw [`lock`](FifoMutex::lock)/[`release`](FifoMutex::release) pair is
/// available for callers that need to hold across non-lexical scopes,
/// at the price of guaranteeing the release themselves: an unreleased
/// lock wedges all future waiters permanently.
#[derive(Default)]
pub struct FifoMutex {
    // Head = current holder, already resolved. Mutated only in short
    // critical sections, never across an await.
    queue: Mutex<VecDeque<Deferred<()>>>,
}

impl FifoMutex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request exclusive access.
    ///
    /// Resolves immediately when uncontended; otherwise suspends until
    /// every earlier `lock` caller has released.
    pub async fn lock(&self) {
        let entry = Deferred::new();
        {
            let mut queue = self.queue.lock();
            if queue.is_empty() {
                // Sole entry: head and holder at once, granted without
                // suspending.
                entry.resolve(());
            }
            queue.push_back(entry.clone());
        }
        // Entries are only ever resolved, never rejected or dropped
        // while queued, so the wait outcome carries no information.
        let _ = entry.wait().await;
    }

    /// Release the currently held lock and grant the next waiter, if
    /// any. No-op when no lock is held.
    pub fn release(&self) {
        let mut queue = self.queue.lock();
        if queue.pop_front().is_some() {
            if let Some(next) = queue.front() {
                next.resolve(());
            }
        }
    }

    /// Acquire the lock with scoped release: the returned guard calls
    /// [`release`](FifoMutex::release) when dropped, including during
    /// panic unwinding.
    pub async fn acquire(&self) -> FifoMutexGuard<'_> {
        self.lock().await;
        FifoMutexGuard { mutex: self }
    }

    /// Whether any caller currently holds or is waiting for the lock.
    pub fn is_locked(&self) -> bool {
        !self.queue.lock().is_empty()
    }
}

/// RAII guard for [`FifoMutex::acquire`].
#[must_use = "dropping the guard releases the lock immediately"]
pub struct FifoMutexGuard<'a> {
    mutex: &'a FifoMutex,
}

impl Drop for FifoMutexGuard<'_> {
    fn drop(&mut self) {
        self.mutex.release();
    }
}
