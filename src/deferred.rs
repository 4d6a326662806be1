//! Single-shot externally settled computations
//!
//! A [`Deferred`] is created pending and settled exactly once from the
//! outside, either with a value (`resolve`) or a failure (`reject`).
//! Whichever settlement arrives first wins; later calls are silent
//! no-ops. It is the building block the FIFO mutex queues its waiters
//! with.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::error::{Error, Result};

struct Inner<T> {
    // Taken on first settlement; idempotency is structural, there is no
    // separate settled flag to keep in sync.
    tx: Mutex<Option<oneshot::Sender<Result<T>>>>,
    // Taken on first wait.
    rx: Mutex<Option<oneshot::Receiver<Result<T>>>>,
}

/// A pending computation with external resolve/reject triggers.
///
/// Clones share the same underlying computation: any clone may settle it,
/// and the first settlement wins.
pub struct Deferred<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for Deferred<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Deferred<T> {
    /// Create a new deferred computation, pending immediately.
    pub fn new() -> Self {
        let (tx, rx) = oneshot::channel();
        Self {
            inner: Arc::new(Inner {
                tx: Mutex::new(Some(tx)),
                rx: Mutex::new(Some(rx)),
            }),
        }
    }

    /// Settle with a value. No-op if already settled.
    pub fn resolve(&self, value: T) {
        if let Some(tx) = self.inner.tx.lock().take() {
            // The receiver may already be gone; that only means nobody is
            // waiting anymore.
            let _ = tx.send(Ok(value));
        }
    }

    /// Settle with a failure. No-op if already settled.
    pub fn reject(&self, reason: impl Into<String>) {
        if let Some(tx) = self.inner.tx.lock().take() {
            let _ = tx.send(Err(Error::Rejected(reason.into())));
        }
    }

    /// Whether `resolve` or `reject` has already fired.
    pub fn is_settled(&self) -> bool {
        self.inner.tx.lock().is_none()
    }

    /// Await settlement.
    ///
    /// The settled value is consumed by the first `wait`; a second `wait`
    /// on the same computation, or waiting on a deferred all of whose
    /// holders dropped without settling, yields [`Error::Abandoned`].
    pub async fn wait(&self) -> Result<T> {
        let rx = self.inner.rx.lock().take();
        match rx {
            Some(rx) => rx.await.unwrap_or(Err(Error::Abandoned)),
            None => Err(Error::Abandoned),
        }
    }
}
