//! Cancellable sleep primitive
//!
//! All pacing delays in this crate go through [`delay`], a sleep that an
//! external [`DelayCanceller`] handle can cut short without error. The
//! background processor uses this to interrupt its idle break at
//! disposal time instead of waiting out the full interval.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;

/// Handle that can cut pending [`delay`] calls short.
///
/// Cloneable and reusable: once fired, every current and future delay
/// using this canceller returns immediately.
#[derive(Clone, Default)]
pub struct DelayCanceller {
    cancelled: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl DelayCanceller {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve all pending and future delays on this handle early.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Sleep for `duration`, returning early (without error) if `canceller`
/// fires first or has already fired.
pub async fn delay(duration: Duration, canceller: Option<&DelayCanceller>) {
    let Some(canceller) = canceller else {
        tokio::time::sleep(duration).await;
        return;
    };

    // Register interest before checking the flag so a cancel landing
    // between the check and the select cannot be missed.
    let notified = canceller.notify.notified();
    tokio::pin!(notified);
    notified.as_mut().enable();

    if canceller.is_cancelled() {
        return;
    }

    tokio::select! {
        _ = tokio::time::sleep(duration) => {}
        _ = notified => {}
    }
}
