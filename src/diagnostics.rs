//! Operator-visible diagnostics for fire-and-forget failure paths
//!
//! Failures that have no caller left to propagate to (an error handler
//! that itself failed) terminate here. The sink is injectable so tests
//! can assert on swallowed failures instead of scraping log output.

use std::sync::Arc;

use once_cell::sync::Lazy;
use tracing::error;

use crate::error::Error;

/// Terminal sink for failures with no caller to reach.
pub trait DiagnosticSink: Send + Sync {
    /// An action's error handler failed (or panicked) while handling an
    /// action failure. The processing loop continues regardless.
    fn handler_failure(&self, error: &Error);
}

/// Default sink that reports through `tracing`.
#[derive(Debug, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn handler_failure(&self, error: &Error) {
        error!(%error, "error handler failed; processing loop continues");
    }
}

static DEFAULT_SINK: Lazy<Arc<dyn DiagnosticSink>> = Lazy::new(|| Arc::new(TracingSink));

/// The process-wide default sink, used when no sink is injected.
pub fn default_sink() -> Arc<dyn DiagnosticSink> {
    Arc::clone(&DEFAULT_SINK)
}
