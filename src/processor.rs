//! Interval-driven background work queue
//!
//! [`BackgroundProcessor`] drains a FIFO queue of fire-and-forget async
//! actions one at a time, pausing `break_interval` between cycles (or
//! only while idle, in the default configuration). Action failures are
//! routed to per-action error handlers and never reach the submitter;
//! a failing handler is reported to the diagnostic sink and swallowed,
//! so nothing can stop the loop.
//!
//! Callers that need a result must capture it via closure and signal
//! completion themselves, e.g. with a [`Deferred`](crate::Deferred)
//! moved into the action.

use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::delay::{delay, DelayCanceller};
use crate::diagnostics::{default_sink, DiagnosticSink};
use crate::error::{Error, Result};

/// How often `dispose` re-checks the in-flight count while draining.
const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// A queued unit of background work.
pub type Action = Box<dyn FnOnce() -> BoxFuture<'static, Result<()>> + Send>;

/// Receives an action's failure. May itself be async and fallible; a
/// handler failure goes to the diagnostic sink.
pub type ErrorHandler = Arc<dyn Fn(Error) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Async cleanup contract, so processors compose with surrounding
/// resource-lifecycle management.
#[async_trait]
pub trait Disposable {
    async fn dispose(&self);
}

/// Pacing configuration for the scheduling loop.
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    /// Break between processing cycles.
    pub break_interval: Duration,
    /// When true, skip the break entirely while the queue is non-empty
    /// and only pace the loop while idle.
    pub break_only_when_no_work: bool,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            break_interval: Duration::from_millis(1000),
            break_only_when_no_work: true,
        }
    }
}

struct QueuedAction {
    action: Action,
    handler: ErrorHandler,
}

struct Shared {
    // `disposed` is only flipped while `pending` is locked, so a
    // submission can never slip past disposal into a queue that will no
    // longer drain.
    pending: Mutex<VecDeque<QueuedAction>>,
    disposed: AtomicBool,
    executing: AtomicUsize,
    default_handler: ErrorHandler,
    config: ProcessorConfig,
    timer_canceller: DelayCanceller,
    sink: Arc<dyn DiagnosticSink>,
}

/// FIFO single-consumer background queue with bounded-interval draining.
pub struct BackgroundProcessor {
    shared: Arc<Shared>,
}

impl BackgroundProcessor {
    /// Create a processor with the default pacing configuration
    /// (1000ms break, taken only while idle) and immediately start its
    /// scheduling loop. Must be called within a Tokio runtime.
    pub fn new(default_handler: ErrorHandler) -> Self {
        // The default configuration is always valid.
        match Self::with_config(default_handler, ProcessorConfig::default()) {
            Ok(processor) => processor,
            Err(_) => unreachable!("default processor config is valid"),
        }
    }

    /// Create a processor with custom pacing. A zero `break_interval` is
    /// a usage error.
    pub fn with_config(default_handler: ErrorHandler, config: ProcessorConfig) -> Result<Self> {
        Self::with_sink(default_handler, config, default_sink())
    }

    /// Create a processor with custom pacing and an injected diagnostic
    /// sink (used by tests to observe swallowed handler failures).
    pub fn with_sink(
        default_handler: ErrorHandler,
        config: ProcessorConfig,
        sink: Arc<dyn DiagnosticSink>,
    ) -> Result<Self> {
        Error::check_duration(config.break_interval)?;
        let shared = Arc::new(Shared {
            pending: Mutex::new(VecDeque::new()),
            disposed: AtomicBool::new(false),
            executing: AtomicUsize::new(0),
            default_handler,
            config,
            timer_canceller: DelayCanceller::new(),
            sink,
        });
        tokio::spawn(Self::run_loop(Arc::clone(&shared)));
        Ok(Self { shared })
    }

    /// Append an action to the pending queue, to be run with the
    /// processor's default error handler. Never blocks.
    pub fn process_action(
        &self,
        action: impl FnOnce() -> BoxFuture<'static, Result<()>> + Send + 'static,
    ) -> Result<()> {
        self.submit(Box::new(action), None)
    }

    /// Append an action with its own error handler.
    pub fn process_action_with_handler(
        &self,
        action: impl FnOnce() -> BoxFuture<'static, Result<()>> + Send + 'static,
        handler: ErrorHandler,
    ) -> Result<()> {
        self.submit(Box::new(action), Some(handler))
    }

    fn submit(&self, action: Action, handler: Option<ErrorHandler>) -> Result<()> {
        let mut pending = self.shared.pending.lock();
        if self.shared.disposed.load(Ordering::SeqCst) {
            return Err(Error::ProcessorDisposed);
        }
        pending.push_back(QueuedAction {
            action,
            handler: handler.unwrap_or_else(|| Arc::clone(&self.shared.default_handler)),
        });
        Ok(())
    }

    /// Count of pending (not yet started) actions.
    pub fn queue_length(&self) -> usize {
        self.shared.pending.lock().len()
    }

    /// Whether the processor has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.shared.disposed.load(Ordering::SeqCst)
    }

    /// Stop the scheduling loop and wait for in-flight work.
    ///
    /// Idempotent: a second call returns immediately. With
    /// `kill_queue = false` this performs the drain burst: every still
    /// pending action is started concurrently, abandoning one-at-a-time
    /// pacing so shutdown latency does not scale with queue length ×
    /// interval. With `kill_queue = true` pending actions are discarded
    /// unrun. Either way the returned future resolves only once no
    /// action is executing anymore.
    pub async fn dispose(&self, kill_queue: bool) {
        let drained: Vec<QueuedAction> = {
            let mut pending = self.shared.pending.lock();
            if self.shared.disposed.swap(true, Ordering::SeqCst) {
                return;
            }
            if kill_queue {
                let discarded = pending.len();
                if discarded > 0 {
                    warn!(discarded, "disposing processor, discarding pending actions");
                }
                pending.clear();
                Vec::new()
            } else {
                // Counted as executing before the lock drops so the wait
                // below cannot observe a gap between queues.
                let drained: Vec<_> = pending.drain(..).collect();
                self.shared
                    .executing
                    .fetch_add(drained.len(), Ordering::SeqCst);
                drained
            }
        };

        self.shared.timer_canceller.cancel();
        debug!(burst = drained.len(), "disposing processor");

        // Drain burst: all remaining actions start at once.
        for queued in drained {
            let shared = Arc::clone(&self.shared);
            tokio::spawn(async move {
                Self::run_action(&shared, queued).await;
                shared.executing.fetch_sub(1, Ordering::SeqCst);
            });
        }

        while self.shared.executing.load(Ordering::SeqCst) > 0 {
            delay(DRAIN_POLL_INTERVAL, None).await;
        }
    }

    async fn run_loop(shared: Arc<Shared>) {
        loop {
            if shared.disposed.load(Ordering::SeqCst) {
                break;
            }

            // Skip the idle break when configured to run flat out while
            // work is waiting.
            let wait = if shared.config.break_only_when_no_work
                && !shared.pending.lock().is_empty()
            {
                Duration::ZERO
            } else {
                shared.config.break_interval
            };
            if !wait.is_zero() {
                delay(wait, Some(&shared.timer_canceller)).await;
            }

            if shared.disposed.load(Ordering::SeqCst) {
                break;
            }

            let next = {
                let mut pending = shared.pending.lock();
                let next = pending.pop_front();
                if next.is_some() {
                    // Within the same critical section as the pop, so
                    // dispose never sees the action in neither queue.
                    shared.executing.fetch_add(1, Ordering::SeqCst);
                }
                next
            };

            if let Some(queued) = next {
                // One at a time: the loop does not tick again until this
                // action's callback completes.
                Self::run_action(&shared, queued).await;
                shared.executing.fetch_sub(1, Ordering::SeqCst);
            }
        }
        debug!("processor loop stopped");
    }

    async fn run_action(shared: &Shared, queued: QueuedAction) {
        let QueuedAction { action, handler } = queued;

        // The action can fail three ways: panic while constructing the
        // future, panic while polling it, or resolve to an error. All
        // three route to the handler.
        let failure = match std::panic::catch_unwind(AssertUnwindSafe(action)) {
            Ok(future) => match AssertUnwindSafe(future).catch_unwind().await {
                Ok(Ok(())) => None,
                Ok(Err(err)) => Some(err),
                Err(panic) => Some(Error::Task(panic_message(panic))),
            },
            Err(panic) => Some(Error::Task(panic_message(panic))),
        };

        let Some(err) = failure else { return };
        debug!(%err, "background action failed, invoking handler");

        match AssertUnwindSafe(handler(err)).catch_unwind().await {
            Ok(Ok(())) => {}
            Ok(Err(secondary)) => shared.sink.handler_failure(&secondary),
            Err(panic) => shared.sink.handler_failure(&Error::Task(panic_message(panic))),
        }
    }
}

#[async_trait]
impl Disposable for BackgroundProcessor {
    async fn dispose(&self) {
        BackgroundProcessor::dispose(self, false).await;
    }
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    }
}
