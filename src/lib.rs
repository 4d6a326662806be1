//! Taskpace - execution-pacing primitives for async Rust
//!
//! Coordinating exclusive or rate-limited execution of async operations
//! comes up in every long-running service: draining a work queue one
//! item at a time, collapsing bursts of UI-triggered saves, serializing
//! writers on a shared resource. This crate is that coordination core:
//! - deferred: single-shot externally settled computations
//! - mutex: FIFO mutual exclusion for async tasks
//! - processor: interval-driven fire-and-forget background queue
//! - pace: dedupe / debounce / throttle / synchronize call wrappers
//! - delay: the cancellable sleep all pacing is built on
//!
//! Everything targets Tokio and assumes real preemptive threads: all
//! shared state is explicitly synchronized, never protected by "nothing
//! awaits here" reasoning.

pub mod deferred; // Single-shot resolve/reject handles
pub mod delay; // Cancellable sleep primitive
pub mod diagnostics; // Injectable sink for fire-and-forget failures
pub mod error;
pub mod mutex; // FIFO mutual exclusion
pub mod pace; // Call-pacing wrappers
pub mod processor; // Background work queue

// Re-export commonly used types for easy access
pub use deferred::Deferred;
pub use delay::{delay, DelayCanceller};
pub use diagnostics::{DiagnosticSink, TracingSink};
pub use error::{Error, Result};
pub use mutex::{FifoMutex, FifoMutexGuard};
pub use pace::{Debounce, Dedupe, Synchronize, Throttle};
pub use processor::{
    Action, BackgroundProcessor, Disposable, ErrorHandler, ProcessorConfig,
};
