//! # Serialized delivery context for consumer callbacks.
//!
//! [`Dispatcher`] funnels every consumer callback through one worker loop,
//! the crate's stand-in for "the UI thread": user callbacks never run
//! concurrently with each other, and a misbehaving callback cannot corrupt
//! the task machinery.
//!
//! ## Architecture
//! ```text
//! delivery task A ──┐
//! delivery task B ──┼── post(gate, job) ──► [unbounded queue] ──► worker loop
//! delivery task N ──┘                                               │
//!                                                      gate cancelled? ── drop job
//!                                                               │
//!                                                      catch_unwind(job)
//!                                                               └─ panic → log, continue
//! ```
//!
//! ## Rules
//! - Jobs run strictly in post order (FIFO), so per-tag notification order
//!   is preserved end to end.
//! - A job whose gate was cancelled before dequeue is dropped; this is how
//!   `dispose`/`cancel` stop queued-but-undelivered notifications.
//! - Panics inside a job are caught and logged; the worker keeps running.
//! - The worker is spawned lazily on first use, so constructing a registry
//!   does not require a runtime context while starting a task does.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::error;

pub(crate) type Job = Box<dyn FnOnce() + Send>;

struct GatedJob {
    gate: CancellationToken,
    job: Job,
}

/// Handle to the serialized delivery loop. Cheap to clone.
#[derive(Clone)]
pub(crate) struct Dispatcher {
    tx: mpsc::UnboundedSender<GatedJob>,
    pending: Arc<Mutex<Option<mpsc::UnboundedReceiver<GatedJob>>>>,
}

impl Dispatcher {
    pub(crate) fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            pending: Arc::new(Mutex::new(Some(rx))),
        }
    }

    /// Spawns the worker loop if it has not started yet.
    ///
    /// Must be called from within a tokio runtime; the loop ends once every
    /// sender handle is gone.
    pub(crate) fn ensure_started(&self) {
        let taken = self.pending.lock().take();
        if let Some(mut rx) = taken {
            tokio::spawn(async move {
                while let Some(entry) = rx.recv().await {
                    if entry.gate.is_cancelled() {
                        continue;
                    }
                    if let Err(panic) = catch_unwind(AssertUnwindSafe(entry.job)) {
                        error!("delivery job panicked: {}", panic_message(panic));
                    }
                }
            });
        }
    }

    /// Queues a job; it runs unless its gate is cancelled before dequeue.
    pub(crate) fn post(&self, gate: CancellationToken, job: Job) {
        let _ = self.tx.send(GatedJob { gate, job });
    }
}

/// Renders a panic payload as text.
pub(crate) fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&'static str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
