//! # Task source abstraction and value emitter.
//!
//! This module defines the [`Source`] trait (async, cancelable, emits a
//! sequence of values followed by exactly one terminal signal) and the
//! [`Emitter`] handle a source uses to push values. The common handle type
//! is [`SourceRef`], an `Arc<dyn Source<T>>` suitable for sharing across
//! the runtime.
//!
//! A source receives a [`CancellationToken`] and should periodically check
//! it to stop cooperatively when its task is cancelled.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::TaskError;

/// Shared handle to a task source.
pub type SourceRef<T> = Arc<dyn Source<T>>;

/// # Asynchronous, cancelable producer of task results.
///
/// A source emits zero or more values through the [`Emitter`] and then
/// finishes: `Ok(())` becomes the completion marker, `Err(e)` becomes the
/// error notification. Execution starts when the task is started and is
/// independent of view presence; only task cancellation stops it.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use tokio_util::sync::CancellationToken;
/// use viewvisor::{Emitter, Source, TaskError};
///
/// struct Countdown(u32);
///
/// #[async_trait]
/// impl Source<u32> for Countdown {
///     async fn run(&self, emitter: Emitter<u32>, ctx: CancellationToken) -> Result<(), TaskError> {
///         for n in (0..self.0).rev() {
///             if ctx.is_cancelled() {
///                 return Err(TaskError::Canceled);
///             }
///             emitter.emit(n);
///         }
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Source<T: Send + 'static>: Send + Sync + 'static {
    /// Executes the task until completion, failure, or cancellation.
    ///
    /// Implementations should check `ctx.is_cancelled()` at sensible points
    /// and exit promptly once cancelled.
    async fn run(&self, emitter: Emitter<T>, ctx: CancellationToken) -> Result<(), TaskError>;
}

/// Handle through which a source pushes values into the replay machinery.
///
/// Cloneable; values emitted after the task was torn down are dropped.
#[derive(Clone)]
pub struct Emitter<T> {
    tx: mpsc::UnboundedSender<T>,
}

impl<T: Send + 'static> Emitter<T> {
    pub(crate) fn new(tx: mpsc::UnboundedSender<T>) -> Self {
        Self { tx }
    }

    /// Emits one value.
    pub fn emit(&self, value: T) {
        if self.tx.send(value).is_err() {
            debug!("value emitted after task teardown, dropped");
        }
    }

    /// True once the task side has been torn down.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
