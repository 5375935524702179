//! # Function-backed sources and source constructors.
//!
//! [`SourceFn`] wraps a closure `F: Fn(Emitter<T>, CancellationToken) -> Fut`,
//! producing a fresh future per run. The free constructors cover the common
//! shapes: [`value`] for a single-result operation, [`unit`] for an
//! effect-only operation, and [`from_stream`] for an existing stream of
//! results.
//!
//! ## Example
//! ```
//! use tokio_util::sync::CancellationToken;
//! use viewvisor::{Emitter, SourceFn, SourceRef, TaskError};
//!
//! let ticker: SourceRef<u64> =
//!     SourceFn::arc(|emitter: Emitter<u64>, _ctx: CancellationToken| async move {
//!         for tick in 0..3 {
//!             emitter.emit(tick);
//!         }
//!         Ok::<_, TaskError>(())
//!     });
//! # let _ = ticker;
//! ```

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::error::TaskError;
use crate::sources::source::{Emitter, Source, SourceRef};

/// Function-backed source implementation.
///
/// Wraps a closure that creates a new future per run; shared state, if any,
/// is whatever the closure captures explicitly.
pub struct SourceFn<F> {
    f: F,
}

impl<F> SourceFn<F> {
    /// Creates a new function-backed source.
    ///
    /// Prefer [`SourceFn::arc`] when you immediately need a [`SourceRef`].
    pub fn new(f: F) -> Self {
        Self { f }
    }

    /// Creates the source and returns it as a shared handle.
    pub fn arc(f: F) -> Arc<Self> {
        Arc::new(Self::new(f))
    }
}

#[async_trait]
impl<T, F, Fut> Source<T> for SourceFn<F>
where
    T: Send + 'static,
    F: Fn(Emitter<T>, CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
{
    async fn run(&self, emitter: Emitter<T>, ctx: CancellationToken) -> Result<(), TaskError> {
        (self.f)(emitter, ctx).await
    }
}

/// Source that emits the single value produced by `f`, then completes.
///
/// The analogue of starting a one-result async operation: fetch, compute,
/// done.
pub fn value<T, F, Fut>(f: F) -> SourceRef<T>
where
    T: Send + 'static,
    F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, TaskError>> + Send + 'static,
{
    SourceFn::arc(move |emitter: Emitter<T>, ctx: CancellationToken| {
        let fut = f(ctx);
        async move {
            let produced = fut.await?;
            emitter.emit(produced);
            Ok(())
        }
    })
}

/// Source that runs `f` for its effect and emits no values.
///
/// The terminal notification is the only thing a consumer observes.
pub fn unit<T, F, Fut>(f: F) -> SourceRef<T>
where
    T: Send + 'static,
    F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
{
    SourceFn::arc(move |_emitter: Emitter<T>, ctx: CancellationToken| f(ctx))
}

/// Source backed by an existing stream of results.
///
/// `Ok` items are emitted as values; the first `Err` item terminates the
/// task with that error; stream end completes it. The stream is consumed by
/// the first run — a stream source cannot be restarted.
pub fn from_stream<T, S>(stream: S) -> SourceRef<T>
where
    T: Send + 'static,
    S: Stream<Item = Result<T, TaskError>> + Send + 'static,
{
    Arc::new(StreamSource {
        inner: Mutex::new(Some(stream)),
    })
}

struct StreamSource<S> {
    inner: Mutex<Option<S>>,
}

#[async_trait]
impl<T, S> Source<T> for StreamSource<S>
where
    T: Send + 'static,
    S: Stream<Item = Result<T, TaskError>> + Send + 'static,
{
    async fn run(&self, emitter: Emitter<T>, ctx: CancellationToken) -> Result<(), TaskError> {
        let stream = { self.inner.lock().take() };
        let Some(stream) = stream else {
            return Err(TaskError::fail("stream source already consumed"));
        };
        tokio::pin!(stream);
        loop {
            tokio::select! {
                _ = ctx.cancelled() => return Err(TaskError::Canceled),
                item = stream.next() => match item {
                    Some(Ok(produced)) => emitter.emit(produced),
                    Some(Err(e)) => return Err(e),
                    None => return Ok(()),
                },
            }
        }
    }
}
