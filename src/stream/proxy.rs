//! # Subscription proxy: replay plus view-presence recombination.
//!
//! [`SubscriptionProxy`] decouples task execution from view presence. The
//! source starts the moment the proxy is built and keeps running no matter
//! how often the view comes and goes; consumers subscribe against a replay
//! log and are paired with whichever view is current at delivery time.
//!
//! ## Architecture
//! ```text
//!            ┌────────────┐  values   ┌───────────┐
//! Source ───►│  producer  │──────────►│   pump    │──► ReplayLog (history + live taps)
//!            │ (spawned   │  channel  │ (terminal │         │
//!            │  once)     │           │  on join) │         │ full history, then live
//!            └────────────┘           └───────────┘         ▼
//!                                               ┌──────────────────────┐
//! view watch (Some/None on attach/detach) ─────►│    delivery task     │
//!                                               │ pair with latest view│
//!                                               │ absent view → filter │
//!                                               └──────────┬───────────┘
//!                                                          ▼
//!                                          dispatcher job (or inline call)
//!                                                          ▼
//!                                                  consumer callback
//! ```
//!
//! ## Rules
//! - The source is subscribed immediately and unconditionally; detaching a
//!   view never pauses or cancels it.
//! - `subscribe` drops any previous consumer subscription, then replays the
//!   entire history to the new consumer before forwarding live
//!   notifications. Safe to call once per reattach.
//! - A notification is only handed to the consumer together with a present
//!   view; when the view signal goes absent the delivery task stops itself.
//! - `dispose` stops delivery only. `cancel` also tears down the source and
//!   leaves the proxy permanently inert.
//! - After the terminal notification reaches a consumer, the termination
//!   action runs (the registry uses it to evict the tag).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::task::{AbortHandle, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::error;

use crate::error::TaskError;
use crate::sources::{Emitter, SourceRef};
use crate::stream::dispatch::{panic_message, Dispatcher};
use crate::stream::replay::ReplayLog;
use crate::stream::{BoundData, Notification};

/// Consumer of view-bound notifications, built from a callback bundle.
pub(crate) type Consumer<V, T> = Arc<dyn Fn(BoundData<V, T>) + Send + Sync>;

/// Action invoked after a terminal notification has been delivered.
pub(crate) type TerminateAction = Arc<dyn Fn() + Send + Sync>;

/// Proxy for one running task: replay log, source handle, and the current
/// consumer subscription.
pub struct SubscriptionProxy<V, T> {
    log: Arc<ReplayLog<T>>,
    view_rx: watch::Receiver<Option<V>>,
    token: CancellationToken,
    producer_abort: AbortHandle,
    pump: JoinHandle<()>,
    delivery: Mutex<Option<Delivery>>,
    on_terminate: TerminateAction,
    dispatcher: Option<Dispatcher>,
    canceled: AtomicBool,
}

/// One consumer subscription: its gate and the delivery task driving it.
struct Delivery {
    gate: CancellationToken,
    task: JoinHandle<()>,
}

impl<V, T> SubscriptionProxy<V, T>
where
    V: Clone + Send + Sync + 'static,
    T: Clone + Send + 'static,
{
    /// Builds the proxy and immediately starts the source.
    ///
    /// `dispatcher` is the serialized delivery context; `None` invokes
    /// consumers directly on the delivery task. Requires a runtime context.
    pub(crate) fn new(
        source: SourceRef<T>,
        view_rx: watch::Receiver<Option<V>>,
        dispatcher: Option<Dispatcher>,
        on_terminate: TerminateAction,
    ) -> Self {
        let log = Arc::new(ReplayLog::new());
        let token = CancellationToken::new();
        let (value_tx, mut value_rx) = mpsc::unbounded_channel();

        let producer = tokio::spawn({
            let token = token.clone();
            async move { source.run(Emitter::new(value_tx), token).await }
        });
        let producer_abort = producer.abort_handle();

        // The pump drains values in emission order; the channel closes when
        // the source is done, at which point its result becomes the
        // terminal notification and the log seals.
        let pump = tokio::spawn({
            let log = Arc::clone(&log);
            async move {
                while let Some(value) = value_rx.recv().await {
                    log.publish(Notification::Value(value));
                }
                let terminal = match producer.await {
                    Ok(Ok(())) => Notification::Complete,
                    Ok(Err(e)) => Notification::Error(e),
                    Err(join) if join.is_cancelled() => {
                        Notification::Error(TaskError::Canceled)
                    }
                    Err(join) => Notification::Error(TaskError::Panicked {
                        message: panic_message(join.into_panic()),
                    }),
                };
                log.publish(terminal);
            }
        });

        Self {
            log,
            view_rx,
            token,
            producer_abort,
            pump,
            delivery: Mutex::new(None),
            on_terminate,
            dispatcher,
            canceled: AtomicBool::new(false),
        }
    }

    /// Subscribes a consumer: full history first, then live notifications.
    ///
    /// Any previous consumer subscription on this proxy is dropped first.
    /// No-op once the proxy is cancelled.
    pub(crate) fn subscribe(&self, consumer: Consumer<V, T>) {
        if self.canceled.load(Ordering::Acquire) {
            return;
        }
        self.dispose();

        let gate = CancellationToken::new();
        let mut notifications = self.log.subscribe();
        let mut views = self.view_rx.clone();
        let dispatcher = self.dispatcher.clone();
        let on_terminate = Arc::clone(&self.on_terminate);

        let task = tokio::spawn({
            let gate = gate.clone();
            async move {
                loop {
                    tokio::select! {
                        _ = gate.cancelled() => break,
                        changed = views.changed() => match changed {
                            // A present view needs no action here: pending
                            // notifications pair with the latest view below.
                            Ok(()) => {
                                if views.borrow().is_none() {
                                    break;
                                }
                            }
                            Err(_) => break,
                        },
                        notification = notifications.recv() => {
                            let Some(notification) = notification else { break };
                            let view = views.borrow().clone();
                            let Some(view) = view else { continue };

                            let terminal = notification.is_terminal();
                            let bound = BoundData::new(Some(view), notification);
                            let consumer = Arc::clone(&consumer);
                            let after = terminal.then(|| Arc::clone(&on_terminate));
                            let job = move || {
                                invoke_consumer(&consumer, bound);
                                if let Some(after) = after {
                                    after();
                                }
                            };
                            match &dispatcher {
                                Some(dispatcher) => dispatcher.post(gate.clone(), Box::new(job)),
                                None => {
                                    if !gate.is_cancelled() {
                                        job();
                                    }
                                }
                            }
                            if terminal {
                                break;
                            }
                        }
                    }
                }
            }
        });

        *self.delivery.lock() = Some(Delivery { gate, task });
    }

    /// Stops delivery to the current consumer without touching the source.
    ///
    /// The replay log is kept; a later `subscribe` sees the full history.
    pub(crate) fn dispose(&self) {
        if let Some(delivery) = self.delivery.lock().take() {
            delivery.gate.cancel();
            delivery.task.abort();
        }
    }

    /// Tears everything down: consumer delivery, source execution, pump.
    ///
    /// The proxy is permanently inert afterwards.
    pub(crate) fn cancel(&self) {
        self.canceled.store(true, Ordering::Release);
        self.dispose();
        self.token.cancel();
        self.producer_abort.abort();
        self.pump.abort();
    }

    /// True while no consumer subscription is active.
    pub fn is_disposed(&self) -> bool {
        self.delivery.lock().is_none()
    }

    /// True once `cancel` ran.
    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::Acquire)
    }
}

impl<V, T> Drop for SubscriptionProxy<V, T> {
    fn drop(&mut self) {
        // A dropped proxy must not leave the source running detached.
        self.token.cancel();
        self.producer_abort.abort();
        self.pump.abort();
        if let Some(delivery) = self.delivery.lock().take() {
            delivery.gate.cancel();
            delivery.task.abort();
        }
    }
}

fn invoke_consumer<V, T>(consumer: &Consumer<V, T>, bound: BoundData<V, T>) {
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| consumer(bound)));
    if let Err(panic) = result {
        error!("consumer callback panicked: {}", panic_message(panic));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::SourceFn;
    use std::time::Duration;

    type Seen = Arc<Mutex<Vec<String>>>;

    fn recording_consumer(seen: Seen) -> Consumer<String, u32> {
        Arc::new(move |bound: BoundData<String, u32>| {
            let (view, data) = bound.into_parts();
            let Some(view) = view else { return };
            let entry = match data {
                Notification::Value(v) => format!("{view}:{v}"),
                Notification::Error(e) => format!("{view}:error:{e}"),
                Notification::Complete => format!("{view}:done"),
            };
            seen.lock().push(entry);
        })
    }

    fn counting_source(limit: u32, release: Arc<tokio::sync::Notify>) -> SourceRef<u32> {
        SourceFn::arc(move |emitter: Emitter<u32>, _ctx: CancellationToken| {
            let release = Arc::clone(&release);
            async move {
                emitter.emit(1);
                release.notified().await;
                for v in 2..=limit {
                    emitter.emit(v);
                }
                Ok::<_, crate::error::TaskError>(())
            }
        })
    }

    #[tokio::test]
    async fn resubscribe_replays_full_history() {
        let (view_tx, view_rx) = watch::channel(Some("v1".to_string()));
        let release = Arc::new(tokio::sync::Notify::new());
        let proxy = SubscriptionProxy::new(
            counting_source(2, Arc::clone(&release)),
            view_rx,
            None,
            Arc::new(|| {}),
        );

        let seen: Seen = Arc::new(Mutex::new(Vec::new()));
        proxy.subscribe(recording_consumer(Arc::clone(&seen)));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(*seen.lock(), vec!["v1:1".to_string()]);

        // View goes away; source keeps running to completion.
        proxy.dispose();
        view_tx.send_replace(None);
        release.notify_one();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(seen.lock().len(), 1);

        // Reattach: full history, then the terminal marker.
        view_tx.send_replace(Some("v2".to_string()));
        proxy.subscribe(recording_consumer(Arc::clone(&seen)));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(
            *seen.lock(),
            vec!["v1:1", "v2:1", "v2:2", "v2:done"]
                .into_iter()
                .map(String::from)
                .collect::<Vec<_>>()
        );
    }

    #[tokio::test]
    async fn cancel_makes_the_proxy_inert() {
        let (_view_tx, view_rx) = watch::channel(Some("v".to_string()));
        let release = Arc::new(tokio::sync::Notify::new());
        let proxy = SubscriptionProxy::new(
            counting_source(3, Arc::clone(&release)),
            view_rx,
            None,
            Arc::new(|| {}),
        );

        let seen: Seen = Arc::new(Mutex::new(Vec::new()));
        proxy.subscribe(recording_consumer(Arc::clone(&seen)));
        tokio::time::sleep(Duration::from_millis(50)).await;

        proxy.cancel();
        assert!(proxy.is_canceled());
        let delivered = seen.lock().len();

        // Nothing further arrives, and resubscribing is a no-op.
        release.notify_one();
        proxy.subscribe(recording_consumer(Arc::clone(&seen)));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(seen.lock().len(), delivered);
        assert!(proxy.is_disposed());
    }

    #[tokio::test]
    async fn terminal_delivery_runs_the_termination_action() {
        let (_view_tx, view_rx) = watch::channel(Some("v".to_string()));
        let terminated = Arc::new(AtomicBool::new(false));
        let on_terminate: TerminateAction = {
            let terminated = Arc::clone(&terminated);
            Arc::new(move || terminated.store(true, Ordering::Release))
        };
        let source: SourceRef<u32> =
            SourceFn::arc(|emitter: Emitter<u32>, _ctx: CancellationToken| async move {
                emitter.emit(42);
                Ok::<_, crate::error::TaskError>(())
            });
        let proxy = SubscriptionProxy::new(source, view_rx, None, on_terminate);

        let seen: Seen = Arc::new(Mutex::new(Vec::new()));
        proxy.subscribe(recording_consumer(Arc::clone(&seen)));
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(*seen.lock(), vec!["v:42".to_string(), "v:done".to_string()]);
        assert!(terminated.load(Ordering::Acquire));
    }
}
