//! # Task registry: tag-keyed task lifecycle manager.
//!
//! [`TaskRegistry`] owns everything a presenter needs to keep tasks alive
//! across view churn: the tag→task map, the view-presence signal, the
//! deferred-action queue, and the batch resume/dispose/cancel operations
//! driven by the presenter lifecycle.
//!
//! ## Architecture
//! ```text
//! start(tag, source, callbacks)
//!     │  tag present? ──► resume (full replay to current view)
//!     │  tag absent?  ──► SubscriptionProxy::new (source starts NOW)
//!     │                   map[tag] = proxy + consumer, resume
//!     ▼
//! view attach  ──► publish Some(view) ──► drain deferred queue ──► resume_all
//! view detach  ──► publish None ──► abort retained ──► dispose_all (tasks keep running)
//! destroy      ──► publish None ──► abort retained ──► cancel_all, map cleared, inert
//! ```
//!
//! ## Rules
//! - At most one entry per tag: a second `start` with a live tag never
//!   creates a second execution, it only re-subscribes the consumer.
//! - A tag stays in the map until its terminal notification has been
//!   *delivered* to an attached view; terminating while detached keeps the
//!   tag (and the replay buffer) for the next attach.
//! - Batch operations set the manipulating flag; terminal-driven removals
//!   observed while it is set go to the terminated queue and are flushed
//!   right after the batch, never mutating the map mid-iteration.
//! - `cancel(tag)` is the only way to stop a running source; detach only
//!   pauses delivery.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::AbortHandle;
use tracing::{debug, error, warn};

use crate::registry::cached::{CachedStream, Resumable};
use crate::registry::callbacks::Callbacks;
use crate::registry::policy::DeliveryPolicy;
use crate::sources::SourceRef;
use crate::stream::{panic_message, Dispatcher, SubscriptionProxy, TerminateAction};

type DeferredAction<V> = Box<dyn FnOnce(&V) + Send>;

/// Tag-keyed registry of running tasks, bound to one presenter's view.
///
/// All methods take `&self`; the registry is internally synchronized and
/// safe to drive from lifecycle callbacks while delivery tasks report
/// terminations concurrently. `start` must run inside a tokio runtime.
pub struct TaskRegistry<V> {
    inner: Arc<Inner<V>>,
}

struct Inner<V> {
    /// View-presence signal every proxy subscription recombines with.
    view_tx: watch::Sender<Option<V>>,
    /// One cached task per tag.
    tasks: Mutex<HashMap<String, Box<dyn Resumable>>>,
    /// Actions waiting for the next view attach, keyed by tag.
    queue: Mutex<HashMap<String, DeferredAction<V>>>,
    /// Tags whose terminal arrived while a batch operation was running.
    terminated: Mutex<Vec<String>>,
    /// Set while a batch operation iterates the task map.
    manipulating: AtomicBool,
    /// Side work aborted on detach/destroy, keyed for removal.
    retained: Mutex<HashMap<u64, AbortHandle>>,
    retained_seq: AtomicU64,
    /// Serialized delivery context shared by every task of this registry.
    dispatcher: Dispatcher,
    destroyed: AtomicBool,
}

impl<V> TaskRegistry<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Creates an empty registry with no view attached.
    pub fn new() -> Self {
        let (view_tx, _) = watch::channel(None);
        Self {
            inner: Arc::new(Inner {
                view_tx,
                tasks: Mutex::new(HashMap::new()),
                queue: Mutex::new(HashMap::new()),
                terminated: Mutex::new(Vec::new()),
                manipulating: AtomicBool::new(false),
                retained: Mutex::new(HashMap::new()),
                retained_seq: AtomicU64::new(0),
                dispatcher: Dispatcher::new(),
                destroyed: AtomicBool::new(false),
            }),
        }
    }

    /// Starts a task under `tag` with serialized callback delivery.
    ///
    /// If the tag is already live the source is *not* executed again; the
    /// existing task is resumed so the current view receives the full
    /// replay.
    pub fn start<T>(&self, tag: &str, source: SourceRef<T>, callbacks: Callbacks<V, T>)
    where
        T: Clone + Send + 'static,
    {
        self.start_with(tag, source, DeliveryPolicy::Serialized, callbacks);
    }

    /// Starts a task under `tag` with an explicit delivery policy.
    pub fn start_with<T>(
        &self,
        tag: &str,
        source: SourceRef<T>,
        policy: DeliveryPolicy,
        callbacks: Callbacks<V, T>,
    ) where
        T: Clone + Send + 'static,
    {
        if self.inner.destroyed.load(Ordering::Acquire) {
            warn!("start({tag}) ignored: registry is destroyed");
            return;
        }
        let mut tasks = self.inner.tasks.lock();
        if let Some(entry) = tasks.get(tag) {
            debug!("resuming task: {tag}");
            entry.resume();
            return;
        }
        debug!("starting task: {tag}");
        self.inner.dispatcher.ensure_started();
        let dispatcher = match policy {
            DeliveryPolicy::Serialized => Some(self.inner.dispatcher.clone()),
            DeliveryPolicy::Inline => None,
        };
        let proxy = SubscriptionProxy::new(
            source,
            self.inner.view_tx.subscribe(),
            dispatcher,
            Inner::terminate_action(&self.inner, tag),
        );
        let entry: Box<dyn Resumable> = Box::new(CachedStream::new(proxy, callbacks.into_consumer()));
        entry.resume();
        tasks.insert(tag.to_string(), entry);
    }

    /// Cancels the task under `tag`, if any: stops the source, drops the
    /// entry. The next `start` with this tag begins a fresh execution.
    pub fn cancel(&self, tag: &str) {
        let entry = self.inner.tasks.lock().remove(tag);
        if let Some(entry) = entry {
            debug!("cancelling task: {tag}");
            entry.cancel();
        }
    }

    /// True while an entry exists for `tag` — running, or terminated with
    /// the terminal notification not yet delivered to a view.
    pub fn is_task_in_progress(&self, tag: &str) -> bool {
        self.inner.tasks.lock().contains_key(tag)
    }

    /// Runs `action` now if a view is attached, otherwise queues it for the
    /// next attach. A queued action fires at most once and is then removed.
    pub fn start_on_view_attached(&self, tag: &str, action: impl FnOnce(&V) + Send + 'static) {
        if self.inner.destroyed.load(Ordering::Acquire) {
            warn!("start_on_view_attached({tag}) ignored: registry is destroyed");
            return;
        }
        let current = self.inner.view_tx.borrow().clone();
        match current {
            Some(view) => Inner::<V>::run_deferred(tag, Box::new(action), &view),
            None => {
                self.inner.queue.lock().insert(tag.to_string(), Box::new(action));
            }
        }
    }

    /// Removes a queued action for `tag`; optionally also cancels a running
    /// task with the same tag.
    pub fn cancel_waiting_for_view_attached(&self, tag: &str, cancel_if_started: bool) {
        self.inner.queue.lock().remove(tag);
        if cancel_if_started {
            self.cancel(tag);
        }
    }

    /// Retains side work (anything with an [`AbortHandle`]) to be aborted
    /// on view detach and on destroy. Returns a key for
    /// [`remove_subscription`](Self::remove_subscription).
    pub fn add_subscription(&self, handle: AbortHandle) -> u64 {
        let key = self.inner.retained_seq.fetch_add(1, Ordering::Relaxed);
        self.inner.retained.lock().insert(key, handle);
        key
    }

    /// Aborts and forgets a previously retained handle.
    pub fn remove_subscription(&self, key: u64) {
        if let Some(handle) = self.inner.retained.lock().remove(&key) {
            handle.abort();
        }
    }

    /// View attached: publish presence, drain the deferred queue first,
    /// then resume every cached task (full replay each).
    pub fn on_view_attached(&self, view: V) {
        self.inner.view_tx.send_replace(Some(view.clone()));
        self.inner.resume_queue(&view);
        self.inner.resume_all();
    }

    /// View detached: publish absence and pause delivery. Execution
    /// continues; queued actions are left untouched.
    pub fn on_view_detached(&self) {
        self.inner.view_tx.send_replace(None);
        self.inner.abort_retained();
        self.inner.dispose_all();
    }

    /// Presenter destroyed: cancel everything and clear the map. The
    /// registry is permanently inert afterwards.
    pub fn on_destroy(&self) {
        if self.inner.destroyed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.inner.view_tx.send_replace(None);
        self.inner.queue.lock().clear();
        self.inner.abort_retained();
        self.inner.cancel_all();
    }

    /// True once [`on_destroy`](Self::on_destroy) ran.
    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.load(Ordering::Acquire)
    }
}

impl<V> Default for TaskRegistry<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Inner<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Builds the removal action a proxy runs after delivering its terminal
    /// notification. Removals observed mid-batch are deferred to the
    /// terminated queue; the weak handle keeps finished delivery tasks from
    /// pinning a dropped registry.
    fn terminate_action(inner: &Arc<Self>, tag: &str) -> TerminateAction {
        let weak: Weak<Self> = Arc::downgrade(inner);
        let tag = tag.to_string();
        Arc::new(move || {
            let Some(inner) = weak.upgrade() else { return };
            if inner.manipulating.load(Ordering::Acquire) {
                inner.terminated.lock().push(tag.clone());
            } else {
                inner.remove_task(&tag);
            }
        })
    }

    fn remove_task(&self, tag: &str) {
        if self.tasks.lock().remove(tag).is_some() {
            debug!("removed terminated task from cache: {tag}");
        }
    }

    fn flush_terminated(&self) {
        let drained: Vec<String> = std::mem::take(&mut *self.terminated.lock());
        for tag in drained {
            self.remove_task(&tag);
        }
    }

    fn resume_all(&self) {
        self.manipulating.store(true, Ordering::Release);
        {
            let tasks = self.tasks.lock();
            for entry in tasks.values() {
                entry.resume();
            }
        }
        self.manipulating.store(false, Ordering::Release);
        self.flush_terminated();
    }

    fn dispose_all(&self) {
        self.manipulating.store(true, Ordering::Release);
        {
            let tasks = self.tasks.lock();
            for entry in tasks.values() {
                entry.dispose();
            }
        }
        self.manipulating.store(false, Ordering::Release);
        self.flush_terminated();
    }

    fn cancel_all(&self) {
        self.manipulating.store(true, Ordering::Release);
        {
            let mut tasks = self.tasks.lock();
            for entry in tasks.values() {
                entry.cancel();
            }
            tasks.clear();
        }
        self.manipulating.store(false, Ordering::Release);
        self.flush_terminated();
    }

    /// Drains the deferred-action queue into the freshly attached view.
    /// Entries are removed before invocation, so each fires at most once.
    fn resume_queue(&self, view: &V) {
        let drained: Vec<(String, DeferredAction<V>)> = {
            let mut queue = self.queue.lock();
            queue.drain().collect()
        };
        if drained.is_empty() {
            return;
        }
        debug!("{} deferred action(s) waited for view attach", drained.len());
        for (tag, action) in drained {
            debug!("running deferred action: {tag}");
            Self::run_deferred(&tag, action, view);
        }
    }

    fn run_deferred(tag: &str, action: DeferredAction<V>, view: &V) {
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| action(view)));
        if let Err(panic) = result {
            error!("deferred action {tag} panicked: {}", panic_message(panic));
        }
    }

    fn abort_retained(&self) {
        let drained: Vec<AbortHandle> = {
            let mut retained = self.retained.lock();
            retained.drain().map(|(_, handle)| handle).collect()
        };
        for handle in drained {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TaskError;
    use crate::sources::{Emitter, SourceFn};
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tokio::sync::Notify;
    use tokio_util::sync::CancellationToken;

    /// A view that records everything delivered to it.
    #[derive(Clone)]
    struct Probe {
        seen: Arc<Mutex<Vec<String>>>,
    }

    impl Probe {
        fn new() -> Self {
            Self {
                seen: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn record(&self, entry: String) {
            self.seen.lock().push(entry);
        }

        fn seen(&self) -> Vec<String> {
            self.seen.lock().clone()
        }
    }

    fn recording_callbacks() -> Callbacks<Probe, String> {
        Callbacks::new()
            .on_next(|view: &Probe, value: &String| view.record(format!("next:{value}")))
            .on_error(|view: &Probe, err: &TaskError| view.record(format!("error:{}", err.as_label())))
            .on_completed(|view: &Probe| view.record("completed".to_string()))
    }

    /// Emits "A", waits for `release`, emits "B", completes.
    fn gated_source(release: Arc<Notify>, runs: Arc<AtomicUsize>) -> SourceRef<String> {
        SourceFn::arc(move |emitter: Emitter<String>, _ctx: CancellationToken| {
            let release = Arc::clone(&release);
            let runs = Arc::clone(&runs);
            async move {
                runs.fetch_add(1, Ordering::SeqCst);
                emitter.emit("A".to_string());
                release.notified().await;
                emitter.emit("B".to_string());
                Ok::<_, TaskError>(())
            }
        })
    }

    /// Runs until cancelled.
    fn pending_source() -> SourceRef<String> {
        SourceFn::arc(|_emitter: Emitter<String>, ctx: CancellationToken| async move {
            ctx.cancelled().await;
            Err(TaskError::Canceled)
        })
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(80)).await;
    }

    #[tokio::test]
    async fn start_deduplicates_execution() {
        let registry = TaskRegistry::<Probe>::new();
        let release = Arc::new(Notify::new());
        let runs = Arc::new(AtomicUsize::new(0));

        registry.start("t", gated_source(Arc::clone(&release), Arc::clone(&runs)), recording_callbacks());
        registry.start("t", gated_source(Arc::clone(&release), Arc::clone(&runs)), recording_callbacks());
        settle().await;

        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(registry.is_task_in_progress("t"));
    }

    #[tokio::test]
    async fn replay_on_reattach_delivers_full_history() {
        let registry = TaskRegistry::<Probe>::new();
        let release = Arc::new(Notify::new());
        let runs = Arc::new(AtomicUsize::new(0));

        registry.start("t", gated_source(Arc::clone(&release), Arc::clone(&runs)), recording_callbacks());

        let first = Probe::new();
        registry.on_view_attached(first.clone());
        settle().await;
        assert_eq!(first.seen(), vec!["next:A".to_string()]);

        // Detach; the source finishes while nobody is watching.
        registry.on_view_detached();
        release.notify_one();
        settle().await;
        assert_eq!(first.seen(), vec!["next:A".to_string()]);
        assert!(
            registry.is_task_in_progress("t"),
            "terminal not yet delivered, tag must survive detach"
        );

        // Reattach: the new view gets the whole story, then the tag goes.
        let second = Probe::new();
        registry.on_view_attached(second.clone());
        settle().await;
        assert_eq!(
            second.seen(),
            vec!["next:A".to_string(), "next:B".to_string(), "completed".to_string()]
        );
        assert!(!registry.is_task_in_progress("t"));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancel_removes_and_stops() {
        let registry = TaskRegistry::<Probe>::new();
        let release = Arc::new(Notify::new());
        let runs = Arc::new(AtomicUsize::new(0));

        registry.start("t", gated_source(Arc::clone(&release), Arc::clone(&runs)), recording_callbacks());
        let view = Probe::new();
        registry.on_view_attached(view.clone());
        settle().await;

        registry.cancel("t");
        assert!(!registry.is_task_in_progress("t"));
        let delivered = view.seen().len();

        release.notify_one();
        settle().await;
        assert_eq!(view.seen().len(), delivered, "no delivery after cancel");
    }

    #[tokio::test]
    async fn destroy_cascades_to_every_task() {
        let registry = TaskRegistry::<Probe>::new();
        registry.start("a", pending_source(), recording_callbacks());
        registry.start("b", pending_source(), recording_callbacks());
        assert!(registry.is_task_in_progress("a"));
        assert!(registry.is_task_in_progress("b"));

        registry.on_destroy();
        assert!(!registry.is_task_in_progress("a"));
        assert!(!registry.is_task_in_progress("b"));
        assert!(registry.is_destroyed());

        // The registry is inert now.
        registry.start("c", pending_source(), recording_callbacks());
        assert!(!registry.is_task_in_progress("c"));
    }

    #[tokio::test]
    async fn deferred_action_fires_exactly_once() {
        let registry = TaskRegistry::<Probe>::new();
        let fired = Arc::new(AtomicUsize::new(0));

        registry.start_on_view_attached("x", {
            let fired = Arc::clone(&fired);
            move |view: &Probe| {
                fired.fetch_add(1, Ordering::SeqCst);
                view.record("deferred".to_string());
            }
        });
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        let first = Probe::new();
        registry.on_view_attached(first.clone());
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(first.seen(), vec!["deferred".to_string()]);

        registry.on_view_detached();
        let second = Probe::new();
        registry.on_view_attached(second.clone());
        assert_eq!(fired.load(Ordering::SeqCst), 1, "queued action fires once");
        assert!(second.seen().is_empty());
    }

    #[tokio::test]
    async fn deferred_action_runs_immediately_with_view_attached() {
        let registry = TaskRegistry::<Probe>::new();
        let view = Probe::new();
        registry.on_view_attached(view.clone());

        registry.start_on_view_attached("x", |view: &Probe| view.record("now".to_string()));
        assert_eq!(view.seen(), vec!["now".to_string()]);
    }

    #[tokio::test]
    async fn cancel_waiting_drops_queued_action_and_optionally_the_task() {
        let registry = TaskRegistry::<Probe>::new();
        let fired = Arc::new(AtomicUsize::new(0));
        registry.start_on_view_attached("x", {
            let fired = Arc::clone(&fired);
            move |_view: &Probe| {
                fired.fetch_add(1, Ordering::SeqCst);
            }
        });
        registry.start("x", pending_source(), recording_callbacks());

        registry.cancel_waiting_for_view_attached("x", true);
        registry.on_view_attached(Probe::new());
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(!registry.is_task_in_progress("x"));
    }

    #[tokio::test]
    async fn error_notification_routes_to_on_error() {
        let registry = TaskRegistry::<Probe>::new();
        let source: SourceRef<String> =
            SourceFn::arc(|_emitter: Emitter<String>, _ctx: CancellationToken| async move {
                Err(TaskError::fail("boom"))
            });
        registry.start("t", source, recording_callbacks());

        let view = Probe::new();
        registry.on_view_attached(view.clone());
        settle().await;

        assert_eq!(view.seen(), vec!["error:task_failed".to_string()]);
        assert!(!registry.is_task_in_progress("t"));
    }

    #[tokio::test]
    async fn callback_panic_does_not_poison_the_registry() {
        let registry = TaskRegistry::<Probe>::new();
        let source: SourceRef<String> =
            SourceFn::arc(|emitter: Emitter<String>, _ctx: CancellationToken| async move {
                emitter.emit("A".to_string());
                Ok::<_, TaskError>(())
            });
        registry.start(
            "t",
            source,
            Callbacks::new().on_next(|_view: &Probe, _value: &String| panic!("consumer bug")),
        );
        let view = Probe::new();
        registry.on_view_attached(view.clone());
        settle().await;

        // A second, well-behaved task still works.
        let release = Arc::new(Notify::new());
        let runs = Arc::new(AtomicUsize::new(0));
        registry.start("u", gated_source(Arc::clone(&release), runs), recording_callbacks());
        release.notify_one();
        settle().await;
        assert!(view.seen().contains(&"completed".to_string()));
    }

    /// The manipulating-flag discipline, exercised directly: a terminal
    /// arriving mid-batch must defer its removal and be flushed afterwards.
    #[test]
    fn terminal_during_batch_defers_removal() {
        struct Noop;
        impl Resumable for Noop {
            fn resume(&self) {}
            fn dispose(&self) {}
            fn cancel(&self) {}
        }

        let registry = TaskRegistry::<Probe>::new();
        registry.inner.tasks.lock().insert("t".to_string(), Box::new(Noop));
        let action = Inner::terminate_action(&registry.inner, "t");

        registry.inner.manipulating.store(true, Ordering::Release);
        action();
        assert!(registry.is_task_in_progress("t"), "removal must be deferred");
        assert_eq!(registry.inner.terminated.lock().len(), 1);

        registry.inner.manipulating.store(false, Ordering::Release);
        registry.inner.flush_terminated();
        assert!(!registry.is_task_in_progress("t"));
        assert!(registry.inner.terminated.lock().is_empty());
    }

    /// Same discipline end to end: a source that completes instantly while
    /// resume_all iterates must not corrupt the map, and the tag is gone
    /// once deliveries settle.
    #[tokio::test]
    async fn immediate_terminal_survives_batch_resume() {
        let registry = TaskRegistry::<Probe>::new();
        let source: SourceRef<String> =
            SourceFn::arc(|emitter: Emitter<String>, _ctx: CancellationToken| async move {
                emitter.emit("only".to_string());
                Ok::<_, TaskError>(())
            });
        registry.start("t", source, recording_callbacks());

        let view = Probe::new();
        registry.on_view_attached(view.clone());
        settle().await;

        assert_eq!(
            view.seen(),
            vec!["next:only".to_string(), "completed".to_string()]
        );
        assert!(!registry.is_task_in_progress("t"));
    }

    #[tokio::test]
    async fn retained_subscriptions_abort_on_detach() {
        let registry = TaskRegistry::<Probe>::new();
        let stopped = Arc::new(AtomicBool::new(false));
        let handle = tokio::spawn({
            let stopped = Arc::clone(&stopped);
            async move {
                tokio::time::sleep(Duration::from_secs(60)).await;
                stopped.store(true, Ordering::SeqCst);
            }
        });
        registry.add_subscription(handle.abort_handle());

        registry.on_view_attached(Probe::new());
        registry.on_view_detached();
        settle().await;

        assert!(handle.is_finished(), "retained work must be aborted on detach");
        assert!(!stopped.load(Ordering::SeqCst));
    }
}
