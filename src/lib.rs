//! # viewvisor
//!
//! **viewvisor** is a lifecycle-resilient bridge between long-running async
//! tasks and UI-bound presenters whose display surface ("view") may be
//! destroyed and recreated — device-rotation style — independently of task
//! progress.
//!
//! It keeps at most one execution per logical task alive across view
//! churn, and delivers exactly the right notification sequence to
//! whichever view is currently attached, including a view that attaches
//! *after* the task already produced output.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!    host lifecycle callbacks
//!             │
//!             ▼
//! ┌────────────────────────────────────────────────────────────┐
//! │ PresenterProvider (per view owner)                         │
//! │  - restore-by-id from PresenterCache, or factory-create    │
//! │  - attach/detach view, save/restore state                  │
//! └──────────────┬─────────────────────────────────────────────┘
//!                ▼
//! ┌────────────────────────────────────────────────────────────┐
//! │ PresenterCell (state machine)                              │
//! │  Uncreated → Created → ViewAttached ⇄ ViewDetached         │
//! │                     any state → Destroyed                  │
//! └──────────────┬─────────────────────────────────────────────┘
//!                ▼
//! ┌────────────────────────────────────────────────────────────┐
//! │ TaskRegistry (per presenter)                               │
//! │  - tag → SubscriptionProxy map (dedup by tag)              │
//! │  - view-presence watch channel                             │
//! │  - deferred actions, batch resume/dispose/cancel           │
//! │  - serialized callback dispatcher                          │
//! └──────┬─────────────────┬─────────────────┬─────────────────┘
//!        ▼                 ▼                 ▼
//! ┌──────────────┐  ┌──────────────┐  ┌──────────────┐
//! │Subscription  │  │Subscription  │  │Subscription  │   one per tag
//! │Proxy "load"  │  │Proxy "sync"  │  │Proxy "poll"  │
//! │ source pump  │  │              │  │              │   sources keep
//! │ replay log   │  │              │  │              │   running while
//! │ delivery     │  │              │  │              │   detached
//! └──────────────┘  └──────────────┘  └──────────────┘
//! ```
//!
//! ### Task lifecycle
//! ```text
//! start(tag, source, callbacks)
//!   ├─ tag live  → resume: replay full history to the current view
//!   └─ tag new   → spawn source immediately (view presence irrelevant)
//!
//! view detach → delivery pauses, execution continues
//! view attach → deferred actions drain, every task replays + goes live
//! cancel(tag) → source stopped, entry dropped; next start runs fresh
//! destroy     → every task cancelled, registry inert
//! ```
//!
//! ## Features
//! | Area            | Description                                            | Key types                                  |
//! |-----------------|--------------------------------------------------------|--------------------------------------------|
//! | **Tasks**       | Define cancelable value-emitting sources.              | [`Source`], [`SourceFn`], [`Emitter`]      |
//! | **Registry**    | Tag-keyed dedup, replay, deferred actions.             | [`TaskRegistry`], [`Callbacks`]            |
//! | **Lifecycle**   | Presenter state machine and hooks.                     | [`Presenter`], [`PresenterCell`]           |
//! | **Provisioning**| Cache round-trip and view orchestration.               | [`PresenterProvider`], [`PresenterCache`]  |
//! | **State**       | Opaque save/restore container.                         | [`StateBundle`]                            |
//! | **Errors**      | Configuration vs task failures, strictly separated.    | [`PresenterError`], [`TaskError`]          |
//!
//! ## Example
//! ```no_run
//! use std::sync::Arc;
//! use viewvisor::{
//!     sources, Callbacks, Presenter, PresenterCache, PresenterFactory, PresenterProvider,
//!     TaskRegistry,
//! };
//!
//! #[derive(Clone)]
//! struct ConsoleView;
//!
//! struct GreetPresenter {
//!     tasks: TaskRegistry<ConsoleView>,
//! }
//!
//! impl Presenter for GreetPresenter {
//!     type View = ConsoleView;
//!
//!     fn tasks(&self) -> Option<&TaskRegistry<ConsoleView>> {
//!         Some(&self.tasks)
//!     }
//! }
//!
//! impl GreetPresenter {
//!     fn load(&self) {
//!         self.tasks.start(
//!             "greet",
//!             sources::value(|_ctx| async { Ok::<_, viewvisor::TaskError>("hello".to_string()) }),
//!             Callbacks::new().on_next(|_view: &ConsoleView, msg: &String| println!("{msg}")),
//!         );
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), viewvisor::PresenterError> {
//!     let cache = Arc::new(PresenterCache::new());
//!     let mut factory = PresenterFactory::new();
//!     factory.register(|| GreetPresenter {
//!         tasks: TaskRegistry::new(),
//!     });
//!
//!     let mut provider = PresenterProvider::<GreetPresenter>::new(cache, Arc::new(factory));
//!     provider.prepare()?;
//!     provider.attach_view(ConsoleView)?;
//!     provider.presenter()?.lock().presenter().load();
//!
//!     tokio::time::sleep(std::time::Duration::from_millis(50)).await;
//!     provider.detach_view(true);
//!     Ok(())
//! }
//! ```

mod error;
mod presenter;
mod registry;
pub mod sources;
mod stream;

// ---- Public re-exports ----

pub use error::{PresenterError, TaskError};
pub use presenter::{
    HasPresenter, LifecycleState, Presenter, PresenterCache, PresenterCell, PresenterFactory,
    PresenterProvider, SharedPresenter, StateBundle, PROVIDER_STATE_KEY,
};
pub use registry::{Callbacks, DeliveryPolicy, TaskRegistry};
pub use sources::{Emitter, Source, SourceFn, SourceRef};
pub use stream::{BoundData, Notification, SubscriptionProxy};
