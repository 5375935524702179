//! # Presenter trait and lifecycle state machine.
//!
//! A presenter holds screen logic that must outlive its display surface.
//! [`Presenter`] is what applications implement: hooks with empty defaults
//! plus an optional handle to the presenter's [`TaskRegistry`].
//! [`PresenterCell`] is the concrete driver that owns the implementation
//! and enforces the state machine:
//!
//! ```text
//! Uncreated ──create──► Created ──attach_view──► ViewAttached
//!                          ▲                     │        │
//!                          │            detach_view   (reattach)
//!                          │                     ▼        │
//!                          └──────────── ViewDetached ◄───┘
//!                any state ──destroy──► Destroyed (terminal)
//! ```
//!
//! ## Rules
//! - `attach_view` is a no-op while a view is attached; `detach_view` is a
//!   no-op without one. `destroy` is terminal; the cell must not be reused.
//! - Registry bookkeeping runs *before* the user hook on attach, detach
//!   and destroy, so hooks observe tasks already resumed/paused/cancelled.
//! - The first attach after creation additionally fires the one-time
//!   `on_created_then_attached` hook, after `on_view_attached`.
//! - The view reference is cleared synchronously on detach; a presenter is
//!   never the reason a view outlives its window.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::presenter::bundle::StateBundle;
use crate::registry::TaskRegistry;

/// Lifecycle states a presenter moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Constructed but `create` has not run.
    Uncreated,
    /// Created; never had a view yet.
    Created,
    /// A view is currently attached.
    ViewAttached,
    /// Had a view; currently between views.
    ViewDetached,
    /// Destroyed; terminal.
    Destroyed,
}

/// Screen logic bound to the presenter lifecycle.
///
/// Every hook has an empty default; implement the ones the screen needs.
/// A presenter that runs tasks returns its registry from [`tasks`]
/// so the lifecycle driver can resume, pause and cancel them at the right
/// moments.
///
/// [`tasks`]: Presenter::tasks
pub trait Presenter: Send + 'static {
    /// The display-surface handle this presenter drives. A cheap clonable
    /// reference (typically an `Arc` or a channel handle) — the presenter
    /// never owns the surface itself.
    type View: Clone + Send + Sync + 'static;

    /// The task registry owned by this presenter, if it runs tasks.
    fn tasks(&self) -> Option<&TaskRegistry<Self::View>> {
        None
    }

    /// Called once per instance, before any view exists. `saved` carries
    /// state written by [`on_save`](Presenter::on_save) in a previous
    /// process, if any.
    fn on_create(&mut self, saved: Option<&StateBundle>) {
        let _ = saved;
    }

    /// Called once, after the first `on_view_attached` following creation.
    fn on_created_then_attached(&mut self) {}

    /// Called every time a view attaches.
    fn on_view_attached(&mut self, view: &Self::View) {
        let _ = view;
    }

    /// Called every time the view detaches. The presenter instance
    /// survives.
    fn on_view_detached(&mut self) {}

    /// Snapshot hook; write whatever should survive process recreation.
    fn on_save(&mut self, state: &mut StateBundle) {
        let _ = state;
    }

    /// Called exactly once when the presenter is destroyed.
    fn on_destroy(&mut self) {}
}

/// Shared handle to a presenter cell — what the cache stores and the
/// provider hands out.
pub type SharedPresenter<P> = Arc<Mutex<PresenterCell<P>>>;

/// Owns a [`Presenter`] implementation and drives its lifecycle.
pub struct PresenterCell<P: Presenter> {
    presenter: P,
    state: LifecycleState,
    view: Option<P::View>,
    attached_once: bool,
}

impl<P: Presenter> std::fmt::Debug for PresenterCell<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PresenterCell")
            .field("state", &self.state)
            .field("attached_once", &self.attached_once)
            .finish_non_exhaustive()
    }
}

impl<P: Presenter> PresenterCell<P> {
    /// Wraps a presenter; it starts in [`LifecycleState::Uncreated`].
    pub fn new(presenter: P) -> Self {
        Self {
            presenter,
            state: LifecycleState::Uncreated,
            view: None,
            attached_once: false,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// The attached view, if any.
    pub fn view(&self) -> Option<&P::View> {
        self.view.as_ref()
    }

    /// The wrapped presenter.
    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    /// The wrapped presenter, mutably.
    pub fn presenter_mut(&mut self) -> &mut P {
        &mut self.presenter
    }

    /// Creates the presenter. Runs once; repeated calls are ignored.
    pub fn create(&mut self, saved: Option<&StateBundle>) {
        if self.state != LifecycleState::Uncreated {
            warn!("create() ignored: presenter already created");
            return;
        }
        debug!("presenter created");
        self.state = LifecycleState::Created;
        self.presenter.on_create(saved);
    }

    /// Attaches a view. No-op while another view is attached, before
    /// `create`, or after `destroy`.
    pub fn attach_view(&mut self, view: P::View) {
        match self.state {
            LifecycleState::Uncreated => {
                warn!("attach_view() ignored: presenter not created");
                return;
            }
            LifecycleState::Destroyed => {
                warn!("attach_view() ignored: presenter destroyed");
                return;
            }
            LifecycleState::ViewAttached => return,
            LifecycleState::Created | LifecycleState::ViewDetached => {}
        }
        debug!("view attached to presenter");
        self.view = Some(view.clone());
        self.state = LifecycleState::ViewAttached;
        if let Some(tasks) = self.presenter.tasks() {
            tasks.on_view_attached(view.clone());
        }
        self.presenter.on_view_attached(&view);
        if !self.attached_once {
            self.attached_once = true;
            self.presenter.on_created_then_attached();
        }
    }

    /// Detaches the current view, clearing the reference synchronously.
    /// No-op when no view is attached. The presenter survives.
    pub fn detach_view(&mut self) {
        if self.state != LifecycleState::ViewAttached {
            return;
        }
        debug!("view detached from presenter");
        if let Some(tasks) = self.presenter.tasks() {
            tasks.on_view_detached();
        }
        self.presenter.on_view_detached();
        self.view = None;
        self.state = LifecycleState::ViewDetached;
    }

    /// Destroys the presenter: cancels every task it owns, fires the hook,
    /// and leaves the cell terminally dead.
    pub fn destroy(&mut self) {
        if self.state == LifecycleState::Destroyed {
            return;
        }
        debug!("presenter destroyed");
        self.view = None;
        if let Some(tasks) = self.presenter.tasks() {
            tasks.on_destroy();
        }
        self.presenter.on_destroy();
        self.state = LifecycleState::Destroyed;
    }

    /// Asks the presenter to snapshot its state. Does not change state.
    pub fn save(&mut self, state: &mut StateBundle) {
        self.presenter.on_save(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Recorder {
        hooks: Vec<&'static str>,
        saved_seen: Option<u32>,
    }

    impl Presenter for Recorder {
        type View = String;

        fn on_create(&mut self, saved: Option<&StateBundle>) {
            self.saved_seen = saved.and_then(|s| s.get::<u32>("count"));
            self.hooks.push("create");
        }

        fn on_created_then_attached(&mut self) {
            self.hooks.push("created_then_attached");
        }

        fn on_view_attached(&mut self, _view: &String) {
            self.hooks.push("attached");
        }

        fn on_view_detached(&mut self) {
            self.hooks.push("detached");
        }

        fn on_save(&mut self, state: &mut StateBundle) {
            state.put("count", &9u32);
        }

        fn on_destroy(&mut self) {
            self.hooks.push("destroyed");
        }
    }

    fn cell() -> PresenterCell<Recorder> {
        PresenterCell::new(Recorder {
            hooks: Vec::new(),
            saved_seen: None,
        })
    }

    #[test]
    fn create_runs_once_and_passes_saved_state() {
        let mut cell = cell();
        let mut saved = StateBundle::new();
        saved.put("count", &5u32);

        cell.create(Some(&saved));
        cell.create(None);

        assert_eq!(cell.state(), LifecycleState::Created);
        assert_eq!(cell.presenter().hooks, vec!["create"]);
        assert_eq!(cell.presenter().saved_seen, Some(5));
    }

    #[test]
    fn second_attach_is_a_no_op() {
        let mut cell = cell();
        cell.create(None);
        cell.attach_view("v1".to_string());
        cell.attach_view("v2".to_string());

        assert_eq!(cell.view(), Some(&"v1".to_string()));
        assert_eq!(
            cell.presenter().hooks,
            vec!["create", "attached", "created_then_attached"]
        );
    }

    #[test]
    fn created_then_attached_fires_only_on_first_attach() {
        let mut cell = cell();
        cell.create(None);
        cell.attach_view("v1".to_string());
        cell.detach_view();
        cell.attach_view("v2".to_string());

        let firsts = cell
            .presenter()
            .hooks
            .iter()
            .filter(|h| **h == "created_then_attached")
            .count();
        assert_eq!(firsts, 1);
        assert_eq!(cell.state(), LifecycleState::ViewAttached);
    }

    #[test]
    fn detach_without_view_is_a_no_op() {
        let mut cell = cell();
        cell.create(None);
        cell.detach_view();
        assert_eq!(cell.presenter().hooks, vec!["create"]);
        assert_eq!(cell.state(), LifecycleState::Created);
    }

    #[test]
    fn detach_clears_the_view_synchronously() {
        let mut cell = cell();
        cell.create(None);
        cell.attach_view("v".to_string());
        cell.detach_view();
        assert_eq!(cell.view(), None);
        assert_eq!(cell.state(), LifecycleState::ViewDetached);
    }

    #[test]
    fn destroy_is_terminal() {
        let mut cell = cell();
        cell.create(None);
        cell.attach_view("v".to_string());
        cell.destroy();
        cell.destroy();
        cell.attach_view("v2".to_string());

        assert_eq!(cell.state(), LifecycleState::Destroyed);
        assert_eq!(cell.view(), None);
        let destroys = cell
            .presenter()
            .hooks
            .iter()
            .filter(|h| **h == "destroyed")
            .count();
        assert_eq!(destroys, 1);
    }

    #[test]
    fn save_does_not_change_state() {
        let mut cell = cell();
        cell.create(None);
        let mut out = StateBundle::new();
        cell.save(&mut out);
        assert_eq!(out.get::<u32>("count"), Some(9));
        assert_eq!(cell.state(), LifecycleState::Created);
    }
}
