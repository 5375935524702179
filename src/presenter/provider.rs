//! # Presenter provider: cache lookup-or-create and view orchestration.
//!
//! [`PresenterProvider`] sits between the host's lifecycle callbacks and
//! one presenter. It restores the presenter by id from the cache when the
//! host comes back after recreation, constructs and caches a fresh one
//! through the factory otherwise, and routes attach/detach/save/destroy to
//! the right [`PresenterCell`] calls.
//!
//! ## Typical wiring
//! ```text
//! host restored-state ──► restore_instance_state(bundle)
//! host init           ──► prepare()            (cache hit → same instance)
//! surface ready       ──► attach_view(view)
//! host save           ──► save_instance_state() → bundle (state + cache id)
//! surface gone        ──► detach_view(false)   (tasks keep running)
//! owner finishing     ──► detach_view(true)    (destroy + evict)
//! ```
//!
//! The returned save bundle is nested by the host under
//! [`PROVIDER_STATE_KEY`] and carried verbatim across recreation.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::error::PresenterError;
use crate::presenter::bundle::StateBundle;
use crate::presenter::cache::PresenterCache;
use crate::presenter::factory::{HasPresenter, PresenterFactory};
use crate::presenter::lifecycle::{Presenter, PresenterCell, SharedPresenter};

/// Well-known key the host uses to nest the provider bundle in its own
/// saved state.
pub const PROVIDER_STATE_KEY: &str = "viewvisor.provider.state";

const PRESENTER_STATE_KEY: &str = "viewvisor.presenter.state";
const PRESENTER_ID_KEY: &str = "viewvisor.presenter.id";

/// Orchestrates one presenter's cache round-trip and view binding.
pub struct PresenterProvider<P: Presenter> {
    cache: Arc<PresenterCache>,
    factory: Arc<PresenterFactory>,
    restored: Option<StateBundle>,
    presenter: Option<SharedPresenter<P>>,
    presenter_has_view: bool,
}

impl<P: Presenter> PresenterProvider<P> {
    /// Creates a provider against the application's cache and factory.
    pub fn new(cache: Arc<PresenterCache>, factory: Arc<PresenterFactory>) -> Self {
        Self {
            cache,
            factory,
            restored: None,
            presenter: None,
            presenter_has_view: false,
        }
    }

    /// Creates a provider for a view owner, resolving the presenter type
    /// from its [`HasPresenter`] association.
    pub fn for_owner<O>(cache: Arc<PresenterCache>, factory: Arc<PresenterFactory>) -> Self
    where
        O: HasPresenter<Presenter = P>,
    {
        Self::new(cache, factory)
    }

    /// Resolves the presenter: restored from the cache when the previously
    /// saved state carries a live id, freshly constructed and cached
    /// otherwise. Idempotent.
    ///
    /// A fresh presenter receives the saved presenter bundle (if any) in
    /// its create hook.
    pub fn prepare(&mut self) -> Result<(), PresenterError> {
        if self.presenter.is_some() {
            return Ok(());
        }

        if let Some(restored) = &self.restored {
            if let Some(id) = restored.get::<String>(PRESENTER_ID_KEY) {
                if let Some(found) = self.cache.get::<P>(&id) {
                    debug!("presenter restored from cache: {id}");
                    self.presenter = Some(found);
                    self.restored = None;
                    return Ok(());
                }
            }
        }

        let presenter = self.factory.create::<P>()?;
        let cell: SharedPresenter<P> = Arc::new(Mutex::new(PresenterCell::new(presenter)));
        let id = self.cache.save(&cell);
        debug!("presenter created and cached: {id}");
        let saved = self
            .restored
            .take()
            .and_then(|restored| restored.bundle(PRESENTER_STATE_KEY));
        cell.lock().create(saved.as_ref());
        self.presenter = Some(cell);
        Ok(())
    }

    /// The managed presenter.
    ///
    /// Fails with [`PresenterError::NotPrepared`] before
    /// [`prepare`](Self::prepare) ran.
    pub fn presenter(&self) -> Result<SharedPresenter<P>, PresenterError> {
        self.presenter.clone().ok_or(PresenterError::NotPrepared)
    }

    /// Attaches `view` to the presenter. Idempotent: attaches only when
    /// the presenter has no view.
    pub fn attach_view(&mut self, view: P::View) -> Result<(), PresenterError> {
        let cell = self.presenter()?;
        if !self.presenter_has_view {
            let mut cell = cell.lock();
            if cell.view().is_none() {
                cell.attach_view(view);
                self.presenter_has_view = true;
            }
        }
        Ok(())
    }

    /// Detaches the view if attached. With `destroy` set, also destroys
    /// the presenter, evicts it from the cache and clears the local
    /// reference so the next [`prepare`](Self::prepare) starts fresh.
    pub fn detach_view(&mut self, destroy: bool) {
        let Some(cell) = self.presenter.clone() else {
            return;
        };
        {
            let mut cell = cell.lock();
            if self.presenter_has_view {
                cell.detach_view();
                self.presenter_has_view = false;
            }
            if destroy {
                cell.destroy();
            }
        }
        if destroy {
            self.cache.remove(&cell);
            self.presenter = None;
        }
    }

    /// Destroys the presenter, detaching first if needed.
    pub fn destroy(&mut self) {
        self.detach_view(true);
    }

    /// Snapshots presenter state for the host to carry across recreation.
    ///
    /// Forces presenter creation when it has not happened yet, then bundles
    /// the presenter's own state together with its cache id so the same
    /// instance can be found again.
    pub fn save_instance_state(&mut self) -> Result<StateBundle, PresenterError> {
        self.prepare()?;
        let cell = self.presenter()?;

        let mut out = StateBundle::new();
        let mut presenter_state = StateBundle::new();
        cell.lock().save(&mut presenter_state);
        out.put_bundle(PRESENTER_STATE_KEY, presenter_state);
        if let Some(id) = self.cache.id_of(&cell) {
            out.put(PRESENTER_ID_KEY, &id);
        }
        Ok(out)
    }

    /// Stores a previously saved bundle for the next
    /// [`prepare`](Self::prepare) to consult.
    pub fn restore_instance_state(&mut self, state: StateBundle) {
        self.restored = Some(state);
    }
}
