//! # Presenter lifecycle, caching and provisioning.
//!
//! Everything between the host's lifecycle callbacks and the task
//! machinery:
//! - [`Presenter`] + [`PresenterCell`] — the lifecycle contract and the
//!   state machine enforcing it
//! - [`PresenterCache`] — process-lifetime id→presenter store
//! - [`PresenterFactory`] / [`HasPresenter`] — explicit presenter-type
//!   resolution, wired once at startup
//! - [`PresenterProvider`] — cache lookup-or-create, save/restore,
//!   attach/detach orchestration
//! - [`StateBundle`] — the opaque state container hosts round-trip

mod bundle;
mod cache;
mod factory;
mod lifecycle;
mod provider;

pub use bundle::StateBundle;
pub use cache::PresenterCache;
pub use factory::{HasPresenter, PresenterFactory};
pub use lifecycle::{LifecycleState, Presenter, PresenterCell, SharedPresenter};
pub use provider::{PresenterProvider, PROVIDER_STATE_KEY};
