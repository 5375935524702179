//! # Consumer callback bundle.
//!
//! [`Callbacks`] carries the per-task `on_next` / `on_error` /
//! `on_completed` closures a caller hands to
//! [`TaskRegistry::start`](crate::TaskRegistry::start). All three are
//! optional; an omitted callback is a no-op. In particular an error
//! notification with no `on_error` handler is dropped silently — that is
//! the contract, not an accident.
//!
//! ## Example
//! ```
//! use viewvisor::Callbacks;
//!
//! let callbacks: Callbacks<String, u32> = Callbacks::new()
//!     .on_next(|_view, value| println!("got {value}"))
//!     .on_completed(|_view| println!("done"));
//! # let _ = callbacks;
//! ```

use std::sync::Arc;

use crate::error::TaskError;
use crate::stream::{BoundData, Consumer, Notification};

/// Optional per-task callbacks, each receiving the currently attached view.
pub struct Callbacks<V, T> {
    on_next: Option<Arc<dyn Fn(&V, &T) + Send + Sync>>,
    on_error: Option<Arc<dyn Fn(&V, &TaskError) + Send + Sync>>,
    on_completed: Option<Arc<dyn Fn(&V) + Send + Sync>>,
}

impl<V, T> Default for Callbacks<V, T> {
    fn default() -> Self {
        Self {
            on_next: None,
            on_error: None,
            on_completed: None,
        }
    }
}

impl<V, T> Callbacks<V, T> {
    /// Creates an empty bundle; every notification is a no-op until a
    /// callback is attached.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches the value handler.
    pub fn on_next(mut self, f: impl Fn(&V, &T) + Send + Sync + 'static) -> Self {
        self.on_next = Some(Arc::new(f));
        self
    }

    /// Attaches the error handler.
    pub fn on_error(mut self, f: impl Fn(&V, &TaskError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }

    /// Attaches the completion handler.
    pub fn on_completed(mut self, f: impl Fn(&V) + Send + Sync + 'static) -> Self {
        self.on_completed = Some(Arc::new(f));
        self
    }

    /// Builds the dispatching consumer: routes each bound notification to
    /// the matching callback. A bound entry without a view never reaches a
    /// callback.
    pub(crate) fn into_consumer(self) -> Consumer<V, T>
    where
        V: 'static,
        T: 'static,
    {
        let Callbacks {
            on_next,
            on_error,
            on_completed,
        } = self;
        Arc::new(move |bound: BoundData<V, T>| {
            let (view, data) = bound.into_parts();
            let Some(view) = view else { return };
            match data {
                Notification::Value(value) => {
                    if let Some(f) = &on_next {
                        f(&view, &value);
                    }
                }
                Notification::Error(err) => {
                    if let Some(f) = &on_error {
                        f(&view, &err);
                    }
                }
                Notification::Complete => {
                    if let Some(f) = &on_completed {
                        f(&view);
                    }
                }
            }
        })
    }
}
