//! Pairs a (possibly absent) view with one notification.

use crate::stream::Notification;

/// One notification bound to the view it should (or should not) reach.
///
/// The view side is optional because the view-presence signal can report
/// "no view attached" at pairing time. The dispatch layer filters those
/// entries out: a `BoundData` with an absent view never reaches a user
/// callback.
#[derive(Debug, Clone)]
pub struct BoundData<V, T> {
    view: Option<V>,
    data: Notification<T>,
}

impl<V, T> BoundData<V, T> {
    /// Binds a notification to the view that was current at pairing time.
    pub fn new(view: Option<V>, data: Notification<T>) -> Self {
        Self { view, data }
    }

    /// The bound view, if one was attached.
    pub fn view(&self) -> Option<&V> {
        self.view.as_ref()
    }

    /// The bound notification.
    pub fn data(&self) -> &Notification<T> {
        &self.data
    }

    /// Splits into the optional view and the notification.
    pub fn into_parts(self) -> (Option<V>, Notification<T>) {
        (self.view, self.data)
    }
}
