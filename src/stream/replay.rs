//! # Order-preserving replay log for task notifications.
//!
//! [`ReplayLog`] records every notification a task emits and replays the
//! *entire* history to each new subscriber before forwarding live
//! notifications. It is the piece that makes a view attaching late — after
//! the task already produced output — observe the same sequence as a view
//! that was present the whole time.
//!
//! ## Rules
//! - History and live taps are updated under one lock, so a subscriber can
//!   never miss a notification in the gap between replay and live delivery,
//!   and every subscriber observes the same total order.
//! - The log seals itself on the first terminal notification; anything
//!   published after the seal is dropped (one terminal per task lifetime).
//! - Taps whose receiver went away are pruned on the next publish.

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::stream::Notification;

/// Shared record of everything a task has emitted so far.
pub(crate) struct ReplayLog<T> {
    inner: Mutex<Inner<T>>,
}

struct Inner<T> {
    history: Vec<Notification<T>>,
    taps: Vec<mpsc::UnboundedSender<Notification<T>>>,
    sealed: bool,
}

impl<T: Clone> ReplayLog<T> {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                history: Vec::new(),
                taps: Vec::new(),
                sealed: false,
            }),
        }
    }

    /// Appends a notification to the history and forwards it to live taps.
    ///
    /// The first terminal notification seals the log; later publishes are
    /// ignored.
    pub(crate) fn publish(&self, notification: Notification<T>) {
        let mut inner = self.inner.lock();
        if inner.sealed {
            return;
        }
        if notification.is_terminal() {
            inner.sealed = true;
        }
        inner.history.push(notification.clone());
        inner
            .taps
            .retain(|tap| tap.send(notification.clone()).is_ok());
    }

    /// Opens a new subscription: full history first, then live notifications.
    ///
    /// When the log is already sealed the returned channel holds the
    /// complete sequence and closes after it; there is nothing live left to
    /// forward.
    pub(crate) fn subscribe(&self) -> mpsc::UnboundedReceiver<Notification<T>> {
        let mut inner = self.inner.lock();
        let (tx, rx) = mpsc::unbounded_channel();
        for notification in &inner.history {
            let _ = tx.send(notification.clone());
        }
        if !inner.sealed {
            inner.taps.push(tx);
        }
        rx
    }
}
