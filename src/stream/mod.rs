//! # Notification stream machinery.
//!
//! The leaves of the delivery pipeline:
//! - [`Notification`] — one task-emitted value, error, or completion marker
//! - [`BoundData`] — a notification paired with the view it should reach
//! - [`SubscriptionProxy`] — replay log plus view-presence recombination
//!   for one running task
//!
//! Internal pieces: the replay log (order-preserving history, full replay
//! to every new subscriber) and the serialized dispatcher all consumer
//! callbacks are funneled through.
//!
//! See `registry` for the tag-keyed map that owns one proxy per task.

mod bound;
mod dispatch;
mod notification;
mod proxy;
mod replay;

pub use bound::BoundData;
pub use notification::Notification;
pub use proxy::SubscriptionProxy;

pub(crate) use dispatch::{panic_message, Dispatcher};
pub(crate) use proxy::{Consumer, TerminateAction};
