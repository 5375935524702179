//! Cached task entry: a subscription proxy paired with its consumer.
//!
//! The registry stores one entry per tag behind the object-safe
//! [`Resumable`] trait so tasks of different result types can share one
//! map; the generic pairing lives here.

use std::sync::Arc;

use crate::stream::{Consumer, SubscriptionProxy};

/// Object-safe surface the registry drives on every cached task.
pub(crate) trait Resumable: Send + Sync {
    /// (Re)subscribes the consumer; replays full history to it.
    fn resume(&self);
    /// Pauses delivery; execution continues.
    fn dispose(&self);
    /// Tears the task down for good.
    fn cancel(&self);
}

/// One cached task: its proxy and the consumer to (re)attach on resume.
pub(crate) struct CachedStream<V, T> {
    proxy: SubscriptionProxy<V, T>,
    consumer: Consumer<V, T>,
}

impl<V, T> CachedStream<V, T> {
    pub(crate) fn new(proxy: SubscriptionProxy<V, T>, consumer: Consumer<V, T>) -> Self {
        Self { proxy, consumer }
    }
}

impl<V, T> Resumable for CachedStream<V, T>
where
    V: Clone + Send + Sync + 'static,
    T: Clone + Send + 'static,
{
    fn resume(&self) {
        self.proxy.subscribe(Arc::clone(&self.consumer));
    }

    fn dispose(&self) {
        self.proxy.dispose();
    }

    fn cancel(&self) {
        self.proxy.cancel();
    }
}
