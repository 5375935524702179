//! Delivery policy for consumer callbacks.

/// Where consumer callbacks run.
///
/// [`DeliveryPolicy::Serialized`] is the default used by
/// [`TaskRegistry::start`](crate::TaskRegistry::start): every callback is
/// funneled through the registry's single dispatcher loop, so callbacks
/// never run concurrently with each other regardless of which task produced
/// the notification.
///
/// [`DeliveryPolicy::Inline`] invokes callbacks directly on the delivering
/// task's own context. Use it only when the caller manages its own
/// serialization; callbacks of different tags may then run concurrently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeliveryPolicy {
    /// Funnel callbacks through the registry's serialized delivery loop.
    #[default]
    Serialized,
    /// Invoke callbacks on the per-task delivery context.
    Inline,
}
