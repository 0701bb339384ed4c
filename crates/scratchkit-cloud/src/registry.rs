//! Pub/sub fan-out of accepted `set` events.
//!
//! The session owns a registry and publishes every accepted event after
//! applying it to the store, so a subscriber never observes an event
//! the store doesn't yet reflect. Delivery order equals apply order.
//!
//! Backpressure policy: each subscriber gets a bounded buffer and the
//! publisher never blocks. A subscriber that falls more than the buffer
//! capacity behind observes [`SubscriptionError::Lagged`] once, with
//! the count of events it missed, and then resumes from the live
//! stream. Dropping a [`Subscription`] unsubscribes it.

use thiserror::Error;
use tokio::sync::broadcast;

use crate::codec::SetEvent;

/// Fan-out of accepted `set` events to independent subscribers.
#[derive(Debug)]
pub struct SubscriberRegistry {
    tx: broadcast::Sender<SetEvent>,
}

impl SubscriberRegistry {
    /// Create a registry whose subscribers buffer up to `capacity`
    /// undelivered events each.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Attach a new subscriber. It receives every event published from
    /// this point on, in publish order.
    pub fn subscribe(&self) -> Subscription {
        Subscription {
            rx: self.tx.subscribe(),
        }
    }

    /// Publish an event to all current subscribers. A registry with no
    /// subscribers accepts and discards the event.
    pub fn publish(&self, event: &SetEvent) {
        let _ = self.tx.send(event.clone());
    }

    /// Number of currently attached subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// A subscriber handle. Dropping it unsubscribes and releases the
/// buffer.
#[derive(Debug)]
pub struct Subscription {
    rx: broadcast::Receiver<SetEvent>,
}

impl Subscription {
    /// Receive the next event, in the exact order the session applied
    /// them to the store.
    pub async fn recv(&mut self) -> Result<SetEvent, SubscriptionError> {
        match self.rx.recv().await {
            Ok(event) => Ok(event),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                Err(SubscriptionError::Lagged { skipped })
            }
            Err(broadcast::error::RecvError::Closed) => Err(SubscriptionError::Closed),
        }
    }
}

/// Why a receive did not produce an event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubscriptionError {
    /// The subscriber fell behind and `skipped` events were dropped for
    /// it. Receiving again resumes from the live stream.
    #[error("subscriber lagged, {skipped} events dropped")]
    Lagged {
        /// How many events this subscriber missed.
        skipped: u64,
    },
    /// The session (and its registry) is gone; no further events will
    /// ever arrive.
    #[error("session closed")]
    Closed,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn set(name: &str, value: &str) -> SetEvent {
        SetEvent {
            name: name.to_string(),
            value: value.to_string(),
            project_id: None,
        }
    }

    #[tokio::test]
    async fn subscriber_receives_in_publish_order() {
        let registry = SubscriberRegistry::new(16);
        let mut sub = registry.subscribe();

        registry.publish(&set("a", "1"));
        registry.publish(&set("b", "2"));
        registry.publish(&set("a", "3"));

        assert_eq!(sub.recv().await.unwrap().value, "1");
        assert_eq!(sub.recv().await.unwrap().value, "2");
        assert_eq!(sub.recv().await.unwrap().value, "3");
    }

    #[tokio::test]
    async fn independent_subscribers_each_get_every_event() {
        let registry = SubscriberRegistry::new(16);
        let mut first = registry.subscribe();
        let mut second = registry.subscribe();
        assert_eq!(registry.subscriber_count(), 2);

        registry.publish(&set("a", "1"));

        assert_eq!(first.recv().await.unwrap().name, "a");
        assert_eq!(second.recv().await.unwrap().name, "a");
    }

    #[tokio::test]
    async fn publish_with_no_subscribers_is_noop() {
        let registry = SubscriberRegistry::new(16);
        registry.publish(&set("a", "1"));
        assert_eq!(registry.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn subscriber_attached_late_misses_earlier_events() {
        let registry = SubscriberRegistry::new(16);
        registry.publish(&set("a", "1"));
        let mut sub = registry.subscribe();
        registry.publish(&set("b", "2"));
        assert_eq!(sub.recv().await.unwrap().name, "b");
    }

    #[tokio::test]
    async fn lagging_subscriber_sees_lag_then_resumes() {
        let registry = SubscriberRegistry::new(2);
        let mut sub = registry.subscribe();

        registry.publish(&set("a", "1"));
        registry.publish(&set("b", "2"));
        registry.publish(&set("c", "3"));
        registry.publish(&set("d", "4"));

        assert_matches!(
            sub.recv().await,
            Err(SubscriptionError::Lagged { skipped: 2 })
        );
        assert_eq!(sub.recv().await.unwrap().name, "c");
        assert_eq!(sub.recv().await.unwrap().name, "d");
    }

    #[tokio::test]
    async fn recv_after_registry_dropped_is_closed() {
        let registry = SubscriberRegistry::new(4);
        let mut sub = registry.subscribe();
        registry.publish(&set("a", "1"));
        drop(registry);

        // Buffered event still delivered, then the channel reports closed.
        assert_eq!(sub.recv().await.unwrap().name, "a");
        assert_matches!(sub.recv().await, Err(SubscriptionError::Closed));
    }

    #[tokio::test]
    async fn drop_subscription_unsubscribes() {
        let registry = SubscriberRegistry::new(4);
        let sub = registry.subscribe();
        drop(sub);
        assert_eq!(registry.subscriber_count(), 0);
    }
}
