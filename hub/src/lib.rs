//! Publish/subscribe hub for broker lifecycle events.
//!
//! Publishers only see the [`Broadcaster`] trait. Delivery is best-effort and
//! at-most-once: publishing never waits for subscribers, and a subscriber that
//! falls behind loses the oldest events instead of slowing the publisher down.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, trace, warn};

pub const SESSION_OPENED: &str = "session.opened";
pub const SESSION_CLOSED: &str = "session.closed";
pub const PROTOCOL_AVAILABILITY_CHANGED: &str = "protocol.availability_changed";

/// Default number of buffered events per subscriber.
pub const DEFAULT_CAPACITY: usize = 1024;

/// An event as seen by subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HubEvent {
    pub topic: String,
    pub payload: serde_json::Value,
    pub published_at: DateTime<Utc>,
}

/// Fire-and-forget publishing.
///
/// Implementations must not block the caller. Callers publish after releasing
/// their own locks.
pub trait Broadcaster: Send + Sync {
    fn broadcast(&self, topic: &str, payload: serde_json::Value);
}

impl<T: Broadcaster + ?Sized> Broadcaster for Arc<T> {
    fn broadcast(&self, topic: &str, payload: serde_json::Value) {
        (**self).broadcast(topic, payload)
    }
}

/// In-process hub backed by a tokio broadcast channel.
#[derive(Debug, Clone)]
pub struct EventHub {
    sender: broadcast::Sender<HubEvent>,
}

impl EventHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Receives every event published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<HubEvent> {
        self.sender.subscribe()
    }

    /// Receives events whose topic starts with `prefix` (e.g. "session.").
    pub fn subscribe_topic(&self, prefix: impl Into<String>) -> TopicSubscription {
        TopicSubscription {
            prefix: prefix.into(),
            receiver: self.sender.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl Broadcaster for EventHub {
    fn broadcast(&self, topic: &str, payload: serde_json::Value) {
        let event = HubEvent {
            topic: topic.to_string(),
            payload,
            published_at: Utc::now(),
        };

        // An error only means nobody is listening right now
        match self.sender.send(event) {
            Ok(receivers) => trace!("Published {} to {} subscribers", topic, receivers),
            Err(_) => trace!("Published {} with no subscribers", topic),
        }
    }
}

/// A receiver filtered by topic prefix.
pub struct TopicSubscription {
    prefix: String,
    receiver: broadcast::Receiver<HubEvent>,
}

impl TopicSubscription {
    /// Waits for the next matching event. Returns `None` once the hub is gone.
    ///
    /// Lagging is logged and skipped over.
    pub async fn recv(&mut self) -> Option<HubEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if event.topic.starts_with(&self.prefix) => return Some(event),
                Ok(event) => debug!("Skipping event {} for prefix {}", event.topic, self.prefix),
                Err(RecvError::Lagged(missed)) => {
                    warn!(
                        "Subscriber for {} lagged behind, {} events dropped",
                        self.prefix, missed
                    );
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Returns the next matching event already buffered, if any.
    pub fn try_recv(&mut self) -> Option<HubEvent> {
        use broadcast::error::TryRecvError;

        loop {
            match self.receiver.try_recv() {
                Ok(event) if event.topic.starts_with(&self.prefix) => return Some(event),
                Ok(_) => continue,
                Err(TryRecvError::Lagged(missed)) => {
                    warn!(
                        "Subscriber for {} lagged behind, {} events dropped",
                        self.prefix, missed
                    );
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }

    /// Drains every matching event already buffered.
    pub fn drain(&mut self) -> Vec<HubEvent> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_subscriber_receives_published_event() {
        let hub = EventHub::default();
        let mut all = hub.subscribe();

        hub.broadcast(SESSION_OPENED, json!({"id": "sess-1"}));

        let event = all.recv().await.unwrap();
        assert_eq!(event.topic, SESSION_OPENED);
        assert_eq!(event.payload["id"], "sess-1");
    }

    #[test]
    fn test_publish_without_subscribers_is_fine() {
        let hub = EventHub::default();
        hub.broadcast(SESSION_CLOSED, json!({"id": "sess-1"}));
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_topic_filter() {
        let hub = EventHub::default();
        let mut sessions = hub.subscribe_topic("session.");

        hub.broadcast(PROTOCOL_AVAILABILITY_CHANGED, json!({"id": "ssh"}));
        hub.broadcast(SESSION_CLOSED, json!({"id": "sess-1"}));

        let event = sessions.recv().await.unwrap();
        assert_eq!(event.topic, SESSION_CLOSED);
        assert!(sessions.try_recv().is_none());
    }

    #[test]
    fn test_slow_subscriber_never_blocks_publisher() {
        let hub = EventHub::new(2);
        let mut slow = hub.subscribe_topic("");

        for i in 0..10 {
            hub.broadcast(SESSION_OPENED, json!({ "n": i }));
        }

        // Only the most recent events survive
        let events = slow.drain();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].payload["n"], 9);
    }

    #[test]
    fn test_broadcaster_through_arc() {
        let hub = Arc::new(EventHub::default());
        let mut sub = hub.subscribe_topic("session.");
        let broadcaster: Arc<dyn Broadcaster> = hub.clone();
        broadcaster.broadcast(SESSION_OPENED, json!({}));
        assert_eq!(sub.drain().len(), 1);
    }
}
