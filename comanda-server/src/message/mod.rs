//! In-process message bus.
//!
//! One `tokio::sync::broadcast` channel fans server-side events out to
//! every connected listener (WebSocket bridges, in-process consumers,
//! tests). Publishing when nobody listens is not an error; lagging
//! receivers drop the oldest messages, which is acceptable for
//! notification traffic.

use serde::{Deserialize, Serialize};
use shared::Notification;
use tokio::sync::broadcast;

/// Resource-change payload for client cache sync.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncPayload {
    /// Resource type ("order", "shift", "courier")
    pub resource: String,
    /// Monotonic per-resource version so clients can discard stale updates
    pub version: u64,
    /// "created" | "updated" | "deleted"
    pub action: String,
    pub id: String,
    pub data: Option<serde_json::Value>,
}

/// Message flowing over the bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BusMessage {
    Sync(SyncPayload),
    Notification(Notification),
}

/// Broadcast bus shared by the whole server.
#[derive(Debug, Clone)]
pub struct MessageBus {
    tx: broadcast::Sender<BusMessage>,
}

impl MessageBus {
    pub fn new() -> Self {
        Self::with_capacity(1024)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish to all current subscribers. Returns how many received it;
    /// zero subscribers is fine.
    pub fn publish(&self, message: BusMessage) -> usize {
        self.tx.send(message).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BusMessage> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_reaches_subscriber() {
        let bus = MessageBus::with_capacity(8);
        let mut rx = bus.subscribe();
        let delivered = bus.publish(BusMessage::Sync(SyncPayload {
            resource: "order".into(),
            version: 1,
            action: "created".into(),
            id: "42".into(),
            data: None,
        }));
        assert_eq!(delivered, 1);
        match rx.recv().await.unwrap() {
            BusMessage::Sync(payload) => assert_eq!(payload.resource, "order"),
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn publish_without_subscribers_is_not_an_error() {
        let bus = MessageBus::new();
        let delivered = bus.publish(BusMessage::Sync(SyncPayload {
            resource: "shift".into(),
            version: 1,
            action: "updated".into(),
            id: "turno_2026-08-27_matutino".into(),
            data: None,
        }));
        assert_eq!(delivered, 0);
    }
}
