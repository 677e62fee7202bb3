//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is shared via `Arc<EventBus>` between the session context,
//! the read cache, and the mutation dispatcher.

use chrono::{DateTime, Utc};
use fms_core::types::Id;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Event names published on the bus.
pub mod event_types {
    pub const AUTH_SIGNED_IN: &str = "auth.signed_in";
    pub const AUTH_SIGN_IN_FAILED: &str = "auth.sign_in_failed";
    pub const AUTH_SIGNED_UP: &str = "auth.signed_up";
    pub const AUTH_SIGN_UP_FAILED: &str = "auth.sign_up_failed";
    pub const AUTH_SIGNED_OUT: &str = "auth.signed_out";
    pub const MUTATION_SUCCEEDED: &str = "mutation.succeeded";
    pub const MUTATION_FAILED: &str = "mutation.failed";
    pub const QUERY_FAILED: &str = "query.failed";
    pub const UPLOAD_FAILED: &str = "upload.failed";
}

// ---------------------------------------------------------------------------
// PortalEvent
// ---------------------------------------------------------------------------

/// Something that happened in the portal.
///
/// Constructed via [`PortalEvent::new`] and enriched with
/// [`with_source`](PortalEvent::with_source),
/// [`with_actor`](PortalEvent::with_actor), and
/// [`with_payload`](PortalEvent::with_payload).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalEvent {
    /// Dot-separated event name, see [`event_types`].
    pub event_type: String,

    /// What raised the event: a mutation name or a cache key.
    pub source: Option<String>,

    pub actor_user_id: Option<Id>,

    /// Event-specific data, e.g. `{"message": ..}` or `{"error": ..}`.
    pub payload: serde_json::Value,

    pub timestamp: DateTime<Utc>,
}

impl PortalEvent {
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            source: None,
            actor_user_id: None,
            payload: serde_json::Value::Object(Default::default()),
            timestamp: Utc::now(),
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_actor(mut self, user_id: Id) -> Self {
        self.actor_user_id = Some(user_id);
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    /// String field of the payload, if present.
    pub fn payload_str(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(|v| v.as_str())
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 256;

/// In-process fan-out event bus.
///
/// ```rust
/// use fms_events::bus::{EventBus, PortalEvent};
///
/// let bus = EventBus::default();
/// let mut rx = bus.subscribe();
///
/// bus.publish(PortalEvent::new("mutation.succeeded"));
/// ```
pub struct EventBus {
    sender: broadcast::Sender<PortalEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// Slow receivers observe `RecvError::Lagged` once the buffer is full.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers. Dropped when there are
    /// none.
    pub fn publish(&self, event: PortalEvent) {
        tracing::trace!(event_type = %event.event_type, "Publishing event");
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PortalEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_and_receive_single_subscriber() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        let actor = Id::new_v4();

        bus.publish(
            PortalEvent::new(event_types::MUTATION_SUCCEEDED)
                .with_source("create-class-record")
                .with_actor(actor)
                .with_payload(serde_json::json!({"message": "Class record created successfully"})),
        );

        let received = rx.recv().await.expect("should receive the event");
        assert_eq!(received.event_type, "mutation.succeeded");
        assert_eq!(received.source.as_deref(), Some("create-class-record"));
        assert_eq!(received.actor_user_id, Some(actor));
        assert_eq!(
            received.payload_str("message"),
            Some("Class record created successfully")
        );
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_event() {
        let bus = EventBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(PortalEvent::new(event_types::QUERY_FAILED));

        assert_eq!(rx1.recv().await.unwrap().event_type, "query.failed");
        assert_eq!(rx2.recv().await.unwrap().event_type, "query.failed");
    }

    #[test]
    fn publish_with_no_subscribers_does_not_panic() {
        let bus = EventBus::default();
        bus.publish(PortalEvent::new("orphan.event"));
    }

    #[test]
    fn default_event_has_empty_optional_fields() {
        let event = PortalEvent::new("bare.event");
        assert!(event.source.is_none());
        assert!(event.actor_user_id.is_none());
        assert!(event.payload.is_object());
        assert_eq!(event.payload_str("message"), None);
    }
}
