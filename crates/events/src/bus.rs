//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! Publishing is fire-and-forget: the core never blocks on delivery, and
//! an event with no subscribers is dropped. External transports (webhook
//! relays, read-model builders) subscribe and fan the events out.

use chrono::Utc;
use paceline_core::types::{EntityId, Timestamp};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// Event type names
// ---------------------------------------------------------------------------

/// Dot-separated event names published by the service layer.
pub mod event_types {
    pub const BEHAVIOR_CREATED: &str = "behavior.created";
    pub const BEHAVIOR_PUBLISHED: &str = "behavior.published";
    pub const BEHAVIOR_ARCHIVED: &str = "behavior.archived";
    pub const BEHAVIOR_ENROLLED: &str = "behavior.enrolled";
    pub const BEHAVIOR_LEFT: &str = "behavior.left";
    pub const ACTUAL_LOGGED: &str = "tracker.actual_logged";
    pub const COMPLETION_APPROVED: &str = "tracker.completion_approved";
    pub const SHARE_CREATED: &str = "share.created";
    pub const SHARE_JOINED: &str = "share.joined";
    pub const SHARE_DECLINED: &str = "share.declined";
    pub const PLAN_CREATED: &str = "plan.created";
    pub const PLAN_PUBLISHED: &str = "plan.published";
    pub const PLAN_DAYS_REGENERATED: &str = "plan.days_regenerated";
    pub const USER_PLAN_CREATED: &str = "user_plan.created";
    pub const USER_PLAN_UPDATED: &str = "user_plan.updated";
    pub const USER_PLAN_DELETED: &str = "user_plan.deleted";
}

// ---------------------------------------------------------------------------
// PlatformEvent
// ---------------------------------------------------------------------------

/// A domain event that occurred on the platform.
///
/// Built via [`PlatformEvent::new`] plus the `with_*` builder methods.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformEvent {
    /// Dot-separated event name from [`event_types`].
    pub event_type: String,

    /// Organization the event belongs to.
    pub org_id: Option<EntityId>,

    /// Subject entity kind (e.g. `"behavior"`, `"share"`).
    pub subject_type: Option<String>,

    /// Subject entity id.
    pub subject_id: Option<EntityId>,

    /// User that triggered the event.
    pub actor_user_id: Option<EntityId>,

    /// Free-form JSON payload carrying event-specific data.
    pub payload: serde_json::Value,

    /// When the event was created (UTC).
    pub timestamp: Timestamp,
}

impl PlatformEvent {
    /// Create an event with only the required name; everything else
    /// defaults to empty.
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            org_id: None,
            subject_type: None,
            subject_id: None,
            actor_user_id: None,
            payload: serde_json::Value::Object(Default::default()),
            timestamp: Utc::now(),
        }
    }

    /// Attach the owning organization.
    pub fn with_org(mut self, org_id: EntityId) -> Self {
        self.org_id = Some(org_id);
        self
    }

    /// Attach the subject entity.
    pub fn with_subject(mut self, subject_type: impl Into<String>, subject_id: EntityId) -> Self {
        self.subject_type = Some(subject_type.into());
        self.subject_id = Some(subject_id);
        self
    }

    /// Attach the acting user.
    pub fn with_actor(mut self, user_id: EntityId) -> Self {
        self.actor_user_id = Some(user_id);
        self
    }

    /// Set the JSON payload.
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
pub const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out bus shared via `Arc<EventBus>`.
pub struct EventBus {
    sender: broadcast::Sender<PlatformEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity. When the buffer is
    /// full the oldest un-consumed events are dropped and slow receivers
    /// observe `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers. With zero receivers
    /// the event is silently dropped.
    pub fn publish(&self, event: PlatformEvent) {
        // The SendError only means there are no receivers.
        let _ = self.sender.send(event);
    }

    /// Subscribe to all events published on this bus.
    pub fn subscribe(&self) -> broadcast::Receiver<PlatformEvent> {
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
    use uuid::Uuid;

    #[tokio::test]
    async fn publish_and_receive() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        let org = Uuid::now_v7();
        let behavior = Uuid::now_v7();
        let actor = Uuid::now_v7();

        bus.publish(
            PlatformEvent::new(event_types::BEHAVIOR_PUBLISHED)
                .with_org(org)
                .with_subject("behavior", behavior)
                .with_actor(actor)
                .with_payload(serde_json::json!({"title": "Walk more"})),
        );

        let received = rx.recv().await.expect("should receive the event");
        assert_eq!(received.event_type, "behavior.published");
        assert_eq!(received.org_id, Some(org));
        assert_eq!(received.subject_type.as_deref(), Some("behavior"));
        assert_eq!(received.subject_id, Some(behavior));
        assert_eq!(received.actor_user_id, Some(actor));
        assert_eq!(received.payload["title"], "Walk more");
    }

    #[tokio::test]
    async fn every_subscriber_receives_each_event() {
        let bus = EventBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(PlatformEvent::new(event_types::SHARE_CREATED));

        assert_eq!(rx1.recv().await.unwrap().event_type, "share.created");
        assert_eq!(rx2.recv().await.unwrap().event_type, "share.created");
    }

    #[test]
    fn publish_with_no_subscribers_does_not_panic() {
        let bus = EventBus::default();
        bus.publish(PlatformEvent::new(event_types::PLAN_CREATED));
    }

    #[test]
    fn bare_event_has_empty_optional_fields() {
        let event = PlatformEvent::new("bare.event");
        assert!(event.org_id.is_none());
        assert!(event.subject_type.is_none());
        assert!(event.subject_id.is_none());
        assert!(event.actor_user_id.is_none());
        assert!(event.payload.is_object());
    }
}
