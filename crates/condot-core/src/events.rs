//! Server event types, envelope schema, and event bus for real-time notifications.
//!
//! Store adapters, the conversation, and the identity binding all emit into one
//! broadcast channel. The HTTP layer forwards it as Server-Sent Events.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::models::SyncMode;

// ============================================================================
// Event Envelope
// ============================================================================

/// Versioned wrapper around a [`ServerEvent`].
///
/// ## Wire Format (SSE)
///
/// ```text
/// event: collection.replaced
/// id: 019508a0-1234-7def-8000-abcdef123456
/// data: {"event_id":"...","event_type":"collection.replaced","occurred_at":"...","payload":{...}}
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct EventEnvelope {
    /// Unique event identifier (UUIDv7 for temporal ordering).
    pub event_id: Uuid,
    /// Namespaced event type (e.g., `"collection.replaced"`).
    pub event_type: String,
    /// When the event occurred (UTC).
    pub occurred_at: DateTime<Utc>,
    /// Principal whose session produced the event. None for shared state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub principal: Option<String>,
    /// Payload schema version.
    pub payload_version: u32,
    /// Domain-specific event data.
    pub payload: ServerEvent,
}

impl EventEnvelope {
    pub fn new(event: ServerEvent, principal: Option<String>) -> Self {
        Self {
            event_id: Uuid::now_v7(),
            event_type: event.namespaced_event_type().to_string(),
            occurred_at: Utc::now(),
            principal,
            payload_version: 1,
            payload: event,
        }
    }
}

// ============================================================================
// Server Event (domain payloads)
// ============================================================================

/// Domain events, serialized with a `type` tag.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// A synced collection was replaced wholesale (snapshot, fallback, or
    /// optimistic local edit).
    CollectionReplaced {
        collection: String,
        count: usize,
        mode: SyncMode,
    },
    /// The session's sync mode changed.
    SyncModeChanged { mode: SyncMode },
    /// The shared config document changed locally.
    ConfigChanged { is_test_mode: bool },
    /// A principal was bound or the session was cleared.
    SessionChanged {
        #[serde(skip_serializing_if = "Option::is_none")]
        principal: Option<String>,
        demo: bool,
    },
    /// The conversation moved to a new state.
    ConversationChanged { state: String, turns: usize },
}

impl ServerEvent {
    /// Returns the namespaced event type for the envelope.
    pub fn namespaced_event_type(&self) -> &'static str {
        match self {
            ServerEvent::CollectionReplaced { .. } => "collection.replaced",
            ServerEvent::SyncModeChanged { .. } => "sync.mode_changed",
            ServerEvent::ConfigChanged { .. } => "config.changed",
            ServerEvent::SessionChanged { .. } => "session.changed",
            ServerEvent::ConversationChanged { .. } => "conversation.changed",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Broadcast-based event bus.
///
/// Slow receivers that fall behind get a `Lagged` error and miss events;
/// every payload describes current state, so the next event catches them up.
pub struct EventBus {
    tx: broadcast::Sender<EventEnvelope>,
}

impl EventBus {
    /// Create a new event bus with the given buffer capacity.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Emit a shared (principal-less) event. Dropped silently with no subscribers.
    pub fn emit(&self, event: ServerEvent) {
        self.send(EventEnvelope::new(event, None));
    }

    /// Emit an event attributed to a principal's session.
    pub fn emit_for(&self, principal: &str, event: ServerEvent) {
        self.send(EventEnvelope::new(event, Some(principal.to_string())));
    }

    fn send(&self, envelope: EventEnvelope) {
        let subscriber_count = self.tx.receiver_count();
        tracing::debug!(
            event_type = %envelope.event_type,
            event_id = %envelope.event_id,
            subscriber_count,
            "EventBus emit"
        );
        let _ = self.tx.send(envelope);
    }

    /// Subscribe to receive enveloped events.
    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.tx.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(crate::defaults::EVENT_BUS_CAPACITY)
    }
}

// ============================================================================
// Tests
// ============================================================================
