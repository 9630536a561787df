use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Event Envelope - Event Metadata
// ============================================================================
//
// Wraps domain events with the metadata the session needs to surface
// notifications and trace who changed what. Generic over the event type.
//
// ============================================================================

/// Generic Event Envelope - wraps any domain event with metadata
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct EventEnvelope<E> {
    // Event Identity
    pub event_id: Uuid,
    pub aggregate_id: String,
    pub sequence_number: i64,

    // Event Type Information
    pub event_type: String,

    // Event Payload
    pub event_data: E,

    // Correlation (groups the events emitted by one user action)
    pub correlation_id: Uuid,

    // Actor Information
    pub user_id: Option<i64>,

    // Timing
    pub timestamp: DateTime<Utc>,
}

impl<E> EventEnvelope<E> {
    pub fn new(
        aggregate_id: String,
        sequence_number: i64,
        event_type: &str,
        event_data: E,
        correlation_id: Uuid,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            aggregate_id,
            sequence_number,
            event_type: event_type.to_string(),
            event_data,
            correlation_id,
            user_id: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_user(mut self, user_id: i64) -> Self {
        self.user_id = Some(user_id);
        self
    }
}

// ============================================================================
// Domain Event Trait
// ============================================================================

/// All domain events implement this to be wrapped in envelopes.
pub trait DomainEvent: Serialize + for<'de> Deserialize<'de> + Clone + Send + Sync {
    /// Stable name of this event variant
    fn event_type(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize, Deserialize, Clone, Debug)]
    struct TestEvent {
        data: String,
    }

    impl DomainEvent for TestEvent {
        fn event_type(&self) -> &'static str {
            "TestEvent"
        }
    }

    #[test]
    fn test_event_envelope_creation() {
        let correlation_id = Uuid::new_v4();
        let event = TestEvent {
            data: "test".to_string(),
        };

        let envelope = EventEnvelope::new(
            "order-1".to_string(),
            1,
            event.event_type(),
            event,
            correlation_id,
        )
        .with_user(42);

        assert_eq!(envelope.aggregate_id, "order-1");
        assert_eq!(envelope.sequence_number, 1);
        assert_eq!(envelope.event_type, "TestEvent");
        assert_eq!(envelope.correlation_id, correlation_id);
        assert_eq!(envelope.user_id, Some(42));
    }
}
