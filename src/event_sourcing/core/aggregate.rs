use uuid::Uuid;

use super::event::{DomainEvent, EventEnvelope};

// ============================================================================
// Aggregate Root Pattern
// ============================================================================
//
// Key Principles:
// 1. Commands are validated against current state before anything changes
// 2. Events represent facts that have already happened
// 3. All state changes flow through apply_event
// 4. A rejected command leaves the aggregate untouched
//
// ============================================================================

/// Generic Aggregate trait - every command-driven aggregate implements this
///
/// Type Parameters:
/// - `Event`: The domain event type for this aggregate
/// - `Command`: The command type for this aggregate
/// - `Error`: The error type for business rule violations
pub trait Aggregate: Sized + Send + Sync {
    type Event: DomainEvent;
    type Command;
    type Error;

    /// Handle command and emit events (business logic, no mutation)
    fn handle_command(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error>;

    /// Apply an event to update state
    fn apply_event(&mut self, event: &Self::Event);

    /// Identifier stamped on event envelopes
    fn aggregate_id(&self) -> String;

    /// Number of events applied so far
    fn version(&self) -> i64;

    /// Handle a command, apply every resulting event and wrap each one in an envelope.
    ///
    /// Envelopes carry the aggregate id and version as they are *after* the
    /// event was applied.
    fn execute(
        &mut self,
        command: &Self::Command,
        correlation_id: Uuid,
    ) -> Result<Vec<EventEnvelope<Self::Event>>, Self::Error> {
        let events = self.handle_command(command)?;
        let mut envelopes = Vec::with_capacity(events.len());

        for event in events {
            self.apply_event(&event);
            let event_type = event.event_type();
            envelopes.push(EventEnvelope::new(
                self.aggregate_id(),
                self.version(),
                event_type,
                event,
                correlation_id,
            ));
        }

        Ok(envelopes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize, Clone, Debug)]
    enum CounterEvent {
        Incremented,
    }

    impl DomainEvent for CounterEvent {
        fn event_type(&self) -> &'static str {
            "Incremented"
        }
    }

    struct Counter {
        value: i64,
        version: i64,
    }

    impl Aggregate for Counter {
        type Event = CounterEvent;
        type Command = i64;
        type Error = String;

        fn handle_command(&self, command: &i64) -> Result<Vec<CounterEvent>, String> {
            if *command < 0 {
                return Err("negative".to_string());
            }
            Ok((0..*command).map(|_| CounterEvent::Incremented).collect())
        }

        fn apply_event(&mut self, _event: &CounterEvent) {
            self.value += 1;
            self.version += 1;
        }

        fn aggregate_id(&self) -> String {
            "counter".to_string()
        }

        fn version(&self) -> i64 {
            self.version
        }
    }

    #[test]
    fn test_execute_applies_and_wraps_events() {
        let mut counter = Counter { value: 0, version: 0 };
        let correlation_id = Uuid::new_v4();

        let envelopes = counter.execute(&3, correlation_id).unwrap();

        assert_eq!(counter.value, 3);
        assert_eq!(envelopes.len(), 3);
        assert_eq!(envelopes[0].sequence_number, 1);
        assert_eq!(envelopes[2].sequence_number, 3);
        assert!(envelopes.iter().all(|e| e.correlation_id == correlation_id));
    }

    #[test]
    fn test_rejected_command_leaves_state_untouched() {
        let mut counter = Counter { value: 5, version: 5 };

        assert!(counter.execute(&-1, Uuid::new_v4()).is_err());
        assert_eq!(counter.value, 5);
        assert_eq!(counter.version, 5);
    }
}
