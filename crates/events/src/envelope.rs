use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Envelope for an event, carrying stream metadata.
///
/// This is the unit appended to a journal and published on a bus.
///
/// - **Append-only**: `sequence_number` is strictly increasing within a stream, starting at 1.
/// - `payload` is the domain event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope<E> {
    event_id: Uuid,
    aggregate_type: String,

    /// Monotonically increasing position in the stream.
    sequence_number: u64,

    payload: E,
}

impl<E> EventEnvelope<E> {
    pub fn new(
        event_id: Uuid,
        aggregate_type: impl Into<String>,
        sequence_number: u64,
        payload: E,
    ) -> Self {
        Self {
            event_id,
            aggregate_type: aggregate_type.into(),
            sequence_number,
            payload,
        }
    }

    /// Wrap a payload with a fresh time-ordered (v7) event id.
    pub fn wrap(aggregate_type: impl Into<String>, sequence_number: u64, payload: E) -> Self {
        Self::new(Uuid::now_v7(), aggregate_type, sequence_number, payload)
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn aggregate_type(&self) -> &str {
        &self.aggregate_type
    }

    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    pub fn payload(&self) -> &E {
        &self.payload
    }

    pub fn into_payload(self) -> E {
        self.payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_assigns_distinct_event_ids() {
        let a = EventEnvelope::wrap("ledger", 1, "first");
        let b = EventEnvelope::wrap("ledger", 2, "second");

        assert_ne!(a.event_id(), b.event_id());
        assert_eq!(a.aggregate_type(), "ledger");
        assert_eq!(b.sequence_number(), 2);
        assert_eq!(b.into_payload(), "second");
    }
}
