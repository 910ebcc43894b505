use crate::{Event, EventEnvelope};

/// A projection builds a read model from an append-only event stream.
///
/// Read models are **disposable**: they can be dropped and rebuilt from the
/// journal at any time. The journal is the source of truth.
///
/// Projections should be **idempotent** with respect to redelivery. The
/// `ProjectionRunner` helps by rejecting envelopes whose sequence number does
/// not advance.
///
/// `apply` does not return errors: events a projection does not care about are
/// ignored.
pub trait Projection {
    type Ev: Event;

    /// Apply a single event to the projection, updating the read model.
    fn apply(&mut self, envelope: &EventEnvelope<Self::Ev>);
}
