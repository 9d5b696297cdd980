//! EventPublisher port - hands booking notifications to the emitter.
//!
//! The booking core publishes only after its transaction commits. Delivery is
//! fire-and-forget from the caller's point of view: a failed publish is logged
//! and never rolls back the booking change.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, EventEnvelope};

/// Port for publishing notification records.
///
/// Implementations deliver at-least-once; consumers deduplicate on
/// `EventEnvelope::notification_id`.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish a single record.
    async fn publish(&self, event: EventEnvelope) -> Result<(), DomainError>;

    /// Publish several records, in order.
    async fn publish_all(&self, events: Vec<EventEnvelope>) -> Result<(), DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_publisher_is_object_safe() {
        fn _accepts_dyn(_publisher: &dyn EventPublisher) {}
    }
}
