//! In-memory notification bus.
//!
//! Captures published records for assertions in tests and for running the
//! service without an outbox table. Records are kept in publish order.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::domain::foundation::{DomainError, ErrorCode, EventEnvelope};
use crate::ports::EventPublisher;

/// In-memory event bus.
///
/// # Example
///
/// ```ignore
/// let bus = Arc::new(InMemoryEventBus::new());
/// bus.publish(envelope).await?;
///
/// assert_eq!(bus.event_count(), 1);
/// assert!(bus.has_event("reservation.created.v1"));
/// ```
#[derive(Default)]
pub struct InMemoryEventBus {
    published: RwLock<Vec<EventEnvelope>>,
    fail_publishes: AtomicBool,
}

impl InMemoryEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    // === Test Helpers ===

    /// Makes every following publish fail (delivery outage).
    pub fn fail_publishes(&self, fail: bool) {
        self.fail_publishes.store(fail, Ordering::SeqCst);
    }

    /// Returns all published events.
    pub fn published_events(&self) -> Vec<EventEnvelope> {
        self.read().clone()
    }

    /// Returns events of a specific type.
    pub fn events_of_type(&self, event_type: &str) -> Vec<EventEnvelope> {
        self.read()
            .iter()
            .filter(|e| e.event_type == event_type)
            .cloned()
            .collect()
    }

    /// Returns events for a specific aggregate.
    pub fn events_for_aggregate(&self, aggregate_id: &str) -> Vec<EventEnvelope> {
        self.read()
            .iter()
            .filter(|e| e.aggregate_id == aggregate_id)
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.write().clear();
    }

    pub fn event_count(&self) -> usize {
        self.read().len()
    }

    pub fn has_event(&self, event_type: &str) -> bool {
        self.read().iter().any(|e| e.event_type == event_type)
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<EventEnvelope>> {
        self.published.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<EventEnvelope>> {
        self.published.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventBus {
    async fn publish(&self, event: EventEnvelope) -> Result<(), DomainError> {
        if self.fail_publishes.load(Ordering::SeqCst) {
            return Err(DomainError::new(
                ErrorCode::ExternalServiceError,
                "Notification delivery unavailable",
            ));
        }
        self.write().push(event);
        Ok(())
    }

    async fn publish_all(&self, events: Vec<EventEnvelope>) -> Result<(), DomainError> {
        for event in events {
            self.publish(event).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::booking::BookingEvent;
    use crate::domain::foundation::{Money, ReservationId, SerializableDomainEvent, Timestamp, UserId};

    fn cancelled(reservation_id: ReservationId) -> EventEnvelope {
        BookingEvent::ReservationCancelled {
            reservation_id,
            user_id: UserId::new("user-1").unwrap(),
            reason: None,
            refund_id: None,
            refund_amount: Money::ZERO,
            occurred_at: Timestamp::now(),
        }
        .to_envelope()
    }

    #[tokio::test]
    async fn publish_stores_event() {
        let bus = InMemoryEventBus::new();
        bus.publish(cancelled(ReservationId::new())).await.unwrap();

        assert_eq!(bus.event_count(), 1);
        assert!(bus.has_event("reservation.cancelled.v1"));
    }

    #[tokio::test]
    async fn events_for_aggregate_filters_by_id() {
        let bus = InMemoryEventBus::new();
        let mine = ReservationId::new();
        bus.publish_all(vec![cancelled(mine), cancelled(ReservationId::new())])
            .await
            .unwrap();

        assert_eq!(bus.events_for_aggregate(&mine.to_string()).len(), 1);
        assert_eq!(bus.events_of_type("reservation.cancelled.v1").len(), 2);
    }

    #[tokio::test]
    async fn failing_bus_rejects_and_keeps_nothing() {
        let bus = InMemoryEventBus::new();
        bus.fail_publishes(true);

        assert!(bus.publish(cancelled(ReservationId::new())).await.is_err());
        assert_eq!(bus.event_count(), 0);
    }

    #[tokio::test]
    async fn clear_removes_everything() {
        let bus = InMemoryEventBus::new();
        bus.publish(cancelled(ReservationId::new())).await.unwrap();
        bus.clear();
        assert_eq!(bus.event_count(), 0);
    }
}
