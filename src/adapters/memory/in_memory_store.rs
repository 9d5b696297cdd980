//! In-memory booking store.
//!
//! Transactions take an exclusive lock on the whole store and work on a copy,
//! so they are fully serialized and roll back on drop. The slot and refund
//! uniqueness rules mirror the Postgres unique indexes.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::domain::booking::{
    Event, PaymentStatus, RefundRecord, Reservation, ReservationStatus,
};
use crate::domain::foundation::{
    DomainError, ErrorCode, EventId, RefundId, ReservationId, Timestamp,
};
use crate::ports::{BookingTx, BookingUnitOfWork};

#[derive(Debug, Clone, Default)]
struct StoreState {
    reservations: HashMap<ReservationId, Reservation>,
    events: HashMap<EventId, Event>,
    refunds: HashMap<RefundId, RefundRecord>,
}

impl StoreState {
    fn slot_taken_by_other(&self, reservation: &Reservation) -> bool {
        let Some(slot) = reservation.resource.slot() else {
            return false;
        };
        self.reservations.values().any(|other| {
            other.id != reservation.id
                && other.status != ReservationStatus::Cancelled
                && other.resource.slot() == Some(slot)
        })
    }
}

/// In-memory `BookingUnitOfWork` for tests and local runs.
#[derive(Clone, Default)]
pub struct InMemoryBookingStore {
    state: Arc<Mutex<StoreState>>,
}

impl InMemoryBookingStore {
    pub fn new() -> Self {
        Self::default()
    }

    // === Test Helpers ===

    /// Adds or replaces an event.
    pub async fn insert_event(&self, event: Event) {
        self.state.lock().await.events.insert(event.id, event);
    }

    pub async fn event(&self, id: &EventId) -> Option<Event> {
        self.state.lock().await.events.get(id).cloned()
    }

    pub async fn reservation(&self, id: &ReservationId) -> Option<Reservation> {
        self.state.lock().await.reservations.get(id).cloned()
    }

    pub async fn reservations(&self) -> Vec<Reservation> {
        self.state.lock().await.reservations.values().cloned().collect()
    }

    /// Overwrites a stored reservation, bypassing the uniqueness rules.
    pub async fn put_reservation(&self, reservation: Reservation) {
        self.state
            .lock()
            .await
            .reservations
            .insert(reservation.id, reservation);
    }

    pub async fn refunds(&self) -> Vec<RefundRecord> {
        self.state.lock().await.refunds.values().cloned().collect()
    }

    pub async fn refund_for(&self, reservation_id: &ReservationId) -> Option<RefundRecord> {
        self.state
            .lock()
            .await
            .refunds
            .values()
            .find(|r| &r.reservation_id == reservation_id)
            .cloned()
    }
}

#[async_trait]
impl BookingUnitOfWork for InMemoryBookingStore {
    async fn begin(&self) -> Result<Box<dyn BookingTx>, DomainError> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(InMemoryTx { guard, working }))
    }
}

/// Open transaction over the in-memory store.
pub struct InMemoryTx {
    guard: OwnedMutexGuard<StoreState>,
    working: StoreState,
}

#[async_trait]
impl BookingTx for InMemoryTx {
    async fn insert_reservation(&mut self, reservation: &Reservation) -> Result<(), DomainError> {
        if self.working.reservations.contains_key(&reservation.id) {
            return Err(DomainError::database("duplicate reservation id"));
        }
        if self.working.slot_taken_by_other(reservation) {
            return Err(DomainError::new(
                ErrorCode::SlotAlreadyBooked,
                "Slot already booked",
            ));
        }
        self.working
            .reservations
            .insert(reservation.id, reservation.clone());
        Ok(())
    }

    async fn update_reservation(&mut self, reservation: &Reservation) -> Result<(), DomainError> {
        if !self.working.reservations.contains_key(&reservation.id) {
            return Err(DomainError::new(
                ErrorCode::ReservationNotFound,
                format!("Reservation not found: {}", reservation.id),
            ));
        }
        if self.working.slot_taken_by_other(reservation)
            && reservation.status != ReservationStatus::Cancelled
        {
            return Err(DomainError::new(
                ErrorCode::SlotAlreadyBooked,
                "Slot already booked",
            ));
        }
        self.working
            .reservations
            .insert(reservation.id, reservation.clone());
        Ok(())
    }

    async fn find_reservation_for_update(
        &mut self,
        id: &ReservationId,
    ) -> Result<Option<Reservation>, DomainError> {
        Ok(self.working.reservations.get(id).cloned())
    }

    async fn find_stale_pending(
        &mut self,
        cutoff: Timestamp,
        limit: u32,
    ) -> Result<Vec<Reservation>, DomainError> {
        let mut stale: Vec<Reservation> = self
            .working
            .reservations
            .values()
            .filter(|r| {
                r.status == ReservationStatus::Active
                    && r.payment_status == PaymentStatus::Pending
                    && r.created_at.is_before(&cutoff)
            })
            .cloned()
            .collect();
        stale.sort_by_key(|r| r.created_at);
        stale.truncate(limit as usize);
        Ok(stale)
    }

    async fn find_event_for_update(&mut self, id: &EventId) -> Result<Option<Event>, DomainError> {
        Ok(self.working.events.get(id).cloned())
    }

    async fn sum_active_paid_quantity(&mut self, event_id: &EventId) -> Result<u64, DomainError> {
        Ok(self
            .working
            .reservations
            .values()
            .filter(|r| r.resource.event_id() == Some(*event_id) && r.is_active_paid())
            .map(|r| u64::from(r.quantity))
            .sum())
    }

    async fn set_consumed_count(&mut self, event_id: &EventId, consumed: u32) -> Result<(), DomainError> {
        let event = self.working.events.get_mut(event_id).ok_or_else(|| {
            DomainError::new(ErrorCode::EventNotFound, format!("Event not found: {}", event_id))
        })?;
        event.consumed_count = consumed;
        Ok(())
    }

    async fn insert_refund(&mut self, refund: &RefundRecord) -> Result<(), DomainError> {
        let duplicate = self
            .working
            .refunds
            .values()
            .any(|r| r.reservation_id == refund.reservation_id);
        if duplicate {
            return Err(DomainError::new(
                ErrorCode::RefundAlreadyRequested,
                "Refund already requested",
            ));
        }
        self.working.refunds.insert(refund.id, refund.clone());
        Ok(())
    }

    async fn update_refund(&mut self, refund: &RefundRecord) -> Result<(), DomainError> {
        if !self.working.refunds.contains_key(&refund.id) {
            return Err(DomainError::new(
                ErrorCode::RefundNotFound,
                format!("Refund not found: {}", refund.id),
            ));
        }
        self.working.refunds.insert(refund.id, refund.clone());
        Ok(())
    }

    async fn find_refund_for_update(&mut self, id: &RefundId) -> Result<Option<RefundRecord>, DomainError> {
        Ok(self.working.refunds.get(id).cloned())
    }

    async fn find_refund_by_reservation(
        &mut self,
        reservation_id: &ReservationId,
    ) -> Result<Option<RefundRecord>, DomainError> {
        Ok(self
            .working
            .refunds
            .values()
            .find(|r| &r.reservation_id == reservation_id)
            .cloned())
    }

    async fn commit(self: Box<Self>) -> Result<(), DomainError> {
        let InMemoryTx { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }
}
