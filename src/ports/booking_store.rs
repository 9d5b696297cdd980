//! Booking persistence port - transactional access to reservations, events
//! and refund records.
//!
//! Every booking operation runs inside one `BookingTx`: either everything it
//! wrote is committed together, or nothing is. Dropping a transaction without
//! calling `commit` rolls it back.
//!
//! Adapters are responsible for the two uniqueness guarantees:
//!
//! - at most one non-cancelled reservation per slot, reported as
//!   `ErrorCode::SlotAlreadyBooked` from `insert_reservation`
//! - at most one refund record per reservation, reported as
//!   `ErrorCode::RefundAlreadyRequested` from `insert_refund`

use async_trait::async_trait;

use crate::domain::booking::{Event, RefundRecord, Reservation};
use crate::domain::foundation::{DomainError, EventId, RefundId, ReservationId, Timestamp};

/// Factory for booking transactions.
#[async_trait]
pub trait BookingUnitOfWork: Send + Sync {
    /// Opens a new transaction.
    async fn begin(&self) -> Result<Box<dyn BookingTx>, DomainError>;
}

/// A single open transaction.
#[async_trait]
pub trait BookingTx: Send {
    /// Inserts a new reservation.
    ///
    /// # Errors
    ///
    /// - `SlotAlreadyBooked` if another non-cancelled reservation holds the slot
    /// - `DatabaseError` on connection issues
    async fn insert_reservation(&mut self, reservation: &Reservation) -> Result<(), DomainError>;

    /// Persists changes to an existing reservation.
    async fn update_reservation(&mut self, reservation: &Reservation) -> Result<(), DomainError>;

    /// Loads a reservation and locks it until the transaction ends.
    async fn find_reservation_for_update(
        &mut self,
        id: &ReservationId,
    ) -> Result<Option<Reservation>, DomainError>;

    /// Active reservations still awaiting their first payment, created before `cutoff`.
    async fn find_stale_pending(
        &mut self,
        cutoff: Timestamp,
        limit: u32,
    ) -> Result<Vec<Reservation>, DomainError>;

    /// Loads an event and locks it so concurrent recounts serialize.
    async fn find_event_for_update(&mut self, id: &EventId) -> Result<Option<Event>, DomainError>;

    /// Sum of `quantity` over active, paid reservations of the event.
    async fn sum_active_paid_quantity(&mut self, event_id: &EventId) -> Result<u64, DomainError>;

    /// Stores the recomputed consumed count.
    async fn set_consumed_count(&mut self, event_id: &EventId, consumed: u32) -> Result<(), DomainError>;

    /// Inserts a refund record.
    ///
    /// # Errors
    ///
    /// - `RefundAlreadyRequested` if the reservation already has one
    async fn insert_refund(&mut self, refund: &RefundRecord) -> Result<(), DomainError>;

    async fn update_refund(&mut self, refund: &RefundRecord) -> Result<(), DomainError>;

    /// Loads a refund record and locks it until the transaction ends.
    async fn find_refund_for_update(&mut self, id: &RefundId) -> Result<Option<RefundRecord>, DomainError>;

    async fn find_refund_by_reservation(
        &mut self,
        reservation_id: &ReservationId,
    ) -> Result<Option<RefundRecord>, DomainError>;

    /// Commits every write made through this transaction.
    async fn commit(self: Box<Self>) -> Result<(), DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_of_work_is_object_safe() {
        fn _accepts_dyn(_uow: &dyn BookingUnitOfWork) {}
    }

    #[test]
    fn tx_is_object_safe() {
        fn _accepts_box(_tx: Box<dyn BookingTx>) {}
    }
}
