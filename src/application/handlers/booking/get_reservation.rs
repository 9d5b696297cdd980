//! GetReservationHandler - owner read of a reservation and its refund record.

use std::sync::Arc;

use crate::domain::booking::{BookingError, RefundRecord, Reservation};
use crate::domain::foundation::{ReservationId, Timestamp, UserId};
use crate::ports::BookingUnitOfWork;

use super::support::load_owned;

#[derive(Debug, Clone)]
pub struct GetReservationQuery {
    pub user_id: UserId,
    pub reservation_id: ReservationId,
}

#[derive(Debug, Clone)]
pub struct GetReservationResult {
    pub reservation: Reservation,
    pub refund: Option<RefundRecord>,
}

/// Reads a reservation. A top-up whose checkout has expired is cleared and the
/// cleared state persisted before returning.
pub struct GetReservationHandler {
    uow: Arc<dyn BookingUnitOfWork>,
}

impl GetReservationHandler {
    pub fn new(uow: Arc<dyn BookingUnitOfWork>) -> Self {
        Self { uow }
    }

    pub async fn handle(&self, query: GetReservationQuery) -> Result<GetReservationResult, BookingError> {
        let now = Timestamp::now();
        let mut tx = self.uow.begin().await?;
        let mut reservation = load_owned(tx.as_mut(), &query.reservation_id, &query.user_id).await?;
        let refund = tx.find_refund_by_reservation(&reservation.id).await?;

        if reservation.clear_expired_top_up(&now) {
            tx.update_reservation(&reservation).await?;
            tx.commit().await?;
            tracing::info!(reservation_id = %reservation.id, "Expired top-up cleared on read");
        }

        Ok(GetReservationResult { reservation, refund })
    }
}
