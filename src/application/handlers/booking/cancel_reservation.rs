//! CancelReservationHandler - owner cancels without a refund.

use std::sync::Arc;

use crate::domain::booking::{BookingError, BookingEvent, Reservation, ReservationKind};
use crate::domain::foundation::{Money, ReservationId, Timestamp, UserId};
use crate::ports::{BookingUnitOfWork, EventPublisher};

use super::inventory_ledger;
use super::support::publish_committed;

/// Command to cancel a reservation without refund.
#[derive(Debug, Clone)]
pub struct CancelReservationCommand {
    pub user_id: UserId,
    pub reservation_id: ReservationId,
    pub reason: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CancelReservationResult {
    pub reservation: Reservation,
}

/// Handler for plain cancellation.
///
/// Unlike the other owner operations, a reservation owned by someone else is
/// reported as forbidden rather than missing.
pub struct CancelReservationHandler {
    uow: Arc<dyn BookingUnitOfWork>,
    publisher: Arc<dyn EventPublisher>,
}

impl CancelReservationHandler {
    pub fn new(uow: Arc<dyn BookingUnitOfWork>, publisher: Arc<dyn EventPublisher>) -> Self {
        Self { uow, publisher }
    }

    pub async fn handle(
        &self,
        cmd: CancelReservationCommand,
    ) -> Result<CancelReservationResult, BookingError> {
        let now = Timestamp::now();
        let mut tx = self.uow.begin().await?;

        let mut reservation = tx
            .find_reservation_for_update(&cmd.reservation_id)
            .await?
            .ok_or_else(|| BookingError::not_found("Reservation"))?;

        if !reservation.is_owned_by(&cmd.user_id) {
            tracing::warn!(
                reservation_id = %cmd.reservation_id,
                user_id = %cmd.user_id,
                "Cancellation attempted by non-owner"
            );
            return Err(BookingError::forbidden(
                "You can only cancel your own reservations",
            ));
        }

        let reason = cmd
            .reason
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());
        reservation.cancel(reason.clone(), now)?;
        tx.update_reservation(&reservation).await?;

        if reservation.kind() == ReservationKind::Registration {
            if let Some(event_id) = reservation.resource.event_id() {
                inventory_ledger::recompute(tx.as_mut(), &event_id).await?;
            }
        }

        tx.commit().await?;

        tracing::info!(
            reservation_id = %reservation.id,
            user_id = %reservation.user_id,
            was_paid = reservation.is_paid(),
            "Reservation cancelled"
        );

        publish_committed(
            self.publisher.as_ref(),
            vec![BookingEvent::ReservationCancelled {
                reservation_id: reservation.id,
                user_id: reservation.user_id.clone(),
                reason,
                refund_id: None,
                refund_amount: Money::ZERO,
                occurred_at: now,
            }],
        )
        .await;

        Ok(CancelReservationResult { reservation })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handlers::booking::test_support::Harness;
    use crate::domain::booking::ReservationStatus;

    fn cmd(user: &str, reservation_id: ReservationId) -> CancelReservationCommand {
        CancelReservationCommand {
            user_id: UserId::new(user).unwrap(),
            reservation_id,
            reason: Some("  plans changed  ".to_string()),
        }
    }

    #[tokio::test]
    async fn owner_cancels_paid_registration_and_frees_tickets() {
        let h = Harness::new();
        let event = h.seed_event(10).await;
        let reservation = h.paid_registration(&event, "user-1", 4).await;
        assert_eq!(h.store.event(&event.id).await.unwrap().consumed_count, 4);

        let result = h
            .cancel_handler()
            .handle(cmd("user-1", reservation.id))
            .await
            .unwrap();

        assert_eq!(result.reservation.status, ReservationStatus::Cancelled);
        assert_eq!(result.reservation.cancellation_reason.as_deref(), Some("plans changed"));
        assert_eq!(h.store.event(&event.id).await.unwrap().consumed_count, 0);
        assert!(h.bus.has_event("reservation.cancelled.v1"));
    }

    #[tokio::test]
    async fn unpaid_reservation_can_be_cancelled() {
        let h = Harness::new();
        let created = h.book_slot("user-1", "2099-01-10", "10:00").await;

        let result = h
            .cancel_handler()
            .handle(cmd("user-1", created.id))
            .await
            .unwrap();
        assert_eq!(result.reservation.status, ReservationStatus::Cancelled);
    }

    #[tokio::test]
    async fn non_owner_is_forbidden() {
        let h = Harness::new();
        let created = h.book_slot("user-1", "2099-01-10", "10:00").await;

        let err = h
            .cancel_handler()
            .handle(cmd("user-2", created.id))
            .await
            .unwrap_err();

        assert!(matches!(err, BookingError::Forbidden(_)));
        let stored = h.store.reservation(&created.id).await.unwrap();
        assert_eq!(stored.status, ReservationStatus::Active);
    }

    #[tokio::test]
    async fn cancelling_twice_is_invalid_state() {
        let h = Harness::new();
        let created = h.book_slot("user-1", "2099-01-10", "10:00").await;
        h.cancel_handler().handle(cmd("user-1", created.id)).await.unwrap();

        let err = h
            .cancel_handler()
            .handle(cmd("user-1", created.id))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_STATE");
    }

    #[tokio::test]
    async fn missing_reservation_is_not_found() {
        let h = Harness::new();
        let err = h
            .cancel_handler()
            .handle(cmd("user-1", ReservationId::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::NotFound(_)));
    }

    #[tokio::test]
    async fn notification_outage_does_not_undo_cancellation() {
        let h = Harness::new();
        let created = h.book_slot("user-1", "2099-01-10", "10:00").await;
        h.bus.fail_publishes(true);

        assert!(h.cancel_handler().handle(cmd("user-1", created.id)).await.is_ok());
        let stored = h.store.reservation(&created.id).await.unwrap();
        assert_eq!(stored.status, ReservationStatus::Cancelled);
    }
}
