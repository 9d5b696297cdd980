//! CancelWithRefundHandler - cancels a paid reservation and refunds per policy.
//!
//! One processor, two configurations selected by the policy's `RefundMode`:
//!
//! - `Immediate`: the gateway refunds are issued inside the transaction, one
//!   per charge the amount is split across; the record is created `processed`.
//!   A gateway failure aborts everything.
//! - `Review`: the record is created `pending`; money moves when an admin
//!   processes it.

use std::sync::Arc;

use crate::domain::booking::{
    BookingError, BookingEvent, ConflictKind, RefundMode, RefundReason, RefundRecord, Reservation,
    ReservationKind,
};
use crate::domain::foundation::{ReservationId, Timestamp, UserId};
use crate::ports::{BookingUnitOfWork, EventPublisher, PaymentGateway};

use super::inventory_ledger;
use super::support::{load_owned, publish_committed, refund_charges, RefundPolicies};

/// Command to cancel a reservation with a refund.
#[derive(Debug, Clone)]
pub struct CancelWithRefundCommand {
    pub user_id: UserId,
    pub reservation_id: ReservationId,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct CancelWithRefundResult {
    pub reservation: Reservation,
    pub refund: RefundRecord,
}

pub struct CancelWithRefundHandler {
    uow: Arc<dyn BookingUnitOfWork>,
    gateway: Arc<dyn PaymentGateway>,
    publisher: Arc<dyn EventPublisher>,
    policies: RefundPolicies,
}

impl CancelWithRefundHandler {
    pub fn new(
        uow: Arc<dyn BookingUnitOfWork>,
        gateway: Arc<dyn PaymentGateway>,
        publisher: Arc<dyn EventPublisher>,
        policies: RefundPolicies,
    ) -> Self {
        Self {
            uow,
            gateway,
            publisher,
            policies,
        }
    }

    pub async fn handle(
        &self,
        cmd: CancelWithRefundCommand,
    ) -> Result<CancelWithRefundResult, BookingError> {
        let reason = RefundReason::new(cmd.reason)?;
        let now = Timestamp::now();

        let mut tx = self.uow.begin().await?;
        let mut reservation = load_owned(tx.as_mut(), &cmd.reservation_id, &cmd.user_id).await?;

        if tx.find_refund_by_reservation(&reservation.id).await?.is_some() {
            return Err(BookingError::conflict(
                ConflictKind::RefundAlreadyRequested,
                "A refund has already been requested for this reservation",
            ));
        }
        if !reservation.is_active_paid() {
            return Err(BookingError::invalid_state(
                "Only active, paid reservations can be refunded",
            ));
        }
        if reservation.kind() == ReservationKind::Appointment && reservation.has_started(&now) {
            return Err(BookingError::invalid_state("The appointment time has passed"));
        }

        let policy = self.policies.for_kind(reservation.kind());
        let paid = reservation.expected_amount()?;
        let quote = policy.quote(paid, &reservation.starts_at, &now);

        let refund = match policy.mode {
            RefundMode::Immediate => {
                let gateway_references =
                    refund_charges(self.gateway.as_ref(), &mut reservation, quote.amount).await?;
                reservation.mark_refund_completed(quote.amount, now);
                RefundRecord::processed(
                    reservation.id,
                    reservation.user_id.clone(),
                    &quote,
                    reservation.currency.clone(),
                    reason.clone(),
                    gateway_references,
                    now,
                )
            }
            RefundMode::Review => {
                reservation.mark_refund_pending(quote.amount, now);
                RefundRecord::pending(
                    reservation.id,
                    reservation.user_id.clone(),
                    &quote,
                    reservation.currency.clone(),
                    reason.clone(),
                    now,
                )
            }
        };

        reservation.cancel(Some(reason.as_str().to_string()), now)?;
        tx.update_reservation(&reservation).await?;
        tx.insert_refund(&refund).await?;

        if let Some(event_id) = reservation.resource.event_id() {
            inventory_ledger::recompute(tx.as_mut(), &event_id).await?;
        }

        tx.commit().await?;

        tracing::info!(
            reservation_id = %reservation.id,
            refund_id = %refund.id,
            mode = ?policy.mode,
            amount = refund.amount.minor(),
            days_before = ?quote.days_before,
            "Reservation cancelled with refund"
        );

        publish_committed(
            self.publisher.as_ref(),
            vec![BookingEvent::ReservationCancelled {
                reservation_id: reservation.id,
                user_id: reservation.user_id.clone(),
                reason: Some(reason.as_str().to_string()),
                refund_id: Some(refund.id),
                refund_amount: refund.amount,
                occurred_at: now,
            }],
        )
        .await;

        Ok(CancelWithRefundResult { reservation, refund })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::booking::{RefundRecordStatus, RefundStatus, ReservationStatus};
    use crate::application::handlers::booking::test_support::Harness;
    use crate::ports::PaymentError;

    const REASON: &str = "Cannot make it that week";

    fn cmd(user: &str, reservation_id: ReservationId) -> CancelWithRefundCommand {
        CancelWithRefundCommand {
            user_id: UserId::new(user).unwrap(),
            reservation_id,
            reason: REASON.to_string(),
        }
    }

    #[tokio::test]
    async fn registration_refund_is_immediate() {
        let h = Harness::new();
        let event = h.seed_event_in_days(10, 20).await;
        let reservation = h.paid_registration(&event, "user-1", 4).await;

        let result = h.refund_handler().handle(cmd("user-1", reservation.id)).await.unwrap();

        assert_eq!(result.refund.status, RefundRecordStatus::Processed);
        assert_eq!(result.refund.amount.minor(), 10_000);
        assert_eq!(result.refund.metadata.gateway_refund_references.len(), 1);
        assert_eq!(result.reservation.status, ReservationStatus::Cancelled);
        assert_eq!(result.reservation.refund_status, RefundStatus::Completed);
        assert_eq!(result.reservation.refund_amount.minor(), 10_000);
        assert_eq!(h.gateway.refunds().len(), 1);
        assert_eq!(h.store.event(&event.id).await.unwrap().consumed_count, 0);
    }

    #[tokio::test]
    async fn late_registration_refund_is_halved() {
        let h = Harness::new();
        let event = h.seed_event_in_days(10, 3).await;
        let reservation = h.paid_registration(&event, "user-1", 4).await;

        let result = h.refund_handler().handle(cmd("user-1", reservation.id)).await.unwrap();

        assert_eq!(result.refund.amount.minor(), 5_000);
        assert_eq!(h.gateway.refunds()[0].1.minor(), 5_000);
    }

    #[tokio::test]
    async fn appointment_refund_waits_for_review() {
        let h = Harness::new();
        let reservation = h.paid_slot("user-1", "2099-01-10", "10:00").await;

        let result = h.refund_handler().handle(cmd("user-1", reservation.id)).await.unwrap();

        assert_eq!(result.refund.status, RefundRecordStatus::Pending);
        assert_eq!(result.refund.amount.minor(), 8_000);
        assert_eq!(result.reservation.refund_status, RefundStatus::Pending);
        assert!(!h.gateway.was_called("refund"));
    }

    #[tokio::test]
    async fn second_refund_request_conflicts() {
        let h = Harness::new();
        let reservation = h.paid_slot("user-1", "2099-01-10", "10:00").await;
        h.refund_handler().handle(cmd("user-1", reservation.id)).await.unwrap();

        let err = h
            .refund_handler()
            .handle(cmd("user-1", reservation.id))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "REFUND_ALREADY_REQUESTED");
    }

    #[tokio::test]
    async fn gateway_refusal_aborts_everything() {
        let h = Harness::new();
        let event = h.seed_event_in_days(10, 20).await;
        let reservation = h.paid_registration(&event, "user-1", 4).await;
        h.gateway
            .set_method_error("refund", PaymentError::refund_rejected("Charge already refunded"));

        let err = h
            .refund_handler()
            .handle(cmd("user-1", reservation.id))
            .await
            .unwrap_err();

        assert!(err.public_message().contains("Charge already refunded"));
        let stored = h.store.reservation(&reservation.id).await.unwrap();
        assert_eq!(stored.status, ReservationStatus::Active);
        assert!(h.store.refund_for(&reservation.id).await.is_none());
        assert_eq!(h.store.event(&event.id).await.unwrap().consumed_count, 4);
    }

    #[tokio::test]
    async fn short_reason_is_rejected() {
        let h = Harness::new();
        let reservation = h.paid_slot("user-1", "2099-01-10", "10:00").await;
        let mut command = cmd("user-1", reservation.id);
        command.reason = "   too short  ".to_string();

        let err = h.refund_handler().handle(command).await.unwrap_err();
        assert!(matches!(err, BookingError::Validation { ref field, .. } if field == "reason"));
    }

    #[tokio::test]
    async fn unpaid_reservation_cannot_be_refunded() {
        let h = Harness::new();
        let reservation = h.book_slot("user-1", "2099-01-10", "10:00").await;

        let err = h
            .refund_handler()
            .handle(cmd("user-1", reservation.id))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_STATE");
    }

    #[tokio::test]
    async fn past_appointment_cannot_be_refunded() {
        let h = Harness::new();
        let mut reservation = h.paid_slot("user-1", "2099-01-10", "10:00").await;
        reservation.starts_at = Timestamp::now().add_minutes(-30);
        h.store.put_reservation(reservation.clone()).await;

        let err = h
            .refund_handler()
            .handle(cmd("user-1", reservation.id))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_STATE");
    }

    #[tokio::test]
    async fn other_users_reservation_is_not_found() {
        let h = Harness::new();
        let reservation = h.paid_slot("user-1", "2099-01-10", "10:00").await;

        let err = h
            .refund_handler()
            .handle(cmd("user-2", reservation.id))
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::NotFound(_)));
    }
}
