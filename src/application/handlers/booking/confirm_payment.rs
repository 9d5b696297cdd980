//! ConfirmPaymentHandler - reconciles a returned checkout with the gateway.
//!
//! The reservation only becomes paid after the gateway itself reports the
//! session paid for exactly the expected amount. Confirmation is idempotent:
//! a reservation that is already paid returns the original payload without
//! touching the gateway, the pool or the notification emitter.
//!
//! A registration whose event sold out while its checkout was open is
//! refunded in full and cancelled. If that refund fails, operators are
//! notified and the reservation stays pending.

use std::sync::Arc;

use crate::domain::booking::{
    BookingError, BookingEvent, ConflictKind, Reservation, ReservationStatus,
};
use crate::domain::foundation::{ReservationId, Timestamp, UserId};
use crate::ports::{BookingTx, BookingUnitOfWork, EventPublisher, PaymentGateway, RetryPolicy};

use super::inventory_ledger;
use super::payment_poll::await_paid_session;
use super::support::{
    flag_for_operator, load_owned, publish_committed, refund_charges, validate_session_handle,
};

/// Cancellation reason stored on registrations refunded because the event sold out.
pub const SOLD_OUT_REASON: &str = "event sold out before payment was confirmed";

/// Command to confirm the initial payment of a reservation.
#[derive(Debug, Clone)]
pub struct ConfirmPaymentCommand {
    pub user_id: UserId,
    pub reservation_id: ReservationId,
    pub session_id: String,
}

#[derive(Debug, Clone)]
pub struct ConfirmPaymentResult {
    pub reservation: Reservation,
    /// True when the reservation was already paid before this call.
    pub already_confirmed: bool,
}

pub struct ConfirmPaymentHandler {
    uow: Arc<dyn BookingUnitOfWork>,
    gateway: Arc<dyn PaymentGateway>,
    retry: Arc<dyn RetryPolicy>,
    publisher: Arc<dyn EventPublisher>,
}

impl ConfirmPaymentHandler {
    pub fn new(
        uow: Arc<dyn BookingUnitOfWork>,
        gateway: Arc<dyn PaymentGateway>,
        retry: Arc<dyn RetryPolicy>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            uow,
            gateway,
            retry,
            publisher,
        }
    }

    pub async fn handle(&self, cmd: ConfirmPaymentCommand) -> Result<ConfirmPaymentResult, BookingError> {
        validate_session_handle(&cmd.session_id)?;

        let mut tx = self.uow.begin().await?;
        let mut reservation = load_owned(tx.as_mut(), &cmd.reservation_id, &cmd.user_id).await?;

        if reservation.is_paid() {
            tracing::debug!(reservation_id = %reservation.id, "Payment already confirmed");
            return Ok(ConfirmPaymentResult {
                reservation,
                already_confirmed: true,
            });
        }

        if reservation.status != ReservationStatus::Active {
            return Err(BookingError::invalid_state(format!(
                "Cannot confirm payment for a {:?} reservation",
                reservation.status
            )));
        }

        if reservation.checkout_session_id.as_deref() != Some(cmd.session_id.as_str()) {
            tracing::warn!(
                reservation_id = %reservation.id,
                session_id = %cmd.session_id,
                "Session does not belong to reservation"
            );
            return Err(BookingError::validation(
                "session_id",
                "session does not belong to this reservation",
            ));
        }

        let session =
            await_paid_session(self.gateway.as_ref(), self.retry.as_ref(), &cmd.session_id).await?;

        let expected = reservation.expected_amount()?;
        if session.amount_total != expected.minor() {
            tracing::error!(
                reservation_id = %reservation.id,
                session_id = %cmd.session_id,
                expected = expected.minor(),
                actual = session.amount_total,
                "Payment amount mismatch"
            );
            return Err(BookingError::AmountMismatch {
                expected,
                actual: session.amount_total,
            });
        }

        let payment_reference = session.payment_reference.unwrap_or_else(|| {
            tracing::warn!(session_id = %cmd.session_id, "Paid session has no payment reference");
            cmd.session_id.clone()
        });

        let now = Timestamp::now();
        reservation.confirm_payment(payment_reference, now)?;

        if let Some(event_id) = reservation.resource.event_id() {
            let event = inventory_ledger::lock_event(tx.as_mut(), &event_id).await?;
            if inventory_ledger::ensure_capacity(&event, reservation.quantity, 0).is_err() {
                return Err(self.refund_sold_out(tx, reservation, now).await);
            }
        }

        tx.update_reservation(&reservation).await?;
        if let Some(event_id) = reservation.resource.event_id() {
            inventory_ledger::recompute(tx.as_mut(), &event_id).await?;
        }

        tx.commit().await?;

        tracing::info!(
            reservation_id = %reservation.id,
            user_id = %reservation.user_id,
            amount = expected.minor(),
            "Payment confirmed"
        );

        publish_committed(
            self.publisher.as_ref(),
            vec![BookingEvent::PaymentConfirmed {
                reservation_id: reservation.id,
                user_id: reservation.user_id.clone(),
                quantity: reservation.quantity,
                amount: expected,
                occurred_at: now,
            }],
        )
        .await;

        Ok(ConfirmPaymentResult {
            reservation,
            already_confirmed: false,
        })
    }

    /// Returns the whole payment of a registration that no longer fits its
    /// event and cancels it. Always yields the error reported to the caller.
    async fn refund_sold_out(
        &self,
        mut tx: Box<dyn BookingTx>,
        mut reservation: Reservation,
        now: Timestamp,
    ) -> BookingError {
        let amount = match reservation.expected_amount() {
            Ok(amount) => amount,
            Err(e) => return e.into(),
        };

        if let Err(e) = refund_charges(self.gateway.as_ref(), &mut reservation, amount).await {
            drop(tx);
            publish_committed(
                self.publisher.as_ref(),
                vec![flag_for_operator(
                    &reservation,
                    "paid for a sold-out event and the automatic refund failed",
                    now,
                )],
            )
            .await;
            return e;
        }

        reservation.mark_refund_completed(amount, now);
        if let Err(e) = reservation.cancel(Some(SOLD_OUT_REASON.to_string()), now) {
            return e.into();
        }
        if let Err(e) = tx.update_reservation(&reservation).await {
            return e.into();
        }
        if let Err(e) = tx.commit().await {
            return e.into();
        }

        tracing::warn!(
            reservation_id = %reservation.id,
            user_id = %reservation.user_id,
            amount = amount.minor(),
            "Event sold out before payment was confirmed; payment refunded"
        );

        publish_committed(
            self.publisher.as_ref(),
            vec![BookingEvent::ReservationCancelled {
                reservation_id: reservation.id,
                user_id: reservation.user_id.clone(),
                reason: Some(SOLD_OUT_REASON.to_string()),
                refund_id: None,
                refund_amount: amount,
                occurred_at: now,
            }],
        )
        .await;

        BookingError::conflict(
            ConflictKind::InsufficientCapacity,
            "The event sold out before the payment was confirmed; the payment has been refunded",
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handlers::booking::test_support::Harness;
    use crate::domain::booking::PaymentStatus;
    use crate::ports::PaymentError;

    fn cmd(user: &str, reservation: &Reservation) -> ConfirmPaymentCommand {
        ConfirmPaymentCommand {
            user_id: UserId::new(user).unwrap(),
            reservation_id: reservation.id,
            session_id: reservation.checkout_session_id.clone().unwrap(),
        }
    }

    #[tokio::test]
    async fn paid_session_marks_reservation_paid() {
        let h = Harness::new();
        let created = h.book_slot("user-1", "2099-01-10", "10:00").await;
        h.gateway.complete_session(created.checkout_session_id.as_deref().unwrap());

        let result = h.confirm_handler().handle(cmd("user-1", &created)).await.unwrap();

        assert!(!result.already_confirmed);
        assert_eq!(result.reservation.payment_status, PaymentStatus::Paid);
        assert!(result.reservation.paid_at.is_some());
        assert!(result
            .reservation
            .payment_reference
            .as_deref()
            .unwrap()
            .starts_with("pi_mock"));
        assert!(h.bus.has_event("reservation.payment_confirmed.v1"));
    }

    #[tokio::test]
    async fn registration_payment_consumes_pool() {
        let h = Harness::new();
        let event = h.seed_event(10).await;
        let created = h.register("user-1", &event, 6).await;
        h.gateway.complete_session(created.checkout_session_id.as_deref().unwrap());

        h.confirm_handler().handle(cmd("user-1", &created)).await.unwrap();

        assert_eq!(h.store.event(&event.id).await.unwrap().consumed_count, 6);
    }

    #[tokio::test]
    async fn second_confirm_is_idempotent() {
        let h = Harness::new();
        let event = h.seed_event(10).await;
        let created = h.register("user-1", &event, 6).await;
        h.gateway.complete_session(created.checkout_session_id.as_deref().unwrap());
        h.confirm_handler().handle(cmd("user-1", &created)).await.unwrap();
        let reads = h.gateway.call_count("get_session");
        let notifications = h.bus.event_count();

        let again = h.confirm_handler().handle(cmd("user-1", &created)).await.unwrap();

        assert!(again.already_confirmed);
        assert_eq!(again.reservation.quantity, 6);
        assert_eq!(h.gateway.call_count("get_session"), reads);
        assert_eq!(h.bus.event_count(), notifications);
        assert_eq!(h.store.event(&event.id).await.unwrap().consumed_count, 6);
    }

    #[tokio::test]
    async fn amount_mismatch_leaves_reservation_pending() {
        let h = Harness::new();
        let created = h.book_slot("user-1", "2099-01-10", "10:00").await;
        h.gateway
            .complete_session_with_amount(created.checkout_session_id.as_deref().unwrap(), 1);

        let err = h.confirm_handler().handle(cmd("user-1", &created)).await.unwrap_err();

        assert!(matches!(err, BookingError::AmountMismatch { actual: 1, .. }));
        let stored = h.store.reservation(&created.id).await.unwrap();
        assert_eq!(stored.payment_status, PaymentStatus::Pending);
        assert!(!h.bus.has_event("reservation.payment_confirmed.v1"));
    }

    #[tokio::test]
    async fn unpaid_session_is_payment_not_completed() {
        let h = Harness::new();
        let created = h.book_slot("user-1", "2099-01-10", "10:00").await;

        let err = h.confirm_handler().handle(cmd("user-1", &created)).await.unwrap_err();

        assert!(matches!(err, BookingError::GatewayTransient(_)));
        assert_eq!(h.gateway.call_count("get_session"), 3);
    }

    #[tokio::test]
    async fn late_payment_confirms_within_retries() {
        let h = Harness::new();
        let created = h.book_slot("user-1", "2099-01-10", "10:00").await;
        h.gateway
            .complete_session_after_reads(created.checkout_session_id.as_deref().unwrap(), 2);

        let result = h.confirm_handler().handle(cmd("user-1", &created)).await.unwrap();
        assert_eq!(result.reservation.payment_status, PaymentStatus::Paid);
    }

    #[tokio::test]
    async fn foreign_session_is_rejected_without_gateway_call() {
        let h = Harness::new();
        let created = h.book_slot("user-1", "2099-01-10", "10:00").await;
        let mut command = cmd("user-1", &created);
        command.session_id = "cs_someone_else".to_string();

        let err = h.confirm_handler().handle(command).await.unwrap_err();

        assert!(matches!(err, BookingError::Validation { .. }));
        assert!(!h.gateway.was_called("get_session"));
    }

    #[tokio::test]
    async fn other_users_reservation_is_not_found() {
        let h = Harness::new();
        let created = h.book_slot("user-1", "2099-01-10", "10:00").await;

        let err = h.confirm_handler().handle(cmd("user-2", &created)).await.unwrap_err();
        assert!(matches!(err, BookingError::NotFound(_)));
    }

    #[tokio::test]
    async fn malformed_handle_is_rejected() {
        let h = Harness::new();
        let created = h.book_slot("user-1", "2099-01-10", "10:00").await;
        let mut command = cmd("user-1", &created);
        command.session_id = "cs_1; DROP TABLE".to_string();

        let err = h.confirm_handler().handle(command).await.unwrap_err();
        assert!(matches!(err, BookingError::Validation { ref field, .. } if field == "session_id"));
    }

    #[tokio::test]
    async fn payment_for_sold_out_event_is_refunded_and_cancelled() {
        let h = Harness::new();
        let event = h.seed_event(3).await;
        let first = h.register("user-1", &event, 2).await;
        let second = h.register("user-2", &event, 2).await;
        h.gateway.complete_session(first.checkout_session_id.as_deref().unwrap());
        h.confirm_handler().handle(cmd("user-1", &first)).await.unwrap();
        let second_session = second.checkout_session_id.clone().unwrap();
        h.gateway.complete_session(&second_session);

        let err = h.confirm_handler().handle(cmd("user-2", &second)).await.unwrap_err();

        assert_eq!(err.code(), "INSUFFICIENT_CAPACITY");
        let stored = h.store.reservation(&second.id).await.unwrap();
        assert_eq!(stored.status, ReservationStatus::Cancelled);
        assert_eq!(stored.cancellation_reason.as_deref(), Some(SOLD_OUT_REASON));
        assert_eq!(stored.refund_amount.minor(), 5_000);
        assert_eq!(
            h.gateway.refunds(),
            vec![(
                h.gateway.payment_reference(&second_session).unwrap(),
                stored.refund_amount
            )]
        );
        assert_eq!(h.store.event(&event.id).await.unwrap().consumed_count, 2);

        let published = h.bus.published_events();
        let cancelled = published
            .iter()
            .find(|e| e.event_type == "reservation.cancelled.v1")
            .unwrap();
        assert_eq!(cancelled.aggregate_id, second.id.to_string());
        assert_eq!(cancelled.payload["reason"], SOLD_OUT_REASON);
        assert_eq!(cancelled.payload["refund_amount"], 5_000);
    }

    #[tokio::test]
    async fn failed_sold_out_refund_notifies_operators() {
        let h = Harness::new();
        let event = h.seed_event(3).await;
        let first = h.register("user-1", &event, 2).await;
        let second = h.register("user-2", &event, 2).await;
        h.gateway.complete_session(first.checkout_session_id.as_deref().unwrap());
        h.confirm_handler().handle(cmd("user-1", &first)).await.unwrap();
        h.gateway.complete_session(second.checkout_session_id.as_deref().unwrap());
        h.gateway
            .set_method_error("refund", PaymentError::network("connection reset"));

        let err = h.confirm_handler().handle(cmd("user-2", &second)).await.unwrap_err();

        assert!(err.is_retryable());
        let stored = h.store.reservation(&second.id).await.unwrap();
        assert_eq!(stored.status, ReservationStatus::Active);
        assert_eq!(stored.payment_status, PaymentStatus::Pending);
        assert!(h.bus.has_event("reservation.operator_attention_required.v1"));
    }

    #[tokio::test]
    async fn gateway_outage_surfaces_as_transient() {
        let h = Harness::new();
        let created = h.book_slot("user-1", "2099-01-10", "10:00").await;
        h.gateway
            .set_method_error("get_session", PaymentError::network("connection refused"));

        let err = h.confirm_handler().handle(cmd("user-1", &created)).await.unwrap_err();
        assert!(err.is_retryable());
    }
}
