//! ConfirmQuantityIncreaseHandler - commits a paid top-up.
//!
//! Mirrors initial confirmation: the gateway must report the top-up session
//! paid for exactly the difference quoted when it was opened. The pool is
//! re-checked because other registrations may have been paid in between.

use std::sync::Arc;

use crate::domain::booking::{BookingError, BookingEvent, Reservation};
use crate::domain::foundation::{Money, ReservationId, Timestamp, UserId};
use crate::ports::{BookingUnitOfWork, EventPublisher, PaymentGateway, RetryPolicy};

use super::inventory_ledger;
use super::payment_poll::await_paid_session;
use super::support::{load_owned, publish_committed, validate_session_handle};

#[derive(Debug, Clone)]
pub struct ConfirmQuantityIncreaseCommand {
    pub user_id: UserId,
    pub reservation_id: ReservationId,
    pub session_id: String,
}

#[derive(Debug, Clone)]
pub struct ConfirmQuantityIncreaseResult {
    pub reservation: Reservation,
    /// False when no top-up was outstanding and nothing changed.
    pub applied: bool,
}

pub struct ConfirmQuantityIncreaseHandler {
    uow: Arc<dyn BookingUnitOfWork>,
    gateway: Arc<dyn PaymentGateway>,
    retry: Arc<dyn RetryPolicy>,
    publisher: Arc<dyn EventPublisher>,
}

impl ConfirmQuantityIncreaseHandler {
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

    pub async fn handle(
        &self,
        cmd: ConfirmQuantityIncreaseCommand,
    ) -> Result<ConfirmQuantityIncreaseResult, BookingError> {
        validate_session_handle(&cmd.session_id)?;

        let mut tx = self.uow.begin().await?;
        let mut reservation = load_owned(tx.as_mut(), &cmd.reservation_id, &cmd.user_id).await?;

        let top_up = match reservation.pending_top_up.clone() {
            Some(top_up) => top_up,
            None => {
                // Already applied, expired or never requested.
                tracing::debug!(reservation_id = %reservation.id, "No top-up outstanding");
                return Ok(ConfirmQuantityIncreaseResult {
                    reservation,
                    applied: false,
                });
            }
        };

        if top_up.session_id != cmd.session_id {
            tracing::warn!(
                reservation_id = %reservation.id,
                session_id = %cmd.session_id,
                "Session does not belong to outstanding top-up"
            );
            return Err(BookingError::validation(
                "session_id",
                "session does not belong to this quantity change",
            ));
        }

        let session =
            await_paid_session(self.gateway.as_ref(), self.retry.as_ref(), &cmd.session_id).await?;

        if session.amount_total != top_up.amount.minor() {
            tracing::error!(
                reservation_id = %reservation.id,
                session_id = %cmd.session_id,
                expected = top_up.amount.minor(),
                actual = session.amount_total,
                "Top-up amount mismatch"
            );
            return Err(BookingError::AmountMismatch {
                expected: top_up.amount,
                actual: session.amount_total,
            });
        }

        let event_id = reservation
            .resource
            .event_id()
            .ok_or_else(|| BookingError::invariant("registration without event"))?;
        let event = inventory_ledger::lock_event(tx.as_mut(), &event_id).await?;
        inventory_ledger::ensure_capacity(&event, top_up.new_quantity, reservation.quantity)?;

        let payment_reference = session.payment_reference.unwrap_or_else(|| {
            tracing::warn!(session_id = %cmd.session_id, "Paid top-up session has no payment reference");
            cmd.session_id.clone()
        });

        let now = Timestamp::now();
        let previous_quantity = reservation.quantity;
        reservation.complete_top_up(payment_reference, now)?;
        tx.update_reservation(&reservation).await?;
        let event = inventory_ledger::recompute(tx.as_mut(), &event_id).await?;
        tx.commit().await?;

        tracing::info!(
            reservation_id = %reservation.id,
            previous_quantity,
            new_quantity = reservation.quantity,
            amount = top_up.amount.minor(),
            consumed = event.consumed_count,
            "Quantity increase confirmed"
        );

        publish_committed(
            self.publisher.as_ref(),
            vec![BookingEvent::QuantityChanged {
                reservation_id: reservation.id,
                user_id: reservation.user_id.clone(),
                previous_quantity,
                new_quantity: reservation.quantity,
                refund_amount: Money::ZERO,
                occurred_at: now,
            }],
        )
        .await;

        Ok(ConfirmQuantityIncreaseResult {
            reservation,
            applied: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handlers::booking::test_support::Harness;
    use crate::application::handlers::booking::{QuantityChange, UpdateQuantityCommand};

    /// Pays 2 tickets, then requests a top-up to `target`. Returns the reservation and session.
    async fn requested_top_up(h: &Harness, target: u32) -> (Reservation, String) {
        let event = h.seed_event(10).await;
        let reservation = h.paid_registration(&event, "user-1", 2).await;
        let result = h
            .quantity_handler()
            .handle(UpdateQuantityCommand {
                user_id: UserId::new("user-1").unwrap(),
                reservation_id: reservation.id,
                quantity: target,
            })
            .await
            .unwrap();
        match result.change {
            QuantityChange::CheckoutRequired { session_id, .. } => (result.reservation, session_id),
            other => panic!("Expected checkout, got {:?}", other),
        }
    }

    fn cmd(reservation_id: ReservationId, session_id: &str) -> ConfirmQuantityIncreaseCommand {
        ConfirmQuantityIncreaseCommand {
            user_id: UserId::new("user-1").unwrap(),
            reservation_id,
            session_id: session_id.to_string(),
        }
    }

    #[tokio::test]
    async fn paid_top_up_commits_new_quantity() {
        let h = Harness::new();
        let (reservation, session_id) = requested_top_up(&h, 5).await;
        h.gateway.complete_session(&session_id);

        let result = h
            .confirm_top_up_handler()
            .handle(cmd(reservation.id, &session_id))
            .await
            .unwrap();

        assert!(result.applied);
        assert_eq!(result.reservation.quantity, 5);
        assert!(result.reservation.pending_top_up.is_none());
        let top_up_charge = result.reservation.charges.last().unwrap();
        assert_eq!(
            Some(top_up_charge.payment_reference.clone()),
            h.gateway.payment_reference(&session_id)
        );
        assert_eq!(top_up_charge.amount.minor(), 7_500);
        let event_id = reservation.resource.event_id().unwrap();
        assert_eq!(h.store.event(&event_id).await.unwrap().consumed_count, 5);
        assert!(h.bus.has_event("reservation.quantity_changed.v1"));
    }

    #[tokio::test]
    async fn repeated_confirmation_is_a_no_op() {
        let h = Harness::new();
        let (reservation, session_id) = requested_top_up(&h, 5).await;
        h.gateway.complete_session(&session_id);
        h.confirm_top_up_handler()
            .handle(cmd(reservation.id, &session_id))
            .await
            .unwrap();

        let again = h
            .confirm_top_up_handler()
            .handle(cmd(reservation.id, &session_id))
            .await
            .unwrap();

        assert!(!again.applied);
        assert_eq!(again.reservation.quantity, 5);
        let event_id = reservation.resource.event_id().unwrap();
        assert_eq!(h.store.event(&event_id).await.unwrap().consumed_count, 5);
    }

    #[tokio::test]
    async fn underpaid_top_up_is_rejected() {
        let h = Harness::new();
        let (reservation, session_id) = requested_top_up(&h, 5).await;
        h.gateway.complete_session_with_amount(&session_id, 2_500);

        let err = h
            .confirm_top_up_handler()
            .handle(cmd(reservation.id, &session_id))
            .await
            .unwrap_err();

        assert!(matches!(err, BookingError::AmountMismatch { actual: 2_500, .. }));
        let stored = h.store.reservation(&reservation.id).await.unwrap();
        assert_eq!(stored.quantity, 2);
        assert!(stored.pending_top_up.is_some());
    }

    #[tokio::test]
    async fn pool_filled_meanwhile_is_conflict() {
        let h = Harness::new();
        let (reservation, session_id) = requested_top_up(&h, 5).await;
        let event_id = reservation.resource.event_id().unwrap();
        let event = h.store.event(&event_id).await.unwrap();
        h.paid_registration(&event, "user-2", 7).await;
        h.gateway.complete_session(&session_id);

        let err = h
            .confirm_top_up_handler()
            .handle(cmd(reservation.id, &session_id))
            .await
            .unwrap_err();

        assert_eq!(err.code(), "INSUFFICIENT_CAPACITY");
        assert_eq!(h.store.reservation(&reservation.id).await.unwrap().quantity, 2);
    }

    #[tokio::test]
    async fn foreign_session_is_rejected() {
        let h = Harness::new();
        let (reservation, _) = requested_top_up(&h, 5).await;

        let err = h
            .confirm_top_up_handler()
            .handle(cmd(reservation.id, "cs_other"))
            .await
            .unwrap_err();

        assert!(matches!(err, BookingError::Validation { .. }));
        assert!(!h.gateway.was_called("get_session"));
    }
}
