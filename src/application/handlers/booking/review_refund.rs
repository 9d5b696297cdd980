//! ReviewRefundHandler - admin decisions on refund records.
//!
//! `pending → approved | rejected`, then `approved → processed`. Processing is
//! where review-mode refunds reach the gateway.

use std::sync::Arc;

use crate::domain::booking::{BookingError, BookingEvent, RefundRecord, ReviewDecision};
use crate::domain::foundation::{RefundId, Timestamp, UserId};
use crate::ports::{BookingUnitOfWork, EventPublisher, PaymentGateway};

use super::support::{publish_committed, refund_charges};

/// Command carrying an admin's decision.
#[derive(Debug, Clone)]
pub struct ReviewRefundCommand {
    pub reviewer: UserId,
    pub refund_id: RefundId,
    pub decision: ReviewDecision,
}

#[derive(Debug, Clone)]
pub struct ReviewRefundResult {
    pub refund: RefundRecord,
}

pub struct ReviewRefundHandler {
    uow: Arc<dyn BookingUnitOfWork>,
    gateway: Arc<dyn PaymentGateway>,
    publisher: Arc<dyn EventPublisher>,
}

impl ReviewRefundHandler {
    pub fn new(
        uow: Arc<dyn BookingUnitOfWork>,
        gateway: Arc<dyn PaymentGateway>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            uow,
            gateway,
            publisher,
        }
    }

    pub async fn handle(&self, cmd: ReviewRefundCommand) -> Result<ReviewRefundResult, BookingError> {
        let now = Timestamp::now();
        let mut tx = self.uow.begin().await?;

        let mut refund = tx
            .find_refund_for_update(&cmd.refund_id)
            .await?
            .ok_or_else(|| BookingError::not_found("Refund"))?;
        let mut reservation = tx
            .find_reservation_for_update(&refund.reservation_id)
            .await?
            .ok_or_else(|| {
                tracing::error!(refund_id = %refund.id, "Refund record without reservation");
                BookingError::invariant(format!("refund {} has no reservation", refund.id))
            })?;

        if cmd.decision == ReviewDecision::Approve && reservation.has_started(&now) {
            return Err(BookingError::invalid_state(
                "Cannot approve a refund after the reservation date has passed",
            ));
        }

        refund.review(cmd.decision, cmd.reviewer.clone(), now)?;

        match cmd.decision {
            ReviewDecision::Approve => {}
            ReviewDecision::Reject => reservation.mark_refund_failed(now),
            ReviewDecision::Process => {
                let references =
                    refund_charges(self.gateway.as_ref(), &mut reservation, refund.amount).await?;
                refund.record_gateway_refunds(references);
                reservation.mark_refund_completed(refund.amount, now);
            }
        }

        tx.update_refund(&refund).await?;
        tx.update_reservation(&reservation).await?;
        tx.commit().await?;

        tracing::info!(
            refund_id = %refund.id,
            reservation_id = %reservation.id,
            reviewer = %cmd.reviewer,
            decision = ?cmd.decision,
            "Refund reviewed"
        );

        publish_committed(
            self.publisher.as_ref(),
            vec![BookingEvent::RefundReviewed {
                refund_id: refund.id,
                reservation_id: reservation.id,
                reviewer: cmd.reviewer,
                decision: cmd.decision,
                status: refund.status,
                occurred_at: now,
            }],
        )
        .await;

        Ok(ReviewRefundResult { refund })
    }
}
