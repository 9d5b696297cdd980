//! ReleaseAbandonedHandler - cancels reservations whose checkout was never paid.
//!
//! Unpaid reservations still hold their slot through the partial unique index,
//! so an abandoned checkout would block the slot forever. Each candidate's
//! session is read once before cancelling: a session the gateway reports paid
//! is left for the payer's own confirmation, and a failed read is retried on
//! the next sweep.

use std::sync::Arc;

use crate::domain::booking::{BookingError, BookingEvent};
use crate::domain::foundation::{Money, ReservationId, Timestamp};
use crate::ports::{BookingUnitOfWork, EventPublisher, PaymentGateway};

use super::support::publish_committed;

/// Cancellation reason stamped on released reservations.
pub const ABANDONED_REASON: &str = "checkout abandoned";

#[derive(Debug, Clone, Copy)]
pub struct ReleaseAbandonedCommand {
    /// Reservations created more than this many minutes ago are candidates.
    pub older_than_minutes: i64,
    /// Most reservations released per sweep.
    pub limit: u32,
}

#[derive(Debug, Clone, Default)]
pub struct ReleaseAbandonedResult {
    pub released: Vec<ReservationId>,
    pub skipped: usize,
}

pub struct ReleaseAbandonedHandler {
    uow: Arc<dyn BookingUnitOfWork>,
    gateway: Arc<dyn PaymentGateway>,
    publisher: Arc<dyn EventPublisher>,
}

impl ReleaseAbandonedHandler {
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

    pub async fn handle(&self, cmd: ReleaseAbandonedCommand) -> Result<ReleaseAbandonedResult, BookingError> {
        let now = Timestamp::now();
        let cutoff = now.add_minutes(-cmd.older_than_minutes);

        let mut tx = self.uow.begin().await?;
        let candidates = tx.find_stale_pending(cutoff, cmd.limit).await?;
        if candidates.is_empty() {
            return Ok(ReleaseAbandonedResult::default());
        }

        let mut result = ReleaseAbandonedResult::default();
        let mut notifications = Vec::new();

        for mut reservation in candidates {
            if let Some(session_id) = reservation.checkout_session_id.as_deref() {
                match self.gateway.get_session(session_id).await {
                    Ok(status) if status.paid => {
                        tracing::warn!(
                            reservation_id = %reservation.id,
                            session_id,
                            "Stale reservation has a paid session; awaiting confirmation"
                        );
                        result.skipped += 1;
                        continue;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!(
                            reservation_id = %reservation.id,
                            session_id,
                            error = %e,
                            "Could not read checkout session; will retry next sweep"
                        );
                        result.skipped += 1;
                        continue;
                    }
                }
            }

            reservation.cancel(Some(ABANDONED_REASON.to_string()), now)?;
            tx.update_reservation(&reservation).await?;

            notifications.push(BookingEvent::ReservationCancelled {
                reservation_id: reservation.id,
                user_id: reservation.user_id.clone(),
                reason: Some(ABANDONED_REASON.to_string()),
                refund_id: None,
                refund_amount: Money::ZERO,
                occurred_at: now,
            });
            result.released.push(reservation.id);
        }

        tx.commit().await?;

        if !result.released.is_empty() || result.skipped > 0 {
            tracing::info!(
                released = result.released.len(),
                skipped = result.skipped,
                "Abandoned checkouts swept"
            );
        }

        publish_committed(self.publisher.as_ref(), notifications).await;

        Ok(result)
    }
}
