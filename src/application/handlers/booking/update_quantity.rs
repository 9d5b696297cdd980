//! UpdateQuantityHandler - changes the ticket count of a paid registration.
//!
//! Reductions refund the removed tickets immediately, newest charge first, and
//! take effect at once.
//! Increases open a checkout for the extra tickets only; the committed
//! quantity changes when that top-up is confirmed.

use std::sync::Arc;

use crate::domain::booking::{
    BookingError, BookingEvent, ConflictKind, PendingTopUp, Reservation, ReservationKind,
};
use crate::domain::foundation::{Money, ReservationId, Timestamp, UserId};
use crate::ports::{
    BookingUnitOfWork, CheckoutMetadata, CheckoutRequest, EventPublisher, PaymentGateway,
};

use super::inventory_ledger;
use super::support::{load_owned, publish_committed, refund_charges, CheckoutUrls, RefundPolicies};

#[derive(Debug, Clone)]
pub struct UpdateQuantityCommand {
    pub user_id: UserId,
    pub reservation_id: ReservationId,
    pub quantity: u32,
}

/// How the change was applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuantityChange {
    /// Quantity lowered; `refund_amount` was returned to the payer.
    Reduced {
        previous_quantity: u32,
        refund_amount: Money,
        gateway_refund_references: Vec<String>,
    },

    /// Extra tickets await payment through `checkout_url`.
    CheckoutRequired {
        session_id: String,
        checkout_url: String,
        amount: Money,
        expires_at: Timestamp,
    },
}

#[derive(Debug, Clone)]
pub struct UpdateQuantityResult {
    pub reservation: Reservation,
    pub change: QuantityChange,
}

pub struct UpdateQuantityHandler {
    uow: Arc<dyn BookingUnitOfWork>,
    gateway: Arc<dyn PaymentGateway>,
    publisher: Arc<dyn EventPublisher>,
    policies: RefundPolicies,
    urls: CheckoutUrls,
}

impl UpdateQuantityHandler {
    pub fn new(
        uow: Arc<dyn BookingUnitOfWork>,
        gateway: Arc<dyn PaymentGateway>,
        publisher: Arc<dyn EventPublisher>,
        policies: RefundPolicies,
        urls: CheckoutUrls,
    ) -> Self {
        Self {
            uow,
            gateway,
            publisher,
            policies,
            urls,
        }
    }

    pub async fn handle(&self, cmd: UpdateQuantityCommand) -> Result<UpdateQuantityResult, BookingError> {
        let now = Timestamp::now();
        let mut tx = self.uow.begin().await?;
        let mut reservation = load_owned(tx.as_mut(), &cmd.reservation_id, &cmd.user_id).await?;

        if reservation.clear_expired_top_up(&now) {
            tracing::info!(reservation_id = %reservation.id, "Expired top-up cleared");
        }
        if reservation.pending_top_up.is_some() {
            return Err(BookingError::conflict(
                ConflictKind::TopUpOutstanding,
                "A quantity increase is already awaiting payment",
            ));
        }
        reservation.ensure_quantity_change_allowed(cmd.quantity)?;

        let event_id = reservation
            .resource
            .event_id()
            .ok_or_else(|| BookingError::invariant("registration without event"))?;
        let previous_quantity = reservation.quantity;

        let (change, event) = if cmd.quantity < previous_quantity {
            let removed = previous_quantity - cmd.quantity;
            let removed_value = reservation.unit_price.times(removed)?;
            let quote = self
                .policies
                .for_kind(ReservationKind::Registration)
                .quote(removed_value, &reservation.starts_at, &now);

            let gateway_refund_references =
                refund_charges(self.gateway.as_ref(), &mut reservation, quote.amount).await?;
            if !quote.amount.is_zero() {
                reservation.mark_refund_completed(quote.amount, now);
            }

            reservation.reduce_quantity(cmd.quantity, now)?;
            tx.update_reservation(&reservation).await?;
            let event = inventory_ledger::recompute(tx.as_mut(), &event_id).await?;

            (
                QuantityChange::Reduced {
                    previous_quantity,
                    refund_amount: quote.amount,
                    gateway_refund_references,
                },
                event,
            )
        } else {
            let added = cmd.quantity - previous_quantity;
            let event = inventory_ledger::lock_event(tx.as_mut(), &event_id).await?;
            if event.has_started(&now) {
                return Err(BookingError::invalid_state("Event has already started"));
            }
            inventory_ledger::ensure_capacity(&event, cmd.quantity, previous_quantity)?;

            reservation.unit_price.times(cmd.quantity)?;
            let amount = reservation.unit_price.times(added)?;
            let session = self
                .gateway
                .open_checkout(CheckoutRequest {
                    amount,
                    currency: reservation.currency.clone(),
                    line_item_description: format!("{} x{} (additional)", event.title, added),
                    success_url: self.urls.success_url(&reservation.id),
                    cancel_url: self.urls.cancel_url(&reservation.id),
                    metadata: CheckoutMetadata {
                        reservation_id: reservation.id,
                        user_id: reservation.user_id.clone(),
                        event_id: Some(event_id),
                        quantity: previous_quantity,
                        target_quantity: Some(cmd.quantity),
                    },
                })
                .await?;

            reservation.begin_top_up(
                PendingTopUp {
                    session_id: session.id.clone(),
                    new_quantity: cmd.quantity,
                    amount,
                    expires_at: session.expires_at,
                },
                now,
            )?;
            tx.update_reservation(&reservation).await?;

            (
                QuantityChange::CheckoutRequired {
                    session_id: session.id,
                    checkout_url: session.url,
                    amount,
                    expires_at: session.expires_at,
                },
                event,
            )
        };

        tx.commit().await?;

        let notification = match &change {
            QuantityChange::Reduced { refund_amount, .. } => {
                tracing::info!(
                    reservation_id = %reservation.id,
                    previous_quantity,
                    new_quantity = reservation.quantity,
                    refund_amount = refund_amount.minor(),
                    consumed = event.consumed_count,
                    "Quantity reduced"
                );
                BookingEvent::QuantityChanged {
                    reservation_id: reservation.id,
                    user_id: reservation.user_id.clone(),
                    previous_quantity,
                    new_quantity: reservation.quantity,
                    refund_amount: *refund_amount,
                    occurred_at: now,
                }
            }
            QuantityChange::CheckoutRequired {
                amount, session_id, ..
            } => {
                tracing::info!(
                    reservation_id = %reservation.id,
                    current_quantity = previous_quantity,
                    requested_quantity = cmd.quantity,
                    amount = amount.minor(),
                    session_id = %session_id,
                    "Quantity increase awaiting payment"
                );
                BookingEvent::QuantityIncreaseRequested {
                    reservation_id: reservation.id,
                    user_id: reservation.user_id.clone(),
                    current_quantity: previous_quantity,
                    requested_quantity: cmd.quantity,
                    amount: *amount,
                    occurred_at: now,
                }
            }
        };
        publish_committed(self.publisher.as_ref(), vec![notification]).await;

        Ok(UpdateQuantityResult { reservation, change })
    }
}
