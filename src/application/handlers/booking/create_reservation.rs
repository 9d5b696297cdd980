//! CreateReservationHandler - books a slot or event tickets and opens checkout.

use std::sync::Arc;

use crate::domain::booking::{
    BookingError, BookingEvent, ContactSnapshot, Reservation, ResourceRef, SlotDescriptor,
};
use crate::domain::foundation::{Currency, EventId, Money, ReservationId, Timestamp, UserId};
use crate::ports::{
    BookingUnitOfWork, CheckoutMetadata, CheckoutRequest, EventPublisher, PaymentGateway,
};

use super::inventory_ledger;
use super::support::{publish_committed, CheckoutUrls};

/// What is being booked, as submitted by the client.
#[derive(Debug, Clone)]
pub enum BookingTarget {
    /// One exclusive slot. The fee is quoted by the provider's calendar.
    Appointment {
        provider_id: String,
        date: String,
        time: String,
        fee: i64,
        currency: String,
    },

    /// Tickets against a capacity-limited event priced by the event.
    Registration { event_id: EventId, quantity: u32 },
}

/// Command to create a reservation.
#[derive(Debug, Clone)]
pub struct CreateReservationCommand {
    pub user_id: UserId,
    pub target: BookingTarget,
    pub contact_name: String,
    pub contact_email: String,
    pub contact_phone: String,
}

/// Result of a successful reservation: persisted `active/pending` with an open checkout.
#[derive(Debug, Clone)]
pub struct CreateReservationResult {
    pub reservation: Reservation,
    pub checkout_url: String,
    pub checkout_expires_at: Timestamp,
}

/// Handler for creating reservations.
///
/// The reservation is inserted, a checkout session opened for
/// `unit_price × quantity` and its id attached, all in one transaction. A slot
/// conflict or gateway failure leaves nothing behind.
pub struct CreateReservationHandler {
    uow: Arc<dyn BookingUnitOfWork>,
    gateway: Arc<dyn PaymentGateway>,
    publisher: Arc<dyn EventPublisher>,
    urls: CheckoutUrls,
}

impl CreateReservationHandler {
    pub fn new(
        uow: Arc<dyn BookingUnitOfWork>,
        gateway: Arc<dyn PaymentGateway>,
        publisher: Arc<dyn EventPublisher>,
        urls: CheckoutUrls,
    ) -> Self {
        Self {
            uow,
            gateway,
            publisher,
            urls,
        }
    }

    pub async fn handle(
        &self,
        cmd: CreateReservationCommand,
    ) -> Result<CreateReservationResult, BookingError> {
        let now = Timestamp::now();
        let contact = ContactSnapshot::new(cmd.contact_name, cmd.contact_email, cmd.contact_phone)?;
        let reservation_id = ReservationId::new();

        let mut tx = self.uow.begin().await?;

        let (mut reservation, description) = match cmd.target {
            BookingTarget::Appointment {
                provider_id,
                date,
                time,
                fee,
                currency,
            } => {
                let slot = SlotDescriptor::parse(&provider_id, &date, &time)?;
                let starts_at = slot.starts_at();
                if !starts_at.is_after(&now) {
                    return Err(BookingError::validation("date", "slot is in the past"));
                }
                let description = format!("Appointment {}", slot);
                let reservation = Reservation::create(
                    reservation_id,
                    cmd.user_id,
                    ResourceRef::Slot(slot),
                    contact,
                    starts_at,
                    Money::from_minor(fee).map_err(|_| {
                        BookingError::validation(
                            "fee",
                            format!("must be between 1 and {} minor units", Money::MAX_MINOR),
                        )
                    })?,
                    Currency::new(currency)?,
                    1,
                    now,
                )?;
                (reservation, description)
            }
            BookingTarget::Registration { event_id, quantity } => {
                let event = inventory_ledger::lock_event(tx.as_mut(), &event_id).await?;
                if event.has_started(&now) {
                    return Err(BookingError::invalid_state("Event has already started"));
                }
                let reservation = Reservation::create(
                    reservation_id,
                    cmd.user_id,
                    ResourceRef::Event { event_id },
                    contact,
                    event.starts_at,
                    event.unit_price,
                    event.currency.clone(),
                    quantity,
                    now,
                )?;
                inventory_ledger::ensure_capacity(&event, quantity, 0)?;
                (reservation, format!("{} x{}", event.title, quantity))
            }
        };

        if let Err(e) = tx.insert_reservation(&reservation).await {
            let err = BookingError::from(e);
            tracing::warn!(
                user_id = %reservation.user_id,
                resource = ?reservation.resource,
                error = %err,
                "Reservation insert rejected"
            );
            return Err(err);
        }

        let amount = reservation.expected_amount()?;
        let session = self
            .gateway
            .open_checkout(CheckoutRequest {
                amount,
                currency: reservation.currency.clone(),
                line_item_description: description,
                success_url: self.urls.success_url(&reservation.id),
                cancel_url: self.urls.cancel_url(&reservation.id),
                metadata: CheckoutMetadata {
                    reservation_id: reservation.id,
                    user_id: reservation.user_id.clone(),
                    event_id: reservation.resource.event_id(),
                    quantity: reservation.quantity,
                    target_quantity: None,
                },
            })
            .await
            .map_err(|e| {
                tracing::error!(reservation_id = %reservation.id, error = %e, "Checkout could not be opened");
                BookingError::from(e)
            })?;

        reservation.attach_checkout(session.id.clone(), now);
        tx.update_reservation(&reservation).await?;
        tx.commit().await?;

        tracing::info!(
            reservation_id = %reservation.id,
            user_id = %reservation.user_id,
            kind = %reservation.kind(),
            quantity = reservation.quantity,
            amount = amount.minor(),
            session_id = %session.id,
            "Reservation created"
        );

        publish_committed(
            self.publisher.as_ref(),
            vec![BookingEvent::ReservationCreated {
                reservation_id: reservation.id,
                user_id: reservation.user_id.clone(),
                kind: reservation.kind(),
                slot: reservation.resource.slot().cloned(),
                event_id: reservation.resource.event_id(),
                quantity: reservation.quantity,
                amount,
                occurred_at: now,
            }],
        )
        .await;

        Ok(CreateReservationResult {
            reservation,
            checkout_url: session.url,
            checkout_expires_at: session.expires_at,
        })
    }
}
