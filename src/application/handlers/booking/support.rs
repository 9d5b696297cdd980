//! Pieces shared by the booking handlers.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::booking::{BookingError, BookingEvent, RefundPolicy, Reservation, ReservationKind};
use crate::domain::foundation::{Money, ReservationId, SerializableDomainEvent, Timestamp, UserId};
use crate::ports::{BookingTx, EventPublisher, PaymentGateway};

/// Longest session handle accepted from a client.
pub const MAX_SESSION_HANDLE_LENGTH: usize = 255;

static SESSION_HANDLE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_\-]+$").expect("session handle pattern compiles"));

/// Rejects session handles that cannot have come from the gateway.
pub fn validate_session_handle(handle: &str) -> Result<(), BookingError> {
    if handle.is_empty() {
        return Err(BookingError::validation("session_id", "session id is required"));
    }
    if handle.len() > MAX_SESSION_HANDLE_LENGTH {
        return Err(BookingError::validation(
            "session_id",
            format!("session id exceeds {} characters", MAX_SESSION_HANDLE_LENGTH),
        ));
    }
    if !SESSION_HANDLE_PATTERN.is_match(handle) {
        return Err(BookingError::validation(
            "session_id",
            "session id contains invalid characters",
        ));
    }
    Ok(())
}

/// Return URLs handed to the gateway's hosted checkout.
///
/// `{reservation_id}` in either template is replaced with the reservation id.
#[derive(Debug, Clone)]
pub struct CheckoutUrls {
    success_template: String,
    cancel_template: String,
}

impl CheckoutUrls {
    pub fn new(success_template: impl Into<String>, cancel_template: impl Into<String>) -> Self {
        Self {
            success_template: success_template.into(),
            cancel_template: cancel_template.into(),
        }
    }

    pub fn success_url(&self, reservation_id: &ReservationId) -> String {
        render(&self.success_template, reservation_id)
    }

    pub fn cancel_url(&self, reservation_id: &ReservationId) -> String {
        render(&self.cancel_template, reservation_id)
    }
}

fn render(template: &str, reservation_id: &ReservationId) -> String {
    template.replace("{reservation_id}", &reservation_id.to_string())
}

/// Refund policy per reservation kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefundPolicies {
    pub appointment: RefundPolicy,
    pub registration: RefundPolicy,
}

impl RefundPolicies {
    pub fn for_kind(&self, kind: ReservationKind) -> &RefundPolicy {
        match kind {
            ReservationKind::Appointment => &self.appointment,
            ReservationKind::Registration => &self.registration,
        }
    }
}

impl Default for RefundPolicies {
    fn default() -> Self {
        Self {
            appointment: RefundPolicy::default_appointment(),
            registration: RefundPolicy::default_registration(),
        }
    }
}

/// Loads a reservation for update, hiding reservations the caller does not own.
pub async fn load_owned(
    tx: &mut dyn BookingTx,
    reservation_id: &ReservationId,
    user_id: &UserId,
) -> Result<Reservation, BookingError> {
    match tx.find_reservation_for_update(reservation_id).await? {
        Some(reservation) if reservation.is_owned_by(user_id) => Ok(reservation),
        _ => Err(BookingError::not_found("Reservation")),
    }
}

/// Pays `amount` back across the reservation's charges and books each slice.
///
/// Returns the gateway refund references, newest charge first. Zero amounts
/// never reach the gateway. A failure part-way leaves earlier slices paid out
/// at the gateway; they are logged so the caller's rollback can be reconciled.
pub async fn refund_charges(
    gateway: &dyn PaymentGateway,
    reservation: &mut Reservation,
    amount: Money,
) -> Result<Vec<String>, BookingError> {
    if amount.is_zero() {
        return Ok(Vec::new());
    }
    let slices = reservation.plan_refund(amount)?;
    let mut references = Vec::with_capacity(slices.len());
    for slice in &slices {
        match gateway.refund(&slice.payment_reference, slice.amount).await {
            Ok(reference) => {
                reservation.record_refund_slice(slice)?;
                references.push(reference);
            }
            Err(e) => {
                tracing::error!(
                    reservation_id = %reservation.id,
                    payment_reference = %slice.payment_reference,
                    amount = slice.amount.minor(),
                    already_refunded = ?references,
                    error = %e,
                    "Gateway refund failed"
                );
                return Err(BookingError::from(e));
            }
        }
    }
    Ok(references)
}

/// Tells operators about a payment that needs manual follow-up.
pub fn flag_for_operator(reservation: &Reservation, reason: &str, now: Timestamp) -> BookingEvent {
    tracing::error!(reservation_id = %reservation.id, reason, "Operator action required");
    BookingEvent::OperatorAttentionRequired {
        reservation_id: reservation.id,
        user_id: reservation.user_id.clone(),
        reason: reason.to_string(),
        occurred_at: now,
    }
}

/// Hands committed notifications to the emitter. Failures are logged only:
/// the booking change is already durable.
pub async fn publish_committed(publisher: &dyn EventPublisher, events: Vec<BookingEvent>) {
    for event in events {
        let envelope = event.to_envelope().with_user_id(event.actor().as_str());
        let event_type = envelope.event_type.clone();
        if let Err(e) = publisher.publish(envelope).await {
            tracing::warn!(
                event_type = %event_type,
                reservation_id = %event.reservation_id(),
                error = %e,
                "Failed to emit booking notification"
            );
        }
    }
}
