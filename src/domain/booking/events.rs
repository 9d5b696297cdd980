//! Booking notifications.
//!
//! Emitted after the owning transaction commits and handed to the notification
//! emitter, which delivers them out of band. Delivery failures never undo the
//! booking change.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{
    DomainEvent, EventId, Money, RefundId, ReservationId, Timestamp, UserId,
};

use super::{RefundRecordStatus, ReservationKind, ReviewDecision, SlotDescriptor};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BookingEvent {
    /// Reservation submitted, checkout opened.
    ReservationCreated {
        reservation_id: ReservationId,
        user_id: UserId,
        kind: ReservationKind,
        slot: Option<SlotDescriptor>,
        event_id: Option<EventId>,
        quantity: u32,
        amount: Money,
        occurred_at: Timestamp,
    },

    /// Gateway confirmed the initial checkout.
    ///
    /// State transition: active/pending → active/paid
    PaymentConfirmed {
        reservation_id: ReservationId,
        user_id: UserId,
        quantity: u32,
        amount: Money,
        occurred_at: Timestamp,
    },

    /// Cancelled, with or without a refund.
    ReservationCancelled {
        reservation_id: ReservationId,
        user_id: UserId,
        reason: Option<String>,
        refund_id: Option<RefundId>,
        refund_amount: Money,
        occurred_at: Timestamp,
    },

    /// An admin moved a refund record forward.
    RefundReviewed {
        refund_id: RefundId,
        reservation_id: ReservationId,
        reviewer: UserId,
        decision: ReviewDecision,
        status: RefundRecordStatus,
        occurred_at: Timestamp,
    },

    /// A top-up checkout was opened; the committed quantity is unchanged.
    QuantityIncreaseRequested {
        reservation_id: ReservationId,
        user_id: UserId,
        current_quantity: u32,
        requested_quantity: u32,
        amount: Money,
        occurred_at: Timestamp,
    },

    /// Committed quantity changed (paid top-up or refunded reduction).
    QuantityChanged {
        reservation_id: ReservationId,
        user_id: UserId,
        previous_quantity: u32,
        new_quantity: u32,
        refund_amount: Money,
        occurred_at: Timestamp,
    },

    /// Money moved at the gateway but the booking could not be settled
    /// automatically. Needs a person.
    OperatorAttentionRequired {
        reservation_id: ReservationId,
        user_id: UserId,
        reason: String,
        occurred_at: Timestamp,
    },
}

impl BookingEvent {
    pub fn reservation_id(&self) -> ReservationId {
        match self {
            BookingEvent::ReservationCreated { reservation_id, .. }
            | BookingEvent::PaymentConfirmed { reservation_id, .. }
            | BookingEvent::ReservationCancelled { reservation_id, .. }
            | BookingEvent::RefundReviewed { reservation_id, .. }
            | BookingEvent::QuantityIncreaseRequested { reservation_id, .. }
            | BookingEvent::QuantityChanged { reservation_id, .. }
            | BookingEvent::OperatorAttentionRequired { reservation_id, .. } => *reservation_id,
        }
    }

    /// User the notification is about (the reviewer for admin decisions).
    pub fn actor(&self) -> &UserId {
        match self {
            BookingEvent::ReservationCreated { user_id, .. }
            | BookingEvent::PaymentConfirmed { user_id, .. }
            | BookingEvent::ReservationCancelled { user_id, .. }
            | BookingEvent::QuantityIncreaseRequested { user_id, .. }
            | BookingEvent::QuantityChanged { user_id, .. }
            | BookingEvent::OperatorAttentionRequired { user_id, .. } => user_id,
            BookingEvent::RefundReviewed { reviewer, .. } => reviewer,
        }
    }
}

impl DomainEvent for BookingEvent {
    fn event_type(&self) -> &'static str {
        match self {
            BookingEvent::ReservationCreated { .. } => "reservation.created.v1",
            BookingEvent::PaymentConfirmed { .. } => "reservation.payment_confirmed.v1",
            BookingEvent::ReservationCancelled { .. } => "reservation.cancelled.v1",
            BookingEvent::RefundReviewed { .. } => "refund.reviewed.v1",
            BookingEvent::QuantityIncreaseRequested { .. } => "reservation.quantity_increase_requested.v1",
            BookingEvent::QuantityChanged { .. } => "reservation.quantity_changed.v1",
            BookingEvent::OperatorAttentionRequired { .. } => {
                "reservation.operator_attention_required.v1"
            }
        }
    }

    fn aggregate_id(&self) -> String {
        self.reservation_id().to_string()
    }

    fn aggregate_type(&self) -> &'static str {
        "Reservation"
    }

    fn occurred_at(&self) -> Timestamp {
        match self {
            BookingEvent::ReservationCreated { occurred_at, .. }
            | BookingEvent::PaymentConfirmed { occurred_at, .. }
            | BookingEvent::ReservationCancelled { occurred_at, .. }
            | BookingEvent::RefundReviewed { occurred_at, .. }
            | BookingEvent::QuantityIncreaseRequested { occurred_at, .. }
            | BookingEvent::QuantityChanged { occurred_at, .. }
            | BookingEvent::OperatorAttentionRequired { occurred_at, .. } => *occurred_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::SerializableDomainEvent;

    fn user() -> UserId {
        UserId::new("user-1").unwrap()
    }

    #[test]
    fn payment_confirmed_envelope_carries_reservation() {
        let reservation_id = ReservationId::new();
        let event = BookingEvent::PaymentConfirmed {
            reservation_id,
            user_id: user(),
            quantity: 6,
            amount: Money::from_minor(15_000).unwrap(),
            occurred_at: Timestamp::now(),
        };

        let envelope = event.to_envelope();
        assert_eq!(envelope.event_type, "reservation.payment_confirmed.v1");
        assert_eq!(envelope.aggregate_type, "Reservation");
        assert_eq!(envelope.aggregate_id, reservation_id.to_string());
        assert_eq!(envelope.payload["type"], "payment_confirmed");
        assert_eq!(envelope.payload["quantity"], 6);
    }

    #[test]
    fn refund_reviewed_actor_is_reviewer() {
        let reviewer = UserId::new("admin-1").unwrap();
        let event = BookingEvent::RefundReviewed {
            refund_id: RefundId::new(),
            reservation_id: ReservationId::new(),
            reviewer: reviewer.clone(),
            decision: ReviewDecision::Approve,
            status: RefundRecordStatus::Approved,
            occurred_at: Timestamp::now(),
        };
        assert_eq!(event.actor(), &reviewer);
    }

    #[test]
    fn cancelled_event_type_is_versioned() {
        let event = BookingEvent::ReservationCancelled {
            reservation_id: ReservationId::new(),
            user_id: user(),
            reason: None,
            refund_id: None,
            refund_amount: Money::ZERO,
            occurred_at: Timestamp::now(),
        };
        assert_eq!(event.to_envelope().schema_version, 1);
    }
}
