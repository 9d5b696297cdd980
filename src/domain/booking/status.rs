//! Reservation, payment and refund status state machines.

use crate::domain::foundation::StateMachine;
use serde::{Deserialize, Serialize};

/// Lifecycle status of a reservation, independent of payment.
///
/// A freshly submitted booking is `Active` with payment `Pending`; it only
/// consumes inventory once payment is `Paid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    /// Scheduled appointment or registered ticket holder.
    #[serde(alias = "scheduled", alias = "registered")]
    Active,

    /// Cancelled by the owner (with or without refund) or abandoned.
    Cancelled,

    /// Attended; set by schedule-side processes.
    Completed,

    /// Not attended; set by schedule-side processes.
    Missed,
}

impl StateMachine for ReservationStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use ReservationStatus::*;
        matches!(
            (self, target),
            (Active, Cancelled) | (Active, Completed) | (Active, Missed)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use ReservationStatus::*;
        match self {
            Active => vec![Cancelled, Completed, Missed],
            Cancelled | Completed | Missed => vec![],
        }
    }
}

/// Payment state of the reservation's initial checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
}

impl StateMachine for PaymentStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use PaymentStatus::*;
        matches!((self, target), (Pending, Paid) | (Pending, Failed))
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use PaymentStatus::*;
        match self {
            Pending => vec![Paid, Failed],
            Paid | Failed => vec![],
        }
    }
}

/// Refund state mirrored inline on the reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefundStatus {
    #[default]
    None,
    Pending,
    Completed,
    Failed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_can_be_cancelled() {
        assert_eq!(
            ReservationStatus::Active.transition_to(ReservationStatus::Cancelled),
            Ok(ReservationStatus::Cancelled)
        );
    }

    #[test]
    fn cancelled_is_terminal() {
        assert!(ReservationStatus::Cancelled.is_terminal());
        assert!(ReservationStatus::Cancelled
            .transition_to(ReservationStatus::Active)
            .is_err());
    }

    #[test]
    fn completed_and_missed_are_terminal() {
        assert!(ReservationStatus::Completed.is_terminal());
        assert!(ReservationStatus::Missed.is_terminal());
    }

    #[test]
    fn payment_cannot_go_back_to_pending() {
        assert!(PaymentStatus::Paid
            .transition_to(PaymentStatus::Pending)
            .is_err());
        assert!(PaymentStatus::Pending.can_transition_to(&PaymentStatus::Paid));
    }

    #[test]
    fn scheduled_alias_deserializes_to_active() {
        let status: ReservationStatus = serde_json::from_str("\"scheduled\"").unwrap();
        assert_eq!(status, ReservationStatus::Active);
    }
}
