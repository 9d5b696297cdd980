//! Reservation aggregate.
//!
//! A reservation is created `active/pending` when the user submits the form,
//! becomes `active/paid` once the gateway confirms the checkout, and ends
//! `cancelled` (with or without refund) or in a schedule-side terminal status.
//!
//! # Design Decisions
//!
//! - **Paid drives inventory**: only `active` + `paid` reservations consume a pool
//! - **Snapshots**: contact details, start time and unit price are copied at creation
//! - **Top-ups are nested**: a quantity increase waits in `pending_top_up`
//!   without touching the committed quantity until its own payment is confirmed
//! - **Refunds follow charges**: every paid checkout is kept as a [`Charge`] and
//!   a refund is split across them, newest first, never exceeding what a charge
//!   has left

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{
    Currency, DomainError, ErrorCode, Money, ReservationId, StateMachine, Timestamp, UserId,
    ValidationError,
};

use super::{
    ContactSnapshot, PaymentStatus, RefundStatus, ReservationKind, ReservationStatus, ResourceRef,
};

/// An outstanding quantity increase awaiting its own checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingTopUp {
    /// Checkout session opened for the delta.
    pub session_id: String,
    pub new_quantity: u32,
    /// `delta × unit_price`.
    pub amount: Money,
    pub expires_at: Timestamp,
}

impl PendingTopUp {
    pub fn is_expired(&self, now: &Timestamp) -> bool {
        !self.expires_at.is_after(now)
    }
}

/// A payment collected for a reservation: the initial checkout or a paid top-up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Charge {
    pub payment_reference: String,
    pub amount: Money,
    pub refunded: Money,
    pub paid_at: Timestamp,
}

impl Charge {
    pub fn refundable(&self) -> Money {
        self.amount.saturating_sub(self.refunded)
    }
}

/// The part of a refund sent to the gateway against one charge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefundSlice {
    pub payment_reference: String,
    pub amount: Money,
}

/// Reservation aggregate.
///
/// # Invariants
///
/// - `quantity >= 1`; appointments always hold exactly one unit
/// - `payment_reference` is set iff `payment_status == Paid`, and names the first charge
/// - every charge's `refunded <= amount`
/// - `pending_top_up` only exists on active, paid reservations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: ReservationId,
    pub user_id: UserId,
    pub resource: ResourceRef,
    pub contact: ContactSnapshot,
    /// Start of the slot or event, snapshotted for refund policy.
    pub starts_at: Timestamp,
    pub unit_price: Money,
    pub currency: Currency,
    pub quantity: u32,
    pub original_quantity: u32,
    pub status: ReservationStatus,
    pub payment_status: PaymentStatus,
    pub checkout_session_id: Option<String>,
    pub payment_reference: Option<String>,
    #[serde(default)]
    pub charges: Vec<Charge>,
    pub pending_top_up: Option<PendingTopUp>,
    pub refund_status: RefundStatus,
    pub refund_amount: Money,
    pub refunded_at: Option<Timestamp>,
    pub cancellation_reason: Option<String>,
    pub created_at: Timestamp,
    pub paid_at: Option<Timestamp>,
    pub cancelled_at: Option<Timestamp>,
    pub updated_at: Timestamp,
}

impl Reservation {
    /// Creates a new `active/pending` reservation.
    ///
    /// # Errors
    ///
    /// Validation error when the quantity or price is unusable.
    #[allow(clippy::too_many_arguments)]
    pub fn create(
        id: ReservationId,
        user_id: UserId,
        resource: ResourceRef,
        contact: ContactSnapshot,
        starts_at: Timestamp,
        unit_price: Money,
        currency: Currency,
        quantity: u32,
        now: Timestamp,
    ) -> Result<Self, ValidationError> {
        if quantity == 0 {
            return Err(ValidationError::out_of_range("quantity", 1, i64::from(u32::MAX), 0));
        }
        if resource.kind() == ReservationKind::Appointment && quantity != 1 {
            return Err(ValidationError::out_of_range("quantity", 1, 1, i64::from(quantity)));
        }
        if unit_price.is_zero() {
            return Err(ValidationError::invalid_format("fee", "must be a positive amount"));
        }
        unit_price.times(quantity)?;

        Ok(Self {
            id,
            user_id,
            resource,
            contact,
            starts_at,
            unit_price,
            currency,
            quantity,
            original_quantity: quantity,
            status: ReservationStatus::Active,
            payment_status: PaymentStatus::Pending,
            checkout_session_id: None,
            payment_reference: None,
            charges: Vec::new(),
            pending_top_up: None,
            refund_status: RefundStatus::None,
            refund_amount: Money::ZERO,
            refunded_at: None,
            cancellation_reason: None,
            created_at: now,
            paid_at: None,
            cancelled_at: None,
            updated_at: now,
        })
    }

    pub fn kind(&self) -> ReservationKind {
        self.resource.kind()
    }

    pub fn is_owned_by(&self, user_id: &UserId) -> bool {
        &self.user_id == user_id
    }

    /// True when this reservation consumes inventory.
    pub fn is_active_paid(&self) -> bool {
        self.status == ReservationStatus::Active && self.payment_status == PaymentStatus::Paid
    }

    pub fn is_paid(&self) -> bool {
        self.payment_status == PaymentStatus::Paid
    }

    /// Amount the gateway must report for the committed quantity.
    pub fn expected_amount(&self) -> Result<Money, ValidationError> {
        self.unit_price.times(self.quantity)
    }

    /// True once the slot or event start is not in the future.
    pub fn has_started(&self, now: &Timestamp) -> bool {
        !self.starts_at.is_after(now)
    }

    pub fn attach_checkout(&mut self, session_id: impl Into<String>, now: Timestamp) {
        self.checkout_session_id = Some(session_id.into());
        self.updated_at = now;
    }

    /// Marks the initial checkout as paid and records it as the first charge.
    pub fn confirm_payment(
        &mut self,
        payment_reference: impl Into<String>,
        now: Timestamp,
    ) -> Result<(), DomainError> {
        if self.status != ReservationStatus::Active {
            return Err(invalid_state(format!(
                "Cannot confirm payment for a {:?} reservation",
                self.status
            )));
        }
        let amount = self.expected_amount()?;
        self.payment_status = self
            .payment_status
            .transition_to(PaymentStatus::Paid)
            .map_err(|e| invalid_state(e.to_string()))?;
        let payment_reference = payment_reference.into();
        self.charges.push(Charge {
            payment_reference: payment_reference.clone(),
            amount,
            refunded: Money::ZERO,
            paid_at: now,
        });
        self.payment_reference = Some(payment_reference);
        self.paid_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Cancels an active reservation. Any outstanding top-up is dropped.
    pub fn cancel(&mut self, reason: Option<String>, now: Timestamp) -> Result<(), DomainError> {
        self.status = self
            .status
            .transition_to(ReservationStatus::Cancelled)
            .map_err(|_| invalid_state(format!("Cannot cancel a {:?} reservation", self.status)))?;
        self.cancellation_reason = reason;
        self.pending_top_up = None;
        self.cancelled_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Records a refund that is awaiting admin review.
    pub fn mark_refund_pending(&mut self, amount: Money, now: Timestamp) {
        self.refund_status = RefundStatus::Pending;
        self.refund_amount = amount;
        self.updated_at = now;
    }

    /// Records money returned to the payer. Amounts accumulate across partial refunds.
    pub fn mark_refund_completed(&mut self, amount: Money, now: Timestamp) {
        if self.refund_status == RefundStatus::Pending {
            // Reviewed refund: the pending amount is the one being paid out.
            self.refund_amount = amount;
        } else {
            self.refund_amount = self.refund_amount.saturating_add(amount);
        }
        self.refund_status = RefundStatus::Completed;
        self.refunded_at = Some(now);
        self.updated_at = now;
    }

    pub fn mark_refund_failed(&mut self, now: Timestamp) {
        self.refund_status = RefundStatus::Failed;
        self.updated_at = now;
    }

    /// Drops a top-up whose checkout session has expired. Returns whether anything changed.
    pub fn clear_expired_top_up(&mut self, now: &Timestamp) -> bool {
        match &self.pending_top_up {
            Some(top_up) if top_up.is_expired(now) => {
                self.pending_top_up = None;
                self.updated_at = *now;
                true
            }
            _ => false,
        }
    }

    /// Guards shared by both directions of a quantity change.
    pub fn ensure_quantity_change_allowed(&self, new_quantity: u32) -> Result<(), DomainError> {
        if self.kind() != ReservationKind::Registration {
            return Err(DomainError::new(
                ErrorCode::ValidationFailed,
                "Only event registrations support quantity changes",
            ));
        }
        if new_quantity == 0 {
            return Err(DomainError::from(ValidationError::out_of_range(
                "quantity",
                1,
                i64::from(u32::MAX),
                0,
            )));
        }
        if new_quantity == self.quantity {
            return Err(DomainError::from(ValidationError::invalid_format(
                "quantity",
                "new quantity equals current quantity",
            )));
        }
        if !self.is_active_paid() {
            return Err(invalid_state("Quantity changes require an active, paid reservation"));
        }
        Ok(())
    }

    /// Stores an outstanding top-up; the committed quantity is unchanged.
    pub fn begin_top_up(&mut self, top_up: PendingTopUp, now: Timestamp) -> Result<(), DomainError> {
        if top_up.new_quantity <= self.quantity {
            return Err(DomainError::from(ValidationError::invalid_format(
                "quantity",
                "top-up must increase the quantity",
            )));
        }
        self.pending_top_up = Some(top_up);
        self.updated_at = now;
        Ok(())
    }

    /// Commits a paid top-up's quantity, records its charge and clears it.
    pub fn complete_top_up(
        &mut self,
        payment_reference: impl Into<String>,
        now: Timestamp,
    ) -> Result<u32, DomainError> {
        let top_up = self
            .pending_top_up
            .take()
            .ok_or_else(|| invalid_state("No quantity increase is outstanding"))?;
        self.charges.push(Charge {
            payment_reference: payment_reference.into(),
            amount: top_up.amount,
            refunded: Money::ZERO,
            paid_at: now,
        });
        self.quantity = top_up.new_quantity;
        self.updated_at = now;
        Ok(self.quantity)
    }

    /// Total still refundable across all charges.
    pub fn refundable_amount(&self) -> Money {
        self.charges
            .iter()
            .fold(Money::ZERO, |total, charge| total.saturating_add(charge.refundable()))
    }

    /// Splits `amount` across the charges, newest first, so no slice exceeds
    /// what its charge has left.
    ///
    /// # Errors
    ///
    /// `InternalError` when the charges cannot cover `amount`.
    pub fn plan_refund(&self, amount: Money) -> Result<Vec<RefundSlice>, DomainError> {
        let mut remaining = amount;
        let mut slices = Vec::new();
        for charge in self.charges.iter().rev() {
            if remaining.is_zero() {
                break;
            }
            let slice = remaining.min(charge.refundable());
            if slice.is_zero() {
                continue;
            }
            slices.push(RefundSlice {
                payment_reference: charge.payment_reference.clone(),
                amount: slice,
            });
            remaining = remaining.saturating_sub(slice);
        }
        if !remaining.is_zero() {
            return Err(DomainError::new(
                ErrorCode::InternalError,
                format!(
                    "refund of {} exceeds the {} left on reservation {}",
                    amount,
                    self.refundable_amount(),
                    self.id
                ),
            ));
        }
        Ok(slices)
    }

    /// Books a refund the gateway paid out against its charge.
    pub fn record_refund_slice(&mut self, slice: &RefundSlice) -> Result<(), DomainError> {
        let charge = self
            .charges
            .iter_mut()
            .find(|c| c.payment_reference == slice.payment_reference)
            .ok_or_else(|| {
                DomainError::new(
                    ErrorCode::InternalError,
                    format!("no charge {} on reservation", slice.payment_reference),
                )
            })?;
        if slice.amount > charge.refundable() {
            return Err(DomainError::new(
                ErrorCode::InternalError,
                format!(
                    "refund of {} exceeds the {} left on charge {}",
                    slice.amount,
                    charge.refundable(),
                    charge.payment_reference
                ),
            ));
        }
        charge.refunded = charge.refunded.saturating_add(slice.amount);
        Ok(())
    }

    /// Lowers the committed quantity after the removed units were refunded.
    pub fn reduce_quantity(&mut self, new_quantity: u32, now: Timestamp) -> Result<(), DomainError> {
        if new_quantity == 0 || new_quantity >= self.quantity {
            return Err(DomainError::from(ValidationError::out_of_range(
                "quantity",
                1,
                i64::from(self.quantity.saturating_sub(1)),
                i64::from(new_quantity),
            )));
        }
        self.quantity = new_quantity;
        self.updated_at = now;
        Ok(())
    }
}

fn invalid_state(message: impl Into<String>) -> DomainError {
    DomainError::new(ErrorCode::InvalidStateTransition, message)
}
