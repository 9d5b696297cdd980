//! Booking handlers.
//!
//! Command and query handlers for paid reservations:
//!
//! ## Commands
//! - Creating appointment and registration reservations with a hosted checkout
//! - Confirming the initial payment against the gateway
//! - Cancelling, with or without a policy refund
//! - Admin review of refund records
//! - Changing registration quantity and confirming top-ups
//! - Releasing abandoned checkouts
//!
//! ## Queries
//! - Get reservation details

mod cancel_reservation;
mod cancel_with_refund;
mod confirm_payment;
mod confirm_quantity_increase;
mod create_reservation;
mod get_reservation;
mod inventory_ledger;
mod payment_poll;
mod release_abandoned;
mod review_refund;
mod support;
mod update_quantity;

#[cfg(test)]
pub(crate) mod test_support;

// Commands
pub use cancel_reservation::{
    CancelReservationCommand, CancelReservationHandler, CancelReservationResult,
};
pub use cancel_with_refund::{CancelWithRefundCommand, CancelWithRefundHandler, CancelWithRefundResult};
pub use confirm_payment::{ConfirmPaymentCommand, ConfirmPaymentHandler, ConfirmPaymentResult};
pub use confirm_quantity_increase::{
    ConfirmQuantityIncreaseCommand, ConfirmQuantityIncreaseHandler, ConfirmQuantityIncreaseResult,
};
pub use create_reservation::{
    BookingTarget, CreateReservationCommand, CreateReservationHandler, CreateReservationResult,
};
pub use release_abandoned::{
    ReleaseAbandonedCommand, ReleaseAbandonedHandler, ReleaseAbandonedResult, ABANDONED_REASON,
};
pub use review_refund::{ReviewRefundCommand, ReviewRefundHandler, ReviewRefundResult};
pub use update_quantity::{
    QuantityChange, UpdateQuantityCommand, UpdateQuantityHandler, UpdateQuantityResult,
};

// Queries
pub use get_reservation::{GetReservationHandler, GetReservationQuery, GetReservationResult};

// Shared
pub use support::{validate_session_handle, CheckoutUrls, RefundPolicies, MAX_SESSION_HANDLE_LENGTH};
