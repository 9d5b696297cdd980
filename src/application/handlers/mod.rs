//! Application handlers.
//!
//! Command and query handlers that orchestrate domain operations.

pub mod booking;

pub use booking::{
    // Commands
    BookingTarget,
    CancelReservationCommand,
    CancelReservationHandler,
    CancelReservationResult,
    CancelWithRefundCommand,
    CancelWithRefundHandler,
    CancelWithRefundResult,
    ConfirmPaymentCommand,
    ConfirmPaymentHandler,
    ConfirmPaymentResult,
    ConfirmQuantityIncreaseCommand,
    ConfirmQuantityIncreaseHandler,
    ConfirmQuantityIncreaseResult,
    CreateReservationCommand,
    CreateReservationHandler,
    CreateReservationResult,
    QuantityChange,
    ReleaseAbandonedCommand,
    ReleaseAbandonedHandler,
    ReleaseAbandonedResult,
    ReviewRefundCommand,
    ReviewRefundHandler,
    ReviewRefundResult,
    UpdateQuantityCommand,
    UpdateQuantityHandler,
    UpdateQuantityResult,
    // Queries
    GetReservationHandler,
    GetReservationQuery,
    GetReservationResult,
    // Shared
    CheckoutUrls,
    RefundPolicies,
};
