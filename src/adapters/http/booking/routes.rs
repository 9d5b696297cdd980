//! Axum router configuration for booking endpoints.
//!
//! This module defines the route structure for reservation-related API endpoints
//! and wires them to their corresponding handlers.

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{
    cancel_reservation, cancel_with_refund, confirm_payment, confirm_quantity_increase,
    create_appointment, create_registration, get_reservation, review_refund, update_quantity,
    BookingAppState,
};

/// Create the reservation API router.
///
/// # Routes (require `X-User-Id`)
/// - `POST /appointments` - Book a slot and open checkout
/// - `POST /registrations` - Register for an event and open checkout
/// - `GET /:id` - Read own reservation
/// - `POST /:id/confirm` - Confirm payment of the initial checkout
/// - `POST /:id/cancel` - Cancel without refund
/// - `POST /:id/refund` - Cancel with a policy refund
/// - `POST /:id/quantity` - Change the ticket count
/// - `POST /:id/quantity/confirm` - Commit a paid top-up
pub fn reservation_routes() -> Router<BookingAppState> {
    Router::new()
        .route("/appointments", post(create_appointment))
        .route("/registrations", post(create_registration))
        .route("/:id", get(get_reservation))
        .route("/:id/confirm", post(confirm_payment))
        .route("/:id/cancel", post(cancel_reservation))
        .route("/:id/refund", post(cancel_with_refund))
        .route("/:id/quantity", post(update_quantity))
        .route("/:id/quantity/confirm", post(confirm_quantity_increase))
}

/// Create the admin router.
///
/// # Routes (require `X-User-Role: admin`)
/// - `POST /refunds/:id/review` - Approve, reject or process a refund record
pub fn admin_routes() -> Router<BookingAppState> {
    Router::new().route("/refunds/:id/review", post(review_refund))
}

/// Create the complete booking module router, mounted under `/api`.
///
/// # Example
///
/// ```ignore
/// let app = booking_router().with_state(app_state);
/// ```
pub fn booking_router() -> Router<BookingAppState> {
    Router::new()
        .nest("/api/reservations", reservation_routes())
        .nest("/api/admin", admin_routes())
}
