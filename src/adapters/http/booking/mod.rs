//! HTTP adapter for booking endpoints.
//!
//! Exposes the booking domain via REST API:
//! - `POST /api/reservations/appointments` - Book a slot
//! - `POST /api/reservations/registrations` - Register for an event
//! - `GET /api/reservations/:id` - Read own reservation
//! - `POST /api/reservations/:id/confirm` - Confirm payment
//! - `POST /api/reservations/:id/cancel` - Cancel without refund
//! - `POST /api/reservations/:id/refund` - Cancel with refund
//! - `POST /api/reservations/:id/quantity` - Change quantity
//! - `POST /api/reservations/:id/quantity/confirm` - Confirm a top-up
//! - `POST /api/admin/refunds/:id/review` - Admin refund review

pub mod dto;
pub mod handlers;
pub mod routes;

pub use handlers::{AdminUser, AuthenticatedUser, BookingApiError, BookingAppState};
pub use routes::{admin_routes, booking_router, reservation_routes};
