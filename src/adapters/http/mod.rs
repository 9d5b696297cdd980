//! HTTP adapters - REST API implementations.
//!
//! Each domain module has its own HTTP adapter for endpoint exposure.

pub mod booking;

// Re-export key types for convenience
pub use booking::booking_router;
pub use booking::BookingAppState;
