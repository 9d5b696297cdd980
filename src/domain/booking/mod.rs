//! Booking domain module.
//!
//! Appointments (one exclusive slot) and event registrations (tickets against a
//! capacity pool), both paid through an external checkout.
//!
//! # Module Structure
//!
//! - `reservation` - Reservation aggregate and pending top-ups
//! - `status` - Reservation, payment and refund status state machines
//! - `resource` - Slot descriptors and resource references
//! - `contact` - Contact snapshot validation
//! - `pool` - Ticketed event capacity
//! - `policy` - Time-based refund policy
//! - `refund` - Refund record and admin review
//! - `errors` - BookingError taxonomy
//! - `events` - Notifications emitted after commit

mod contact;
mod errors;
mod events;
mod policy;
mod pool;
mod refund;
mod reservation;
mod resource;
mod status;

pub use contact::ContactSnapshot;
pub use errors::{BookingError, ConflictKind};
pub use events::BookingEvent;
pub use policy::{RefundMode, RefundPolicy, RefundQuote, RefundTier};
pub use pool::{Event, PoolCheck};
pub use refund::{
    RefundMetadata, RefundReason, RefundRecord, RefundRecordStatus, ReviewDecision,
    MIN_REASON_LENGTH,
};
pub use reservation::{Charge, PendingTopUp, RefundSlice, Reservation};
pub use resource::{ReservationKind, ResourceRef, SlotDescriptor};
pub use status::{PaymentStatus, RefundStatus, ReservationStatus};
