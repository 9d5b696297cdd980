//! Foundation module - Shared domain primitives.
//!
//! Contains value objects, identifiers, money types and error types
//! that form the vocabulary of the booking domain.

mod errors;
mod events;
mod ids;
mod money;
mod state_machine;
mod timestamp;

pub use errors::{DomainError, ErrorCode, ValidationError};
pub use events::{DomainEvent, EventEnvelope, EventMetadata, NotificationId, SerializableDomainEvent};
pub use ids::{EventId, ProviderId, RefundId, ReservationId, UserId};
pub use money::{BasisPoints, Currency, Money, Percentage};
pub use state_machine::StateMachine;
pub use timestamp::Timestamp;
