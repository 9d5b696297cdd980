//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (value objects, IDs, money, errors)
//! - `booking` - Reservations, capacity pools, refund policy and refund records

pub mod booking;
pub mod foundation;
