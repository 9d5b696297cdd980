//! Booking Core - Paid Appointments and Event Registrations
//!
//! This crate reserves exclusive appointment slots and tickets against
//! capacity-limited events, collects payment through a hosted checkout,
//! and refunds cancellations according to a time-based policy.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
