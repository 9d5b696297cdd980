//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the domain to external systems:
//! - `events` - In-memory notification bus
//! - `http` - Axum REST API
//! - `memory` - In-memory booking store
//! - `postgres` - PostgreSQL booking store and notification outbox
//! - `retry` - Fixed-delay retry policy
//! - `stripe` - Stripe payment gateway and its mock

pub mod events;
pub mod http;
pub mod memory;
pub mod postgres;
pub mod retry;
pub mod stripe;

pub use events::InMemoryEventBus;
pub use memory::InMemoryBookingStore;
pub use postgres::{PgBookingUnitOfWork, PostgresNotificationOutbox};
pub use retry::FixedDelayRetry;
pub use stripe::{MockPaymentGateway, StripePaymentGateway};
