//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! - `BookingUnitOfWork` / `BookingTx` - Transactional booking persistence
//! - `PaymentGateway` - Hosted checkout, session reads and refunds
//! - `RetryPolicy` - Bounded polling for gateway state
//! - `EventPublisher` - Notification records emitted after commit

mod booking_store;
mod event_publisher;
mod payment_gateway;
mod retry_policy;

pub use booking_store::{BookingTx, BookingUnitOfWork};
pub use event_publisher::EventPublisher;
pub use payment_gateway::{
    CheckoutMetadata, CheckoutRequest, CheckoutSession, PaymentError, PaymentErrorCode,
    PaymentGateway, SessionStatus,
};
pub use retry_policy::{RetryConfig, RetryPolicy};
