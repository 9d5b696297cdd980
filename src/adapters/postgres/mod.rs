//! PostgreSQL adapters - database implementations of the booking ports.
//!
//! - `PgBookingUnitOfWork` - transactional reservation, event and refund storage
//! - `PostgresNotificationOutbox` - persists notifications for later delivery

mod booking_store;
mod notification_outbox;

pub use booking_store::{PgBookingTx, PgBookingUnitOfWork};
pub use notification_outbox::PostgresNotificationOutbox;
