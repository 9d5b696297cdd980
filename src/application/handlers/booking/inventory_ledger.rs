//! Inventory ledger - the only writer of an event's consumed count.
//!
//! The count is never incremented or decremented. It is re-aggregated from
//! active, paid registrations inside the caller's transaction after every
//! change, with the event row locked so concurrent recounts serialize.

use crate::domain::booking::{BookingError, ConflictKind, Event, PoolCheck};
use crate::domain::foundation::EventId;
use crate::ports::BookingTx;

/// Loads and locks an event.
pub async fn lock_event(tx: &mut dyn BookingTx, event_id: &EventId) -> Result<Event, BookingError> {
    tx.find_event_for_update(event_id)
        .await?
        .ok_or_else(|| BookingError::not_found("Event"))
}

/// Rejects a request for `requested` tickets when the pool cannot hold it.
/// `own_prior` is what the requester already holds.
pub fn ensure_capacity(event: &Event, requested: u32, own_prior: u32) -> Result<(), BookingError> {
    match event.check_capacity(requested, own_prior) {
        PoolCheck::Fits => Ok(()),
        PoolCheck::Insufficient {
            requested,
            available,
        } => {
            tracing::warn!(
                event_id = %event.id,
                requested,
                available,
                "Insufficient capacity"
            );
            Err(BookingError::conflict(
                ConflictKind::InsufficientCapacity,
                format!(
                    "Only {} ticket(s) available, {} requested",
                    available, requested
                ),
            ))
        }
    }
}

/// Re-aggregates the consumed count of `event_id` and stores it.
///
/// A total above capacity means stored state is corrupt; the transaction is
/// aborted with an invariant violation.
pub async fn recompute(tx: &mut dyn BookingTx, event_id: &EventId) -> Result<Event, BookingError> {
    let mut event = lock_event(tx, event_id).await?;
    let total = tx.sum_active_paid_quantity(event_id).await?;
    let total = u32::try_from(total).map_err(|_| {
        tracing::error!(event_id = %event_id, total, "Consumed count overflow");
        BookingError::invariant(format!("consumed count {} overflows", total))
    })?;

    if let Err(total) = event.apply_recount(total) {
        tracing::error!(
            event_id = %event_id,
            consumed = total,
            capacity = event.capacity,
            "Consumed count exceeds capacity"
        );
        return Err(BookingError::invariant(format!(
            "consumed {} exceeds capacity {} for event {}",
            total, event.capacity, event_id
        )));
    }

    tx.set_consumed_count(event_id, event.consumed_count).await?;
    tracing::debug!(
        event_id = %event_id,
        consumed = event.consumed_count,
        capacity = event.capacity,
        "Pool recomputed"
    );
    Ok(event)
}
