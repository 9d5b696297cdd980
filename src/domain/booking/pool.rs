//! Ticketed event: a capacity pool consumed by paid registrations.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{Currency, EventId, Money, Timestamp};

/// A ticketed event with fixed capacity.
///
/// # Invariants
///
/// - `consumed_count` equals the summed quantity of active, paid registrations
/// - `consumed_count <= capacity`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub title: String,
    pub capacity: u32,
    pub consumed_count: u32,
    pub starts_at: Timestamp,
    pub unit_price: Money,
    pub currency: Currency,
}

/// Why a pool cannot accept a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolCheck {
    Fits,
    Insufficient { requested: u32, available: u32 },
}

impl Event {
    /// Tickets not yet consumed by paid registrations.
    pub fn remaining(&self) -> u32 {
        self.capacity.saturating_sub(self.consumed_count)
    }

    /// Checks whether `requested` tickets fit, counting `own_prior` tickets
    /// already held by the requester as available to them.
    pub fn check_capacity(&self, requested: u32, own_prior: u32) -> PoolCheck {
        let available = self.remaining().saturating_add(own_prior);
        if requested <= available {
            PoolCheck::Fits
        } else {
            PoolCheck::Insufficient {
                requested,
                available,
            }
        }
    }

    /// Stores a freshly aggregated consumed count.
    ///
    /// Returns the rejected total when it exceeds capacity; the caller treats
    /// that as corrupted state.
    pub fn apply_recount(&mut self, total: u32) -> Result<(), u32> {
        if total > self.capacity {
            return Err(total);
        }
        self.consumed_count = total;
        Ok(())
    }

    pub fn has_started(&self, now: &Timestamp) -> bool {
        !self.starts_at.is_after(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(capacity: u32, consumed: u32) -> Event {
        Event {
            id: EventId::new(),
            title: "Workshop".to_string(),
            capacity,
            consumed_count: consumed,
            starts_at: Timestamp::now().add_days(10),
            unit_price: Money::from_minor(2_500).unwrap(),
            currency: Currency::new("usd").unwrap(),
        }
    }

    #[test]
    fn remaining_is_capacity_minus_consumed() {
        assert_eq!(event(10, 6).remaining(), 4);
    }

    #[test]
    fn request_larger_than_remaining_is_insufficient() {
        assert_eq!(
            event(10, 6).check_capacity(5, 0),
            PoolCheck::Insufficient {
                requested: 5,
                available: 4
            }
        );
    }

    #[test]
    fn own_prior_quantity_counts_as_available() {
        assert_eq!(event(10, 10).check_capacity(3, 2), PoolCheck::Insufficient { requested: 3, available: 2 });
        assert_eq!(event(10, 9).check_capacity(3, 2), PoolCheck::Fits);
    }

    #[test]
    fn recount_above_capacity_is_rejected() {
        let mut pool = event(10, 0);
        assert_eq!(pool.apply_recount(11), Err(11));
        assert_eq!(pool.consumed_count, 0);
        assert!(pool.apply_recount(10).is_ok());
        assert_eq!(pool.consumed_count, 10);
    }

    #[test]
    fn has_started_compares_with_now() {
        let mut pool = event(10, 0);
        let now = Timestamp::now();
        assert!(!pool.has_started(&now));
        pool.starts_at = now.add_days(-1);
        assert!(pool.has_started(&now));
    }
}
