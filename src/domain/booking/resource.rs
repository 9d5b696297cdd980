//! What a reservation holds: an exclusive slot or tickets against an event.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::{EventId, ProviderId, Timestamp, ValidationError};

/// Kind of reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationKind {
    /// A single exclusive slot on a provider's calendar.
    Appointment,

    /// One or more tickets against a capacity-limited event.
    Registration,
}

impl ReservationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationKind::Appointment => "appointment",
            ReservationKind::Registration => "registration",
        }
    }
}

impl fmt::Display for ReservationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of an exclusive slot: provider, calendar date and start time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlotDescriptor {
    pub provider_id: ProviderId,
    pub date: NaiveDate,
    pub time: NaiveTime,
}

impl SlotDescriptor {
    /// Parses a slot from raw request strings (`YYYY-MM-DD`, `HH:MM`).
    pub fn parse(provider_id: &str, date: &str, time: &str) -> Result<Self, ValidationError> {
        let provider_id = ProviderId::new(provider_id)?;

        let date = date.trim();
        if date.is_empty() {
            return Err(ValidationError::empty_field("date"));
        }
        let date = NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .map_err(|_| ValidationError::invalid_format("date", "expected a real YYYY-MM-DD date"))?;

        let time = time.trim();
        if time.is_empty() {
            return Err(ValidationError::empty_field("time"));
        }
        let time = NaiveTime::parse_from_str(time, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(time, "%H:%M:%S"))
            .map_err(|_| ValidationError::invalid_format("time", "expected HH:MM"))?;

        Ok(Self {
            provider_id,
            date,
            time,
        })
    }

    /// Slot start, interpreted as UTC.
    pub fn starts_at(&self) -> Timestamp {
        Timestamp::from_datetime(NaiveDateTime::new(self.date, self.time).and_utc())
    }
}

impl fmt::Display for SlotDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}",
            self.provider_id,
            self.date.format("%Y-%m-%d"),
            self.time.format("%H:%M")
        )
    }
}

/// Reference to the resource a reservation consumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResourceRef {
    Slot(SlotDescriptor),
    Event { event_id: EventId },
}

impl ResourceRef {
    pub fn kind(&self) -> ReservationKind {
        match self {
            ResourceRef::Slot(_) => ReservationKind::Appointment,
            ResourceRef::Event { .. } => ReservationKind::Registration,
        }
    }

    pub fn slot(&self) -> Option<&SlotDescriptor> {
        match self {
            ResourceRef::Slot(slot) => Some(slot),
            ResourceRef::Event { .. } => None,
        }
    }

    pub fn event_id(&self) -> Option<EventId> {
        match self {
            ResourceRef::Slot(_) => None,
            ResourceRef::Event { event_id } => Some(*event_id),
        }
    }
}
