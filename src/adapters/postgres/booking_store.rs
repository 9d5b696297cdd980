//! PostgreSQL implementation of the booking unit of work.
//!
//! Each `PgBookingTx` wraps one database transaction. Row locks are taken
//! with `SELECT ... FOR UPDATE`; the two uniqueness rules are enforced by
//! the `reservations_active_slot_key` partial index and the
//! `refund_records_reservation_id_key` constraint.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::domain::booking::{
    Charge, ContactSnapshot, Event, PaymentStatus, PendingTopUp, RefundMetadata, RefundMode,
    RefundReason, RefundRecord, RefundRecordStatus, RefundStatus, Reservation, ReservationStatus,
    ResourceRef, SlotDescriptor,
};
use crate::domain::foundation::{
    Currency, DomainError, ErrorCode, EventId, Money, ProviderId, RefundId, ReservationId,
    Timestamp, UserId,
};
use crate::ports::{BookingTx, BookingUnitOfWork};

const ACTIVE_SLOT_CONSTRAINT: &str = "reservations_active_slot_key";
const REFUND_PER_RESERVATION_CONSTRAINT: &str = "refund_records_reservation_id_key";

/// Opens booking transactions on a connection pool.
pub struct PgBookingUnitOfWork {
    pool: PgPool,
}

impl PgBookingUnitOfWork {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BookingUnitOfWork for PgBookingUnitOfWork {
    async fn begin(&self) -> Result<Box<dyn BookingTx>, DomainError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DomainError::database(format!("Failed to begin transaction: {}", e)))?;
        Ok(Box::new(PgBookingTx { tx }))
    }
}

/// One open PostgreSQL transaction. Rolled back by sqlx when dropped uncommitted.
pub struct PgBookingTx {
    tx: Transaction<'static, Postgres>,
}

// ════════════════════════════════════════════════════════════════════════════════
// Row Types
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Debug, sqlx::FromRow)]
struct ReservationRow {
    id: Uuid,
    user_id: String,
    kind: String,
    provider_id: Option<String>,
    slot_date: Option<NaiveDate>,
    slot_time: Option<NaiveTime>,
    event_id: Option<Uuid>,
    contact_name: String,
    contact_email: String,
    contact_phone: String,
    starts_at: DateTime<Utc>,
    unit_price: i64,
    currency: String,
    quantity: i32,
    original_quantity: i32,
    status: String,
    payment_status: String,
    checkout_session_id: Option<String>,
    payment_reference: Option<String>,
    /// JSON text of the charge list.
    charges: String,
    top_up_session_id: Option<String>,
    top_up_quantity: Option<i32>,
    top_up_amount: Option<i64>,
    top_up_expires_at: Option<DateTime<Utc>>,
    refund_status: String,
    refund_amount: i64,
    refunded_at: Option<DateTime<Utc>>,
    cancellation_reason: Option<String>,
    created_at: DateTime<Utc>,
    paid_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ReservationRow> for Reservation {
    type Error = DomainError;

    fn try_from(row: ReservationRow) -> Result<Self, Self::Error> {
        let resource = match row.kind.as_str() {
            "appointment" => {
                let (Some(provider), Some(date), Some(time)) =
                    (row.provider_id, row.slot_date, row.slot_time)
                else {
                    return Err(corrupt("appointment row without slot columns"));
                };
                ResourceRef::Slot(SlotDescriptor {
                    provider_id: ProviderId::new(provider).map_err(|e| corrupt(e.to_string()))?,
                    date,
                    time,
                })
            }
            "registration" => ResourceRef::Event {
                event_id: EventId::from_uuid(
                    row.event_id
                        .ok_or_else(|| corrupt("registration row without event_id"))?,
                ),
            },
            other => return Err(corrupt(format!("Invalid kind value: {}", other))),
        };

        let pending_top_up = match (
            row.top_up_session_id,
            row.top_up_quantity,
            row.top_up_amount,
            row.top_up_expires_at,
        ) {
            (Some(session_id), Some(quantity), Some(amount), Some(expires_at)) => Some(PendingTopUp {
                session_id,
                new_quantity: to_u32(quantity)?,
                amount: money(amount)?,
                expires_at: Timestamp::from_datetime(expires_at),
            }),
            _ => None,
        };

        Ok(Reservation {
            id: ReservationId::from_uuid(row.id),
            user_id: UserId::new(row.user_id).map_err(|e| corrupt(e.to_string()))?,
            resource,
            contact: ContactSnapshot {
                name: row.contact_name,
                email: row.contact_email,
                phone: row.contact_phone,
            },
            starts_at: Timestamp::from_datetime(row.starts_at),
            unit_price: money(row.unit_price)?,
            currency: Currency::new(&row.currency).map_err(|e| corrupt(e.to_string()))?,
            quantity: to_u32(row.quantity)?,
            original_quantity: to_u32(row.original_quantity)?,
            status: parse_reservation_status(&row.status)?,
            payment_status: parse_payment_status(&row.payment_status)?,
            checkout_session_id: row.checkout_session_id,
            payment_reference: row.payment_reference,
            charges: decode_charges(&row.charges)?,
            pending_top_up,
            refund_status: parse_refund_status(&row.refund_status)?,
            refund_amount: money(row.refund_amount)?,
            refunded_at: row.refunded_at.map(Timestamp::from_datetime),
            cancellation_reason: row.cancellation_reason,
            created_at: Timestamp::from_datetime(row.created_at),
            paid_at: row.paid_at.map(Timestamp::from_datetime),
            cancelled_at: row.cancelled_at.map(Timestamp::from_datetime),
            updated_at: Timestamp::from_datetime(row.updated_at),
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct EventRow {
    id: Uuid,
    title: String,
    capacity: i32,
    consumed_count: i32,
    starts_at: DateTime<Utc>,
    unit_price: i64,
    currency: String,
}

impl TryFrom<EventRow> for Event {
    type Error = DomainError;

    fn try_from(row: EventRow) -> Result<Self, Self::Error> {
        Ok(Event {
            id: EventId::from_uuid(row.id),
            title: row.title,
            capacity: to_u32(row.capacity)?,
            consumed_count: to_u32(row.consumed_count)?,
            starts_at: Timestamp::from_datetime(row.starts_at),
            unit_price: money(row.unit_price)?,
            currency: Currency::new(&row.currency).map_err(|e| corrupt(e.to_string()))?,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct RefundRow {
    id: Uuid,
    reservation_id: Uuid,
    user_id: String,
    amount: i64,
    processing_fee: i64,
    net_amount: i64,
    currency: String,
    status: String,
    reason: String,
    mode: String,
    requested_by: String,
    requested_at: DateTime<Utc>,
    reviewed_by: Option<String>,
    reviewed_at: Option<DateTime<Utc>>,
    gateway_refund_references: Vec<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<RefundRow> for RefundRecord {
    type Error = DomainError;

    fn try_from(row: RefundRow) -> Result<Self, Self::Error> {
        let reviewed_by = row
            .reviewed_by
            .map(UserId::new)
            .transpose()
            .map_err(|e| corrupt(e.to_string()))?;

        Ok(RefundRecord {
            id: RefundId::from_uuid(row.id),
            reservation_id: ReservationId::from_uuid(row.reservation_id),
            user_id: UserId::new(row.user_id).map_err(|e| corrupt(e.to_string()))?,
            amount: money(row.amount)?,
            processing_fee: money(row.processing_fee)?,
            net_amount: money(row.net_amount)?,
            currency: Currency::new(&row.currency).map_err(|e| corrupt(e.to_string()))?,
            status: parse_refund_record_status(&row.status)?,
            reason: RefundReason::new(row.reason).map_err(|e| corrupt(e.to_string()))?,
            metadata: RefundMetadata {
                requested_by: UserId::new(row.requested_by).map_err(|e| corrupt(e.to_string()))?,
                requested_at: Timestamp::from_datetime(row.requested_at),
                mode: parse_refund_mode(&row.mode)?,
                reviewed_by,
                reviewed_at: row.reviewed_at.map(Timestamp::from_datetime),
                gateway_refund_references: row.gateway_refund_references,
            },
            created_at: Timestamp::from_datetime(row.created_at),
            updated_at: Timestamp::from_datetime(row.updated_at),
        })
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Column Mapping
// ════════════════════════════════════════════════════════════════════════════════

fn corrupt(message: impl Into<String>) -> DomainError {
    DomainError::new(ErrorCode::DatabaseError, message)
}

fn decode_charges(json: &str) -> Result<Vec<Charge>, DomainError> {
    serde_json::from_str(json).map_err(|e| corrupt(format!("Invalid charges: {}", e)))
}

fn encode_charges(charges: &[Charge]) -> Result<String, DomainError> {
    serde_json::to_string(charges)
        .map_err(|e| DomainError::database(format!("Failed to encode charges: {}", e)))
}

fn money(minor: i64) -> Result<Money, DomainError> {
    Money::from_minor(minor).map_err(|e| corrupt(e.to_string()))
}

fn to_u32(value: i32) -> Result<u32, DomainError> {
    u32::try_from(value).map_err(|_| corrupt(format!("Negative count in database: {}", value)))
}

fn to_i32(value: u32) -> Result<i32, DomainError> {
    i32::try_from(value).map_err(|_| corrupt(format!("Count too large for database: {}", value)))
}

fn parse_reservation_status(s: &str) -> Result<ReservationStatus, DomainError> {
    match s {
        "active" => Ok(ReservationStatus::Active),
        "cancelled" => Ok(ReservationStatus::Cancelled),
        "completed" => Ok(ReservationStatus::Completed),
        "missed" => Ok(ReservationStatus::Missed),
        _ => Err(corrupt(format!("Invalid status value: {}", s))),
    }
}

fn reservation_status_to_string(status: ReservationStatus) -> &'static str {
    match status {
        ReservationStatus::Active => "active",
        ReservationStatus::Cancelled => "cancelled",
        ReservationStatus::Completed => "completed",
        ReservationStatus::Missed => "missed",
    }
}

fn parse_payment_status(s: &str) -> Result<PaymentStatus, DomainError> {
    match s {
        "pending" => Ok(PaymentStatus::Pending),
        "paid" => Ok(PaymentStatus::Paid),
        "failed" => Ok(PaymentStatus::Failed),
        _ => Err(corrupt(format!("Invalid payment_status value: {}", s))),
    }
}

fn payment_status_to_string(status: PaymentStatus) -> &'static str {
    match status {
        PaymentStatus::Pending => "pending",
        PaymentStatus::Paid => "paid",
        PaymentStatus::Failed => "failed",
    }
}

fn parse_refund_status(s: &str) -> Result<RefundStatus, DomainError> {
    match s {
        "none" => Ok(RefundStatus::None),
        "pending" => Ok(RefundStatus::Pending),
        "completed" => Ok(RefundStatus::Completed),
        "failed" => Ok(RefundStatus::Failed),
        _ => Err(corrupt(format!("Invalid refund_status value: {}", s))),
    }
}

fn refund_status_to_string(status: RefundStatus) -> &'static str {
    match status {
        RefundStatus::None => "none",
        RefundStatus::Pending => "pending",
        RefundStatus::Completed => "completed",
        RefundStatus::Failed => "failed",
    }
}

fn parse_refund_record_status(s: &str) -> Result<RefundRecordStatus, DomainError> {
    match s {
        "pending" => Ok(RefundRecordStatus::Pending),
        "approved" => Ok(RefundRecordStatus::Approved),
        "rejected" => Ok(RefundRecordStatus::Rejected),
        "processed" => Ok(RefundRecordStatus::Processed),
        _ => Err(corrupt(format!("Invalid refund record status: {}", s))),
    }
}

fn refund_record_status_to_string(status: RefundRecordStatus) -> &'static str {
    match status {
        RefundRecordStatus::Pending => "pending",
        RefundRecordStatus::Approved => "approved",
        RefundRecordStatus::Rejected => "rejected",
        RefundRecordStatus::Processed => "processed",
    }
}

fn parse_refund_mode(s: &str) -> Result<RefundMode, DomainError> {
    match s {
        "immediate" => Ok(RefundMode::Immediate),
        "review" => Ok(RefundMode::Review),
        _ => Err(corrupt(format!("Invalid refund mode: {}", s))),
    }
}

fn refund_mode_to_string(mode: RefundMode) -> &'static str {
    match mode {
        RefundMode::Immediate => "immediate",
        RefundMode::Review => "review",
    }
}

/// Maps unique-constraint violations to their domain codes.
fn map_write_error(e: sqlx::Error, context: &str) -> DomainError {
    if let sqlx::Error::Database(db_err) = &e {
        match db_err.constraint() {
            Some(ACTIVE_SLOT_CONSTRAINT) => {
                return DomainError::new(ErrorCode::SlotAlreadyBooked, "Slot already booked");
            }
            Some(REFUND_PER_RESERVATION_CONSTRAINT) => {
                return DomainError::new(
                    ErrorCode::RefundAlreadyRequested,
                    "Refund already requested",
                );
            }
            _ => {}
        }
    }
    DomainError::database(format!("{}: {}", context, e))
}

const RESERVATION_COLUMNS: &str = r#"
    id, user_id, kind, provider_id, slot_date, slot_time, event_id,
    contact_name, contact_email, contact_phone, starts_at, unit_price, currency,
    quantity, original_quantity, status, payment_status, checkout_session_id,
    payment_reference, top_up_session_id, top_up_quantity, top_up_amount,
    top_up_expires_at, refund_status, refund_amount, refunded_at,
    cancellation_reason, created_at, paid_at, cancelled_at, updated_at
"#;

const REFUND_COLUMNS: &str = r#"
    id, reservation_id, user_id, amount, processing_fee, net_amount, currency,
    status, reason, mode, requested_by, requested_at, reviewed_by, reviewed_at,
    gateway_refund_references, created_at, updated_at
"#;

#[async_trait]
impl BookingTx for PgBookingTx {
    async fn insert_reservation(&mut self, reservation: &Reservation) -> Result<(), DomainError> {
        let slot = reservation.resource.slot();
        let top_up = reservation.pending_top_up.as_ref();

        sqlx::query(&format!(
            "INSERT INTO reservations ({}, charges) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, \
             $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21, $22, $23, $24, $25, $26, $27, \
             $28, $29, $30, $31, $32::jsonb)",
            RESERVATION_COLUMNS
        ))
        .bind(reservation.id.as_uuid())
        .bind(reservation.user_id.as_str())
        .bind(reservation.kind().as_str())
        .bind(slot.map(|s| s.provider_id.as_str().to_string()))
        .bind(slot.map(|s| s.date))
        .bind(slot.map(|s| s.time))
        .bind(reservation.resource.event_id().map(|id| *id.as_uuid()))
        .bind(&reservation.contact.name)
        .bind(&reservation.contact.email)
        .bind(&reservation.contact.phone)
        .bind(reservation.starts_at.as_datetime())
        .bind(reservation.unit_price.minor())
        .bind(reservation.currency.as_str())
        .bind(to_i32(reservation.quantity)?)
        .bind(to_i32(reservation.original_quantity)?)
        .bind(reservation_status_to_string(reservation.status))
        .bind(payment_status_to_string(reservation.payment_status))
        .bind(&reservation.checkout_session_id)
        .bind(&reservation.payment_reference)
        .bind(top_up.map(|t| t.session_id.clone()))
        .bind(top_up.map(|t| to_i32(t.new_quantity)).transpose()?)
        .bind(top_up.map(|t| t.amount.minor()))
        .bind(top_up.map(|t| *t.expires_at.as_datetime()))
        .bind(refund_status_to_string(reservation.refund_status))
        .bind(reservation.refund_amount.minor())
        .bind(reservation.refunded_at.map(|t| *t.as_datetime()))
        .bind(&reservation.cancellation_reason)
        .bind(reservation.created_at.as_datetime())
        .bind(reservation.paid_at.map(|t| *t.as_datetime()))
        .bind(reservation.cancelled_at.map(|t| *t.as_datetime()))
        .bind(reservation.updated_at.as_datetime())
        .bind(encode_charges(&reservation.charges)?)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_write_error(e, "Failed to insert reservation"))?;

        Ok(())
    }

    async fn update_reservation(&mut self, reservation: &Reservation) -> Result<(), DomainError> {
        let top_up = reservation.pending_top_up.as_ref();

        let result = sqlx::query(
            r#"
            UPDATE reservations SET
                quantity = $2,
                status = $3,
                payment_status = $4,
                checkout_session_id = $5,
                payment_reference = $6,
                top_up_session_id = $7,
                top_up_quantity = $8,
                top_up_amount = $9,
                top_up_expires_at = $10,
                refund_status = $11,
                refund_amount = $12,
                refunded_at = $13,
                cancellation_reason = $14,
                paid_at = $15,
                cancelled_at = $16,
                updated_at = $17,
                charges = $18::jsonb
            WHERE id = $1
            "#,
        )
        .bind(reservation.id.as_uuid())
        .bind(to_i32(reservation.quantity)?)
        .bind(reservation_status_to_string(reservation.status))
        .bind(payment_status_to_string(reservation.payment_status))
        .bind(&reservation.checkout_session_id)
        .bind(&reservation.payment_reference)
        .bind(top_up.map(|t| t.session_id.clone()))
        .bind(top_up.map(|t| to_i32(t.new_quantity)).transpose()?)
        .bind(top_up.map(|t| t.amount.minor()))
        .bind(top_up.map(|t| *t.expires_at.as_datetime()))
        .bind(refund_status_to_string(reservation.refund_status))
        .bind(reservation.refund_amount.minor())
        .bind(reservation.refunded_at.map(|t| *t.as_datetime()))
        .bind(&reservation.cancellation_reason)
        .bind(reservation.paid_at.map(|t| *t.as_datetime()))
        .bind(reservation.cancelled_at.map(|t| *t.as_datetime()))
        .bind(reservation.updated_at.as_datetime())
        .bind(encode_charges(&reservation.charges)?)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_write_error(e, "Failed to update reservation"))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::new(
                ErrorCode::ReservationNotFound,
                format!("Reservation not found: {}", reservation.id),
            ));
        }
        Ok(())
    }

    async fn find_reservation_for_update(
        &mut self,
        id: &ReservationId,
    ) -> Result<Option<Reservation>, DomainError> {
        let row: Option<ReservationRow> = sqlx::query_as(&format!(
            "SELECT {}, charges::text AS charges FROM reservations WHERE id = $1 FOR UPDATE",
            RESERVATION_COLUMNS
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| DomainError::database(format!("Failed to load reservation: {}", e)))?;

        row.map(Reservation::try_from).transpose()
    }

    async fn find_stale_pending(
        &mut self,
        cutoff: Timestamp,
        limit: u32,
    ) -> Result<Vec<Reservation>, DomainError> {
        // SKIP LOCKED lets overlapping sweeps split the work.
        let rows: Vec<ReservationRow> = sqlx::query_as(&format!(
            "SELECT {}, charges::text AS charges FROM reservations \
             WHERE status = 'active' AND payment_status = 'pending' AND created_at < $1 \
             ORDER BY created_at LIMIT $2 FOR UPDATE SKIP LOCKED",
            RESERVATION_COLUMNS
        ))
        .bind(cutoff.as_datetime())
        .bind(i64::from(limit))
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| DomainError::database(format!("Failed to load stale reservations: {}", e)))?;

        rows.into_iter().map(Reservation::try_from).collect()
    }

    async fn find_event_for_update(&mut self, id: &EventId) -> Result<Option<Event>, DomainError> {
        let row: Option<EventRow> = sqlx::query_as(
            r#"
            SELECT id, title, capacity, consumed_count, starts_at, unit_price, currency
            FROM events
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| DomainError::database(format!("Failed to load event: {}", e)))?;

        row.map(Event::try_from).transpose()
    }

    async fn sum_active_paid_quantity(&mut self, event_id: &EventId) -> Result<u64, DomainError> {
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(quantity), 0)::BIGINT
            FROM reservations
            WHERE event_id = $1 AND status = 'active' AND payment_status = 'paid'
            "#,
        )
        .bind(event_id.as_uuid())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| DomainError::database(format!("Failed to count registrations: {}", e)))?;

        u64::try_from(total).map_err(|_| corrupt(format!("Negative registration total: {}", total)))
    }

    async fn set_consumed_count(&mut self, event_id: &EventId, consumed: u32) -> Result<(), DomainError> {
        let result = sqlx::query("UPDATE events SET consumed_count = $2 WHERE id = $1")
            .bind(event_id.as_uuid())
            .bind(to_i32(consumed)?)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| DomainError::database(format!("Failed to update event: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::new(
                ErrorCode::EventNotFound,
                format!("Event not found: {}", event_id),
            ));
        }
        Ok(())
    }

    async fn insert_refund(&mut self, refund: &RefundRecord) -> Result<(), DomainError> {
        sqlx::query(&format!(
            "INSERT INTO refund_records ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, \
             $11, $12, $13, $14, $15, $16, $17)",
            REFUND_COLUMNS
        ))
        .bind(refund.id.as_uuid())
        .bind(refund.reservation_id.as_uuid())
        .bind(refund.user_id.as_str())
        .bind(refund.amount.minor())
        .bind(refund.processing_fee.minor())
        .bind(refund.net_amount.minor())
        .bind(refund.currency.as_str())
        .bind(refund_record_status_to_string(refund.status))
        .bind(refund.reason.as_str())
        .bind(refund_mode_to_string(refund.metadata.mode))
        .bind(refund.metadata.requested_by.as_str())
        .bind(refund.metadata.requested_at.as_datetime())
        .bind(refund.metadata.reviewed_by.as_ref().map(|u| u.as_str().to_string()))
        .bind(refund.metadata.reviewed_at.map(|t| *t.as_datetime()))
        .bind(&refund.metadata.gateway_refund_references)
        .bind(refund.created_at.as_datetime())
        .bind(refund.updated_at.as_datetime())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_write_error(e, "Failed to insert refund record"))?;

        Ok(())
    }

    async fn update_refund(&mut self, refund: &RefundRecord) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE refund_records SET
                status = $2,
                reviewed_by = $3,
                reviewed_at = $4,
                gateway_refund_references = $5,
                updated_at = $6
            WHERE id = $1
            "#,
        )
        .bind(refund.id.as_uuid())
        .bind(refund_record_status_to_string(refund.status))
        .bind(refund.metadata.reviewed_by.as_ref().map(|u| u.as_str().to_string()))
        .bind(refund.metadata.reviewed_at.map(|t| *t.as_datetime()))
        .bind(&refund.metadata.gateway_refund_references)
        .bind(refund.updated_at.as_datetime())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| DomainError::database(format!("Failed to update refund record: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::new(
                ErrorCode::RefundNotFound,
                format!("Refund not found: {}", refund.id),
            ));
        }
        Ok(())
    }

    async fn find_refund_for_update(&mut self, id: &RefundId) -> Result<Option<RefundRecord>, DomainError> {
        let row: Option<RefundRow> = sqlx::query_as(&format!(
            "SELECT {} FROM refund_records WHERE id = $1 FOR UPDATE",
            REFUND_COLUMNS
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| DomainError::database(format!("Failed to load refund record: {}", e)))?;

        row.map(RefundRecord::try_from).transpose()
    }

    async fn find_refund_by_reservation(
        &mut self,
        reservation_id: &ReservationId,
    ) -> Result<Option<RefundRecord>, DomainError> {
        let row: Option<RefundRow> = sqlx::query_as(&format!(
            "SELECT {} FROM refund_records WHERE reservation_id = $1",
            REFUND_COLUMNS
        ))
        .bind(reservation_id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| DomainError::database(format!("Failed to load refund record: {}", e)))?;

        row.map(RefundRecord::try_from).transpose()
    }

    async fn commit(self: Box<Self>) -> Result<(), DomainError> {
        self.tx
            .commit()
            .await
            .map_err(|e| DomainError::database(format!("Failed to commit transaction: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_strings_round_trip() {
        for status in [
            ReservationStatus::Active,
            ReservationStatus::Cancelled,
            ReservationStatus::Completed,
            ReservationStatus::Missed,
        ] {
            assert_eq!(
                parse_reservation_status(reservation_status_to_string(status)).unwrap(),
                status
            );
        }
        for status in [
            RefundRecordStatus::Pending,
            RefundRecordStatus::Approved,
            RefundRecordStatus::Rejected,
            RefundRecordStatus::Processed,
        ] {
            assert_eq!(
                parse_refund_record_status(refund_record_status_to_string(status)).unwrap(),
                status
            );
        }
    }

    #[test]
    fn unknown_status_is_a_database_error() {
        let err = parse_payment_status("settled").unwrap_err();
        assert_eq!(err.code, ErrorCode::DatabaseError);
    }

    #[test]
    fn charges_column_keeps_refunded_amounts() {
        let charges = vec![Charge {
            payment_reference: "pi_1".to_string(),
            amount: Money::from_minor(5_000).unwrap(),
            refunded: Money::from_minor(2_500).unwrap(),
            paid_at: Timestamp::now(),
        }];
        let decoded = decode_charges(&encode_charges(&charges).unwrap()).unwrap();
        assert_eq!(decoded, charges);
        assert!(decode_charges("[]").unwrap().is_empty());
    }

    #[test]
    fn charge_above_gateway_maximum_is_corrupt() {
        let json = r#"[{"payment_reference":"pi_1","amount":100000000000,"refunded":0,"paid_at":"2025-01-10T10:00:00Z"}]"#;
        let err = decode_charges(json).unwrap_err();
        assert_eq!(err.code, ErrorCode::DatabaseError);
    }

    #[test]
    fn negative_counts_are_rejected() {
        assert!(to_u32(-1).is_err());
        assert_eq!(to_u32(7).unwrap(), 7);
    }

    #[test]
    fn appointment_row_requires_slot_columns() {
        let now = Utc::now();
        let row = ReservationRow {
            id: Uuid::new_v4(),
            user_id: "user-1".to_string(),
            kind: "appointment".to_string(),
            provider_id: None,
            slot_date: None,
            slot_time: None,
            event_id: None,
            contact_name: "Ada".to_string(),
            contact_email: "ada@example.com".to_string(),
            contact_phone: "5550102030".to_string(),
            starts_at: now,
            unit_price: 8_000,
            currency: "usd".to_string(),
            quantity: 1,
            original_quantity: 1,
            status: "active".to_string(),
            payment_status: "pending".to_string(),
            checkout_session_id: None,
            payment_reference: None,
            charges: "[]".to_string(),
            top_up_session_id: None,
            top_up_quantity: None,
            top_up_amount: None,
            top_up_expires_at: None,
            refund_status: "none".to_string(),
            refund_amount: 0,
            refunded_at: None,
            cancellation_reason: None,
            created_at: now,
            paid_at: None,
            cancelled_at: None,
            updated_at: now,
        };
        assert!(Reservation::try_from(row).is_err());
    }
}
