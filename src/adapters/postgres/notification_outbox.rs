//! PostgreSQL notification outbox.
//!
//! Booking notifications are appended to `notification_outbox` after the
//! booking transaction commits. A separate relay delivers them; rows start in
//! `pending` status.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::foundation::{DomainError, EventEnvelope};
use crate::ports::EventPublisher;

/// `EventPublisher` that persists envelopes for later delivery.
pub struct PostgresNotificationOutbox {
    pool: PgPool,
}

impl PostgresNotificationOutbox {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EventPublisher for PostgresNotificationOutbox {
    async fn publish(&self, event: EventEnvelope) -> Result<(), DomainError> {
        let payload = serde_json::to_string(&event.payload)
            .map_err(|e| DomainError::database(format!("Failed to encode payload: {}", e)))?;
        let partition_key = event
            .metadata
            .user_id
            .clone()
            .unwrap_or_else(|| event.aggregate_id.clone());

        sqlx::query(
            r#"
            INSERT INTO notification_outbox (
                id, event_type, schema_version, aggregate_id, aggregate_type,
                occurred_at, payload, partition_key, status, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7::jsonb, $8, 'pending', NOW())
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(event.notification_id.as_str())
        .bind(&event.event_type)
        .bind(i32::try_from(event.schema_version).unwrap_or(i32::MAX))
        .bind(&event.aggregate_id)
        .bind(&event.aggregate_type)
        .bind(event.occurred_at.as_datetime())
        .bind(payload)
        .bind(partition_key)
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to write notification: {}", e)))?;

        tracing::debug!(
            event_type = %event.event_type,
            aggregate_id = %event.aggregate_id,
            "Notification queued"
        );
        Ok(())
    }

    async fn publish_all(&self, events: Vec<EventEnvelope>) -> Result<(), DomainError> {
        for event in events {
            self.publish(event).await?;
        }
        Ok(())
    }
}
