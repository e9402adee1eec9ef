//! Durable queue facility backed by PostgreSQL pgmq.

use ::pgmq::PGMQueue;
use tracing::{debug, info, warn};

use crate::bridge::QueueEnvelope;
use crate::facility::{FacilityError, QueueFacility};

/// Queue facility over a pgmq queue.
///
/// Envelopes survive producer and consumer restarts; capacity and payload
/// bounds are whatever the backing PostgreSQL instance enforces. `pop` is
/// read-and-delete, so each envelope reaches exactly one consumer.
#[derive(Clone)]
pub struct PgmqFacility {
    pgmq: PGMQueue,
    queue_name: String,
}

impl PgmqFacility {
    /// Connect and make sure the queue exists.
    pub async fn new(database_url: &str, queue_name: &str) -> Result<Self, FacilityError> {
        info!(queue_name, "connecting to pgmq queue facility");

        let pgmq = PGMQueue::new(database_url.to_string())
            .await
            .map_err(|e| FacilityError::unavailable(format!("pgmq connection failed: {e}")))?;

        pgmq.create(queue_name).await.map_err(|e| {
            FacilityError::unavailable(format!("failed to create queue {queue_name}: {e}"))
        })?;

        info!(queue_name, "pgmq queue facility ready");
        Ok(Self {
            pgmq,
            queue_name: queue_name.to_string(),
        })
    }

    /// Create a facility over an existing connection pool (BYOP - Bring Your
    /// Own Pool).
    pub async fn new_with_pool(pool: sqlx::PgPool, queue_name: &str) -> Result<Self, FacilityError> {
        let pgmq = PGMQueue::new_with_pool(pool).await;

        pgmq.create(queue_name).await.map_err(|e| {
            FacilityError::unavailable(format!("failed to create queue {queue_name}: {e}"))
        })?;

        Ok(Self {
            pgmq,
            queue_name: queue_name.to_string(),
        })
    }

    /// Underlying connection pool, for advanced operations.
    pub fn pool(&self) -> &sqlx::PgPool {
        &self.pgmq.connection
    }

    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }
}

#[async_trait::async_trait]
impl QueueFacility for PgmqFacility {
    async fn send(&self, envelope: &QueueEnvelope) -> Result<(), FacilityError> {
        let value = serde_json::to_value(envelope)
            .map_err(|e| FacilityError::unavailable(format!("envelope serialization: {e}")))?;

        let message_id = self
            .pgmq
            .send(&self.queue_name, &value)
            .await
            .map_err(|e| FacilityError::unavailable(format!("pgmq send failed: {e}")))?;

        debug!(
            queue_name = %self.queue_name,
            message_id,
            tag = envelope.tag,
            "envelope sent to pgmq"
        );
        Ok(())
    }

    async fn try_receive(&self, tag: u32) -> Result<Option<QueueEnvelope>, FacilityError> {
        let popped = self
            .pgmq
            .pop::<serde_json::Value>(&self.queue_name)
            .await
            .map_err(|e| FacilityError::unavailable(format!("pgmq pop failed: {e}")))?;

        let Some(message) = popped else {
            return Ok(None);
        };

        let envelope: QueueEnvelope = serde_json::from_value(message.message)
            .map_err(|e| FacilityError::unavailable(format!("envelope deserialization: {e}")))?;

        if envelope.tag != tag {
            // All producers and consumers of one queue are expected to share
            // a single tag; a mismatch means a misconfigured peer. Requeue so
            // the envelope is not lost.
            warn!(
                queue_name = %self.queue_name,
                expected = tag,
                found = envelope.tag,
                "requeuing envelope with unexpected tag"
            );
            self.send(&envelope).await?;
            return Ok(None);
        }

        Ok(Some(envelope))
    }
}
