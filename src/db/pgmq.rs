//! pgmq queue operations via direct SQLx.
//!
//! Calls pgmq's SQL functions: pgmq.create, pgmq.send, pgmq.read. Reads
//! only reserve messages for the visibility timeout; nothing here archives
//! or deletes them, so unacknowledged messages reappear when the window
//! expires.

use crate::error::Result;
use crate::queue::{QueueTransport, RawMessage};
use crate::telemetry::metrics;
use async_trait::async_trait;
use opentelemetry::KeyValue;

/// A message read from a pgmq queue.
#[derive(Debug, Clone)]
pub struct PgmqMessage {
    pub msg_id: i64,
    pub read_ct: i32,
    pub enqueued_at: chrono::DateTime<chrono::Utc>,
    pub vt: chrono::DateTime<chrono::Utc>,
    pub message: serde_json::Value,
}

impl super::Db {
    /// Create a pgmq queue (idempotent).
    pub async fn create_queue(&self, queue_name: &str) -> Result<()> {
        sqlx::query("SELECT pgmq.create($1)")
            .bind(queue_name)
            .execute(self.pool())
            .await?;
        metrics::queue_operations().add(
            1,
            &[
                KeyValue::new("queue", queue_name.to_string()),
                KeyValue::new("operation", "create"),
            ],
        );
        Ok(())
    }

    /// Send a message to a pgmq queue. Returns the message ID.
    /// delay_seconds: 0 for immediate, >0 for delayed delivery.
    pub async fn send_to_queue(
        &self,
        queue_name: &str,
        payload: &serde_json::Value,
        delay_seconds: i32,
    ) -> Result<i64> {
        let row: (i64,) = sqlx::query_as("SELECT pgmq.send($1, $2, $3)")
            .bind(queue_name)
            .bind(payload)
            .bind(delay_seconds)
            .fetch_one(self.pool())
            .await?;
        metrics::queue_operations().add(
            1,
            &[
                KeyValue::new("queue", queue_name.to_string()),
                KeyValue::new("operation", "send"),
            ],
        );
        Ok(row.0)
    }

    /// Read up to `qty` messages from a queue, reserving each for
    /// `vt_seconds` (visibility timeout). Returns an empty vec when the
    /// queue has nothing pending.
    pub async fn read_batch(
        &self,
        queue_name: &str,
        vt_seconds: i32,
        qty: i32,
    ) -> Result<Vec<PgmqMessage>> {
        let rows = sqlx::query_as::<
            _,
            (
                i64,
                i32,
                chrono::DateTime<chrono::Utc>,
                chrono::DateTime<chrono::Utc>,
                serde_json::Value,
            ),
        >(
            "SELECT msg_id, read_ct, enqueued_at, vt, message FROM pgmq.read($1, $2, $3)",
        )
        .bind(queue_name)
        .bind(vt_seconds)
        .bind(qty)
        .fetch_all(self.pool())
        .await?;

        metrics::queue_operations().add(
            1,
            &[
                KeyValue::new("queue", queue_name.to_string()),
                KeyValue::new(
                    "operation",
                    if rows.is_empty() { "read_empty" } else { "read" },
                ),
            ],
        );

        Ok(rows
            .into_iter()
            .map(|(msg_id, read_ct, enqueued_at, vt, message)| PgmqMessage {
                msg_id,
                read_ct,
                enqueued_at,
                vt,
                message,
            })
            .collect())
    }
}

#[async_trait]
impl QueueTransport for super::Db {
    async fn dequeue_batch(
        &self,
        queue: &str,
        max_count: i32,
        visibility_timeout_secs: i32,
    ) -> Result<Vec<RawMessage>> {
        let rows = self
            .read_batch(queue, visibility_timeout_secs, max_count)
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| RawMessage {
                id: Some(row.msg_id.to_string()),
                // The jsonb column carries the base64 envelope as a JSON
                // string. A non-string value has no usable payload text.
                text: row.message.as_str().map(str::to_string),
            })
            .collect())
    }
}
