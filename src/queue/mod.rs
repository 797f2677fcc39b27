//! Queue retrieval: the bounded-retry fetch loop and the per-batch
//! duplicate index.
//!
//! [`Client::fetch_all`] drains everything currently pending into one
//! [`MessageBatch`]; the batch then answers whether a given build spec is
//! already represented among the pending messages.

mod batch;

pub use batch::MessageBatch;

use crate::error::{Error, Joined, Result};
use crate::telemetry::{annotate, metrics};
use async_trait::async_trait;
use opentelemetry::KeyValue;
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::{info, warn};

/// Maximum messages requested per dequeue round-trip.
pub const MAX_BATCH: i32 = 32;

/// Seconds a dequeued message stays hidden from other consumers.
///
/// Nothing in this crate deletes or acknowledges messages, so every
/// fetched message reappears once this window expires. Operators must
/// size it above the expected check-then-enqueue time, or another
/// consumer will see the same builds mid-run.
pub const VISIBILITY_TIMEOUT_SECS: i32 = 120;

const MAX_CONSECUTIVE_FAILURES: u32 = 4;
const MAX_TOTAL_FAILURES: u32 = 10;

/// One message as it came off the transport.
#[derive(Debug, Clone)]
pub struct RawMessage {
    /// Transport-assigned identifier, when the transport provides one.
    pub id: Option<String>,
    /// Base64-encoded payload. Absent when the stored value is not text.
    pub text: Option<String>,
}

impl RawMessage {
    /// Identifier for diagnostics; `"unknown"` when the transport gave none.
    pub fn id_or_unknown(&self) -> &str {
        self.id.as_deref().unwrap_or("unknown")
    }
}

/// Batch-dequeue seam over the remote queue service.
#[async_trait]
pub trait QueueTransport: Send + Sync {
    /// Dequeue up to `max_count` messages, reserving each for
    /// `visibility_timeout_secs` before it becomes visible to other
    /// consumers again.
    async fn dequeue_batch(
        &self,
        queue: &str,
        max_count: i32,
        visibility_timeout_secs: i32,
    ) -> Result<Vec<RawMessage>>;
}

/// Handle for aborting an in-progress fetch from another task.
#[derive(Clone)]
pub struct CancelHandle(Arc<Notify>);

impl CancelHandle {
    /// Abort the fetch. Safe to call before the fetch starts; the next
    /// `fetch_all` observes it immediately.
    pub fn cancel(&self) {
        self.0.notify_one();
    }
}

/// Queue consumer: drains the pending messages into a [`MessageBatch`].
pub struct Client<'a, T: QueueTransport> {
    transport: &'a T,
    queue: String,
    cancel: Arc<Notify>,
}

impl<'a, T: QueueTransport> Client<'a, T> {
    pub fn new(transport: &'a T, queue: impl Into<String>) -> Self {
        Self {
            transport,
            queue: queue.into(),
            cancel: Arc::new(Notify::new()),
        }
    }

    /// Handle that aborts a running [`fetch_all`](Self::fetch_all).
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle(Arc::clone(&self.cancel))
    }

    /// Drain the queue's currently pending messages.
    ///
    /// Requests batches of [`MAX_BATCH`] until one comes back empty.
    /// Transport failures are tolerated until more than
    /// `MAX_CONSECUTIVE_FAILURES` land in a row or more than
    /// `MAX_TOTAL_FAILURES` land overall; fetching then stops, keeping
    /// whatever was already accumulated. The returned batch is always
    /// usable; the error slot is `Some` iff any transport failure
    /// occurred or memoizing the batch failed, with every cause joined.
    pub async fn fetch_all(&self) -> (MessageBatch, Option<Error>) {
        let started = std::time::Instant::now();
        let mut messages: Vec<RawMessage> = Vec::new();
        let mut all_errs = Joined::new();
        // Failures since the last successful request, for the abort
        // annotation. Cleared on success, like the consecutive counter.
        let mut recent: Vec<String> = Vec::new();
        let mut consecutive: u32 = 0;
        let mut total: u32 = 0;

        loop {
            let result = tokio::select! {
                _ = self.cancel.notified() => {
                    warn!(queue = %self.queue, "fetch cancelled");
                    all_errs.push(Error::Cancelled);
                    break;
                }
                r = self
                    .transport
                    .dequeue_batch(&self.queue, MAX_BATCH, VISIBILITY_TIMEOUT_SECS) => r,
            };

            match result {
                Ok(batch) if batch.is_empty() => break,
                Ok(batch) => {
                    messages.extend(batch);
                    consecutive = 0;
                    recent.clear();
                }
                Err(err) => {
                    consecutive += 1;
                    total += 1;
                    warn!(queue = %self.queue, consecutive, total, "dequeue failed: {err}");
                    recent.push(err.to_string());
                    all_errs.push(err);

                    if consecutive > MAX_CONSECUTIVE_FAILURES || total > MAX_TOTAL_FAILURES {
                        annotate::pipeline_error(format!(
                            "failed to examine messages: {}",
                            recent.join("; ")
                        ));
                        break;
                    }
                }
            }
        }

        info!(queue = %self.queue, count = messages.len(), "fetched pending messages");
        metrics::fetch_duration_ms().record(
            started.elapsed().as_secs_f64() * 1000.0,
            &[KeyValue::new("queue", self.queue.clone())],
        );

        let mut batch = MessageBatch::new(messages);
        if let Err(err) = batch.memoize() {
            all_errs.push(err);
        }

        (batch, all_errs.into_error())
    }
}
