//! Metric instrument factories for signq.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! All instruments are created lazily from the `"signq"` meter.

use opentelemetry::metrics::{Counter, Histogram, Meter};

/// Returns the shared meter for signq instruments.
fn meter() -> Meter {
    opentelemetry::global::meter("signq")
}

/// Counter: queue-level operations (create, send, read).
/// Labels: `queue`, `operation`.
pub fn queue_operations() -> Counter<u64> {
    meter()
        .u64_counter("signq.queue.operations")
        .with_description("Number of queue operations")
        .build()
}

/// Counter: messages that failed to decode.
/// Labels: `stage` ("memoize" | "inspect").
pub fn decode_failures() -> Counter<u64> {
    meter()
        .u64_counter("signq.messages.decode_failures")
        .with_description("Queue messages that failed to decode")
        .build()
}

/// Histogram: full fetch-session duration in milliseconds.
/// Labels: `queue`.
pub fn fetch_duration_ms() -> Histogram<f64> {
    meter()
        .f64_histogram("signq.fetch.duration_ms")
        .with_description("Duration of a full queue drain")
        .with_unit("ms")
        .build()
}
