//! Per-batch duplicate index over decoded queue messages.

use super::RawMessage;
use crate::error::{Error, Joined, Result};
use crate::model::{BuildSpec, Envelope, SpecPayload};
use crate::telemetry::{annotate, metrics};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use opentelemetry::KeyValue;
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use tracing::debug;

/// Per-call budget of tolerated decode failures in [`MessageBatch::contains`].
const MAX_INSPECT_FAILURES: u32 = 4;

/// Every message pending in the queue at fetch time, plus the lazily-built
/// set of build specs they decode to.
///
/// The set is built at most once per batch. Taking `&mut self` for the
/// building methods gives the at-most-once, single-writer discipline the
/// memo needs; wrap the batch in a mutex if a host ever shares it.
#[derive(Debug)]
pub struct MessageBatch {
    messages: Vec<RawMessage>,
    memo: Option<HashSet<BuildSpec>>,
}

impl MessageBatch {
    pub fn new(messages: Vec<RawMessage>) -> Self {
        Self {
            messages,
            memo: None,
        }
    }

    pub fn messages(&self) -> &[RawMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Build the spec lookup set, once.
    ///
    /// Messages that fail to decode are skipped and reported as pipeline
    /// annotations, one line each. The build fails only when a non-empty
    /// batch yields no usable spec at all; even then the set is marked
    /// built, so later calls do not repeat the decode work or the error.
    pub fn memoize(&mut self) -> Result<()> {
        if self.messages.is_empty() {
            return Ok(());
        }
        if self.memo.is_some() {
            return Ok(());
        }

        let mut memo = HashSet::new();
        let mut errs = Joined::new();

        for msg in &self.messages {
            match decode_payload::<SpecPayload>(msg) {
                Ok(payload) => {
                    memo.insert(payload.spec);
                }
                Err(err) => errs.push(err),
            }
        }

        if memo.is_empty() {
            self.memo = Some(memo);
            return Err(Error::NoUsableSpecs(errs));
        }

        for err in errs.iter() {
            annotate::pipeline_error(format!("error memoizing queue messages: {err}"));
            metrics::decode_failures().add(1, &[KeyValue::new("stage", "memoize")]);
        }

        self.memo = Some(memo);
        Ok(())
    }

    /// Whether `spec` is already represented in this batch.
    ///
    /// Scans the full envelopes rather than the memoized set, so a message
    /// carrying a valid spec inside an otherwise malformed envelope only
    /// costs this call's failure budget instead of poisoning the set.
    /// Aborts as soon as more than [`MAX_INSPECT_FAILURES`] messages fail
    /// to decode, even if a match would have followed.
    pub fn contains(&mut self, spec: &BuildSpec) -> Result<bool> {
        if self.messages.is_empty() {
            return Ok(false);
        }

        self.memoize()?;

        let mut failures: u32 = 0;
        for msg in &self.messages {
            let envelope: Envelope = match decode_payload(msg) {
                Ok(envelope) => envelope,
                Err(err) => {
                    failures += 1;
                    annotate::pipeline_error(err.to_string());
                    metrics::decode_failures().add(1, &[KeyValue::new("stage", "inspect")]);
                    if failures > MAX_INSPECT_FAILURES {
                        return Err(Error::TooManyInspectFailures);
                    }
                    continue;
                }
            };

            if envelope.spec == *spec {
                debug!(spec = %envelope.spec, "matching build already queued");
                return Ok(true);
            }
        }

        Ok(false)
    }

    /// Decoded specs pending in this batch. Builds the set on first use.
    pub fn specs(&mut self) -> Result<impl Iterator<Item = &BuildSpec>> {
        self.memoize()?;
        Ok(self.memo.iter().flatten())
    }
}

/// Decode one message payload: base64 text, then JSON.
fn decode_payload<P: DeserializeOwned>(msg: &RawMessage) -> Result<P> {
    let id = msg.id_or_unknown();
    let Some(text) = msg.text.as_deref() else {
        return Err(Error::NilMessage(id.to_string()));
    };
    let bytes = STANDARD.decode(text).map_err(|source| Error::Base64 {
        id: id.to_string(),
        source,
    })?;
    serde_json::from_slice(&bytes).map_err(|source| Error::BadPayload {
        id: id.to_string(),
        source,
    })
}
