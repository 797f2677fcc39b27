//! Tests for the bounded-retry fetch loop.

use async_trait::async_trait;
use signq::error::{Error, Result};
use signq::model::{Artifact, BuildSpec, Envelope};
use signq::queue::{Client, QueueTransport, RawMessage};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Transport that replays a scripted sequence of dequeue results, then
/// reports an empty queue forever.
struct ScriptedTransport {
    script: Mutex<VecDeque<Result<Vec<RawMessage>>>>,
    calls: AtomicUsize,
}

impl ScriptedTransport {
    fn new(script: Vec<Result<Vec<RawMessage>>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QueueTransport for ScriptedTransport {
    async fn dequeue_batch(
        &self,
        _queue: &str,
        _max_count: i32,
        _visibility_timeout_secs: i32,
    ) -> Result<Vec<RawMessage>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(Vec::new()))
    }
}

/// Transport that serves one batch, then hangs until cancelled.
struct HangAfterFirst {
    first: Mutex<Option<Vec<RawMessage>>>,
}

#[async_trait]
impl QueueTransport for HangAfterFirst {
    async fn dequeue_batch(
        &self,
        _queue: &str,
        _max_count: i32,
        _visibility_timeout_secs: i32,
    ) -> Result<Vec<RawMessage>> {
        let first = self.first.lock().unwrap().take();
        match first {
            Some(batch) => Ok(batch),
            None => std::future::pending().await,
        }
    }
}

fn msg(pkg: &str) -> RawMessage {
    let envelope = Envelope {
        artifact: Artifact {
            name: format!("{pkg}.deb"),
            uri: format!("https://artifacts.test/{pkg}.deb"),
            sha256sum: "0".repeat(64),
        },
        spec: BuildSpec {
            pkg: pkg.to_string(),
            distro: "jammy".to_string(),
            arch: "amd64".to_string(),
            os: "linux".to_string(),
            repo: "https://github.com/moby/moby.git".to_string(),
            commit: "deadbeefdeadbeef".to_string(),
            tag: "25.0.1".to_string(),
        },
    };
    RawMessage {
        id: Some(format!("msg-{pkg}")),
        text: Some(envelope.encode().unwrap()),
    }
}

fn boom() -> Error {
    Error::Other("dequeue exploded".to_string())
}

// ---------------------------------------------------------------------------
// Accumulation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn accumulates_batches_until_one_comes_back_empty() {
    let transport = ScriptedTransport::new(vec![
        Ok(vec![msg("moby-engine"), msg("moby-cli")]),
        Ok(vec![msg("moby-compose")]),
        Ok(Vec::new()),
    ]);
    let client = Client::new(&transport, "q");

    let (batch, err) = client.fetch_all().await;

    assert!(err.is_none());
    assert_eq!(batch.len(), 3);
    assert_eq!(transport.calls(), 3);
}

#[tokio::test]
async fn empty_queue_yields_empty_batch_and_no_error() {
    let transport = ScriptedTransport::new(vec![Ok(Vec::new())]);
    let client = Client::new(&transport, "q");

    let (mut batch, err) = client.fetch_all().await;

    assert!(err.is_none());
    assert!(batch.is_empty());
    assert!(
        !batch
            .contains(&BuildSpec {
                pkg: "moby-engine".to_string(),
                ..BuildSpec::default()
            })
            .unwrap()
    );
}

#[tokio::test]
async fn transport_error_keeps_previously_accumulated_messages() {
    let transport = ScriptedTransport::new(vec![
        Ok(vec![msg("moby-engine")]),
        Err(boom()),
        Ok(vec![msg("moby-cli")]),
        Ok(Vec::new()),
    ]);
    let client = Client::new(&transport, "q");

    let (batch, err) = client.fetch_all().await;

    assert_eq!(batch.len(), 2);
    assert_eq!(transport.calls(), 4);

    // A lone failure surfaces as itself, and it does not stop the caller
    let err = err.expect("one transport failure must surface");
    assert!(matches!(err, Error::Other(_)));
    assert!(!err.is_fatal());
}

// ---------------------------------------------------------------------------
// Failure budgets
// ---------------------------------------------------------------------------

#[tokio::test]
async fn five_consecutive_failures_stop_the_fetch() {
    let transport = ScriptedTransport::new(vec![
        Err(boom()),
        Err(boom()),
        Err(boom()),
        Err(boom()),
        Err(boom()),
        // Never reached
        Ok(vec![msg("moby-engine")]),
    ]);
    let client = Client::new(&transport, "q");

    let (batch, err) = client.fetch_all().await;

    assert_eq!(transport.calls(), 5);
    assert!(batch.is_empty());
    assert!(matches!(err, Some(Error::Joined(_))));
}

#[tokio::test]
async fn eleven_total_failures_stop_the_fetch_despite_successes_between() {
    // Success/failure pairs: the consecutive counter keeps resetting,
    // but the total counter does not.
    let mut script = Vec::new();
    for i in 0..11 {
        script.push(Ok(vec![msg(&format!("pkg-{i}"))]));
        script.push(Err(boom()));
    }
    let transport = ScriptedTransport::new(script);
    let client = Client::new(&transport, "q");

    let (batch, err) = client.fetch_all().await;

    assert_eq!(transport.calls(), 22);
    assert_eq!(batch.len(), 11);
    assert!(matches!(err, Some(Error::Joined(_))));
    assert!(!err.unwrap().is_fatal());
}

#[tokio::test]
async fn memoization_failure_joins_the_fetch_error() {
    let transport = ScriptedTransport::new(vec![
        Ok(vec![RawMessage {
            id: Some("1".to_string()),
            text: Some("not-base64!!!".to_string()),
        }]),
        Ok(Vec::new()),
    ]);
    let client = Client::new(&transport, "q");

    let (batch, err) = client.fetch_all().await;

    assert_eq!(batch.len(), 1);
    let err = err.expect("memoization failure must surface");
    assert!(err.to_string().contains("failed processing specs"));
    assert!(err.is_fatal());
}

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cancel_before_fetch_returns_immediately() {
    let transport = HangAfterFirst {
        first: Mutex::new(None),
    };
    let client = Client::new(&transport, "q");

    client.cancel_handle().cancel();
    let (batch, err) = client.fetch_all().await;

    assert!(batch.is_empty());
    assert!(matches!(err, Some(Error::Cancelled)));
}

#[tokio::test]
async fn cancel_mid_fetch_returns_what_was_accumulated() {
    let transport = HangAfterFirst {
        first: Mutex::new(Some(vec![msg("moby-engine")])),
    };
    let client = Client::new(&transport, "q");
    let cancel = client.cancel_handle();

    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        cancel.cancel();
    });

    let (batch, err) = client.fetch_all().await;

    assert_eq!(batch.len(), 1);
    assert!(matches!(err, Some(Error::Cancelled)));
}
