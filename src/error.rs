//! Error types for signq.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("queue transport error: {0}")]
    Transport(#[from] sqlx::Error),

    #[error("nil message with ID: {0}")]
    NilMessage(String),

    #[error("error decoding base64 payload for message with ID: {id}: {source}")]
    Base64 {
        id: String,
        source: base64::DecodeError,
    },

    #[error("error decoding message with ID: {id}: {source}")]
    BadPayload {
        id: String,
        source: serde_json::Error,
    },

    #[error("failed processing specs in queue message: {0}")]
    NoUsableSpecs(Joined),

    #[error("too many failures inspecting builds")]
    TooManyInspectFailures,

    #[error("fetch cancelled")]
    Cancelled,

    #[error("config error: {0}")]
    Config(String),

    #[error("{0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Joined(Joined),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether this failure must stop the calling workflow.
    ///
    /// Transport and per-message decode failures are reported and
    /// tolerated; only a memoization wipeout or an exhausted inspection
    /// budget stops the caller.
    pub fn is_fatal(&self) -> bool {
        match self {
            Error::NoUsableSpecs(_) | Error::TooManyInspectFailures => true,
            Error::Joined(joined) => joined.iter().any(|e| e.is_fatal()),
            _ => false,
        }
    }
}

/// Independent failures collected across a loop without aborting it.
///
/// Collapses back to the inner error when exactly one was collected, so
/// callers never see a one-element aggregate.
#[derive(Debug, Default)]
pub struct Joined(Vec<Error>);

impl Joined {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, err: Error) {
        self.0.push(err);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Error> {
        self.0.iter()
    }

    /// Collapse into a single reportable error.
    ///
    /// `None` when nothing was collected, the inner error when exactly
    /// one was, the aggregate otherwise.
    pub fn into_error(mut self) -> Option<Error> {
        match self.0.len() {
            0 => None,
            1 => Some(self.0.remove(0)),
            _ => Some(Error::Joined(self)),
        }
    }
}

impl std::fmt::Display for Joined {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{err}")?;
        }
        Ok(())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
