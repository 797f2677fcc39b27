//! Typed configuration from environment variables.
//!
//! Loads once at startup. Everything has a default: the production account
//! and queue names are baked in, and the database connection can be fully
//! derived from the ambient libpq environment. Sensitive values are wrapped
//! in secrecy::SecretString to prevent log leaks.

pub mod secrets;

use crate::error::{Error, Result};
use secrecy::SecretString;

/// Storage account the signing queue lives under.
pub const DEFAULT_ACCOUNT: &str = "moby";

/// Queue holding pending signing/publishing jobs.
pub const DEFAULT_QUEUE: &str = "moby-packaging-signing-and-publishing";

#[derive(Debug)]
pub struct Config {
    pub account: String,
    pub queue: String,
    pub database_url: Option<SecretString>,
    pub otel_endpoint: Option<String>,
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    /// In the pipeline, the agent environment provides the vars.
    pub fn from_env() -> Result<Self> {
        let config = Self {
            account: var_or("SIGNQ_ACCOUNT", DEFAULT_ACCOUNT),
            queue: var_or("SIGNQ_QUEUE", DEFAULT_QUEUE),
            database_url: std::env::var("DATABASE_URL").ok().map(SecretString::from),
            otel_endpoint: std::env::var("OTEL_ENDPOINT").ok(),
            log_level: var_or("LOG_LEVEL", "info"),
        };

        if config.account.is_empty() {
            return Err(Error::Config("SIGNQ_ACCOUNT must not be empty".to_string()));
        }
        if config.queue.is_empty() {
            return Err(Error::Config("SIGNQ_QUEUE must not be empty".to_string()));
        }

        Ok(config)
    }

    /// Connection URL for the queue database.
    ///
    /// `DATABASE_URL` wins when set. Otherwise the URL names the account's
    /// database and leaves host and credentials to the libpq environment
    /// (PGHOST, PGUSER, PGPASSWORD, ...), which is where this deployment's
    /// identity provider drops them.
    pub fn connection_url(&self) -> SecretString {
        match &self.database_url {
            Some(url) => url.clone(),
            None => SecretString::from(format!("postgres:///{}", self.account)),
        }
    }
}

fn var_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}
