//! # signq
//!
//! Fetches the pending messages of the packaging signing/publishing
//! queue and answers whether a given build spec is already among them,
//! so the build trigger does not enqueue duplicate jobs.
//!
//! The queue transport is pgmq over Postgres; decoded messages carry a
//! base64 JSON envelope of `{ artifact, spec }`.

pub mod config;
pub mod db;
pub mod error;
pub mod model;
pub mod queue;
pub mod telemetry;
