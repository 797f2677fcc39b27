//! Secret handling utilities.
//!
//! Re-exports secrecy types for working with sensitive configuration
//! values in the signq context.

pub use secrecy::{ExposeSecret, SecretBox, SecretString};
