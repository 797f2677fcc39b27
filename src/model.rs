//! Wire types for the signing/publishing queue.
//!
//! A queue message is a base64-encoded JSON envelope carrying the artifact
//! to publish and the build spec that produced it. Only the spec takes part
//! in duplicate detection; artifact fields ride along for the publisher.

use crate::error::Result;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Build Spec
// ---------------------------------------------------------------------------

/// Identity of one build/publish job.
///
/// Two jobs are the same build iff every field matches; value equality over
/// the whole struct is what "duplicate" means here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BuildSpec {
    /// Package being built (e.g., "moby-engine").
    pub pkg: String,
    /// Target distribution (e.g., "jammy", "bookworm").
    pub distro: String,
    /// Target architecture (e.g., "amd64", "arm64").
    pub arch: String,
    pub os: String,
    /// Source repository URL.
    pub repo: String,
    /// Commit the build was cut from.
    pub commit: String,
    /// Version tag for the published package.
    pub tag: String,
}

impl std::fmt::Display for BuildSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{} {} {} ({})",
            self.distro, self.arch, self.pkg, self.tag, self.commit
        )
    }
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// Artifact produced by a build. Pass-through data for the publisher.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub name: String,
    pub uri: String,
    pub sha256sum: String,
}

/// Full queue message payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub artifact: Artifact,
    pub spec: BuildSpec,
}

/// Spec-only view of a message payload.
///
/// Accepts any message carrying a usable `spec`, even when the rest of the
/// envelope does not conform to the full shape. Used when building the
/// dedup set.
#[derive(Debug, Deserialize)]
pub(crate) struct SpecPayload {
    pub spec: BuildSpec,
}

impl Envelope {
    /// Canonical wire encoding: JSON, then standard base64.
    pub fn encode(&self) -> Result<String> {
        let json = serde_json::to_vec(self)?;
        Ok(STANDARD.encode(json))
    }
}
