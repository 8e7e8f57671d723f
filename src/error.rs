// Copyright 2024 Saorsa Labs
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error taxonomy for the distribution engine.
//!
//! Every fallible operation in this crate ultimately returns a [`DispersionError`]. Worker
//! level failures during a dispersion fan-out are collected rather than raised immediately;
//! the engine surfaces a single [`DispersionError::Aggregate`] once every worker has joined.

use thiserror::Error;

/// Unified error type for catalogue, codec, load-balancer, and dispersion operations.
#[derive(Debug, Error)]
pub enum DispersionError {
    /// Unknown file name or missing shard object.
    #[error("not found: {0}")]
    NotFound(String),

    /// Upload of an already-catalogued file with overwrite declined.
    #[error("duplicate file: {0}")]
    Duplicate(String),

    /// A shard or whole-file checksum disagreed with the catalogue.
    #[error("integrity mismatch for {what}: expected {expected}, got {actual}")]
    IntegrityMismatch {
        what: String,
        expected: String,
        actual: String,
    },

    /// Fewer than `need` shards were recoverable.
    #[error("too few shards: have {have}, need {need}")]
    TooFewShards { have: usize, need: usize },

    /// A remote adapter call failed; always annotated with remote and shard.
    #[error("remote '{remote}' failed for shard '{shard}': {source}")]
    RemoteFailure {
        remote: String,
        shard: String,
        #[source]
        source: anyhow::Error,
    },

    /// The on-disk catalogue failed to parse. Fatal; no auto-repair is attempted.
    #[error("catalogue is corrupt: {0}")]
    CatalogueCorrupt(String),

    /// No remote was available to satisfy a load-balancer request.
    #[error("no remote available")]
    NoRemoteAvailable,

    /// The operation was cancelled or timed out.
    #[error("interrupted: {0}")]
    Interrupted(String),

    /// Internal erasure-encode failure.
    #[error("encode error: {0}")]
    EncodeError(String),

    /// Internal erasure-decode failure.
    #[error("decode error: {0}")]
    DecodeError(String),

    /// Several independent failures occurred during a fan-out; none is singled out as root
    /// cause. Rendered as one line per cause.
    #[error("{} operation(s) failed:\n{}", .0.len(), render_aggregate(.0))]
    Aggregate(Vec<DispersionError>),
}

fn render_aggregate(errors: &[DispersionError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {e}"))
        .collect::<Vec<_>>()
        .join("\n")
}

impl DispersionError {
    /// Build an aggregate error from a list of per-worker failures. Panics in debug builds
    /// if called with an empty list; callers should only construct this after confirming at
    /// least one worker failed.
    pub fn aggregate(mut errors: Vec<DispersionError>) -> Self {
        debug_assert!(!errors.is_empty(), "aggregate error with no causes");
        if errors.len() == 1 {
            return errors.remove(0);
        }
        DispersionError::Aggregate(errors)
    }
}

impl From<std::io::Error> for DispersionError {
    fn from(err: std::io::Error) -> Self {
        DispersionError::EncodeError(err.to_string())
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, DispersionError>;
