// Copyright 2024 Saorsa Labs
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Data model for the catalogue: file records, shard records, remotes, and load-balancer
//! state. Mirrors the on-disk JSON shape of `datamap.json` / `loadbalancer.json`.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// What a file's in-progress operation currently is, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationState {
    Idle,
    Upload,
    Download,
    Rm,
}

impl Default for OperationState {
    fn default() -> Self {
        OperationState::Idle
    }
}

/// The kind of cloud backend a [`Remote`] refers to. Concrete adapters are external; this is
/// just the identity tag used as a catalogue/load-balancer key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Remote {
    pub name: String,
    pub kind: String,
}

impl fmt::Display for Remote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.name, self.kind)
    }
}

/// One erasure-coded shard belonging to a [`FileRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardRecord {
    /// Logical shard name, e.g. `"hello.txt.3"`.
    pub name: String,
    /// Index within the (k data + parity) ordering; 0..k-1 are data shards.
    pub index: usize,
    /// SHA-256 hex digest of the shard bytes as written locally.
    pub checksum: String,
    /// Remote this shard has been copied to, if assigned yet.
    pub remote: Option<Remote>,
    /// Whether this shard's leg of the current operation has completed.
    pub check: bool,
}

impl ShardRecord {
    pub fn is_data(&self, k: usize) -> bool {
        self.index < k
    }
}

/// Metadata for one user file tracked by the catalogue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    pub file_name: String,
    pub file_size: u64,
    pub shard_size: u64,
    pub padding: u64,
    /// SHA-256 hex digest of the original plaintext.
    pub checksum: String,
    /// Number of data shards (k).
    pub k: usize,
    /// Number of parity shards (n - k).
    pub parity: usize,
    pub flag: bool,
    pub state: OperationState,
    pub shards: Vec<ShardRecord>,
}

impl FileRecord {
    pub fn n(&self) -> usize {
        self.k + self.parity
    }

    pub fn uncompleted(&self) -> Vec<&ShardRecord> {
        self.shards.iter().filter(|s| !s.check).collect()
    }

    pub fn all_checked(&self) -> bool {
        self.shards.iter().all(|s| s.check)
    }
}

/// Persisted load-balancer state, keyed by the `name|kind` rendering of [`Remote`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoadBalancerState {
    pub round_robin_counter: u64,
    pub shard_count: HashMap<String, u64>,
}

impl LoadBalancerState {
    pub fn shard_count_for(&self, remote: &Remote) -> u64 {
        *self.shard_count.get(&remote.to_string()).unwrap_or(&0)
    }

    pub fn increment(&mut self, remote: &Remote) {
        *self.shard_count.entry(remote.to_string()).or_insert(0) += 1;
    }

    pub fn decrement(&mut self, remote: &Remote) {
        if let Some(count) = self.shard_count.get_mut(&remote.to_string()) {
            *count = count.saturating_sub(1);
        }
    }
}

/// A read-only, serializable view of the catalogue, used to hand the whole-catalogue
/// republish step (external) something to push without exposing internal locking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogueSnapshot {
    pub files: Vec<FileRecord>,
    pub load_balancer: LoadBalancerState,
}
