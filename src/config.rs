// Copyright 2024 Saorsa Labs
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration for the distribution engine.
//!
//! Covers where the catalogue and shard scratch directory live, streaming and concurrency
//! knobs for the codec, the default load-balancer strategy, and the encryption KDF. Presets
//! mirror a few common deployment shapes; everything is reachable via the builder too.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{DispersionError, Result};
use crate::load_balancer::Strategy;

/// Root configuration for a distribution engine instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding `datamap.json` and `loadbalancer.json`.
    pub catalogue_dir: PathBuf,
    /// Local scratch directory for shards in flight.
    pub shard_store_dir: PathBuf,
    /// Streaming block size used by the codec's split/join (default 4 MiB).
    pub stream_block_size: usize,
    /// Maximum concurrent shard I/O operations within a single encode/decode call.
    pub stream_concurrency: usize,
    /// Default load-balancer strategy when the caller does not specify one.
    pub default_strategy: Strategy,
    /// Softmax temperature for the Boltzmann strategy.
    pub boltzmann_temperature: f64,
    /// Argon2id memory cost in KiB.
    pub kdf_memory_kib: u32,
    /// Argon2id iteration count.
    pub kdf_iterations: u32,
    /// Argon2id parallelism.
    pub kdf_parallelism: u32,
    /// fsync the catalogue file after every write.
    pub catalogue_fsync: bool,
    /// Per-shard remote call timeout.
    pub remote_call_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            catalogue_dir: PathBuf::from("data"),
            shard_store_dir: PathBuf::from("shard"),
            stream_block_size: 4 * 1024 * 1024,
            stream_concurrency: 8,
            default_strategy: Strategy::RoundRobin,
            boltzmann_temperature: 1.0,
            kdf_memory_kib: 19 * 1024,
            kdf_iterations: 2,
            kdf_parallelism: 1,
            catalogue_fsync: true,
            remote_call_timeout: Duration::from_secs(60),
        }
    }
}

impl Config {
    /// Start from defaults.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_catalogue_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.catalogue_dir = dir.into();
        self
    }

    pub fn with_shard_store_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.shard_store_dir = dir.into();
        self
    }

    pub fn with_stream_block_size(mut self, size: usize) -> Self {
        self.stream_block_size = size;
        self
    }

    pub fn with_stream_concurrency(mut self, n: usize) -> Self {
        self.stream_concurrency = n;
        self
    }

    pub fn with_default_strategy(mut self, strategy: Strategy) -> Self {
        self.default_strategy = strategy;
        self
    }

    pub fn with_remote_call_timeout(mut self, timeout: Duration) -> Self {
        self.remote_call_timeout = timeout;
        self
    }

    /// Deployment preset favoring throughput: larger blocks, more concurrency.
    pub fn high_performance() -> Self {
        Self::default()
            .with_stream_block_size(16 * 1024 * 1024)
            .with_stream_concurrency(32)
    }

    /// Deployment preset favoring durability: fsync on, conservative concurrency.
    pub fn high_reliability() -> Self {
        let mut cfg = Self::default().with_stream_concurrency(4);
        cfg.catalogue_fsync = true;
        cfg.remote_call_timeout = Duration::from_secs(120);
        cfg
    }

    /// Deployment preset favoring minimal local footprint: small blocks, low concurrency.
    pub fn minimal_storage() -> Self {
        Self::default()
            .with_stream_block_size(1024 * 1024)
            .with_stream_concurrency(2)
    }

    /// Validate the configuration, returning a `CatalogueCorrupt`-adjacent error description
    /// via `EncodeError` for anything that would make the engine misbehave.
    pub fn validate(&self) -> Result<()> {
        if self.stream_block_size == 0 {
            return Err(DispersionError::EncodeError(
                "stream_block_size must be > 0".into(),
            ));
        }
        if self.stream_concurrency == 0 {
            return Err(DispersionError::EncodeError(
                "stream_concurrency must be > 0".into(),
            ));
        }
        if self.boltzmann_temperature <= 0.0 {
            return Err(DispersionError::EncodeError(
                "boltzmann_temperature must be > 0".into(),
            ));
        }
        if self.kdf_iterations == 0 || self.kdf_parallelism == 0 {
            return Err(DispersionError::EncodeError(
                "kdf_iterations and kdf_parallelism must be > 0".into(),
            ));
        }
        Ok(())
    }

    pub fn datamap_path(&self) -> PathBuf {
        self.catalogue_dir.join("datamap.json")
    }

    pub fn loadbalancer_path(&self) -> PathBuf {
        self.catalogue_dir.join("loadbalancer.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn rejects_zero_block_size() {
        let cfg = Config::default().with_stream_block_size(0);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn presets_validate() {
        assert!(Config::high_performance().validate().is_ok());
        assert!(Config::high_reliability().validate().is_ok());
        assert!(Config::minimal_storage().validate().is_ok());
    }
}
