// Copyright 2024 Saorsa Labs
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Shard Dispersal
//!
//! A client-side, privacy-preserving distributed storage layer. A file is encrypted,
//! split by a Reed-Solomon `(n, k)` code into `n` shards (`k` data, `n - k` parity), each
//! shard is content-hash-renamed, and the shards are dispersed across independently
//! registered cloud remotes under a load-balancing policy — so no single remote ever holds
//! a readable copy of the file, and no single remote failure loses it.
//!
//! Recovery only requires collecting any `k` of the `n` shards: verify, reconstruct
//! whatever is missing, join, decrypt. A persistent on-disk catalogue records the mapping
//! from file to shards to remotes, and per-shard completion flags make every operation
//! (upload, download, remove) resumable after a crash.
//!
//! ## Components
//!
//! - [`codec`] — encrypt/split/parity on the way in, verify/reconstruct/join/decrypt on the
//!   way out. The only module that touches plaintext.
//! - [`shard_store`] — local scratch directory for shards in flight, keyed by a hash of
//!   their logical name.
//! - [`catalogue`] — the persistent `FileName -> FileRecord` mapping and load-balancer
//!   state; the single source of truth an interrupted operation resumes from.
//! - [`load_balancer`] — pure selection strategies for which remote a shard lands on.
//! - [`dispersion`] — the [`dispersion::DispersionEngine`] that orchestrates upload /
//!   download / remove against the registered remotes, fanning shard work out in parallel.
//! - [`recovery`] — the decision tree for what to do with an operation an earlier process
//!   left interrupted.
//! - [`remote`] — the [`remote::RemoteAdapter`] capability trait concrete cloud backends
//!   implement, plus two in-process test doubles.
//! - [`config`] — knobs for the above, with a few deployment presets.
//! - [`error`] — the unified [`error::DispersionError`] taxonomy.
//!
//! Command-line surface, GUI, concrete cloud remote clients, passphrase provenance, and the
//! catalogue's own local-to-remote publish sync are external collaborators and out of scope
//! for this crate.

pub mod catalogue;
pub mod codec;
pub mod config;
pub mod dispersion;
pub mod error;
pub mod load_balancer;
pub mod recovery;
pub mod remote;
pub mod shard_store;

pub use catalogue::{Catalogue, FileRecord, LoadBalancerStore, OperationState, Remote, ShardRecord};
pub use config::Config;
pub use dispersion::{DispersionEngine, RegisteredRemote};
pub use error::{DispersionError, Result};
pub use load_balancer::Strategy;
pub use recovery::{FixedAnswer, Interaction, RecoveryDecision, RecoverySupervisor};
pub use remote::RemoteAdapter;
pub use shard_store::ShardStore;

use std::sync::Arc;

/// Assemble a [`DispersionEngine`] from a [`Config`] and a set of registered remotes,
/// opening (or creating) the catalogue, load-balancer state, and shard scratch directory
/// the config points at.
pub fn open_engine(config: Config, remotes: Vec<RegisteredRemote>) -> Result<Arc<DispersionEngine>> {
    config.validate()?;
    let catalogue = Catalogue::open(config.datamap_path(), config.catalogue_fsync)?;
    let lb_store = LoadBalancerStore::open(config.loadbalancer_path(), config.catalogue_fsync)?;
    let shard_store = ShardStore::new(&config.shard_store_dir)?;
    Ok(Arc::new(DispersionEngine::new(
        config,
        catalogue,
        lb_store,
        shard_store,
        remotes,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use remote::LocalDirRemote;
    use tempfile::tempdir;

    fn registered(name: &str, root: &std::path::Path) -> RegisteredRemote {
        RegisteredRemote {
            remote: Remote {
                name: name.to_string(),
                kind: "local-dir".into(),
            },
            adapter: Arc::new(LocalDirRemote::new(name, root.join(name))),
        }
    }

    #[tokio::test]
    async fn open_engine_wires_up_a_working_round_trip() {
        let workdir = tempdir().unwrap();
        let config = Config::default()
            .with_catalogue_dir(workdir.path().join("data"))
            .with_shard_store_dir(workdir.path().join("shard"));

        let remotes_root = workdir.path().join("remotes");
        let remotes = vec![
            registered("r1", &remotes_root),
            registered("r2", &remotes_root),
        ];

        let engine = open_engine(config, remotes).unwrap();

        let source_dir = tempdir().unwrap();
        let source_path = source_dir.path().join("hello.txt");
        tokio::fs::write(&source_path, b"Hello, world!").await.unwrap();

        let interaction = FixedAnswer(true);
        engine
            .upload(&source_path, Strategy::RoundRobin, "correct horse battery staple", &interaction, false)
            .await
            .unwrap();
        assert!(engine.catalogue().exists("hello.txt"));

        let dest_dir = tempdir().unwrap();
        let out_path = engine
            .download("hello.txt", dest_dir.path(), "correct horse battery staple", false)
            .await
            .unwrap();
        let contents = tokio::fs::read(&out_path).await.unwrap();
        assert_eq!(contents, b"Hello, world!");

        engine.remove("hello.txt", false).await.unwrap();
        assert!(!engine.catalogue().exists("hello.txt"));
    }
}
