// Copyright 2024 Saorsa Labs
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The Dispersion Engine: upload, download, and remove, each following the same
//! resolve-prepare-fan out-join-finalize skeleton, fanning shard work out across a
//! [`tokio::task::JoinSet`] so worker latency is dominated by remote calls, not the
//! catalogue's small serialized writes.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::catalogue::{Catalogue, FileRecord, LoadBalancerStore, OperationState, Remote, ShardRecord};
use crate::codec::{self, Argon2Params, ShardParams};
use crate::config::Config;
use crate::error::{DispersionError, Result};
use crate::load_balancer::{self, Strategy};
use crate::recovery::{Interaction, RecoveryDecision, RecoverySupervisor};
use crate::remote::RemoteAdapter;
use crate::shard_store::{hashed_name, ShardStore};

fn argon2_params(config: &Config) -> Argon2Params {
    Argon2Params {
        memory_kib: config.kdf_memory_kib,
        iterations: config.kdf_iterations,
        parallelism: config.kdf_parallelism,
    }
}

/// A single registered remote: its identity plus the adapter used to talk to it.
pub struct RegisteredRemote {
    pub remote: Remote,
    pub adapter: Arc<dyn RemoteAdapter>,
}

/// Orchestrates upload/download/remove against the registered remotes.
pub struct DispersionEngine {
    config: Config,
    catalogue: Catalogue,
    lb_store: LoadBalancerStore,
    shard_store: ShardStore,
    remotes: Vec<RegisteredRemote>,
    /// Bounds how many shard workers may be in flight at once across a single operation's
    /// fan-out, sized from `Config::stream_concurrency` (the same knob the Codec's internal
    /// block-parallel shard I/O is tuned by).
    io_permits: Arc<Semaphore>,
}

impl DispersionEngine {
    pub fn new(
        config: Config,
        catalogue: Catalogue,
        lb_store: LoadBalancerStore,
        shard_store: ShardStore,
        remotes: Vec<RegisteredRemote>,
    ) -> Self {
        let io_permits = Arc::new(Semaphore::new(config.stream_concurrency.max(1)));
        Self {
            config,
            catalogue,
            lb_store,
            shard_store,
            remotes,
            io_permits,
        }
    }

    pub fn catalogue(&self) -> &Catalogue {
        &self.catalogue
    }

    pub fn shard_store(&self) -> &ShardStore {
        &self.shard_store
    }

    fn adapters(&self) -> Vec<&(dyn RemoteAdapter)> {
        self.remotes.iter().map(|r| r.adapter.as_ref()).collect()
    }

    fn remote_identities(&self) -> Vec<Remote> {
        self.remotes.iter().map(|r| r.remote.clone()).collect()
    }

    fn find_adapter(&self, remote: &Remote) -> Option<Arc<dyn RemoteAdapter>> {
        self.remotes
            .iter()
            .find(|r| &r.remote == remote)
            .map(|r| r.adapter.clone())
    }

    async fn mkdir_all_remotes(&self) -> Result<()> {
        for registered in &self.remotes {
            registered
                .adapter
                .mkdir("Distribution")
                .await
                .map_err(|e| DispersionError::RemoteFailure {
                    remote: registered.remote.name.clone(),
                    shard: String::new(),
                    source: e,
                })?;
        }
        Ok(())
    }

    async fn pick_remote(&self, strategy: Strategy) -> Result<Remote> {
        let remotes = self.remote_identities();
        if remotes.is_empty() {
            return Err(DispersionError::NoRemoteAvailable);
        }
        let round_robin_index = match strategy {
            Strategy::RoundRobin => Some(self.lb_store.next_round_robin(remotes.len())?),
            _ => None,
        };
        let lb_state = self.lb_store.snapshot();
        let adapters = self.adapters();
        load_balancer::choose_remote(
            strategy,
            &remotes,
            &lb_state,
            round_robin_index,
            &adapters,
            rand::random(),
            self.config.boltzmann_temperature,
        )
        .await
    }

    // ---------------------------------------------------------------- upload

    /// Upload `source_path`, erasure-coding and dispersing it under `strategy`.
    ///
    /// If the file is already catalogued and `interaction` declines the overwrite prompt,
    /// this fails with [`DispersionError::Duplicate`]. Set `resume` to continue a
    /// previously interrupted upload instead (no overwrite prompt; `source_path` is used
    /// only to recover the catalogued basename, not re-read).
    pub async fn upload(
        self: &Arc<Self>,
        source_path: &Path,
        strategy: Strategy,
        passphrase: &str,
        interaction: &dyn Interaction,
        resume: bool,
    ) -> Result<()> {
        let file_name = source_path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| DispersionError::EncodeError("invalid source path".into()))?
            .to_string();

        if !resume {
            if self.catalogue.exists(&file_name) && !interaction.confirm_overwrite(&file_name).await {
                return Err(DispersionError::Duplicate(file_name));
            }
            self.prepare_upload(source_path, &file_name, passphrase).await?;
        }

        self.fan_out_upload(&file_name, strategy).await?;

        self.catalogue.reset(&file_name)?;
        self.cleanup_local_shards(&file_name)?;
        info!(file = %file_name, "upload complete");
        Ok(())
    }

    async fn prepare_upload(&self, source_path: &Path, file_name: &str, passphrase: &str) -> Result<()> {
        let plaintext = tokio::fs::read(source_path).await?;
        let argon2 = argon2_params(&self.config);
        let file_name_owned = file_name.to_string();
        let passphrase_owned = passphrase.to_string();
        let encoded = tokio::task::spawn_blocking(move || {
            codec::encode(&plaintext, &file_name_owned, &passphrase_owned, argon2)
        })
        .await
        .map_err(|e| DispersionError::EncodeError(e.to_string()))??;

        self.mkdir_all_remotes().await?;

        for shard in &encoded.shards {
            self.shard_store.put(&shard.name, &shard.data)?;
        }

        let record = FileRecord {
            file_name: file_name.to_string(),
            file_size: encoded.shards.iter().map(|s| s.data.len() as u64).sum::<u64>(),
            shard_size: encoded.shard_size as u64,
            padding: encoded.padding as u64,
            checksum: encoded.file_checksum.clone(),
            k: encoded.params.k,
            parity: encoded.params.parity,
            flag: false,
            state: OperationState::Idle,
            shards: encoded
                .shards
                .iter()
                .map(|s| ShardRecord {
                    name: s.name.clone(),
                    index: s.index,
                    checksum: s.checksum.clone(),
                    remote: None,
                    check: false,
                })
                .collect(),
        };
        self.catalogue.upsert(record)?;
        self.catalogue.set_flag(file_name, OperationState::Upload)?;
        Ok(())
    }

    async fn fan_out_upload(self: &Arc<Self>, file_name: &str, strategy: Strategy) -> Result<()> {
        let uncompleted = self.catalogue.uncompleted(file_name)?;
        let mut set: JoinSet<Result<()>> = JoinSet::new();

        for shard in uncompleted {
            let engine = Arc::clone(self);
            let file_name = file_name.to_string();
            set.spawn(async move {
                let remote = engine.pick_remote(strategy).await?;
                let adapter = engine
                    .find_adapter(&remote)
                    .ok_or(DispersionError::NoRemoteAvailable)?;
                engine.upload_one_shard(&file_name, &shard, &remote, adapter).await
            });
        }

        self.join_and_aggregate(set).await
    }

    async fn upload_one_shard(
        &self,
        file_name: &str,
        shard: &ShardRecord,
        remote: &Remote,
        adapter: Arc<dyn RemoteAdapter>,
    ) -> Result<()> {
        let _permit = self
            .io_permits
            .acquire()
            .await
            .map_err(|e| DispersionError::Interrupted(e.to_string()))?;
        let hashed = hashed_name(&shard.name);
        let local_path = self.shard_store.root().join(&hashed);
        let remote_path = format!("Distribution/{hashed}");

        adapter
            .copy(&local_path, &remote_path)
            .await
            .map_err(|e| DispersionError::RemoteFailure {
                remote: remote.name.clone(),
                shard: shard.name.clone(),
                source: e,
            })?;

        self.catalogue.set_shard_assignment(file_name, &shard.name, remote.clone())?;
        self.catalogue.set_shard_check(file_name, &shard.name, true)?;
        self.lb_store.record_assignment(remote)?;
        debug!(file = file_name, shard = %shard.name, remote = %remote.name, "shard uploaded");
        Ok(())
    }

    // -------------------------------------------------------------- download

    /// Download `file_name` into `dest_dir`, reconstructing from any k surviving shards.
    pub async fn download(
        self: &Arc<Self>,
        file_name: &str,
        dest_dir: &Path,
        passphrase: &str,
        resume: bool,
    ) -> Result<PathBuf> {
        if !resume {
            self.catalogue.set_flag(file_name, OperationState::Download)?;
        }

        self.fan_out_download(file_name).await;

        let record = self
            .catalogue
            .get(file_name)
            .ok_or_else(|| DispersionError::NotFound(file_name.to_string()))?;

        let mut shard_slots: Vec<Option<Vec<u8>>> = vec![None; record.n()];
        for shard in &record.shards {
            let hashed = hashed_name(&shard.name);
            if !shard.check || !self.shard_store.exists(&hashed) {
                continue;
            }
            let data = self.shard_store.read(&hashed)?;
            if codec::shard_checksum_matches(&data, &shard.checksum) {
                shard_slots[shard.index] = Some(data);
            } else {
                warn!(file = file_name, shard = %shard.name, "shard failed integrity check, discarding");
                self.shard_store.delete(&hashed)?;
                self.catalogue.set_shard_check(file_name, &shard.name, false)?;
            }
        }

        let params = ShardParams::new(record.k, record.parity)?;
        let argon2 = argon2_params(&self.config);
        let plaintext = codec::decode(
            shard_slots,
            params,
            record.padding as usize,
            &record.checksum,
            passphrase,
            argon2,
        )?;

        tokio::fs::create_dir_all(dest_dir).await?;
        let out_path = dest_dir.join(file_name);
        tokio::fs::write(&out_path, &plaintext).await?;

        self.catalogue.reset(file_name)?;
        self.cleanup_local_shards(file_name)?;
        info!(file = file_name, "download complete");
        Ok(out_path)
    }

    /// Fetch every uncompleted shard that has a known remote, best-effort: a shard whose
    /// fetch fails (missing object, remote error, timeout) simply stays `check=false` rather
    /// than failing the whole download. Whether the surviving shards are enough to
    /// reconstruct the file is decided afterwards by `codec::decode`, which is the single
    /// place `TooFewShards` is raised from.
    async fn fan_out_download(self: &Arc<Self>, file_name: &str) {
        let uncompleted = match self.catalogue.uncompleted(file_name) {
            Ok(shards) => shards,
            Err(e) => {
                warn!(file = file_name, error = %e, "could not read uncompleted shards");
                return;
            }
        };
        let mut set: JoinSet<Result<()>> = JoinSet::new();

        for shard in uncompleted {
            let Some(remote) = shard.remote.clone() else {
                // Never got assigned a remote (upload never finished for this shard); it
                // simply stays missing and reconstruction will cover it if possible.
                continue;
            };
            let engine = Arc::clone(self);
            let file_name = file_name.to_string();
            set.spawn(async move {
                let adapter = engine
                    .find_adapter(&remote)
                    .ok_or(DispersionError::NoRemoteAvailable)?;
                engine.download_one_shard(&file_name, &shard, &remote, adapter).await
            });
        }

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(file = file_name, error = %e, "shard fetch failed, leaving unchecked for reconstruction");
                }
                Err(join_err) => {
                    warn!(file = file_name, error = %join_err, "shard fetch worker panicked");
                }
            }
        }
    }

    async fn download_one_shard(
        &self,
        file_name: &str,
        shard: &ShardRecord,
        remote: &Remote,
        adapter: Arc<dyn RemoteAdapter>,
    ) -> Result<()> {
        let _permit = self
            .io_permits
            .acquire()
            .await
            .map_err(|e| DispersionError::Interrupted(e.to_string()))?;
        let hashed = hashed_name(&shard.name);
        let remote_path = format!("Distribution/{hashed}");
        let local_path = self.shard_store.root().join(&hashed);

        adapter
            .fetch(&remote_path, &local_path)
            .await
            .map_err(|e| DispersionError::RemoteFailure {
                remote: remote.name.clone(),
                shard: shard.name.clone(),
                source: e,
            })?;

        self.catalogue.set_shard_check(file_name, &shard.name, true)?;
        debug!(file = file_name, shard = %shard.name, remote = %remote.name, "shard downloaded");
        Ok(())
    }

    // ---------------------------------------------------------------- remove

    /// Remove `file_name` from every remote it was dispersed to and drop its catalogue entry.
    /// Idempotent: removing an unknown file returns [`DispersionError::NotFound`].
    pub async fn remove(self: &Arc<Self>, file_name: &str, resume: bool) -> Result<()> {
        if !self.catalogue.exists(file_name) {
            return Err(DispersionError::NotFound(file_name.to_string()));
        }
        if !resume {
            self.catalogue.set_flag(file_name, OperationState::Rm)?;
        }

        self.fan_out_remove(file_name).await?;

        let record = self
            .catalogue
            .get(file_name)
            .ok_or_else(|| DispersionError::NotFound(file_name.to_string()))?;
        for shard in &record.shards {
            if let Some(remote) = &shard.remote {
                self.lb_store.record_release(remote)?;
            }
        }

        self.catalogue.remove(file_name)?;
        self.cleanup_local_shards(file_name).ok();
        info!(file = file_name, "removal complete");
        Ok(())
    }

    async fn fan_out_remove(self: &Arc<Self>, file_name: &str) -> Result<()> {
        let uncompleted = self.catalogue.uncompleted(file_name)?;
        let mut set: JoinSet<Result<()>> = JoinSet::new();

        for shard in uncompleted {
            let Some(remote) = shard.remote.clone() else {
                continue;
            };
            let engine = Arc::clone(self);
            let file_name = file_name.to_string();
            set.spawn(async move {
                let adapter = engine
                    .find_adapter(&remote)
                    .ok_or(DispersionError::NoRemoteAvailable)?;
                engine.remove_one_shard(&file_name, &shard, &remote, adapter).await
            });
        }

        self.join_and_aggregate(set).await
    }

    async fn remove_one_shard(
        &self,
        file_name: &str,
        shard: &ShardRecord,
        remote: &Remote,
        adapter: Arc<dyn RemoteAdapter>,
    ) -> Result<()> {
        let _permit = self
            .io_permits
            .acquire()
            .await
            .map_err(|e| DispersionError::Interrupted(e.to_string()))?;
        let hashed = hashed_name(&shard.name);
        let remote_path = format!("Distribution/{hashed}");

        adapter
            .delete(&remote_path)
            .await
            .map_err(|e| DispersionError::RemoteFailure {
                remote: remote.name.clone(),
                shard: shard.name.clone(),
                source: e,
            })?;

        self.catalogue.set_shard_check(file_name, &shard.name, true)?;
        debug!(file = file_name, shard = %shard.name, remote = %remote.name, "shard removed");
        Ok(())
    }

    // -------------------------------------------------------------- recovery

    /// Consult the [`RecoverySupervisor`] about whatever operation was interrupted, if any,
    /// and act on its decision: resume by replaying the same operation, or abort by tearing
    /// down the partial state. `dest_dir` is only consulted for a resumed download.
    pub async fn recover(
        self: &Arc<Self>,
        interaction: &dyn Interaction,
        strategy: Strategy,
        passphrase: &str,
        dest_dir: &Path,
    ) -> Result<Option<RecoveryDecision>> {
        let decision = {
            let supervisor = RecoverySupervisor::new(&self.catalogue, interaction);
            supervisor.decide().await
        };

        match &decision {
            None => {}
            Some(RecoveryDecision::Resume { file_name, state }) => match state {
                OperationState::Upload => {
                    self.upload(Path::new(file_name), strategy, passphrase, interaction, true)
                        .await?;
                }
                OperationState::Download => {
                    self.download(file_name, dest_dir, passphrase, true).await?;
                }
                OperationState::Rm => {
                    self.remove(file_name, true).await?;
                }
                OperationState::Idle => {}
            },
            Some(RecoveryDecision::Abort { file_name, state }) => match state {
                OperationState::Upload => self.abort_upload(file_name).await?,
                OperationState::Download => self.abort_download(file_name)?,
                OperationState::Rm | OperationState::Idle => {}
            },
        }

        Ok(decision)
    }

    /// Tear down a declined upload: remove the shards that did make it to a remote (`check`
    /// `true`), delete whatever scratch shards remain locally, and drop the catalogue entry.
    async fn abort_upload(self: &Arc<Self>, file_name: &str) -> Result<()> {
        let record = self
            .catalogue
            .get(file_name)
            .ok_or_else(|| DispersionError::NotFound(file_name.to_string()))?;

        let mut set: JoinSet<Result<()>> = JoinSet::new();
        for shard in record.shards.iter().filter(|s| s.check) {
            let Some(remote) = shard.remote.clone() else {
                continue;
            };
            let engine = Arc::clone(self);
            let shard = shard.clone();
            set.spawn(async move {
                let adapter = engine
                    .find_adapter(&remote)
                    .ok_or(DispersionError::NoRemoteAvailable)?;
                let hashed = hashed_name(&shard.name);
                let remote_path = format!("Distribution/{hashed}");
                adapter
                    .delete(&remote_path)
                    .await
                    .map_err(|e| DispersionError::RemoteFailure {
                        remote: remote.name.clone(),
                        shard: shard.name.clone(),
                        source: e,
                    })
            });
        }
        self.join_and_aggregate(set).await?;

        self.cleanup_local_shards(file_name)?;
        self.catalogue.remove(file_name)?;
        warn!(file = file_name, "aborted interrupted upload, partial shards removed from remotes");
        Ok(())
    }

    /// Tear down a declined download: delete scratch shards that never finished fetching,
    /// then reset the record to idle so a later attempt starts clean.
    fn abort_download(&self, file_name: &str) -> Result<()> {
        if let Some(record) = self.catalogue.get(file_name) {
            let uncompleted: Vec<String> = record
                .shards
                .iter()
                .filter(|s| !s.check)
                .map(|s| hashed_name(&s.name))
                .collect();
            self.shard_store.delete_many(&uncompleted)?;
        }
        self.catalogue.reset(file_name)?;
        warn!(file = file_name, "aborted interrupted download");
        Ok(())
    }

    // ----------------------------------------------------------------- misc

    async fn join_and_aggregate(&self, mut set: JoinSet<Result<()>>) -> Result<()> {
        let mut errors = Vec::new();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) => errors.push(e),
                Err(join_err) => errors.push(DispersionError::Interrupted(join_err.to_string())),
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(DispersionError::aggregate(errors))
        }
    }

    fn cleanup_local_shards(&self, file_name: &str) -> Result<()> {
        if let Some(record) = self.catalogue.get(file_name) {
            let hashed: Vec<String> = record.shards.iter().map(|s| hashed_name(&s.name)).collect();
            self.shard_store.delete_many(&hashed)?;
        }
        Ok(())
    }
}
