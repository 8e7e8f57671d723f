// Copyright 2024 Saorsa Labs
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistent catalogue storage.
//!
//! All mutations serialize on a single process-wide mutex and are written to disk with a
//! write-temp-then-rename sequence, so a crash never leaves `datamap.json` half-written.
//! The load-balancer state file (`loadbalancer.json`) follows the same discipline through
//! its own guarded store.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use super::model::{CatalogueSnapshot, FileRecord, LoadBalancerState, OperationState, Remote, ShardRecord};
use crate::error::{DispersionError, Result};

fn write_atomic(path: &Path, contents: &str, fsync: bool) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)?;
    let tmp_path = dir.join(format!(
        ".{}.tmp",
        path.file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("catalogue")
    ));
    {
        let mut tmp = fs::File::create(&tmp_path)?;
        tmp.write_all(contents.as_bytes())?;
        if fsync {
            tmp.sync_all()?;
        }
    }
    fs::rename(&tmp_path, path)?;
    Ok(())
}

struct CatalogueState {
    files: HashMap<String, FileRecord>,
}

/// The metadata catalogue: `FileName -> FileRecord`, backed by `datamap.json`.
pub struct Catalogue {
    state: Mutex<CatalogueState>,
    path: PathBuf,
    fsync: bool,
}

impl Catalogue {
    /// Open (or create) the catalogue at `path`.
    pub fn open(path: impl Into<PathBuf>, fsync: bool) -> Result<Self> {
        let path = path.into();
        let files = if path.exists() {
            let raw = fs::read_to_string(&path)?;
            let records: Vec<FileRecord> = serde_json::from_str(&raw)
                .map_err(|e| DispersionError::CatalogueCorrupt(e.to_string()))?;
            records.into_iter().map(|r| (r.file_name.clone(), r)).collect()
        } else {
            HashMap::new()
        };
        Ok(Self {
            state: Mutex::new(CatalogueState { files }),
            path,
            fsync,
        })
    }

    fn persist(&self, state: &CatalogueState) -> Result<()> {
        let mut records: Vec<&FileRecord> = state.files.values().collect();
        records.sort_by(|a, b| a.file_name.cmp(&b.file_name));
        let json = serde_json::to_string_pretty(&records)
            .map_err(|e| DispersionError::CatalogueCorrupt(e.to_string()))?;
        write_atomic(&self.path, &json, self.fsync)
    }

    pub fn get(&self, file_name: &str) -> Option<FileRecord> {
        self.state.lock().files.get(file_name).cloned()
    }

    pub fn exists(&self, file_name: &str) -> bool {
        self.state.lock().files.contains_key(file_name)
    }

    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.state.lock().files.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn upsert(&self, record: FileRecord) -> Result<()> {
        let mut state = self.state.lock();
        state.files.insert(record.file_name.clone(), record);
        self.persist(&state)
    }

    pub fn remove(&self, file_name: &str) -> Result<()> {
        let mut state = self.state.lock();
        if state.files.remove(file_name).is_none() {
            return Err(DispersionError::NotFound(file_name.to_string()));
        }
        self.persist(&state)
    }

    pub fn set_flag(&self, file_name: &str, op_state: OperationState) -> Result<()> {
        let mut state = self.state.lock();
        let record = state
            .files
            .get_mut(file_name)
            .ok_or_else(|| DispersionError::NotFound(file_name.to_string()))?;
        record.flag = true;
        record.state = op_state;
        self.persist(&state)
    }

    pub fn set_shard_check(&self, file_name: &str, shard_name: &str, check: bool) -> Result<()> {
        let mut state = self.state.lock();
        let record = state
            .files
            .get_mut(file_name)
            .ok_or_else(|| DispersionError::NotFound(file_name.to_string()))?;
        let shard = record
            .shards
            .iter_mut()
            .find(|s| s.name == shard_name)
            .ok_or_else(|| DispersionError::NotFound(shard_name.to_string()))?;
        shard.check = check;
        self.persist(&state)
    }

    pub fn set_shard_assignment(
        &self,
        file_name: &str,
        shard_name: &str,
        remote: Remote,
    ) -> Result<()> {
        let mut state = self.state.lock();
        let record = state
            .files
            .get_mut(file_name)
            .ok_or_else(|| DispersionError::NotFound(file_name.to_string()))?;
        let shard = record
            .shards
            .iter_mut()
            .find(|s| s.name == shard_name)
            .ok_or_else(|| DispersionError::NotFound(shard_name.to_string()))?;
        shard.remote = Some(remote);
        self.persist(&state)
    }

    pub fn reset(&self, file_name: &str) -> Result<()> {
        let mut state = self.state.lock();
        let record = state
            .files
            .get_mut(file_name)
            .ok_or_else(|| DispersionError::NotFound(file_name.to_string()))?;
        record.flag = false;
        record.state = OperationState::Idle;
        for shard in &mut record.shards {
            shard.check = false;
        }
        self.persist(&state)
    }

    pub fn uncompleted(&self, file_name: &str) -> Result<Vec<ShardRecord>> {
        let state = self.state.lock();
        let record = state
            .files
            .get(file_name)
            .ok_or_else(|| DispersionError::NotFound(file_name.to_string()))?;
        Ok(record.uncompleted().into_iter().cloned().collect())
    }

    /// Any file whose `flag` is set, i.e. an operation was interrupted mid-flight.
    pub fn in_progress(&self) -> Option<(String, OperationState)> {
        self.state
            .lock()
            .files
            .values()
            .find(|r| r.flag)
            .map(|r| (r.file_name.clone(), r.state))
    }

    pub fn snapshot(&self, load_balancer: LoadBalancerState) -> CatalogueSnapshot {
        let state = self.state.lock();
        let mut files: Vec<FileRecord> = state.files.values().cloned().collect();
        files.sort_by(|a, b| a.file_name.cmp(&b.file_name));
        CatalogueSnapshot {
            files,
            load_balancer,
        }
    }
}

/// Guards `loadbalancer.json` with the same atomic-write discipline as the [`Catalogue`].
pub struct LoadBalancerStore {
    state: Mutex<LoadBalancerState>,
    path: PathBuf,
    fsync: bool,
}

impl LoadBalancerStore {
    pub fn open(path: impl Into<PathBuf>, fsync: bool) -> Result<Self> {
        let path = path.into();
        let state = if path.exists() {
            let raw = fs::read_to_string(&path)?;
            serde_json::from_str(&raw).map_err(|e| DispersionError::CatalogueCorrupt(e.to_string()))?
        } else {
            LoadBalancerState::default()
        };
        Ok(Self {
            state: Mutex::new(state),
            path,
            fsync,
        })
    }

    fn persist(&self, state: &LoadBalancerState) -> Result<()> {
        let json = serde_json::to_string_pretty(state)
            .map_err(|e| DispersionError::CatalogueCorrupt(e.to_string()))?;
        write_atomic(&self.path, &json, self.fsync)
    }

    pub fn snapshot(&self) -> LoadBalancerState {
        self.state.lock().clone()
    }

    pub fn next_round_robin(&self, remote_count: usize) -> Result<usize> {
        if remote_count == 0 {
            return Err(DispersionError::NoRemoteAvailable);
        }
        let mut state = self.state.lock();
        let index = (state.round_robin_counter as usize) % remote_count;
        state.round_robin_counter = state.round_robin_counter.wrapping_add(1);
        self.persist(&state)?;
        Ok(index)
    }

    pub fn record_assignment(&self, remote: &Remote) -> Result<()> {
        let mut state = self.state.lock();
        state.increment(remote);
        self.persist(&state)
    }

    pub fn record_release(&self, remote: &Remote) -> Result<()> {
        let mut state = self.state.lock();
        state.decrement(remote);
        self.persist(&state)
    }
}
