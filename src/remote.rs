// Copyright 2024 Saorsa Labs
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The Remote Adapter contract.
//!
//! Concrete cloud-backed implementations (Dropbox, S3, Google Drive, ...) are external
//! collaborators; this crate only defines the capability surface the Dispersion Engine and
//! Load Balancer need, plus two test doubles used by the integration tests.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::Mutex;

/// Free-space and identity information returned by [`RemoteAdapter::about`].
#[derive(Debug, Clone, Copy)]
pub struct RemoteInfo {
    pub free_bytes: u64,
}

/// Metadata about a single remote object, returned by [`RemoteAdapter::stat`].
#[derive(Debug, Clone)]
pub struct ObjectStat {
    pub size: u64,
}

/// Uniform capability surface over one configured cloud remote.
///
/// Every remote exposes a top-level `Distribution/` directory that holds only
/// content-hash-named shard objects; adapters are expected to scope all paths under it.
#[async_trait]
pub trait RemoteAdapter: Send + Sync {
    /// Stable identity used as a catalogue/load-balancer key.
    fn name(&self) -> &str;

    async fn copy(&self, local_src: &Path, remote_dst: &str) -> anyhow::Result<()>;
    async fn delete(&self, remote_path: &str) -> anyhow::Result<()>;
    async fn mkdir(&self, remote_path: &str) -> anyhow::Result<()>;
    async fn about(&self) -> anyhow::Result<RemoteInfo>;
    async fn stat(&self, remote_path: &str) -> anyhow::Result<ObjectStat>;
    async fn list(&self, remote_dir: &str) -> anyhow::Result<Vec<String>>;

    /// Fetch an object's bytes down into `local_dst`. Not part of the original six-verb
    /// capability list, but every download needs a read-back path; adapters implement it in
    /// terms of whatever their underlying client calls "download" or "get".
    async fn fetch(&self, remote_path: &str, local_dst: &Path) -> anyhow::Result<()>;
}

/// An in-memory remote used by tests; "free space" is a fixed budget that shrinks as bytes
/// are copied in, so [`Strategy::ResourceBased`](crate::load_balancer::Strategy) has
/// something real to compare across remotes.
pub struct InMemoryRemote {
    name: String,
    capacity: u64,
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl InMemoryRemote {
    pub fn new(name: impl Into<String>, capacity: u64) -> Self {
        Self {
            name: name.into(),
            capacity,
            objects: Mutex::new(HashMap::new()),
        }
    }

    fn used(&self) -> u64 {
        self.objects.lock().values().map(|v| v.len() as u64).sum()
    }
}

#[async_trait]
impl RemoteAdapter for InMemoryRemote {
    fn name(&self) -> &str {
        &self.name
    }

    async fn copy(&self, local_src: &Path, remote_dst: &str) -> anyhow::Result<()> {
        let data = tokio::fs::read(local_src).await?;
        self.objects.lock().insert(remote_dst.to_string(), data);
        Ok(())
    }

    async fn delete(&self, remote_path: &str) -> anyhow::Result<()> {
        self.objects.lock().remove(remote_path);
        Ok(())
    }

    async fn mkdir(&self, _remote_path: &str) -> anyhow::Result<()> {
        Ok(())
    }

    async fn about(&self) -> anyhow::Result<RemoteInfo> {
        Ok(RemoteInfo {
            free_bytes: self.capacity.saturating_sub(self.used()),
        })
    }

    async fn stat(&self, remote_path: &str) -> anyhow::Result<ObjectStat> {
        let objects = self.objects.lock();
        let data = objects
            .get(remote_path)
            .ok_or_else(|| anyhow::anyhow!("object not found: {remote_path}"))?;
        Ok(ObjectStat {
            size: data.len() as u64,
        })
    }

    async fn list(&self, remote_dir: &str) -> anyhow::Result<Vec<String>> {
        let prefix = format!("{remote_dir}/");
        Ok(self
            .objects
            .lock()
            .keys()
            .filter(|k| k.starts_with(&prefix))
            .cloned()
            .collect())
    }

    async fn fetch(&self, remote_path: &str, local_dst: &Path) -> anyhow::Result<()> {
        let data = {
            let objects = self.objects.lock();
            objects
                .get(remote_path)
                .ok_or_else(|| anyhow::anyhow!("object not found: {remote_path}"))?
                .clone()
        };
        tokio::fs::write(local_dst, data).await?;
        Ok(())
    }
}

/// A remote backed by a local directory, used by integration tests that want real file I/O
/// without a network dependency.
pub struct LocalDirRemote {
    name: String,
    root: PathBuf,
}

impl LocalDirRemote {
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
        }
    }

    fn resolve(&self, remote_path: &str) -> PathBuf {
        self.root.join(remote_path)
    }
}

#[async_trait]
impl RemoteAdapter for LocalDirRemote {
    fn name(&self) -> &str {
        &self.name
    }

    async fn copy(&self, local_src: &Path, remote_dst: &str) -> anyhow::Result<()> {
        let dst = self.resolve(remote_dst);
        if let Some(parent) = dst.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(local_src, dst).await?;
        Ok(())
    }

    async fn delete(&self, remote_path: &str) -> anyhow::Result<()> {
        let path = self.resolve(remote_path);
        if tokio::fs::metadata(&path).await.is_ok() {
            tokio::fs::remove_file(path).await?;
        }
        Ok(())
    }

    async fn mkdir(&self, remote_path: &str) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(self.resolve(remote_path)).await?;
        Ok(())
    }

    async fn about(&self) -> anyhow::Result<RemoteInfo> {
        // Local disks don't expose a meaningful quota in tests; report a large constant so
        // ResourceBased selection degrades to "first remote" deterministically.
        Ok(RemoteInfo {
            free_bytes: u64::MAX,
        })
    }

    async fn stat(&self, remote_path: &str) -> anyhow::Result<ObjectStat> {
        let meta = tokio::fs::metadata(self.resolve(remote_path)).await?;
        Ok(ObjectStat { size: meta.len() })
    }

    async fn list(&self, remote_dir: &str) -> anyhow::Result<Vec<String>> {
        let dir = self.resolve(remote_dir);
        let mut names = Vec::new();
        let mut entries = tokio::fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if let Some(name) = entry.file_name().to_str() {
                names.push(format!("{remote_dir}/{name}"));
            }
        }
        Ok(names)
    }

    async fn fetch(&self, remote_path: &str, local_dst: &Path) -> anyhow::Result<()> {
        tokio::fs::copy(self.resolve(remote_path), local_dst).await?;
        Ok(())
    }
}
