// Copyright 2024 Saorsa Labs
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Local scratch storage for shards in flight.
//!
//! The store never inspects shard contents. Logical shard names (which embed the original
//! file name and index) are content-hash-renamed on disk so nothing about the original file
//! is visible from a directory listing. Writes use the same write-temp-then-rename idiom as
//! the catalogue.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::error::Result;

/// Derive the on-disk hashed name for a logical shard name.
pub fn hashed_name(logical_name: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(logical_name.as_bytes());
    hex::encode(hasher.finalize())
}

/// Local scratch directory holding shard files named by [`hashed_name`].
pub struct ShardStore {
    root: PathBuf,
}

impl ShardStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, hashed: &str) -> PathBuf {
        self.root.join(hashed)
    }

    /// Write `data` under the hashed name derived from `logical_name`, atomically.
    pub fn put(&self, logical_name: &str, data: &[u8]) -> Result<String> {
        let hashed = hashed_name(logical_name);
        let dest = self.path_for(&hashed);
        let tmp = self.root.join(format!(".{hashed}.tmp"));
        {
            let mut f = fs::File::create(&tmp)?;
            f.write_all(data)?;
        }
        fs::rename(&tmp, &dest)?;
        Ok(hashed)
    }

    pub fn read(&self, hashed: &str) -> Result<Vec<u8>> {
        Ok(fs::read(self.path_for(hashed))?)
    }

    pub fn exists(&self, hashed: &str) -> bool {
        self.path_for(hashed).exists()
    }

    pub fn delete(&self, hashed: &str) -> Result<()> {
        let path = self.path_for(hashed);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    pub fn delete_many(&self, hashed_names: &[String]) -> Result<()> {
        for name in hashed_names {
            self.delete(name)?;
        }
        Ok(())
    }

    pub fn delete_all(&self) -> Result<()> {
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                fs::remove_file(entry.path())?;
            }
        }
        Ok(())
    }
}
