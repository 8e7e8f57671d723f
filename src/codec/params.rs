// Copyright 2024 Saorsa Labs
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adaptive `(k, parity)` selection based on file size.

use crate::error::{DispersionError, Result};

const MIB: u64 = 1024 * 1024;
const LARGE_FILE_THRESHOLD: u64 = 10 * MIB;

/// Reed-Solomon shard counts for one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardParams {
    pub k: usize,
    pub parity: usize,
}

impl ShardParams {
    pub fn new(k: usize, parity: usize) -> Result<Self> {
        if k == 0 || parity == 0 {
            return Err(DispersionError::EncodeError(format!(
                "invalid shard params: k={k}, parity={parity}"
            )));
        }
        if k + parity > 256 {
            return Err(DispersionError::EncodeError(format!(
                "k + parity must be <= 256, got {}",
                k + parity
            )));
        }
        Ok(Self { k, parity })
    }

    pub fn n(&self) -> usize {
        self.k + self.parity
    }

    /// Choose `(k, parity)` for a file of `file_size` bytes.
    ///
    /// Files at or above 10 MiB start from `k=170, parity=85` and back off `k` in steps of
    /// 10 (halving parity along with it) while each shard would still exceed 10 MiB and
    /// `k > 10`; smaller files use a fixed `k=5, parity=3`.
    pub fn from_file_size(file_size: u64) -> Self {
        if file_size < LARGE_FILE_THRESHOLD {
            return Self { k: 5, parity: 3 };
        }

        let mut k: u64 = 170;
        let mut parity: u64 = 85;
        while k > 10 && file_size / k < LARGE_FILE_THRESHOLD {
            k -= 10;
            parity = k / 2;
        }
        Self {
            k: k as usize,
            parity: parity.max(1) as usize,
        }
    }
}
