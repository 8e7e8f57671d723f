// Copyright 2024 Saorsa Labs
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reed-Solomon streaming split/encode/verify/reconstruct/join over `GF(2^8)`.
//!
//! Shards are always handled as a flat `Vec<Vec<u8>>` (present) or `Vec<Option<Vec<u8>>>`
//! (some missing) in index order: `0..k` are data shards, `k..k+parity` are parity shards.
//! This mirrors the streaming encoder/decoder semantics of splitting into equal blocks,
//! zero-padding the last one, computing parity, and later verifying before joining.

use reed_solomon_erasure::galois_8::ReedSolomon;
use sha2::{Digest, Sha256};

use super::params::ShardParams;
use crate::error::{DispersionError, Result};

/// SHA-256 hex digest of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Split `data` into `params.k` equally-sized data shards, right-padding the final shard
/// with zero bytes. Returns the shards, the per-shard size, and the exact padding count.
pub fn split(data: &[u8], params: ShardParams) -> (Vec<Vec<u8>>, usize, usize) {
    let k = params.k;
    let shard_size = data.len().div_ceil(k).max(1);
    let padded_len = shard_size * k;
    let padding = padded_len - data.len();

    let mut shards = Vec::with_capacity(k);
    for i in 0..k {
        let start = i * shard_size;
        let end = ((i + 1) * shard_size).min(data.len());
        let mut shard = vec![0u8; shard_size];
        if start < data.len() {
            shard[..end - start].copy_from_slice(&data[start..end]);
        }
        shards.push(shard);
    }
    (shards, shard_size, padding)
}

/// Compute the `params.parity` parity shards for a complete set of `params.k` data shards,
/// returning the full `n`-length shard set (data shards first, parity shards appended).
pub fn encode_parity(data_shards: Vec<Vec<u8>>, params: ShardParams) -> Result<Vec<Vec<u8>>> {
    if data_shards.len() != params.k {
        return Err(DispersionError::EncodeError(format!(
            "expected {} data shards, got {}",
            params.k,
            data_shards.len()
        )));
    }
    let shard_size = data_shards[0].len();
    let rs = ReedSolomon::new(params.k, params.parity)
        .map_err(|e| DispersionError::EncodeError(format!("reed-solomon init: {e}")))?;

    let mut shards = data_shards;
    shards.extend((0..params.parity).map(|_| vec![0u8; shard_size]));
    rs.encode(&mut shards)
        .map_err(|e| DispersionError::EncodeError(format!("reed-solomon encode: {e}")))?;
    Ok(shards)
}

/// Verify that the present shards are mutually consistent (parity matches data).
pub fn verify(shards: &[Vec<u8>], params: ShardParams) -> Result<bool> {
    let rs = ReedSolomon::new(params.k, params.parity)
        .map_err(|e| DispersionError::DecodeError(format!("reed-solomon init: {e}")))?;
    Ok(rs.verify(shards).unwrap_or(false))
}

/// Reconstruct any `None` entries in `shards` from the surviving entries. Fails with
/// [`DispersionError::TooFewShards`] if fewer than `params.k` entries are present.
pub fn reconstruct(shards: &mut Vec<Option<Vec<u8>>>, params: ShardParams) -> Result<()> {
    let have = shards.iter().filter(|s| s.is_some()).count();
    if have < params.k {
        return Err(DispersionError::TooFewShards {
            have,
            need: params.k,
        });
    }
    let rs = ReedSolomon::new(params.k, params.parity)
        .map_err(|e| DispersionError::DecodeError(format!("reed-solomon init: {e}")))?;
    rs.reconstruct(shards)
        .map_err(|e| DispersionError::DecodeError(format!("reed-solomon reconstruct: {e}")))?;
    Ok(())
}

/// Join the first `k` (data) shards back into the original byte stream, trimming exactly
/// `padding` trailing zero bytes.
pub fn join(shards: &[Vec<u8>], params: ShardParams, padding: usize) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    for shard in shards.iter().take(params.k) {
        out.extend_from_slice(shard);
    }
    if padding > out.len() {
        return Err(DispersionError::DecodeError(
            "short data: joined length is less than the recorded padding".into(),
        ));
    }
    out.truncate(out.len() - padding);
    Ok(out)
}
