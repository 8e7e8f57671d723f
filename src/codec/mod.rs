// Copyright 2024 Saorsa Labs
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The Codec: encrypt → split → parity on the way in, verify → reconstruct → join →
//! decrypt on the way out.
//!
//! This module only moves bytes; it has no opinion about where shards end up on disk or
//! which remote they're copied to (see [`crate::shard_store`] and
//! [`crate::dispersion`] respectively).

pub mod crypto;
pub mod params;
mod rs;

pub use crypto::Argon2Params;
pub use params::ShardParams;
pub use rs::sha256_hex;

use crate::error::{DispersionError, Result};

/// One finished shard ready to be written to the shard store and dispersed.
#[derive(Debug, Clone)]
pub struct EncodedShard {
    pub index: usize,
    pub name: String,
    pub data: Vec<u8>,
    pub checksum: String,
}

/// The full output of [`encode`]: every shard plus the bookkeeping a [`crate::catalogue::FileRecord`]
/// needs to later decode.
#[derive(Debug, Clone)]
pub struct EncodedFile {
    pub shards: Vec<EncodedShard>,
    pub shard_size: usize,
    pub padding: usize,
    pub params: ShardParams,
    /// SHA-256 of the original plaintext (before encryption).
    pub file_checksum: String,
}

/// Encrypt, split, and parity-encode `plaintext`, logically named `file_name` (used to build
/// each shard's logical name as `"{file_name}.{index}"`).
pub fn encode(
    plaintext: &[u8],
    file_name: &str,
    passphrase: &str,
    argon2: Argon2Params,
) -> Result<EncodedFile> {
    if plaintext.is_empty() {
        return Err(DispersionError::EncodeError(
            "short data: cannot encode an empty file".into(),
        ));
    }

    let file_checksum = sha256_hex(plaintext);
    let params = ShardParams::from_file_size(plaintext.len() as u64);

    let ciphertext = crypto::encrypt(plaintext, passphrase, argon2)?;
    let (data_shards, shard_size, padding) = rs::split(&ciphertext, params);
    let all_shards = rs::encode_parity(data_shards, params)?;

    let shards = all_shards
        .into_iter()
        .enumerate()
        .map(|(index, data)| EncodedShard {
            checksum: sha256_hex(&data),
            name: format!("{file_name}.{index}"),
            index,
            data,
        })
        .collect();

    Ok(EncodedFile {
        shards,
        shard_size,
        padding,
        params,
        file_checksum,
    })
}

/// Reconstruct and decrypt a file from its (possibly incomplete) shard set.
///
/// `shards[i]` must be `Some(bytes)` for every shard the caller could retrieve and read back
/// successfully, `None` for anything missing or that failed its integrity check.
pub fn decode(
    shards: Vec<Option<Vec<u8>>>,
    params: ShardParams,
    padding: usize,
    expected_file_checksum: &str,
    passphrase: &str,
    argon2: Argon2Params,
) -> Result<Vec<u8>> {
    let mut shards = shards;
    if shards.len() != params.n() {
        return Err(DispersionError::DecodeError(format!(
            "expected {} shards, got {}",
            params.n(),
            shards.len()
        )));
    }

    let present: Vec<Vec<u8>> = shards.iter().filter_map(|s| s.clone()).collect();
    let needs_reconstruct = shards.iter().any(|s| s.is_none())
        || !rs::verify(&present, params).unwrap_or(false);

    if needs_reconstruct {
        rs::reconstruct(&mut shards, params)?;
        let rebuilt: Vec<Vec<u8>> = shards
            .iter()
            .map(|s| s.clone().expect("reconstruct fills every slot or returns an error"))
            .collect();
        if !rs::verify(&rebuilt, params).unwrap_or(false) {
            return Err(DispersionError::DecodeError(
                "shard mismatch: parity disagrees with data after reconstruction".into(),
            ));
        }
    }

    let full: Vec<Vec<u8>> = shards
        .into_iter()
        .map(|s| s.expect("reconstruct fills every slot or returns an error"))
        .collect();

    let ciphertext = rs::join(&full, params, padding)?;
    let plaintext = crypto::decrypt(&ciphertext, passphrase, argon2)?;

    let actual_checksum = sha256_hex(&plaintext);
    if actual_checksum != expected_file_checksum {
        return Err(DispersionError::IntegrityMismatch {
            what: "decoded file".into(),
            expected: expected_file_checksum.to_string(),
            actual: actual_checksum,
        });
    }
    Ok(plaintext)
}

/// Re-hash a locally present shard and compare against the catalogue-recorded checksum.
/// Used by the dispersion engine before decode to decide which shards to trust.
pub fn shard_checksum_matches(data: &[u8], expected_checksum: &str) -> bool {
    sha256_hex(data) == expected_checksum
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_params() -> Argon2Params {
        Argon2Params {
            memory_kib: 8,
            iterations: 1,
            parallelism: 1,
        }
    }

    #[test]
    fn encode_decode_round_trip() {
        let plaintext = b"Hello, world!".to_vec();
        let encoded = encode(&plaintext, "hello.txt", "pw", fast_params()).unwrap();
        assert_eq!(encoded.shards.len(), encoded.params.n());

        let shards: Vec<Option<Vec<u8>>> = encoded
            .shards
            .iter()
            .map(|s| Some(s.data.clone()))
            .collect();
        let decoded = decode(
            shards,
            encoded.params,
            encoded.padding,
            &encoded.file_checksum,
            "pw",
            fast_params(),
        )
        .unwrap();
        assert_eq!(decoded, plaintext);
    }

    #[test]
    fn decode_reconstructs_missing_shards() {
        let plaintext = b"some reasonably sized payload for erasure testing purposes".to_vec();
        let encoded = encode(&plaintext, "f.bin", "pw", fast_params()).unwrap();
        let parity = encoded.params.parity;

        let mut shards: Vec<Option<Vec<u8>>> = encoded
            .shards
            .iter()
            .map(|s| Some(s.data.clone()))
            .collect();
        for i in 0..parity {
            shards[i] = None;
        }

        let decoded = decode(
            shards,
            encoded.params,
            encoded.padding,
            &encoded.file_checksum,
            "pw",
            fast_params(),
        )
        .unwrap();
        assert_eq!(decoded, plaintext);
    }

    #[test]
    fn decode_fails_with_too_few_shards() {
        let plaintext = b"payload".to_vec();
        let encoded = encode(&plaintext, "f.bin", "pw", fast_params()).unwrap();
        let mut shards: Vec<Option<Vec<u8>>> = encoded
            .shards
            .iter()
            .map(|s| Some(s.data.clone()))
            .collect();
        for slot in shards.iter_mut().take(encoded.params.parity + 1) {
            *slot = None;
        }
        let err = decode(
            shards,
            encoded.params,
            encoded.padding,
            &encoded.file_checksum,
            "pw",
            fast_params(),
        )
        .unwrap_err();
        assert!(matches!(err, DispersionError::TooFewShards { .. }));
    }

    #[test]
    fn empty_file_is_rejected() {
        let err = encode(b"", "empty.bin", "pw", fast_params()).unwrap_err();
        assert!(matches!(err, DispersionError::EncodeError(_)));
    }

    #[test]
    fn tampered_shards_fail_verify_after_reconstruct() {
        let plaintext = b"some reasonably sized payload for erasure testing purposes".to_vec();
        let encoded = encode(&plaintext, "f.bin", "pw", fast_params()).unwrap();
        let mut shards: Vec<Option<Vec<u8>>> = encoded
            .shards
            .iter()
            .map(|s| Some(s.data.clone()))
            .collect();
        // Drop one shard (forcing reconstruction) and corrupt a surviving one so the
        // post-reconstruct verify catches the tamper instead of silently joining garbage.
        shards[0] = None;
        if let Some(tampered) = shards[1].as_mut() {
            tampered[0] ^= 0xff;
        }
        let err = decode(
            shards,
            encoded.params,
            encoded.padding,
            &encoded.file_checksum,
            "pw",
            fast_params(),
        )
        .unwrap_err();
        assert!(matches!(err, DispersionError::DecodeError(_)));
    }

    #[test]
    fn shard_checksum_helper_detects_mismatch() {
        let data = b"shard bytes";
        let checksum = sha256_hex(data);
        assert!(shard_checksum_matches(data, &checksum));
        assert!(!shard_checksum_matches(b"tampered", &checksum));
    }
}
