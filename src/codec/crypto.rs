// Copyright 2024 Saorsa Labs
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Passphrase-based file encryption: Argon2id key derivation feeding AES-256-GCM.
//!
//! The ciphertext header is `salt(16) || nonce(12) || ciphertext`; both salt and nonce are
//! generated fresh per encode and travel with the file, so `decode` only ever needs the
//! caller's passphrase to re-derive the same key.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use argon2::Argon2;
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{DispersionError, Result};

const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;

#[derive(Zeroize, ZeroizeOnDrop)]
struct EncryptionKey([u8; 32]);

fn derive_key(passphrase: &str, salt: &[u8], params: &Argon2Params) -> Result<EncryptionKey> {
    let argon2 = Argon2::new(
        argon2::Algorithm::Argon2id,
        argon2::Version::V0x13,
        argon2::Params::new(params.memory_kib, params.iterations, params.parallelism, Some(32))
            .map_err(|e| DispersionError::EncodeError(format!("invalid kdf params: {e}")))?,
    );
    let mut key = [0u8; 32];
    argon2
        .hash_password_into(passphrase.as_bytes(), salt, &mut key)
        .map_err(|e| DispersionError::EncodeError(format!("kdf failure: {e}")))?;
    Ok(EncryptionKey(key))
}

/// Argon2id cost parameters, threaded in from [`crate::config::Config`].
#[derive(Debug, Clone, Copy)]
pub struct Argon2Params {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

/// Encrypt `plaintext` under `passphrase`, returning the full `salt || nonce || ciphertext`
/// blob.
pub fn encrypt(plaintext: &[u8], passphrase: &str, params: Argon2Params) -> Result<Vec<u8>> {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    let key = derive_key(passphrase, &salt, &params)?;
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key.0));
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|e| DispersionError::EncodeError(format!("encryption failed: {e}")))?;

    let mut out = Vec::with_capacity(SALT_LEN + NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&salt);
    out.extend_from_slice(nonce.as_slice());
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Decrypt a blob produced by [`encrypt`].
pub fn decrypt(blob: &[u8], passphrase: &str, params: Argon2Params) -> Result<Vec<u8>> {
    if blob.len() < SALT_LEN + NONCE_LEN {
        return Err(DispersionError::DecodeError(
            "ciphertext shorter than header".into(),
        ));
    }
    let (salt, rest) = blob.split_at(SALT_LEN);
    let (nonce_bytes, ciphertext) = rest.split_at(NONCE_LEN);

    let key = derive_key(passphrase, salt, &params)?;
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key.0));
    let nonce = Nonce::from_slice(nonce_bytes);
    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|e| DispersionError::DecodeError(format!("decryption failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_params() -> Argon2Params {
        // Minimal but valid cost parameters so tests run quickly.
        Argon2Params {
            memory_kib: 8,
            iterations: 1,
            parallelism: 1,
        }
    }

    #[test]
    fn round_trip() {
        let plaintext = b"Hello, world!";
        let blob = encrypt(plaintext, "correct horse", fast_params()).unwrap();
        let out = decrypt(&blob, "correct horse", fast_params()).unwrap();
        assert_eq!(out, plaintext);
    }

    #[test]
    fn wrong_passphrase_fails() {
        let blob = encrypt(b"secret", "right", fast_params()).unwrap();
        assert!(decrypt(&blob, "wrong", fast_params()).is_err());
    }

    #[test]
    fn truncated_blob_fails() {
        assert!(decrypt(&[0u8; 4], "pw", fast_params()).is_err());
    }

    #[test]
    fn two_encryptions_differ() {
        let blob1 = encrypt(b"same data", "pw", fast_params()).unwrap();
        let blob2 = encrypt(b"same data", "pw", fast_params()).unwrap();
        assert_ne!(blob1, blob2, "fresh salt/nonce should vary ciphertext");
    }
}
