//! Argon2id key derivation and AES-256-GCM sealing for backup blocks.
//!
//! Key derivation: Argon2id(passphrase, salt) → 32-byte key
//! Sealing:        AES-256-GCM with a caller-supplied 12-byte nonce
//!
//! Sealed layout: [ ciphertext | GCM tag (16 B) ]
//!
//! Nonces are not stored alongside each sealed record; the block layer
//! derives them from the block IV and the slot index (see `block.rs`).

use aes_gcm::aead::rand_core::RngCore;
use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use argon2::{Algorithm, Argon2, Params, Version};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Byte length of an AES-GCM nonce.
pub const NONCE_LEN: usize = 12;
/// Byte length of the GCM authentication tag appended to every sealed record.
pub const TAG_LEN: usize = 16;
/// Byte length of a derived key.
pub const KEY_LEN: usize = 32;

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Sealing failed")]
    SealFailed,
    #[error("Authentication failed — wrong key or corrupted data")]
    OpenFailed,
    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),
    #[error("Nonce must be {NONCE_LEN} bytes, got {0}")]
    BadNonce(usize),
}

/// Derives a fixed-length key from a passphrase and a salt.
///
/// Implementations must be deterministic: the same passphrase and salt always
/// yield the same key.
pub trait Kdf: Send + Sync {
    fn derive(&self, passphrase: &str, salt: &[u8]) -> Result<[u8; KEY_LEN], CryptoError>;
}

/// Argon2 cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KdfParams {
    /// Memory cost in KiB.
    pub memory_kib:  u32,
    /// Number of passes over memory.
    pub passes:      u32,
    /// Degree of parallelism (lanes).
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self { memory_kib: 64 * 1024, passes: 10, parallelism: 2 }
    }
}

/// Argon2id key derivation.
#[derive(Debug, Clone, Default)]
pub struct Argon2Kdf {
    params: KdfParams,
}

impl Argon2Kdf {
    pub fn new(params: KdfParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> KdfParams {
        self.params
    }
}

impl Kdf for Argon2Kdf {
    fn derive(&self, passphrase: &str, salt: &[u8]) -> Result<[u8; KEY_LEN], CryptoError> {
        let params = Params::new(
            self.params.memory_kib,
            self.params.passes,
            self.params.parallelism,
            Some(KEY_LEN),
        )
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
        let mut key = [0u8; KEY_LEN];
        argon2
            .hash_password_into(passphrase.as_bytes(), salt, &mut key)
            .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
        Ok(key)
    }
}

/// Fill a fresh buffer of `len` bytes from the OS RNG.
pub fn random_bytes(len: usize) -> Vec<u8> {
    let mut out = vec![0u8; len];
    OsRng.fill_bytes(&mut out);
    out
}

/// Seal `plaintext` with AES-256-GCM under `key` and `nonce`.
///
/// Returns `ciphertext || GCM-tag (16 B)`.
pub fn seal(key: &[u8; KEY_LEN], nonce: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if nonce.len() != NONCE_LEN {
        return Err(CryptoError::BadNonce(nonce.len()));
    }
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| CryptoError::SealFailed)?;
    cipher
        .encrypt(Nonce::from_slice(nonce), plaintext)
        .map_err(|_| CryptoError::SealFailed)
}

/// Open a record produced by [`seal`].
pub fn open(key: &[u8; KEY_LEN], nonce: &[u8], sealed: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if nonce.len() != NONCE_LEN {
        return Err(CryptoError::BadNonce(nonce.len()));
    }
    if sealed.len() < TAG_LEN {
        return Err(CryptoError::OpenFailed);
    }
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| CryptoError::OpenFailed)?;
    cipher
        .decrypt(Nonce::from_slice(nonce), sealed)
        .map_err(|_| CryptoError::OpenFailed)
}
