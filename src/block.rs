//! Multi-secret encrypted block and its serialized text form.
//!
//! # Block layout
//!
//! | Field     | Size                        | Contents |
//! |-----------|-----------------------------|----------|
//! | `salt`    | 16 B                        | KDF salt shared by every secret |
//! | `iv`      | 12 B                        | Base nonce |
//! | `headers` | `slots × 24` B              | One sealed `(offset u32 LE, length u32 LE)` per secret, random fill for unused slots |
//! | `data`    | `capacity` B                | Sealed messages back to back, random fill to `capacity` |
//!
//! Every secret gets its own key (`Kdf(passphrase, salt)`).  A reader holding
//! one passphrase tries each header slot until one authenticates, then opens
//! the data range that header points at.  The padding makes the block size
//! independent of how many secrets it carries.
//!
//! Slot `i` seals its header under nonce counter `2i` and its message under
//! `2i + 1`; the counter is XORed into the last four IV bytes (big-endian).
//!
//! # Serialized form
//!
//! `base64( json { salt, iv, headers, data } )` with each field standard
//! base64.  This is the text the fragment codec partitions.

use std::collections::HashSet;
use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use serde_json::Value;
use thiserror::Error;

use crate::crypto::{self, CryptoError, Kdf, NONCE_LEN, TAG_LEN};

/// Byte length of the KDF salt.
pub const SALT_LEN: usize = 16;
/// Plaintext length of one header record: offset + length.
pub const HEADER_RECORD_LEN: usize = 8;
/// Sealed length of one header slot.
pub const HEADER_SLOT_LEN: usize = HEADER_RECORD_LEN + TAG_LEN;

// ── Errors ───────────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum BlockError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    /// The sealed messages do not fit the data region at this capacity.
    #[error("Payload too large: {needed} B needed, capacity {capacity} B")]
    PayloadTooLarge { needed: usize, capacity: usize },
    /// Wrong passphrase or corrupted block.  Deliberately carries no detail.
    #[error("Unable to decrypt block")]
    DecryptionFailed,
    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),
}

#[derive(Error, Debug)]
pub enum PayloadError {
    #[error("Serialized block is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("Serialized block is not valid UTF-8")]
    Utf8,
    #[error("Serialized block is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Serialized block is not a JSON object")]
    NotAnObject,
    #[error("Payload missing {0}")]
    MissingField(&'static str),
    #[error("Payload field {field} is not valid base64")]
    InvalidField { field: &'static str },
}

// ── Secret ───────────────────────────────────────────────────────────────────

/// One message and the passphrase that unlocks it.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret {
    pub message:    String,
    pub passphrase: String,
}

impl Secret {
    pub fn new(message: impl Into<String>, passphrase: impl Into<String>) -> Self {
        Self { message: message.into(), passphrase: passphrase.into() }
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secret")
            .field("message", &format_args!("<{} bytes>", self.message.len()))
            .field("passphrase", &"<redacted>")
            .finish()
    }
}

// ── Block ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub salt:    Vec<u8>,
    pub iv:      Vec<u8>,
    pub headers: Vec<u8>,
    pub data:    Vec<u8>,
}

fn slot_nonce(iv: &[u8], counter: u32) -> [u8; NONCE_LEN] {
    let mut nonce = [0u8; NONCE_LEN];
    nonce.copy_from_slice(iv);
    let tail = BigEndian::read_u32(&nonce[8..]) ^ counter;
    BigEndian::write_u32(&mut nonce[8..], tail);
    nonce
}

/// Bytes the data region needs to hold every sealed message.
pub fn required_capacity(secrets: &[Secret]) -> usize {
    secrets.iter().map(|s| s.message.len() + TAG_LEN).sum()
}

fn validate(secrets: &[Secret], header_slots: usize) -> Result<(), BlockError> {
    if secrets.is_empty() {
        return Err(BlockError::InvalidArgument("at least one secret is required".into()));
    }
    if secrets.len() > header_slots {
        return Err(BlockError::InvalidArgument(format!(
            "{} secrets exceed {} header slots",
            secrets.len(),
            header_slots
        )));
    }
    let mut seen = HashSet::new();
    for (i, s) in secrets.iter().enumerate() {
        if s.message.is_empty() || s.passphrase.is_empty() {
            return Err(BlockError::InvalidArgument(format!(
                "secret {} has an empty message or passphrase",
                i + 1
            )));
        }
        if !seen.insert(s.passphrase.as_str()) {
            return Err(BlockError::InvalidArgument(format!(
                "secret {} reuses another secret's passphrase",
                i + 1
            )));
        }
    }
    Ok(())
}

/// Seal `secrets` into a block with `header_slots` header slots and a data
/// region of exactly `capacity` bytes.
///
/// The capacity check runs before any key derivation, so an undersized
/// attempt costs nothing but the check.
pub fn encrypt(
    secrets:      &[Secret],
    kdf:          &dyn Kdf,
    header_slots: usize,
    capacity:     usize,
) -> Result<Block, BlockError> {
    validate(secrets, header_slots)?;
    if u32::try_from(capacity).is_err() {
        return Err(BlockError::InvalidArgument(format!("capacity {capacity} exceeds u32")));
    }
    let needed = required_capacity(secrets);
    if needed > capacity {
        return Err(BlockError::PayloadTooLarge { needed, capacity });
    }

    let salt = crypto::random_bytes(SALT_LEN);
    let iv   = crypto::random_bytes(NONCE_LEN);

    let mut data    = Vec::with_capacity(capacity);
    let mut headers = Vec::with_capacity(header_slots * HEADER_SLOT_LEN);

    for (i, secret) in secrets.iter().enumerate() {
        let key    = kdf.derive(&secret.passphrase, &salt)?;
        let slot   = i as u32;
        let sealed = crypto::seal(&key, &slot_nonce(&iv, 2 * slot + 1), secret.message.as_bytes())?;

        let mut record = [0u8; HEADER_RECORD_LEN];
        LittleEndian::write_u32(&mut record[..4], data.len() as u32);
        LittleEndian::write_u32(&mut record[4..], sealed.len() as u32);
        headers.extend(crypto::seal(&key, &slot_nonce(&iv, 2 * slot), &record)?);
        data.extend(sealed);
    }

    for _ in secrets.len()..header_slots {
        headers.extend(crypto::random_bytes(HEADER_SLOT_LEN));
    }
    data.extend(crypto::random_bytes(capacity - data.len()));

    Ok(Block { salt, iv, headers, data })
}

/// Recover the message sealed for `passphrase`.
///
/// Every failure — wrong passphrase, truncated fields, tampered bytes, KDF
/// error — is reported as [`BlockError::DecryptionFailed`].
pub fn decrypt(
    passphrase: &str,
    salt:       &[u8],
    iv:         &[u8],
    headers:    &[u8],
    data:       &[u8],
    kdf:        &dyn Kdf,
) -> Result<Vec<u8>, BlockError> {
    if iv.len() != NONCE_LEN || headers.is_empty() || headers.len() % HEADER_SLOT_LEN != 0 {
        return Err(BlockError::DecryptionFailed);
    }
    let key = kdf.derive(passphrase, salt).map_err(|_| BlockError::DecryptionFailed)?;

    for (i, slot) in headers.chunks_exact(HEADER_SLOT_LEN).enumerate() {
        let counter = i as u32;
        let record = match crypto::open(&key, &slot_nonce(iv, 2 * counter), slot) {
            Ok(r) => r,
            Err(_) => continue,
        };
        let offset = LittleEndian::read_u32(&record[..4]) as usize;
        let length = LittleEndian::read_u32(&record[4..]) as usize;
        let sealed = offset
            .checked_add(length)
            .and_then(|end| data.get(offset..end))
            .ok_or(BlockError::DecryptionFailed)?;
        return crypto::open(&key, &slot_nonce(iv, 2 * counter + 1), sealed)
            .map_err(|_| BlockError::DecryptionFailed);
    }
    Err(BlockError::DecryptionFailed)
}

impl Block {
    /// Recover the message sealed for `passphrase` in this block.
    pub fn decrypt(&self, passphrase: &str, kdf: &dyn Kdf) -> Result<Vec<u8>, BlockError> {
        decrypt(passphrase, &self.salt, &self.iv, &self.headers, &self.data, kdf)
    }

    /// Serialize to the transportable text the fragment codec partitions.
    pub fn to_serialized(&self) -> String {
        let json = serde_json::json!({
            "salt":    STANDARD.encode(&self.salt),
            "iv":      STANDARD.encode(&self.iv),
            "headers": STANDARD.encode(&self.headers),
            "data":    STANDARD.encode(&self.data),
        });
        STANDARD.encode(json.to_string())
    }

    /// Parse text produced by [`Block::to_serialized`].
    pub fn from_serialized(text: &str) -> Result<Self, PayloadError> {
        let raw  = STANDARD.decode(text.trim())?;
        let json = String::from_utf8(raw).map_err(|_| PayloadError::Utf8)?;
        let value: Value = serde_json::from_str(&json)?;
        let obj = value.as_object().ok_or(PayloadError::NotAnObject)?;

        let field = |name: &'static str| -> Result<Vec<u8>, PayloadError> {
            let text = obj
                .get(name)
                .and_then(Value::as_str)
                .ok_or(PayloadError::MissingField(name))?;
            STANDARD
                .decode(text)
                .map_err(|_| PayloadError::InvalidField { field: name })
        };

        Ok(Self {
            salt:    field("salt")?,
            iv:      field("iv")?,
            headers: field("headers")?,
            data:    field("data")?,
        })
    }
}
