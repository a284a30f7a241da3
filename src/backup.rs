//! High-level backup API — the primary embedding surface.
//!
//! ```no_run
//! use fragvault::backup::{create_backup, reassemble, recover_secret, BackupOptions};
//! use fragvault::block::Secret;
//! use fragvault::crypto::Argon2Kdf;
//!
//! let kdf = Argon2Kdf::default();
//! let secrets = [Secret::new("seed words", "first passphrase")];
//!
//! // Create
//! let backup = create_backup(&secrets, &kdf, &BackupOptions::default())?;
//! for wire in backup.wire_fragments() {
//!     println!("{wire}"); // hand each to a visual-code encoder
//! }
//!
//! // Restore
//! let block = reassemble(&backup.fragments)?;
//! assert_eq!(recover_secret(&block, "first passphrase", &kdf)?, "seed words");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use image::RgbaImage;
use thiserror::Error;

use crate::block::{self, Block, BlockError, Secret};
use crate::capacity::{CapacityPlan, FitError};
use crate::codec::{self, CodecError, OrderedFragment};
use crate::config::{DEFAULT_FRAGMENT_COUNT, DEFAULT_HEADER_SLOTS};
use crate::crypto::Kdf;
use crate::layout::{self, LayoutError, LayoutSpec};
use crate::recovery::AuxiliaryTargets;
use crate::visual::{EccLevel, VisualEncoder, VisualError};

// ── Errors ───────────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum BackupError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    /// Every capacity up to the ceiling was too small.  Fatal for this backup.
    #[error("Secrets do not fit: capacity exhausted after {attempts} attempts ({last_capacity} B)")]
    CapacityExhausted { attempts: u32, last_capacity: usize },
    #[error("Encryption failed: {0}")]
    Encryption(BlockError),
    #[error("Unable to decrypt block")]
    DecryptionFailed,
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Layout(#[from] LayoutError),
    #[error(transparent)]
    Visual(#[from] VisualError),
}

impl From<FitError<BlockError>> for BackupError {
    fn from(e: FitError<BlockError>) -> Self {
        match e {
            FitError::CapacityExhausted { attempts, last_capacity } => {
                BackupError::CapacityExhausted { attempts, last_capacity }
            }
            FitError::Attempt(BlockError::InvalidArgument(msg)) => BackupError::InvalidArgument(msg),
            FitError::Attempt(other) => BackupError::Encryption(other),
        }
    }
}

// ── Options ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupOptions {
    pub fragment_count: u32,
    pub header_slots:   usize,
    pub capacity:       CapacityPlan,
    pub ecc:            EccLevel,
    pub layout:         LayoutSpec,
}

impl Default for BackupOptions {
    fn default() -> Self {
        Self {
            fragment_count: DEFAULT_FRAGMENT_COUNT,
            header_slots:   DEFAULT_HEADER_SLOTS,
            capacity:       CapacityPlan::default(),
            ecc:            EccLevel::default(),
            layout:         LayoutSpec::default(),
        }
    }
}

// ── Backup ───────────────────────────────────────────────────────────────────

/// A freshly created backup: the block, its serialized text and the
/// fragments that text was split into.
#[derive(Debug, Clone)]
pub struct Backup {
    pub block:      Block,
    pub serialized: String,
    pub fragments:  Vec<OrderedFragment>,
    /// Data-region capacity the block was sealed at, in bytes.
    pub capacity:   usize,
}

/// Short BLAKE3 fingerprint of a serialized block (16 hex chars).
pub fn fingerprint(serialized: &str) -> String {
    hex::encode(&blake3::hash(serialized.as_bytes()).as_bytes()[..8])
}

/// Encrypt `secrets`, growing the data capacity as needed, then split the
/// serialized block into `opts.fragment_count` fragments.
pub fn create_backup(
    secrets: &[Secret],
    kdf:     &dyn Kdf,
    opts:    &BackupOptions,
) -> Result<Backup, BackupError> {
    if opts.fragment_count == 0 {
        return Err(BackupError::InvalidArgument("fragment count must be at least 1".into()));
    }

    let fitted = opts
        .capacity
        .fit(|attempt| block::encrypt(secrets, kdf, opts.header_slots, attempt.capacity))?;
    let block      = fitted.value;
    let serialized = block.to_serialized();
    let fragments  = codec::partition(&serialized, opts.fragment_count)?;

    log::info!(
        "created backup {} ({} secrets, capacity {} B, {} fragments)",
        fingerprint(&serialized),
        secrets.len(),
        fitted.attempt.capacity,
        fragments.len()
    );

    Ok(Backup { block, serialized, fragments, capacity: fitted.attempt.capacity })
}

impl Backup {
    pub fn fingerprint(&self) -> String {
        fingerprint(&self.serialized)
    }

    /// JSON text for each fragment's visual code, in order.
    pub fn wire_fragments(&self) -> Vec<String> {
        self.fragments.iter().map(OrderedFragment::to_wire).collect()
    }

    /// Encode every fragment (and the target list, when given) and compose
    /// them onto one image.
    pub fn render(
        &self,
        encoder: &dyn VisualEncoder,
        targets: Option<&AuxiliaryTargets>,
        label:   Option<&str>,
        opts:    &BackupOptions,
    ) -> Result<RgbaImage, BackupError> {
        let codes = self
            .fragments
            .iter()
            .map(|f| encoder.encode(&f.to_wire(), opts.ecc))
            .collect::<Result<Vec<_>, _>>()?;
        let aux = targets.map(|t| encoder.encode(&t.to_wire(), opts.ecc)).transpose()?;
        Ok(layout::compose(&codes, aux.as_ref(), label, &opts.layout)?)
    }
}

// ── Restore ──────────────────────────────────────────────────────────────────

/// Join a complete fragment set and parse the block it carries.
///
/// An incomplete set is reported as [`BackupError::Codec`]; a complete set
/// whose text does not parse as a block is [`BackupError::DecryptionFailed`].
pub fn reassemble(fragments: &[OrderedFragment]) -> Result<Block, BackupError> {
    let serialized = codec::join(fragments)?;
    log::debug!("reassembled block {}", fingerprint(&serialized));
    Block::from_serialized(&serialized).map_err(|e| {
        log::debug!("reassembled text is not a block: {e}");
        BackupError::DecryptionFailed
    })
}

/// Open the message sealed for `passphrase`.
///
/// Any failure is reported as [`BackupError::DecryptionFailed`].
pub fn recover_secret(block: &Block, passphrase: &str, kdf: &dyn Kdf) -> Result<String, BackupError> {
    let message = block
        .decrypt(passphrase, kdf)
        .map_err(|_| BackupError::DecryptionFailed)?;
    Ok(String::from_utf8_lossy(&message).into_owned())
}
