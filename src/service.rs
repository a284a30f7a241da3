//! Restore service — one [`SessionState`] per session token.
//!
//! This is the piece a transport (HTTP handler, CLI loop, GUI) sits on top
//! of.  The session map is behind a single mutex, so `accumulate` calls for
//! one session are applied one at a time in arrival order.  Classification and
//! decryption run outside the lock.
//!
//! A scan that fails to decode or classify is rejected before it reaches the
//! accumulator and leaves the session untouched.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use image::RgbaImage;
use thiserror::Error;
use uuid::Uuid;

use crate::backup::{self, BackupError};
use crate::crypto::Kdf;
use crate::recovery::{classify, AuxiliaryTargets, ClassifyError, ScanItem, ScanKind, SessionState};
use crate::visual::{VisualDecoder, VisualError};

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Unknown session {0}")]
    UnknownSession(Uuid),
    #[error(transparent)]
    Classify(#[from] ClassifyError),
    #[error(transparent)]
    Visual(#[from] VisualError),
    #[error("Missing fragments: have {have} of {need}")]
    MissingFragments { have: usize, need: u32 },
    #[error(transparent)]
    Backup(#[from] BackupError),
    #[error("Fragment count must be at least 1")]
    ZeroFragmentCount,
    #[error("Session store lock poisoned")]
    Poisoned,
}

/// What a single accepted scan did to its session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanReceipt {
    pub kind:      ScanKind,
    pub collected: usize,
    pub needed:    u32,
    pub complete:  bool,
}

/// Everything a completed session yields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Restored {
    pub secret:      String,
    pub targets:     AuxiliaryTargets,
    pub hint:        String,
    pub fingerprint: String,
}

pub struct RestoreService {
    fragment_count: u32,
    sessions:       Mutex<HashMap<Uuid, SessionState>>,
}

impl RestoreService {
    pub fn new(fragment_count: u32) -> Result<Self, ServiceError> {
        if fragment_count == 0 {
            return Err(ServiceError::ZeroFragmentCount);
        }
        Ok(Self { fragment_count, sessions: Mutex::new(HashMap::new()) })
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<Uuid, SessionState>>, ServiceError> {
        self.sessions.lock().map_err(|_| ServiceError::Poisoned)
    }

    /// Open a fresh session and return its token.
    pub fn start_session(&self) -> Result<Uuid, ServiceError> {
        let token = Uuid::new_v4();
        self.lock()?.insert(token, SessionState::new(self.fragment_count));
        log::info!("session {token} started");
        Ok(token)
    }

    /// Discard everything gathered so far and start over under the same token.
    pub fn reset_session(&self, token: Uuid) -> Result<(), ServiceError> {
        let mut sessions = self.lock()?;
        let state = sessions.get_mut(&token).ok_or(ServiceError::UnknownSession(token))?;
        *state = SessionState::new(self.fragment_count);
        log::info!("session {token} reset");
        Ok(())
    }

    pub fn end_session(&self, token: Uuid) -> Result<(), ServiceError> {
        self.lock()?
            .remove(&token)
            .map(|_| log::info!("session {token} ended"))
            .ok_or(ServiceError::UnknownSession(token))
    }

    pub fn session_count(&self) -> Result<usize, ServiceError> {
        Ok(self.lock()?.len())
    }

    /// Snapshot of a session's current state.
    pub fn progress(&self, token: Uuid) -> Result<SessionState, ServiceError> {
        self.lock()?
            .get(&token)
            .cloned()
            .ok_or(ServiceError::UnknownSession(token))
    }

    /// Classify one decoded scan and fold it into the session.
    pub fn submit_scan(&self, token: Uuid, decoded: &str) -> Result<ScanReceipt, ServiceError> {
        let item = match classify(decoded) {
            Ok(item) => item,
            Err(e) => {
                log::warn!("session {token}: rejected scan: {e}");
                return Err(e.into());
            }
        };
        self.apply(token, item)
    }

    /// Decode a raster with `decoder`, then proceed as [`submit_scan`].
    ///
    /// [`submit_scan`]: RestoreService::submit_scan
    pub fn submit_raster(
        &self,
        token:   Uuid,
        raster:  &RgbaImage,
        decoder: &dyn VisualDecoder,
    ) -> Result<ScanReceipt, ServiceError> {
        let decoded = decoder.decode(raster).map_err(|e| {
            log::warn!("session {token}: unreadable frame: {e}");
            e
        })?;
        self.submit_scan(token, &decoded)
    }

    fn apply(&self, token: Uuid, item: ScanItem) -> Result<ScanReceipt, ServiceError> {
        let kind = item.kind();
        let mut sessions = self.lock()?;
        let state = sessions.get_mut(&token).ok_or(ServiceError::UnknownSession(token))?;
        let current = std::mem::replace(state, SessionState::new(self.fragment_count));
        *state = current.accumulate(item);

        let receipt = ScanReceipt {
            kind,
            collected: state.collected(),
            needed:    state.fragment_count(),
            complete:  state.is_complete(),
        };
        log::debug!(
            "session {token}: accepted {kind} ({}/{} fragments)",
            receipt.collected,
            receipt.needed
        );
        Ok(receipt)
    }

    /// Reassemble the session's block and open it with `passphrase`.
    pub fn restore(&self, token: Uuid, passphrase: &str, kdf: &dyn Kdf) -> Result<Restored, ServiceError> {
        let state = self.progress(token)?;
        if !state.is_complete() {
            return Err(ServiceError::MissingFragments {
                have: state.collected(),
                need: state.fragment_count(),
            });
        }

        let fragments = state.fragments();
        let block = backup::reassemble(&fragments)?;
        let secret = backup::recover_secret(&block, passphrase, kdf)?;
        let fingerprint = backup::fingerprint(&block.to_serialized());
        log::info!("session {token}: restored backup {fingerprint}");

        Ok(Restored {
            secret,
            targets: state.targets().clone(),
            hint: state.hint().to_owned(),
            fingerprint,
        })
    }
}
