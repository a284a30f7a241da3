//! Capacity-fitting retry loop around block encryption.
//!
//! The data region of a block has a fixed capacity of `unit × multiplier`
//! bytes.  Starting from `base_multiplier`, each attempt that fails with a
//! "payload too large" condition is retried with the multiplier bumped by one.
//! Once the multiplier would pass `max_multiplier` the loop gives up with
//! [`FitError::CapacityExhausted`].  Any other failure is returned at once.
//!
//! The ceiling guards against a misbehaving encryptor; it is not a model of
//! how large a real secret set can grow.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::block::BlockError;

/// Default capacity unit in bytes.
pub const DEFAULT_UNIT: usize = 64;
/// Default first multiplier tried.
pub const DEFAULT_BASE_MULTIPLIER: u32 = 10;
/// Default last multiplier tried.
pub const DEFAULT_MAX_MULTIPLIER: u32 = 20;

/// Errors that can signal "this capacity is too small, try a bigger one".
pub trait Oversized {
    fn is_oversized(&self) -> bool;
}

impl Oversized for BlockError {
    fn is_oversized(&self) -> bool {
        matches!(self, BlockError::PayloadTooLarge { .. })
    }
}

#[derive(Error, Debug)]
pub enum FitError<E: std::error::Error + 'static> {
    #[error("Capacity exhausted after {attempts} attempts (last capacity {last_capacity} B)")]
    CapacityExhausted { attempts: u32, last_capacity: usize },
    #[error(transparent)]
    Attempt(E),
}

/// One try at a given capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attempt {
    /// 1-based attempt number.
    pub number:     u32,
    pub multiplier: u32,
    /// `unit × multiplier`, in bytes.
    pub capacity:   usize,
}

/// Successful outcome plus the attempt that produced it.
#[derive(Debug, Clone)]
pub struct Fitted<T> {
    pub value:   T,
    pub attempt: Attempt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapacityPlan {
    pub unit:            usize,
    pub base_multiplier: u32,
    pub max_multiplier:  u32,
}

impl Default for CapacityPlan {
    fn default() -> Self {
        Self {
            unit:            DEFAULT_UNIT,
            base_multiplier: DEFAULT_BASE_MULTIPLIER,
            max_multiplier:  DEFAULT_MAX_MULTIPLIER,
        }
    }
}

impl CapacityPlan {
    /// Number of attempts the loop makes before giving up.
    pub fn max_attempts(&self) -> u32 {
        if self.base_multiplier > self.max_multiplier {
            0
        } else {
            self.max_multiplier - self.base_multiplier + 1
        }
    }

    /// Drive `encrypt` with growing capacity until it succeeds.
    ///
    /// `encrypt` receives each [`Attempt`] in turn.  Attempts run strictly in
    /// sequence; nothing is carried from one to the next except the attempt
    /// counter.
    pub fn fit<T, E, F>(&self, mut encrypt: F) -> Result<Fitted<T>, FitError<E>>
    where
        E: std::error::Error + Oversized + 'static,
        F: FnMut(Attempt) -> Result<T, E>,
    {
        let mut last_capacity = 0usize;
        let mut number = 0u32;

        for multiplier in self.base_multiplier..=self.max_multiplier {
            number += 1;
            let capacity = self.unit.saturating_mul(multiplier as usize);
            let attempt = Attempt { number, multiplier, capacity };
            last_capacity = capacity;

            match encrypt(attempt) {
                Ok(value) => {
                    log::debug!("payload fits at capacity {capacity} B (attempt {number})");
                    return Ok(Fitted { value, attempt });
                }
                Err(e) if e.is_oversized() => {
                    log::debug!("attempt {number}: capacity {capacity} B too small, growing");
                }
                Err(e) => return Err(FitError::Attempt(e)),
            }
        }

        log::warn!("capacity exhausted after {number} attempts");
        Err(FitError::CapacityExhausted { attempts: number, last_capacity })
    }
}
