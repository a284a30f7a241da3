//! TOML configuration.
//!
//! Every key is optional; anything left out keeps its default.
//!
//! ```toml
//! fragment_count = 4
//! header_slots   = 4
//! ecc            = "high"
//!
//! [capacity]
//! unit            = 64
//! base_multiplier = 10
//! max_multiplier  = 20
//!
//! [kdf]
//! memory_kib  = 65536
//! passes      = 10
//! parallelism = 2
//!
//! [layout]
//! canvas_width  = 1000
//! canvas_height = 1600
//! margin        = 24
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::backup::BackupOptions;
use crate::capacity::CapacityPlan;
use crate::crypto::{Argon2Kdf, KdfParams};
use crate::layout::LayoutSpec;
use crate::visual::EccLevel;

/// Fragments per backup in the reference configuration.
pub const DEFAULT_FRAGMENT_COUNT: u32 = 4;
/// Header slots per block, i.e. the most secrets one backup can carry.
pub const DEFAULT_HEADER_SLOTS: usize = 4;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read config {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
    #[error("Invalid config syntax: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub fragment_count: u32,
    pub header_slots:   usize,
    pub ecc:            EccLevel,
    pub capacity:       CapacityPlan,
    pub kdf:            KdfParams,
    pub layout:         LayoutSpec,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fragment_count: DEFAULT_FRAGMENT_COUNT,
            header_slots:   DEFAULT_HEADER_SLOTS,
            ecc:            EccLevel::default(),
            capacity:       CapacityPlan::default(),
            kdf:            KdfParams::default(),
            layout:         LayoutSpec::default(),
        }
    }
}

impl Config {
    /// Load from `path`, or return defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(p) => {
                let text = fs::read_to_string(p)
                    .map_err(|source| ConfigError::Io { path: p.to_owned(), source })?;
                log::debug!("loading config from {}", p.display());
                Self::from_toml_str(&text)?
            }
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let fail = |msg: &str| Err(ConfigError::Invalid(msg.to_owned()));
        if self.fragment_count == 0 {
            return fail("fragment_count must be at least 1");
        }
        if self.header_slots == 0 {
            return fail("header_slots must be at least 1");
        }
        if self.capacity.unit == 0 || self.capacity.base_multiplier == 0 {
            return fail("capacity unit and base_multiplier must be at least 1");
        }
        if self.capacity.base_multiplier > self.capacity.max_multiplier {
            return fail("capacity base_multiplier exceeds max_multiplier");
        }
        if self.layout.canvas_width == 0 || self.layout.canvas_height == 0 {
            return fail("layout canvas dimensions must be non-zero");
        }
        Ok(())
    }

    pub fn backup_options(&self) -> BackupOptions {
        BackupOptions {
            fragment_count: self.fragment_count,
            header_slots:   self.header_slots,
            capacity:       self.capacity,
            ecc:            self.ecc,
            layout:         self.layout,
        }
    }

    pub fn kdf(&self) -> Argon2Kdf {
        Argon2Kdf::new(self.kdf)
    }
}
