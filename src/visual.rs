//! Visual-code collaborator contracts.
//!
//! The symbology itself (QR or otherwise) lives outside this crate.  An
//! encoder turns text into a raster; a decoder reads one code back out of a
//! raster.  Both work on `image::RgbaImage` so the layout engine can place the
//! encoder's output directly.

use image::RgbaImage;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VisualError {
    #[error("No visual code found in image")]
    NoCodeFound,
    #[error("Visual code is corrupt: {0}")]
    Corrupt(String),
    #[error("Visual code encoding failed: {0}")]
    Encode(String),
}

/// Error-correction level requested from the encoder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EccLevel {
    Low,
    Medium,
    Quartile,
    #[default]
    High,
}

pub trait VisualEncoder {
    fn encode(&self, text: &str, ecc: EccLevel) -> Result<RgbaImage, VisualError>;
}

pub trait VisualDecoder {
    fn decode(&self, raster: &RgbaImage) -> Result<String, VisualError>;
}
