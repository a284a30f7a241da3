//! Fragment codec: split serialized block text into ordered fragments and
//! join them back.
//!
//! # Partition rules
//! - `n ≥ 1` fragments, orders `1..=n`.
//! - Fragments `1..n-1` hold `floor(len / n)` characters each; fragment `n`
//!   absorbs the remainder.
//! - Lengths count Unicode scalar values, never bytes, so any text splits on
//!   character boundaries.  Serialized blocks are ASCII, where the two agree.
//!
//! # Join rules
//! The orders must be exactly `{1..=max}` with no duplicates.  Payloads are
//! concatenated by ascending order regardless of input order.
//!
//! # Wire shape
//! One fragment travels as `{"order": n, "base64": "..."}`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ── Error type ───────────────────────────────────────────────────────────────

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CodecError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(&'static str),
    /// Fragment orders do not cover `1..=n` exactly once.
    #[error("Incomplete fragment set: {reason}")]
    IncompleteSet { reason: String },
}

// ── OrderedFragment ──────────────────────────────────────────────────────────

/// One ordered slice of a serialized block.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderedFragment {
    /// 1-based position.
    pub order:   u32,
    #[serde(rename = "base64", alias = "payload")]
    pub payload: String,
}

impl OrderedFragment {
    pub fn new(order: u32, payload: impl Into<String>) -> Self {
        Self { order, payload: payload.into() }
    }

    /// JSON text carried by this fragment's visual code.
    pub fn to_wire(&self) -> String {
        serde_json::json!({ "order": self.order, "base64": self.payload }).to_string()
    }
}

// ── Partition / join ─────────────────────────────────────────────────────────

/// Split `block` into `n` contiguous fragments.
pub fn partition(block: &str, n: u32) -> Result<Vec<OrderedFragment>, CodecError> {
    if n == 0 {
        return Err(CodecError::InvalidArgument("fragment count must be at least 1"));
    }
    if block.is_empty() {
        return Err(CodecError::InvalidArgument("cannot partition an empty block"));
    }

    // Byte offset of every character boundary, plus the end.
    let bounds: Vec<usize> = block
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(block.len()))
        .collect();
    let len  = bounds.len() - 1;
    let size = len / n as usize;

    let fragments = (0..n as usize)
        .map(|i| {
            let start = bounds[i * size];
            let end   = if i + 1 == n as usize { block.len() } else { bounds[(i + 1) * size] };
            OrderedFragment::new(i as u32 + 1, &block[start..end])
        })
        .collect();
    Ok(fragments)
}

/// Concatenate `fragments` by ascending order.
pub fn join(fragments: &[OrderedFragment]) -> Result<String, CodecError> {
    let n = fragments.iter().map(|f| f.order).max().ok_or_else(|| CodecError::IncompleteSet {
        reason: "no fragments".into(),
    })?;
    if n as usize > fragments.len() {
        return Err(CodecError::IncompleteSet {
            reason: format!("{} fragments cannot cover orders 1..={}", fragments.len(), n),
        });
    }

    let mut slots: Vec<Option<&OrderedFragment>> = vec![None; n as usize];
    for f in fragments {
        if f.order == 0 {
            return Err(CodecError::IncompleteSet { reason: "fragment order 0".into() });
        }
        let slot = &mut slots[(f.order - 1) as usize];
        if slot.is_some() {
            return Err(CodecError::IncompleteSet {
                reason: format!("duplicate fragment {}", f.order),
            });
        }
        *slot = Some(f);
    }

    let mut out = String::new();
    for (i, slot) in slots.into_iter().enumerate() {
        match slot {
            Some(f) => out.push_str(&f.payload),
            None => {
                return Err(CodecError::IncompleteSet {
                    reason: format!("missing fragment {} of {}", i + 1, n),
                })
            }
        }
    }
    Ok(out)
}
