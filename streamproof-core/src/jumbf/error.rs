//! JUMBF parse errors

use thiserror::Error;

/// Errors raised while flattening a JUMBF buffer
#[derive(Debug, Error)]
pub enum JumbfError {
    /// Fewer bytes remain than a box header or declared box size needs
    #[error("truncated box at offset {offset}: need {needed} bytes, {available} available")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// Declared box size is smaller than its own header
    #[error("invalid box size {size} at offset {offset}")]
    InvalidSize { offset: usize, size: u64 },

    /// Superboxes nest deeper than the parser accepts
    #[error("boxes nested deeper than {0} levels")]
    TooDeep(usize),

    /// A description box is malformed
    #[error("invalid description box at offset {offset}: {reason}")]
    InvalidDescription { offset: usize, reason: String },

    /// A `cbor` box does not hold a CBOR item
    #[error("invalid CBOR content at offset {offset}: {reason}")]
    Cbor { offset: usize, reason: String },

    /// A `json` box does not hold JSON
    #[error("invalid JSON content at offset {offset}: {reason}")]
    Json { offset: usize, reason: String },

    /// The buffer holds no boxes at all
    #[error("no JUMBF boxes found")]
    Empty,
}
