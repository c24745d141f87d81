//! BMFF demultiplexing errors

use thiserror::Error;

/// Errors raised while indexing an ISO BMFF buffer
#[derive(Debug, Error)]
pub enum BmffError {
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

    /// Containers nest deeper than the demuxer accepts
    #[error("boxes nested deeper than {0} levels")]
    TooDeep(usize),

    /// The c2pa `uuid` box does not follow its layout
    #[error("invalid c2pa box at offset {offset}: {reason}")]
    InvalidC2paBox { offset: usize, reason: String },
}
