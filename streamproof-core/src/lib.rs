//! Streamproof Core - C2PA validation for fragmented streaming video
//!
//! This crate verifies the content credentials embedded in fragmented MP4
//! streams: the manifest carried by each track's init segment and the
//! per-chunk Merkle proofs that bind every media chunk to the signed content.
//!
//! # Features
//!
//! - JUMBF manifest store parsing with URI, label and type-tag navigation
//! - COSE_Sign1 claim signature verification (ECDSA, RSASSA-PSS, EdDSA)
//! - X.509 certificate chain policy checks and path validation
//! - Assertion hash verification and hard-binding resolution
//! - Streaming content binding through exclusion-aware hashing and
//!   irregular Merkle tree proofs
//! - Per-track state machine driven from async host code
//!
//! # Example
//!
//! ```no_run
//! use streamproof_core::{MediaChunk, StreamValidator, ValidationEvent, ValidatorConfig};
//!
//! # async fn example(init: Vec<u8>, chunk: Vec<u8>) -> streamproof_core::Result<()> {
//! let (validator, mut events) = StreamValidator::new(ValidatorConfig::from_env());
//!
//! // The init segment carries the manifest
//! validator.init_segment("video", init).await?;
//!
//! // Each chunk carries a Merkle proof against the manifest's hash assertion
//! let result = validator
//!     .validate_segment(MediaChunk::new("video", 0.0, 2.0, chunk))
//!     .await?;
//! println!("chunk valid: {:?}", result.map(|r| r.valid));
//!
//! while let Ok(event) = events.try_recv() {
//!     if let ValidationEvent::Status(report) = event {
//!         println!("{}: {}", report.track, report.status);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod bmff;
pub mod config;
pub mod crypto;
pub mod error;
pub mod jumbf;
pub mod manifest;
pub mod state;
pub mod stream;
pub mod validators;

// Re-export main types for convenience
pub use config::ValidatorConfig;
pub use error::{C2paError, Result, ValidationError};
pub use manifest::{Claim, HardBinding, Manifest, ManifestStore, ManifestType};
pub use state::{
    ChunkValidationResult, ClaimSummary, StatusReport, TrackState, TrackStatus, ValidationEvent,
};
pub use stream::{MediaChunk, StreamValidator};
