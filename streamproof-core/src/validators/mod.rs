//! Validation steps run by the stream orchestrator.
//!
//! Init segments go through [`SignatureValidator`] then [`AssertionValidator`];
//! every media chunk goes through a [`ContentValidator`].

mod assertion;
mod content;
mod signature;

pub use assertion::{check_structure, AssertionValidator};
pub use content::{hash_with_exclusions, included_ranges, ContentValidator};
pub use signature::SignatureValidator;
