//! Cryptographic primitives: hashing, COSE signatures, X.509 chains and
//! Merkle proofs.

pub mod cose;
pub mod hash;
pub mod merkle;
pub mod signature;
pub mod x509;

pub use cose::{CoseError, CoseSign1};
pub use hash::HashAlg;
pub use merkle::{MerkleNode, MerkleRow};
pub use signature::{CoseAlgorithm, SignatureParams};
pub use x509::{ChainError, ChainValidation, X509Chain};
