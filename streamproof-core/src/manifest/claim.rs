//! The claim: the signed statement listing a manifest's assertions.

use ciborium::Value;
use serde::Deserialize;
use serde_bytes::ByteBuf;

use crate::crypto::HashAlg;
use crate::error::{C2paError, Result, ValidationError};

/// Reference to an assertion with the hash of its box content.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HashedUri {
    /// JUMBF URI, e.g. `self#jumbf=c2pa.assertions/c2pa.hash.bmff`
    pub url: String,
    #[serde(default)]
    pub alg: Option<HashAlg>,
    pub hash: ByteBuf,
}

impl HashedUri {
    /// Assertion label: the last URI path segment.
    pub fn label(&self) -> &str {
        self.url.rsplit('/').next().unwrap_or(&self.url)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClaimGeneratorInfo {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
}

/// A decoded claim.
///
/// Keeps the CBOR value it was decoded from; the signature covers its
/// canonical encoding, not the typed fields.
#[derive(Debug, Clone, Deserialize)]
pub struct Claim {
    #[serde(default)]
    pub claim_generator: String,
    #[serde(default)]
    pub claim_generator_info: Vec<ClaimGeneratorInfo>,
    /// JUMBF URI of the claim signature box
    pub signature: String,
    #[serde(default)]
    pub assertions: Vec<HashedUri>,
    /// Default hash algorithm for assertions without their own
    #[serde(default)]
    pub alg: Option<HashAlg>,
    #[serde(default, rename = "dc:format")]
    pub format: Option<String>,
    #[serde(default, rename = "dc:title")]
    pub title: Option<String>,
    #[serde(default, rename = "instanceID")]
    pub instance_id: Option<String>,
    #[serde(skip, default = "null_value")]
    raw: Value,
}

fn null_value() -> Value {
    Value::Null
}

impl Claim {
    /// Decode a claim from its CBOR box content.
    ///
    /// An unknown hash algorithm name fails here rather than at hashing time.
    pub fn from_value(value: &Value) -> Result<Self> {
        let mut claim: Claim = value.deserialized().map_err(|e| {
            ValidationError::untracked("Unable to decode the claim.").with_context(e)
        })?;
        claim.raw = value.clone();
        Ok(claim)
    }

    /// The CBOR value the claim was decoded from.
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    /// Canonical CBOR encoding of the claim: definite lengths, shortest
    /// integer forms, original map order.
    pub fn canonical_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        ciborium::into_writer(&self.raw, &mut out).map_err(C2paError::cbor)?;
        Ok(out)
    }

    /// Human-readable name of the generator that produced the claim.
    pub fn generator_name(&self) -> &str {
        if !self.claim_generator.is_empty() {
            return &self.claim_generator;
        }
        self.claim_generator_info
            .first()
            .map(|info| info.name.as_str())
            .unwrap_or_default()
    }

    /// Labels of the referenced assertions, in claim order.
    pub fn assertion_labels(&self) -> Vec<&str> {
        self.assertions.iter().map(HashedUri::label).collect()
    }
}
