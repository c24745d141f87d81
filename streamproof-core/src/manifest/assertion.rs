//! Hard-binding assertion payloads and the per-chunk Merkle proof.

use ciborium::Value;
use serde::Deserialize;
use serde_bytes::ByteBuf;

use crate::crypto::HashAlg;
use crate::error::{Result, ValidationError};

/// Labels of hard-binding assertions, in lookup order.
pub const HARD_BINDING_ASSERTIONS: [&str; 2] = ["c2pa.hash.data", "c2pa.hash.bmff"];

/// Label of the ingredient assertion.
pub const INGREDIENT_ASSERTION: &str = "c2pa.ingredient";

/// A byte range excluded from a data hash.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HashRange {
    pub start: u64,
    pub length: u64,
}

/// `c2pa.hash.data` payload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DataHash {
    #[serde(default)]
    pub exclusions: Vec<HashRange>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub alg: Option<HashAlg>,
    pub hash: ByteBuf,
}

/// Window inside a matched box to exclude; `length == 0` runs to the box end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct SubsetRange {
    pub offset: usize,
    pub length: usize,
}

/// Bytes that must appear at `offset` in a box for an exclusion to apply.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DataMatch {
    pub offset: usize,
    pub value: ByteBuf,
}

/// One entry of a BMFF hash's exclusion list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExclusionRange {
    /// Box type path, e.g. `/uuid` or `/moof/traf[2]/tfhd`
    pub xpath: String,
    /// Exact box size the exclusion requires
    #[serde(default)]
    pub length: Option<usize>,
    #[serde(default)]
    pub data: Option<Vec<DataMatch>>,
    #[serde(default)]
    pub subset: Option<Vec<SubsetRange>>,
    #[serde(default)]
    pub version: Option<u8>,
    /// 24-bit flags, big endian
    #[serde(default)]
    pub flags: Option<ByteBuf>,
    /// Whether `flags` must match exactly (the default) or share a bit
    #[serde(default)]
    pub exact: Option<bool>,
}

impl ExclusionRange {
    /// The exclusion's flags as a 24-bit value.
    pub fn flags_value(&self) -> Option<u32> {
        let flags = self.flags.as_ref()?;
        match flags.as_slice() {
            [a, b, c, ..] => Some(u32::from_be_bytes([0, *a, *b, *c])),
            _ => None,
        }
    }
}

/// A committed row of the chunk Merkle tree for one track.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MerkleMap {
    pub unique_id: u32,
    pub local_id: u32,
    /// Number of leaves (chunks)
    pub count: usize,
    #[serde(default)]
    pub alg: Option<HashAlg>,
    /// Hash of the init segment with exclusions applied
    #[serde(default)]
    pub init_hash: Option<ByteBuf>,
    pub hashes: Vec<ByteBuf>,
}

/// `c2pa.hash.bmff` payload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BmffHash {
    #[serde(default)]
    pub exclusions: Vec<ExclusionRange>,
    #[serde(default)]
    pub alg: Option<HashAlg>,
    #[serde(default)]
    pub hash: Option<ByteBuf>,
    #[serde(default)]
    pub merkle: Vec<MerkleMap>,
    #[serde(default)]
    pub name: Option<String>,
}

impl BmffHash {
    /// The Merkle row a chunk proof refers to.
    pub fn merkle_row(&self, unique_id: u32, local_id: u32) -> Option<&MerkleMap> {
        self.merkle
            .iter()
            .find(|row| row.unique_id == unique_id && row.local_id == local_id)
    }
}

/// A decoded hard-binding assertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HardBinding {
    Data(DataHash),
    Bmff(BmffHash),
}

impl HardBinding {
    /// Decode the CBOR content of the assertion labelled `label`.
    pub fn decode(label: &str, value: &Value) -> Result<Self> {
        let malformed = |e: ciborium::value::Error| {
            ValidationError::untracked(format!("Malformed '{label}' assertion.")).with_context(e)
        };

        match label {
            "c2pa.hash.data" => Ok(Self::Data(value.deserialized().map_err(malformed)?)),
            "c2pa.hash.bmff" => Ok(Self::Bmff(value.deserialized().map_err(malformed)?)),
            other => Err(ValidationError::untracked(format!(
                "'{other}' is not a hard-binding assertion."
            ))
            .into()),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Data(_) => "c2pa.hash.data",
            Self::Bmff(_) => "c2pa.hash.bmff",
        }
    }

    pub fn as_bmff(&self) -> Option<&BmffHash> {
        match self {
            Self::Bmff(hash) => Some(hash),
            Self::Data(_) => None,
        }
    }
}

/// Per-chunk proof carried in the chunk's c2pa `merkle` box.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BmffMerkleProof {
    pub unique_id: u32,
    pub local_id: u32,
    /// Leaf index of the chunk
    pub location: usize,
    /// Sibling hashes from the leaf up to the committed row
    #[serde(default)]
    pub hashes: Option<Vec<ByteBuf>>,
}

impl BmffMerkleProof {
    /// Decode a proof from the CBOR payload of a c2pa `merkle` box.
    pub fn from_cbor(bytes: &[u8]) -> Result<Self> {
        let value: Value = ciborium::from_reader(bytes).map_err(|e| {
            ValidationError::untracked("Unable to decode the chunk Merkle proof.").with_context(e)
        })?;
        value.deserialized().map_err(|e| {
            ValidationError::untracked("Malformed chunk Merkle proof.")
                .with_context(e)
                .into()
        })
    }

    pub fn sibling_hashes(&self) -> Vec<Vec<u8>> {
        self.hashes
            .iter()
            .flatten()
            .map(|h| h.to_vec())
            .collect()
    }
}
