//! The C2PA `uuid` box carried in init segments and media chunks.

use super::error::BmffError;
use super::BmffBox;

/// User type of the C2PA box: `D8FEC3D6-1B0E-483C-9297-5828877EC481`.
pub const C2PA_BOX_UUID: [u8; 16] = [
    0xD8, 0xFE, 0xC3, 0xD6, 0x1B, 0x0E, 0x48, 0x3C, 0x92, 0x97, 0x58, 0x28, 0x87, 0x7E, 0xC4, 0x81,
];

/// What a C2PA box carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum C2paPurpose {
    /// A JUMBF manifest store, preceded by the offset of the first Merkle box
    Manifest { merkle_offset: u64 },
    /// A CBOR chunk proof
    Merkle,
    Other(String),
}

impl C2paPurpose {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Manifest { .. } => "manifest",
            Self::Merkle => "merkle",
            Self::Other(purpose) => purpose,
        }
    }
}

/// A decoded C2PA box borrowing its payload from the segment buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct C2paBox<'a> {
    pub purpose: C2paPurpose,
    pub version: u8,
    pub flags: u32,
    /// Manifest store bytes or CBOR proof bytes
    pub payload: &'a [u8],
}

impl<'a> C2paBox<'a> {
    /// Decode `record` against the buffer it was indexed from.
    pub fn decode(record: &BmffBox, buf: &'a [u8]) -> Result<Self, BmffError> {
        let invalid = |reason: &str| BmffError::InvalidC2paBox {
            offset: record.start,
            reason: reason.to_string(),
        };

        let body = buf
            .get(record.payload_range())
            .ok_or_else(|| invalid("box exceeds buffer"))?;
        if body.len() < 4 {
            return Err(invalid("missing version and flags"));
        }

        let version = body[0];
        let flags = u32::from_be_bytes([0, body[1], body[2], body[3]]);
        let rest = &body[4..];

        let nul = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| invalid("unterminated purpose"))?;
        let purpose = String::from_utf8_lossy(&rest[..nul]).into_owned();
        let rest = &rest[nul + 1..];

        let (purpose, payload) = match purpose.as_str() {
            "manifest" => {
                let offset_bytes = rest
                    .get(..8)
                    .ok_or_else(|| invalid("missing merkle offset"))?;
                let mut offset = [0u8; 8];
                offset.copy_from_slice(offset_bytes);
                (
                    C2paPurpose::Manifest {
                        merkle_offset: u64::from_be_bytes(offset),
                    },
                    &rest[8..],
                )
            }
            "merkle" => (C2paPurpose::Merkle, rest),
            _ => (C2paPurpose::Other(purpose), rest),
        };

        Ok(Self {
            purpose,
            version,
            flags,
            payload,
        })
    }

    pub fn is_manifest(&self) -> bool {
        matches!(self.purpose, C2paPurpose::Manifest { .. })
    }
}
