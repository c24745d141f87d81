//! JUMBF box types and payload decoders.
//!
//! Each box type with a known layout has a decoder in [`DECODERS`]. Boxes of
//! any other type keep their payload as an opaque [`ByteRange`] into the
//! original buffer.

use std::fmt;

use super::error::JumbfError;

/// A four-character box type such as `jumb` or `jumd`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoxType(pub [u8; 4]);

impl BoxType {
    /// JUMBF superbox
    pub const JUMB: BoxType = BoxType(*b"jumb");
    /// JUMBF description box
    pub const JUMD: BoxType = BoxType(*b"jumd");
    /// CBOR content box
    pub const CBOR: BoxType = BoxType(*b"cbor");
    /// JSON content box
    pub const JSON: BoxType = BoxType(*b"json");
    /// Embedded file description box
    pub const BFDB: BoxType = BoxType(*b"bfdb");

    /// Box types whose payload is a sequence of child boxes.
    pub const CONTAINERS: &'static [BoxType] = &[BoxType::JUMB];

    /// Whether boxes of this type hold child boxes.
    pub fn is_container(self) -> bool {
        Self::CONTAINERS.contains(&self)
    }

    /// The type as text, with non-ASCII bytes replaced.
    pub fn as_string(self) -> String {
        String::from_utf8_lossy(&self.0).into_owned()
    }
}

impl fmt::Display for BoxType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_string())
    }
}

impl fmt::Debug for BoxType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BoxType({self})")
    }
}

impl PartialEq<&str> for BoxType {
    fn eq(&self, other: &&str) -> bool {
        self.0.as_slice() == other.as_bytes()
    }
}

/// A `{offset, length}` window into the buffer a box was parsed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ByteRange {
    pub offset: usize,
    pub length: usize,
}

impl ByteRange {
    pub fn new(offset: usize, length: usize) -> Self {
        Self { offset, length }
    }

    /// One past the last byte of the range.
    pub fn end(&self) -> usize {
        self.offset + self.length
    }

    /// Borrow the range from `buf`, or `None` if it does not fit.
    pub fn slice<'a>(&self, buf: &'a [u8]) -> Option<&'a [u8]> {
        buf.get(self.offset..self.end())
    }
}

/// Decoded content of a `jumd` box.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptionBox {
    /// Content type UUID of the superbox
    pub uuid: [u8; 16],
    /// First four UUID bytes as text, e.g. `c2pa`, `c2ma`, `c2cl`
    pub type_tag: String,
    /// Raw toggles byte
    pub toggles: u8,
    /// Label, present when toggle bit 1 is set
    pub label: Option<String>,
    /// Numeric id, present when toggle bit 2 is set
    pub id: Option<u32>,
    /// SHA-256 signature of the superbox, present when toggle bit 3 is set
    pub signature: Option<[u8; 32]>,
}

impl DescriptionBox {
    const REQUESTABLE: u8 = 0x01;
    const HAS_LABEL: u8 = 0x02;
    const HAS_ID: u8 = 0x04;
    const HAS_SIGNATURE: u8 = 0x08;

    /// Whether the superbox may be requested by label.
    pub fn is_requestable(&self) -> bool {
        self.toggles & Self::REQUESTABLE != 0
    }

    /// The UUID as upper-case hex.
    pub fn uuid_hex(&self) -> String {
        hex::encode_upper(self.uuid)
    }

    fn parse(data: &[u8], offset: usize) -> Result<Self, JumbfError> {
        let invalid = |reason: &str| JumbfError::InvalidDescription {
            offset,
            reason: reason.to_string(),
        };

        if data.len() < 17 {
            return Err(invalid("shorter than UUID and toggles"));
        }

        let mut uuid = [0u8; 16];
        uuid.copy_from_slice(&data[..16]);
        let type_tag = String::from_utf8_lossy(&uuid[..4])
            .trim_end_matches('\0')
            .to_string();
        let toggles = data[16];
        let mut pos = 17;

        let label = if toggles & Self::HAS_LABEL != 0 {
            let (label, next) = read_c_string(data, pos);
            pos = next;
            Some(label)
        } else {
            None
        };

        let id = if toggles & Self::HAS_ID != 0 {
            let bytes = data
                .get(pos..pos + 4)
                .ok_or_else(|| invalid("missing id field"))?;
            pos += 4;
            Some(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
        } else {
            None
        };

        let signature = if toggles & Self::HAS_SIGNATURE != 0 {
            let bytes = data
                .get(pos..pos + 32)
                .ok_or_else(|| invalid("missing signature field"))?;
            let mut sig = [0u8; 32];
            sig.copy_from_slice(bytes);
            Some(sig)
        } else {
            None
        };

        Ok(Self {
            uuid,
            type_tag,
            toggles,
            label,
            id,
            signature,
        })
    }
}

/// Decoded content of a `bfdb` box.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDescription {
    pub toggles: u8,
    pub media_type: String,
    pub file_name: Option<String>,
    /// Whether the file data lives outside the manifest store
    pub external: bool,
}

impl FileDescription {
    fn parse(data: &[u8]) -> Self {
        let toggles = data.first().copied().unwrap_or_default();
        let (media_type, next) = read_c_string(data, 1);
        let file_name = if toggles & 0x01 != 0 {
            Some(read_c_string(data, next).0)
        } else {
            None
        };

        Self {
            toggles,
            media_type,
            file_name,
            external: toggles & 0x02 != 0,
        }
    }
}

/// Payload of a single box.
///
/// A box is a container iff its payload is [`BoxPayload::Container`]; the
/// range then covers the child boxes (everything after the box header).
#[derive(Debug, Clone, PartialEq)]
pub enum BoxPayload {
    Container(ByteRange),
    Description(DescriptionBox),
    Cbor(ciborium::Value),
    Json(serde_json::Value),
    File(FileDescription),
    Binary(ByteRange),
}

impl BoxPayload {
    pub fn as_description(&self) -> Option<&DescriptionBox> {
        match self {
            Self::Description(desc) => Some(desc),
            _ => None,
        }
    }

    pub fn as_cbor(&self) -> Option<&ciborium::Value> {
        match self {
            Self::Cbor(value) => Some(value),
            _ => None,
        }
    }
}

type Decoder = fn(&[u8], ByteRange) -> Result<BoxPayload, JumbfError>;

/// Payload decoders keyed by box type.
pub const DECODERS: &[(BoxType, Decoder)] = &[
    (BoxType::JUMD, decode_description),
    (BoxType::CBOR, decode_cbor),
    (BoxType::JSON, decode_json),
    (BoxType::BFDB, decode_file_description),
];

/// Decode the payload of a non-container box found at `range` in `buf`.
pub fn decode_payload(
    box_type: BoxType,
    buf: &[u8],
    range: ByteRange,
) -> Result<BoxPayload, JumbfError> {
    let data = range.slice(buf).ok_or(JumbfError::Truncated {
        offset: range.offset,
        needed: range.length,
        available: buf.len().saturating_sub(range.offset),
    })?;

    match DECODERS.iter().find(|(ty, _)| *ty == box_type) {
        Some((_, decode)) => decode(data, range),
        None => Ok(BoxPayload::Binary(range)),
    }
}

fn decode_description(data: &[u8], range: ByteRange) -> Result<BoxPayload, JumbfError> {
    DescriptionBox::parse(data, range.offset).map(BoxPayload::Description)
}

fn decode_cbor(data: &[u8], range: ByteRange) -> Result<BoxPayload, JumbfError> {
    ciborium::from_reader(data)
        .map(BoxPayload::Cbor)
        .map_err(|e| JumbfError::Cbor {
            offset: range.offset,
            reason: e.to_string(),
        })
}

fn decode_json(data: &[u8], range: ByteRange) -> Result<BoxPayload, JumbfError> {
    serde_json::from_slice(data)
        .map(BoxPayload::Json)
        .map_err(|e| JumbfError::Json {
            offset: range.offset,
            reason: e.to_string(),
        })
}

fn decode_file_description(data: &[u8], _range: ByteRange) -> Result<BoxPayload, JumbfError> {
    Ok(BoxPayload::File(FileDescription::parse(data)))
}

/// Read a null-terminated string starting at `pos`.
///
/// Returns the string and the position after the terminator. A missing
/// terminator consumes the rest of `data`.
fn read_c_string(data: &[u8], pos: usize) -> (String, usize) {
    let rest = data.get(pos..).unwrap_or_default();
    match rest.iter().position(|&b| b == 0) {
        Some(nul) => (
            String::from_utf8_lossy(&rest[..nul]).into_owned(),
            pos + nul + 1,
        ),
        None => (String::from_utf8_lossy(rest).into_owned(), data.len()),
    }
}
