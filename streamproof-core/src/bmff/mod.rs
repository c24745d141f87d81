//! ISO BMFF box indexing.
//!
//! [`BoxIndex::parse`] walks an init segment or media chunk into a tree of
//! [`BmffBox`] records (type, absolute start, size, flags, children). Payloads
//! are not copied; callers slice the original buffer with the recorded
//! ranges.

mod c2pa;
mod error;

use std::ops::Range;

pub use c2pa::{C2paBox, C2paPurpose, C2PA_BOX_UUID};
pub use error::BmffError;

use crate::jumbf::BoxType;

/// Maximum container nesting accepted by [`BoxIndex::parse`].
pub const MAX_DEPTH: usize = 16;

/// Box types whose payload is a sequence of child boxes.
const CONTAINERS: &[&[u8; 4]] = &[
    b"moov", b"trak", b"mdia", b"minf", b"stbl", b"dinf", b"edts", b"mvex", b"moof", b"traf",
    b"mfra", b"udta", b"meta",
];

/// Box types carrying a version byte and 24-bit flags after the header.
const FULL_BOXES: &[&[u8; 4]] = &[
    b"mvhd", b"tkhd", b"mdhd", b"hdlr", b"vmhd", b"smhd", b"nmhd", b"dref", b"stsd", b"stts",
    b"stss", b"ctts", b"stsc", b"stsz", b"stco", b"co64", b"elst", b"mehd", b"trex", b"mfhd",
    b"tfhd", b"trun", b"tfdt", b"sidx", b"tfra", b"mfro", b"meta", b"iloc",
];

/// One indexed box.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BmffBox {
    pub box_type: BoxType,
    /// Absolute offset of the box header in the indexed buffer
    pub start: usize,
    /// Total size including the header
    pub size: usize,
    /// Header length, including the extended size and user type
    pub header_len: usize,
    pub version: Option<u8>,
    /// 24-bit flags of full boxes and of the c2pa `uuid` box
    pub flags: Option<u32>,
    /// User type of `uuid` boxes
    pub user_type: Option<[u8; 16]>,
    pub children: Vec<BmffBox>,
}

impl BmffBox {
    /// One past the last byte of the box.
    pub fn end(&self) -> usize {
        self.start + self.size
    }

    /// The whole box, header included.
    pub fn range(&self) -> Range<usize> {
        self.start..self.end()
    }

    /// Everything after the header.
    pub fn payload_range(&self) -> Range<usize> {
        self.start + self.header_len..self.end()
    }

    /// Whether this is the C2PA `uuid` box.
    pub fn is_c2pa(&self) -> bool {
        self.box_type == "uuid" && self.user_type == Some(C2PA_BOX_UUID)
    }
}

/// Index of the boxes in one BMFF buffer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BoxIndex {
    boxes: Vec<BmffBox>,
    len: usize,
}

impl BoxIndex {
    /// Index every box in `buf`.
    pub fn parse(buf: &[u8]) -> Result<Self, BmffError> {
        let boxes = walk(buf, 0..buf.len(), 0)?;
        Ok(Self {
            boxes,
            len: buf.len(),
        })
    }

    /// Top-level boxes in file order.
    pub fn boxes(&self) -> &[BmffBox] {
        &self.boxes
    }

    /// Length of the indexed buffer.
    pub fn buffer_len(&self) -> usize {
        self.len
    }

    /// All boxes, depth first.
    pub fn iter(&self) -> impl Iterator<Item = &BmffBox> {
        let mut stack: Vec<&BmffBox> = self.boxes.iter().rev().collect();
        std::iter::from_fn(move || {
            let next = stack.pop()?;
            stack.extend(next.children.iter().rev());
            Some(next)
        })
    }

    /// Resolve a slash-separated type path such as `/moof/traf/tfhd`.
    ///
    /// A segment may select the n-th sibling of a type with a 1-based index,
    /// e.g. `/uuid[2]`; without an index the first sibling is taken.
    pub fn find_by_path(&self, xpath: &str) -> Option<&BmffBox> {
        let mut level = self.boxes.as_slice();
        let mut found = None;

        for segment in xpath.split('/').filter(|s| !s.is_empty()) {
            let (name, nth) = parse_segment(segment)?;
            let node = level
                .iter()
                .filter(|b| b.box_type == name)
                .nth(nth.checked_sub(1)?)?;
            level = node.children.as_slice();
            found = Some(node);
        }

        found
    }

    /// The first c2pa `uuid` box, decoded against `buf`.
    pub fn c2pa_box<'a>(&self, buf: &'a [u8]) -> Result<Option<C2paBox<'a>>, BmffError> {
        match self.iter().find(|b| b.is_c2pa()) {
            Some(record) => C2paBox::decode(record, buf).map(Some),
            None => Ok(None),
        }
    }
}

fn parse_segment(segment: &str) -> Option<(&str, usize)> {
    match segment.split_once('[') {
        Some((name, rest)) => {
            let nth = rest.strip_suffix(']')?.parse().ok()?;
            Some((name, nth))
        }
        None => Some((segment, 1)),
    }
}

fn read_u32(buf: &[u8], pos: usize) -> u32 {
    u32::from_be_bytes([buf[pos], buf[pos + 1], buf[pos + 2], buf[pos + 3]])
}

fn walk(buf: &[u8], range: Range<usize>, depth: usize) -> Result<Vec<BmffBox>, BmffError> {
    if depth > MAX_DEPTH {
        return Err(BmffError::TooDeep(MAX_DEPTH));
    }

    let mut boxes = Vec::new();
    let mut pos = range.start;

    while pos < range.end {
        let available = range.end - pos;
        let truncated = |needed: usize| BmffError::Truncated {
            offset: pos,
            needed,
            available,
        };

        if available < 8 {
            return Err(truncated(8));
        }

        let declared = read_u32(buf, pos) as u64;
        let box_type = BoxType([buf[pos + 4], buf[pos + 5], buf[pos + 6], buf[pos + 7]]);
        let mut header_len = 8;

        let size = match declared {
            0 => available as u64,
            1 => {
                if available < 16 {
                    return Err(truncated(16));
                }
                header_len = 16;
                ((read_u32(buf, pos + 8) as u64) << 32) | read_u32(buf, pos + 12) as u64
            }
            n => n,
        };

        let user_type = if box_type == "uuid" {
            if available < header_len + 16 {
                return Err(truncated(header_len + 16));
            }
            let mut ut = [0u8; 16];
            ut.copy_from_slice(&buf[pos + header_len..pos + header_len + 16]);
            header_len += 16;
            Some(ut)
        } else {
            None
        };

        if size < header_len as u64 {
            return Err(BmffError::InvalidSize { offset: pos, size });
        }
        if size > available as u64 {
            return Err(truncated(size as usize));
        }
        let size = size as usize;

        let has_flags = FULL_BOXES.contains(&&box_type.0) || user_type == Some(C2PA_BOX_UUID);
        let (version, flags) = if has_flags && size >= header_len + 4 {
            let word = read_u32(buf, pos + header_len);
            (Some((word >> 24) as u8), Some(word & 0x00FF_FFFF))
        } else {
            (None, None)
        };

        let children = if CONTAINERS.contains(&&box_type.0) {
            // meta is a full box: children follow version and flags
            let first_child = if version.is_some() {
                pos + header_len + 4
            } else {
                pos + header_len
            };
            walk(buf, first_child..pos + size, depth + 1)?
        } else {
            Vec::new()
        };

        boxes.push(BmffBox {
            box_type,
            start: pos,
            size,
            header_len,
            version,
            flags,
            user_type,
            children,
        });

        pos += size;
    }

    Ok(boxes)
}
