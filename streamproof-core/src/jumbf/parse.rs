//! Flattening of a JUMBF buffer into a box sequence.
//!
//! Every box gets a synthetic id, starting at 1 in document order, and the id
//! of its enclosing superbox (0 at top level). [`super::BoxTree::from_flat`]
//! re-nests the sequence.

use super::boxes::{decode_payload, BoxPayload, BoxType, ByteRange};
use super::error::JumbfError;

/// Maximum superbox nesting accepted by [`flatten`].
pub const MAX_DEPTH: usize = 32;

const HEADER_LEN: usize = 8;
const LARGE_HEADER_LEN: usize = 16;

/// One box of a flattened JUMBF buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatBox {
    pub id: u32,
    pub parent_id: u32,
    pub box_type: BoxType,
    pub payload: BoxPayload,
}

/// Flatten every box in `buf` into document order.
pub fn flatten(buf: &[u8]) -> Result<Vec<FlatBox>, JumbfError> {
    let mut boxes = Vec::new();
    let mut next_id = 1;
    walk(buf, ByteRange::new(0, buf.len()), 0, 0, &mut next_id, &mut boxes)?;
    Ok(boxes)
}

struct Header {
    box_type: BoxType,
    header_len: usize,
    end: usize,
}

fn read_header(buf: &[u8], pos: usize, limit: usize) -> Result<Header, JumbfError> {
    let truncated = |needed: usize| JumbfError::Truncated {
        offset: pos,
        needed,
        available: limit - pos,
    };

    if limit - pos < HEADER_LEN {
        return Err(truncated(HEADER_LEN));
    }

    let size = u32::from_be_bytes([buf[pos], buf[pos + 1], buf[pos + 2], buf[pos + 3]]) as u64;
    let box_type = BoxType([buf[pos + 4], buf[pos + 5], buf[pos + 6], buf[pos + 7]]);

    let (size, header_len) = match size {
        0 => ((limit - pos) as u64, HEADER_LEN),
        1 => {
            if limit - pos < LARGE_HEADER_LEN {
                return Err(truncated(LARGE_HEADER_LEN));
            }
            let mut large = [0u8; 8];
            large.copy_from_slice(&buf[pos + 8..pos + 16]);
            (u64::from_be_bytes(large), LARGE_HEADER_LEN)
        }
        n => (n, HEADER_LEN),
    };

    if size < header_len as u64 {
        return Err(JumbfError::InvalidSize { offset: pos, size });
    }
    if size > (limit - pos) as u64 {
        return Err(truncated(size as usize));
    }

    Ok(Header {
        box_type,
        header_len,
        end: pos + size as usize,
    })
}

fn walk(
    buf: &[u8],
    range: ByteRange,
    parent_id: u32,
    depth: usize,
    next_id: &mut u32,
    out: &mut Vec<FlatBox>,
) -> Result<(), JumbfError> {
    if depth > MAX_DEPTH {
        return Err(JumbfError::TooDeep(MAX_DEPTH));
    }

    let mut pos = range.offset;
    while pos < range.end() {
        let header = read_header(buf, pos, range.end())?;
        let content = ByteRange::new(pos + header.header_len, header.end - pos - header.header_len);

        let id = *next_id;
        *next_id += 1;

        if header.box_type.is_container() {
            out.push(FlatBox {
                id,
                parent_id,
                box_type: header.box_type,
                payload: BoxPayload::Container(content),
            });
            walk(buf, content, id, depth + 1, next_id, out)?;
        } else {
            out.push(FlatBox {
                id,
                parent_id,
                box_type: header.box_type,
                payload: decode_payload(header.box_type, buf, content)?,
            });
        }

        pos = header.end;
    }

    Ok(())
}
