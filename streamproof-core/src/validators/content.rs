//! Streaming content binding: exclusion-aware segment hashing checked
//! against the manifest's Merkle rows.

use std::ops::Range;

use tracing::debug;

use crate::bmff::{BmffBox, BoxIndex};
use crate::crypto::{HashAlg, MerkleNode, MerkleRow};
use crate::error::{Result, ValidationError};
use crate::manifest::{BmffHash, BmffMerkleProof, ExclusionRange, MerkleMap};

/// Content binding check for one chunk, prepared from the track's BMFF hash
/// assertion and the chunk's Merkle proof.
#[derive(Debug, Clone)]
pub struct ContentValidator {
    row: MerkleMap,
    proof: BmffMerkleProof,
    alg: HashAlg,
    exclusions: Vec<ExclusionRange>,
}

impl ContentValidator {
    /// Select the Merkle row the proof refers to and the effective hash
    /// algorithm (row override, else assertion default).
    pub fn initialize(binding: &BmffHash, proof: BmffMerkleProof, track: &str) -> Result<Self> {
        let row = binding
            .merkle_row(proof.unique_id, proof.local_id)
            .ok_or_else(|| {
                ValidationError::new(track, "Unable to locate the Merkle row for the chunk.")
                    .with_context(format!(
                        "uniqueId={} localId={}",
                        proof.unique_id, proof.local_id
                    ))
            })?
            .clone();

        let alg = row.alg.or(binding.alg).ok_or_else(|| {
            ValidationError::new(track, "Unable to identify hash algorithm for the Merkle row.")
        })?;

        Ok(Self {
            row,
            proof,
            alg,
            exclusions: binding.exclusions.clone(),
        })
    }

    pub fn alg(&self) -> HashAlg {
        self.alg
    }

    /// Hash the init segment and compare with the row's `initHash`. A row
    /// without `initHash` does not match.
    pub fn validate_init_segment_hash(
        &self,
        index: &BoxIndex,
        bytes: &[u8],
        track: &str,
    ) -> Result<bool> {
        let actual = hash_with_exclusions(self.alg, index, bytes, &self.exclusions)?;
        let expected = self.row.init_hash.as_deref().map(|h| h.as_slice());

        debug!(
            track = %track,
            actual = %hex::encode(&actual),
            expected = %expected.map(hex::encode).unwrap_or_default(),
            "Calculated init segment hash"
        );

        Ok(expected == Some(actual.as_slice()))
    }

    /// Hash the chunk and check it as leaf `location` of the tree against
    /// the committed row.
    pub fn validate_data_segment_hash(
        &self,
        index: &BoxIndex,
        bytes: &[u8],
        track: &str,
    ) -> Result<bool> {
        let leaf = hash_with_exclusions(self.alg, index, bytes, &self.exclusions)?;
        debug!(
            track = %track,
            hash = %hex::encode(&leaf),
            location = self.proof.location,
            "Calculated chunk data hash"
        );

        let node = MerkleNode::new(leaf, self.proof.location, self.row.count);
        let row = MerkleRow::new(
            self.row.hashes.iter().map(|h| h.to_vec()).collect(),
            self.alg,
        );
        row.validate(node, &self.proof.sibling_hashes())
    }
}

/// Hash the bytes of `buf` left after applying `exclusions`.
pub fn hash_with_exclusions(
    alg: HashAlg,
    index: &BoxIndex,
    buf: &[u8],
    exclusions: &[ExclusionRange],
) -> Result<Vec<u8>> {
    let ranges = included_ranges(index, buf, exclusions);
    alg.digest_parts(ranges.into_iter().map(|range| &buf[range]))
}

/// Byte ranges of `buf` that remain hashed after applying `exclusions`, in
/// buffer order.
///
/// Exclusions whose xpath resolves to no box are ignored. The rest are
/// visited in box order: bytes before the box are included, then the box is
/// excluded whole, excluded except for its `subset` windows' complement, or
/// left included when the exclusion does not apply to it. Subset windows are
/// clamped to their box.
pub fn included_ranges(
    index: &BoxIndex,
    buf: &[u8],
    exclusions: &[ExclusionRange],
) -> Vec<Range<usize>> {
    let len = buf.len();
    let mut located: Vec<(&ExclusionRange, &BmffBox)> = exclusions
        .iter()
        .filter_map(|exclusion| Some((exclusion, index.find_by_path(&exclusion.xpath)?)))
        .collect();
    located.sort_by_key(|(_, b)| b.start);

    let mut ranges = Vec::new();
    let mut push = |range: Range<usize>| {
        let range = range.start.min(len)..range.end.min(len);
        if range.start < range.end {
            ranges.push(range);
        }
    };

    let mut offset = 0;
    for (exclusion, target) in located {
        let box_start = target.start;
        let box_end = target.end();

        push(offset..box_start);
        offset = box_start;

        if !applies(exclusion, target, buf) {
            continue;
        }

        if let Some(subsets) = &exclusion.subset {
            let mut include_from = box_start;
            for subset in subsets {
                let exclude_from = box_start.saturating_add(subset.offset).min(box_end);
                if exclude_from > include_from {
                    push(include_from..exclude_from);
                }
                include_from = if subset.length == 0 {
                    box_end
                } else {
                    exclude_from.saturating_add(subset.length).min(box_end)
                };
            }
            if include_from < box_end {
                push(include_from..box_end);
            }
        }

        offset = box_end;
    }

    push(offset..len);
    ranges
}

/// Whether `exclusion` applies to the box it resolved to.
fn applies(exclusion: &ExclusionRange, target: &BmffBox, buf: &[u8]) -> bool {
    if exclusion.flags.is_some() {
        let Some(wanted) = exclusion.flags_value() else {
            return false;
        };
        let actual = target.flags.unwrap_or(0);
        let matched = match exclusion.exact {
            Some(false) => actual & wanted != 0,
            _ => actual == wanted,
        };
        if !matched {
            return false;
        }
    }

    if let Some(length) = exclusion.length {
        if target.size != length {
            return false;
        }
    }

    if let Some(matches) = &exclusion.data {
        let content = buf.get(target.range()).unwrap_or_default();
        let all_match = matches.iter().all(|m| {
            m.offset
                .checked_add(m.value.len())
                .and_then(|end| content.get(m.offset..end))
                .is_some_and(|found| found == m.value.as_slice())
        });
        if !all_match {
            return false;
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::SubsetRange;

    fn raw_box(box_type: &[u8; 4], payload: &[u8]) -> Vec<u8> {
        let mut out = ((payload.len() + 8) as u32).to_be_bytes().to_vec();
        out.extend_from_slice(box_type);
        out.extend_from_slice(payload);
        out
    }

    fn full_box(box_type: &[u8; 4], flags: u32, payload: &[u8]) -> Vec<u8> {
        let mut body = flags.to_be_bytes().to_vec();
        body.extend_from_slice(payload);
        raw_box(box_type, &body)
    }

    fn exclusion(xpath: &str) -> ExclusionRange {
        ExclusionRange {
            xpath: xpath.into(),
            length: None,
            data: None,
            subset: None,
            version: None,
            flags: None,
            exact: None,
        }
    }

    /// free(9) | moof(8 + mfhd(16)) | mdat(12)
    fn sample() -> Vec<u8> {
        let mut buf = raw_box(b"free", &[0xEE]);
        buf.extend(raw_box(b"moof", &full_box(b"mfhd", 0x000001, &7u32.to_be_bytes())));
        buf.extend(raw_box(b"mdat", &[1, 2, 3, 4]));
        buf
    }

    #[test]
    fn test_no_exclusions_hashes_everything() {
        let buf = sample();
        let index = BoxIndex::parse(&buf).unwrap();
        assert_eq!(included_ranges(&index, &buf, &[]), vec![0..buf.len()]);
    }

    #[test]
    fn test_whole_box_exclusion() {
        let buf = sample();
        let index = BoxIndex::parse(&buf).unwrap();

        let ranges = included_ranges(&index, &buf, &[exclusion("/moof")]);
        assert_eq!(ranges, vec![0..9, 33..45]);
    }

    #[test]
    fn test_exclusions_are_sorted_by_box_offset() {
        let buf = sample();
        let index = BoxIndex::parse(&buf).unwrap();

        let ranges = included_ranges(
            &index,
            &buf,
            &[exclusion("/mdat"), exclusion("/free"), exclusion("/missing")],
        );
        assert_eq!(ranges, vec![9..33]);
    }

    #[test]
    fn test_subset_windows() {
        let buf = sample();
        let index = BoxIndex::parse(&buf).unwrap();

        // mfhd starts at 17; exclude its sequence number (offset 12, 4 bytes)
        let mut ex = exclusion("/moof/mfhd");
        ex.subset = Some(vec![SubsetRange { offset: 12, length: 4 }]);
        let ranges = included_ranges(&index, &buf, &[ex]);
        assert_eq!(ranges, vec![0..17, 17..29, 33..45]);

        // Zero length runs to the end of the box
        let mut ex = exclusion("/moof/mfhd");
        ex.subset = Some(vec![SubsetRange { offset: 8, length: 0 }]);
        let ranges = included_ranges(&index, &buf, &[ex]);
        assert_eq!(ranges, vec![0..17, 17..25, 33..45]);
    }

    #[test]
    fn test_flags_gate_exclusion() {
        let buf = sample();
        let index = BoxIndex::parse(&buf).unwrap();

        let mut exact_match = exclusion("/moof/mfhd");
        exact_match.flags = Some(vec![0, 0, 1].into());
        assert_eq!(
            included_ranges(&index, &buf, &[exact_match]),
            vec![0..17, 33..45]
        );

        // Exact mismatch leaves the box included
        let mut exact_miss = exclusion("/moof/mfhd");
        exact_miss.flags = Some(vec![0, 0, 3].into());
        assert_eq!(
            included_ranges(&index, &buf, &[exact_miss]),
            vec![0..17, 17..45]
        );

        // Non-exact needs one shared bit
        let mut any_bit = exclusion("/moof/mfhd");
        any_bit.flags = Some(vec![0, 0, 3].into());
        any_bit.exact = Some(false);
        assert_eq!(
            included_ranges(&index, &buf, &[any_bit]),
            vec![0..17, 33..45]
        );
    }

    #[test]
    fn test_length_gate_exclusion() {
        let buf = sample();
        let index = BoxIndex::parse(&buf).unwrap();

        let mut wrong = exclusion("/mdat");
        wrong.length = Some(100);
        assert_eq!(included_ranges(&index, &buf, &[wrong]), vec![0..33, 33..45]);

        let mut right = exclusion("/mdat");
        right.length = Some(12);
        assert_eq!(included_ranges(&index, &buf, &[right]), vec![0..33]);
    }

    #[test]
    fn test_data_gate_exclusion() {
        use crate::manifest::assertion::DataMatch;

        let buf = sample();
        let index = BoxIndex::parse(&buf).unwrap();

        let mut matching = exclusion("/free");
        matching.data = Some(vec![DataMatch {
            offset: 8,
            value: vec![0xEE].into(),
        }]);
        assert_eq!(included_ranges(&index, &buf, &[matching]), vec![9..45]);

        let mut other = exclusion("/free");
        other.data = Some(vec![DataMatch {
            offset: 8,
            value: vec![0x00].into(),
        }]);
        assert_eq!(included_ranges(&index, &buf, &[other]), vec![0..9, 9..45]);
    }

    #[test]
    fn test_offsets_past_the_box_are_clamped() {
        use crate::manifest::assertion::DataMatch;

        let buf = sample();
        let index = BoxIndex::parse(&buf).unwrap();

        // Window starting beyond mfhd excludes nothing
        let mut ex = exclusion("/moof/mfhd");
        ex.subset = Some(vec![SubsetRange {
            offset: usize::MAX,
            length: 4,
        }]);
        let ranges = included_ranges(&index, &buf, &[ex]);
        assert_eq!(ranges, vec![0..17, 17..33, 33..45]);

        // Window running past mfhd stops at its end
        let mut ex = exclusion("/moof/mfhd");
        ex.subset = Some(vec![SubsetRange {
            offset: 8,
            length: usize::MAX,
        }]);
        let ranges = included_ranges(&index, &buf, &[ex]);
        assert_eq!(ranges, vec![0..17, 17..25, 33..45]);

        // Data that cannot lie inside the box never matches
        let mut ex = exclusion("/free");
        ex.data = Some(vec![DataMatch {
            offset: usize::MAX,
            value: vec![0xEE].into(),
        }]);
        assert_eq!(included_ranges(&index, &buf, &[ex]), vec![0..9, 9..45]);
    }

    #[test]
    fn test_excluded_bytes_do_not_change_hash() {
        let buf = sample();
        let index = BoxIndex::parse(&buf).unwrap();
        let exclusions = [exclusion("/free")];

        let before = hash_with_exclusions(HashAlg::Sha256, &index, &buf, &exclusions).unwrap();
        let mut tampered = buf.clone();
        tampered[8] ^= 0xFF;
        let after = hash_with_exclusions(HashAlg::Sha256, &index, &tampered, &exclusions).unwrap();
        assert_eq!(before, after);

        tampered[40] ^= 0xFF;
        let changed =
            hash_with_exclusions(HashAlg::Sha256, &index, &tampered, &exclusions).unwrap();
        assert_ne!(before, changed);
    }
}
