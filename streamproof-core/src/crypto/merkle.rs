//! Proof checking against one committed row of an irregular binary Merkle
//! tree.
//!
//! Leaves are chunk hashes. The tree is built pairwise bottom-up; a node that
//! is last in its row at an even index has no sibling and is promoted
//! unchanged. The manifest commits a single row at some depth, and each chunk
//! carries the sibling hashes needed to climb from its leaf to that row.

use crate::crypto::HashAlg;
use crate::error::Result;

/// Depth of a row holding `len` nodes.
fn depth_for(len: usize) -> u32 {
    if len <= 1 {
        0
    } else {
        usize::BITS - (len - 1).leading_zeros()
    }
}

/// A node being climbed towards the committed row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleNode {
    pub value: Vec<u8>,
    pub index: usize,
    pub row_len: usize,
    pub row_depth: u32,
}

impl MerkleNode {
    pub fn new(value: Vec<u8>, index: usize, row_len: usize) -> Self {
        Self {
            value,
            index,
            row_len,
            row_depth: depth_for(row_len),
        }
    }

    /// Promote a sibling-less last node until it has a sibling or reaches
    /// `min_depth`.
    pub fn adjust_for_last_node(&mut self, min_depth: u32) {
        while self.row_len.checked_sub(1) == Some(self.index)
            && self.index % 2 == 0
            && self.row_depth > min_depth
        {
            self.index /= 2;
            self.row_len = self.row_len.div_ceil(2);
            self.row_depth -= 1;
        }
    }

    /// Combine with `sibling` into the parent node.
    pub fn parent(&self, sibling: &[u8], alg: HashAlg) -> Result<MerkleNode> {
        let value = if self.index % 2 == 0 {
            alg.digest_parts([self.value.as_slice(), sibling])?
        } else {
            alg.digest_parts([sibling, self.value.as_slice()])?
        };

        Ok(MerkleNode::new(value, self.index / 2, self.row_len.div_ceil(2)))
    }
}

/// The row of hashes committed in the manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleRow {
    nodes: Vec<Vec<u8>>,
    depth: u32,
    alg: HashAlg,
}

impl MerkleRow {
    pub fn new(nodes: Vec<Vec<u8>>, alg: HashAlg) -> Self {
        let depth = depth_for(nodes.len());
        Self { nodes, depth, alg }
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Check that `leaf`, climbed with `proof` sibling hashes, lands on the
    /// committed node at its position.
    ///
    /// Running out of proof hashes or landing outside the row yields `false`.
    pub fn validate(&self, leaf: MerkleNode, proof: &[Vec<u8>]) -> Result<bool> {
        if leaf.index >= leaf.row_len {
            return Ok(false);
        }

        let mut node = leaf;
        node.adjust_for_last_node(self.depth);

        let mut siblings = proof.iter();
        while node.row_depth > self.depth {
            let Some(sibling) = siblings.next() else {
                return Ok(false);
            };
            node = node.parent(sibling, self.alg)?;
            node.adjust_for_last_node(self.depth);
        }

        Ok(self
            .nodes
            .get(node.index)
            .is_some_and(|committed| *committed == node.value))
    }
}
