//! Re-nesting of a flattened box sequence.
//!
//! Nodes live in an arena owned by [`BoxTree`]; containers refer to their
//! children by [`NodeId`]. [`BoxRef`] is a cheap borrowed handle used for
//! navigation.

use std::collections::HashMap;

use tracing::warn;

use super::boxes::{BoxPayload, BoxType, ByteRange, DescriptionBox};
use super::error::JumbfError;
use super::parse::{flatten, FlatBox};

/// Index of a node in a [`BoxTree`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug, Clone, PartialEq)]
struct Node {
    id: u32,
    box_type: BoxType,
    payload: BoxPayload,
    children: Vec<NodeId>,
}

/// A nested box tree.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BoxTree {
    nodes: Vec<Node>,
    roots: Vec<NodeId>,
    by_id: HashMap<u32, NodeId>,
    orphans: usize,
}

impl BoxTree {
    /// Flatten `buf` and nest the result.
    pub fn parse(buf: &[u8]) -> Result<Self, JumbfError> {
        Ok(Self::from_flat(flatten(buf)?))
    }

    /// Nest a flat box sequence.
    ///
    /// Boxes are stable-sorted by id first. A box whose parent id is 0 becomes
    /// a root; otherwise it is appended to its parent's children. Boxes whose
    /// parent is unknown or not a container are dropped and counted in
    /// [`BoxTree::orphan_count`].
    pub fn from_flat(mut boxes: Vec<FlatBox>) -> Self {
        boxes.sort_by_key(|b| b.id);

        let mut tree = BoxTree::default();
        for flat in boxes {
            let parent = if flat.parent_id == 0 {
                None
            } else {
                match tree.by_id.get(&flat.parent_id) {
                    Some(&parent) if tree.nodes[parent.0].is_container() => Some(parent),
                    _ => {
                        warn!(
                            id = flat.id,
                            parent_id = flat.parent_id,
                            box_type = %flat.box_type,
                            "Dropping box with unknown parent"
                        );
                        tree.orphans += 1;
                        continue;
                    }
                }
            };

            let node_id = NodeId(tree.nodes.len());
            tree.nodes.push(Node {
                id: flat.id,
                box_type: flat.box_type,
                payload: flat.payload,
                children: Vec::new(),
            });
            tree.by_id.entry(flat.id).or_insert(node_id);

            match parent {
                Some(parent) => tree.nodes[parent.0].children.push(node_id),
                None => tree.roots.push(node_id),
            }
        }

        tree
    }

    /// Top-level boxes in document order.
    pub fn roots(&self) -> impl Iterator<Item = BoxRef<'_>> + '_ {
        self.roots.iter().map(move |&node| BoxRef { tree: self, node })
    }

    /// The first top-level box.
    pub fn root(&self) -> Option<BoxRef<'_>> {
        self.roots.first().map(|&node| BoxRef { tree: self, node })
    }

    /// Handle for a node of this tree.
    ///
    /// # Panics
    ///
    /// Panics if `node` was not produced by this tree.
    pub fn node(&self, node: NodeId) -> BoxRef<'_> {
        assert!(node.0 < self.nodes.len(), "node id from another tree");
        BoxRef { tree: self, node }
    }

    /// Look up a box by its synthetic id.
    pub fn get(&self, id: u32) -> Option<BoxRef<'_>> {
        self.by_id.get(&id).map(|&node| BoxRef { tree: self, node })
    }

    /// Number of boxes kept in the tree.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of boxes dropped because their parent was missing.
    pub fn orphan_count(&self) -> usize {
        self.orphans
    }
}

impl Node {
    fn is_container(&self) -> bool {
        matches!(self.payload, BoxPayload::Container(_))
    }
}

/// Borrowed handle to one box of a [`BoxTree`].
#[derive(Debug, Clone, Copy)]
pub struct BoxRef<'t> {
    tree: &'t BoxTree,
    node: NodeId,
}

impl<'t> BoxRef<'t> {
    fn node(&self) -> &'t Node {
        &self.tree.nodes[self.node.0]
    }

    pub fn node_id(&self) -> NodeId {
        self.node
    }

    /// Synthetic id assigned during flattening.
    pub fn id(&self) -> u32 {
        self.node().id
    }

    pub fn box_type(&self) -> BoxType {
        self.node().box_type
    }

    pub fn payload(&self) -> &'t BoxPayload {
        &self.node().payload
    }

    pub fn is_container(&self) -> bool {
        self.node().is_container()
    }

    /// Payload range of a container (everything after its header).
    pub fn raw_range(&self) -> Option<ByteRange> {
        match self.node().payload {
            BoxPayload::Container(range) => Some(range),
            _ => None,
        }
    }

    /// Child boxes in document order; empty for non-containers.
    pub fn children(&self) -> impl ExactSizeIterator<Item = BoxRef<'t>> + 't {
        let tree = self.tree;
        self.node()
            .children
            .iter()
            .map(move |&node| BoxRef { tree, node })
    }

    pub fn child(&self, index: usize) -> Option<BoxRef<'t>> {
        self.node()
            .children
            .get(index)
            .map(|&node| BoxRef { tree: self.tree, node })
    }

    /// The description of this superbox, taken from its first child.
    pub fn description(&self) -> Option<&'t DescriptionBox> {
        self.child(0)?.payload().as_description()
    }

    /// Label of this superbox's description, if any.
    pub fn label(&self) -> Option<&'t str> {
        self.description()?.label.as_deref()
    }

    /// Children after the description box.
    pub fn content_boxes(&self) -> Vec<BoxRef<'t>> {
        self.children().skip(1).collect()
    }
}

impl PartialEq for BoxRef<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.tree, other.tree) && self.node == other.node
    }
}
