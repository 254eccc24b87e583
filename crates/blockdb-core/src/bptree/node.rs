use super::{InteriorNode, LeafNode, OverflowNode};
use crate::types::Key;
use std::fmt;

/// Bytes taken by a node header: key count (4), parent pointer (8), leaf flag (1), padded to 16.
pub const NODE_HEADER_SIZE: usize = 16;
/// Bytes taken by one pointer slot: block handle (4) plus disambiguator (4).
pub const POINTER_SIZE: usize = 8;
pub const KEY_SIZE: usize = std::mem::size_of::<Key>();

/// Number of (key, pointer) pairs that fit a node of `node_size` bytes once
/// the header and the trailing pointer are accounted for.
pub fn max_keys_for(node_size: usize) -> usize {
    node_size.saturating_sub(NODE_HEADER_SIZE + POINTER_SIZE) / (POINTER_SIZE + KEY_SIZE)
}

/// Smallest node size that yields `max_keys` pairs.
pub fn node_size_for(max_keys: usize) -> usize {
    NODE_HEADER_SIZE + POINTER_SIZE + max_keys * (POINTER_SIZE + KEY_SIZE)
}

/// Slot of a node in the tree's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub enum Node {
    Leaf(LeafNode),
    Interior(InteriorNode),
    Overflow(OverflowNode),
}

impl Node {
    pub fn new_leaf(max_keys: usize) -> Self {
        Node::Leaf(LeafNode::new(max_keys))
    }

    pub fn new_interior(max_keys: usize) -> Self {
        Node::Interior(InteriorNode::new(max_keys))
    }

    pub fn new_overflow(max_keys: usize) -> Self {
        Node::Overflow(OverflowNode::new(max_keys))
    }

    pub fn keys(&self) -> &[Key] {
        match self {
            Node::Leaf(leaf) => &leaf.keys,
            Node::Interior(interior) => &interior.keys,
            Node::Overflow(_) => &[],
        }
    }

    pub fn key_count(&self) -> usize {
        self.keys().len()
    }

    pub fn parent(&self) -> Option<NodeId> {
        match self {
            Node::Leaf(leaf) => leaf.parent,
            Node::Interior(interior) => interior.parent,
            Node::Overflow(_) => None,
        }
    }

    pub fn set_parent(&mut self, parent: Option<NodeId>) {
        match self {
            Node::Leaf(leaf) => leaf.parent = parent,
            Node::Interior(interior) => interior.parent = parent,
            Node::Overflow(_) => {}
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf(_))
    }

    pub fn as_leaf(&self) -> Option<&LeafNode> {
        match self {
            Node::Leaf(leaf) => Some(leaf),
            _ => None,
        }
    }

    pub fn as_leaf_mut(&mut self) -> Option<&mut LeafNode> {
        match self {
            Node::Leaf(leaf) => Some(leaf),
            _ => None,
        }
    }

    pub fn as_interior(&self) -> Option<&InteriorNode> {
        match self {
            Node::Interior(interior) => Some(interior),
            _ => None,
        }
    }

    pub fn as_interior_mut(&mut self) -> Option<&mut InteriorNode> {
        match self {
            Node::Interior(interior) => Some(interior),
            _ => None,
        }
    }

    pub fn as_overflow(&self) -> Option<&OverflowNode> {
        match self {
            Node::Overflow(overflow) => Some(overflow),
            _ => None,
        }
    }

    pub fn as_overflow_mut(&mut self) -> Option<&mut OverflowNode> {
        match self {
            Node::Overflow(overflow) => Some(overflow),
            _ => None,
        }
    }
}
