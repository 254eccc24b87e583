mod node;
mod leaf;
mod interior;
mod overflow;
mod arena;
mod iter;
mod duplicates;
mod search;
mod insert;
mod delete;
mod diagnostics;

pub use node::{max_keys_for, node_size_for, Node, NodeId, KEY_SIZE, NODE_HEADER_SIZE, POINTER_SIZE};
pub use leaf::{LeafEntry, LeafNode};
pub use interior::InteriorNode;
pub use overflow::OverflowNode;
pub use arena::NodeArena;
pub use iter::{LeafIter, RangeScan};
pub use duplicates::DuplicateRegistry;
pub use diagnostics::TreeStats;

use crate::config::{Config, DuplicatePolicy};
use crate::types::Key;
use crate::{Error, Result};

/// Counters collected by the most recent query. Reset at the start of every query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccessStats {
    /// Interior and leaf nodes visited, including the descent from the root.
    pub index_nodes: usize,
    pub overflow_nodes: usize,
    /// Record references emitted.
    pub entries_matched: usize,
}

/// B+ tree secondary index over an `f32` key.
///
/// `height` counts edges from the root to the leaves, so a lone root leaf has height 0.
pub struct BPlusTree {
    arena: NodeArena,
    root: NodeId,
    height: usize,
    max_keys: usize,
    node_size: usize,
    policy: DuplicatePolicy,
    duplicates: DuplicateRegistry,
    len: usize,
    num_nodes: usize,
    num_overflow_nodes: usize,
    nodes_deleted: usize,
    overflow_nodes_deleted: usize,
    access: AccessStats,
}

impl BPlusTree {
    /// Builds an empty tree whose nodes each occupy `node_size` bytes.
    pub fn new(node_size: usize) -> Result<Self> {
        let max_keys = max_keys_for(node_size);
        if max_keys < 3 {
            return Err(Error::InvalidConfig(format!(
                "node size {} fits {} keys, need at least 3",
                node_size, max_keys
            )));
        }

        let mut arena = NodeArena::new();
        let root = arena.alloc(Node::new_leaf(max_keys));

        Ok(BPlusTree {
            arena,
            root,
            height: 0,
            max_keys,
            node_size,
            policy: DuplicatePolicy::Overflow,
            duplicates: DuplicateRegistry::new(),
            len: 0,
            num_nodes: 1,
            num_overflow_nodes: 0,
            nodes_deleted: 0,
            overflow_nodes_deleted: 0,
            access: AccessStats::default(),
        })
    }

    pub fn with_max_keys(max_keys: usize) -> Result<Self> {
        Self::new(node_size_for(max_keys))
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(config.node_size)?.with_duplicate_policy(config.duplicate_policy))
    }

    pub fn with_duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn max_keys(&self) -> usize {
        self.max_keys
    }

    pub fn node_size(&self) -> usize {
        self.node_size
    }

    pub fn duplicate_policy(&self) -> DuplicatePolicy {
        self.policy
    }

    /// Number of record references held by the index.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &Node {
        self.arena.get(id)
    }

    pub fn is_live(&self, id: NodeId) -> bool {
        self.arena.is_live(id)
    }

    pub fn last_access(&self) -> AccessStats {
        self.access
    }

    fn min_leaf_keys(&self) -> usize {
        (self.max_keys + 1) / 2
    }

    fn min_interior_keys(&self) -> usize {
        self.max_keys / 2
    }

    fn min_keys(&self, id: NodeId) -> usize {
        if self.node(id).is_leaf() {
            self.min_leaf_keys()
        } else {
            self.min_interior_keys()
        }
    }

    fn leaf(&self, id: NodeId) -> &LeafNode {
        self.arena
            .get(id)
            .as_leaf()
            .unwrap_or_else(|| panic!("{} is not a leaf", id))
    }

    fn leaf_mut(&mut self, id: NodeId) -> &mut LeafNode {
        self.arena
            .get_mut(id)
            .as_leaf_mut()
            .unwrap_or_else(|| panic!("{} is not a leaf", id))
    }

    fn interior(&self, id: NodeId) -> &InteriorNode {
        self.arena
            .get(id)
            .as_interior()
            .unwrap_or_else(|| panic!("{} is not an interior node", id))
    }

    fn interior_mut(&mut self, id: NodeId) -> &mut InteriorNode {
        self.arena
            .get_mut(id)
            .as_interior_mut()
            .unwrap_or_else(|| panic!("{} is not an interior node", id))
    }

    fn overflow(&self, id: NodeId) -> &OverflowNode {
        self.arena
            .get(id)
            .as_overflow()
            .unwrap_or_else(|| panic!("{} is not an overflow node", id))
    }

    fn overflow_mut(&mut self, id: NodeId) -> &mut OverflowNode {
        self.arena
            .get_mut(id)
            .as_overflow_mut()
            .unwrap_or_else(|| panic!("{} is not an overflow node", id))
    }

    fn set_parent(&mut self, id: NodeId, parent: Option<NodeId>) {
        self.arena.get_mut(id).set_parent(parent);
    }

    fn alloc_node(&mut self, node: Node) -> NodeId {
        match node {
            Node::Overflow(_) => self.num_overflow_nodes += 1,
            _ => self.num_nodes += 1,
        }
        self.arena.alloc(node)
    }

    fn free_node(&mut self, id: NodeId) -> Node {
        let node = self.arena.release(id);
        match node {
            Node::Overflow(_) => {
                self.num_overflow_nodes -= 1;
                self.overflow_nodes_deleted += 1;
            }
            _ => {
                self.num_nodes -= 1;
                self.nodes_deleted += 1;
            }
        }
        node
    }
}

/// Rejects NaN and folds `-0.0` into `0.0` so equal keys compare equal under `total_cmp`.
pub(crate) fn normalize_key(key: Key) -> Result<Key> {
    if key.is_nan() {
        return Err(Error::InvalidArgument("index key must not be NaN".to_string()));
    }
    Ok(key + 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new() {
        let tree = BPlusTree::new(400).unwrap();
        assert_eq!(tree.max_keys(), 31);
        assert_eq!(tree.len(), 0);
        assert!(tree.is_empty());
        assert_eq!(tree.height(), 0);
        assert_eq!(tree.node_count(), 1);
        assert!(tree.node(tree.root()).is_leaf());
    }

    #[test]
    fn test_node_size_too_small() {
        assert!(matches!(BPlusTree::new(48), Err(Error::InvalidConfig(_))));
        assert!(BPlusTree::with_max_keys(2).is_err());
    }

    #[test]
    fn test_from_config() {
        let config = Config::default()
            .with_node_size(node_size_for(5))
            .with_duplicate_policy(DuplicatePolicy::EpsilonShift { epsilon: 1e-4 });
        let tree = BPlusTree::from_config(&config).unwrap();
        assert_eq!(tree.max_keys(), 5);
        assert_eq!(tree.duplicate_policy(), DuplicatePolicy::EpsilonShift { epsilon: 1e-4 });
    }

    #[test]
    fn test_normalize_key() {
        assert!(normalize_key(f32::NAN).is_err());
        assert_eq!(normalize_key(-0.0).unwrap().to_bits(), 0.0f32.to_bits());
        assert_eq!(normalize_key(0.25).unwrap(), 0.25);
    }
}
