use super::NodeId;
use crate::types::Key;

#[derive(Debug, Clone)]
pub struct InteriorNode {
    pub(super) keys: Vec<Key>,
    pub(super) children: Vec<NodeId>,
    pub(super) parent: Option<NodeId>,
}

impl InteriorNode {
    pub fn new(max_keys: usize) -> Self {
        InteriorNode {
            keys: Vec::with_capacity(max_keys + 1),
            children: Vec::with_capacity(max_keys + 2),
            parent: None,
        }
    }

    pub fn keys(&self) -> &[Key] {
        &self.keys
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Index of the child whose subtree covers `key`: the first `i` with
    /// `key < keys[i]`, or the rightmost child.
    pub fn child_index(&self, key: Key) -> usize {
        self.keys.partition_point(|probe| probe.total_cmp(&key).is_le())
    }

    pub fn child_for(&self, key: Key) -> NodeId {
        self.children[self.child_index(key)]
    }

    pub fn position_of(&self, child: NodeId) -> Option<usize> {
        self.children.iter().position(|&c| c == child)
    }

    /// Places `key` and `right` immediately after the existing child at `pos`.
    pub fn insert_after(&mut self, pos: usize, key: Key, right: NodeId) {
        self.keys.insert(pos, key);
        self.children.insert(pos + 1, right);
    }

    /// Drops separator `idx` and the child to its right.
    pub fn remove_separator(&mut self, idx: usize) -> (Key, NodeId) {
        (self.keys.remove(idx), self.children.remove(idx + 1))
    }

    /// Splits an overfull node. Keeps `left_keys` keys here, returns the
    /// promoted middle key and the right half.
    pub fn split_off(&mut self, left_keys: usize, max_keys: usize) -> (Key, InteriorNode) {
        let mut right = InteriorNode::new(max_keys);
        right.keys.extend(self.keys.drain(left_keys + 1..));
        right.children.extend(self.children.drain(left_keys + 1..));
        right.parent = self.parent;

        let promoted = self.keys.remove(left_keys);
        (promoted, right)
    }
}
