use super::NodeId;
use crate::types::{Key, RecordRef};

/// Payload paired with a leaf key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeafEntry {
    Record(RecordRef),
    /// Several records share the key; they live in a chain of overflow nodes.
    Overflow { head: NodeId },
}

#[derive(Debug, Clone)]
pub struct LeafNode {
    pub(super) keys: Vec<Key>,
    pub(super) entries: Vec<LeafEntry>,
    pub(super) parent: Option<NodeId>,
    pub(super) next: Option<NodeId>,
}

impl LeafNode {
    pub fn new(max_keys: usize) -> Self {
        // One spare slot for the transient overflow during a split.
        LeafNode {
            keys: Vec::with_capacity(max_keys + 1),
            entries: Vec::with_capacity(max_keys + 1),
            parent: None,
            next: None,
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn keys(&self) -> &[Key] {
        &self.keys
    }

    pub fn entries(&self) -> &[LeafEntry] {
        &self.entries
    }

    pub fn next(&self) -> Option<NodeId> {
        self.next
    }

    pub fn search(&self, key: Key) -> Result<usize, usize> {
        self.keys.binary_search_by(|probe| probe.total_cmp(&key))
    }

    pub fn insert_at(&mut self, idx: usize, key: Key, entry: LeafEntry) {
        self.keys.insert(idx, key);
        self.entries.insert(idx, entry);
    }

    pub fn remove_at(&mut self, idx: usize) -> (Key, LeafEntry) {
        (self.keys.remove(idx), self.entries.remove(idx))
    }

    pub fn push(&mut self, key: Key, entry: LeafEntry) {
        self.keys.push(key);
        self.entries.push(entry);
    }

    pub fn pop(&mut self) -> Option<(Key, LeafEntry)> {
        let key = self.keys.pop()?;
        let entry = self.entries.pop()?;
        Some((key, entry))
    }

    /// Moves entries `[at..]` into a new right-hand leaf that inherits this
    /// leaf's parent. The caller links the leaf chain.
    pub fn split_off(&mut self, at: usize, max_keys: usize) -> LeafNode {
        let mut right = LeafNode::new(max_keys);
        right.keys.extend(self.keys.drain(at..));
        right.entries.extend(self.entries.drain(at..));
        right.parent = self.parent;
        right
    }

    pub fn append(&mut self, other: LeafNode) {
        self.keys.extend(other.keys);
        self.entries.extend(other.entries);
        self.next = other.next;
    }
}
