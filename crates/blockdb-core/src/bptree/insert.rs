use super::duplicates::shifted;
use super::{normalize_key, BPlusTree, InteriorNode, LeafEntry, Node, NodeId};
use crate::config::DuplicatePolicy;
use crate::types::{Key, RecordRef};
use crate::{Error, Result};
use tracing::debug;

impl BPlusTree {
    /// Indexes `record` under `key`.
    ///
    /// Under the overflow policy a repeated key appends to the key's overflow
    /// chain. Under the epsilon-shift policy the record is stored under a
    /// synthetic key; `KeyCollision` is returned if that key is not unique and
    /// `KeyReserved` if `key` itself is another key's synthetic key. A failed
    /// insert leaves the tree and its duplicate registry unchanged.
    pub fn insert(&mut self, key: Key, record: RecordRef) -> Result<()> {
        let original = normalize_key(key)?;
        let (key, occurrence) = match self.policy {
            DuplicatePolicy::Overflow => (original, None),
            DuplicatePolicy::EpsilonShift { epsilon } => {
                let (shifted, occurrence) = self.shift_duplicate(original, epsilon)?;
                (shifted, Some(occurrence))
            }
        };

        let leaf_id = self.locate_leaf(key);
        match self.leaf(leaf_id).search(key) {
            Ok(idx) => match occurrence {
                None => self.append_duplicate(leaf_id, idx, record),
                Some(_) => {
                    return Err(match self.duplicates.owner(key) {
                        Some(owner) => Error::KeyReserved { key, owner },
                        None => Error::KeyCollision { key: original, shifted: key },
                    })
                }
            },
            Err(idx) => {
                if self.leaf(leaf_id).len() == self.max_keys {
                    self.split_leaf(leaf_id, idx, key, LeafEntry::Record(record));
                } else {
                    self.leaf_mut(leaf_id).insert_at(idx, key, LeafEntry::Record(record));
                }
            }
        }

        if let Some(occurrence) = occurrence {
            self.duplicates.record(original);
            if occurrence > 0 {
                self.duplicates.claim(key, original);
            }
        }
        self.len += 1;
        Ok(())
    }

    /// Picks the key the next occurrence of `key` is stored under, without
    /// registering it.
    fn shift_duplicate(&self, key: Key, epsilon: Key) -> Result<(Key, u32)> {
        if let Some(owner) = self.duplicates.owner(key) {
            return Err(Error::KeyReserved { key, owner });
        }

        let occurrence = self.duplicates.occurrences(key);
        if occurrence == 0 {
            return Ok((key, 0));
        }

        let adjusted = shifted(key, epsilon, occurrence);
        if adjusted == key
            || self.contains_key(adjusted)
            || self.duplicates.occurrences(adjusted) > 0
            || self.duplicates.owner(adjusted).is_some()
        {
            return Err(Error::KeyCollision { key, shifted: adjusted });
        }
        Ok((adjusted, occurrence))
    }

    fn append_duplicate(&mut self, leaf_id: NodeId, idx: usize, record: RecordRef) {
        let entry = self.leaf(leaf_id).entries[idx];
        match entry {
            LeafEntry::Record(first) => {
                let head = self.alloc_node(Node::new_overflow(self.max_keys));
                self.overflow_mut(head).records.extend([first, record]);
                self.leaf_mut(leaf_id).entries[idx] = LeafEntry::Overflow { head };
            }
            LeafEntry::Overflow { head } => {
                let mut tail = head;
                while let Some(next) = self.overflow(tail).next {
                    tail = next;
                }

                if self.overflow(tail).is_full(self.max_keys) {
                    let fresh = self.alloc_node(Node::new_overflow(self.max_keys));
                    self.overflow_mut(fresh).records.push(record);
                    self.overflow_mut(tail).next = Some(fresh);
                } else {
                    self.overflow_mut(tail).records.push(record);
                }
            }
        }
    }

    /// Splits a full leaf while adding one entry at `idx`. The left leaf keeps
    /// `ceil((max_keys + 1) / 2)` entries.
    fn split_leaf(&mut self, leaf_id: NodeId, idx: usize, key: Key, entry: LeafEntry) {
        let max_keys = self.max_keys;
        let left_len = (max_keys + 2) / 2;

        let mut right = {
            let left = self.leaf_mut(leaf_id);
            left.insert_at(idx, key, entry);
            debug_assert!(left.len() == max_keys + 1, "leaf split on a node that was not full");
            left.split_off(left_len, max_keys)
        };
        right.next = self.leaf(leaf_id).next;
        let promoted = right.keys[0];

        let right_id = self.alloc_node(Node::Leaf(right));
        self.leaf_mut(leaf_id).next = Some(right_id);

        debug!(left = %leaf_id, right = %right_id, promoted, "split leaf");
        self.update_parent_after_split(leaf_id, right_id, promoted);
    }

    /// Splits an interior node holding `max_keys + 1` keys. The left node keeps
    /// `ceil(max_keys / 2)` keys; the middle key moves up and is returned.
    fn split_interior(&mut self, node_id: NodeId) -> (Key, NodeId) {
        let max_keys = self.max_keys;
        let left_keys = (max_keys + 1) / 2;

        let (promoted, right) = {
            let node = self.interior_mut(node_id);
            assert!(node.keys.len() <= max_keys + 1, "interior node over capacity");
            node.split_off(left_keys, max_keys)
        };
        let moved = right.children.clone();
        let right_id = self.alloc_node(Node::Interior(right));
        for child in moved {
            self.set_parent(child, Some(right_id));
        }

        debug!(left = %node_id, right = %right_id, promoted, "split interior node");
        (promoted, right_id)
    }

    /// Hooks a freshly split `right` node in next to `left`, growing a new
    /// root or splitting ancestors as needed.
    fn update_parent_after_split(&mut self, mut left: NodeId, mut right: NodeId, mut key: Key) {
        let max_keys = self.max_keys;
        loop {
            let Some(parent_id) = self.node(left).parent() else {
                let mut root = InteriorNode::new(max_keys);
                root.keys.push(key);
                root.children.extend([left, right]);
                let root_id = self.alloc_node(Node::Interior(root));

                self.set_parent(left, Some(root_id));
                self.set_parent(right, Some(root_id));
                self.root = root_id;
                self.height += 1;
                debug!(root = %root_id, height = self.height, "grew new root");
                return;
            };

            let parent = self.interior_mut(parent_id);
            let pos = parent
                .position_of(left)
                .unwrap_or_else(|| panic!("{} missing from its parent {}", left, parent_id));
            parent.insert_after(pos, key, right);
            let overfull = parent.keys.len() > max_keys;
            self.set_parent(right, Some(parent_id));

            if !overfull {
                return;
            }

            let (promoted, new_right) = self.split_interior(parent_id);
            left = parent_id;
            right = new_right;
            key = promoted;
        }
    }
}
