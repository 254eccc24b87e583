use super::{normalize_key, BPlusTree, LeafEntry, Node, NodeId};
use crate::types::{Key, RecordRef};
use tracing::{debug, trace};

impl BPlusTree {
    /// Removes `key` and every record stored under it, returning the removed
    /// references. An absent key is a no-op and yields an empty vector.
    pub fn delete(&mut self, key: Key) -> Vec<RecordRef> {
        let Ok(key) = normalize_key(key) else {
            return Vec::new();
        };
        let Some((leaf_id, idx)) = self.find_key_to_delete(key) else {
            return Vec::new();
        };

        let (_, entry) = self.leaf_mut(leaf_id).remove_at(idx);
        let removed = self.release_entry(entry);
        self.len -= removed.len();

        if idx == 0 {
            self.refresh_separator(leaf_id, key);
        }
        self.rebalance(leaf_id);

        removed
    }

    /// Finds the leaf slot holding `key`, following next-leaf links while
    /// every key in the current leaf is still smaller than `key`.
    fn find_key_to_delete(&self, key: Key) -> Option<(NodeId, usize)> {
        let mut current = Some(self.locate_leaf(key));
        while let Some(leaf_id) = current {
            let leaf = self.leaf(leaf_id);
            match leaf.search(key) {
                Ok(idx) => return Some((leaf_id, idx)),
                Err(idx) if idx < leaf.len() => return None,
                Err(_) => current = leaf.next,
            }
        }
        None
    }

    /// Frees an entry's overflow chain, if any, and returns its records.
    fn release_entry(&mut self, entry: LeafEntry) -> Vec<RecordRef> {
        match entry {
            LeafEntry::Record(record) => vec![record],
            LeafEntry::Overflow { head } => {
                let mut records = Vec::new();
                let mut current = Some(head);
                while let Some(id) = current {
                    let Node::Overflow(overflow) = self.free_node(id) else {
                        panic!("{} in overflow chain is not an overflow node", id);
                    };
                    records.extend(overflow.records);
                    current = overflow.next;
                }
                records
            }
        }
    }

    /// After the first key of a leaf is removed, the ancestor separator that
    /// equalled it now points at the leaf's new first key.
    fn refresh_separator(&mut self, leaf_id: NodeId, removed: Key) {
        let Some(&first) = self.leaf(leaf_id).keys.first() else {
            return;
        };

        let mut child = leaf_id;
        while let Some(parent_id) = self.node(child).parent() {
            let parent = self.interior_mut(parent_id);
            match parent.position_of(child) {
                Some(pos) if pos > 0 => {
                    if parent.keys[pos - 1] == removed {
                        parent.keys[pos - 1] = first;
                    }
                    return;
                }
                _ => child = parent_id,
            }
        }
    }

    /// Restores minimum occupancy from `node_id` upward by borrowing from a
    /// sibling or merging with one. A merge removes a separator from the
    /// parent, so the parent is checked next.
    fn rebalance(&mut self, mut node_id: NodeId) {
        loop {
            let Some(parent_id) = self.node(node_id).parent() else {
                self.collapse_root();
                return;
            };

            let min = self.min_keys(node_id);
            if self.node(node_id).key_count() >= min {
                return;
            }

            let parent = self.interior(parent_id);
            let pos = parent
                .position_of(node_id)
                .unwrap_or_else(|| panic!("{} missing from its parent {}", node_id, parent_id));
            let left = pos.checked_sub(1).map(|p| parent.children[p]);
            let right = parent.children.get(pos + 1).copied();

            if let Some(left) = left {
                if self.node(left).key_count() > min {
                    self.borrow_from_left(node_id, left, parent_id, pos);
                    return;
                }
            }
            if let Some(right) = right {
                if self.node(right).key_count() > min {
                    self.borrow_from_right(node_id, right, parent_id, pos);
                    return;
                }
            }

            match (left, right) {
                (Some(left), _) => self.merge(left, node_id, parent_id, pos - 1),
                (None, Some(right)) => self.merge(node_id, right, parent_id, pos),
                (None, None) => panic!("{} has no siblings under {}", node_id, parent_id),
            }
            node_id = parent_id;
        }
    }

    fn borrow_from_left(&mut self, node_id: NodeId, left: NodeId, parent_id: NodeId, pos: usize) {
        trace!(node = %node_id, sibling = %left, "borrow from left");
        if self.node(node_id).is_leaf() {
            let (key, entry) = self
                .leaf_mut(left)
                .pop()
                .unwrap_or_else(|| panic!("left sibling {} is empty", left));
            self.leaf_mut(node_id).insert_at(0, key, entry);
            self.interior_mut(parent_id).keys[pos - 1] = key;
        } else {
            let separator = self.interior(parent_id).keys[pos - 1];
            let sibling = self.interior_mut(left);
            let (Some(key), Some(child)) = (sibling.keys.pop(), sibling.children.pop()) else {
                panic!("left sibling {} is empty", left);
            };

            let node = self.interior_mut(node_id);
            node.keys.insert(0, separator);
            node.children.insert(0, child);
            self.interior_mut(parent_id).keys[pos - 1] = key;
            self.set_parent(child, Some(node_id));
        }
    }

    fn borrow_from_right(&mut self, node_id: NodeId, right: NodeId, parent_id: NodeId, pos: usize) {
        trace!(node = %node_id, sibling = %right, "borrow from right");
        if self.node(node_id).is_leaf() {
            let sibling = self.leaf_mut(right);
            let (key, entry) = sibling.remove_at(0);
            let new_first = sibling.keys[0];
            self.leaf_mut(node_id).push(key, entry);
            self.interior_mut(parent_id).keys[pos] = new_first;
        } else {
            let separator = self.interior(parent_id).keys[pos];
            let sibling = self.interior_mut(right);
            let key = sibling.keys.remove(0);
            let child = sibling.children.remove(0);

            let node = self.interior_mut(node_id);
            node.keys.push(separator);
            node.children.push(child);
            self.interior_mut(parent_id).keys[pos] = key;
            self.set_parent(child, Some(node_id));
        }
    }

    /// Folds `right` into `left` and frees `right`. `separator` indexes the
    /// parent key between them, which is removed from the parent; interior
    /// merges pull it down between the two halves.
    fn merge(&mut self, left: NodeId, right: NodeId, parent_id: NodeId, separator: usize) {
        let (key, removed) = self.interior_mut(parent_id).remove_separator(separator);
        debug_assert_eq!(removed, right, "separator does not lead to the right node");
        let max_keys = self.max_keys;

        match self.free_node(right) {
            Node::Leaf(right_leaf) => {
                let left_leaf = self.leaf_mut(left);
                left_leaf.append(right_leaf);
                assert!(left_leaf.len() <= max_keys, "merged leaf over capacity");
            }
            Node::Interior(right_interior) => {
                let moved = right_interior.children.clone();
                let left_interior = self.interior_mut(left);
                left_interior.keys.push(key);
                left_interior.keys.extend(right_interior.keys);
                left_interior.children.extend(right_interior.children);
                assert!(left_interior.keys.len() <= max_keys, "merged interior node over capacity");
                for child in moved {
                    self.set_parent(child, Some(left));
                }
            }
            Node::Overflow(_) => panic!("{} is an overflow node, not a sibling", right),
        }

        debug!(left = %left, right = %right, separator = key, "merged nodes");
    }

    /// An interior root left without keys hands the root slot to its only child.
    fn collapse_root(&mut self) {
        let root = self.root;
        let child = match self.node(root).as_interior() {
            Some(interior) if interior.keys.is_empty() => interior.children[0],
            _ => return,
        };

        self.free_node(root);
        self.set_parent(child, None);
        self.root = child;
        self.height -= 1;
        debug!(root = %child, height = self.height, "collapsed root");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BlockHandle;

    fn rec(id: u32) -> RecordRef {
        RecordRef::new(BlockHandle(id), id)
    }

    fn key(i: u32) -> Key {
        i as Key / 10.0
    }

    fn tree_with(max_keys: usize, count: u32) -> BPlusTree {
        let mut tree = BPlusTree::with_max_keys(max_keys).unwrap();
        for i in 0..count {
            tree.insert(key(i), rec(i)).unwrap();
        }
        tree
    }

    #[test]
    fn test_delete_missing_key_is_noop() {
        let mut tree = tree_with(3, 10);
        assert!(tree.delete(0.55).is_empty());
        assert!(tree.delete(5.0).is_empty());
        assert!(tree.delete(f32::NAN).is_empty());
        assert_eq!(tree.len(), 10);
        tree.check_invariants().unwrap();
    }

    #[test]
    fn test_delete_smallest_key() {
        let mut tree = tree_with(3, 10);
        assert_eq!(tree.delete(0.0), vec![rec(0)]);

        let first_leaf = tree.node(tree.leftmost_leaf()).as_leaf().unwrap();
        assert_eq!(first_leaf.keys()[0], 0.1);
        assert_eq!(tree.keys().next(), Some(0.1));
        tree.check_invariants().unwrap();
    }

    #[test]
    fn test_delete_first_key_refreshes_separator() {
        let mut tree = tree_with(3, 10);
        // 0.4 heads the second leaf, so it is also a separator.
        assert!(tree.node(tree.root()).keys().contains(&0.4) || tree.height() > 1);
        tree.delete(0.4);

        assert!(!tree.contains_key(0.4));
        let mut stack = vec![tree.root()];
        while let Some(id) = stack.pop() {
            if let Some(interior) = tree.node(id).as_interior() {
                assert!(!interior.keys().contains(&0.4));
                stack.extend_from_slice(interior.children());
            }
        }
        tree.check_invariants().unwrap();
    }

    #[test]
    fn test_borrow_from_right_sibling() {
        // Leaves: [0.0 0.1] [0.2 0.3 0.4]
        let mut tree = tree_with(3, 4);
        tree.insert(key(4), rec(4)).unwrap();
        let nodes = tree.node_count();

        tree.delete(0.0);

        assert_eq!(tree.node_count(), nodes);
        let root = tree.node(tree.root()).as_interior().unwrap();
        assert_eq!(root.keys(), &[0.3]);
        tree.check_invariants().unwrap();
    }

    #[test]
    fn test_merge_frees_leaf() {
        // Leaves: [0.0 0.1] [0.2 0.3]
        let mut tree = tree_with(3, 4);
        let root = tree.node(tree.root()).as_interior().unwrap();
        let right = root.children()[1];
        assert_eq!(tree.node_count(), 3);

        tree.delete(0.3);

        assert!(!tree.is_live(right));
        assert_eq!(tree.height(), 0);
        assert_eq!(tree.node_count(), 1);
        assert_eq!(tree.nodes_deleted(), 2);
        assert_eq!(tree.keys().collect::<Vec<_>>(), vec![0.0, 0.1, 0.2]);
        tree.check_invariants().unwrap();
    }

    #[test]
    fn test_merge_keeps_leaf_chain() {
        let mut tree = tree_with(3, 30);
        let before = tree.node_count();
        for i in (0..30).step_by(2) {
            tree.delete(key(i));
            tree.check_invariants().unwrap();
        }

        assert!(tree.node_count() < before);
        let expected: Vec<Key> = (1..30).step_by(2).map(key).collect();
        assert_eq!(tree.keys().collect::<Vec<_>>(), expected);
    }

    #[test]
    fn test_delete_all_returns_single_empty_root() {
        for max_keys in [3, 4, 5, 8] {
            let mut tree = tree_with(max_keys, 200);
            for i in 0..200 {
                assert_eq!(tree.delete(key(i)), vec![rec(i)]);
                tree.check_invariants().unwrap();
            }

            assert!(tree.is_empty());
            assert_eq!(tree.height(), 0);
            assert_eq!(tree.node_count(), 1);
            assert!(tree.node(tree.root()).is_leaf());
            assert_eq!(tree.node(tree.root()).key_count(), 0);
        }
    }

    #[test]
    fn test_delete_in_reverse_and_middle_out() {
        let mut tree = tree_with(4, 120);
        for i in (60..120).rev() {
            tree.delete(key(i));
        }
        for i in (0..60).rev().step_by(3) {
            tree.delete(key(i));
        }
        tree.check_invariants().unwrap();
        assert_eq!(tree.len(), 40);
    }

    #[test]
    fn test_delete_frees_overflow_chain() {
        let mut tree = tree_with(3, 10);
        for i in 100..107 {
            tree.insert(0.5, rec(i)).unwrap();
        }
        assert_eq!(tree.overflow_node_count(), 3);

        let removed = tree.delete(0.5);
        assert_eq!(removed.len(), 8);
        assert_eq!(tree.overflow_node_count(), 0);
        assert_eq!(tree.overflow_nodes_deleted(), 3);
        assert_eq!(tree.len(), 9);
        tree.check_invariants().unwrap();
    }
}
