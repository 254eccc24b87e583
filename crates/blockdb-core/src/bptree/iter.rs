use super::{AccessStats, BPlusTree, LeafEntry, NodeId};
use crate::types::{Key, RecordRef};

/// Snapshot of the record references a query matched, with the counters it
/// collected. Later changes to the tree do not affect it.
#[derive(Debug, Clone, Default)]
pub struct RangeScan {
    records: Vec<RecordRef>,
    stats: AccessStats,
}

impl RangeScan {
    pub(super) fn new(records: Vec<RecordRef>, stats: AccessStats) -> Self {
        RangeScan { records, stats }
    }

    pub fn records(&self) -> &[RecordRef] {
        &self.records
    }

    pub fn stats(&self) -> AccessStats {
        self.stats
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl IntoIterator for RangeScan {
    type Item = RecordRef;
    type IntoIter = std::vec::IntoIter<RecordRef>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

/// Walks the leaf chain from the leftmost leaf, yielding every key with its payload.
pub struct LeafIter<'a> {
    tree: &'a BPlusTree,
    current_leaf: Option<NodeId>,
    current_idx: usize,
}

impl<'a> LeafIter<'a> {
    pub(super) fn new(tree: &'a BPlusTree) -> Self {
        LeafIter {
            tree,
            current_leaf: Some(tree.leftmost_leaf()),
            current_idx: 0,
        }
    }
}

impl<'a> Iterator for LeafIter<'a> {
    type Item = (Key, LeafEntry);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let leaf = self.tree.leaf(self.current_leaf?);

            if self.current_idx < leaf.len() {
                let item = (leaf.keys[self.current_idx], leaf.entries[self.current_idx]);
                self.current_idx += 1;
                return Some(item);
            }

            self.current_leaf = leaf.next;
            self.current_idx = 0;
        }
    }
}

impl BPlusTree {
    pub fn entries(&self) -> LeafIter<'_> {
        LeafIter::new(self)
    }

    pub fn keys(&self) -> impl Iterator<Item = Key> + '_ {
        self.entries().map(|(key, _)| key)
    }

    /// Every record reference reachable from a leaf entry, overflow chains expanded.
    pub fn entry_records(&self, entry: LeafEntry) -> Vec<RecordRef> {
        match entry {
            LeafEntry::Record(record) => vec![record],
            LeafEntry::Overflow { head } => {
                let mut records = Vec::new();
                let mut current = Some(head);
                while let Some(id) = current {
                    let overflow = self.overflow(id);
                    records.extend_from_slice(&overflow.records);
                    current = overflow.next;
                }
                records
            }
        }
    }

    pub(super) fn leftmost_leaf(&self) -> NodeId {
        let mut current = self.root;
        while let Some(interior) = self.node(current).as_interior() {
            current = interior.children[0];
        }
        current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BlockHandle;

    #[test]
    fn test_entries_follow_leaf_chain() {
        let mut tree = BPlusTree::with_max_keys(3).unwrap();
        for i in [5, 2, 8, 1, 9, 3, 7, 4, 6] {
            tree.insert(i as Key / 10.0, RecordRef::new(BlockHandle(0), i)).unwrap();
        }

        let keys: Vec<_> = tree.keys().collect();
        let expected: Vec<Key> = (1..=9).map(|i| i as Key / 10.0).collect();
        assert_eq!(keys, expected);
    }

    #[test]
    fn test_empty_tree_iter() {
        let tree = BPlusTree::with_max_keys(3).unwrap();
        assert_eq!(tree.entries().count(), 0);
    }

    #[test]
    fn test_range_scan_into_iter() {
        let mut tree = BPlusTree::with_max_keys(3).unwrap();
        for i in 0..6u32 {
            tree.insert(i as Key, RecordRef::new(BlockHandle(i), i)).unwrap();
        }

        let scan = tree.range_scan(1.0, 4.0);
        assert_eq!(scan.len(), 3);
        let ids: Vec<_> = scan.into_iter().map(|r| r.record_id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }
}
