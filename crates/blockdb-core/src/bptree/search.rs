use super::duplicates::shifted;
use super::{normalize_key, AccessStats, BPlusTree, LeafEntry, Node, NodeId, RangeScan};
use crate::config::DuplicatePolicy;
use crate::types::{Key, RecordRef};

impl BPlusTree {
    /// Descends from the root to the leaf whose key range covers `key`.
    /// The key is not necessarily present in the returned leaf.
    pub fn locate_leaf(&self, key: Key) -> NodeId {
        let mut current = self.root;
        loop {
            match self.node(current) {
                Node::Leaf(_) => return current,
                Node::Interior(interior) => current = interior.child_for(key),
                Node::Overflow(_) => panic!("overflow {} reached during descent", current),
            }
        }
    }

    /// Record references for every key in `[lo, hi)`, overflow chains expanded.
    pub fn range_scan(&mut self, lo: Key, hi: Key) -> RangeScan {
        let mut stats = AccessStats::default();
        let mut records = Vec::new();

        if let (Ok(lo), Ok(hi)) = (normalize_key(lo), normalize_key(hi)) {
            self.scan_into(lo, hi, &mut records, &mut stats);
        }

        stats.entries_matched = records.len();
        self.access = stats;
        RangeScan::new(records, stats)
    }

    /// Every record reference stored under exactly `key`.
    pub fn lookup(&mut self, key: Key) -> RangeScan {
        let mut stats = AccessStats::default();
        let mut records = Vec::new();

        if let Ok(key) = normalize_key(key) {
            match self.policy {
                DuplicatePolicy::Overflow => self.lookup_into(key, &mut records, &mut stats),
                DuplicatePolicy::EpsilonShift { epsilon } => {
                    for occurrence in 0..self.duplicates.occurrences(key) {
                        self.lookup_into(shifted(key, epsilon, occurrence), &mut records, &mut stats);
                    }
                }
            }
        }

        stats.entries_matched = records.len();
        self.access = stats;
        RangeScan::new(records, stats)
    }

    pub fn contains_key(&self, key: Key) -> bool {
        match normalize_key(key) {
            Ok(key) => self.leaf(self.locate_leaf(key)).search(key).is_ok(),
            Err(_) => false,
        }
    }

    fn scan_into(&self, lo: Key, hi: Key, records: &mut Vec<RecordRef>, stats: &mut AccessStats) {
        stats.index_nodes += self.height;
        let mut current = Some(self.locate_leaf(lo));

        'scan: while let Some(leaf_id) = current {
            stats.index_nodes += 1;
            let leaf = self.leaf(leaf_id);

            for (&key, &entry) in leaf.keys.iter().zip(leaf.entries.iter()) {
                if key >= hi {
                    break 'scan;
                }
                if key >= lo {
                    self.collect_entry(entry, records, stats);
                }
            }

            current = leaf.next;
        }
    }

    fn lookup_into(&self, key: Key, records: &mut Vec<RecordRef>, stats: &mut AccessStats) {
        stats.index_nodes += self.height + 1;
        let leaf = self.leaf(self.locate_leaf(key));
        if let Ok(idx) = leaf.search(key) {
            self.collect_entry(leaf.entries[idx], records, stats);
        }
    }

    fn collect_entry(&self, entry: LeafEntry, records: &mut Vec<RecordRef>, stats: &mut AccessStats) {
        match entry {
            LeafEntry::Record(record) => records.push(record),
            LeafEntry::Overflow { head } => {
                let mut current = Some(head);
                while let Some(id) = current {
                    stats.overflow_nodes += 1;
                    let overflow = self.overflow(id);
                    records.extend_from_slice(&overflow.records);
                    current = overflow.next;
                }
            }
        }
    }
}
