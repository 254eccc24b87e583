use super::{BPlusTree, LeafEntry, Node, NodeId};
use crate::types::Key;
use crate::{Error, Result};
use std::collections::{HashSet, VecDeque};
use std::fmt::Write;

/// Point-in-time summary of the index.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeStats {
    pub max_keys: usize,
    pub node_size: usize,
    pub records: usize,
    pub nodes: usize,
    pub overflow_nodes: usize,
    pub height: usize,
    pub levels: usize,
    pub nodes_deleted: usize,
    pub overflow_nodes_deleted: usize,
    pub root_keys: Vec<Key>,
}

impl BPlusTree {
    /// Edges from the root to any leaf.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Levels counted by walking the leftmost path.
    pub fn level_count(&self) -> usize {
        let mut levels = 1;
        let mut current = self.root;
        while let Some(interior) = self.node(current).as_interior() {
            current = interior.children[0];
            levels += 1;
        }
        levels
    }

    /// Leaf and interior nodes, overflow nodes excluded.
    pub fn node_count(&self) -> usize {
        self.num_nodes
    }

    pub fn overflow_node_count(&self) -> usize {
        self.num_overflow_nodes
    }

    pub fn nodes_deleted(&self) -> usize {
        self.nodes_deleted
    }

    pub fn overflow_nodes_deleted(&self) -> usize {
        self.overflow_nodes_deleted
    }

    pub fn root_keys(&self) -> Vec<Key> {
        self.node(self.root).keys().to_vec()
    }

    pub fn stats(&self) -> TreeStats {
        TreeStats {
            max_keys: self.max_keys,
            node_size: self.node_size,
            records: self.len,
            nodes: self.num_nodes,
            overflow_nodes: self.num_overflow_nodes,
            height: self.height,
            levels: self.level_count(),
            nodes_deleted: self.nodes_deleted,
            overflow_nodes_deleted: self.overflow_nodes_deleted,
            root_keys: self.root_keys(),
        }
    }

    /// Keys of every node, level by level from the root, left to right.
    pub fn levels(&self) -> Vec<Vec<Vec<Key>>> {
        let mut levels = Vec::new();
        let mut current = vec![self.root];

        while !current.is_empty() {
            let mut next = Vec::new();
            let mut row = Vec::with_capacity(current.len());
            for id in current {
                let node = self.node(id);
                row.push(node.keys().to_vec());
                if let Some(interior) = node.as_interior() {
                    next.extend_from_slice(&interior.children);
                }
            }
            levels.push(row);
            current = next;
        }

        levels
    }

    /// One node as a fixed-width row with a cell per key slot.
    pub fn format_node(&self, id: NodeId) -> String {
        let keys = self.node(id).keys();
        let mut out = String::from(" | ");
        for slot in 0..self.max_keys {
            match keys.get(slot) {
                Some(key) => {
                    let _ = write!(out, "{:9.7} | ", key);
                }
                None => out.push_str("          | "),
            }
        }
        out
    }

    /// Whole tree, one level per block of lines.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        let mut queue = VecDeque::from([(self.root, 0usize)]);
        let mut level = 0;

        while let Some((id, depth)) = queue.pop_front() {
            if depth != level {
                out.push_str("+++++++++++++++++++++++\n");
                level = depth;
            }
            let _ = writeln!(out, "{}", self.format_node(id));

            if let Some(interior) = self.node(id).as_interior() {
                queue.extend(interior.children.iter().map(|&child| (child, depth + 1)));
            }
        }

        out.push_str("===================\n");
        out
    }

    /// Audits the whole structure: key order and bounds, parent links,
    /// occupancy, uniform leaf depth, the leaf chain, overflow chains, node
    /// counters and arena leaks.
    pub fn check_invariants(&self) -> Result<()> {
        let corrupt = |msg: String| Err(Error::Corruption(msg));

        if self.node(self.root).parent().is_some() {
            return corrupt(format!("root {} has a parent", self.root));
        }

        let mut nodes = 0;
        let mut overflow_nodes = 0;
        let mut records = 0;
        let mut leaves = Vec::new();
        let mut stack = vec![(self.root, None::<NodeId>, 0usize, None::<Key>, None::<Key>)];

        while let Some((id, parent, depth, lower, upper)) = stack.pop() {
            if !self.is_live(id) {
                return corrupt(format!("{} is referenced but freed", id));
            }
            let node = self.node(id);
            nodes += 1;

            if node.parent() != parent {
                return corrupt(format!("{} has parent {:?}, expected {:?}", id, node.parent(), parent));
            }

            let keys = node.keys();
            if keys.windows(2).any(|w| w[0] >= w[1]) {
                return corrupt(format!("{} keys are not strictly ascending: {:?}", id, keys));
            }
            if let (Some(lower), Some(&first)) = (lower, keys.first()) {
                if first < lower {
                    return corrupt(format!("{} key {} below bound {}", id, first, lower));
                }
            }
            if let (Some(upper), Some(&last)) = (upper, keys.last()) {
                if last >= upper {
                    return corrupt(format!("{} key {} not below bound {}", id, last, upper));
                }
            }
            if keys.len() > self.max_keys {
                return corrupt(format!("{} holds {} keys, max is {}", id, keys.len(), self.max_keys));
            }
            let is_root = id == self.root;
            if !is_root && keys.len() < self.min_keys(id) {
                return corrupt(format!("{} holds {} keys, min is {}", id, keys.len(), self.min_keys(id)));
            }

            match node {
                Node::Leaf(leaf) => {
                    if depth != self.height {
                        return corrupt(format!("leaf {} at depth {}, height is {}", id, depth, self.height));
                    }
                    if leaf.entries.len() != leaf.keys.len() {
                        return corrupt(format!("leaf {} has mismatched keys and entries", id));
                    }
                    for entry in &leaf.entries {
                        match *entry {
                            LeafEntry::Record(_) => records += 1,
                            LeafEntry::Overflow { head } => {
                                let (chain_nodes, chain_records) = self.check_overflow_chain(head)?;
                                overflow_nodes += chain_nodes;
                                records += chain_records;
                            }
                        }
                    }
                    leaves.push(id);
                }
                Node::Interior(interior) => {
                    if is_root && keys.is_empty() {
                        return corrupt(format!("interior root {} has no keys", id));
                    }
                    if interior.children.len() != keys.len() + 1 {
                        return corrupt(format!("interior {} has {} keys and {} children", id, keys.len(), interior.children.len()));
                    }
                    // Pushed in reverse so leaves are collected left to right.
                    for (i, &child) in interior.children.iter().enumerate().rev() {
                        let child_lower = if i == 0 { lower } else { Some(keys[i - 1]) };
                        let child_upper = if i == keys.len() { upper } else { Some(keys[i]) };
                        stack.push((child, Some(id), depth + 1, child_lower, child_upper));
                    }
                }
                Node::Overflow(_) => return corrupt(format!("overflow {} linked as a tree node", id)),
            }
        }

        self.check_leaf_chain(&leaves)?;

        if nodes != self.num_nodes {
            return corrupt(format!("counted {} nodes, counter says {}", nodes, self.num_nodes));
        }
        if overflow_nodes != self.num_overflow_nodes {
            return corrupt(format!("counted {} overflow nodes, counter says {}", overflow_nodes, self.num_overflow_nodes));
        }
        if nodes + overflow_nodes != self.arena.live() {
            return corrupt(format!("{} live arena slots but {} reachable nodes", self.arena.live(), nodes + overflow_nodes));
        }
        if records != self.len {
            return corrupt(format!("counted {} records, len is {}", records, self.len));
        }
        if self.level_count() != self.height + 1 {
            return corrupt(format!("{} levels for height {}", self.level_count(), self.height));
        }

        Ok(())
    }

    fn check_overflow_chain(&self, head: NodeId) -> Result<(usize, usize)> {
        let mut nodes = 0;
        let mut records = 0;
        let mut current = Some(head);

        while let Some(id) = current {
            if !self.is_live(id) {
                return Err(Error::Corruption(format!("overflow chain reaches freed {}", id)));
            }
            let Some(overflow) = self.node(id).as_overflow() else {
                return Err(Error::Corruption(format!("{} in overflow chain is not an overflow node", id)));
            };
            if overflow.records.is_empty() || overflow.records.len() > self.max_keys {
                return Err(Error::Corruption(format!("overflow {} holds {} records", id, overflow.records.len())));
            }
            nodes += 1;
            records += overflow.records.len();
            if nodes > self.arena.live() {
                return Err(Error::Corruption(format!("overflow chain from {} loops", head)));
            }
            current = overflow.next;
        }

        Ok((nodes, records))
    }

    /// The next-leaf links must visit exactly `leaves`, in order, with ascending keys.
    fn check_leaf_chain(&self, leaves: &[NodeId]) -> Result<()> {
        let mut seen = HashSet::new();
        let mut previous: Option<Key> = None;
        let mut current = Some(self.leftmost_leaf());
        let mut visited = 0;

        while let Some(id) = current {
            if !seen.insert(id) {
                return Err(Error::Corruption(format!("leaf chain cycles at {}", id)));
            }
            if leaves.get(visited) != Some(&id) {
                return Err(Error::Corruption(format!("leaf chain visits {} out of tree order", id)));
            }
            let leaf = self.leaf(id);
            for &key in &leaf.keys {
                if previous.is_some_and(|p| p >= key) {
                    return Err(Error::Corruption(format!("leaf chain not ascending at {}", key)));
                }
                previous = Some(key);
            }
            visited += 1;
            current = leaf.next;
        }

        if visited != leaves.len() {
            return Err(Error::Corruption(format!("leaf chain covers {} of {} leaves", visited, leaves.len())));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BlockHandle, RecordRef};

    fn tree(count: u32) -> BPlusTree {
        let mut tree = BPlusTree::with_max_keys(3).unwrap();
        for i in 0..count {
            tree.insert(i as Key / 10.0, RecordRef::new(BlockHandle(0), i)).unwrap();
        }
        tree
    }

    #[test]
    fn test_stats() {
        let tree = tree(10);
        let stats = tree.stats();
        assert_eq!(stats.max_keys, 3);
        assert_eq!(stats.records, 10);
        assert_eq!(stats.height, 2);
        assert_eq!(stats.levels, 3);
        assert_eq!(stats.nodes, 8);
        assert_eq!(stats.root_keys, vec![0.6]);
    }

    #[test]
    fn test_levels() {
        let tree = tree(10);
        let levels = tree.levels();
        assert_eq!(levels.len(), 3);
        assert_eq!(levels[0], vec![vec![0.6]]);
        assert_eq!(levels[1], vec![vec![0.2, 0.4], vec![0.8]]);
        assert_eq!(levels[2].len(), 5);
        assert_eq!(levels[2][0], vec![0.0, 0.1]);
    }

    #[test]
    fn test_format_node_pads_empty_slots() {
        let tree = tree(1);
        let row = tree.format_node(tree.root());
        assert!(row.starts_with(" | 0.0000000 | "));
        assert_eq!(row.matches('|').count(), 4);
    }

    #[test]
    fn test_dump_lists_every_level() {
        let tree = tree(10);
        let dump = tree.dump();
        assert_eq!(dump.lines().filter(|l| l.starts_with('+')).count(), 2);
        assert_eq!(dump.lines().filter(|l| l.starts_with(" |")).count(), 8);
        assert!(dump.ends_with("===================\n"));
    }

    #[test]
    fn test_check_invariants_detects_bad_order() {
        let mut tree = tree(10);
        let leaf = tree.leftmost_leaf();
        tree.leaf_mut(leaf).keys.swap(0, 1);
        assert!(matches!(tree.check_invariants(), Err(Error::Corruption(_))));
    }

    #[test]
    fn test_check_invariants_detects_broken_chain() {
        let mut tree = tree(10);
        let leaf = tree.leftmost_leaf();
        tree.leaf_mut(leaf).next = None;
        assert!(tree.check_invariants().is_err());
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;
        use std::collections::BTreeMap;

        fn key(k: u16) -> Key {
            k as Key / 100.0
        }

        proptest! {
            #[test]
            fn prop_matches_btreemap(
                max_keys in 3usize..9,
                ops in prop::collection::vec((any::<bool>(), 0u16..300), 1..400),
            ) {
                let mut tree = BPlusTree::with_max_keys(max_keys).unwrap();
                let mut expected: BTreeMap<u16, Vec<RecordRef>> = BTreeMap::new();

                for (i, (insert, k)) in ops.into_iter().enumerate() {
                    if insert {
                        let record = RecordRef::new(BlockHandle(k as u32), i as u32);
                        tree.insert(key(k), record).unwrap();
                        expected.entry(k).or_default().push(record);
                    } else {
                        let removed = tree.delete(key(k));
                        prop_assert_eq!(removed, expected.remove(&k).unwrap_or_default());
                    }
                    prop_assert!(tree.check_invariants().is_ok(), "{:?}", tree.check_invariants());
                }

                let keys: Vec<Key> = tree.keys().collect();
                let expected_keys: Vec<Key> = expected.keys().map(|&k| key(k)).collect();
                prop_assert_eq!(keys, expected_keys);
                prop_assert_eq!(tree.len(), expected.values().map(Vec::len).sum::<usize>());
            }

            #[test]
            fn prop_range_scan_is_half_open(
                keys in prop::collection::vec(0u16..500, 0..300),
                lo in 0u16..500,
                width in 0u16..200,
            ) {
                let mut tree = BPlusTree::with_max_keys(4).unwrap();
                let mut expected: BTreeMap<u16, Vec<RecordRef>> = BTreeMap::new();
                for (i, k) in keys.into_iter().enumerate() {
                    let record = RecordRef::new(BlockHandle(0), i as u32);
                    tree.insert(key(k), record).unwrap();
                    expected.entry(k).or_default().push(record);
                }

                let hi = lo + width;
                let scan = tree.range_scan(key(lo), key(hi));
                let wanted: Vec<RecordRef> = expected
                    .range(lo..hi)
                    .flat_map(|(_, records)| records.iter().copied())
                    .collect();
                prop_assert_eq!(scan.records(), wanted.as_slice());
            }
        }
    }
}
