use crate::types::Key;
use std::collections::HashMap;

/// Occurrence counts per original key, consulted by the epsilon-shift
/// duplicate policy. Counts only grow, so a shifted key is never reused
/// after a delete.
///
/// Every synthetic key is owned by the original key that produced it. A key
/// is either an original or a synthetic key, never both.
#[derive(Debug, Default)]
pub struct DuplicateRegistry {
    counts: HashMap<u32, u32>,
    owners: HashMap<u32, u32>,
}

impl DuplicateRegistry {
    pub fn new() -> Self {
        DuplicateRegistry {
            counts: HashMap::new(),
            owners: HashMap::new(),
        }
    }

    /// Registers one more occurrence of `key` and returns how many were seen before it.
    pub fn record(&mut self, key: Key) -> u32 {
        let count = self.counts.entry(key.to_bits()).or_insert(0);
        let previous = *count;
        *count += 1;
        previous
    }

    pub fn occurrences(&self, key: Key) -> u32 {
        self.counts.get(&key.to_bits()).copied().unwrap_or(0)
    }

    /// Marks `shifted` as a synthetic key of `original`.
    pub fn claim(&mut self, shifted: Key, original: Key) {
        self.owners.insert(shifted.to_bits(), original.to_bits());
    }

    /// Original key that `key` was synthesised from, if it is a synthetic key.
    pub fn owner(&self, key: Key) -> Option<Key> {
        self.owners.get(&key.to_bits()).map(|&bits| Key::from_bits(bits))
    }

    pub fn distinct_keys(&self) -> usize {
        self.counts.len()
    }
}

/// Synthetic key for the `occurrence`-th duplicate of `key`.
pub fn shifted(key: Key, epsilon: Key, occurrence: u32) -> Key {
    key + epsilon * occurrence as Key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_counts() {
        let mut registry = DuplicateRegistry::new();
        assert_eq!(registry.record(0.5), 0);
        assert_eq!(registry.record(0.5), 1);
        assert_eq!(registry.record(0.25), 0);
        assert_eq!(registry.occurrences(0.5), 2);
        assert_eq!(registry.occurrences(0.75), 0);
        assert_eq!(registry.distinct_keys(), 2);
    }

    #[test]
    fn test_claim_owner() {
        let mut registry = DuplicateRegistry::new();
        assert_eq!(registry.owner(0.75), None);
        registry.claim(0.75, 0.5);
        assert_eq!(registry.owner(0.75), Some(0.5));
        assert_eq!(registry.occurrences(0.75), 0);
    }

    #[test]
    fn test_shifted() {
        assert_eq!(shifted(0.5, 1e-3, 0), 0.5);
        assert!(shifted(0.5, 1e-3, 2) > shifted(0.5, 1e-3, 1));
    }
}
