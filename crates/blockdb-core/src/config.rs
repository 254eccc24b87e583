use crate::bptree::max_keys_for;
use crate::record::RECORD_SIZE;
use crate::storage::block::{BLOCK_HEADER_SIZE, SLOT_ENTRY_SIZE};
use crate::types::Key;

pub const DEFAULT_EPSILON: Key = 1e-7;

/// Numeric record field the index is keyed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IndexField {
    PtsHome,
    #[default]
    FgPctHome,
    FtPctHome,
    Fg3PctHome,
}

/// How the index stores several records under one key.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum DuplicatePolicy {
    /// One leaf slot per distinct key; extra records go to a chain of overflow nodes.
    #[default]
    Overflow,
    /// Every duplicate gets its own synthetic key `key + epsilon * occurrence`.
    EpsilonShift { epsilon: Key },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub disk_size: usize,
    pub block_size: usize,
    pub node_size: usize,
    pub index_field: IndexField,
    pub duplicate_policy: DuplicatePolicy,
    pub progress_interval: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            disk_size: 100 * 1_000_000,
            block_size: 400,
            node_size: 400,
            index_field: IndexField::FgPctHome,
            duplicate_policy: DuplicatePolicy::Overflow,
            progress_interval: 10_000,
        }
    }
}

impl Config {
    /// Index nodes default to the same size as data blocks.
    pub fn new(disk_size: usize, block_size: usize) -> Self {
        Config {
            disk_size,
            block_size,
            node_size: block_size,
            ..Default::default()
        }
    }

    pub fn with_node_size(mut self, node_size: usize) -> Self {
        self.node_size = node_size;
        self
    }

    pub fn with_index_field(mut self, index_field: IndexField) -> Self {
        self.index_field = index_field;
        self
    }

    pub fn with_duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicate_policy = policy;
        self
    }

    pub fn with_progress_interval(mut self, interval: usize) -> Self {
        self.progress_interval = interval;
        self
    }

    pub fn num_blocks(&self) -> usize {
        self.disk_size / self.block_size.max(1)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.block_size < BLOCK_HEADER_SIZE + SLOT_ENTRY_SIZE + RECORD_SIZE {
            return Err(format!(
                "block_size must be at least {} bytes to hold one record",
                BLOCK_HEADER_SIZE + SLOT_ENTRY_SIZE + RECORD_SIZE
            ));
        }

        if self.disk_size < self.block_size {
            return Err("disk_size must hold at least one block".to_string());
        }

        if self.num_blocks() > u32::MAX as usize {
            return Err("disk_size / block_size must fit in a 32-bit block handle".to_string());
        }

        if max_keys_for(self.node_size) < 3 {
            return Err(format!(
                "node_size {} leaves room for fewer than 3 keys per node",
                self.node_size
            ));
        }

        if let DuplicatePolicy::EpsilonShift { epsilon } = self.duplicate_policy {
            if !epsilon.is_finite() || epsilon <= 0.0 {
                return Err("duplicate epsilon must be a positive finite number".to_string());
            }
        }

        if self.progress_interval == 0 {
            return Err("progress_interval must be greater than 0".to_string());
        }

        Ok(())
    }
}
