use super::NodeId;
use crate::types::RecordRef;

/// Holds extra record references for a key that occurs more than once.
#[derive(Debug, Clone)]
pub struct OverflowNode {
    pub(super) records: Vec<RecordRef>,
    pub(super) next: Option<NodeId>,
}

impl OverflowNode {
    pub fn new(max_keys: usize) -> Self {
        OverflowNode {
            records: Vec::with_capacity(max_keys),
            next: None,
        }
    }

    pub fn records(&self) -> &[RecordRef] {
        &self.records
    }

    pub fn next(&self) -> Option<NodeId> {
        self.next
    }

    pub fn is_full(&self, max_keys: usize) -> bool {
        self.records.len() >= max_keys
    }
}
