use std::fmt;

/// Index key. Always a single-precision float.
pub type Key = f32;

pub type RecordId = u32;

/// Handle of a fixed-size block on the simulated disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockHandle(pub u32);

impl BlockHandle {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for BlockHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "block#{}", self.0)
    }
}

/// Location of an indexed record: the data block holding it and the
/// record id that tells it apart from other records under the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordRef {
    pub block: BlockHandle,
    pub record_id: RecordId,
}

impl RecordRef {
    pub fn new(block: BlockHandle, record_id: RecordId) -> Self {
        RecordRef { block, record_id }
    }
}
