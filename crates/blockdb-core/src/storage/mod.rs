pub mod block;
pub mod disk;

pub use block::{records_per_block, DataBlock, DataBlockMut, BLOCK_HEADER_SIZE, SLOT_ENTRY_SIZE};
pub use disk::Disk;
