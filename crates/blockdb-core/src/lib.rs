pub mod error;
pub mod types;
pub mod config;

pub mod bptree;

pub mod storage;
pub mod record;
pub mod loader;

pub mod db;
pub use error::{Error, Result};
pub use config::{Config, DuplicatePolicy, IndexField};
pub use types::{BlockHandle, Key, RecordId, RecordRef};
pub use bptree::{AccessStats, BPlusTree, LeafEntry, RangeScan, TreeStats};
pub use record::{GameRecord, RECORD_SIZE};
pub use storage::{DataBlock, DataBlockMut, Disk};
pub use db::{Database, DatabaseStats, DeleteReport, QueryReport, ScanReport};
