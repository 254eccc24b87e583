use crate::bptree::{BPlusTree, TreeStats};
use crate::config::{Config, IndexField};
use crate::loader;
use crate::record::{GameRecord, RECORD_SIZE};
use crate::storage::{records_per_block, DataBlock, DataBlockMut, Disk};
use crate::types::{BlockHandle, Key, RecordRef};
use crate::{Error, Result};
use std::collections::{BTreeSet, HashSet, VecDeque};
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Records on a block-structured simulated disk, indexed by a B+ tree over
/// one numeric field.
pub struct Database {
    config: Config,
    disk: Disk,
    index: BPlusTree,
    /// Blocks with at least one free or tombstoned slot, most recent first.
    open_blocks: VecDeque<BlockHandle>,
    num_records: usize,
}

impl Database {
    pub fn open(config: Config) -> Result<Self> {
        config.validate().map_err(Error::InvalidConfig)?;

        let disk = Disk::from_config(&config)?;
        let index = BPlusTree::from_config(&config)?;
        debug!(
            blocks = disk.num_blocks(),
            block_size = config.block_size,
            max_keys = index.max_keys(),
            "opened database"
        );

        Ok(Database {
            config,
            disk,
            index,
            open_blocks: VecDeque::new(),
            num_records: 0,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn index(&self) -> &BPlusTree {
        &self.index
    }

    pub fn disk(&self) -> &Disk {
        &self.disk
    }

    pub fn len(&self) -> usize {
        self.num_records
    }

    pub fn is_empty(&self) -> bool {
        self.num_records == 0
    }

    /// Inserts every record, logging progress every `progress_interval` records.
    pub fn import<I>(&mut self, records: I) -> Result<usize>
    where
        I: IntoIterator<Item = GameRecord>,
    {
        let mut inserted = 0;
        for record in records {
            self.insert_record(record)?;
            inserted += 1;
            if inserted % self.config.progress_interval == 0 {
                info!(inserted, "import progress");
            }
        }
        info!(inserted, blocks = self.disk.blocks_in_use(), "import finished");
        Ok(inserted)
    }

    pub fn import_file(&mut self, path: impl AsRef<Path>) -> Result<usize> {
        let loaded = loader::load_records(path)?;
        self.import(loaded.records)
    }

    /// Stores the record in the most recently opened block with room and indexes it.
    pub fn insert_record(&mut self, record: GameRecord) -> Result<RecordRef> {
        let key = record.key(self.config.index_field);
        if key.is_nan() {
            return Err(Error::InvalidArgument(format!(
                "record {} has a NaN index key",
                record.record_id
            )));
        }

        let block = match self.open_blocks.front() {
            Some(&block) => block,
            None => {
                let block = self.disk.allocate()?;
                self.open_blocks.push_front(block);
                block
            }
        };

        let mut data = DataBlockMut::new(self.disk.block_mut(block)?);
        data.insert(&record)?;
        let full = data.view().is_full();

        let record_ref = RecordRef::new(block, record.record_id);
        if let Err(err) = self.index.insert(key, record_ref) {
            DataBlockMut::new(self.disk.block_mut(block)?).remove(record.record_id)?;
            return Err(err);
        }

        if full {
            self.open_blocks.retain(|&open| open != block);
        }
        self.num_records += 1;
        Ok(record_ref)
    }

    pub fn record(&self, record_ref: RecordRef) -> Result<GameRecord> {
        DataBlock::new(self.disk.block(record_ref.block)?).record(record_ref.record_id)
    }

    /// Every record whose index key equals `key`.
    pub fn query(&mut self, key: Key) -> Result<QueryReport> {
        check_key(key)?;
        let start = Instant::now();
        let scan = self.index.lookup(key);
        self.fetch(scan.records(), scan.stats().index_nodes, scan.stats().overflow_nodes, start)
    }

    /// Every record whose index key lies in `[lo, hi)`.
    pub fn query_range(&mut self, lo: Key, hi: Key) -> Result<QueryReport> {
        check_key(lo)?;
        check_key(hi)?;
        let start = Instant::now();
        let scan = self.index.range_scan(lo, hi);
        self.fetch(scan.records(), scan.stats().index_nodes, scan.stats().overflow_nodes, start)
    }

    /// Reads every allocated data block and filters on `[lo, hi)` without the index.
    pub fn linear_scan(&self, lo: Key, hi: Key) -> Result<ScanReport> {
        check_key(lo)?;
        check_key(hi)?;
        let start = Instant::now();
        let field = self.config.index_field;

        let mut records = Vec::new();
        let mut data_blocks = 0;
        for handle in self.disk.used_handles() {
            data_blocks += 1;
            let block = DataBlock::new(self.disk.block(handle)?);
            records.extend(block.records()?.into_iter().filter(|record| {
                let key = record.key(field);
                key >= lo && key < hi
            }));
        }

        Ok(ScanReport {
            records,
            data_blocks,
            elapsed: start.elapsed(),
        })
    }

    /// Removes every record keyed below `threshold` from the index and from
    /// its data block. Blocks left empty go back to the disk.
    ///
    /// A record that cannot be removed from its block does not stop the
    /// sweep: the index, record count and block queues are brought up to date
    /// for everything that was removed, then the first failure is returned.
    pub fn delete_below(&mut self, threshold: Key) -> Result<DeleteReport> {
        check_key(threshold)?;
        let start = Instant::now();

        let keys: Vec<Key> = self.index.keys().take_while(|&key| key < threshold).collect();
        let mut touched = BTreeSet::new();
        let mut records_deleted = 0;
        let mut first_error = None;

        for &key in &keys {
            for record_ref in self.index.delete(key) {
                records_deleted += 1;
                touched.insert(record_ref.block);
                let removed = self
                    .disk
                    .block_mut(record_ref.block)
                    .and_then(|data| DataBlockMut::new(data).remove(record_ref.record_id));
                if let Err(err) = removed {
                    warn!(block = %record_ref.block, record = record_ref.record_id, %err, "record missing from its block");
                    first_error.get_or_insert(err);
                }
            }
        }
        self.num_records -= records_deleted;

        let mut blocks_freed = 0;
        for block in touched {
            match self.release_if_empty(block) {
                Ok(true) => blocks_freed += 1,
                Ok(false) => {}
                Err(err) => {
                    first_error.get_or_insert(err);
                }
            }
        }

        info!(keys = keys.len(), records_deleted, blocks_freed, "deleted records below threshold");
        if let Some(err) = first_error {
            return Err(err);
        }

        Ok(DeleteReport {
            keys_deleted: keys.len(),
            records_deleted,
            blocks_freed,
            elapsed: start.elapsed(),
            tree: self.index.stats(),
        })
    }

    /// Frees `block` if no live record is left in it, otherwise queues it for reuse.
    fn release_if_empty(&mut self, block: BlockHandle) -> Result<bool> {
        if DataBlock::new(self.disk.block(block)?).is_empty() {
            self.open_blocks.retain(|&open| open != block);
            self.disk.free(block)?;
            return Ok(true);
        }
        if !self.open_blocks.contains(&block) {
            self.open_blocks.push_back(block);
        }
        Ok(false)
    }

    pub fn stats(&self) -> DatabaseStats {
        DatabaseStats {
            records: self.num_records,
            record_size: RECORD_SIZE,
            records_per_block: records_per_block(self.config.block_size),
            blocks_in_use: self.disk.blocks_in_use(),
            blocks_total: self.disk.num_blocks(),
            tree: self.index.stats(),
        }
    }

    fn fetch(
        &self,
        refs: &[RecordRef],
        index_nodes: usize,
        overflow_nodes: usize,
        start: Instant,
    ) -> Result<QueryReport> {
        let records = refs
            .iter()
            .map(|&record_ref| self.record(record_ref))
            .collect::<Result<Vec<_>>>()?;
        let data_blocks = refs.iter().map(|r| r.block).collect::<HashSet<_>>().len();

        Ok(QueryReport {
            records,
            index_nodes,
            overflow_nodes,
            data_blocks,
            elapsed: start.elapsed(),
        })
    }
}

fn check_key(key: Key) -> Result<()> {
    if key.is_nan() {
        return Err(Error::InvalidArgument("query key must not be NaN".to_string()));
    }
    Ok(())
}

fn average(records: &[GameRecord], field: IndexField) -> Option<f32> {
    if records.is_empty() {
        return None;
    }
    let sum: f64 = records.iter().map(|r| r.key(field) as f64).sum();
    Some((sum / records.len() as f64) as f32)
}

#[derive(Debug, Clone)]
pub struct QueryReport {
    pub records: Vec<GameRecord>,
    /// Index nodes visited, overflow nodes excluded.
    pub index_nodes: usize,
    pub overflow_nodes: usize,
    /// Distinct data blocks read to fetch the records.
    pub data_blocks: usize,
    pub elapsed: Duration,
}

impl QueryReport {
    pub fn average(&self, field: IndexField) -> Option<f32> {
        average(&self.records, field)
    }
}

#[derive(Debug, Clone)]
pub struct ScanReport {
    pub records: Vec<GameRecord>,
    pub data_blocks: usize,
    pub elapsed: Duration,
}

impl ScanReport {
    pub fn average(&self, field: IndexField) -> Option<f32> {
        average(&self.records, field)
    }
}

#[derive(Debug, Clone)]
pub struct DeleteReport {
    pub keys_deleted: usize,
    pub records_deleted: usize,
    pub blocks_freed: usize,
    pub elapsed: Duration,
    pub tree: TreeStats,
}

#[derive(Debug, Clone)]
pub struct DatabaseStats {
    pub records: usize,
    pub record_size: usize,
    pub records_per_block: usize,
    pub blocks_in_use: usize,
    pub blocks_total: usize,
    pub tree: TreeStats,
}
