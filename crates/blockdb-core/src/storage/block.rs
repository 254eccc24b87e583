use crate::record::{GameRecord, RECORD_SIZE};
use crate::types::RecordId;
use crate::{Error, Result};

/// Slot count at the start of every data block.
pub const BLOCK_HEADER_SIZE: usize = 4;
/// One slot directory entry: record id and record index.
pub const SLOT_ENTRY_SIZE: usize = 8;

const TOMBSTONE: i32 = -1;

pub fn records_per_block(block_size: usize) -> usize {
    block_size.saturating_sub(BLOCK_HEADER_SIZE) / (RECORD_SIZE + SLOT_ENTRY_SIZE)
}

/// Read view over a data block.
///
/// Layout: a `u32` slot count, then the slot directory growing forward, with
/// records packed from the end of the block backward. Slot `i` describes the
/// record stored at `block_size - (i + 1) * RECORD_SIZE`; a state of `-1`
/// marks a deleted record whose slot can be reused.
pub struct DataBlock<'a> {
    data: &'a [u8],
}

impl<'a> DataBlock<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        DataBlock { data }
    }

    pub fn capacity(&self) -> usize {
        records_per_block(self.data.len())
    }

    /// Slots in the directory, tombstones included.
    pub fn slot_count(&self) -> usize {
        read_u32(self.data, 0) as usize
    }

    pub fn live_count(&self) -> usize {
        (0..self.slot_count()).filter(|&i| self.slot(i).1 != TOMBSTONE).count()
    }

    pub fn is_empty(&self) -> bool {
        self.live_count() == 0
    }

    /// True when neither a fresh slot nor a tombstone is left.
    pub fn is_full(&self) -> bool {
        self.slot_count() >= self.capacity() && self.first_tombstone().is_none()
    }

    pub fn record(&self, record_id: RecordId) -> Result<GameRecord> {
        let slot = self.find(record_id).ok_or(Error::RecordNotFound(record_id))?;
        GameRecord::decode(self.record_bytes(slot)?)
    }

    pub fn records(&self) -> Result<Vec<GameRecord>> {
        (0..self.slot_count())
            .filter(|&i| self.slot(i).1 != TOMBSTONE)
            .map(|i| GameRecord::decode(self.record_bytes(i)?))
            .collect()
    }

    /// Record ids in slot order, tombstoned slots left blank.
    pub fn slot_ids(&self) -> Vec<Option<RecordId>> {
        (0..self.slot_count())
            .map(|i| match self.slot(i) {
                (_, TOMBSTONE) => None,
                (id, _) => Some(id),
            })
            .collect()
    }

    fn find(&self, record_id: RecordId) -> Option<usize> {
        (0..self.slot_count()).find(|&i| self.slot(i) == (record_id, i as i32))
    }

    fn first_tombstone(&self) -> Option<usize> {
        (0..self.slot_count()).find(|&i| self.slot(i).1 == TOMBSTONE)
    }

    fn slot(&self, i: usize) -> (RecordId, i32) {
        let offset = BLOCK_HEADER_SIZE + i * SLOT_ENTRY_SIZE;
        (read_u32(self.data, offset), read_u32(self.data, offset + 4) as i32)
    }

    fn record_bytes(&self, slot: usize) -> Result<&'a [u8]> {
        let data = self.data;
        let offset = record_offset(data.len(), slot)?;
        Ok(&data[offset..offset + RECORD_SIZE])
    }
}

/// Write view over a data block.
pub struct DataBlockMut<'a> {
    data: &'a mut [u8],
}

impl<'a> DataBlockMut<'a> {
    pub fn new(data: &'a mut [u8]) -> Self {
        DataBlockMut { data }
    }

    pub fn view(&self) -> DataBlock<'_> {
        DataBlock::new(&*self.data)
    }

    /// Stores `record`, reusing the first tombstoned slot if there is one.
    pub fn insert(&mut self, record: &GameRecord) -> Result<()> {
        let view = self.view();
        let slot = match view.first_tombstone() {
            Some(slot) => slot,
            None if view.slot_count() < view.capacity() => view.slot_count(),
            None => return Err(Error::StorageFull),
        };

        let offset = record_offset(self.data.len(), slot)?;
        record.encode_into(&mut self.data[offset..offset + RECORD_SIZE])?;
        self.write_slot(slot, record.record_id, slot as i32);

        if slot == self.view().slot_count() {
            write_u32(self.data, 0, slot as u32 + 1);
        }
        Ok(())
    }

    /// Tombstones the record. Its bytes stay until the slot is reused.
    pub fn remove(&mut self, record_id: RecordId) -> Result<()> {
        let slot = self.view().find(record_id).ok_or(Error::RecordNotFound(record_id))?;
        self.write_slot(slot, record_id, TOMBSTONE);
        Ok(())
    }

    fn write_slot(&mut self, slot: usize, record_id: RecordId, state: i32) {
        let offset = BLOCK_HEADER_SIZE + slot * SLOT_ENTRY_SIZE;
        write_u32(self.data, offset, record_id);
        write_u32(self.data, offset + 4, state as u32);
    }
}

fn record_offset(block_size: usize, slot: usize) -> Result<usize> {
    let end = (slot + 1) * RECORD_SIZE;
    let directory_end = BLOCK_HEADER_SIZE + (slot + 1) * SLOT_ENTRY_SIZE;
    if end + directory_end > block_size {
        return Err(Error::Corruption(format!(
            "slot {} does not fit a {} byte block",
            slot, block_size
        )));
    }
    Ok(block_size - end)
}

fn read_u32(data: &[u8], offset: usize) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&data[offset..offset + 4]);
    u32::from_le_bytes(bytes)
}

fn write_u32(data: &mut [u8], offset: usize, value: u32) {
    data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: RecordId, fg_pct: f32) -> GameRecord {
        GameRecord {
            record_id: id,
            fg_pct_home: fg_pct,
            ..GameRecord::default()
        }
    }

    #[test]
    fn test_records_per_block() {
        assert_eq!(records_per_block(400), 8);
        assert_eq!(records_per_block(200), 4);
        assert_eq!(records_per_block(10), 0);
    }

    #[test]
    fn test_block_insert_and_read() {
        let mut data = vec![0u8; 400];
        let mut block = DataBlockMut::new(&mut data);
        block.insert(&record(1, 0.5)).unwrap();
        block.insert(&record(2, 0.25)).unwrap();

        let view = DataBlock::new(&data);
        assert_eq!(view.slot_count(), 2);
        assert_eq!(view.live_count(), 2);
        assert_eq!(view.record(2).unwrap().fg_pct_home, 0.25);
        assert_eq!(view.records().unwrap().len(), 2);
        assert!(matches!(view.record(3), Err(Error::RecordNotFound(3))));
    }

    #[test]
    fn test_block_records_packed_from_end() {
        let mut data = vec![0u8; 400];
        DataBlockMut::new(&mut data).insert(&record(7, 0.5)).unwrap();

        let tail = &data[400 - RECORD_SIZE..];
        assert_eq!(GameRecord::decode(tail).unwrap().record_id, 7);
        assert_eq!(&data[4..8], &7u32.to_le_bytes());
    }

    #[test]
    fn test_block_full() {
        let mut data = vec![0u8; 200];
        let mut block = DataBlockMut::new(&mut data);
        for id in 0..4 {
            block.insert(&record(id, 0.1)).unwrap();
        }
        assert!(block.view().is_full());
        assert!(matches!(block.insert(&record(9, 0.1)), Err(Error::StorageFull)));
    }

    #[test]
    fn test_block_tombstone_reuse() {
        let mut data = vec![0u8; 200];
        let mut block = DataBlockMut::new(&mut data);
        for id in 0..4 {
            block.insert(&record(id, 0.1)).unwrap();
        }

        block.remove(1).unwrap();
        assert!(block.remove(1).is_err());
        assert!(!block.view().is_full());
        assert_eq!(block.view().slot_ids(), vec![Some(0), None, Some(2), Some(3)]);

        block.insert(&record(10, 0.9)).unwrap();
        let view = block.view();
        assert_eq!(view.slot_count(), 4);
        assert_eq!(view.slot_ids(), vec![Some(0), Some(10), Some(2), Some(3)]);
        assert_eq!(view.record(10).unwrap().fg_pct_home, 0.9);
    }

    #[test]
    fn test_block_empty_after_removals() {
        let mut data = vec![0u8; 400];
        let mut block = DataBlockMut::new(&mut data);
        block.insert(&record(1, 0.1)).unwrap();
        block.insert(&record(2, 0.2)).unwrap();
        block.remove(1).unwrap();
        block.remove(2).unwrap();
        assert!(block.view().is_empty());
        assert_eq!(block.view().records().unwrap(), Vec::new());
    }
}
