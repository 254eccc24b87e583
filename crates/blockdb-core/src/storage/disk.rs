use crate::config::Config;
use crate::types::BlockHandle;
use crate::{Error, Result};
use std::collections::VecDeque;

/// Simulated disk: one contiguous allocation carved into fixed-size blocks.
pub struct Disk {
    data: Vec<u8>,
    block_size: usize,
    free: VecDeque<BlockHandle>,
    in_use: Vec<bool>,
}

impl Disk {
    /// Create a disk of `disk_size / block_size` zeroed blocks, all free
    pub fn new(disk_size: usize, block_size: usize) -> Result<Self> {
        if block_size == 0 || disk_size < block_size {
            return Err(Error::InvalidConfig(format!(
                "disk of {} bytes cannot hold a {} byte block",
                disk_size, block_size
            )));
        }

        let num_blocks = disk_size / block_size;
        if num_blocks > u32::MAX as usize {
            return Err(Error::InvalidConfig(format!("{} blocks do not fit a block handle", num_blocks)));
        }

        Ok(Disk {
            data: vec![0u8; num_blocks * block_size],
            block_size,
            free: (0..num_blocks as u32).map(BlockHandle).collect(),
            in_use: vec![false; num_blocks],
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.disk_size, config.block_size)
    }

    /// Hands out the oldest free block, zeroed.
    pub fn allocate(&mut self) -> Result<BlockHandle> {
        let handle = self.free.pop_front().ok_or(Error::StorageFull)?;
        self.in_use[handle.index()] = true;
        self.bytes_mut(handle).fill(0);
        Ok(handle)
    }

    pub fn free(&mut self, handle: BlockHandle) -> Result<()> {
        self.check_in_use(handle)?;
        self.in_use[handle.index()] = false;
        self.free.push_back(handle);
        Ok(())
    }

    /// Claims a specific block, taking it off the free list.
    pub fn mark_used(&mut self, handle: BlockHandle) -> Result<()> {
        self.check_range(handle)?;
        if self.in_use[handle.index()] {
            return Err(Error::InvalidArgument(format!("{} is already in use", handle)));
        }
        self.free.retain(|&free| free != handle);
        self.in_use[handle.index()] = true;
        Ok(())
    }

    pub fn block(&self, handle: BlockHandle) -> Result<&[u8]> {
        self.check_in_use(handle)?;
        let start = handle.index() * self.block_size;
        Ok(&self.data[start..start + self.block_size])
    }

    pub fn block_mut(&mut self, handle: BlockHandle) -> Result<&mut [u8]> {
        self.check_in_use(handle)?;
        Ok(self.bytes_mut(handle))
    }

    pub fn is_in_use(&self, handle: BlockHandle) -> bool {
        self.in_use.get(handle.index()).copied().unwrap_or(false)
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn num_blocks(&self) -> usize {
        self.in_use.len()
    }

    pub fn blocks_in_use(&self) -> usize {
        self.in_use.len() - self.free.len()
    }

    pub fn free_blocks(&self) -> usize {
        self.free.len()
    }

    /// Handles of every allocated block in ascending order.
    pub fn used_handles(&self) -> impl Iterator<Item = BlockHandle> + '_ {
        self.in_use
            .iter()
            .enumerate()
            .filter(|(_, used)| **used)
            .map(|(i, _)| BlockHandle(i as u32))
    }

    fn bytes_mut(&mut self, handle: BlockHandle) -> &mut [u8] {
        let start = handle.index() * self.block_size;
        &mut self.data[start..start + self.block_size]
    }

    fn check_range(&self, handle: BlockHandle) -> Result<()> {
        if handle.index() >= self.in_use.len() {
            return Err(Error::InvalidArgument(format!(
                "{} out of range, disk has {} blocks",
                handle,
                self.in_use.len()
            )));
        }
        Ok(())
    }

    fn check_in_use(&self, handle: BlockHandle) -> Result<()> {
        self.check_range(handle)?;
        if !self.in_use[handle.index()] {
            return Err(Error::InvalidArgument(format!("{} is not allocated", handle)));
        }
        Ok(())
    }
}
