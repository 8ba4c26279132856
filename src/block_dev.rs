use alloc::vec;
use alloc::vec::Vec;

use spin::Mutex;

use crate::config::*;
use crate::error::Result;

pub trait BlockDevice: Send + Sync {
    /// Returns the number of blocks in the block device.
    fn num_blocks(&self) -> usize;

    /// Reads a whole block from the block device.
    fn read_block(&self, block_id: u32, buf: &mut [u8; BLOCK_SIZE]) -> Result<()>;

    /// Writes a whole block to the block device.
    fn write_block(&self, block_id: u32, buf: &[u8; BLOCK_SIZE]) -> Result<()>;

    /// Flushes any cached data to the block device.
    fn flush(&self) -> Result<()>;

    /// Returns the size of each block in bytes.
    fn block_size(&self) -> usize {
        BLOCK_SIZE
    }
}

impl<D: BlockDevice + ?Sized> BlockDevice for alloc::sync::Arc<D> {
    fn num_blocks(&self) -> usize {
        (**self).num_blocks()
    }

    fn read_block(&self, block_id: u32, buf: &mut [u8; BLOCK_SIZE]) -> Result<()> {
        (**self).read_block(block_id, buf)
    }

    fn write_block(&self, block_id: u32, buf: &[u8; BLOCK_SIZE]) -> Result<()> {
        (**self).write_block(block_id, buf)
    }

    fn flush(&self) -> Result<()> {
        (**self).flush()
    }

    fn block_size(&self) -> usize {
        (**self).block_size()
    }
}

/// The virtual disk: MAX_BLOCKS blocks of BLOCK_SIZE bytes kept in memory.
///
/// Block indices outside the disk are a programming error and panic.
pub struct VirtualDisk {
    inner: Mutex<Vec<u8>>,
}

impl VirtualDisk {
    pub fn new() -> Self {
        VirtualDisk {
            inner: Mutex::new(vec![0u8; MAX_BLOCKS * BLOCK_SIZE]),
        }
    }

    fn range(block_id: u32) -> core::ops::Range<usize> {
        assert!(
            (block_id as usize) < MAX_BLOCKS,
            "block index {} out of range (disk has {} blocks)",
            block_id,
            MAX_BLOCKS
        );
        let start = block_id as usize * BLOCK_SIZE;
        start..start + BLOCK_SIZE
    }
}

impl Default for VirtualDisk {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockDevice for VirtualDisk {
    fn num_blocks(&self) -> usize {
        MAX_BLOCKS
    }

    fn read_block(&self, block_id: u32, buf: &mut [u8; BLOCK_SIZE]) -> Result<()> {
        let range = Self::range(block_id);
        buf.copy_from_slice(&self.inner.lock()[range]);
        Ok(())
    }

    fn write_block(&self, block_id: u32, buf: &[u8; BLOCK_SIZE]) -> Result<()> {
        let range = Self::range(block_id);
        self.inner.lock()[range].copy_from_slice(buf);
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        // Data already lives in memory.
        Ok(())
    }
}
