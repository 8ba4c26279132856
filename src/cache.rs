//! In chainfs, the cache layer is implemented as a block device that wraps 'real' block devices.
//! This decouples the cache logic from the underlying block device,
//! so a file system can run on top of a cached or an uncached disk unchanged.

use alloc::boxed::Box;
use alloc::collections::VecDeque;

use log::debug;
use spin::Mutex;

use crate::{BlockDevice, Error, Result, BLOCK_SIZE};

pub trait Cache: Send + Sync {
    /// Stores a block in the cache. `dirty` blocks must reach `device` before they are dropped.
    fn write_cache(
        &self,
        device: &impl BlockDevice,
        block_id: u32,
        buf: &[u8; BLOCK_SIZE],
        dirty: bool,
    ) -> Result<()>;

    /// Fills `buf` from the cache, or fails with [`Error::CacheMiss`].
    fn read_cache(&self, block_id: u32, buf: &mut [u8; BLOCK_SIZE]) -> Result<()>;

    /// Writes every dirty block back to `device`.
    fn flush(&self, device: &impl BlockDevice) -> Result<()>;
}

pub struct Cached<D: BlockDevice, C: Cache> {
    device: D,
    cache: C,
}

impl<D, C> Cached<D, C>
where
    D: BlockDevice,
    C: Cache,
{
    pub fn new(device: D, cache: C) -> Self {
        Cached { device, cache }
    }

    pub fn inner(&self) -> &D {
        &self.device
    }
}

impl<D, C> BlockDevice for Cached<D, C>
where
    D: BlockDevice,
    C: Cache,
{
    fn block_size(&self) -> usize {
        self.device.block_size()
    }

    fn num_blocks(&self) -> usize {
        self.device.num_blocks()
    }

    fn read_block(&self, block_id: u32, buf: &mut [u8; BLOCK_SIZE]) -> Result<()> {
        match self.cache.read_cache(block_id, buf) {
            Ok(_) => Ok(()),
            Err(Error::CacheMiss) => {
                self.device.read_block(block_id, buf)?;
                self.cache.write_cache(&self.device, block_id, buf, false)?;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn write_block(&self, block_id: u32, buf: &[u8; BLOCK_SIZE]) -> Result<()> {
        self.cache.write_cache(&self.device, block_id, buf, true)
    }

    fn flush(&self) -> Result<()> {
        self.cache.flush(&self.device)?;
        self.device.flush()
    }
}

struct CacheLine {
    block_id: u32,
    data: Box<[u8; BLOCK_SIZE]>,
    dirty: bool,
}

/// Write-back cache evicting the least recently used block.
pub struct LruCache {
    capacity: usize,
    // Front is the most recently used line.
    lines: Mutex<VecDeque<CacheLine>>,
}

impl LruCache {
    pub fn new(capacity: usize) -> Self {
        LruCache {
            capacity: capacity.max(1),
            lines: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn len(&self) -> usize {
        self.lines.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.lock().is_empty()
    }

    pub fn dirty_count(&self) -> usize {
        self.lines.lock().iter().filter(|line| line.dirty).count()
    }
}

impl Cache for LruCache {
    fn write_cache(
        &self,
        device: &impl BlockDevice,
        block_id: u32,
        buf: &[u8; BLOCK_SIZE],
        dirty: bool,
    ) -> Result<()> {
        let mut lines = self.lines.lock();
        if let Some(pos) = lines.iter().position(|line| line.block_id == block_id) {
            if let Some(mut line) = lines.remove(pos) {
                line.data.copy_from_slice(buf);
                line.dirty |= dirty;
                lines.push_front(line);
            }
            return Ok(());
        }

        if lines.len() >= self.capacity {
            if let Some(victim) = lines.pop_back() {
                if victim.dirty {
                    debug!("[cache] writing back block {} on eviction", victim.block_id);
                    device.write_block(victim.block_id, &victim.data)?;
                }
            }
        }
        lines.push_front(CacheLine {
            block_id,
            data: Box::new(*buf),
            dirty,
        });
        Ok(())
    }

    fn read_cache(&self, block_id: u32, buf: &mut [u8; BLOCK_SIZE]) -> Result<()> {
        let mut lines = self.lines.lock();
        let pos = lines
            .iter()
            .position(|line| line.block_id == block_id)
            .ok_or(Error::CacheMiss)?;
        if let Some(line) = lines.remove(pos) {
            buf.copy_from_slice(&line.data[..]);
            lines.push_front(line);
        }
        Ok(())
    }

    fn flush(&self, device: &impl BlockDevice) -> Result<()> {
        let mut lines = self.lines.lock();
        for line in lines.iter_mut().filter(|line| line.dirty) {
            device.write_block(line.block_id, &line.data)?;
            line.dirty = false;
        }
        Ok(())
    }
}
