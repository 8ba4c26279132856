//! Byte streams over a block chain.

use alloc::boxed::Box;

use log::{debug, warn};

use crate::directory::{now, read_dir_block, write_dir_block};
use crate::fat::Fat;
use crate::{BlockDevice, DataBlock, DirEntry, Error, Mode, Result, BLOCK_SIZE};

/// An open file. Obtained from [`crate::FileSystem::open`] and consumed by
/// [`crate::FileSystem::close`].
#[derive(Debug)]
pub struct FileStream {
    mode: Mode,
    current_block: u32,
    block_index: u32, // Position of current_block within the chain
    offset: usize,    // Byte within the current block
    buffer: Box<DataBlock>,
    last_block: u32,
    length: u32,
    dir_block: u32,
    slot: usize,
}

impl FileStream {
    /// Opens a stream on the entry at `slot` of the directory at `dir_block`.
    /// Read and write streams start at the first byte, append streams after the last one.
    pub(crate) fn open(
        device: &impl BlockDevice,
        fat: &Fat,
        dir_block: u32,
        slot: usize,
        entry: &DirEntry,
        mode: Mode,
    ) -> Result<Self> {
        if entry.is_dir {
            return Err(Error::IsADirectory);
        }
        let chain_length = fat.chain_length(entry.first_block)? as u32;
        let last_block = fat.end_of_chain(entry.first_block)?;
        let length = entry.file_length;

        let (current_block, block_index, offset) = if mode == Mode::Append {
            // The last block must hold between 1 and BLOCK_SIZE bytes, or 0 for an empty file.
            let full_blocks = (chain_length - 1) as u64 * BLOCK_SIZE as u64;
            let tail = length as u64;
            if tail < full_blocks
                || tail > full_blocks + BLOCK_SIZE as u64
                || (chain_length > 1 && tail == full_blocks)
            {
                warn!("[open] length {} does not match chain of {} blocks at {}",
                    length, chain_length, entry.first_block);
                return Err(Error::Corrupted("file length disagrees with chain length"));
            }
            (last_block, chain_length - 1, (tail - full_blocks) as usize)
        } else {
            (entry.first_block, 0, 0)
        };

        let mut buffer = Box::new([0u8; BLOCK_SIZE]);
        device.read_block(current_block, &mut buffer)?;

        Ok(Self {
            mode,
            current_block,
            block_index,
            offset,
            buffer,
            last_block,
            length,
            dir_block,
            slot,
        })
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Logical length of the file, including bytes written through this stream.
    pub fn len(&self) -> u32 {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Absolute byte position of the stream.
    pub fn position(&self) -> u64 {
        self.block_index as u64 * BLOCK_SIZE as u64 + self.offset as u64
    }

    fn at_end_of_data(&self) -> bool {
        self.current_block == self.last_block && self.position() == self.length as u64
    }

    /// Moves to the block following the current one, flushing the buffer first if writable.
    fn advance(&mut self, device: &impl BlockDevice, fat: &Fat) -> Result<()> {
        let next = fat
            .next(self.current_block)?
            .ok_or(Error::Corrupted("stream ran past the end of its chain"))?;
        if self.mode.is_writable() {
            device.write_block(self.current_block, &self.buffer)?;
        }
        device.read_block(next, &mut self.buffer)?;
        self.current_block = next;
        self.block_index += 1;
        self.offset = 0;
        Ok(())
    }

    /// Reads the next byte, or `None` at the end of the file.
    pub fn read_byte(&mut self, device: &impl BlockDevice, fat: &Fat) -> Result<Option<u8>> {
        if self.at_end_of_data() {
            return Ok(None);
        }
        if self.offset == BLOCK_SIZE {
            self.advance(device, fat)?;
        }
        let byte = self.buffer[self.offset];
        self.offset += 1;
        Ok(Some(byte))
    }

    /// Writes a byte at the current position, growing the chain when the last block is full.
    /// On failure the stream is left unchanged.
    pub fn write_byte(&mut self, device: &impl BlockDevice, fat: &mut Fat, byte: u8) -> Result<()> {
        if !self.mode.is_writable() {
            return Err(Error::InvalidMode);
        }
        if self.offset == BLOCK_SIZE {
            if self.current_block == self.last_block {
                let new_block = fat.extend_chain(device, self.last_block)?;
                self.last_block = new_block;
            }
            self.advance(device, fat)?;
        }

        let grows = self.at_end_of_data();
        self.buffer[self.offset] = byte;
        if grows {
            self.length += 1;
        }
        self.offset += 1;
        Ok(())
    }

    /// Flushes the current block and records the final length in the owning directory entry.
    /// Read streams write nothing.
    pub(crate) fn close(self, device: &impl BlockDevice) -> Result<()> {
        if !self.mode.is_writable() {
            return Ok(());
        }
        device.write_block(self.current_block, &self.buffer)?;

        let mut dir = read_dir_block(device, self.dir_block)?;
        let entry = &mut dir.entries[self.slot];
        entry.file_length = self.length;
        entry.mod_time = now();
        write_dir_block(device, self.dir_block, &dir)?;
        debug!("[close] slot {} of block {}: {} bytes", self.slot, self.dir_block, self.length);
        Ok(())
    }
}
