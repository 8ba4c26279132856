//! The file allocation table.
//! Every file and directory owns a chain of blocks linked through the table,
//! and the table itself is serialized into blocks FAT_START..FAT_START + FAT_BLOCKS.

use alloc::boxed::Box;
use alloc::vec;
use alloc::vec::Vec;

use log::{debug, warn};

use crate::config::*;
use crate::error::FsError;
use crate::structs::FatEntry;
use crate::{BlockDevice, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fat {
    entries: Vec<FatEntry>,
}

impl Fat {
    /// Table of a freshly formatted disk: the reserved blocks are in use, everything else is free.
    pub fn formatted() -> Self {
        let mut entries = vec![FatEntry::Unused; MAX_BLOCKS];
        entries[SIGNATURE_BLOCK as usize] = FatEntry::EndOfChain;
        for i in 0..FAT_BLOCKS - 1 {
            entries[(FAT_START + i) as usize] = FatEntry::Next(FAT_START + i + 1);
        }
        entries[(FAT_START + FAT_BLOCKS - 1) as usize] = FatEntry::EndOfChain;
        entries[ROOT_DIR_BLOCK as usize] = FatEntry::EndOfChain;
        Self { entries }
    }

    pub fn load(device: &impl BlockDevice) -> Result<Self> {
        let mut entries = Vec::with_capacity(MAX_BLOCKS);
        let mut buf = Box::new([0u8; BLOCK_SIZE]);
        for i in 0..FAT_BLOCKS {
            device.read_block(FAT_START + i, &mut buf)?;
            for raw in buf.chunks_exact(FAT_ENTRY_SIZE) {
                if entries.len() == MAX_BLOCKS {
                    break;
                }
                entries.push(FatEntry::from_raw(i16::from_le_bytes([raw[0], raw[1]]))?);
            }
        }
        Ok(Self { entries })
    }

    pub fn persist(&self, device: &impl BlockDevice) -> Result<()> {
        let mut chunks = self.entries.chunks(FAT_ENTRIES_PER_BLOCK);
        for i in 0..FAT_BLOCKS {
            let mut buf = Box::new([0u8; BLOCK_SIZE]);
            if let Some(chunk) = chunks.next() {
                for (raw, entry) in buf.chunks_exact_mut(FAT_ENTRY_SIZE).zip(chunk) {
                    raw.copy_from_slice(&entry.to_raw().to_le_bytes());
                }
            }
            device.write_block(FAT_START + i, &buf)?;
        }
        Ok(())
    }

    pub fn get(&self, block_id: u32) -> FatEntry {
        self.entries[block_id as usize]
    }

    /// Block following `block_id` in its chain, if any.
    pub fn next(&self, block_id: u32) -> Result<Option<u32>> {
        match self.get(block_id) {
            FatEntry::Next(next) => Ok(Some(next)),
            FatEntry::EndOfChain => Ok(None),
            FatEntry::Unused => {
                warn!("[fat] block {} is linked into a chain but marked unused", block_id);
                Err(FsError::Corrupted("chain runs into an unused block"))
            }
        }
    }

    /// Lowest free block at or after the root directory block.
    pub fn find_free_block(&self) -> Result<u32> {
        (ROOT_DIR_BLOCK as usize..MAX_BLOCKS)
            .find(|&i| self.entries[i] == FatEntry::Unused)
            .map(|i| i as u32)
            .ok_or(FsError::NoFreeBlocks)
    }

    pub fn free_blocks(&self) -> usize {
        self.entries.iter().filter(|&&e| e == FatEntry::Unused).count()
    }

    /// Allocates a one-block chain and persists the table.
    pub fn allocate_chain(&mut self, device: &impl BlockDevice) -> Result<u32> {
        let block_id = self.find_free_block()?;
        self.entries[block_id as usize] = FatEntry::EndOfChain;
        self.persist(device)?;
        debug!("[fat] allocated chain at block {}", block_id);
        Ok(block_id)
    }

    /// Appends a free block after `last`, which must end its chain.
    /// Returns the new last block.
    pub fn extend_chain(&mut self, device: &impl BlockDevice, last: u32) -> Result<u32> {
        if self.get(last) != FatEntry::EndOfChain {
            return Err(FsError::Corrupted("extending a block that does not end its chain"));
        }
        let new_block = self.find_free_block()?;
        self.entries[last as usize] = FatEntry::Next(new_block);
        self.entries[new_block as usize] = FatEntry::EndOfChain;
        self.persist(device)?;
        debug!("[fat] extended chain {} -> {}", last, new_block);
        Ok(new_block)
    }

    /// Every block of the chain starting at `start`, in order.
    pub fn chain(&self, start: u32) -> Result<Vec<u32>> {
        let mut blocks = vec![start];
        let mut current = start;
        while let Some(next) = self.next(current)? {
            if blocks.len() >= MAX_BLOCKS {
                warn!("[fat] chain starting at {} never ends", start);
                return Err(FsError::Corrupted("cycle in block chain"));
            }
            blocks.push(next);
            current = next;
        }
        Ok(blocks)
    }

    pub fn chain_length(&self, start: u32) -> Result<usize> {
        Ok(self.chain(start)?.len())
    }

    pub fn end_of_chain(&self, start: u32) -> Result<u32> {
        let chain = self.chain(start)?;
        Ok(chain[chain.len() - 1])
    }

    /// Frees every block of the chain starting at `start`, zeroing its content.
    /// The table is persisted once, after the whole chain is released.
    pub fn release_chain(&mut self, device: &impl BlockDevice, start: u32) -> Result<()> {
        let chain = self.chain(start)?;
        let zero_block = Box::new([0u8; BLOCK_SIZE]);
        for &block_id in &chain {
            self.entries[block_id as usize] = FatEntry::Unused;
            device.write_block(block_id, &zero_block)?;
        }
        self.persist(device)?;
        debug!("[fat] released chain at block {} ({} blocks)", start, chain.len());
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::VirtualDisk;

    #[test]
    fn test_formatted_table() {
        let fat = Fat::formatted();
        assert_eq!(fat.get(0), FatEntry::EndOfChain);
        assert_eq!(fat.get(1), FatEntry::Next(2));
        assert_eq!(fat.get(2), FatEntry::EndOfChain);
        assert_eq!(fat.get(3), FatEntry::EndOfChain);
        assert_eq!(fat.find_free_block().unwrap(), 4);
        assert_eq!(fat.free_blocks(), MAX_BLOCKS - 4);
    }

    #[test]
    fn test_persist_and_load() {
        let disk = VirtualDisk::new();
        let mut fat = Fat::formatted();
        let start = fat.allocate_chain(&disk).unwrap();
        fat.extend_chain(&disk, start).unwrap();

        let loaded = Fat::load(&disk).unwrap();
        assert_eq!(loaded, fat);
        assert_eq!(loaded.chain_length(start).unwrap(), 2);
    }

    #[test]
    fn test_extend_and_release() {
        let disk = VirtualDisk::new();
        let mut fat = Fat::formatted();
        let start = fat.allocate_chain(&disk).unwrap();
        let second = fat.extend_chain(&disk, start).unwrap();
        let third = fat.extend_chain(&disk, second).unwrap();
        assert_eq!(fat.chain(start).unwrap(), vec![start, second, third]);
        assert_eq!(fat.end_of_chain(start).unwrap(), third);

        // Extending from the middle of a chain would orphan the tail.
        assert!(matches!(fat.extend_chain(&disk, start), Err(FsError::Corrupted(_))));

        let mut data = Box::new([0x5Au8; BLOCK_SIZE]);
        disk.write_block(second, &data).unwrap();
        fat.release_chain(&disk, start).unwrap();
        for block_id in [start, second, third] {
            assert_eq!(fat.get(block_id), FatEntry::Unused);
        }
        disk.read_block(second, &mut data).unwrap();
        assert!(data.iter().all(|&b| b == 0));
        assert_eq!(fat.find_free_block().unwrap(), start);
        assert_eq!(Fat::load(&disk).unwrap(), fat);
    }

    #[test]
    fn test_exhaustion_leaves_table_untouched() {
        let disk = VirtualDisk::new();
        let mut fat = Fat::formatted();
        let start = fat.allocate_chain(&disk).unwrap();
        let mut last = start;
        while let Ok(next) = fat.extend_chain(&disk, last) {
            last = next;
        }
        assert_eq!(fat.free_blocks(), 0);
        let before = fat.clone();
        assert!(matches!(fat.extend_chain(&disk, last), Err(FsError::NoFreeBlocks)));
        assert!(matches!(fat.allocate_chain(&disk), Err(FsError::NoFreeBlocks)));
        assert_eq!(fat, before);
        assert_eq!(fat.chain_length(start).unwrap(), MAX_BLOCKS - 4);
    }

    #[test]
    fn test_cycle_is_detected() {
        let mut fat = Fat::formatted();
        fat.entries[10] = FatEntry::Next(11);
        fat.entries[11] = FatEntry::Next(10);
        assert!(matches!(fat.chain_length(10), Err(FsError::Corrupted(_))));
    }
}
