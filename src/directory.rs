use alloc::boxed::Box;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use log::debug;

use crate::config::*;
use crate::error::{FsError, Result};
use crate::fat::Fat;
use crate::structs::*;
use crate::BlockDevice;

/// Seconds since the Unix epoch, used as modification time.
pub(crate) fn now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}

pub fn read_dir_block(device: &impl BlockDevice, block_id: u32) -> Result<DirBlock> {
    let mut buf = Box::new([0u8; BLOCK_SIZE]);
    device.read_block(block_id, &mut buf)?;
    DirBlock::decode(&buf)
}

pub fn write_dir_block(device: &impl BlockDevice, block_id: u32, dir: &DirBlock) -> Result<()> {
    device.write_block(block_id, &dir.encode())
}

/// Slot of the live entry called `name`.
pub fn find_entry(dir: &DirBlock, name: &[u8]) -> Result<usize> {
    dir.live_entries()
        .find(|(_, entry)| entry.name_eq(name))
        .map(|(slot, _)| slot)
        .ok_or(FsError::EntryNotFound)
}

/// Query an entry by name in the directory stored at `dir_block`.
pub fn dir_lookup(
    device: &impl BlockDevice,
    dir_block: u32,
    name: &[u8],
) -> Result<(usize, DirEntry)> {
    let dir = read_dir_block(device, dir_block)?;
    let slot = find_entry(&dir, name)?;
    debug!("[dir_lookup] found {} in block {} at slot {}",
        String::from_utf8_lossy(name), dir_block, slot);
    Ok((slot, dir.entries[slot]))
}

/// Creates a new entry in the directory stored at `dir_block`, together with a one-block chain
/// for its content. A new directory's block is initialised as an empty directory whose parent
/// is `dir_block`.
/// Nothing is modified if the call fails.
/// Returns the slot of the new entry.
pub fn allocate_entry(
    device: &impl BlockDevice,
    fat: &mut Fat,
    dir_block: u32,
    name: &[u8],
    is_dir: bool,
) -> Result<usize> {
    if name.is_empty() {
        return Err(FsError::PathNotFound);
    }
    if name.len() >= MAX_NAME {
        return Err(FsError::NameTooLong);
    }
    if name.contains(&0) {
        return Err(FsError::InvalidName);
    }
    // '.' and '..' always name existing directories.
    if name == DOT_NAME.as_bytes() || name == DOTDOT_NAME.as_bytes() {
        return Err(FsError::EntryAlreadyExists);
    }

    let mut dir = read_dir_block(device, dir_block)?;
    if find_entry(&dir, name).is_ok() {
        return Err(FsError::EntryAlreadyExists);
    }

    let slot = if dir.next_free < DIR_ENTRY_COUNT {
        dir.next_free
    } else {
        dir.entries
            .iter()
            .position(|entry| entry.unused)
            .ok_or(FsError::DirectoryFull)?
    };

    let first_block = fat.allocate_chain(device)?;
    if is_dir {
        write_dir_block(device, first_block, &DirBlock::empty(dir_block))?;
    } else {
        device.write_block(first_block, &[0u8; BLOCK_SIZE])?;
    }

    dir.entries[slot] = DirEntry::new(name, is_dir, first_block, now())?;
    if slot == dir.next_free {
        dir.next_free += 1;
    }
    write_dir_block(device, dir_block, &dir)?;

    debug!("[allocate_entry] {} {} -> slot {} of block {}, first block {}",
        if is_dir { "directory" } else { "file" },
        String::from_utf8_lossy(name), slot, dir_block, first_block);
    Ok(slot)
}

/// Marks the entry at `slot` as unused.
/// Does not release the entry's chain, which is the caller's responsibility.
pub fn tombstone_entry(device: &impl BlockDevice, dir_block: u32, slot: usize) -> Result<DirEntry> {
    let mut dir = read_dir_block(device, dir_block)?;
    if slot >= dir.next_free || dir.entries[slot].unused {
        return Err(FsError::EntryNotFound);
    }
    dir.entries[slot].unused = true;
    let removed = dir.entries[slot];
    write_dir_block(device, dir_block, &dir)?;
    Ok(removed)
}

/// Names of the live entries of a directory, in slot order.
pub fn list_entries(device: &impl BlockDevice, dir_block: u32) -> Result<Vec<String>> {
    let dir = read_dir_block(device, dir_block)?;
    Ok(dir.live_entries().map(|(_, entry)| entry.name_str()).collect())
}

pub fn dir_is_empty(device: &impl BlockDevice, dir_block: u32) -> Result<bool> {
    Ok(read_dir_block(device, dir_block)?.is_empty())
}

pub fn parent_of(device: &impl BlockDevice, dir_block: u32) -> Result<u32> {
    Ok(read_dir_block(device, dir_block)?.parent)
}

/// The entry describing the directory stored at `dir_block`, fetched from its parent.
/// The root has no entry.
pub fn own_entry(device: &impl BlockDevice, dir_block: u32) -> Result<Option<DirEntry>> {
    if dir_block == ROOT_DIR_BLOCK {
        return Ok(None);
    }
    let parent = read_dir_block(device, parent_of(device, dir_block)?)?;
    parent
        .live_entries()
        .find(|(_, entry)| entry.is_dir && entry.first_block == dir_block)
        .map(|(_, entry)| Some(*entry))
        .ok_or(FsError::Corrupted("directory missing from its parent"))
}

/// Display name of a directory: "root" for the root, its entry name otherwise.
pub fn dir_name(device: &impl BlockDevice, dir_block: u32) -> Result<String> {
    Ok(match own_entry(device, dir_block)? {
        Some(entry) => entry.name_str(),
        None => ROOT_NAME.to_string(),
    })
}
