use alloc::boxed::Box;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

use log::{debug, info};

use crate::config::*;
use crate::directory::{self, allocate_entry, dir_is_empty, list_entries, own_entry, read_dir_block,
    tombstone_entry, write_dir_block};
use crate::fat::Fat;
use crate::file::FileStream;
use crate::path::{resolve, resolve_dir, Resolution};
use crate::structs::*;
use crate::superblock::{check_superblock, write_superblock};
use crate::{BlockDevice, Error, Result};

/// A formatted virtual disk together with its allocation table and current directory.
#[derive(Debug)]
pub struct FileSystem<D: BlockDevice> {
    device: Arc<D>,
    fat: Fat,
    cwd: CurrentDir,
}

impl<D: BlockDevice> FileSystem<D> {
    /// Erases the device and lays out an empty file system on it.
    pub fn format(device: Arc<D>) -> Result<Self> {
        let zero_block = Box::new([0u8; BLOCK_SIZE]);
        for block_id in 0..MAX_BLOCKS as u32 {
            device.write_block(block_id, &zero_block)?;
        }
        write_superblock(&*device)?;

        let fat = Fat::formatted();
        fat.persist(&*device)?;
        write_dir_block(&*device, ROOT_DIR_BLOCK, &DirBlock::empty(ROOT_DIR_BLOCK))?;
        info!("formatted disk: {} blocks of {} bytes", MAX_BLOCKS, BLOCK_SIZE);

        Ok(Self {
            device,
            fat,
            cwd: CurrentDir::AtRoot,
        })
    }

    /// Opens a file system previously formatted on the device.
    pub fn mount(device: Arc<D>) -> Result<Self> {
        check_superblock(&*device)?;
        let fat = Fat::load(&*device)?;
        match read_dir_block(&*device, ROOT_DIR_BLOCK) {
            Ok(_) => {}
            Err(Error::NotADirectory) => return Err(Error::InvalidImage("root is not a directory")),
            Err(e) => return Err(e),
        }
        info!("mounted disk: {} free blocks", fat.free_blocks());
        Ok(Self {
            device,
            fat,
            cwd: CurrentDir::AtRoot,
        })
    }

    /// Re-reads the allocation table after the device content was replaced wholesale.
    pub(crate) fn remount(&mut self) -> Result<()> {
        *self = Self::mount(Arc::clone(&self.device))?;
        Ok(())
    }

    // Following methods directly operate on the fs instance, users should wrap a lock around it if needed.

    pub fn open(&mut self, path: &str, mode: Mode) -> Result<FileStream> {
        let res = resolve(&*self.device, &self.cwd, path)?.require_dir()?;
        if res.names_start_dir() {
            return Err(Error::IsADirectory);
        }

        let (slot, entry) = match (res.entry, mode) {
            (None, Mode::Read) => return Err(Error::EntryNotFound),
            (None, Mode::Write | Mode::Append) => {
                let slot = allocate_entry(
                    &*self.device,
                    &mut self.fat,
                    res.dir_block,
                    res.name.as_bytes(),
                    false,
                )?;
                (slot, read_dir_block(&*self.device, res.dir_block)?.entries[slot])
            }
            (Some(found), _) if found.entry.is_dir => return Err(Error::IsADirectory),
            (Some(found), Mode::Write) => {
                (found.slot, self.truncate(res.dir_block, found.slot, found.entry)?)
            }
            (Some(found), Mode::Read | Mode::Append) => (found.slot, found.entry),
        };

        debug!("[open] {} ({:?}) -> slot {} of block {}", path, mode, slot, res.dir_block);
        FileStream::open(&*self.device, &self.fat, res.dir_block, slot, &entry, mode)
    }

    /// Replaces the chain of a file with a fresh one-block chain, keeping its slot.
    /// Releasing first guarantees the new block can be allocated.
    fn truncate(&mut self, dir_block: u32, slot: usize, entry: DirEntry) -> Result<DirEntry> {
        self.fat.release_chain(&*self.device, entry.first_block)?;
        let first_block = self.fat.allocate_chain(&*self.device)?;

        let mut dir = read_dir_block(&*self.device, dir_block)?;
        let stored = &mut dir.entries[slot];
        stored.first_block = first_block;
        stored.file_length = 0;
        stored.mod_time = directory::now();
        let truncated = *stored;
        write_dir_block(&*self.device, dir_block, &dir)?;
        Ok(truncated)
    }

    pub fn read_byte(&self, stream: &mut FileStream) -> Result<Option<u8>> {
        stream.read_byte(&*self.device, &self.fat)
    }

    pub fn write_byte(&mut self, stream: &mut FileStream, byte: u8) -> Result<()> {
        stream.write_byte(&*self.device, &mut self.fat, byte)
    }

    pub fn close(&mut self, stream: FileStream) -> Result<()> {
        stream.close(&*self.device)
    }

    pub fn write_all(&mut self, stream: &mut FileStream, buf: &[u8]) -> Result<()> {
        for &byte in buf {
            self.write_byte(stream, byte)?;
        }
        Ok(())
    }

    pub fn read_to_end(&self, stream: &mut FileStream) -> Result<Vec<u8>> {
        let mut data = Vec::with_capacity(stream.len() as usize);
        while let Some(byte) = self.read_byte(stream)? {
            data.push(byte);
        }
        Ok(data)
    }

    /// Creates or truncates the file at `path` and fills it with `data`.
    pub fn write_file(&mut self, path: &str, data: &[u8]) -> Result<()> {
        let mut stream = self.open(path, Mode::Write)?;
        let written = self.write_all(&mut stream, data);
        // The length reached so far is recorded even if the disk filled up.
        self.close(stream)?;
        written
    }

    pub fn read_file(&mut self, path: &str) -> Result<Vec<u8>> {
        let mut stream = self.open(path, Mode::Read)?;
        let data = self.read_to_end(&mut stream)?;
        self.close(stream)?;
        Ok(data)
    }

    pub fn make_directory(&mut self, path: &str) -> Result<()> {
        let res = resolve(&*self.device, &self.cwd, path)?.require_dir()?;
        if res.names_start_dir() || res.entry.is_some() {
            return Err(Error::EntryAlreadyExists);
        }
        allocate_entry(&*self.device, &mut self.fat, res.dir_block, res.name.as_bytes(), true)?;
        Ok(())
    }

    pub fn remove_file(&mut self, path: &str) -> Result<()> {
        let res = resolve(&*self.device, &self.cwd, path)?.require_dir()?;
        if res.names_start_dir() {
            return Err(Error::IsADirectory);
        }
        let found = res.entry.ok_or(Error::EntryNotFound)?;
        if found.entry.is_dir {
            return Err(Error::IsADirectory);
        }
        // Walk the chain first so a corrupted one fails before the entry is touched.
        self.fat.chain(found.entry.first_block)?;
        tombstone_entry(&*self.device, res.dir_block, found.slot)?;
        self.fat.release_chain(&*self.device, found.entry.first_block)?;
        debug!("[remove_file] {}", path);
        Ok(())
    }

    pub fn remove_directory(&mut self, path: &str) -> Result<()> {
        let res = resolve(&*self.device, &self.cwd, path)?;
        if res.names_start_dir() {
            // "/" or "."; the root always contains the current directory unless it is current.
            if res.dir_block == self.cwd.block() {
                return Err(Error::CannotRemoveCurrentDirectory);
            }
            return Err(Error::DirectoryNotEmpty);
        }
        let res = res.require_dir()?;
        let found = res.entry.ok_or(Error::EntryNotFound)?;
        if found.entry.first_block == self.cwd.block() {
            return Err(Error::CannotRemoveCurrentDirectory);
        }
        if !found.entry.is_dir {
            return Err(Error::NotADirectory);
        }
        if !dir_is_empty(&*self.device, found.entry.first_block)? {
            return Err(Error::DirectoryNotEmpty);
        }
        // Walk the chain first so a corrupted one fails before the entry is touched.
        self.fat.chain(found.entry.first_block)?;
        tombstone_entry(&*self.device, res.dir_block, found.slot)?;
        self.fat.release_chain(&*self.device, found.entry.first_block)?;
        debug!("[remove_directory] {}", path);
        Ok(())
    }

    pub fn change_directory(&mut self, path: &str) -> Result<()> {
        let target = match path {
            "/" => ROOT_DIR_BLOCK,
            DOTDOT_NAME => match self.cwd {
                CurrentDir::AtRoot => return Err(Error::CannotAscendAboveRoot),
                CurrentDir::At(handle) => directory::parent_of(&*self.device, handle.block)?,
            },
            _ => resolve_dir(&*self.device, &self.cwd, path)?,
        };
        self.cwd = match own_entry(&*self.device, target)? {
            None => CurrentDir::AtRoot,
            Some(entry) => CurrentDir::At(DirHandle { block: target, entry }),
        };
        debug!("[change_directory] {} -> block {}", path, target);
        Ok(())
    }

    /// Names of the entries of the directory at `path`, in slot order.
    pub fn list_directory(&self, path: &str) -> Result<Vec<String>> {
        let dir_block = resolve_dir(&*self.device, &self.cwd, path)?;
        list_entries(&*self.device, dir_block)
    }

    /// Entry describing the file or directory at `path`.
    pub fn stat(&self, path: &str) -> Result<DirEntry> {
        let res = resolve(&*self.device, &self.cwd, path)?.require_dir()?;
        if res.names_start_dir() {
            // The root has no entry of its own.
            return own_entry(&*self.device, res.dir_block)?.ok_or(Error::EntryNotFound);
        }
        res.entry.map(|found| found.entry).ok_or(Error::EntryNotFound)
    }

    /// Resolves `path` against the current directory without changing anything.
    pub fn resolve(&self, path: &str) -> Result<Resolution> {
        resolve(&*self.device, &self.cwd, path)
    }

    pub fn current_directory(&self) -> &CurrentDir {
        &self.cwd
    }

    pub fn current_dir_name(&self) -> String {
        match &self.cwd {
            CurrentDir::AtRoot => String::from(ROOT_NAME),
            CurrentDir::At(handle) => handle.entry.name_str(),
        }
    }

    /// Absolute path of the current directory, rebuilt from parent links.
    pub fn current_path(&self) -> Result<String> {
        let mut names = Vec::new();
        let mut block = self.cwd.block();
        while let Some(entry) = own_entry(&*self.device, block)? {
            if names.len() >= MAX_BLOCKS {
                return Err(Error::Corrupted("cycle in directory parents"));
            }
            names.push(entry.name_str());
            block = directory::parent_of(&*self.device, block)?;
        }
        names.reverse();
        Ok(String::from("/") + &names.join("/"))
    }

    pub fn fat(&self) -> &Fat {
        &self.fat
    }

    pub fn free_blocks(&self) -> usize {
        self.fat.free_blocks()
    }

    pub fn flush(&self) -> Result<()> {
        self.device.flush()
    }

    pub fn device(&self) -> Arc<D> {
        Arc::clone(&self.device)
    }
}
