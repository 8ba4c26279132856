//! On-disk records and their explicit byte codecs.
//!
//! A block is decoded according to its role (directory, FAT or raw data) instead of
//! reinterpreting the same bytes through different layouts.

use alloc::string::String;
use core::str::FromStr;

use crate::config::*;
use crate::Error;
use crate::Result;

/// Raw content of a block, for file data.
pub type DataBlock = [u8; BLOCK_SIZE];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Read,
    Write,
    Append,
}

impl Mode {
    pub fn is_writable(&self) -> bool {
        !matches!(self, Mode::Read)
    }
}

impl TryFrom<char> for Mode {
    type Error = Error;

    fn try_from(c: char) -> Result<Self> {
        match c {
            'r' => Ok(Mode::Read),
            'w' => Ok(Mode::Write),
            'a' => Ok(Mode::Append),
            _ => Err(Error::InvalidMode),
        }
    }
}

impl FromStr for Mode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Mode::try_from(c),
            _ => Err(Error::InvalidMode),
        }
    }
}

/// State of one block in the file allocation table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FatEntry {
    Unused,
    EndOfChain,
    Next(u32),
}

impl FatEntry {
    const UNUSED_RAW: i16 = -1;
    const END_OF_CHAIN_RAW: i16 = 0;

    pub fn to_raw(self) -> i16 {
        match self {
            FatEntry::Unused => Self::UNUSED_RAW,
            FatEntry::EndOfChain => Self::END_OF_CHAIN_RAW,
            FatEntry::Next(next) => next as i16,
        }
    }

    pub fn from_raw(raw: i16) -> Result<Self> {
        match raw {
            Self::UNUSED_RAW => Ok(FatEntry::Unused),
            Self::END_OF_CHAIN_RAW => Ok(FatEntry::EndOfChain),
            next if next > 0 && (next as usize) < MAX_BLOCKS => Ok(FatEntry::Next(next as u32)),
            _ => Err(Error::Corrupted("FAT entry out of range")),
        }
    }
}

pub fn trim_zero(name: &[u8]) -> &[u8] {
    let mut end = name.len();
    while end > 0 && name[end - 1] == 0 {
        end -= 1;
    }
    &name[..end]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirEntry {
    pub is_dir: bool,
    pub unused: bool, // Tombstone
    pub first_block: u32,
    pub file_length: u32,
    pub mod_time: u64,
    pub name: [u8; MAX_NAME],
}

impl DirEntry {
    pub const NULL: Self = Self {
        is_dir: false,
        unused: false,
        first_block: 0,
        file_length: 0,
        mod_time: 0,
        name: [0; MAX_NAME],
    };

    pub fn new(name: &[u8], is_dir: bool, first_block: u32, mod_time: u64) -> Result<Self> {
        // One byte is kept for the terminating NUL.
        if name.len() >= MAX_NAME {
            return Err(Error::NameTooLong);
        }
        // Stored names are NUL-padded, so a NUL inside one would truncate it.
        if name.contains(&0) {
            return Err(Error::InvalidName);
        }
        let mut entry = Self::NULL;
        entry.name[..name.len()].copy_from_slice(name);
        entry.is_dir = is_dir;
        entry.first_block = first_block;
        entry.mod_time = mod_time;
        Ok(entry)
    }

    pub fn name(&self) -> &[u8] {
        trim_zero(&self.name)
    }

    pub fn name_str(&self) -> String {
        String::from_utf8_lossy(self.name()).into_owned()
    }

    pub fn name_eq(&self, name: &[u8]) -> bool {
        self.name() == name
    }

    fn decode(buf: &[u8]) -> Result<Self> {
        let first_block = u16::from_le_bytes([buf[2], buf[3]]) as u32;
        if first_block as usize >= MAX_BLOCKS {
            return Err(Error::Corrupted("directory entry out of range"));
        }
        let mut name = [0u8; MAX_NAME];
        name.copy_from_slice(&buf[16..16 + MAX_NAME]);
        Ok(Self {
            is_dir: buf[0] != 0,
            unused: buf[1] != 0,
            first_block,
            file_length: u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]),
            mod_time: u64::from_le_bytes([
                buf[8], buf[9], buf[10], buf[11], buf[12], buf[13], buf[14], buf[15],
            ]),
            name,
        })
    }

    fn encode(&self, buf: &mut [u8]) {
        buf[0] = self.is_dir as u8;
        buf[1] = self.unused as u8;
        buf[2..4].copy_from_slice(&(self.first_block as u16).to_le_bytes());
        buf[4..8].copy_from_slice(&self.file_length.to_le_bytes());
        buf[8..16].copy_from_slice(&self.mod_time.to_le_bytes());
        buf[16..16 + MAX_NAME].copy_from_slice(&self.name);
    }
}

/// A directory block: header plus a fixed array of entry slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirBlock {
    pub parent: u32,
    pub next_free: usize, // Slots below this index have been handed out at least once
    pub entries: [DirEntry; DIR_ENTRY_COUNT],
}

impl DirBlock {
    const DIR_MARKER: u8 = 1;

    pub fn empty(parent: u32) -> Self {
        Self {
            parent,
            next_free: 0,
            entries: [DirEntry::NULL; DIR_ENTRY_COUNT],
        }
    }

    pub fn decode(buf: &[u8; BLOCK_SIZE]) -> Result<Self> {
        if buf[0] != Self::DIR_MARKER {
            return Err(Error::NotADirectory);
        }
        let parent = u16::from_le_bytes([buf[2], buf[3]]) as u32;
        let next_free = u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]) as usize;
        if next_free > DIR_ENTRY_COUNT || parent as usize >= MAX_BLOCKS {
            return Err(Error::Corrupted("directory header out of range"));
        }

        let mut entries = [DirEntry::NULL; DIR_ENTRY_COUNT];
        for (i, entry) in entries.iter_mut().enumerate() {
            let start = DIR_HEADER_SIZE + i * DIR_ENTRY_SIZE;
            *entry = DirEntry::decode(&buf[start..start + DIR_ENTRY_SIZE])?;
        }
        Ok(Self { parent, next_free, entries })
    }

    pub fn encode(&self) -> [u8; BLOCK_SIZE] {
        let mut buf = [0u8; BLOCK_SIZE];
        buf[0] = Self::DIR_MARKER;
        buf[2..4].copy_from_slice(&(self.parent as u16).to_le_bytes());
        buf[4..8].copy_from_slice(&(self.next_free as u32).to_le_bytes());
        for (i, entry) in self.entries.iter().enumerate() {
            let start = DIR_HEADER_SIZE + i * DIR_ENTRY_SIZE;
            entry.encode(&mut buf[start..start + DIR_ENTRY_SIZE]);
        }
        buf
    }

    /// Live entries with their slot index, in slot order.
    pub fn live_entries(&self) -> impl Iterator<Item = (usize, &DirEntry)> {
        self.entries[..self.next_free]
            .iter()
            .enumerate()
            .filter(|(_, entry)| !entry.unused)
    }

    pub fn is_empty(&self) -> bool {
        self.live_entries().next().is_none()
    }
}

/// Handle on a directory other than the root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirHandle {
    pub block: u32,
    /// The directory's own entry, as stored in its parent when the handle was taken.
    pub entry: DirEntry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurrentDir {
    AtRoot,
    At(DirHandle),
}

impl CurrentDir {
    pub fn block(&self) -> u32 {
        match self {
            CurrentDir::AtRoot => ROOT_DIR_BLOCK,
            CurrentDir::At(handle) => handle.block,
        }
    }

    pub fn is_root(&self) -> bool {
        matches!(self, CurrentDir::AtRoot)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_capacity_constants() {
        assert_eq!(DIR_ENTRY_COUNT, 12);
        assert!(DIR_HEADER_SIZE + DIR_ENTRY_COUNT * DIR_ENTRY_SIZE <= BLOCK_SIZE);
    }

    #[test]
    fn test_dir_block_codec() {
        let mut dir = DirBlock::empty(ROOT_DIR_BLOCK);
        dir.entries[0] = DirEntry::new(b"notes.txt", false, 17, 1_700_000_000).unwrap();
        dir.entries[0].file_length = 4242;
        dir.entries[1] = DirEntry::new(b"sub", true, 18, 1_700_000_001).unwrap();
        dir.entries[1].unused = true;
        dir.next_free = 2;

        let buf = dir.encode();
        assert_eq!(buf[0], 1);
        let decoded = DirBlock::decode(&buf).unwrap();
        assert_eq!(decoded, dir);
        assert_eq!(decoded.entries[0].name(), b"notes.txt");
        assert_eq!(decoded.live_entries().count(), 1);
    }

    #[test]
    fn test_data_block_is_not_a_directory() {
        let buf = [0u8; BLOCK_SIZE];
        assert!(matches!(DirBlock::decode(&buf), Err(Error::NotADirectory)));
    }

    #[test]
    fn test_name_limits() {
        let longest = [b'a'; MAX_NAME - 1];
        assert!(DirEntry::new(&longest, false, 4, 0).is_ok());
        let too_long = [b'a'; MAX_NAME];
        assert!(matches!(DirEntry::new(&too_long, false, 4, 0), Err(Error::NameTooLong)));
    }

    #[test]
    fn test_nul_in_name() {
        assert!(matches!(DirEntry::new(b"a\0b", false, 4, 0), Err(Error::InvalidName)));
        assert!(matches!(DirEntry::new(b"a\0", true, 4, 0), Err(Error::InvalidName)));
    }

    #[test]
    fn test_entry_off_disk() {
        let mut dir = DirBlock::empty(ROOT_DIR_BLOCK);
        dir.entries[0] = DirEntry::new(b"f", false, MAX_BLOCKS as u32 - 1, 0).unwrap();
        dir.next_free = 1;
        let mut buf = dir.encode();
        assert!(DirBlock::decode(&buf).is_ok());

        let at = DIR_HEADER_SIZE + 2;
        buf[at..at + 2].copy_from_slice(&(MAX_BLOCKS as u16).to_le_bytes());
        assert!(matches!(DirBlock::decode(&buf), Err(Error::Corrupted(_))));
    }

    #[test]
    fn test_name_eq_is_exact() {
        let entry = DirEntry::new(b"Test", false, 4, 0).unwrap();
        assert!(entry.name_eq(b"Test"));
        assert!(!entry.name_eq(b"test"));
        assert!(!entry.name_eq(b"Tes"));
        assert!(!entry.name_eq(b"Test1"));
    }

    #[test]
    fn test_fat_entry_raw() {
        assert_eq!(FatEntry::from_raw(-1).unwrap(), FatEntry::Unused);
        assert_eq!(FatEntry::from_raw(0).unwrap(), FatEntry::EndOfChain);
        assert_eq!(FatEntry::from_raw(42).unwrap(), FatEntry::Next(42));
        assert_eq!(FatEntry::Next(42).to_raw(), 42);
        assert!(FatEntry::from_raw(-7).is_err());
    }

    #[test]
    fn test_mode_parse() {
        assert_eq!("r".parse::<Mode>().unwrap(), Mode::Read);
        assert_eq!(Mode::try_from('a').unwrap(), Mode::Append);
        assert!(matches!("rw".parse::<Mode>(), Err(Error::InvalidMode)));
        assert!(matches!(Mode::try_from('x'), Err(Error::InvalidMode)));
        assert!(!Mode::Read.is_writable());
        assert!(Mode::Write.is_writable());
    }
}
