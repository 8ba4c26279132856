pub const DISK_SIGNATURE: &[u8] = b"chainfs virtual disk"; // Stored at the start of block 0

pub const BLOCK_SIZE: usize = 1024;
pub const MAX_BLOCKS: usize = 1024;
pub const SIGNATURE_BLOCK: u32 = 0; // Block ID for the signature block
pub const FAT_START: u32 = 1; // First block of the serialized FAT
pub const FAT_BLOCKS: u32 = 2; // Size of the serialized FAT in blocks
pub const ROOT_DIR_BLOCK: u32 = 3; // Block ID for the root directory
pub const FAT_ENTRY_SIZE: usize = 2; // FAT entries are stored as i16
pub const FAT_ENTRIES_PER_BLOCK: usize = BLOCK_SIZE / FAT_ENTRY_SIZE;

pub const MAX_NAME: usize = 64; // Name buffer, names hold at most MAX_NAME - 1 bytes
pub const MAX_PATH_LEN: usize = 1024;
pub const DIR_HEADER_SIZE: usize = 8; // isDir + reserved + parent (u16) + next free slot (u32)
pub const DIR_ENTRY_SIZE: usize = 16 + MAX_NAME; // Fixed fields + name
pub const DIR_ENTRY_COUNT: usize = (BLOCK_SIZE - DIR_HEADER_SIZE) / DIR_ENTRY_SIZE; // Slots per directory block
pub const ROOT_NAME: &str = "root";
pub const DOT_NAME: &str = ".";
pub const DOTDOT_NAME: &str = "..";

const _: () = assert!(FAT_BLOCKS as usize * FAT_ENTRIES_PER_BLOCK >= MAX_BLOCKS);
const _: () = assert!(MAX_BLOCKS <= i16::MAX as usize + 1);
