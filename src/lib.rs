//! chainfs is a small FAT-style file system living on a fixed-size virtual disk.
//! No support for permissions, links, or other advanced features.
//!
//! chainfs's linear layout (MAX_BLOCKS blocks of BLOCK_SIZE bytes):
//! - Block 0: Signature
//! - Blocks 1-2: File Allocation Table
//! - Block 3: Root directory
//! - Remaining blocks: chains of file and directory content
//!
//! chainfs's layers (from bottom to top):
//! 1. Block Device: Whole-block load/store.                    | VirtualDisk, or user implemented
//! 2. Cache: Optional caching layer wrapping a block device.   | LruCache, or user implemented
//! 3. FAT: Block allocation and chains.                        | Fs implemented
//! 4. Directory/Path: Entries, lookups and path resolution.    | Fs implemented
//! 5. File: Byte streams over chains.                          | Fs implemented
//! 6. FileSystem: The main interface for users, plus disk images and host copies.

extern crate alloc;

mod config;
mod block_dev;
mod cache;
mod structs;
mod superblock;
mod fat;
mod directory;
mod path;
mod file;
mod fs;
mod image;
mod host;
mod error;

pub use block_dev::{BlockDevice, VirtualDisk};
pub use cache::{Cache, Cached, LruCache};
pub use config::*;
pub use structs::*;
pub use fat::Fat;
pub use path::{EntryRef, Resolution};
pub use file::FileStream;
pub use fs::*;
pub use host::{copy_in, copy_out};
pub use error::FsError as Error;
pub use error::Result;
