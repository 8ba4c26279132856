//! Common utilities for tests

#![allow(unused)]

use std::sync::Arc;

use chainfs::{BlockDevice, FileSystem, VirtualDisk};

pub const ORANGE: &str = "\x1b[38;5;214m";
pub const RESET: &str = "\x1b[0m";

/// Provides a macro for logging messages during tests.
/// e.g. log!("placeholder") -> println!("[test] placeholder");
#[macro_export]
macro_rules! log {
    ($msg:expr) => {
        println!("{}[test] {}{}", crate::common::ORANGE, $msg, crate::common::RESET)
    };
    ($msg:expr, $($arg:tt)*) => {
        println!("{}[test] {}{}", crate::common::ORANGE, format!($msg, $($arg)*), crate::common::RESET)
    };
}

/// Routes the library's `log` output to the test harness.
pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A freshly formatted file system on an in-memory disk.
pub fn fresh_fs() -> FileSystem<VirtualDisk> {
    init_logger();
    FileSystem::format(Arc::new(VirtualDisk::new())).unwrap()
}

/// Deterministic, non-repeating-per-block test data.
pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 + i / 251) as u8).collect()
}

/// Raw copy of one block of the device.
pub fn raw_block<D: BlockDevice>(fs: &FileSystem<D>, block_id: u32) -> Vec<u8> {
    let mut buf = [0u8; chainfs::BLOCK_SIZE];
    fs.device().read_block(block_id, &mut buf).unwrap();
    buf.to_vec()
}
