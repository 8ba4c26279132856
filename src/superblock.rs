use alloc::boxed::Box;

use crate::config::*;
use crate::{BlockDevice, Error, Result};

/// Writes the disk signature into block 0.
pub fn write_superblock(device: &impl BlockDevice) -> Result<()> {
    let mut buf = Box::new([0u8; BLOCK_SIZE]);
    buf[..DISK_SIGNATURE.len()].copy_from_slice(DISK_SIGNATURE);
    device.write_block(SIGNATURE_BLOCK, &buf)?;
    Ok(())
}

/// Checks that block 0 carries the disk signature.
pub fn check_superblock(device: &impl BlockDevice) -> Result<()> {
    let mut buf = Box::new([0u8; BLOCK_SIZE]);
    device.read_block(SIGNATURE_BLOCK, &mut buf)?;
    if !buf.starts_with(DISK_SIGNATURE) {
        return Err(Error::InvalidImage("missing disk signature"));
    }
    Ok(())
}
