//! Whole-disk images: MAX_BLOCKS blocks of BLOCK_SIZE bytes, concatenated without any header.

use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::Path;

use alloc::boxed::Box;
use alloc::vec::Vec;

use log::info;

use crate::config::*;
use crate::{BlockDevice, DirBlock, Error, FileSystem, Result};

impl<D: BlockDevice> FileSystem<D> {
    /// Writes every block of the disk to `writer`, in order.
    pub fn save_image_to(&self, writer: &mut impl Write) -> Result<()> {
        let device = self.device();
        let mut buf = Box::new([0u8; BLOCK_SIZE]);
        for block_id in 0..MAX_BLOCKS as u32 {
            device.read_block(block_id, &mut buf)?;
            writer.write_all(&buf[..])?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn save_image(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path.as_ref())?);
        self.save_image_to(&mut writer)?;
        info!("saved disk image to {}", path.as_ref().display());
        Ok(())
    }

    /// Replaces the whole disk with an image read from `reader`.
    /// The allocation table is re-read from the image and the current directory reset to root.
    /// The disk is left untouched if the image is short, lacks the signature or has a damaged root.
    pub fn load_image_from(&mut self, reader: &mut impl Read) -> Result<()> {
        let mut image = Vec::with_capacity(MAX_BLOCKS * BLOCK_SIZE);
        reader.take((MAX_BLOCKS * BLOCK_SIZE) as u64).read_to_end(&mut image)?;
        if image.len() < MAX_BLOCKS * BLOCK_SIZE {
            return Err(Error::InvalidImage("image is shorter than the disk"));
        }
        if !image.starts_with(DISK_SIGNATURE) {
            return Err(Error::InvalidImage("missing disk signature"));
        }
        let root_at = ROOT_DIR_BLOCK as usize * BLOCK_SIZE;
        let mut root = Box::new([0u8; BLOCK_SIZE]);
        root.copy_from_slice(&image[root_at..root_at + BLOCK_SIZE]);
        if DirBlock::decode(&root).is_err() {
            return Err(Error::InvalidImage("damaged root directory"));
        }

        let device = self.device();
        let mut buf = Box::new([0u8; BLOCK_SIZE]);
        for (block_id, chunk) in image.chunks_exact(BLOCK_SIZE).enumerate() {
            buf.copy_from_slice(chunk);
            device.write_block(block_id as u32, &buf)?;
        }
        self.remount()
    }

    pub fn load_image(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let file = match File::open(path.as_ref()) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(Error::InvalidImage("image file does not exist"));
            }
            Err(e) => return Err(e.into()),
        };
        self.load_image_from(&mut BufReader::new(file))?;
        info!("loaded disk image from {}", path.as_ref().display());
        Ok(())
    }
}
