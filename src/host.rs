//! Copying files between the host and the virtual disk.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use log::debug;

use crate::{BlockDevice, FileSystem, Mode, Result};

/// Copies the host file at `host_path` into `disk_path`, creating or truncating it.
/// Returns the number of bytes copied.
pub fn copy_in<D: BlockDevice>(
    fs: &mut FileSystem<D>,
    host_path: impl AsRef<Path>,
    disk_path: &str,
) -> Result<usize> {
    // Opened before the disk stream, so a missing host file leaves the disk untouched.
    let reader = BufReader::new(File::open(host_path.as_ref())?);
    let mut stream = fs.open(disk_path, Mode::Write)?;

    let mut copied = 0;
    let mut outcome = Ok(());
    for byte in reader.bytes() {
        let written = byte
            .map_err(Into::into)
            .and_then(|byte| fs.write_byte(&mut stream, byte));
        if let Err(e) = written {
            outcome = Err(e);
            break;
        }
        copied += 1;
    }
    fs.close(stream)?;
    outcome?;

    debug!("[copy_in] {} -> {}: {} bytes", host_path.as_ref().display(), disk_path, copied);
    Ok(copied)
}

/// Copies `disk_path` out to the host file at `host_path`, creating or truncating it.
/// Returns the number of bytes copied.
pub fn copy_out<D: BlockDevice>(
    fs: &mut FileSystem<D>,
    disk_path: &str,
    host_path: impl AsRef<Path>,
) -> Result<usize> {
    // A read stream changes nothing on the disk, so it is opened first.
    let mut stream = fs.open(disk_path, Mode::Read)?;
    let file = match File::create(host_path.as_ref()) {
        Ok(file) => file,
        Err(e) => {
            fs.close(stream)?;
            return Err(e.into());
        }
    };

    let mut writer = BufWriter::new(file);
    let mut copied = 0;
    while let Some(byte) = fs.read_byte(&mut stream)? {
        writer.write_all(&[byte])?;
        copied += 1;
    }
    writer.flush()?;
    fs.close(stream)?;

    debug!("[copy_out] {} -> {}: {} bytes", disk_path, host_path.as_ref().display(), copied);
    Ok(copied)
}
