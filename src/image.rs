//! A block device backed by a host image file.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::config::SECTOR_SIZE;
use crate::error::{FsError, Result};
use crate::BlockDevice;

/// Sector `n` of the device is bytes `n * SECTOR_SIZE..` of the file.
/// Writes past the end grow the file.
#[derive(Debug)]
pub struct ImageFile {
    inner: Mutex<File>,
}

impl ImageFile {
    /// Creates (or truncates) the image at `path`.
    pub fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::options()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        Ok(Self::from_file(file))
    }

    /// Opens an existing image for reading and writing.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::options().read(true).write(true).open(path)?;
        Ok(Self::from_file(file))
    }

    pub fn from_file(file: File) -> Self {
        Self { inner: Mutex::new(file) }
    }

    fn lock(&self) -> MutexGuard<'_, File> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn seek_to(file: &mut File, address: u32) -> io::Result<()> {
        let start = address as u64 * SECTOR_SIZE as u64;
        file.seek(SeekFrom::Start(start)).map(|_| ())
    }
}

fn io_err(address: u32) -> impl FnOnce(io::Error) -> FsError {
    move |e| FsError::Io { address, kind: e.kind() }
}

impl BlockDevice for ImageFile {
    fn read_sector(&self, address: u32, buf: &mut [u8; SECTOR_SIZE]) -> Result<()> {
        let mut file = self.lock();
        Self::seek_to(&mut file, address)
            .and_then(|_| file.read_exact(buf))
            .map_err(io_err(address))
    }

    fn write_sector(&self, address: u32, buf: &[u8; SECTOR_SIZE]) -> Result<()> {
        let mut file = self.lock();
        Self::seek_to(&mut file, address)
            .and_then(|_| file.write_all(buf))
            .map_err(io_err(address))
    }

    fn flush(&self) -> Result<()> {
        let mut file = self.lock();
        file.flush().and_then(|_| file.sync_data()).map_err(io_err(0))
    }
}
