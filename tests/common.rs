//! Common utilities for tests
#![allow(unused)]

use std::sync::{Arc, Mutex};

use chadfs::{BlockDevice, FileSystem, FsError, Result, SECTOR_SIZE};

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

/// In-memory device with a fixed number of sectors.
#[derive(Debug)]
pub struct RamDisk {
    inner: Mutex<Vec<u8>>,
    num_sectors: u32,
    fail_writes_at: Mutex<Option<u32>>,
}

impl RamDisk {
    pub fn new(num_sectors: u32) -> Self {
        RamDisk {
            inner: Mutex::new(vec![0u8; num_sectors as usize * SECTOR_SIZE]),
            num_sectors,
            fail_writes_at: Mutex::new(None),
        }
    }

    /// Makes every write to `address` fail with an I/O error until cleared.
    pub fn fail_writes_at(&self, address: Option<u32>) {
        *self.fail_writes_at.lock().unwrap() = address;
    }

    pub fn sector(&self, address: u32) -> Vec<u8> {
        let start = address as usize * SECTOR_SIZE;
        self.inner.lock().unwrap()[start..start + SECTOR_SIZE].to_vec()
    }

    pub fn snapshot(&self) -> Vec<u8> {
        self.inner.lock().unwrap().clone()
    }

    fn check(&self, address: u32) -> Result<usize> {
        if address >= self.num_sectors {
            return Err(FsError::Io {
                address,
                kind: std::io::ErrorKind::UnexpectedEof,
            });
        }
        Ok(address as usize * SECTOR_SIZE)
    }
}

impl BlockDevice for RamDisk {
    fn read_sector(&self, address: u32, buf: &mut [u8; SECTOR_SIZE]) -> Result<()> {
        let start = self.check(address)?;
        buf.copy_from_slice(&self.inner.lock().unwrap()[start..start + SECTOR_SIZE]);
        Ok(())
    }

    fn write_sector(&self, address: u32, buf: &[u8; SECTOR_SIZE]) -> Result<()> {
        if *self.fail_writes_at.lock().unwrap() == Some(address) {
            return Err(FsError::Io {
                address,
                kind: std::io::ErrorKind::Other,
            });
        }
        let start = self.check(address)?;
        self.inner.lock().unwrap()[start..start + SECTOR_SIZE].copy_from_slice(buf);
        Ok(())
    }
}

/// Sectors needed for a main block plus volumes with the given ID-table sizes.
pub fn image_sectors(volumes: &[u32]) -> u32 {
    1 + volumes
        .iter()
        .map(|&n| chadfs::volume_span(n).unwrap())
        .sum::<u32>()
}

/// A formatted image holding one volume `v` with `num_iblks` ID-table sectors.
pub fn single_volume(num_iblks: u32) -> FileSystem<RamDisk> {
    let disk = RamDisk::new(image_sectors(&[num_iblks]));
    let mut fs = FileSystem::format(Arc::new(disk)).unwrap();
    fs.add_volume("v", num_iblks).unwrap();
    fs
}

/// Deterministic payload of `len` bytes.
pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 % 251) as u8).collect()
}
