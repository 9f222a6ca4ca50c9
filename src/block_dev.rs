use crate::config::SECTOR_SIZE;
use crate::error::Result;
use crate::structs::{Sector, SectorBlock};

/// Sector-granular storage underneath the filesystem.
///
/// Operations against one device are expected to be serialized by the caller;
/// `&self` receivers only allow sharing the handle, not concurrent use.
pub trait BlockDevice: Send + Sync {
    /// Reads the sector at `address` into `buf`.
    fn read_sector(&self, address: u32, buf: &mut [u8; SECTOR_SIZE]) -> Result<()>;

    /// Writes `buf` to the sector at `address`.
    fn write_sector(&self, address: u32, buf: &[u8; SECTOR_SIZE]) -> Result<()>;

    /// Flushes any buffered writes to the backing store.
    fn flush(&self) -> Result<()> {
        Ok(())
    }

    fn sector_size(&self) -> usize {
        SECTOR_SIZE
    }
}

pub(crate) fn read_raw(device: &impl BlockDevice, address: u32) -> Result<Sector> {
    let mut buf = [0u8; SECTOR_SIZE];
    device.read_sector(address, &mut buf)?;
    Ok(buf)
}

/// Reads the sector at `address` as a typed block.
pub fn read_block<T: SectorBlock>(device: &impl BlockDevice, address: u32) -> Result<T> {
    read_raw(device, address).map(T::from_sector)
}

/// Writes a typed block to the sector at `address`.
pub fn write_block<T: SectorBlock>(device: &impl BlockDevice, address: u32, block: &T) -> Result<()> {
    device.write_sector(address, &block.to_sector())
}
