//! Reading, validating and initializing the main block.

use log::debug;
use zerocopy::FromZeros;

use crate::block_dev::{read_block, write_block};
use crate::config::*;
use crate::error::{FsError, Result};
use crate::hash::byte_sum;
use crate::structs::MainBlock;
use crate::BlockDevice;

impl MainBlock {
    /// A fresh main block with no volumes.
    pub fn new() -> Self {
        let mut mblk = Self::new_zeroed();
        mblk.signature = *SIGNATURE;
        mblk.version = VERSION;
        mblk.update_checksum();
        mblk
    }

    /// Recomputes the checksum so the covered bytes sum to zero.
    pub fn update_checksum(&mut self) {
        self.checksum = 0;
        let sum = byte_sum(&self.signature).wrapping_add(self.version);
        self.checksum = sum.wrapping_neg();
    }

    pub fn validate(&self) -> Result<()> {
        if &self.signature != SIGNATURE || self.version != VERSION {
            return Err(FsError::InvalidMainBlock);
        }
        let sum = byte_sum(&self.signature)
            .wrapping_add(self.version)
            .wrapping_add(self.checksum);
        if sum != 0 {
            return Err(FsError::InvalidMainBlock);
        }
        Ok(())
    }
}

impl Default for MainBlock {
    fn default() -> Self {
        Self::new()
    }
}

/// Reads the main block at `address` and validates it.
pub fn read_main_block(device: &impl BlockDevice, address: u32) -> Result<MainBlock> {
    let mblk: MainBlock = read_block(device, address)?;
    mblk.validate()?;
    debug!(
        "main block at {:#x}: {} volume(s), first at +{}",
        address,
        mblk.num_volumes.get(),
        mblk.first_volume.get()
    );
    Ok(mblk)
}

pub fn write_main_block(device: &impl BlockDevice, address: u32, mblk: &MainBlock) -> Result<()> {
    write_block(device, address, mblk)?;
    device.flush()?;
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::structs::SectorBlock;

    #[test]
    fn test_checksum_covers_header() {
        let mblk = MainBlock::new();
        let sector = mblk.to_sector();
        assert_eq!(&sector[..8], b"CHADFS  ");
        assert_eq!(sector[8], 32);
        assert_eq!(byte_sum(&sector[..CHECKSUM_SPAN]), 0);
        assert_eq!(mblk.num_volumes.get(), 0);
        assert!(mblk.validate().is_ok());
    }

    #[test]
    fn test_invalid_main_block() {
        let mut mblk = MainBlock::new();
        mblk.checksum = mblk.checksum.wrapping_add(1);
        assert_eq!(mblk.validate(), Err(FsError::InvalidMainBlock));

        let mut mblk = MainBlock::new();
        mblk.signature[0] = b'X';
        mblk.update_checksum();
        assert_eq!(mblk.validate(), Err(FsError::InvalidMainBlock));

        let zeroed = MainBlock::new_zeroed();
        assert_eq!(zeroed.validate(), Err(FsError::InvalidMainBlock));
    }

    #[test]
    fn test_counters_do_not_affect_checksum() {
        let mut mblk = MainBlock::new();
        mblk.num_volumes.set(3);
        mblk.first_volume.set(FIRST_VOLUME_OFFSET);
        mblk.update_checksum();
        assert!(mblk.validate().is_ok());
    }
}
