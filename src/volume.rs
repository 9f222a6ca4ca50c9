//! The volume list hanging off the main block.
//!
//! Volumes are laid out back to back; each volume block stores the forward
//! offset to the next one, and the main block stores the count and the offset
//! to the first.

use alloc::vec::Vec;

use log::info;
use zerocopy::FromZeros;

use crate::block_dev::{read_block, write_block};
use crate::config::*;
use crate::error::{FsError, Result};
use crate::hash::path_hash;
use crate::mainblock::write_main_block;
use crate::structs::*;
use crate::BlockDevice;

/// Number of sectors a volume with `num_iblks` ID-table sectors occupies.
pub fn volume_span(num_iblks: u32) -> Result<u32> {
    num_iblks
        .checked_mul(1 + ENTRIES_PER_BLOCK as u32)
        .and_then(|n| n.checked_add(1))
        .ok_or(FsError::NotEnoughSpace)
}

/// Walks the volume list in order.
pub struct VolumeIter<'a, D: BlockDevice> {
    device: &'a D,
    address: u32,
    index: u32,
    remaining: u32,
}

impl<D: BlockDevice> Iterator for VolumeIter<'_, D> {
    type Item = Result<Volume>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let block: VolumeBlock = match read_block(self.device, self.address) {
            Ok(block) => block,
            Err(e) => {
                self.remaining = 0;
                return Some(Err(e));
            }
        };
        let volume = Located { address: self.address, index: self.index, block };
        self.remaining -= 1;
        self.index += 1;
        self.address = self.address.wrapping_add(block.next_volume.get());
        Some(Ok(volume))
    }
}

pub fn iter_volumes<'a, D: BlockDevice>(device: &'a D, main: &Located<MainBlock>) -> VolumeIter<'a, D> {
    VolumeIter {
        device,
        address: main.address + main.block.first_volume.get(),
        index: 0,
        remaining: main.block.num_volumes.get(),
    }
}

/// Every volume block, in list order.
pub fn volumes(device: &impl BlockDevice, main: &Located<MainBlock>) -> Result<Vec<Volume>> {
    iter_volumes(device, main).collect()
}

/// Finds the volume named `name`.
pub fn read_volume(device: &impl BlockDevice, main: &Located<MainBlock>, name: &str) -> Result<Volume> {
    for volume in iter_volumes(device, main) {
        let volume = volume?;
        if volume.block.name() == name.as_bytes() {
            return Ok(volume);
        }
    }
    Err(FsError::VolumeNotFound)
}

fn check_volume_name(name: &[u8]) -> Result<()> {
    if name.len() > MAX_VOLUME_NAME_LEN {
        return Err(FsError::TooLongVolumeName);
    }
    if name.is_empty() || name.contains(&b'/') {
        return Err(FsError::InvalidPath);
    }
    Ok(())
}

/// Appends a new volume to the end of the list and formats its region.
///
/// Only the name and `num_iblks` of `vblk` are used. The main block is
/// written last, so a failure midway leaves the list as it was.
pub fn add_volume(
    device: &impl BlockDevice,
    main: &mut Located<MainBlock>,
    vblk: &VolumeBlock,
) -> Result<Volume> {
    let num_iblks = vblk.num_iblks.get();
    if num_iblks == 0 {
        return Err(FsError::ZeroVolumeLength);
    }
    let name = vblk.name();
    check_volume_name(name)?;
    let span = volume_span(num_iblks)?;

    let address = if main.block.num_volumes.get() == 0 {
        main.address + FIRST_VOLUME_OFFSET
    } else {
        let mut last = None;
        for volume in iter_volumes(device, main) {
            let volume = volume?;
            if volume.block.name() == name {
                return Err(FsError::VolumeAlreadyExists);
            }
            last = Some(volume);
        }
        let mut last = last.ok_or(FsError::VolumeNotFound)?;
        let offset = volume_span(last.block.num_iblks.get())?;
        let address = last.address.checked_add(offset).ok_or(FsError::NotEnoughSpace)?;
        if address.checked_add(span).is_none() {
            return Err(FsError::NotEnoughSpace);
        }
        last.block.next_volume.set(offset);
        last.sync(device)?;
        address
    };

    let mut block = VolumeBlock::new_zeroed();
    block.name[..name.len()].copy_from_slice(name);
    block.num_iblks.set(num_iblks);
    block.num_fblks.set(1);
    let volume = Located {
        address,
        index: main.block.num_volumes.get(),
        block,
    };
    volume.sync(device)?;

    let mut iblk = IdBlock::new_zeroed();
    iblk.set_file(ROOT_INDEX as usize, FileEntry::new(path_hash(name)));
    write_block(device, volume.id_table(), &iblk)?;
    let zeroed = [0u8; SECTOR_SIZE];
    for i in 1..num_iblks {
        device.write_sector(volume.id_table() + i, &zeroed)?;
    }
    for slot in 1..volume.total_slots() {
        device.write_sector(volume.slot_address(slot), &zeroed)?;
    }

    let root = FileBlock::new(
        name,
        FileAttributes::DIRECTORY | FileAttributes::READABLE | FileAttributes::WRITEABLE,
    )?;
    write_block(device, volume.slot_address(ROOT_INDEX), &root)?;

    if main.block.num_volumes.get() == 0 {
        main.block.first_volume.set(FIRST_VOLUME_OFFSET);
    }
    main.block.num_volumes.set(main.block.num_volumes.get() + 1);
    main.block.update_checksum();
    write_main_block(device, main.address, &main.block)?;

    info!(
        "added volume {} at sector {} ({} ID blocks, {} slots)",
        volume.block.name_lossy(),
        address,
        num_iblks,
        volume.total_slots()
    );
    Ok(volume)
}
