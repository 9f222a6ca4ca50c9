//! The ID table of a volume, shared by two stacks.
//! Metadata slots grow upward from index 0 (the root directory), data slots grow
//! downward from the top of the table. A cell is free only when all 8 bytes are zero.

use log::debug;

use crate::block_dev::{read_block, write_block};
use crate::config::*;
use crate::error::{FsError, Result};
use crate::structs::{DataEntry, FileEntry, IdBlock, Volume};
use crate::BlockDevice;

/// Sector address and in-sector position of the entry at `index`.
fn locate(volume: &Volume, index: u32) -> Result<(u32, usize)> {
    volume.check_slot(index)?;
    let per_block = ENTRIES_PER_BLOCK as u32;
    Ok((volume.id_table() + index / per_block, (index % per_block) as usize))
}

pub fn read_entry_block(device: &impl BlockDevice, volume: &Volume, block: u32) -> Result<IdBlock> {
    if block >= volume.block.num_iblks.get() {
        return Err(FsError::InvalidOffset);
    }
    read_block(device, volume.id_table() + block)
}

pub fn write_entry_block(
    device: &impl BlockDevice,
    volume: &Volume,
    block: u32,
    iblk: &IdBlock,
) -> Result<()> {
    if block >= volume.block.num_iblks.get() {
        return Err(FsError::InvalidOffset);
    }
    write_block(device, volume.id_table() + block, iblk)
}

/// Read-modify-write of a single cell.
fn update_entry(
    device: &impl BlockDevice,
    volume: &Volume,
    index: u32,
    f: impl FnOnce(&mut IdBlock, usize),
) -> Result<()> {
    let (address, entry) = locate(volume, index)?;
    let mut iblk: IdBlock = read_block(device, address)?;
    f(&mut iblk, entry);
    write_block(device, address, &iblk)
}

pub fn read_file_entry(device: &impl BlockDevice, volume: &Volume, index: u32) -> Result<FileEntry> {
    let (address, entry) = locate(volume, index)?;
    let iblk: IdBlock = read_block(device, address)?;
    Ok(iblk.file(entry))
}

pub fn write_file_entry(
    device: &impl BlockDevice,
    volume: &Volume,
    index: u32,
    value: FileEntry,
) -> Result<()> {
    update_entry(device, volume, index, |iblk, entry| iblk.set_file(entry, value))
}

pub fn read_data_entry(device: &impl BlockDevice, volume: &Volume, index: u32) -> Result<DataEntry> {
    let (address, entry) = locate(volume, index)?;
    let iblk: IdBlock = read_block(device, address)?;
    Ok(iblk.data(entry))
}

pub fn write_data_entry(
    device: &impl BlockDevice,
    volume: &Volume,
    index: u32,
    value: DataEntry,
) -> Result<()> {
    update_entry(device, volume, index, |iblk, entry| iblk.set_data(entry, value))
}

/// Returns the cell at `index` to the free pool.
pub fn clear_entry(device: &impl BlockDevice, volume: &Volume, index: u32) -> Result<()> {
    update_entry(device, volume, index, |iblk, entry| iblk.clear(entry))
}

/// First free slot scanning upward from index 0.
pub fn find_free_metadata_slot(device: &impl BlockDevice, volume: &Volume) -> Result<u32> {
    for block in 0..volume.block.num_iblks.get() {
        let iblk = read_entry_block(device, volume, block)?;
        if let Some(entry) = (0..ENTRIES_PER_BLOCK).find(|&e| iblk.is_free(e)) {
            let index = block * ENTRIES_PER_BLOCK as u32 + entry as u32;
            debug!("metadata slot {} is free", index);
            return Ok(index);
        }
    }
    Err(FsError::NotEnoughSpace)
}

/// Highest free slot strictly below `below`, never index 0.
fn scan_down(device: &impl BlockDevice, volume: &Volume, below: u32) -> Result<u32> {
    let per_block = ENTRIES_PER_BLOCK as u32;
    let mut index = below.min(volume.total_slots());
    let mut cached: Option<(u32, IdBlock)> = None;

    while index > 1 {
        index -= 1;
        let block = index / per_block;
        let iblk = match cached {
            Some((b, iblk)) if b == block => iblk,
            _ => {
                let iblk = read_entry_block(device, volume, block)?;
                cached = Some((block, iblk));
                iblk
            }
        };
        if iblk.is_free((index % per_block) as usize) {
            debug!("data slot {} is free", index);
            return Ok(index);
        }
    }
    Err(FsError::NotEnoughSpace)
}

/// First free slot scanning downward from the top of the table.
pub fn find_free_data_slot(device: &impl BlockDevice, volume: &Volume) -> Result<u32> {
    scan_down(device, volume, volume.total_slots())
}

/// Continues a downward scan strictly below `after`.
pub fn find_next_free_data_slot(device: &impl BlockDevice, volume: &Volume, after: u32) -> Result<u32> {
    if after == NULL_SLOT {
        return Err(FsError::NotEnoughSpace);
    }
    scan_down(device, volume, after)
}
