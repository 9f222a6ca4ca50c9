//! Directories are ordinary files whose data is a packed sequence of
//! `DirEntry` records, in the order the children were created.

use alloc::vec;
use alloc::vec::Vec;

use log::debug;
use zerocopy::{FromBytes, IntoBytes};

use crate::block_dev::read_block;
use crate::chain::{patch_chain, read_chain};
use crate::config::*;
use crate::error::{FsError, Result};
use crate::file::{append_file, read_fblk, trunc_file};
use crate::idtable::read_data_entry;
use crate::structs::*;
use crate::BlockDevice;

/// Position of a directory walk. Holds a copy of the data sector being walked.
#[derive(Debug, Clone)]
pub struct DirCursor {
    volume: Volume,
    slot: u32,
    ordinal: u32,
    total: u32,
    entries: DirBlock,
}

impl DirCursor {
    /// Ordinal of the entry under the cursor.
    pub fn position(&self) -> u32 {
        self.ordinal
    }

    pub fn len(&self) -> u32 {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    fn current(&self, device: &impl BlockDevice) -> Result<FileBlock> {
        let entry = self.entries.entries[self.ordinal as usize % DIRENTS_PER_SECTOR];
        let index = entry.index.get();
        self.volume.check_slot(index)?;
        read_block(device, self.volume.slot_address(index))
    }
}

/// Opens a walk over the directory at `path`, positioned on its first entry.
/// Returns the cursor and that entry's file block.
pub fn create_iter(
    device: &impl BlockDevice,
    main: &Located<MainBlock>,
    path: &str,
) -> Result<(DirCursor, FileBlock)> {
    let (dir, volume) = read_fblk(device, main, path)?;
    if !dir.block.is_dir() {
        return Err(FsError::NotADirectory);
    }
    let size = dir.block.size.get();
    if size == 0 {
        return Err(FsError::ZeroDataLength);
    }
    let slot = dir.block.first.get();
    volume.check_slot(slot)?;
    let entries = read_block(device, volume.slot_address(slot))?;
    let cursor = DirCursor {
        volume,
        slot,
        ordinal: 0,
        total: size / DIR_ENTRY_SIZE as u32,
        entries,
    };
    let first = cursor.current(device)?;
    Ok((cursor, first))
}

/// Steps to the next entry and returns its file block, or `None` once the
/// walk is past the last entry.
pub fn move_iter(device: &impl BlockDevice, cursor: &mut DirCursor) -> Result<Option<FileBlock>> {
    if cursor.ordinal >= cursor.total {
        return Ok(None);
    }
    cursor.ordinal += 1;
    if cursor.ordinal == cursor.total {
        return Ok(None);
    }
    if cursor.ordinal as usize % DIRENTS_PER_SECTOR == 0 {
        let next = read_data_entry(device, &cursor.volume, cursor.slot)?.next.get();
        if next == NULL_SLOT {
            return Err(FsError::InvalidOffset);
        }
        cursor.volume.check_slot(next)?;
        cursor.slot = next;
        cursor.entries = read_block(device, cursor.volume.slot_address(next))?;
    }
    cursor.current(device).map(Some)
}

/// File blocks of every child of `path`, in directory order.
pub fn read_dir(device: &impl BlockDevice, main: &Located<MainBlock>, path: &str) -> Result<Vec<FileBlock>> {
    let (mut cursor, first) = match create_iter(device, main, path) {
        Ok(opened) => opened,
        Err(FsError::ZeroDataLength) => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };
    let mut children = Vec::with_capacity(cursor.len() as usize);
    children.push(first);
    while let Some(child) = move_iter(device, &mut cursor)? {
        children.push(child);
    }
    Ok(children)
}

pub(crate) fn add_entry(
    device: &impl BlockDevice,
    main: &Located<MainBlock>,
    dir: &str,
    entry: DirEntry,
) -> Result<()> {
    append_file(device, main, dir, entry.as_bytes())
}

/// Drops the entry pointing at slot `index` by moving the last entry into its place.
pub(crate) fn remove_entry(
    device: &impl BlockDevice,
    main: &Located<MainBlock>,
    dir: &str,
    index: u32,
) -> Result<()> {
    let (dnode, volume) = read_fblk(device, main, dir)?;
    let size = dnode.block.size.get();
    let first = dnode.block.first.get();

    let mut raw = vec![0u8; size as usize];
    read_chain(device, &volume, first, &mut raw, 0)?;
    let entries = <[DirEntry]>::ref_from_bytes(raw.as_slice()).map_err(|_| FsError::InvalidOffset)?;

    let pos = entries
        .iter()
        .position(|e| e.index.get() == index)
        .ok_or(FsError::FileNotFound)?;
    let last = entries.len() - 1;
    if pos != last {
        let offset = (pos * DIR_ENTRY_SIZE) as u32;
        patch_chain(device, &volume, first, offset, entries[last].as_bytes())?;
    }
    debug!("dropped entry {} of {} in {}", pos, entries.len(), dir);
    trunc_file(device, main, dir, size - DIR_ENTRY_SIZE as u32)
}
