//! File operations on top of data chains.
//! Every call resolves its path afresh and re-reads the volume block, so nothing
//! is cached between calls.

use alloc::format;

use log::{debug, warn};

use crate::block_dev::read_block;
use crate::chain::{chain_sectors, cut_chain, data_len, fill_tail, link_chain, read_chain, write_chain};
use crate::config::*;
use crate::directory;
use crate::error::{FsError, Result};
use crate::hash::path_hash;
use crate::idtable::{
    clear_entry, find_free_metadata_slot, read_data_entry, read_entry_block, write_file_entry,
};
use crate::path;
use crate::structs::*;
use crate::volume::read_volume;
use crate::BlockDevice;

/// Resolves `path` to its file block and the volume that holds it.
pub fn read_fblk(
    device: &impl BlockDevice,
    main: &Located<MainBlock>,
    path: &str,
) -> Result<(FileNode, Volume)> {
    let volume = read_volume(device, main, path::volume_name(path)?)?;
    let name = path::file_name(path)?.as_bytes();
    let id = path_hash(path);

    for block in 0..volume.block.num_iblks.get() {
        let iblk = read_entry_block(device, &volume, block)?;
        for e in 0..ENTRIES_PER_BLOCK {
            let entry = iblk.file(e);
            if !entry.is_active() || entry.id.get() != id {
                continue;
            }
            // Identifiers collide, names don't.
            let index = block * ENTRIES_PER_BLOCK as u32 + e as u32;
            let address = volume.slot_address(index);
            let fblk: FileBlock = read_block(device, address)?;
            if fblk.name_eq(name) {
                return Ok((Located { address, index, block: fblk }, volume));
            }
        }
    }
    Err(FsError::FileNotFound)
}

/// Creates a file at `path` holding `data`, and registers it in its parent directory.
pub fn create_file(
    device: &impl BlockDevice,
    main: &Located<MainBlock>,
    path: &str,
    attributes: FileAttributes,
    data: &[u8],
) -> Result<FileNode> {
    match read_fblk(device, main, path) {
        Ok(_) => return Err(FsError::FileAlreadyExists),
        Err(FsError::FileNotFound) => {}
        Err(e) => return Err(e),
    }
    let parts = path::split(path)?;
    let mut fblk = FileBlock::new(parts.name.as_bytes(), attributes)?;

    let (parent, mut volume) = read_fblk(device, main, parts.parent)?;
    if !parent.block.is_dir() {
        return Err(FsError::NotADirectory);
    }

    let len = data_len(data)?;
    let data_slots = chain_sectors(len);
    // A parent whose last sector is full (or that is empty) needs a new one for the entry.
    let parent_slots = (parent.block.size.get() % SECTOR_SIZE as u32 == 0) as u32;
    let needed = 1 + data_slots + parent_slots;
    if needed > volume.free_slots() {
        return Err(FsError::NotEnoughSpace);
    }

    let id = path_hash(path);
    if len > 0 {
        let (first, last) = write_chain(device, &volume, data)?;
        fblk.size.set(len);
        fblk.first.set(first);
        fblk.last.set(last);
    }
    // The ID-table cell goes active only once its file block is on disk.
    let placed = find_free_metadata_slot(device, &volume).and_then(|index| {
        let fnode = Located {
            address: volume.slot_address(index),
            index,
            block: fblk,
        };
        fnode.sync(device)?;
        write_file_entry(device, &volume, index, FileEntry::new(id))?;
        Ok(fnode)
    });
    let fnode = match placed {
        Ok(fnode) => fnode,
        Err(e) => {
            if let Err(undo) = cut_chain(device, &volume, fblk.first.get(), 0) {
                warn!("data of {} left allocated: {}", path, undo);
            }
            return Err(e);
        }
    };

    volume.block.num_fblks.set(volume.block.num_fblks.get() + 1);
    volume.block.num_dblks.set(volume.block.num_dblks.get() + data_slots);
    volume.sync(device)?;
    debug!("created {} at slot {} ({} bytes)", path, fnode.index, len);

    directory::add_entry(device, main, parts.parent, DirEntry::new(id, fnode.index))?;
    Ok(fnode)
}

pub fn create_dir(
    device: &impl BlockDevice,
    main: &Located<MainBlock>,
    path: &str,
    attributes: FileAttributes,
) -> Result<FileNode> {
    create_file(device, main, path, attributes | FileAttributes::DIRECTORY, &[])
}

/// Fills `buf` from byte `offset` of the file.
pub fn read_file(
    device: &impl BlockDevice,
    main: &Located<MainBlock>,
    path: &str,
    buf: &mut [u8],
    offset: u32,
) -> Result<()> {
    let (fnode, volume) = read_fblk(device, main, path)?;
    let end = data_len(buf)?.checked_add(offset).ok_or(FsError::InvalidOffset)?;
    if end > fnode.block.size.get() {
        return Err(FsError::InvalidOffset);
    }
    read_chain(device, &volume, fnode.block.first.get(), buf, offset)
}

pub fn append_file(
    device: &impl BlockDevice,
    main: &Located<MainBlock>,
    path: &str,
    data: &[u8],
) -> Result<()> {
    if data.is_empty() {
        return Err(FsError::ZeroDataLength);
    }
    let (mut fnode, mut volume) = read_fblk(device, main, path)?;
    let size = fnode.block.size.get();
    let len = data_len(data)?;
    let new_size = size.checked_add(len).ok_or(FsError::NotEnoughSpace)?;

    let last = fnode.block.last.get();
    let room = if size == 0 {
        0
    } else {
        let used = read_data_entry(device, &volume, last)?.num_bytes.get();
        (SECTOR_SIZE as u32).saturating_sub(used).min(len)
    };
    let new_slots = chain_sectors(len - room);
    if new_slots > volume.free_slots() {
        return Err(FsError::NotEnoughSpace);
    }

    let consumed = if room > 0 {
        fill_tail(device, &volume, last, data)?
    } else {
        0
    };
    let rest = &data[consumed..];
    if !rest.is_empty() {
        let (first, new_last) = write_chain(device, &volume, rest)?;
        if size == 0 {
            fnode.block.first.set(first);
        } else {
            link_chain(device, &volume, last, first)?;
        }
        fnode.block.last.set(new_last);
    }

    fnode.block.size.set(new_size);
    fnode.sync(device)?;
    volume.block.num_dblks.set(volume.block.num_dblks.get() + new_slots);
    volume.sync(device)?;
    debug!("appended {} bytes to {} (size {})", len, path, new_size);
    Ok(())
}

/// Shrinks the file to `len` bytes.
pub fn trunc_file(
    device: &impl BlockDevice,
    main: &Located<MainBlock>,
    path: &str,
    len: u32,
) -> Result<()> {
    let (mut fnode, mut volume) = read_fblk(device, main, path)?;
    let size = fnode.block.size.get();
    if len > size {
        return Err(FsError::InvalidOffset);
    }
    if len == size {
        return Ok(());
    }

    let (last, freed) = cut_chain(device, &volume, fnode.block.first.get(), len)?;
    match last {
        Some(last) => fnode.block.last.set(last),
        None => {
            fnode.block.first.set(NULL_SLOT);
            fnode.block.last.set(NULL_SLOT);
        }
    }
    fnode.block.size.set(len);
    fnode.sync(device)?;
    volume.block.num_dblks.set(volume.block.num_dblks.get().saturating_sub(freed));
    volume.sync(device)?;
    debug!("truncated {} from {} to {} bytes", path, size, len);
    Ok(())
}

/// Discards everything from `offset` on, then appends `data`.
pub fn write_file(
    device: &impl BlockDevice,
    main: &Located<MainBlock>,
    path: &str,
    data: &[u8],
    offset: u32,
) -> Result<()> {
    if data.is_empty() {
        return Err(FsError::ZeroDataLength);
    }
    trunc_file(device, main, path, offset)?;
    append_file(device, main, path, data)
}

/// Removes the file at `path`, its data and its parent's directory entry.
/// Directories are removed together with everything below them.
pub fn remove_file(device: &impl BlockDevice, main: &Located<MainBlock>, path: &str) -> Result<()> {
    if !path.contains('/') {
        return Err(FsError::InvalidPath);
    }
    let parts = path::split(path)?;
    let (fnode, _) = read_fblk(device, main, path)?;
    read_fblk(device, main, parts.parent)?;

    if fnode.block.is_dir() {
        for child in directory::read_dir(device, main, path)? {
            let child_path = format!("{}/{}", path, child.name_lossy());
            remove_file(device, main, &child_path)?;
        }
    }

    // Removing children rewrote this directory's block and the counters.
    let (fnode, mut volume) = read_fblk(device, main, path)?;
    let freed = match fnode.block.first.get() {
        NULL_SLOT => 0,
        first => cut_chain(device, &volume, first, 0)?.1,
    };
    clear_entry(device, &volume, fnode.index)?;
    volume.block.num_fblks.set(volume.block.num_fblks.get().saturating_sub(1));
    volume.block.num_dblks.set(volume.block.num_dblks.get().saturating_sub(freed));
    volume.sync(device)?;
    debug!("removed {} from slot {} ({} data slots freed)", path, fnode.index, freed);

    directory::remove_entry(device, main, parts.parent, fnode.index)
}
