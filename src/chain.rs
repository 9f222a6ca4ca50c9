//! Data chains: a file's bytes live in content-area sectors whose ID-table cells
//! link them together. Each cell records how many payload bytes its sector holds
//! and the next slot, with `NULL_SLOT` terminating the chain.

use log::{debug, warn};

use crate::block_dev::read_raw;
use crate::config::*;
use crate::error::{FsError, Result};
use crate::idtable::{
    clear_entry, find_free_data_slot, find_next_free_data_slot, read_data_entry, write_data_entry,
};
use crate::structs::{DataEntry, Volume};
use crate::BlockDevice;

/// Number of sectors a chain of `len` bytes occupies.
pub const fn chain_sectors(len: u32) -> u32 {
    sectors_for(len)
}

/// Length of `data` as stored on disk.
pub fn data_len(data: &[u8]) -> Result<u32> {
    u32::try_from(data.len()).map_err(|_| FsError::NotEnoughSpace)
}

/// Walks a chain starting at `first`, refusing terminators and loops.
struct Links<'a, D: BlockDevice> {
    device: &'a D,
    volume: &'a Volume,
    slot: u32,
    hops: u32,
}

impl<'a, D: BlockDevice> Links<'a, D> {
    fn new(device: &'a D, volume: &'a Volume, first: u32) -> Self {
        Self { device, volume, slot: first, hops: 0 }
    }

    /// The current slot and its entry, then steps to the next slot.
    fn advance(&mut self) -> Result<(u32, DataEntry)> {
        if self.slot == NULL_SLOT || self.hops >= self.volume.total_slots() {
            return Err(FsError::InvalidOffset);
        }
        let slot = self.slot;
        let entry = read_data_entry(self.device, self.volume, slot)?;
        self.slot = entry.next.get();
        self.hops += 1;
        Ok((slot, entry))
    }
}

/// Allocates and fills a new chain holding `data`. Returns its first and last slot.
pub fn write_chain(device: &impl BlockDevice, volume: &Volume, data: &[u8]) -> Result<(u32, u32)> {
    if data.is_empty() {
        return Err(FsError::ZeroDataLength);
    }
    let needed = chain_sectors(data_len(data)?);
    if needed > volume.free_slots() {
        return Err(FsError::NotEnoughSpace);
    }

    let first = find_free_data_slot(device, volume)?;
    let mut linked = 0u32;
    match lay_chain(device, volume, first, data, &mut linked) {
        Ok(last) => {
            debug!("wrote chain {}..{} ({} sectors)", first, last, linked);
            Ok((first, last))
        }
        Err(e) => {
            warn!(
                "chain from slot {} abandoned after {} of {} sectors",
                first, linked, needed
            );
            if linked > 0 {
                if let Err(undo) = free_from(device, volume, first) {
                    warn!("slots from {} left allocated: {}", first, undo);
                }
            }
            Err(e)
        }
    }
}

/// Writes `data` sector by sector starting at the free slot `first`. `linked`
/// counts the cells written so far, so a failed run can be released.
fn lay_chain(
    device: &impl BlockDevice,
    volume: &Volume,
    first: u32,
    data: &[u8],
    linked: &mut u32,
) -> Result<u32> {
    let mut current = first;
    let mut chunks = data.chunks(SECTOR_SIZE).peekable();
    while let Some(chunk) = chunks.next() {
        let mut sector = [0u8; SECTOR_SIZE];
        sector[..chunk.len()].copy_from_slice(chunk);
        device.write_sector(volume.slot_address(current), &sector)?;

        let next = match chunks.peek() {
            Some(_) => find_next_free_data_slot(device, volume, current)?,
            None => NULL_SLOT,
        };
        write_data_entry(device, volume, current, DataEntry::new(chunk.len() as u32, next))?;
        *linked += 1;
        if next == NULL_SLOT {
            break;
        }
        current = next;
    }
    Ok(current)
}

/// Copies `buf.len()` bytes starting at byte `offset` of the chain into `buf`.
pub fn read_chain(
    device: &impl BlockDevice,
    volume: &Volume,
    first: u32,
    buf: &mut [u8],
    offset: u32,
) -> Result<()> {
    if buf.is_empty() {
        return Ok(());
    }
    let mut links = Links::new(device, volume, first);
    let mut skip = offset as usize;
    let mut filled = 0;

    loop {
        let (slot, entry) = links.advance()?;
        let used = (entry.num_bytes.get() as usize).min(SECTOR_SIZE);
        if skip >= used {
            skip -= used;
            continue;
        }
        let sector = read_raw(device, volume.slot_address(slot))?;
        let n = (used - skip).min(buf.len() - filled);
        buf[filled..filled + n].copy_from_slice(&sector[skip..skip + n]);
        filled += n;
        skip = 0;
        if filled == buf.len() {
            return Ok(());
        }
    }
}

/// Overwrites bytes of an existing chain in place. Never changes its length.
pub fn patch_chain(
    device: &impl BlockDevice,
    volume: &Volume,
    first: u32,
    offset: u32,
    data: &[u8],
) -> Result<()> {
    if data.is_empty() {
        return Ok(());
    }
    let mut links = Links::new(device, volume, first);
    let mut skip = offset as usize;
    let mut done = 0;

    loop {
        let (slot, entry) = links.advance()?;
        let used = (entry.num_bytes.get() as usize).min(SECTOR_SIZE);
        if skip >= used {
            skip -= used;
            continue;
        }
        let address = volume.slot_address(slot);
        let mut sector = read_raw(device, address)?;
        let n = (used - skip).min(data.len() - done);
        sector[skip..skip + n].copy_from_slice(&data[done..done + n]);
        device.write_sector(address, &sector)?;
        done += n;
        skip = 0;
        if done == data.len() {
            return Ok(());
        }
    }
}

/// Appends as much of `data` as fits into the unused tail of slot `last`.
/// Returns the number of bytes consumed.
pub fn fill_tail(device: &impl BlockDevice, volume: &Volume, last: u32, data: &[u8]) -> Result<usize> {
    let entry = read_data_entry(device, volume, last)?;
    let used = (entry.num_bytes.get() as usize).min(SECTOR_SIZE);
    let n = (SECTOR_SIZE - used).min(data.len());
    if n == 0 {
        return Ok(0);
    }
    let address = volume.slot_address(last);
    let mut sector = read_raw(device, address)?;
    sector[used..used + n].copy_from_slice(&data[..n]);
    device.write_sector(address, &sector)?;
    write_data_entry(device, volume, last, DataEntry::new((used + n) as u32, entry.next.get()))?;
    Ok(n)
}

/// Points slot `last` at `next`, keeping its byte count.
pub fn link_chain(device: &impl BlockDevice, volume: &Volume, last: u32, next: u32) -> Result<()> {
    let entry = read_data_entry(device, volume, last)?;
    write_data_entry(device, volume, last, DataEntry::new(entry.num_bytes.get(), next))
}

/// Frees every slot from `slot` to the end of its chain. Returns how many were freed.
fn free_from(device: &impl BlockDevice, volume: &Volume, slot: u32) -> Result<u32> {
    if slot == NULL_SLOT {
        return Ok(0);
    }
    let mut links = Links::new(device, volume, slot);
    let mut freed = 0;
    loop {
        let (slot, entry) = links.advance()?;
        clear_entry(device, volume, slot)?;
        freed += 1;
        if entry.next.get() == NULL_SLOT {
            return Ok(freed);
        }
    }
}

/// Keeps the first `offset` bytes of the chain and frees the rest.
///
/// Returns the last kept slot (`None` when nothing is kept) and the number of
/// slots freed.
pub fn cut_chain(
    device: &impl BlockDevice,
    volume: &Volume,
    first: u32,
    offset: u32,
) -> Result<(Option<u32>, u32)> {
    if offset == 0 {
        let freed = free_from(device, volume, first)?;
        debug!("freed whole chain at {} ({} sectors)", first, freed);
        return Ok((None, freed));
    }

    let mut links = Links::new(device, volume, first);
    let mut remaining = offset;
    loop {
        let (slot, entry) = links.advance()?;
        let used = entry.num_bytes.get();
        if remaining <= used {
            let freed = free_from(device, volume, entry.next.get())?;
            write_data_entry(device, volume, slot, DataEntry::new(remaining, NULL_SLOT))?;
            debug!("cut chain at slot {} keeping {} bytes, freed {}", slot, remaining, freed);
            return Ok((Some(slot), freed));
        }
        remaining -= used;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::block_dev::mem::MemDisk;
    use crate::structs::{Located, VolumeBlock};

    fn setup() -> (MemDisk, Volume) {
        let block = VolumeBlock::new("t", 1).unwrap();
        let sectors = 2 + block.total_slots() as usize;
        let disk = MemDisk::new(sectors);
        (disk, Located { address: 0, index: 0, block })
    }

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    #[test]
    fn test_write_read_multi_sector() {
        let (disk, vol) = setup();
        let data = pattern(SECTOR_SIZE * 2 + 17);
        let (first, last) = write_chain(&disk, &vol, &data).unwrap();
        assert_ne!(first, last);

        let mut buf = vec![0; data.len()];
        read_chain(&disk, &vol, first, &mut buf, 0).unwrap();
        assert_eq!(buf, data);

        let mut tail = vec![0; 20];
        read_chain(&disk, &vol, first, &mut tail, SECTOR_SIZE as u32 - 3).unwrap();
        assert_eq!(tail, &data[SECTOR_SIZE - 3..SECTOR_SIZE + 17]);

        assert_eq!(read_data_entry(&disk, &vol, last).unwrap().num_bytes.get(), 17);
        assert_eq!(read_data_entry(&disk, &vol, last).unwrap().next.get(), NULL_SLOT);
    }

    #[test]
    fn test_read_past_end() {
        let (disk, vol) = setup();
        let (first, _) = write_chain(&disk, &vol, b"hello").unwrap();
        let mut buf = [0u8; 6];
        assert_eq!(read_chain(&disk, &vol, first, &mut buf, 0), Err(FsError::InvalidOffset));
        assert_eq!(read_chain(&disk, &vol, NULL_SLOT, &mut buf, 0), Err(FsError::InvalidOffset));
    }

    #[test]
    fn test_zero_length_chain() {
        let (disk, vol) = setup();
        assert_eq!(write_chain(&disk, &vol, &[]), Err(FsError::ZeroDataLength));
    }

    #[test]
    fn test_cut_chain_frees_tail() {
        let (disk, vol) = setup();
        let data = pattern(SECTOR_SIZE * 3);
        let (first, _) = write_chain(&disk, &vol, &data).unwrap();

        let (last, freed) = cut_chain(&disk, &vol, first, SECTOR_SIZE as u32 + 1).unwrap();
        assert_eq!(freed, 1);
        let last = last.unwrap();
        assert_eq!(read_data_entry(&disk, &vol, last).unwrap(), DataEntry::new(1, NULL_SLOT));

        let mut buf = vec![0; SECTOR_SIZE + 1];
        read_chain(&disk, &vol, first, &mut buf, 0).unwrap();
        assert_eq!(buf, &data[..SECTOR_SIZE + 1]);

        assert_eq!(cut_chain(&disk, &vol, first, 0).unwrap(), (None, 2));
        assert_eq!(find_free_data_slot(&disk, &vol), Ok(vol.total_slots() - 1));
    }

    #[test]
    fn test_cut_on_sector_boundary_keeps_full_sector() {
        let (disk, vol) = setup();
        let data = pattern(SECTOR_SIZE * 2);
        let (first, _) = write_chain(&disk, &vol, &data).unwrap();
        let (last, freed) = cut_chain(&disk, &vol, first, SECTOR_SIZE as u32).unwrap();
        assert_eq!(last, Some(first));
        assert_eq!(freed, 1);
    }

    #[test]
    fn test_fill_tail_and_patch() {
        let (disk, vol) = setup();
        let (first, last) = write_chain(&disk, &vol, b"abc").unwrap();
        assert_eq!(fill_tail(&disk, &vol, last, b"def").unwrap(), 3);
        patch_chain(&disk, &vol, first, 1, b"XY").unwrap();

        let mut buf = [0u8; 6];
        read_chain(&disk, &vol, first, &mut buf, 0).unwrap();
        assert_eq!(&buf, b"aXYdef");
        assert_eq!(patch_chain(&disk, &vol, first, 5, b"zz"), Err(FsError::InvalidOffset));
    }
}
