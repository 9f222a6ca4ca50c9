//! On-disk records. Every block is exactly one sector, little-endian, with no
//! implicit padding; the reserved tails make up the rest of the sector.

use alloc::borrow::Cow;
use alloc::string::String;

use bitflags::bitflags;
use static_assertions::assert_eq_size;
use zerocopy::little_endian::U32;
use zerocopy::{FromBytes, FromZeros, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::block_dev::write_block;
use crate::config::*;
use crate::error::{FsError, Result};
use crate::BlockDevice;

pub type Sector = [u8; SECTOR_SIZE];

/// A record that occupies exactly one sector.
pub trait SectorBlock: Sized {
    fn from_sector(sector: Sector) -> Self;
    fn to_sector(&self) -> Sector;
}

macro_rules! sector_block {
    ($($ty:ty),* $(,)?) => {$(
        assert_eq_size!($ty, Sector);

        impl SectorBlock for $ty {
            fn from_sector(sector: Sector) -> Self {
                zerocopy::transmute!(sector)
            }

            fn to_sector(&self) -> Sector {
                zerocopy::transmute!(*self)
            }
        }
    )*};
}

/// Returns the bytes of a NUL-terminated name field up to its terminator.
pub fn cstr(name: &[u8]) -> &[u8] {
    match name.iter().position(|&c| c == 0) {
        Some(end) => &name[..end],
        None => name,
    }
}

fn copy_name<const N: usize>(name: &[u8]) -> [u8; N] {
    let mut arr = [0; N];
    arr[..name.len()].copy_from_slice(name);
    arr
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FileAttributes: u32 {
        const DIRECTORY = 0x01;
        const READABLE = 0x04;
        const WRITEABLE = 0x08;
        const HIDDEN = 0x10;
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
pub struct MainBlock {
    pub signature: [u8; 8],
    pub version: u8,
    pub checksum: u8,
    pub num_volumes: U32,
    pub first_volume: U32, // Offset in sectors from the main block to the first volume block
    pub reserved: [u8; SECTOR_SIZE - 18],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
pub struct VolumeBlock {
    pub name: [u8; MAX_VOLUME_NAME_LEN + 1],
    pub num_iblks: U32,   // Sectors of ID table
    pub num_fblks: U32,   // Used metadata slots
    pub num_dblks: U32,   // Used data slots
    pub next_volume: U32, // Offset in sectors to the next volume block
    pub reserved: [u8; SECTOR_SIZE - 48],
}

impl VolumeBlock {
    /// Builds an unregistered volume block; counters are filled in by registration.
    pub fn new(name: &str, num_iblks: u32) -> Result<Self> {
        let name = name.as_bytes();
        if name.len() > MAX_VOLUME_NAME_LEN {
            return Err(FsError::TooLongVolumeName);
        }
        if name.is_empty() || name.contains(&b'/') || name.contains(&0) {
            return Err(FsError::InvalidPath);
        }
        let mut vblk = Self::new_zeroed();
        vblk.name = copy_name(name);
        vblk.num_iblks.set(num_iblks);
        Ok(vblk)
    }

    pub fn name(&self) -> &[u8] {
        cstr(&self.name)
    }

    pub fn name_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.name())
    }

    pub fn total_slots(&self) -> u32 {
        self.num_iblks.get() * ENTRIES_PER_BLOCK as u32
    }

    pub fn free_slots(&self) -> u32 {
        self.total_slots()
            .saturating_sub(self.num_fblks.get())
            .saturating_sub(self.num_dblks.get())
    }
}

/// Metadata view of an ID-table cell, owned by the low end of the table.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
pub struct FileEntry {
    pub id: U32,
    pub active: U32,
}

impl FileEntry {
    pub fn new(id: u32) -> Self {
        Self {
            id: U32::new(id),
            active: U32::new(1),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.get() != 0
    }
}

/// Data view of an ID-table cell, owned by the high end of the table.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
pub struct DataEntry {
    pub num_bytes: U32,
    pub next: U32,
}

impl DataEntry {
    pub fn new(num_bytes: u32, next: u32) -> Self {
        Self {
            num_bytes: U32::new(num_bytes),
            next: U32::new(next),
        }
    }
}

assert_eq_size!(FileEntry, [u8; ID_ENTRY_SIZE]);
assert_eq_size!(DataEntry, [u8; ID_ENTRY_SIZE]);

pub type IdCell = [u8; ID_ENTRY_SIZE];

/// One sector of the ID table. A cell carries no tag; which view applies is
/// known from the stack that allocated it.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
pub struct IdBlock {
    pub cells: [IdCell; ENTRIES_PER_BLOCK],
}

impl IdBlock {
    pub fn file(&self, entry: usize) -> FileEntry {
        zerocopy::transmute!(self.cells[entry])
    }

    pub fn set_file(&mut self, entry: usize, value: FileEntry) {
        self.cells[entry] = zerocopy::transmute!(value);
    }

    pub fn data(&self, entry: usize) -> DataEntry {
        zerocopy::transmute!(self.cells[entry])
    }

    pub fn set_data(&mut self, entry: usize, value: DataEntry) {
        self.cells[entry] = zerocopy::transmute!(value);
    }

    /// A cell is free only when both of its words are zero.
    pub fn is_free(&self, entry: usize) -> bool {
        self.cells[entry] == [0; ID_ENTRY_SIZE]
    }

    pub fn clear(&mut self, entry: usize) {
        self.cells[entry] = [0; ID_ENTRY_SIZE];
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
pub struct FileBlock {
    pub name: [u8; MAX_FILE_NAME_LEN + 1],
    pub size: U32,
    pub first: U32, // First data slot, 0 when empty
    pub last: U32,  // Last data slot, 0 when empty
    pub attributes: U32,
    pub reserved: [u8; SECTOR_SIZE - 272],
}

impl FileBlock {
    pub fn new(name: &[u8], attributes: FileAttributes) -> Result<Self> {
        // Stored names end at the first NUL, so one inside would never match again.
        if name.contains(&0) {
            return Err(FsError::InvalidPath);
        }
        if name.len() > MAX_FILE_NAME_LEN {
            return Err(FsError::TooLongFileName);
        }
        let mut fblk = Self::new_zeroed();
        fblk.name = copy_name(name);
        fblk.attributes.set(attributes.bits());
        Ok(fblk)
    }

    pub fn name(&self) -> &[u8] {
        cstr(&self.name)
    }

    pub fn name_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.name())
    }

    pub fn name_eq(&self, name: &[u8]) -> bool {
        self.name() == name
    }

    pub fn attributes(&self) -> FileAttributes {
        FileAttributes::from_bits_retain(self.attributes.get())
    }

    pub fn is_dir(&self) -> bool {
        self.attributes().contains(FileAttributes::DIRECTORY)
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
pub struct DirEntry {
    pub id: U32,
    pub index: U32, // Content-area index of the child's file block
}

assert_eq_size!(DirEntry, [u8; DIR_ENTRY_SIZE]);

impl DirEntry {
    pub fn new(id: u32, index: u32) -> Self {
        Self {
            id: U32::new(id),
            index: U32::new(index),
        }
    }
}

/// A directory data sector viewed as packed entries.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
pub struct DirBlock {
    pub entries: [DirEntry; DIRENTS_PER_SECTOR],
}

sector_block!(MainBlock, VolumeBlock, IdBlock, FileBlock, DirBlock);

/// An in-memory copy of a block together with where it lives.
///
/// The caller owns the copy; mutations reach the disk only through `sync`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Located<T> {
    pub address: u32, // Absolute sector address
    pub index: u32,   // Position in the volume list, or content-area slot
    pub block: T,
}

impl<T: SectorBlock> Located<T> {
    pub fn sync(&self, device: &impl BlockDevice) -> Result<()> {
        write_block(device, self.address, &self.block)
    }
}

pub type Volume = Located<VolumeBlock>;
pub type FileNode = Located<FileBlock>;

impl Volume {
    /// Address of the first ID-table sector.
    pub fn id_table(&self) -> u32 {
        self.address + 1
    }

    /// Address of the first content-area sector.
    pub fn content(&self) -> u32 {
        self.id_table() + self.block.num_iblks.get()
    }

    pub fn total_slots(&self) -> u32 {
        self.block.total_slots()
    }

    pub fn free_slots(&self) -> u32 {
        self.block.free_slots()
    }

    pub fn check_slot(&self, slot: u32) -> Result<()> {
        if slot >= self.total_slots() {
            return Err(FsError::InvalidOffset);
        }
        Ok(())
    }

    /// Address of the content-area sector for `slot`.
    pub fn slot_address(&self, slot: u32) -> u32 {
        self.content() + slot
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_cell_views_share_bytes() {
        let mut iblk = IdBlock::new_zeroed();
        iblk.set_file(3, FileEntry::new(0xdead_beef));
        assert_eq!(iblk.data(3).num_bytes.get(), 0xdead_beef);
        assert_eq!(iblk.data(3).next.get(), 1);
        assert_eq!(&iblk.cells[3], &[0xef, 0xbe, 0xad, 0xde, 1, 0, 0, 0]);
        assert!(!iblk.is_free(3));
        iblk.clear(3);
        assert!(iblk.is_free(3));
    }

    #[test]
    fn test_field_offsets() {
        let mut fblk = FileBlock::new(b"a.txt", FileAttributes::READABLE).unwrap();
        fblk.size.set(0x0102_0304);
        let sector = fblk.to_sector();
        assert_eq!(&sector[..6], b"a.txt\0");
        assert_eq!(&sector[256..260], &[4, 3, 2, 1]);
        assert_eq!(&sector[268..272], &[0x04, 0, 0, 0]);
        assert_eq!(FileBlock::from_sector(sector), fblk);

        let vblk = VolumeBlock::new("v", 2).unwrap();
        let sector = vblk.to_sector();
        assert_eq!(&sector[32..36], &[2, 0, 0, 0]);
    }

    #[test]
    fn test_name_limits() {
        let long = [b'x'; MAX_FILE_NAME_LEN + 1];
        assert_eq!(FileBlock::new(&long, FileAttributes::empty()), Err(FsError::TooLongFileName));
        assert!(FileBlock::new(&long[..MAX_FILE_NAME_LEN], FileAttributes::empty()).is_ok());
        assert_eq!(
            VolumeBlock::new("0123456789012345678901234567890123", 1),
            Err(FsError::TooLongVolumeName)
        );
        assert_eq!(VolumeBlock::new("", 1), Err(FsError::InvalidPath));
        assert_eq!(VolumeBlock::new("a/b", 1), Err(FsError::InvalidPath));
        assert_eq!(VolumeBlock::new("a\0", 1), Err(FsError::InvalidPath));
        assert_eq!(FileBlock::new(b"a\0b", FileAttributes::empty()), Err(FsError::InvalidPath));
    }
}
