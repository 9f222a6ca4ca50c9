use static_assertions::const_assert;

#[cfg(feature = "sector-4096")]
pub const SECTOR_SIZE: usize = 4096;
#[cfg(all(feature = "sector-1024", not(feature = "sector-4096")))]
pub const SECTOR_SIZE: usize = 1024;
#[cfg(not(any(feature = "sector-1024", feature = "sector-4096")))]
pub const SECTOR_SIZE: usize = 512;

const_assert!(SECTOR_SIZE >= 512);
const_assert!(SECTOR_SIZE % 512 == 0);

pub const SIGNATURE: &[u8; 8] = b"CHADFS  ";
pub const VERSION: u8 = 32;
/// Number of leading main block bytes covered by the checksum (signature, version, checksum).
pub const CHECKSUM_SPAN: usize = 10;

pub const MAIN_BLOCK_ADDRESS: u32 = 0;
/// Offset (in sectors) of the first volume block, relative to the main block.
pub const FIRST_VOLUME_OFFSET: u32 = 1;

/// Seed used to derive a file identifier from its path.
pub const PATH_SEED: u32 = 0xAB0B_A777;

pub const MAX_VOLUME_NAME_LEN: usize = 31;
pub const MAX_FILE_NAME_LEN: usize = 255;

pub const ID_ENTRY_SIZE: usize = 8;
pub const ENTRIES_PER_BLOCK: usize = SECTOR_SIZE / ID_ENTRY_SIZE; // ID-table entries per sector
pub const DIR_ENTRY_SIZE: usize = 8;
pub const DIRENTS_PER_SECTOR: usize = SECTOR_SIZE / DIR_ENTRY_SIZE;

/// Slot of the root directory in every volume. Doubles as the chain terminator.
pub const ROOT_INDEX: u32 = 0;
pub const NULL_SLOT: u32 = 0;

/// Number of sectors needed to hold `len` bytes.
pub const fn sectors_for(len: u32) -> u32 {
    len.div_ceil(SECTOR_SIZE as u32)
}
