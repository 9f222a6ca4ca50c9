//! ChadFS is a small multi-volume filesystem kept inside a flat sector image.
//! There are no permissions beyond an attribute mask, no timestamps and no caching.
//!
//! Image layout:
//! - Main block (sector 0): signature, version, checksum, volume count
//! - Volume 0, Volume 1, ... laid out back to back, each made of
//!   - Volume block: name, counters, offset to the next volume
//!   - ID table: 8-byte cells, metadata slots growing up, data slots growing down
//!   - Content area: one sector per ID-table cell, holding a file block or file data
//!
//! Layers (from bottom to top):
//! 1. Block Device: sector read/write.              User implemented, or `ImageFile`
//! 2. ID table: slot allocation.                     `idtable`
//! 3. Chain: a file's data as linked slots.          `chain`
//! 4. File/Directory: path-addressed operations.     `file`, `directory`
//! 5. FileSystem: the device plus its main block.    `fs`

extern crate alloc;

mod config;
mod block_dev;
mod structs;
mod hash;
mod mainblock;
mod idtable;
mod chain;
mod volume;
mod path;
mod file;
mod directory;
mod fs;
mod image;
mod error;

pub use block_dev::{read_block, write_block, BlockDevice};
pub use config::*;
pub use structs::*;
pub use hash::{byte_sum, murmur3_32, path_hash};
pub use mainblock::{read_main_block, write_main_block};
pub use idtable::*;
pub use chain::*;
pub use volume::*;
pub use path::*;
pub use file::*;
pub use directory::{create_iter, move_iter, read_dir, DirCursor};
pub use fs::*;
pub use image::ImageFile;
pub use error::{FsError, Result};
pub use error::FsError as Error;
