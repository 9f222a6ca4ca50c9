use alloc::sync::Arc;
use alloc::vec::Vec;

use log::info;

use crate::config::*;
use crate::directory::{self, DirCursor};
use crate::error::Result;
use crate::file;
use crate::mainblock::{read_main_block, write_main_block};
use crate::structs::*;
use crate::volume;
use crate::BlockDevice;

/// A mounted image: the device handle plus the validated main block.
///
/// Every operation goes straight to the device. Callers sharing one image must
/// serialize access themselves.
#[derive(Debug)]
pub struct FileSystem<D: BlockDevice> {
    device: Arc<D>,
    main: Located<MainBlock>,
}

impl<D: BlockDevice> FileSystem<D> {
    /// Writes a fresh main block with no volumes at sector 0.
    pub fn format(device: Arc<D>) -> Result<Self> {
        let main = Located {
            address: MAIN_BLOCK_ADDRESS,
            index: 0,
            block: MainBlock::new(),
        };
        write_main_block(&*device, main.address, &main.block)?;
        info!("formatted image, main block at sector {}", main.address);
        Ok(Self { device, main })
    }

    pub fn mount(device: Arc<D>) -> Result<Self> {
        Self::mount_at(device, MAIN_BLOCK_ADDRESS)
    }

    /// Mounts an image whose main block lives at `address`.
    pub fn mount_at(device: Arc<D>, address: u32) -> Result<Self> {
        let block = read_main_block(&*device, address)?;
        info!("mounted image with {} volume(s)", block.num_volumes.get());
        Ok(Self {
            device,
            main: Located { address, index: 0, block },
        })
    }

    pub fn add_volume(&mut self, name: &str, num_iblks: u32) -> Result<Volume> {
        let vblk = VolumeBlock::new(name, num_iblks)?;
        volume::add_volume(&*self.device, &mut self.main, &vblk)
    }

    pub fn volumes(&self) -> Result<Vec<Volume>> {
        volume::volumes(&*self.device, &self.main)
    }

    pub fn volume(&self, name: &str) -> Result<Volume> {
        volume::read_volume(&*self.device, &self.main, name)
    }

    pub fn create_file(&mut self, path: &str, attributes: FileAttributes, data: &[u8]) -> Result<FileNode> {
        file::create_file(&*self.device, &self.main, path, attributes, data)
    }

    pub fn create_dir(&mut self, path: &str, attributes: FileAttributes) -> Result<FileNode> {
        file::create_dir(&*self.device, &self.main, path, attributes)
    }

    pub fn read_fblk(&self, path: &str) -> Result<FileNode> {
        file::read_fblk(&*self.device, &self.main, path).map(|(fnode, _)| fnode)
    }

    pub fn read_file(&self, path: &str, buf: &mut [u8], offset: u32) -> Result<()> {
        file::read_file(&*self.device, &self.main, path, buf, offset)
    }

    /// Reads the whole file into a new buffer.
    pub fn read_to_vec(&self, path: &str) -> Result<Vec<u8>> {
        let fnode = self.read_fblk(path)?;
        let mut buf = alloc::vec![0u8; fnode.block.size.get() as usize];
        self.read_file(path, &mut buf, 0)?;
        Ok(buf)
    }

    pub fn append_file(&mut self, path: &str, data: &[u8]) -> Result<()> {
        file::append_file(&*self.device, &self.main, path, data)
    }

    pub fn trunc_file(&mut self, path: &str, len: u32) -> Result<()> {
        file::trunc_file(&*self.device, &self.main, path, len)
    }

    pub fn write_file(&mut self, path: &str, data: &[u8], offset: u32) -> Result<()> {
        file::write_file(&*self.device, &self.main, path, data, offset)
    }

    pub fn remove_file(&mut self, path: &str) -> Result<()> {
        file::remove_file(&*self.device, &self.main, path)
    }

    pub fn create_iter(&self, path: &str) -> Result<(DirCursor, FileBlock)> {
        directory::create_iter(&*self.device, &self.main, path)
    }

    pub fn move_iter(&self, cursor: &mut DirCursor) -> Result<Option<FileBlock>> {
        directory::move_iter(&*self.device, cursor)
    }

    pub fn read_dir(&self, path: &str) -> Result<Vec<FileBlock>> {
        directory::read_dir(&*self.device, &self.main, path)
    }

    pub fn main_block(&self) -> &MainBlock {
        &self.main.block
    }

    pub fn device(&self) -> Arc<D> {
        Arc::clone(&self.device)
    }

    pub fn flush(&self) -> Result<()> {
        self.device.flush()
    }
}
