//! chadfs CLI
//!
//! Creates ChadFS images and moves files between an image and the host.

use std::error::Error;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use chadfs::{FileAttributes, FileBlock, FileSystem, ImageFile};
use clap::{Parser, Subcommand};
use log::{LevelFilter, Log, Metadata, Record};

#[derive(Parser)]
#[command(name = "chadfs")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "ChadFS image utility")]
struct Cli {
    /// Image file
    #[arg(value_name = "IMAGE")]
    image: PathBuf,

    /// Log filesystem activity to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an empty image holding only the main block
    CreateMain,

    /// Append a volume
    AddVolume {
        name: String,
        /// Number of ID-table sectors
        num_iblks: u32,
    },

    /// List every volume
    ListVolumes,

    /// Show a volume's counters
    PrintVolume { name: String },

    /// Show a file's block, and its children for directories
    PrintFile { path: String },

    /// List the files in a directory
    ListDir { path: String },

    /// Create a file, optionally filled from a host file
    CreateFile {
        path: String,
        #[arg(value_name = "HOST_FILE")]
        source: Option<PathBuf>,
    },

    /// Create a directory
    CreateDir { path: String },

    /// Print a file as text
    ReadTxtFile {
        path: String,
        #[arg(default_value_t = 0)]
        offset: u32,
        /// Bytes to read, 0 for everything after the offset
        #[arg(default_value_t = 0)]
        len: u32,
    },

    /// Print a file as hex bytes
    ReadBinFile {
        path: String,
        #[arg(default_value_t = 0)]
        offset: u32,
        /// Bytes to read, 0 for everything after the offset
        #[arg(default_value_t = 0)]
        len: u32,
    },

    /// Truncate a file
    TruncFile { path: String, len: u32 },

    /// Remove a file or a directory with everything below it
    RemoveFile { path: String },

    /// Replace a file's content from `offset` on with a host file
    WriteFile {
        path: String,
        #[arg(value_name = "HOST_FILE")]
        source: PathBuf,
        offset: u32,
    },
}

struct StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, _: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        eprintln!("[{}] {}", record.level(), record.args());
    }

    fn flush(&self) {}
}

static LOGGER: StderrLogger = StderrLogger;

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn rw() -> FileAttributes {
    FileAttributes::READABLE | FileAttributes::WRITEABLE
}

fn print_fblk(path: &str, fblk: &FileBlock) {
    println!("`{}`:", path);
    println!("Size: {} (bytes)", fblk.size.get());
    println!("First data block index: {}", fblk.first.get());
    println!("Last data block index: {}", fblk.last.get());
    println!("Attributes: {:#x}", fblk.attributes.get());
}

/// Reads `len` bytes at `offset`, where a zero `len` means up to the end of the file.
fn read_range(fs: &FileSystem<ImageFile>, path: &str, offset: u32, len: u32) -> chadfs::Result<Vec<u8>> {
    let size = fs.read_fblk(path)?.block.size.get();
    let len = match len {
        0 => size.checked_sub(offset).ok_or(chadfs::FsError::InvalidOffset)?,
        len => len,
    };
    let mut buf = vec![0u8; len as usize];
    fs.read_file(path, &mut buf, offset)?;
    Ok(buf)
}

fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    if cli.verbose {
        log::set_logger(&LOGGER)?;
        log::set_max_level(LevelFilter::Debug);
    }

    let mut fs = match &cli.command {
        Commands::CreateMain => FileSystem::format(Arc::new(ImageFile::create(&cli.image)?))?,
        _ => FileSystem::mount(Arc::new(ImageFile::open(&cli.image)?))?,
    };

    match cli.command {
        Commands::CreateMain => {}
        Commands::AddVolume { name, num_iblks } => {
            fs.add_volume(&name, num_iblks)?;
        }
        Commands::ListVolumes => {
            for (i, volume) in fs.volumes()?.iter().enumerate() {
                println!("{}) `{}`(lba={:#x}):", i + 1, volume.block.name_lossy(), volume.address);
                println!("Num of ID blocks: {}", volume.block.num_iblks.get());
                println!("Num of file blocks: {}", volume.block.num_fblks.get());
                println!("Num of data blocks: {}", volume.block.num_dblks.get());
                println!("Next volume: {:#x}/{}\n", volume.block.next_volume.get(), volume.block.next_volume.get());
            }
        }
        Commands::PrintVolume { name } => {
            let volume = fs.volume(&name)?;
            println!("`{}` (lba={:#x}, index={}):", volume.block.name_lossy(), volume.address, volume.index);
            println!("Num of ID blocks: {}", volume.block.num_iblks.get());
            println!("Num of file blocks: {}", volume.block.num_fblks.get());
            println!("Num of data blocks: {}", volume.block.num_dblks.get());
            println!("Free slots: {}", volume.free_slots());
            println!("Next volume: {:#x}/{}", volume.block.next_volume.get(), volume.block.next_volume.get());
        }
        Commands::PrintFile { path } => {
            let fnode = fs.read_fblk(&path)?;
            println!("lba={:#x}, index={}", fnode.address, fnode.index);
            print_fblk(&path, &fnode.block);
            if fnode.block.is_dir() {
                let children = fs.read_dir(&path)?;
                if children.is_empty() {
                    println!("No files");
                }
                for child in &children {
                    println!();
                    print_fblk(&format!("{}/{}", path, child.name_lossy()), child);
                }
            }
        }
        Commands::ListDir { path } => {
            let children = fs.read_dir(&path)?;
            println!("Files in `{}`:", path);
            if children.is_empty() {
                println!("No files");
            }
            for child in &children {
                let marker = if child.is_dir() { "/" } else { "" };
                println!("`{}/{}`{}", path, child.name_lossy(), marker);
            }
        }
        Commands::CreateFile { path, source } => {
            let data = match source {
                Some(source) => std::fs::read(source)?,
                None => Vec::new(),
            };
            fs.create_file(&path, rw(), &data)?;
        }
        Commands::CreateDir { path } => {
            fs.create_dir(&path, rw())?;
        }
        Commands::ReadTxtFile { path, offset, len } => {
            let data = read_range(&fs, &path, offset, len)?;
            io::stdout().write_all(&data)?;
        }
        Commands::ReadBinFile { path, offset, len } => {
            let data = read_range(&fs, &path, offset, len)?;
            let hex: Vec<String> = data.iter().map(|b| format!("{:02x}", b)).collect();
            println!("{}", hex.join(" "));
        }
        Commands::TruncFile { path, len } => {
            fs.trunc_file(&path, len)?;
        }
        Commands::RemoveFile { path } => {
            fs.remove_file(&path)?;
        }
        Commands::WriteFile { path, source, offset } => {
            let data = std::fs::read(source)?;
            fs.write_file(&path, &data, offset)?;
        }
    }

    fs.flush()?;
    Ok(())
}
