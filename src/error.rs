use thiserror::Error;

/// Status of a failed filesystem operation.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsError {
    #[error("too long volume name")]
    TooLongVolumeName,
    #[error("too long file name")]
    TooLongFileName,
    #[error("invalid main block")]
    InvalidMainBlock,
    #[error("volume already exists")]
    VolumeAlreadyExists,
    #[error("file already exists")]
    FileAlreadyExists,
    #[error("zero volume length")]
    ZeroVolumeLength,
    #[error("invalid path")]
    InvalidPath,
    #[error("volume not found")]
    VolumeNotFound,
    #[error("file not found")]
    FileNotFound,
    #[error("not enough space")]
    NotEnoughSpace,
    #[error("zero data length")]
    ZeroDataLength,
    #[error("invalid offset")]
    InvalidOffset,
    #[error("not a directory")]
    NotADirectory,
    #[error("sector I/O failed at {address:#x}: {kind}")]
    Io {
        address: u32,
        kind: std::io::ErrorKind,
    },
}

pub type Result<T> = core::result::Result<T, FsError>;
