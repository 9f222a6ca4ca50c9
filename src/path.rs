//! Path splitting utilities.
//!
//! A path looks like `volume/dir/.../name`. The volume root itself is named by
//! the bare volume name. All helpers return borrowed sub-slices of the input.

use crate::error::{FsError, Result};

/// Leading segment up to the first `/`, or the whole path.
pub fn volume_name(path: &str) -> Result<&str> {
    let name = match path.find('/') {
        Some(i) => &path[..i],
        None => path,
    };
    if name.is_empty() {
        return Err(FsError::InvalidPath);
    }
    Ok(name)
}

/// Trailing segment after the last `/`, or the whole path.
pub fn file_name(path: &str) -> Result<&str> {
    if path.is_empty() {
        return Err(FsError::InvalidPath);
    }
    match path.rfind('/') {
        Some(0) => Err(FsError::InvalidPath),
        Some(i) if i + 1 == path.len() => Err(FsError::InvalidPath),
        Some(i) => Ok(&path[i + 1..]),
        None => Ok(path),
    }
}

/// Everything before the last `/`. A path without `/` is its own parent
/// (the volume root).
pub fn parent_dir(path: &str) -> Result<&str> {
    if path.is_empty() {
        return Err(FsError::InvalidPath);
    }
    match path.rfind('/') {
        Some(0) => Err(FsError::InvalidPath),
        Some(i) => Ok(&path[..i]),
        None => Ok(path),
    }
}

/// A path split into its volume, parent directory and file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathParts<'a> {
    pub volume: &'a str,
    pub parent: &'a str,
    pub name: &'a str,
}

pub fn split(path: &str) -> Result<PathParts<'_>> {
    Ok(PathParts {
        volume: volume_name(path)?,
        parent: parent_dir(path)?,
        name: file_name(path)?,
    })
}
