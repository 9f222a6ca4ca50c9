mod common;

use std::sync::Arc;

use chadfs::{FileAttributes, FileSystem, FsError, ImageFile, SECTOR_SIZE};
use common::{image_sectors, pattern};

#[test]
fn test_image_persists_across_mounts() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("disk.img");
    let data = pattern(SECTOR_SIZE + 123);

    {
        let image = ImageFile::create(&path).unwrap();
        let mut fs = FileSystem::format(Arc::new(image)).unwrap();
        fs.add_volume("v", 1).unwrap();
        fs.create_dir("v/docs", FileAttributes::READABLE).unwrap();
        fs.create_file("v/docs/a.bin", FileAttributes::READABLE, &data).unwrap();
        fs.flush().unwrap();
    }

    let len = std::fs::metadata(&path).unwrap().len();
    assert_eq!(len, image_sectors(&[1]) as u64 * SECTOR_SIZE as u64);
    log!("image is {} bytes", len);

    let fs = FileSystem::mount(Arc::new(ImageFile::open(&path).unwrap())).unwrap();
    assert_eq!(fs.volumes().unwrap().len(), 1);
    assert_eq!(fs.read_to_vec("v/docs/a.bin").unwrap(), data);
    let names: Vec<_> = fs
        .read_dir("v/docs")
        .unwrap()
        .iter()
        .map(|fblk| fblk.name_lossy().into_owned())
        .collect();
    assert_eq!(names, ["a.bin"]);
}

#[test]
fn test_empty_image_is_not_mountable() {
    let file = tempfile::tempfile().unwrap();
    let image = ImageFile::from_file(file);
    match FileSystem::mount(Arc::new(image)) {
        Err(FsError::Io { address, kind }) => {
            assert_eq!(address, 0);
            assert_eq!(kind, std::io::ErrorKind::UnexpectedEof);
        }
        other => panic!("unexpected mount result: {:?}", other.map(|_| ())),
    }
}
