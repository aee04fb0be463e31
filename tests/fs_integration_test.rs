//! End-to-end scenarios against the default on-disk geometry.

use std::sync::Arc;

use petafs::block::layout::Layout;
use petafs::fs::{FileSystem, FsError, SeekOrigin};
use petafs::meta::hash::dir_head_id;
use petafs::store::{BlobStore, LocalFsBlobStore, MemoryBlobStore};

fn memory_fs() -> FileSystem {
    FileSystem::init(BlobStore::new(MemoryBlobStore::new()), Layout::default()).unwrap()
}

#[test]
fn test_round_trip_small_file() {
    let mut fs = memory_fs();

    let mut h = fs.open("abcdef.txt", "rw").unwrap();
    assert_eq!(fs.write(&mut h, b"hello disk!\0").unwrap(), 12);
    assert_eq!(fs.tell(&h), 12);
    fs.close(h);

    let mut h2 = fs.open("abcdef.txt", "rw").unwrap();
    let mut buf = [0u8; 64];
    assert_eq!(fs.read(&mut h2, &mut buf).unwrap(), 12);
    assert_eq!(&buf[..12], b"hello disk!\0");
    fs.close(h2);

    fs.finalize().unwrap();
}

#[test]
fn test_write_advances_tell_by_bytes_written() {
    let mut fs = memory_fs();
    let mut h = fs.open("cursor", "w").unwrap();

    let mut expected = 0u64;
    for chunk in [3usize, 1000, 70_000, 1] {
        let buf = vec![9u8; chunk];
        let written = fs.write(&mut h, &buf).unwrap();
        assert_eq!(written, chunk);
        expected += written as u64;
        assert_eq!(fs.tell(&h), expected);
    }
}

/// Two names landing in the same directory bucket must coexist in one chain.
#[test]
fn test_two_files_same_bucket() {
    let layout = Layout::default();
    let anchor = "bucket-anchor";
    let target = dir_head_id(&layout, anchor);

    // Exhaustive search for a sibling name in the same bucket.
    let sibling = (0u32..)
        .map(|i| format!("sibling-{i}"))
        .find(|name| dir_head_id(&layout, name) == target)
        .unwrap();

    let mut fs = memory_fs();
    let mut h = fs.open(anchor, "w").unwrap();
    fs.write(&mut h, b"payload-anchor").unwrap();
    fs.close(h);
    let mut h = fs.open(&sibling, "w").unwrap();
    fs.write(&mut h, b"payload-sibling").unwrap();
    fs.close(h);

    let mut buf = [0u8; 64];
    let mut h = fs.open(anchor, "r").unwrap();
    let n = fs.read(&mut h, &mut buf).unwrap();
    assert_eq!(&buf[..n], b"payload-anchor");

    let mut h = fs.open(&sibling, "r").unwrap();
    let n = fs.read(&mut h, &mut buf).unwrap();
    assert_eq!(&buf[..n], b"payload-sibling");

    // Removing one must not disturb the other.
    fs.remove(anchor).unwrap();
    assert!(matches!(fs.open(anchor, "r"), Err(FsError::NotFound)));
    assert!(fs.open(&sibling, "r").is_ok());
}

#[test]
fn test_remove_then_open_misses() {
    let mut fs = memory_fs();
    let mut h = fs.open("a", "w").unwrap();
    fs.write(&mut h, b"x").unwrap();
    fs.close(h);

    fs.remove("a").unwrap();
    assert!(matches!(fs.open("a", "r"), Err(FsError::NotFound)));
}

/// Finalize/init over the same store restores the meta counter and contents.
#[test]
fn test_persistence_across_finalize_init() {
    let layout = Layout::default();
    let backend = Arc::new(MemoryBlobStore::new());

    let mut fs =
        FileSystem::init(BlobStore::new(Arc::clone(&backend)), layout).unwrap();
    let mut h = fs.open("p", "w").unwrap();
    fs.write(&mut h, b"survives a remount").unwrap();
    fs.close(h);
    let free_before = fs.free_space();
    fs.finalize().unwrap();

    let mut fs =
        FileSystem::init(BlobStore::new(Arc::clone(&backend)), layout).unwrap();
    assert_eq!(fs.free_space(), free_before);

    let mut h = fs.open("p", "r").unwrap();
    let mut buf = [0u8; 64];
    let n = fs.read(&mut h, &mut buf).unwrap();
    assert_eq!(&buf[..n], b"survives a remount");

    // The allocator must not re-issue ids already handed out: a fresh file
    // gets a blob id past everything the first session created.
    let mut h2 = fs.open("q", "w").unwrap();
    fs.write(&mut h2, b"fresh").unwrap();
    let mut buf2 = [0u8; 16];
    fs.seek(&mut h2, 0, SeekOrigin::Start).unwrap();
    assert_eq!(fs.read(&mut h2, &mut buf2).unwrap(), 5);
    let mut h = fs.open("p", "r").unwrap();
    let n = fs.read(&mut h, &mut buf).unwrap();
    assert_eq!(&buf[..n], b"survives a remount");
}

/// Same flow against the on-disk backend, across two process-like sessions.
#[test]
fn test_persistence_on_localfs_store() {
    let tmp = tempfile::tempdir().unwrap();
    let layout = Layout::default();

    {
        let store = BlobStore::new(LocalFsBlobStore::open(tmp.path()).unwrap());
        let mut fs = FileSystem::init(store, layout).unwrap();
        let mut h = fs.open("durable.bin", "w").unwrap();
        fs.write(&mut h, &[0xab; 3000]).unwrap();
        fs.close(h);
        fs.finalize().unwrap();
    }

    let store = BlobStore::new(LocalFsBlobStore::open(tmp.path()).unwrap());
    let mut fs = FileSystem::init(store, layout).unwrap();
    let mut h = fs.open("durable.bin", "r").unwrap();
    let mut buf = vec![0u8; 4096];
    assert_eq!(fs.read(&mut h, &mut buf).unwrap(), 3000);
    assert!(buf[..3000].iter().all(|&b| b == 0xab));
}
