//! Process-wide C-style surface: fopen/fclose/fread/fwrite/ftell/fseek/
//! fremove bracketed by finitialize/ffinalize.
//!
//! The library proper passes an explicit [`FileSystem`] context around; this
//! module is the thin compatibility layer that hides that context in a
//! process-wide handle table and flattens every error to the documented
//! negative integers. Using it before finitialize or after ffinalize fails
//! cleanly (-1 / None) rather than asserting.

use crate::block::layout::Layout;
use crate::fs::{FileHandle, FileSystem, FsResult, SeekOrigin};
use crate::store::{BlobStore, MemoryBlobStore};
use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};
use tracing::error;

/// Opaque file handle handed across the C-style boundary.
pub type Fd = u64;

struct Runtime {
    fs: Option<FileSystem>,
    handles: HashMap<Fd, FileHandle>,
    next_fd: Fd,
}

static RUNTIME: OnceLock<Mutex<Runtime>> = OnceLock::new();

fn runtime() -> &'static Mutex<Runtime> {
    RUNTIME.get_or_init(|| {
        Mutex::new(Runtime {
            fs: None,
            handles: HashMap::new(),
            next_fd: 1,
        })
    })
}

/// Install the process-wide file system over the toy in-memory store, the
/// setup the sample main uses.
pub fn finitialize() {
    finitialize_with(BlobStore::new(MemoryBlobStore::new()), Layout::default());
}

/// Install the process-wide file system over an arbitrary store.
///
/// Aborts on meta-block corruption: nothing else on disk can be trusted.
pub fn finitialize_with(store: BlobStore, layout: Layout) {
    let mut rt = runtime().lock().unwrap();
    match FileSystem::init(store, layout) {
        Ok(fs) => {
            rt.fs = Some(fs);
            rt.handles.clear();
        }
        Err(e) => {
            error!("finitialize failed: {e}");
            panic!("finitialize: {e}");
        }
    }
}

/// Persist the meta block and tear the process-wide context down. Open
/// handles are invalidated.
pub fn ffinalize() {
    let mut rt = runtime().lock().unwrap();
    rt.handles.clear();
    if let Some(fs) = rt.fs.take()
        && let Err(e) = fs.finalize()
    {
        error!("ffinalize failed: {e}");
    }
}

/// Open or create a file; `None` plays the role of the C NULL.
pub fn fopen(name: &str, mode: &str) -> Option<Fd> {
    let mut rt = runtime().lock().unwrap();
    let rt = &mut *rt;
    let fs = rt.fs.as_mut()?;
    match fs.open(name, mode) {
        Ok(handle) => {
            let fd = rt.next_fd;
            rt.next_fd += 1;
            rt.handles.insert(fd, handle);
            Some(fd)
        }
        Err(_) => None,
    }
}

pub fn fclose(fd: Fd) -> i64 {
    let mut rt = runtime().lock().unwrap();
    let rt = &mut *rt;
    match (rt.fs.as_mut(), rt.handles.remove(&fd)) {
        (Some(fs), Some(handle)) => {
            fs.close(handle);
            0
        }
        _ => -1,
    }
}

fn with_handle(fd: Fd, f: impl FnOnce(&mut FileSystem, &mut FileHandle) -> FsResult<i64>) -> i64 {
    let mut rt = runtime().lock().unwrap();
    let rt = &mut *rt;
    let Some(fs) = rt.fs.as_mut() else {
        return -1;
    };
    let Some(handle) = rt.handles.get_mut(&fd) else {
        return -1;
    };
    match f(fs, handle) {
        Ok(v) => v,
        Err(e) => e.code(),
    }
}

/// Read into `buf`, advancing the cursor. 0 means end of file.
pub fn fread(fd: Fd, buf: &mut [u8]) -> i64 {
    with_handle(fd, |fs, h| Ok(fs.read(h, buf)? as i64))
}

/// Write `buf` at the cursor, advancing it past every stored byte.
pub fn fwrite(fd: Fd, buf: &[u8]) -> i64 {
    with_handle(fd, |fs, h| Ok(fs.write(h, buf)? as i64))
}

pub fn ftell(fd: Fd) -> i64 {
    with_handle(fd, |fs, h| Ok(fs.tell(h) as i64))
}

/// `origin`: 0 = from start, 1 = from end, 2 = from current position.
pub fn fseek(fd: Fd, offset: i64, origin: i32) -> i64 {
    with_handle(fd, |fs, h| {
        let origin = SeekOrigin::from_raw(origin)?;
        Ok(fs.seek(h, offset, origin)? as i64)
    })
}

pub fn fremove(name: &str) -> i64 {
    let mut rt = runtime().lock().unwrap();
    let Some(fs) = rt.fs.as_mut() else {
        return -1;
    };
    match fs.remove(name) {
        Ok(()) => 0,
        Err(e) => e.code(),
    }
}
