//! File-system layer: the explicit context every operation runs against,
//! plus the open/read/write/seek/tell/remove surface built on the directory
//! and control indices.
//!
//! There is no dirty state: every mutating call writes through to the blob
//! store. The only things held in memory between calls are the meta
//! counter, the working set of live blob handles, and each handle's cursor.

pub mod control;
pub mod error;
pub mod handle;

pub use error::{FsError, FsResult};
pub use handle::{FileHandle, OpenFlags, SeekOrigin};

use crate::block::cache::{BlobCache, CacheStats};
use crate::block::layout::{Layout, MAX_FILE_SIZE};
use crate::block::node::{ControlKind, Node};
use crate::meta::alloc::IdAlloc;
use crate::meta::dir::{DirIndex, LookupAction};
use crate::meta::MetaBlock;
use crate::store::BlobStore;
use tracing::{debug, info};

pub struct FileSystem {
    cache: BlobCache,
    version: u64,
    alloc: IdAlloc,
}

impl FileSystem {
    /// Bootstrap from blob 0: format a virgin store, validate an existing
    /// one. Corruption of the meta block is fatal here.
    pub fn init(store: BlobStore, layout: Layout) -> FsResult<Self> {
        layout.validate()?;
        let cache = BlobCache::new(store, layout);
        let meta = MetaBlock::load(&cache)?;
        info!(
            version = meta.version,
            next_free = meta.next_free,
            "file system initialised"
        );
        Ok(Self {
            cache,
            version: meta.version,
            alloc: IdAlloc::new(meta.next_free),
        })
    }

    /// Persist the meta counter and drop the context. Init after finalize
    /// restores an equal state.
    pub fn finalize(self) -> FsResult<()> {
        let meta = MetaBlock {
            version: self.version,
            next_free: self.alloc.next_free(),
        };
        meta.store(&self.cache)?;
        info!("file system finalised");
        Ok(())
    }

    pub fn layout(&self) -> Layout {
        self.cache.layout()
    }

    pub fn free_space(&self) -> u64 {
        self.cache.free_space()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Open or create `name` according to the C-style `mode` string.
    pub fn open(&mut self, name: &str, mode: &str) -> FsResult<FileHandle> {
        let flags = OpenFlags::parse(mode)?;
        let action = if flags.create {
            LookupAction::Create
        } else {
            LookupAction::MustExist
        };

        let dir = DirIndex::new(&self.cache);
        let cb = dir
            .lookup_or_create(name, action, &mut self.alloc)?
            .ok_or(FsError::NotFound)?;
        let cb_id = cb.id();

        if flags.truncate {
            control::truncate_chain(&self.cache, cb)?;
        } else {
            drop(cb);
        }

        let position = if flags.append {
            control::file_size(&self.cache, Node::open(&self.cache, cb_id)?)?
        } else {
            0
        };

        debug!(name, cb_id, position, mode, "opened file");
        Ok(FileHandle {
            position,
            cb_id,
            writable: flags.write,
        })
    }

    /// Drop the handle. Write-through design: nothing left to flush.
    pub fn close(&mut self, handle: FileHandle) {
        debug!(cb_id = handle.cb_id, "closed file");
    }

    pub fn tell(&self, handle: &FileHandle) -> u64 {
        handle.position
    }

    /// Move the cursor. Seeking past EOF is legal: a later write extends the
    /// file, a later read comes back short.
    pub fn seek(
        &mut self,
        handle: &mut FileHandle,
        offset: i64,
        origin: SeekOrigin,
    ) -> FsResult<u64> {
        let base: i128 = match origin {
            SeekOrigin::Start => 0,
            SeekOrigin::End => {
                control::file_size(&self.cache, Node::open(&self.cache, handle.cb_id)?)? as i128
            }
            SeekOrigin::Current => handle.position as i128,
        };
        let target = base + offset as i128;
        if target < 0 {
            return Err(FsError::BadArgs("seek before start of file"));
        }
        if target > MAX_FILE_SIZE as i128 {
            return Err(FsError::BadArgs("seek past maximum file size"));
        }
        handle.position = target as u64;
        Ok(handle.position)
    }

    /// Write `buf` at the cursor, allocating data blobs and extending the
    /// control chain as needed. The cursor advances past every byte that
    /// reached the store, so a mid-call failure leaves the written prefix
    /// observable.
    pub fn write(&mut self, handle: &mut FileHandle, buf: &[u8]) -> FsResult<usize> {
        if !handle.writable {
            return Err(FsError::BadArgs("handle not open for writing"));
        }
        if buf.is_empty() {
            return Ok(0);
        }
        let layout = self.cache.layout();
        let mut cb = Node::<ControlKind>::open(&self.cache, handle.cb_id)?;
        let mut written = 0usize;

        while written < buf.len() {
            cb = control::locate_extend(&self.cache, cb, handle.position, &mut self.alloc)?;
            handle.cb_id = cb.id();

            let slot = layout.slot_of(handle.position);
            let within = layout.within_blob_of(handle.position) as usize;
            let data_id = match control::find_slot(&cb.view()?, slot) {
                Some(id) => id,
                None => {
                    let id = self.alloc.next_id()?;
                    control::set_slot(&mut cb, slot, id)?;
                    id
                }
            };

            let chunk = (buf.len() - written).min(layout.max_blob_size as usize - within);
            let blob = self.cache.get(data_id);
            let mut data = blob.read()?.to_vec();
            if data.len() < within + chunk {
                data.resize(within + chunk, 0);
            }
            data[within..within + chunk].copy_from_slice(&buf[written..written + chunk]);
            blob.write(&data)?;

            written += chunk;
            handle.position += chunk as u64;
        }

        cb.touch()?;
        Ok(written)
    }

    /// Read into `buf` from the cursor. Never extends anything; holes and
    /// the end of the chain read as EOF (a short or zero-length result).
    pub fn read(&mut self, handle: &mut FileHandle, buf: &mut [u8]) -> FsResult<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let layout = self.cache.layout();
        let mut cb = Node::<ControlKind>::open(&self.cache, handle.cb_id)?;
        let mut read = 0usize;

        while read < buf.len() {
            match control::locate_ro(&self.cache, cb, handle.position)? {
                Some(node) => cb = node,
                None => break,
            }
            handle.cb_id = cb.id();

            let slot = layout.slot_of(handle.position);
            let within = layout.within_blob_of(handle.position) as usize;
            let Some(data_id) = control::find_slot(&cb.view()?, slot) else {
                break;
            };

            let data = self.cache.get(data_id).read()?;
            if within >= data.len() {
                break;
            }
            let chunk = (buf.len() - read).min(data.len() - within);
            buf[read..read + chunk].copy_from_slice(&data[within..within + chunk]);
            read += chunk;
            handle.position += chunk as u64;
        }

        Ok(read)
    }

    /// Tombstone `name` in its directory chain. The file's control and data
    /// blobs are leaked by design.
    pub fn remove(&mut self, name: &str) -> FsResult<()> {
        DirIndex::new(&self.cache).remove(name)
    }
}
