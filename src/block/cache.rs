//! Working set of live blob handles.
//!
//! The file system promises the store at most one live handle per blob id;
//! every node that needs a blob goes through here. Entries hold weak
//! references, so when the last node referring to an id drops, the handle
//! drops with it and the blob is released back to the store.

use crate::block::layout::Layout;
use crate::store::{BlobHandle, BlobId, BlobStore};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

/// Prune dead weak entries once the map grows past this.
const PRUNE_THRESHOLD: usize = 256;

#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub live: usize,
}

struct WsEntry {
    handle: Weak<BlobHandle>,
    hit_count: u32,
}

struct CacheInner {
    store: BlobStore,
    layout: Layout,
    ws: Mutex<HashMap<BlobId, WsEntry>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

#[derive(Clone)]
pub struct BlobCache {
    inner: Arc<CacheInner>,
}

impl BlobCache {
    pub fn new(store: BlobStore, layout: Layout) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                store,
                layout,
                ws: Mutex::new(HashMap::new()),
                hits: AtomicU64::new(0),
                misses: AtomicU64::new(0),
            }),
        }
    }

    pub fn layout(&self) -> Layout {
        self.inner.layout
    }

    pub fn free_space(&self) -> u64 {
        self.inner.store.free_space()
    }

    /// Handle for `id`, reusing the live one when some node already holds it.
    pub fn get(&self, id: BlobId) -> Arc<BlobHandle> {
        let mut ws = self.inner.ws.lock().unwrap();
        if let Some(entry) = ws.get_mut(&id)
            && let Some(handle) = entry.handle.upgrade()
        {
            entry.hit_count += 1;
            self.inner.hits.fetch_add(1, Ordering::Relaxed);
            return handle;
        }

        let handle = Arc::new(self.inner.store.get_blob(id));
        if ws.len() >= PRUNE_THRESHOLD {
            ws.retain(|_, e| e.handle.strong_count() > 0);
        }
        ws.insert(
            id,
            WsEntry {
                handle: Arc::downgrade(&handle),
                hit_count: 0,
            },
        );
        self.inner.misses.fetch_add(1, Ordering::Relaxed);
        handle
    }

    pub fn stats(&self) -> CacheStats {
        let ws = self.inner.ws.lock().unwrap();
        CacheStats {
            hits: self.inner.hits.load(Ordering::Relaxed),
            misses: self.inner.misses.load(Ordering::Relaxed),
            live: ws.values().filter(|e| e.handle.strong_count() > 0).count(),
        }
    }
}
