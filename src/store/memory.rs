//! In-memory blob store used by the demo subcommand and the test suite.
//!
//! Models the real store closely enough to exercise every file-system path:
//! per-blob size cap, a byte-accurate free-space counter, and outstanding
//! handle accounting so tests can assert the acquire/release discipline.

use super::client::{BlobBackend, BlobId, MAX_BLOB_SIZE, StoreError, StoreResult};
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Mutex;

/// Default capacity: 2^52 bytes, the figure the problem statement fixes.
pub const DEFAULT_CAPACITY: u64 = 1 << 52;

#[derive(Default)]
struct MemoryState {
    blobs: HashMap<BlobId, Bytes>,
    used: u64,
    open_handles: HashMap<BlobId, u32>,
}

pub struct MemoryBlobStore {
    max_blob_size: usize,
    capacity: u64,
    state: Mutex<MemoryState>,
}

impl Default for MemoryBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::with_limits(MAX_BLOB_SIZE, DEFAULT_CAPACITY)
    }

    /// Shrunken geometry for tests that want cheap overflow.
    pub fn with_limits(max_blob_size: usize, capacity: u64) -> Self {
        Self {
            max_blob_size,
            capacity,
            state: Mutex::new(MemoryState::default()),
        }
    }

    /// Number of handles currently open across all blobs.
    pub fn outstanding_handles(&self) -> u64 {
        let state = self.state.lock().unwrap();
        state.open_handles.values().map(|&n| n as u64).sum()
    }

    /// Number of blobs that hold at least one byte.
    pub fn populated_blobs(&self) -> usize {
        let state = self.state.lock().unwrap();
        state.blobs.values().filter(|b| !b.is_empty()).count()
    }
}

impl BlobBackend for MemoryBlobStore {
    fn read_blob(&self, id: BlobId) -> StoreResult<Bytes> {
        let state = self.state.lock().unwrap();
        Ok(state.blobs.get(&id).cloned().unwrap_or_default())
    }

    fn write_blob(&self, id: BlobId, data: &[u8]) -> StoreResult<()> {
        if data.len() > self.max_blob_size {
            return Err(StoreError::BadArgs("blob larger than MaxBlobSize"));
        }
        let mut state = self.state.lock().unwrap();
        let old = state.blobs.get(&id).map(|b| b.len() as u64).unwrap_or(0);
        let new = data.len() as u64;
        if new > old && state.used + (new - old) > self.capacity {
            return Err(StoreError::OutOfSpace);
        }
        state.used = state.used - old + new;
        state.blobs.insert(id, Bytes::copy_from_slice(data));
        Ok(())
    }

    fn free_space(&self) -> u64 {
        let state = self.state.lock().unwrap();
        self.capacity - state.used
    }

    fn open_blob(&self, id: BlobId) {
        let mut state = self.state.lock().unwrap();
        *state.open_handles.entry(id).or_insert(0) += 1;
    }

    fn release_blob(&self, id: BlobId) {
        let mut state = self.state.lock().unwrap();
        if let Some(n) = state.open_handles.get_mut(&id) {
            *n -= 1;
            if *n == 0 {
                state.open_handles.remove(&id);
            }
        }
    }
}
