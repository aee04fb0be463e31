//! Free-id allocator: a monotonic counter over the blob address space.
//!
//! Ids are never reused in this version; `fremove` leaks them. The counter
//! lives in memory between `init` and `finalize` and is persisted in the
//! meta block.

use crate::fs::error::{FsError, FsResult};
use crate::store::{BLOB_ADDRESS_SPACE, BlobId};
use tracing::trace;

#[derive(Debug)]
pub struct IdAlloc {
    next: u64,
}

impl IdAlloc {
    pub fn new(next_free: u64) -> Self {
        Self { next: next_free }
    }

    /// Yield a never-previously-returned id.
    pub fn next_id(&mut self) -> FsResult<BlobId> {
        if self.next >= BLOB_ADDRESS_SPACE {
            return Err(FsError::OutOfSpace);
        }
        let id = self.next;
        self.next += 1;
        trace!(id, "allocated blob id");
        Ok(id)
    }

    /// Counter value to persist at finalize.
    pub fn next_free(&self) -> u64 {
        self.next
    }
}
