//! Blob-store contract consumed by the file system, plus the RAII handle
//! everything above this layer goes through.
//!
//! The store is an opaque address space of numbered blobs. `get_blob` never
//! fails for an id in the legal range: a blob that was never written reads
//! back as zero length. Every acquired handle must be released; [`BlobHandle`]
//! does that on drop so error paths cannot leak one.

use bytes::Bytes;
use std::sync::Arc;
use thiserror::Error;

/// Blob address. Id 0 is reserved for the meta block.
pub type BlobId = u64;

/// Largest byte size a single blob may hold (2^18).
pub const MAX_BLOB_SIZE: usize = 256 * 1024;

/// Size of the blob address space (2^34 ids).
pub const BLOB_ADDRESS_SPACE: u64 = 1 << 34;

/// Failures surfaced by a blob-store backend.
///
/// `code` mirrors the integer constants of the raw store contract
/// (out-of-space = -1, bad-args = -2, internal = -3).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("blob store out of space")]
    OutOfSpace,

    #[error("bad store arguments: {0}")]
    BadArgs(&'static str),

    #[error("internal store error: {0}")]
    Internal(String),

    #[error("store io error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    pub fn code(&self) -> i64 {
        match self {
            StoreError::OutOfSpace => -1,
            StoreError::BadArgs(_) => -2,
            StoreError::Internal(_) | StoreError::Io(_) => -3,
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Backend operations a concrete store must provide.
///
/// `open_blob`/`release_blob` bracket the lifetime of one handle; backends
/// that track outstanding handles (the in-memory store does, for tests) hook
/// them, others leave the default no-ops.
pub trait BlobBackend: Send + Sync + 'static {
    /// Current contents of the blob; empty if it was never written.
    fn read_blob(&self, id: BlobId) -> StoreResult<Bytes>;

    /// Replace the blob's contents wholesale.
    fn write_blob(&self, id: BlobId, data: &[u8]) -> StoreResult<()>;

    /// Remaining capacity in bytes.
    fn free_space(&self) -> u64;

    fn open_blob(&self, _id: BlobId) {}

    fn release_blob(&self, _id: BlobId) {}
}

impl<B: BlobBackend> BlobBackend for Arc<B> {
    fn read_blob(&self, id: BlobId) -> StoreResult<Bytes> {
        (**self).read_blob(id)
    }

    fn write_blob(&self, id: BlobId, data: &[u8]) -> StoreResult<()> {
        (**self).write_blob(id, data)
    }

    fn free_space(&self) -> u64 {
        (**self).free_space()
    }

    fn open_blob(&self, id: BlobId) {
        (**self).open_blob(id)
    }

    fn release_blob(&self, id: BlobId) {
        (**self).release_blob(id)
    }
}

/// Thin client over a backend, the type the file system is built against.
#[derive(Clone)]
pub struct BlobStore {
    backend: Arc<dyn BlobBackend>,
}

impl BlobStore {
    pub fn new<B: BlobBackend>(backend: B) -> Self {
        Self {
            backend: Arc::new(backend),
        }
    }

    /// Acquire a handle for `id`. Infallible per the store contract; the
    /// first read of a never-written blob yields an empty buffer.
    pub fn get_blob(&self, id: BlobId) -> BlobHandle {
        self.backend.open_blob(id);
        BlobHandle {
            id,
            backend: Arc::clone(&self.backend),
        }
    }

    pub fn free_space(&self) -> u64 {
        self.backend.free_space()
    }
}

/// Owned handle to one blob. Dropping the handle releases it; clones are
/// deliberately not offered, shared access goes through `Arc<BlobHandle>`.
pub struct BlobHandle {
    id: BlobId,
    backend: Arc<dyn BlobBackend>,
}

impl BlobHandle {
    pub fn id(&self) -> BlobId {
        self.id
    }

    pub fn read(&self) -> StoreResult<Bytes> {
        self.backend.read_blob(self.id)
    }

    pub fn write(&self, data: &[u8]) -> StoreResult<()> {
        self.backend.write_blob(self.id, data)
    }

    /// Byte length of the blob's current contents.
    pub fn len(&self) -> StoreResult<usize> {
        Ok(self.read()?.len())
    }

    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }
}

impl Drop for BlobHandle {
    fn drop(&mut self) {
        self.backend.release_blob(self.id);
    }
}

impl std::fmt::Debug for BlobHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobHandle").field("id", &self.id).finish()
    }
}
