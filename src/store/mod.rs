//! Blob-store backends and the handle type the file system consumes.

pub mod client;
pub mod localfs;
pub mod memory;

pub use client::{
    BLOB_ADDRESS_SPACE, BlobBackend, BlobHandle, BlobId, BlobStore, MAX_BLOB_SIZE, StoreError,
    StoreResult,
};
pub use localfs::LocalFsBlobStore;
pub use memory::MemoryBlobStore;
