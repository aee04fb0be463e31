//! Metadata: the on-disk meta block, the id allocator, name hashing and the
//! directory index.

pub mod alloc;
pub mod dir;
pub mod hash;

pub use alloc::IdAlloc;
pub use dir::{DirIndex, LookupAction};
pub use hash::{dir_head_id, fnv1a32};

use crate::block::cache::BlobCache;
use crate::block::layout::META_BLOB_ID;
use crate::fs::error::{FsError, FsResult};
use crate::store::BLOB_ADDRESS_SPACE;
use tracing::info;

/// On-disk format tag, 16 bytes including the NUL.
pub const MAGIC: [u8; 16] = *b"vdisk2021-00001\0";

pub const VERSION: u64 = 1;

/// Serialised size: magic + version + next_free.
pub const META_SIZE: usize = 32;

/// The bootstrap record at blob 0: format magic, version and the allocator
/// counter. Loaded once at init, written back at finalize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetaBlock {
    pub version: u64,
    pub next_free: u64,
}

impl MetaBlock {
    /// Read blob 0, formatting a fresh meta block when the store is virgin.
    /// Corruption here is fatal: nothing else on disk can be trusted.
    pub fn load(cache: &BlobCache) -> FsResult<Self> {
        let blob = cache.get(META_BLOB_ID);
        let bytes = blob.read()?;
        if bytes.len() < META_SIZE {
            let fresh = Self {
                version: VERSION,
                next_free: cache.layout().first_free_id(),
            };
            blob.write(&fresh.encode())?;
            info!(next_free = fresh.next_free, "formatted fresh meta block");
            return Ok(fresh);
        }

        if bytes[..16] != MAGIC {
            return Err(FsError::Malformed {
                blob: META_BLOB_ID,
                reason: "bad meta magic",
            });
        }
        let version = u64::from_ne_bytes(bytes[16..24].try_into().unwrap());
        if version != VERSION {
            return Err(FsError::Malformed {
                blob: META_BLOB_ID,
                reason: "unsupported meta version",
            });
        }
        let next_free = u64::from_ne_bytes(bytes[24..32].try_into().unwrap());
        if next_free < cache.layout().first_free_id() || next_free > BLOB_ADDRESS_SPACE {
            return Err(FsError::Malformed {
                blob: META_BLOB_ID,
                reason: "allocator counter out of range",
            });
        }
        Ok(Self { version, next_free })
    }

    pub fn store(&self, cache: &BlobCache) -> FsResult<()> {
        let blob = cache.get(META_BLOB_ID);
        blob.write(&self.encode())?;
        info!(next_free = self.next_free, "persisted meta block");
        Ok(())
    }

    fn encode(&self) -> [u8; META_SIZE] {
        let mut out = [0u8; META_SIZE];
        out[..16].copy_from_slice(&MAGIC);
        out[16..24].copy_from_slice(&self.version.to_ne_bytes());
        out[24..32].copy_from_slice(&self.next_free.to_ne_bytes());
        out
    }
}
