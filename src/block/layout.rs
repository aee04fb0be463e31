//! On-blob geometry and the offset arithmetic built on it.
//!
//! - Fixed header/record sizes for the typed blocks.
//! - Helpers to compute (control index, slot, within-blob offset) from file
//!   byte offsets.
//! - `Layout` for custom sizes with defaults matching the on-disk format.

use crate::fs::error::{FsError, FsResult};
use crate::store::{BlobId, MAX_BLOB_SIZE};
use serde::{Deserialize, Serialize};

/// Blob id holding the meta block.
pub const META_BLOB_ID: BlobId = 0;

/// Number of directory-chain heads; ids 1..=DIR_HEADS are reserved for them.
pub const DIR_HEADS: u64 = 1024;

/// Maximum filename length in bytes, including the NUL terminator slot.
pub const MAX_PATH: usize = 512;

/// Maximum file size (2^40 bytes).
pub const MAX_FILE_SIZE: u64 = 1 << 40;

/// Byte size of the fixed header at the front of every dir/control blob:
/// type (u32) + flags (u32) + prev (u64) + next (u64).
pub const BLOCK_HEADER_SIZE: usize = 24;

/// Control blocks carry three more u64 fields after the header:
/// `directory`, `start` and `last_mod`.
pub const CONTROL_EXTRA_SIZE: usize = 24;

/// Full control-block prologue preceding the blob-id array.
pub const CONTROL_PROLOGUE_SIZE: usize = BLOCK_HEADER_SIZE + CONTROL_EXTRA_SIZE;

/// One directory record: NUL-padded name plus the control-blob id.
pub const FILE_ENTRY_SIZE: usize = MAX_PATH + 8;

/// One control record: a data-blob id.
pub const SLOT_SIZE: usize = 8;

/// Geometry knobs. The defaults are the on-disk format; tests shrink them to
/// make chain overflow cheap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layout {
    /// Largest byte size of a single blob.
    pub max_blob_size: u32,
    /// Number of directory hash buckets.
    pub dir_heads: u64,
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            max_blob_size: MAX_BLOB_SIZE as u32,
            dir_heads: DIR_HEADS,
        }
    }
}

impl Layout {
    /// First id the allocator may hand out: past the meta block and every
    /// directory head.
    #[inline]
    pub fn first_free_id(&self) -> BlobId {
        self.dir_heads + 1
    }

    /// Data-blob slots one control block can index.
    #[inline]
    pub fn entries_per_control(&self) -> u64 {
        (self.max_blob_size as u64 - CONTROL_PROLOGUE_SIZE as u64) / SLOT_SIZE as u64
    }

    /// File-byte span addressed by one control block.
    #[inline]
    pub fn bytes_per_control(&self) -> u64 {
        self.entries_per_control() * self.max_blob_size as u64
    }

    /// FileEntry records one directory block can hold.
    #[inline]
    pub fn dir_entries_per_block(&self) -> u64 {
        (self.max_blob_size as u64 - BLOCK_HEADER_SIZE as u64) / FILE_ENTRY_SIZE as u64
    }

    /// Which control block (by `start`) covers file offset `pos`.
    #[inline]
    pub fn control_index_of(&self, pos: u64) -> u64 {
        pos / self.bytes_per_control()
    }

    /// Which slot of that control block's id array covers `pos`.
    #[inline]
    pub fn slot_of(&self, pos: u64) -> u64 {
        (pos % self.bytes_per_control()) / self.max_blob_size as u64
    }

    /// Byte offset inside the data blob covering `pos`.
    #[inline]
    pub fn within_blob_of(&self, pos: u64) -> u64 {
        pos % self.max_blob_size as u64
    }

    /// File byte offset where control block `start` begins.
    #[inline]
    pub fn control_base(&self, start: u64) -> u64 {
        start * self.bytes_per_control()
    }

    pub fn validate(&self) -> FsResult<()> {
        let min = (CONTROL_PROLOGUE_SIZE + SLOT_SIZE).max(BLOCK_HEADER_SIZE + FILE_ENTRY_SIZE);
        if (self.max_blob_size as usize) < min {
            return Err(FsError::BadArgs("max_blob_size too small for one record"));
        }
        if self.max_blob_size as usize > MAX_BLOB_SIZE {
            return Err(FsError::BadArgs("max_blob_size above MaxBlobSize"));
        }
        if self.dir_heads == 0 {
            return Err(FsError::BadArgs("dir_heads must be positive"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_geometry() {
        let layout = Layout::default();
        assert_eq!(layout.entries_per_control(), 32_762);
        assert_eq!(layout.bytes_per_control(), 32_762 * 262_144);
        assert_eq!(layout.dir_entries_per_block(), 504);
        assert_eq!(layout.first_free_id(), 1025);
        layout.validate().unwrap();
    }

    #[test]
    fn test_offset_math_at_scale() {
        let layout = Layout::default();
        let bpc = layout.bytes_per_control();

        assert_eq!(layout.control_index_of(0), 0);
        assert_eq!(layout.control_index_of(bpc - 1), 0);
        assert_eq!(layout.control_index_of(bpc), 1);
        assert_eq!(layout.slot_of(bpc), 0);
        assert_eq!(layout.within_blob_of(bpc), 0);

        // One byte into the second slot of the second control block.
        let pos = bpc + 262_144 + 1;
        assert_eq!(layout.control_index_of(pos), 1);
        assert_eq!(layout.slot_of(pos), 1);
        assert_eq!(layout.within_blob_of(pos), 1);
    }

    #[test]
    fn test_offset_math_small_layout() {
        // 1 KiB blobs: (1024 - 48) / 8 = 122 slots, 124928 bytes per block.
        let layout = Layout {
            max_blob_size: 1024,
            dir_heads: 4,
        };
        assert_eq!(layout.entries_per_control(), 122);
        assert_eq!(layout.bytes_per_control(), 122 * 1024);

        let pos = 122 * 1024 + 3 * 1024 + 17;
        assert_eq!(layout.control_index_of(pos), 1);
        assert_eq!(layout.slot_of(pos), 3);
        assert_eq!(layout.within_blob_of(pos), 17);
    }

    #[test]
    fn test_validate_rejects_degenerate_sizes() {
        let layout = Layout {
            max_blob_size: 100,
            dir_heads: 4,
        };
        assert!(layout.validate().is_err());
    }
}
