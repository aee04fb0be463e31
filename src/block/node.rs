//! Node layer: an in-memory owner of one typed block.
//!
//! A node wraps a live blob handle plus a cached copy of its header, and is
//! the only thing that mutates dir/control blobs. Chain traversal retargets
//! the node in place (`next`/`prev`) rather than materialising lists of
//! neighbours; chains on disk are id-linked, not pointer-linked.

use crate::block::cache::BlobCache;
use crate::block::header::{BlockHeader, BlockType, ControlView, DirView};
use crate::block::layout::{BLOCK_HEADER_SIZE, CONTROL_EXTRA_SIZE, FILE_ENTRY_SIZE, SLOT_SIZE};
use crate::fs::error::{FsError, FsResult};
use crate::store::{BlobHandle, BlobId};
use bytes::Bytes;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, trace};

/// Compile-time description of one block type.
pub trait BlockKind {
    const KIND: BlockType;
    /// Bytes between the header and the record array.
    const EXTRA: usize;
    /// Size of one record in the trailing array.
    const RECORD: usize;
}

pub struct DirKind;

impl BlockKind for DirKind {
    const KIND: BlockType = BlockType::Dir;
    const EXTRA: usize = 0;
    const RECORD: usize = FILE_ENTRY_SIZE;
}

pub struct ControlKind;

impl BlockKind for ControlKind {
    const KIND: BlockType = BlockType::Control;
    const EXTRA: usize = CONTROL_EXTRA_SIZE;
    const RECORD: usize = SLOT_SIZE;
}

pub struct Node<K: BlockKind> {
    cache: BlobCache,
    id: BlobId,
    blob: Arc<BlobHandle>,
    header: BlockHeader,
    _kind: PhantomData<K>,
}

impl<K: BlockKind> Node<K> {
    /// Open the block at `id`, initialising an empty blob with a zeroed
    /// header of this kind first.
    pub fn open(cache: &BlobCache, id: BlobId) -> FsResult<Self> {
        let blob = cache.get(id);
        let bytes = blob.read()?;
        let header = if bytes.len() < BLOCK_HEADER_SIZE {
            let header = BlockHeader::new(K::KIND);
            let mut raw = Vec::with_capacity(BLOCK_HEADER_SIZE + K::EXTRA);
            raw.extend_from_slice(&header.encode());
            raw.resize(BLOCK_HEADER_SIZE + K::EXTRA, 0);
            blob.write(&raw)?;
            trace!(id, kind = ?K::KIND, "initialised fresh block");
            header
        } else {
            Self::check_kind(id, BlockHeader::decode(id, &bytes)?)?
        };
        Ok(Self {
            cache: cache.clone(),
            id,
            blob,
            header,
            _kind: PhantomData,
        })
    }

    /// Like [`Node::open`] but never writes: an empty blob yields `None`.
    pub fn try_open(cache: &BlobCache, id: BlobId) -> FsResult<Option<Self>> {
        let blob = cache.get(id);
        let bytes = blob.read()?;
        if bytes.len() < BLOCK_HEADER_SIZE {
            return Ok(None);
        }
        let header = Self::check_kind(id, BlockHeader::decode(id, &bytes)?)?;
        Ok(Some(Self {
            cache: cache.clone(),
            id,
            blob,
            header,
            _kind: PhantomData,
        }))
    }

    fn check_kind(id: BlobId, header: BlockHeader) -> FsResult<BlockHeader> {
        if header.kind != K::KIND {
            return Err(FsError::Malformed {
                blob: id,
                reason: "block type does not match its chain",
            });
        }
        Ok(header)
    }

    pub fn id(&self) -> BlobId {
        self.id
    }

    pub fn header(&self) -> BlockHeader {
        self.header
    }

    /// Snapshot of the whole blob.
    pub fn bytes(&self) -> FsResult<Bytes> {
        Ok(self.blob.read()?)
    }

    /// Current byte length of the underlying blob.
    pub fn size(&self) -> FsResult<usize> {
        Ok(self.blob.len()?)
    }

    /// Number of records in the trailing array.
    pub fn record_count(&self) -> FsResult<u64> {
        let len = self.size()?;
        Ok((len.saturating_sub(BLOCK_HEADER_SIZE + K::EXTRA) / K::RECORD) as u64)
    }

    pub fn update_header(&mut self, f: impl FnOnce(&mut BlockHeader)) -> FsResult<()> {
        let mut header = self.header;
        f(&mut header);
        let mut raw = self.blob.read()?.to_vec();
        raw[..BLOCK_HEADER_SIZE].copy_from_slice(&header.encode());
        self.blob.write(&raw)?;
        self.header = header;
        Ok(())
    }

    pub fn set_next(&mut self, id: BlobId) -> FsResult<()> {
        self.update_header(|h| h.next = id)
    }

    pub fn set_prev(&mut self, id: BlobId) -> FsResult<()> {
        self.update_header(|h| h.prev = id)
    }

    /// Append raw bytes after the current tail, whole or not at all.
    fn append_tail(&mut self, extra: &[u8]) -> FsResult<()> {
        let mut raw = self.blob.read()?.to_vec();
        if raw.len() + extra.len() > self.cache.layout().max_blob_size as usize {
            return Err(FsError::BlockFull);
        }
        raw.extend_from_slice(extra);
        self.blob.write(&raw)?;
        Ok(())
    }

    /// Append one record; fails with `BlockFull` when it would not fit.
    pub fn append_record(&mut self, record: &[u8]) -> FsResult<()> {
        debug_assert_eq!(record.len(), K::RECORD);
        self.append_tail(record)
    }

    /// Append several records in a single store write.
    pub fn append_records(&mut self, records: &[u8]) -> FsResult<()> {
        debug_assert_eq!(records.len() % K::RECORD, 0);
        self.append_tail(records)
    }

    /// Overwrite record `index` in place.
    pub fn write_record(&mut self, index: u64, record: &[u8]) -> FsResult<()> {
        debug_assert_eq!(record.len(), K::RECORD);
        let at = BLOCK_HEADER_SIZE + K::EXTRA + index as usize * K::RECORD;
        let mut raw = self.blob.read()?.to_vec();
        if at + K::RECORD > raw.len() {
            return Err(FsError::Malformed {
                blob: self.id,
                reason: "record index past the end of the block",
            });
        }
        raw[at..at + K::RECORD].copy_from_slice(record);
        self.blob.write(&raw)?;
        Ok(())
    }

    /// Drop every record, keeping header and prologue intact.
    pub fn truncate_records(&mut self) -> FsResult<()> {
        let mut raw = self.blob.read()?.to_vec();
        raw.truncate(BLOCK_HEADER_SIZE + K::EXTRA);
        self.blob.write(&raw)?;
        Ok(())
    }

    /// Retarget to the next block in the chain. False when there is none or
    /// the neighbour blob is unavailable.
    pub fn next(&mut self) -> FsResult<bool> {
        self.retarget(self.header.next)
    }

    /// Retarget to the previous block in the chain.
    pub fn prev(&mut self) -> FsResult<bool> {
        self.retarget(self.header.prev)
    }

    fn retarget(&mut self, id: BlobId) -> FsResult<bool> {
        if id == 0 {
            return Ok(false);
        }
        match Self::try_open(&self.cache, id)? {
            Some(node) => {
                *self = node;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Allocate-and-link a fresh tail block after `prev`.
///
/// The two header writes are not atomic; a crash in between leaves an orphan
/// tail, which this design accepts (durability across crashes is out of
/// scope).
pub fn chain_block<K: BlockKind>(
    cache: &BlobCache,
    prev: &mut Node<K>,
    new_id: BlobId,
) -> FsResult<Node<K>> {
    let mut node = Node::<K>::open(cache, new_id)?;
    node.set_prev(prev.id())?;
    prev.set_next(new_id)?;
    debug!(prev = prev.id(), new = new_id, kind = ?K::KIND, "chained block");
    Ok(node)
}

fn now_nanos() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

impl Node<ControlKind> {
    pub fn view(&self) -> FsResult<ControlView> {
        ControlView::parse(self.id, self.bytes()?)
    }

    fn write_extra_u64(&mut self, field: usize, value: u64) -> FsResult<()> {
        let at = BLOCK_HEADER_SIZE + field * 8;
        let mut raw = self.blob.read()?.to_vec();
        raw[at..at + 8].copy_from_slice(&value.to_ne_bytes());
        self.blob.write(&raw)?;
        Ok(())
    }

    pub fn set_directory(&mut self, id: BlobId) -> FsResult<()> {
        self.write_extra_u64(0, id)
    }

    pub fn set_start(&mut self, start: u64) -> FsResult<()> {
        self.write_extra_u64(1, start)
    }

    /// Refresh the last-modified stamp.
    pub fn touch(&mut self) -> FsResult<()> {
        self.write_extra_u64(2, now_nanos())
    }
}

impl Node<DirKind> {
    pub fn view(&self) -> FsResult<DirView> {
        DirView::parse(self.id, self.bytes()?)
    }

    /// Tombstone entry `index`: zero the name and the control id in place.
    pub fn clear_entry(&mut self, index: u64) -> FsResult<()> {
        self.write_record(index, &[0u8; FILE_ENTRY_SIZE])
    }
}
