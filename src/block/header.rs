//! Typed interpretation of a blob's bytes.
//!
//! Every non-meta, non-data blob starts with a fixed [`BlockHeader`]; the
//! record array trails it. Data blobs deliberately carry no header: control
//! blocks index them explicitly, so their whole buffer is file payload.
//!
//! All multi-byte integers are host-native. The design is single-process and
//! blobs never migrate across hosts; `init` validates the meta magic instead
//! of re-encoding anything.

use crate::block::layout::{
    BLOCK_HEADER_SIZE, CONTROL_PROLOGUE_SIZE, FILE_ENTRY_SIZE, MAX_PATH, SLOT_SIZE,
};
use crate::fs::error::{FsError, FsResult};
use crate::store::BlobId;
use bytes::Bytes;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum BlockType {
    None = 0,
    Control = 1,
    Dir = 2,
    Data = 3,
}

impl BlockType {
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(BlockType::None),
            1 => Some(BlockType::Control),
            2 => Some(BlockType::Dir),
            3 => Some(BlockType::Data),
            _ => None,
        }
    }
}

/// Header flags. Only `NEW` is meaningful; the rest of the word is reserved
/// and stays zero.
pub mod flags {
    pub const NONE: u32 = 0;
    pub const NEW: u32 = 1;
}

/// Fixed header at offset 0 of every dir/control blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    pub kind: BlockType,
    pub flags: u32,
    /// Previous block in this chain; 0 = none.
    pub prev: BlobId,
    /// Next block in this chain; 0 = none.
    pub next: BlobId,
}

impl BlockHeader {
    pub fn new(kind: BlockType) -> Self {
        Self {
            kind,
            flags: flags::NEW,
            prev: 0,
            next: 0,
        }
    }

    pub fn encode(&self) -> [u8; BLOCK_HEADER_SIZE] {
        let mut out = [0u8; BLOCK_HEADER_SIZE];
        out[0..4].copy_from_slice(&(self.kind as u32).to_ne_bytes());
        out[4..8].copy_from_slice(&self.flags.to_ne_bytes());
        out[8..16].copy_from_slice(&self.prev.to_ne_bytes());
        out[16..24].copy_from_slice(&self.next.to_ne_bytes());
        out
    }

    pub fn decode(blob: BlobId, bytes: &[u8]) -> FsResult<Self> {
        if bytes.len() < BLOCK_HEADER_SIZE {
            return Err(FsError::Malformed {
                blob,
                reason: "blob shorter than a block header",
            });
        }
        let raw_kind = u32::from_ne_bytes(bytes[0..4].try_into().unwrap());
        let kind = BlockType::from_raw(raw_kind).ok_or(FsError::Malformed {
            blob,
            reason: "unknown block type",
        })?;
        Ok(Self {
            kind,
            flags: u32::from_ne_bytes(bytes[4..8].try_into().unwrap()),
            prev: u64::from_ne_bytes(bytes[8..16].try_into().unwrap()),
            next: u64::from_ne_bytes(bytes[16..24].try_into().unwrap()),
        })
    }
}

/// Reject anything but 1..=511 bytes of printable ASCII.
pub fn validate_name(name: &str) -> FsResult<()> {
    if name.is_empty() {
        return Err(FsError::BadArgs("empty file name"));
    }
    if name.len() >= MAX_PATH {
        return Err(FsError::BadArgs("file name too long"));
    }
    if !name.bytes().all(|b| (0x20..=0x7e).contains(&b)) {
        return Err(FsError::BadArgs("file name must be printable ascii"));
    }
    Ok(())
}

/// One directory record: a NUL-padded name and the id of the file's first
/// control block. A tombstone has both fields zeroed.
#[derive(Clone, Copy)]
pub struct FileEntry {
    pub name: [u8; MAX_PATH],
    pub control_blob: BlobId,
}

impl FileEntry {
    pub fn new(name: &str, control_blob: BlobId) -> FsResult<Self> {
        validate_name(name)?;
        let mut buf = [0u8; MAX_PATH];
        buf[..name.len()].copy_from_slice(name.as_bytes());
        Ok(Self {
            name: buf,
            control_blob,
        })
    }

    pub fn encode(&self) -> [u8; FILE_ENTRY_SIZE] {
        let mut out = [0u8; FILE_ENTRY_SIZE];
        out[..MAX_PATH].copy_from_slice(&self.name);
        out[MAX_PATH..].copy_from_slice(&self.control_blob.to_ne_bytes());
        out
    }

    pub fn decode(bytes: &[u8]) -> Self {
        debug_assert_eq!(bytes.len(), FILE_ENTRY_SIZE);
        let mut name = [0u8; MAX_PATH];
        name.copy_from_slice(&bytes[..MAX_PATH]);
        Self {
            name,
            control_blob: u64::from_ne_bytes(bytes[MAX_PATH..].try_into().unwrap()),
        }
    }

    fn name_len(&self) -> usize {
        self.name.iter().position(|&b| b == 0).unwrap_or(MAX_PATH)
    }

    /// Byte-exact compare against `name`, up to the first NUL.
    pub fn matches(&self, name: &str) -> bool {
        &self.name[..self.name_len()] == name.as_bytes()
    }

    pub fn is_tombstone(&self) -> bool {
        self.name[0] == 0 && self.control_blob == 0
    }
}

impl std::fmt::Debug for FileEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileEntry")
            .field("name", &String::from_utf8_lossy(&self.name[..self.name_len()]))
            .field("control_blob", &self.control_blob)
            .finish()
    }
}

/// Typed read view over a directory blob's snapshot.
pub struct DirView {
    header: BlockHeader,
    bytes: Bytes,
}

impl DirView {
    pub fn parse(blob: BlobId, bytes: Bytes) -> FsResult<Self> {
        let header = BlockHeader::decode(blob, &bytes)?;
        if header.kind != BlockType::Dir {
            return Err(FsError::Malformed {
                blob,
                reason: "expected a dir block",
            });
        }
        Ok(Self { header, bytes })
    }

    pub fn header(&self) -> BlockHeader {
        self.header
    }

    pub fn entry_count(&self) -> usize {
        (self.bytes.len() - BLOCK_HEADER_SIZE) / FILE_ENTRY_SIZE
    }

    pub fn entry(&self, index: usize) -> FileEntry {
        let at = BLOCK_HEADER_SIZE + index * FILE_ENTRY_SIZE;
        FileEntry::decode(&self.bytes[at..at + FILE_ENTRY_SIZE])
    }

    pub fn entries(&self) -> impl Iterator<Item = (usize, FileEntry)> + '_ {
        (0..self.entry_count()).map(|i| (i, self.entry(i)))
    }
}

/// Typed read view over a control blob's snapshot.
pub struct ControlView {
    header: BlockHeader,
    bytes: Bytes,
}

impl ControlView {
    pub fn parse(blob: BlobId, bytes: Bytes) -> FsResult<Self> {
        let header = BlockHeader::decode(blob, &bytes)?;
        if header.kind != BlockType::Control {
            return Err(FsError::Malformed {
                blob,
                reason: "expected a control block",
            });
        }
        if bytes.len() < CONTROL_PROLOGUE_SIZE {
            return Err(FsError::Malformed {
                blob,
                reason: "control block shorter than its prologue",
            });
        }
        Ok(Self { header, bytes })
    }

    pub fn header(&self) -> BlockHeader {
        self.header
    }

    fn u64_at(&self, at: usize) -> u64 {
        u64::from_ne_bytes(self.bytes[at..at + 8].try_into().unwrap())
    }

    /// Id of the directory-chain head whose chain names this file.
    pub fn directory(&self) -> BlobId {
        self.u64_at(BLOCK_HEADER_SIZE)
    }

    /// Chain index of this block, in units of `bytes_per_control`.
    pub fn start(&self) -> u64 {
        self.u64_at(BLOCK_HEADER_SIZE + 8)
    }

    /// Nanoseconds since the epoch of the last mutating write.
    pub fn last_mod(&self) -> u64 {
        self.u64_at(BLOCK_HEADER_SIZE + 16)
    }

    /// Populated length of the blob-id array (holes included).
    pub fn slot_count(&self) -> u64 {
        ((self.bytes.len() - CONTROL_PROLOGUE_SIZE) / SLOT_SIZE) as u64
    }

    /// Data-blob id in slot `index`; 0 marks a hole.
    pub fn slot(&self, index: u64) -> BlobId {
        let at = CONTROL_PROLOGUE_SIZE + index as usize * SLOT_SIZE;
        self.u64_at(at)
    }

    pub fn slots(&self) -> impl Iterator<Item = BlobId> + '_ {
        (0..self.slot_count()).map(|i| self.slot(i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_roundtrip() {
        let header = BlockHeader {
            kind: BlockType::Dir,
            flags: flags::NEW,
            prev: 17,
            next: 99,
        };
        let decoded = BlockHeader::decode(1, &header.encode()).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn test_decode_rejects_short_and_untyped() {
        assert!(matches!(
            BlockHeader::decode(5, &[0u8; 10]),
            Err(FsError::Malformed { blob: 5, .. })
        ));

        let mut raw = BlockHeader::new(BlockType::Dir).encode();
        raw[0..4].copy_from_slice(&77u32.to_ne_bytes());
        assert!(matches!(
            BlockHeader::decode(5, &raw),
            Err(FsError::Malformed { .. })
        ));
    }

    #[test]
    fn test_file_entry_matching() {
        let entry = FileEntry::new("abcdef.txt", 2048).unwrap();
        assert!(entry.matches("abcdef.txt"));
        assert!(!entry.matches("abcdef.txt2"));
        assert!(!entry.matches("abcdef.tx"));
        assert!(!entry.is_tombstone());

        let raw = entry.encode();
        let back = FileEntry::decode(&raw);
        assert!(back.matches("abcdef.txt"));
        assert_eq!(back.control_blob, 2048);
    }

    #[test]
    fn test_name_validation() {
        assert!(validate_name("ok name.txt").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name(&"x".repeat(MAX_PATH)).is_err());
        assert!(validate_name(&"x".repeat(MAX_PATH - 1)).is_ok());
        assert!(validate_name("bad\nname").is_err());
        assert!(validate_name("caf\u{e9}").is_err());
    }

    #[test]
    fn test_control_view_prologue() {
        let mut raw = Vec::new();
        raw.extend_from_slice(&BlockHeader::new(BlockType::Control).encode());
        raw.extend_from_slice(&7u64.to_ne_bytes()); // directory
        raw.extend_from_slice(&3u64.to_ne_bytes()); // start
        raw.extend_from_slice(&11u64.to_ne_bytes()); // last_mod
        raw.extend_from_slice(&5000u64.to_ne_bytes()); // slot 0
        raw.extend_from_slice(&0u64.to_ne_bytes()); // slot 1: hole
        raw.extend_from_slice(&5002u64.to_ne_bytes()); // slot 2

        let view = ControlView::parse(9, Bytes::from(raw)).unwrap();
        assert_eq!(view.directory(), 7);
        assert_eq!(view.start(), 3);
        assert_eq!(view.last_mod(), 11);
        assert_eq!(view.slot_count(), 3);
        assert_eq!(view.slot(0), 5000);
        assert_eq!(view.slot(1), 0);
        assert_eq!(view.slot(2), 5002);
    }

    #[test]
    fn test_dir_view_entries() {
        let mut raw = Vec::new();
        raw.extend_from_slice(&BlockHeader::new(BlockType::Dir).encode());
        raw.extend_from_slice(&FileEntry::new("a", 100).unwrap().encode());
        raw.extend_from_slice(&FileEntry::new("b", 200).unwrap().encode());

        let view = DirView::parse(3, Bytes::from(raw)).unwrap();
        assert_eq!(view.entry_count(), 2);
        let found: Vec<_> = view.entries().map(|(_, e)| e.control_blob).collect();
        assert_eq!(found, vec![100, 200]);

        // A control header in a dir slot is malformed.
        let raw = BlockHeader::new(BlockType::Control).encode().to_vec();
        assert!(DirView::parse(3, Bytes::from(raw)).is_err());
    }
}
