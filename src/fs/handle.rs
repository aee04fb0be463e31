//! Open-mode parsing, seek origins and the FILE handle itself.

use crate::fs::error::{FsError, FsResult};
use crate::store::BlobId;

/// Parsed open intent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpenFlags {
    pub write: bool,
    pub append: bool,
    pub create: bool,
    pub truncate: bool,
}

impl OpenFlags {
    /// Parse a C-style mode string.
    ///
    /// 'w' anywhere means write-create intent; 'a' means create-if-missing
    /// with the cursor at end-of-file; a bare 'r' means must-exist. Only a
    /// write-only mode truncates: the legacy "rw" form keeps existing
    /// contents. Reads are permitted on every handle; writes are gated.
    pub fn parse(mode: &str) -> FsResult<Self> {
        let has_r = mode.contains('r');
        let has_w = mode.contains('w');
        let has_a = mode.contains('a');
        if !has_r && !has_w && !has_a {
            return Err(FsError::BadArgs("unrecognised open mode"));
        }
        Ok(Self {
            write: has_w || has_a,
            append: has_a,
            create: has_w || has_a,
            truncate: has_w && !has_r,
        })
    }
}

/// Where a seek offset is measured from. The wire values are 0 = start,
/// 1 = end, 2 = current.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekOrigin {
    Start,
    End,
    Current,
}

impl SeekOrigin {
    pub fn from_raw(raw: i32) -> FsResult<Self> {
        match raw {
            0 => Ok(SeekOrigin::Start),
            1 => Ok(SeekOrigin::End),
            2 => Ok(SeekOrigin::Current),
            _ => Err(FsError::BadArgs("unknown seek origin")),
        }
    }
}

/// An open file: a cursor plus the last-visited control block, cached so
/// sequential I/O does not re-walk the chain from its head.
#[derive(Debug)]
pub struct FileHandle {
    pub(crate) position: u64,
    pub(crate) cb_id: BlobId,
    pub(crate) writable: bool,
}

impl FileHandle {
    pub fn position(&self) -> u64 {
        self.position
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_parsing() {
        let r = OpenFlags::parse("r").unwrap();
        assert!(!r.write && !r.create && !r.truncate && !r.append);

        let w = OpenFlags::parse("w").unwrap();
        assert!(w.write && w.create && w.truncate && !w.append);

        // The legacy "rw" form: 'w' anywhere implies create, but existing
        // contents survive.
        let rw = OpenFlags::parse("rw").unwrap();
        assert!(rw.write && rw.create && !rw.truncate);

        let a = OpenFlags::parse("a").unwrap();
        assert!(a.write && a.create && a.append && !a.truncate);

        assert!(OpenFlags::parse("").is_err());
        assert!(OpenFlags::parse("x").is_err());
    }

    #[test]
    fn test_seek_origin_wire_values() {
        assert_eq!(SeekOrigin::from_raw(0).unwrap(), SeekOrigin::Start);
        assert_eq!(SeekOrigin::from_raw(1).unwrap(), SeekOrigin::End);
        assert_eq!(SeekOrigin::from_raw(2).unwrap(), SeekOrigin::Current);
        assert!(SeekOrigin::from_raw(3).is_err());
    }
}
