//! Unified error surface for the file system.
//!
//! Internal layers propagate `FsError` with `?`; the process-wide C-style
//! surface in `posix` flattens it to the documented negative integers.

use crate::store::{BlobId, StoreError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FsError {
    /// Name absent from its directory chain on a must-exist lookup.
    #[error("file not found")]
    NotFound,

    /// Caller handed us something unusable: a name that is too long or not
    /// printable ASCII, a seek before byte zero, an unknown open mode.
    #[error("bad arguments: {0}")]
    BadArgs(&'static str),

    /// The id allocator ran past the blob address space.
    #[error("out of space")]
    OutOfSpace,

    /// A typed append did not fit in the block. Handled internally by
    /// chaining a fresh block; callers outside the block layer never see it.
    #[error("block full")]
    BlockFull,

    /// A blob's first bytes do not form a valid header for its expected
    /// type, or the meta block failed validation.
    #[error("malformed block in blob {blob}: {reason}")]
    Malformed { blob: BlobId, reason: &'static str },

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type FsResult<T> = Result<T, FsError>;

impl FsError {
    /// The negative integer the C-style surface reports for this error.
    pub fn code(&self) -> i64 {
        match self {
            FsError::BadArgs(_) => -2,
            FsError::Store(e) if matches!(e, StoreError::BadArgs(_)) => -2,
            _ => -1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(FsError::NotFound.code(), -1);
        assert_eq!(FsError::BadArgs("x").code(), -2);
        assert_eq!(FsError::OutOfSpace.code(), -1);
        assert_eq!(FsError::Store(StoreError::OutOfSpace).code(), -1);
        assert_eq!(
            FsError::Store(StoreError::BadArgs("blob larger than MaxBlobSize")).code(),
            -2
        );
    }
}
