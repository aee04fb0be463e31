//! Local-directory blob store: one file per blob id under a root directory.
//!
//! This is the persistent backend the CLI uses. It plays the role an object
//! store would in production, the same way the reference codebase mocks its
//! object store with a local filesystem.

use super::client::{BlobBackend, BlobId, MAX_BLOB_SIZE, StoreError, StoreResult};
use bytes::Bytes;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

/// Default capacity matches the in-memory store: 2^52 bytes.
const DEFAULT_CAPACITY: u64 = 1 << 52;

pub struct LocalFsBlobStore {
    root: PathBuf,
    capacity: u64,
    used: Mutex<u64>,
}

impl LocalFsBlobStore {
    /// Open (or create) a store rooted at `root`. Existing blob files are
    /// scanned once so the free-space figure starts accurate.
    pub fn open<P: AsRef<Path>>(root: P) -> StoreResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;

        let mut used = 0u64;
        for entry in fs::read_dir(&root)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                used += entry.metadata()?.len();
            }
        }
        debug!(root = %root.display(), used, "opened localfs blob store");

        Ok(Self {
            root,
            capacity: DEFAULT_CAPACITY,
            used: Mutex::new(used),
        })
    }

    fn path_for(&self, id: BlobId) -> PathBuf {
        self.root.join(format!("{id:016x}"))
    }
}

impl BlobBackend for LocalFsBlobStore {
    fn read_blob(&self, id: BlobId) -> StoreResult<Bytes> {
        match fs::read(self.path_for(id)) {
            Ok(buf) => Ok(Bytes::from(buf)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Bytes::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_blob(&self, id: BlobId, data: &[u8]) -> StoreResult<()> {
        if data.len() > MAX_BLOB_SIZE {
            return Err(StoreError::BadArgs("blob larger than MaxBlobSize"));
        }
        let path = self.path_for(id);
        let old = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
        let new = data.len() as u64;
        {
            let mut used = self.used.lock().unwrap();
            if new > old && *used + (new - old) > self.capacity {
                return Err(StoreError::OutOfSpace);
            }
            *used = *used - old + new;
        }
        fs::write(&path, data)?;
        Ok(())
    }

    fn free_space(&self) -> u64 {
        self.capacity - *self.used.lock().unwrap()
    }
}
