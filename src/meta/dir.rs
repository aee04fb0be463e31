//! Directory index: name → control-block lookup over hash-bucket chains.
//!
//! A filename hashes to one of a fixed set of chain heads; the chain is
//! scanned linearly for a byte-exact match. Creation appends to the chain
//! tail, chaining a fresh dir block when the tail is full. Removal
//! tombstones the entry in place and leaks the file's ids.

use crate::block::cache::BlobCache;
use crate::block::header::{FileEntry, validate_name};
use crate::block::node::{ControlKind, DirKind, Node, chain_block};
use crate::fs::error::{FsError, FsResult};
use crate::meta::alloc::IdAlloc;
use crate::meta::hash::dir_head_id;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupAction {
    MustExist,
    Create,
}

pub struct DirIndex<'a> {
    cache: &'a BlobCache,
}

impl<'a> DirIndex<'a> {
    pub fn new(cache: &'a BlobCache) -> Self {
        Self { cache }
    }

    /// Find `name` in its bucket chain, creating the file when asked.
    ///
    /// Returns the file's first control block, or `None` on a must-exist
    /// miss.
    pub fn lookup_or_create(
        &self,
        name: &str,
        action: LookupAction,
        alloc: &mut IdAlloc,
    ) -> FsResult<Option<Node<ControlKind>>> {
        validate_name(name)?;
        let layout = self.cache.layout();
        let head_id = dir_head_id(&layout, name);

        // Heads come into existence on first create; a must-exist lookup
        // leaves an untouched bucket untouched.
        let mut node = match action {
            LookupAction::Create => Node::<DirKind>::open(self.cache, head_id)?,
            LookupAction::MustExist => {
                match Node::<DirKind>::try_open(self.cache, head_id)? {
                    Some(node) => node,
                    None => return Ok(None),
                }
            }
        };

        loop {
            let view = node.view()?;
            for (_, entry) in view.entries() {
                if !entry.is_tombstone() && entry.matches(name) {
                    let cb = Node::<ControlKind>::try_open(self.cache, entry.control_blob)?
                        .ok_or(FsError::Malformed {
                            blob: entry.control_blob,
                            reason: "file entry points at an empty blob",
                        })?;
                    return Ok(Some(cb));
                }
            }
            if !node.next()? {
                break;
            }
        }

        if action == LookupAction::MustExist {
            return Ok(None);
        }

        // Miss: mint the control block, then record the name at the tail,
        // spilling into a freshly chained dir block when the tail is full.
        let cb_id = alloc.next_id()?;
        let mut cb = Node::<ControlKind>::open(self.cache, cb_id)?;
        cb.set_directory(head_id)?;
        cb.touch()?;

        let record = FileEntry::new(name, cb_id)?.encode();
        match node.append_record(&record) {
            Ok(()) => {}
            Err(FsError::BlockFull) => {
                let new_id = alloc.next_id()?;
                let mut tail = chain_block(self.cache, &mut node, new_id)?;
                tail.append_record(&record)?;
            }
            Err(e) => return Err(e),
        }
        debug!(name, control = cb_id, "created file entry");
        Ok(Some(cb))
    }

    /// Tombstone `name`'s entry. The control chain and data blobs are
    /// deliberately leaked; see the allocator notes.
    pub fn remove(&self, name: &str) -> FsResult<()> {
        validate_name(name)?;
        let layout = self.cache.layout();
        let head_id = dir_head_id(&layout, name);

        let mut node = match Node::<DirKind>::try_open(self.cache, head_id)? {
            Some(node) => node,
            None => return Err(FsError::NotFound),
        };

        loop {
            let view = node.view()?;
            let hit = view
                .entries()
                .find(|(_, e)| !e.is_tombstone() && e.matches(name))
                .map(|(i, _)| i);
            if let Some(index) = hit {
                node.clear_entry(index as u64)?;
                debug!(name, dir_block = node.id(), "removed file entry");
                return Ok(());
            }
            if !node.next()? {
                return Err(FsError::NotFound);
            }
        }
    }
}
