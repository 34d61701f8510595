//! Thread-safe facade over an [`RTree`].

use std::sync::Arc;

use log::debug;
use parking_lot::RwLock;

use crate::envelope::Envelope;
use crate::errors::{TreeError, TreeResult};
use crate::node::EntryId;
use crate::storage::{MemoryNodeStore, NodeStore};
use crate::tree::{RTree, ValidationReport};

/// The narrow interface feature and coverage stores use to index their
/// records by bounding box.
pub trait EnvelopeIndex: Send + Sync {
    /// Adds a key to the index.
    fn add(&self, key: &Envelope, id: EntryId) -> TreeResult<()>;

    /// Removes one entry with exactly this key and id.
    fn remove(&self, key: &Envelope, id: EntryId) -> TreeResult<bool>;

    /// Ids of entries whose key intersects `key`, borders included.
    fn find_intersecting_keys(&self, key: &Envelope) -> TreeResult<Vec<EntryId>>;

    /// Ids of entries whose key lies inside `key`.
    fn find_contained_keys(&self, key: &Envelope) -> TreeResult<Vec<EntryId>>;

    /// Number of entries. Still answers after [`close`](EnvelopeIndex::close),
    /// with the count at closing time.
    fn size(&self) -> u64;

    /// Removes every entry.
    fn clear(&self) -> TreeResult<()>;

    /// Flushes pending changes. Every later fallible operation fails with
    /// [`TreeError::Closed`]. Closing twice is a no-op.
    fn close(&self) -> TreeResult<()>;
}

/// An [`RTree`] behind a single read-write lock.
///
/// Clones share the same tree. Searches run concurrently; mutations are
/// serialized. Once closed, every operation returning a [`TreeResult`] fails
/// with [`TreeError::Closed`]; [`size`](EnvelopeIndex::size) keeps reporting
/// the final count.
pub struct SharedRTree<S: NodeStore = MemoryNodeStore> {
    inner: Arc<SharedRTreeInner<S>>,
}

struct SharedRTreeInner<S: NodeStore> {
    tree: RwLock<RTree<S>>,
    /// Is the tree closed?
    closed: RwLock<bool>,
}

impl<S: NodeStore> Clone for SharedRTree<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: NodeStore> SharedRTree<S> {
    pub fn new(tree: RTree<S>) -> Self {
        Self {
            inner: Arc::new(SharedRTreeInner {
                tree: RwLock::new(tree),
                closed: RwLock::new(false),
            }),
        }
    }

    pub fn is_closed(&self) -> bool {
        *self.inner.closed.read()
    }

    /// Runs `f` with shared access to the tree.
    pub fn read<R, F>(&self, f: F) -> TreeResult<R>
    where
        F: FnOnce(&RTree<S>) -> TreeResult<R>,
    {
        let closed = self.inner.closed.read();
        if *closed {
            return Err(TreeError::Closed);
        }
        let tree = self.inner.tree.read();
        f(&*tree)
    }

    /// Runs `f` with exclusive access to the tree.
    pub fn write<R, F>(&self, f: F) -> TreeResult<R>
    where
        F: FnOnce(&mut RTree<S>) -> TreeResult<R>,
    {
        let closed = self.inner.closed.read();
        if *closed {
            return Err(TreeError::Closed);
        }
        let mut tree = self.inner.tree.write();
        f(&mut *tree)
    }

    pub fn height(&self) -> TreeResult<u32> {
        self.read(|tree| Ok(tree.height()))
    }

    pub fn check_boundaries(&self) -> TreeResult<bool> {
        self.read(|tree| Ok(tree.check_boundaries()))
    }

    pub fn validate(&self) -> TreeResult<ValidationReport> {
        self.read(|tree| Ok(tree.validate()))
    }

    pub fn rebuild(&self) -> TreeResult<()> {
        self.write(|tree| tree.rebuild())
    }
}

impl<S: NodeStore + Send + Sync> EnvelopeIndex for SharedRTree<S> {
    fn add(&self, key: &Envelope, id: EntryId) -> TreeResult<()> {
        self.write(|tree| tree.insert(key.clone(), id))
    }

    fn remove(&self, key: &Envelope, id: EntryId) -> TreeResult<bool> {
        self.write(|tree| tree.delete(key, id))
    }

    fn find_intersecting_keys(&self, key: &Envelope) -> TreeResult<Vec<EntryId>> {
        self.read(|tree| tree.search(key))
    }

    fn find_contained_keys(&self, key: &Envelope) -> TreeResult<Vec<EntryId>> {
        self.read(|tree| tree.search_contained(key))
    }

    fn size(&self) -> u64 {
        self.inner.tree.read().len()
    }

    fn clear(&self) -> TreeResult<()> {
        self.write(|tree| tree.clear())
    }

    fn close(&self) -> TreeResult<()> {
        let mut closed = self.inner.closed.write();
        if *closed {
            return Ok(());
        }
        self.inner.tree.write().flush()?;
        *closed = true;
        debug!("Shared tree closed");
        Ok(())
    }
}
