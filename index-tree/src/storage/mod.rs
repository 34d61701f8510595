//! Pluggable node storage.
//!
//! The tree algorithms only talk to a [`NodeStore`]: allocate an id, read,
//! write and free nodes by id, and keep the tree metadata (root, height,
//! entry count). Two backends are provided:
//! - [`MemoryNodeStore`]: an arena of nodes indexed by id
//! - [`FileNodeStore`]: one fixed-size page per node in a file, with an LRU
//!   page cache and CRC32-checked records

use serde::{Deserialize, Serialize};

use crate::config::TreeConfig;
use crate::errors::TreeResult;
use crate::node::{Node, NodeId};

mod cache;
pub mod file;
pub mod memory;

pub use file::{FileNodeStore, IntegrityReport, StoreStats};
pub use memory::MemoryNodeStore;

/// Tree-level bookkeeping persisted alongside the nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TreeMeta {
    pub root: Option<NodeId>,
    /// Number of levels, 1 for a tree that is a single leaf
    pub height: u32,
    pub entry_count: u64,
}

/// Backing store for the nodes of one tree.
pub trait NodeStore {
    /// Reserves an id for a node that will be written next.
    fn allocate(&mut self) -> TreeResult<NodeId>;

    /// Reads a node. Fails with `StoreIndex` when `id` is unknown or its
    /// record is unreadable.
    fn read(&self, id: NodeId) -> TreeResult<Node>;

    /// Stores a node under its own id, which must have been allocated.
    fn write(&mut self, node: Node) -> TreeResult<()>;

    /// Releases an id for reuse.
    fn free(&mut self, id: NodeId) -> TreeResult<()>;

    fn meta(&self) -> TreeMeta;

    fn set_meta(&mut self, meta: TreeMeta) -> TreeResult<()>;

    /// Number of live (allocated and not freed) nodes.
    fn node_count(&self) -> u64;

    /// Makes every pending change durable. A no-op in memory.
    fn flush(&mut self) -> TreeResult<()>;

    /// Drops every node and resets the metadata.
    fn clear(&mut self) -> TreeResult<()>;

    /// Configuration the store was created for, when it persists one.
    fn config(&self) -> Option<&TreeConfig> {
        None
    }
}
