//! # Index Tree - R-Tree family over N-dimensional envelopes
//!
//! This crate indexes axis-aligned boxes ([`Envelope`]) tagged with opaque
//! `u64` identifiers and answers range queries over them.
//!
//! ## Features
//!
//! - **Split Strategies**: Guttman's Linear and Quadratic splits, the R*-tree
//!   (overlap-aware subtree choice, forced reinsertion, topological split)
//! - **Hilbert Packing**: bulk loading by Hilbert order of entry centers
//! - **Pluggable Storage**: in-memory arena or paged file with an LRU cache
//!   and CRC32-checked pages
//! - **Lazy Queries**: depth-first iterator that skips and reports unreadable
//!   nodes instead of failing
//! - **Validation**: boundary, fill, level and parent-link checks
//! - **Thread Safe Facade**: [`SharedRTree`] for many readers and one writer
//!
//! ## Quick Start
//!
//! ```rust
//! use index_tree::{Envelope, RTree, SplitStrategy, TreeConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = TreeConfig::new(8, 2).with_strategy(SplitStrategy::RStar);
//! let mut tree = RTree::new(config)?;
//!
//! tree.insert(Envelope::rect(0.0, 0.0, 10.0, 10.0)?, 1)?;
//! tree.insert(Envelope::rect(20.0, 20.0, 30.0, 30.0)?, 2)?;
//!
//! let hits: Vec<u64> = tree.query(&Envelope::rect(5.0, 5.0, 15.0, 15.0)?)?.collect();
//! assert_eq!(hits, vec![1]);
//! # Ok(())
//! # }
//! ```
//!
//! ## File-Backed Trees
//!
//! ```rust,no_run
//! use index_tree::{Envelope, RTree, TreeConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut tree = RTree::create_file("places.idx", TreeConfig::new(32, 2))?;
//! tree.insert(Envelope::point(&[4.35, 50.85])?, 42)?;
//! tree.flush()?;
//! drop(tree);
//!
//! let tree = RTree::open_file("places.idx")?;
//! assert_eq!(tree.len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod envelope;
pub mod errors;
pub mod factory;
pub mod hilbert;
pub mod node;
pub mod shared;
pub mod split;
pub mod storage;
pub mod tiles;
pub mod tree;

pub use config::TreeConfig;
pub use envelope::Envelope;
pub use errors::{TreeError, TreeResult};
pub use factory::{DefaultNodeFactory, NodeFactory};
pub use node::{ChildRef, Entry, EntryId, Node, NodeContent, NodeId};
pub use shared::{EnvelopeIndex, SharedRTree};
pub use split::SplitStrategy;
pub use storage::{
    FileNodeStore, IntegrityReport, MemoryNodeStore, NodeStore, StoreStats, TreeMeta,
};
pub use tiles::{GridTileIterator, TileGrid, TileLevel, TilePosition};
pub use tree::{QueryIter, RTree, ValidationReport};
