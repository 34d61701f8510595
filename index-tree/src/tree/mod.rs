//! The R-Tree.
//!
//! [`RTree`] ties a [`TreeConfig`], a [`NodeStore`] and a [`NodeFactory`]
//! together. The algorithms are split by concern:
//! - `insert`: ChooseSubtree, overflow handling (split or R* reinsertion)
//! - `delete`: exact-match removal, condense and tree shortening
//! - `search`: the lazy [`QueryIter`] and the strict collecting searches
//! - `pack`: Hilbert bulk loading and rebuild
//! - `validate`: boundary and structure checks

use std::path::Path;

use log::debug;

use crate::config::TreeConfig;
use crate::envelope::Envelope;
use crate::errors::{TreeError, TreeResult};
use crate::factory::{DefaultNodeFactory, NodeFactory};
use crate::node::{ChildRef, Node, NodeContent, NodeId};
use crate::storage::{FileNodeStore, MemoryNodeStore, NodeStore, TreeMeta};

mod delete;
mod insert;
mod pack;
mod search;
mod validate;

pub use search::QueryIter;
pub use validate::ValidationReport;

/// An R-Tree over N-dimensional envelopes.
///
/// Mutations take `&mut self` and queries take `&self`, so a live
/// [`QueryIter`] keeps the tree from being modified. Wrap the tree in a
/// [`SharedRTree`](crate::SharedRTree) to share it between threads.
///
/// # Examples
///
/// ```rust
/// use index_tree::{Envelope, RTree, SplitStrategy, TreeConfig};
///
/// let config = TreeConfig::new(4, 2).with_strategy(SplitStrategy::RStar);
/// let mut tree = RTree::new(config).unwrap();
///
/// tree.insert(Envelope::rect(0.0, 0.0, 1.0, 1.0).unwrap(), 1).unwrap();
/// tree.insert(Envelope::rect(2.0, 2.0, 3.0, 3.0).unwrap(), 2).unwrap();
///
/// let query = Envelope::rect(0.5, 0.5, 2.0, 2.0).unwrap();
/// let mut hits: Vec<u64> = tree.query(&query).unwrap().collect();
/// hits.sort();
/// assert_eq!(hits, vec![1, 2]);
/// ```
pub struct RTree<S: NodeStore = MemoryNodeStore> {
    config: TreeConfig,
    store: S,
    factory: Box<dyn NodeFactory>,
}

impl RTree<MemoryNodeStore> {
    /// Creates an empty tree held in memory.
    pub fn new(config: TreeConfig) -> TreeResult<Self> {
        RTree::with_store(config, MemoryNodeStore::new())
    }
}

impl RTree<FileNodeStore> {
    /// Creates an empty tree in a new file, replacing any existing one.
    pub fn create_file(path: impl AsRef<Path>, config: TreeConfig) -> TreeResult<Self> {
        let store = FileNodeStore::create(path, &config)?;
        RTree::with_store(config, store)
    }

    /// Opens a tree stored in a file, with the configuration it was
    /// created with.
    pub fn open_file(path: impl AsRef<Path>) -> TreeResult<Self> {
        let store = FileNodeStore::open(path)?;
        let config = store.config().clone();
        RTree::with_store(config, store)
    }
}

impl<S: NodeStore> RTree<S> {
    /// Creates a tree over `store`. An empty store gets a single empty root
    /// leaf; a store already holding a tree is used as is.
    ///
    /// # Errors
    ///
    /// [`TreeError::InvalidArgument`] when `config` is invalid or differs
    /// from the configuration the store was created for.
    pub fn with_store(config: TreeConfig, store: S) -> TreeResult<Self> {
        config.validate()?;
        check_store_config(&config, &store)?;
        let mut tree = RTree {
            config,
            store,
            factory: Box::new(DefaultNodeFactory),
        };
        if tree.store.meta().root.is_none() {
            tree.init_root()?;
        }
        Ok(tree)
    }

    /// Replaces the factory used for every node created from now on.
    pub fn with_factory(mut self, factory: impl NodeFactory + 'static) -> Self {
        self.factory = Box::new(factory);
        self
    }

    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    /// Coordinate reference system tag the tree was configured with.
    pub fn crs(&self) -> Option<&str> {
        self.config.crs()
    }

    /// Number of entries.
    pub fn len(&self) -> u64 {
        self.store.meta().entry_count
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of levels; a tree that is a single leaf has height 1.
    pub fn height(&self) -> u32 {
        self.store.meta().height
    }

    pub fn root_id(&self) -> NodeId {
        self.store.meta().root.unwrap_or_default()
    }

    pub fn root(&self) -> TreeResult<Node> {
        self.node(self.root_id())
    }

    pub fn node(&self, id: NodeId) -> TreeResult<Node> {
        self.store.read(id)
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Removes every entry, leaving a single empty root leaf.
    pub fn clear(&mut self) -> TreeResult<()> {
        self.store.clear()?;
        self.init_root()
    }

    /// Makes all changes durable in the underlying store.
    pub fn flush(&mut self) -> TreeResult<()> {
        self.store.flush()
    }

    fn init_root(&mut self) -> TreeResult<()> {
        let root = self.create_node(None, 0, NodeContent::Leaf(Vec::new()))?;
        let root_id = root.id();
        self.store.write(root)?;
        self.store.set_meta(TreeMeta {
            root: Some(root_id),
            height: 1,
            entry_count: 0,
        })?;
        debug!("Initialized empty root leaf {}", root_id);
        Ok(())
    }

    /// Allocates an id and builds a node through the factory.
    fn create_node(
        &mut self,
        parent: Option<NodeId>,
        level: u32,
        content: NodeContent,
    ) -> TreeResult<Node> {
        let id = self.store.allocate()?;
        Ok(self.build_node(id, parent, level, content))
    }

    fn build_node(
        &self,
        id: NodeId,
        parent: Option<NodeId>,
        level: u32,
        content: NodeContent,
    ) -> Node {
        let envelope = match &content {
            NodeContent::Leaf(entries) => Envelope::union_all(entries.iter().map(|e| &e.envelope)),
            NodeContent::Branch(children) => {
                Envelope::union_all(children.iter().map(|c| &c.envelope))
            }
        };
        self.factory.create_node(id, parent, level, envelope, content)
    }

    /// Points every child referenced by `children` back at `parent`.
    fn adopt_children(&mut self, parent: NodeId, children: &[ChildRef]) -> TreeResult<()> {
        for child in children {
            let mut node = self.store.read(child.node)?;
            if node.parent() != Some(parent) {
                node.set_parent(Some(parent));
                self.store.write(node)?;
            }
        }
        Ok(())
    }

    fn update_meta<F>(&mut self, update: F) -> TreeResult<()>
    where
        F: FnOnce(&mut TreeMeta),
    {
        let mut meta = self.store.meta();
        update(&mut meta);
        self.store.set_meta(meta)
    }

    fn check_envelope(&self, envelope: &Envelope) -> TreeResult<()> {
        if envelope.dimension() != self.config.dimension() {
            return Err(TreeError::invalid(format!(
                "envelope has {} dimensions, tree has {}",
                envelope.dimension(),
                self.config.dimension()
            )));
        }
        Ok(())
    }
}

/// A store persisting its own configuration only accepts trees built with
/// that same configuration.
fn check_store_config<S: NodeStore>(config: &TreeConfig, store: &S) -> TreeResult<()> {
    match store.config() {
        Some(stored) if stored != config => Err(TreeError::invalid(format!(
            "store was created for {:?}, tree configured with {:?}",
            stored, config
        ))),
        _ => Ok(()),
    }
}
