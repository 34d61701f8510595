//! Range search: the lazy query iterator and the strict searches.

use std::collections::VecDeque;
use std::fmt;

use log::warn;

use super::RTree;
use crate::envelope::Envelope;
use crate::errors::{TreeError, TreeResult};
use crate::node::{Entry, EntryId, NodeContent, NodeId};
use crate::storage::NodeStore;

type UnreadableHook<'a> = Box<dyn FnMut(NodeId, &TreeError) + 'a>;

/// Lazy depth-first iterator over the ids of entries intersecting a query
/// box (borders included).
///
/// Nodes are read one at a time as the iteration reaches them. A node that
/// cannot be read is skipped with its whole subtree: the failure goes to the
/// `on_unreadable` hook (by default a `warn!` log line), [`skipped`] counts
/// it, and iteration goes on. Use [`RTree::search`] to have such failures
/// returned as errors instead.
///
/// [`skipped`]: QueryIter::skipped
pub struct QueryIter<'a, S: NodeStore> {
    tree: &'a RTree<S>,
    query: Envelope,
    stack: Vec<NodeId>,
    hits: VecDeque<EntryId>,
    skipped: usize,
    on_unreadable: UnreadableHook<'a>,
}

impl<'a, S: NodeStore> QueryIter<'a, S> {
    fn new(tree: &'a RTree<S>, query: Envelope) -> Self {
        Self {
            tree,
            query,
            stack: vec![tree.root_id()],
            hits: VecDeque::new(),
            skipped: 0,
            on_unreadable: Box::new(|node, err| {
                warn!("Skipping unreadable node {} during query: {}", node, err)
            }),
        }
    }

    /// Replaces the hook called for every node that cannot be read.
    pub fn on_unreadable<F>(mut self, hook: F) -> Self
    where
        F: FnMut(NodeId, &TreeError) + 'a,
    {
        self.on_unreadable = Box::new(hook);
        self
    }

    /// Nodes skipped so far because they could not be read.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn query(&self) -> &Envelope {
        &self.query
    }

    /// Restarts the iteration from the root.
    pub fn rewind(&mut self) {
        self.stack.clear();
        self.stack.push(self.tree.root_id());
        self.hits.clear();
        self.skipped = 0;
    }
}

impl<S: NodeStore> Iterator for QueryIter<'_, S> {
    type Item = EntryId;

    fn next(&mut self) -> Option<EntryId> {
        loop {
            if let Some(id) = self.hits.pop_front() {
                return Some(id);
            }
            let node_id = self.stack.pop()?;
            let node = match self.tree.store.read(node_id) {
                Ok(node) => node,
                Err(err) => {
                    self.skipped += 1;
                    (self.on_unreadable)(node_id, &err);
                    continue;
                }
            };
            match node.content() {
                NodeContent::Leaf(entries) => self.hits.extend(
                    entries
                        .iter()
                        .filter(|e| e.envelope.intersects(&self.query))
                        .map(|e| e.id),
                ),
                // reversed so the leftmost child is visited first
                NodeContent::Branch(children) => self.stack.extend(
                    children
                        .iter()
                        .rev()
                        .filter(|c| c.envelope.intersects(&self.query))
                        .map(|c| c.node),
                ),
            }
        }
    }
}

impl<S: NodeStore> fmt::Debug for QueryIter<'_, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryIter")
            .field("query", &self.query)
            .field("pending_nodes", &self.stack.len())
            .field("buffered_hits", &self.hits.len())
            .field("skipped", &self.skipped)
            .finish()
    }
}

impl<S: NodeStore> RTree<S> {
    /// Lazily iterates the ids of entries intersecting `envelope`, borders
    /// included.
    pub fn query(&self, envelope: &Envelope) -> TreeResult<QueryIter<'_, S>> {
        self.check_envelope(envelope)?;
        Ok(QueryIter::new(self, envelope.clone()))
    }

    /// Ids of entries intersecting `envelope`. Unlike [`RTree::query`], any
    /// node that cannot be read fails the whole search.
    pub fn search(&self, envelope: &Envelope) -> TreeResult<Vec<EntryId>> {
        self.check_envelope(envelope)?;
        let mut results = Vec::new();
        self.visit(
            |bounds| bounds.intersects(envelope),
            |entry| {
                if entry.envelope.intersects(envelope) {
                    results.push(entry.id);
                }
            },
        )?;
        Ok(results)
    }

    /// Ids of entries lying entirely inside `envelope`.
    pub fn search_contained(&self, envelope: &Envelope) -> TreeResult<Vec<EntryId>> {
        self.check_envelope(envelope)?;
        let mut results = Vec::new();
        self.visit(
            |bounds| bounds.intersects(envelope),
            |entry| {
                if envelope.contains(&entry.envelope) {
                    results.push(entry.id);
                }
            },
        )?;
        Ok(results)
    }

    /// Every entry of the tree.
    pub fn entries(&self) -> TreeResult<Vec<Entry>> {
        let mut results = Vec::with_capacity(self.len() as usize);
        self.visit(|_| true, |entry| results.push(entry.clone()))?;
        Ok(results)
    }

    /// Depth-first walk descending into children accepted by `descend` and
    /// handing every leaf entry to `visit_entry`.
    fn visit<D, V>(&self, descend: D, mut visit_entry: V) -> TreeResult<()>
    where
        D: Fn(&Envelope) -> bool,
        V: FnMut(&Entry),
    {
        let mut stack = vec![self.root_id()];
        while let Some(node_id) = stack.pop() {
            let node = self.store.read(node_id)?;
            match node.content() {
                NodeContent::Leaf(entries) => entries.iter().for_each(&mut visit_entry),
                NodeContent::Branch(children) => stack.extend(
                    children
                        .iter()
                        .rev()
                        .filter(|c| descend(&c.envelope))
                        .map(|c| c.node),
                ),
            }
        }
        Ok(())
    }
}
