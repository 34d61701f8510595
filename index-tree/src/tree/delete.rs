//! Deletion with condense and tree shortening.

use log::debug;

use super::insert::ReinsertGuard;
use super::RTree;
use crate::envelope::Envelope;
use crate::errors::TreeResult;
use crate::node::{Entry, EntryId, Item, Node, NodeContent, NodeId};
use crate::storage::NodeStore;

impl<S: NodeStore> RTree<S> {
    /// Removes one entry with exactly this envelope and id.
    ///
    /// Returns false when no such entry exists. Nodes left with fewer than
    /// the minimum fill are dissolved and their entries inserted again.
    pub fn delete(&mut self, envelope: &Envelope, id: EntryId) -> TreeResult<bool> {
        self.check_envelope(envelope)?;
        let Some(mut leaf) = self.find_leaf(envelope, id)? else {
            return Ok(false);
        };
        leaf.remove_entry(envelope, id);
        leaf.refresh_envelope();

        let orphans = self.condense(leaf)?;
        self.shorten()?;
        self.update_meta(|meta| meta.entry_count = meta.entry_count.saturating_sub(1))?;

        if !orphans.is_empty() {
            debug!("Reinserting {} orphaned entries", orphans.len());
        }
        for entry in orphans {
            let mut guard = ReinsertGuard::new();
            self.insert_item(Item::Entry(entry), 0, &mut guard)?;
        }
        Ok(true)
    }

    /// Finds the leaf holding the entry, descending only into children whose
    /// bounds contain `envelope`.
    fn find_leaf(&self, envelope: &Envelope, id: EntryId) -> TreeResult<Option<Node>> {
        let mut stack = vec![self.root_id()];
        while let Some(node_id) = stack.pop() {
            let node = self.store.read(node_id)?;
            match node.content() {
                NodeContent::Leaf(entries) => {
                    if entries.iter().any(|e| e.id == id && e.envelope == *envelope) {
                        return Ok(Some(node));
                    }
                }
                NodeContent::Branch(children) => stack.extend(
                    children
                        .iter()
                        .filter(|c| c.envelope.contains(envelope))
                        .map(|c| c.node),
                ),
            }
        }
        Ok(None)
    }

    /// Walks from a modified node to the root. Underfull non-root nodes are
    /// detached and freed with their subtree; the entries they held are
    /// returned for reinsertion.
    fn condense(&mut self, node: Node) -> TreeResult<Vec<Entry>> {
        let mut orphans = Vec::new();
        let mut node = node;
        while let Some(parent_id) = node.parent() {
            let mut parent = self.store.read(parent_id)?;
            if node.len() < self.config.min_elements() {
                parent.remove_child(node.id());
                debug!(
                    "Dissolving underfull node {} at level {} ({} items)",
                    node.id(),
                    node.level(),
                    node.len()
                );
                self.dissolve(node, &mut orphans)?;
            } else {
                if let Some(envelope) = node.envelope() {
                    parent.update_child_envelope(node.id(), envelope.clone());
                }
                self.store.write(node)?;
            }
            parent.refresh_envelope();
            node = parent;
        }
        self.store.write(node)?;
        Ok(orphans)
    }

    /// Frees `node` and everything below it, collecting the entries.
    fn dissolve(&mut self, node: Node, orphans: &mut Vec<Entry>) -> TreeResult<()> {
        let mut pending = vec![node];
        while let Some(node) = pending.pop() {
            match node.content() {
                NodeContent::Leaf(entries) => orphans.extend(entries.iter().cloned()),
                NodeContent::Branch(children) => {
                    for child in children {
                        pending.push(self.store.read(child.node)?);
                    }
                }
            }
            self.store.free(node.id())?;
        }
        Ok(())
    }

    /// Collapses single-child branch roots and turns an empty branch root
    /// back into a leaf.
    fn shorten(&mut self) -> TreeResult<()> {
        loop {
            let mut root = self.root()?;
            if root.is_leaf() {
                return Ok(());
            }
            let children: Vec<NodeId> = root.children().iter().map(|c| c.node).collect();
            match children.as_slice() {
                [] => {
                    root.set_content(0, NodeContent::Leaf(Vec::new()));
                    self.store.write(root)?;
                    return self.update_meta(|meta| meta.height = 1);
                }
                &[child_id] => {
                    let mut child = self.store.read(child_id)?;
                    child.set_parent(None);
                    self.store.write(child)?;
                    self.store.free(root.id())?;
                    self.update_meta(|meta| {
                        meta.root = Some(child_id);
                        meta.height = meta.height.saturating_sub(1);
                    })?;
                    debug!("Root collapsed into node {}", child_id);
                }
                _ => return Ok(()),
            }
        }
    }
}
