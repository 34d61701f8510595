//! In-memory node arena.

use super::{NodeStore, TreeMeta};
use crate::errors::{TreeError, TreeResult};
use crate::node::{Node, NodeId};

#[derive(Debug, Clone)]
enum Slot {
    Free,
    Reserved,
    Occupied(Node),
}

/// Arena of nodes addressed by their index.
///
/// Freed slots are recycled through a free list. Reading a freed or
/// never-written id reports a missing node; otherwise this store cannot fail.
#[derive(Debug, Default)]
pub struct MemoryNodeStore {
    slots: Vec<Slot>,
    free_ids: Vec<NodeId>,
    meta: TreeMeta,
    live: u64,
}

impl MemoryNodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, id: NodeId) -> Option<&Slot> {
        self.slots.get(usize::try_from(id).ok()?)
    }
}

impl NodeStore for MemoryNodeStore {
    fn allocate(&mut self) -> TreeResult<NodeId> {
        self.live += 1;
        if let Some(id) = self.free_ids.pop() {
            self.slots[id as usize] = Slot::Reserved;
            return Ok(id);
        }
        self.slots.push(Slot::Reserved);
        Ok((self.slots.len() - 1) as NodeId)
    }

    fn read(&self, id: NodeId) -> TreeResult<Node> {
        match self.slot(id) {
            Some(Slot::Occupied(node)) => Ok(node.clone()),
            Some(Slot::Reserved) => Err(TreeError::store(format!("node {} was never written", id))),
            Some(Slot::Free) | None => Err(TreeError::store(format!("missing node {}", id))),
        }
    }

    fn write(&mut self, node: Node) -> TreeResult<()> {
        let id = node.id();
        match self.slots.get_mut(id as usize) {
            Some(slot) if !matches!(slot, Slot::Free) => {
                *slot = Slot::Occupied(node);
                Ok(())
            }
            _ => Err(TreeError::store(format!("node {} is not allocated", id))),
        }
    }

    fn free(&mut self, id: NodeId) -> TreeResult<()> {
        match self.slots.get_mut(id as usize) {
            Some(slot) if !matches!(slot, Slot::Free) => {
                *slot = Slot::Free;
                self.free_ids.push(id);
                self.live -= 1;
                Ok(())
            }
            _ => Err(TreeError::store(format!("node {} is not allocated", id))),
        }
    }

    fn meta(&self) -> TreeMeta {
        self.meta
    }

    fn set_meta(&mut self, meta: TreeMeta) -> TreeResult<()> {
        self.meta = meta;
        Ok(())
    }

    fn node_count(&self) -> u64 {
        self.live
    }

    fn flush(&mut self) -> TreeResult<()> {
        Ok(())
    }

    fn clear(&mut self) -> TreeResult<()> {
        self.slots.clear();
        self.free_ids.clear();
        self.meta = TreeMeta::default();
        self.live = 0;
        Ok(())
    }
}
