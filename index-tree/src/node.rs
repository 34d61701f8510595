//! Node and entry types of the tree.
//!
//! A node is either a leaf holding [`Entry`] values or a branch holding
//! [`ChildRef`] values. Nodes live in a [`NodeStore`](crate::storage::NodeStore)
//! and refer to each other by [`NodeId`] only: the store owns every node, a
//! branch names its children and a child names its parent. No node owns another.

use serde::{Deserialize, Serialize};

use crate::envelope::Envelope;

/// Identifier of a node inside its store
pub type NodeId = u64;

/// Opaque identifier carried by an entry
pub type EntryId = u64;

/// An indexed envelope and the identifier it was inserted with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub envelope: Envelope,
    pub id: EntryId,
}

impl Entry {
    pub fn new(envelope: Envelope, id: EntryId) -> Self {
        Self { envelope, id }
    }
}

/// A branch's reference to one child, with the child's bounds cached so
/// subtree selection and pruning need not load the child.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildRef {
    pub envelope: Envelope,
    pub node: NodeId,
}

/// What a node holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeContent {
    Leaf(Vec<Entry>),
    Branch(Vec<ChildRef>),
}

/// A node of the tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    id: NodeId,
    parent: Option<NodeId>,
    /// Height above the leaves (leaves are 0)
    level: u32,
    /// Union of the content, `None` while the node is empty
    envelope: Option<Envelope>,
    content: NodeContent,
}

impl Node {
    pub fn new(
        id: NodeId,
        parent: Option<NodeId>,
        level: u32,
        envelope: Option<Envelope>,
        content: NodeContent,
    ) -> Self {
        Self {
            id,
            parent,
            level,
            envelope,
            content,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn set_parent(&mut self, parent: Option<NodeId>) {
        self.parent = parent;
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn envelope(&self) -> Option<&Envelope> {
        self.envelope.as_ref()
    }

    pub fn content(&self) -> &NodeContent {
        &self.content
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self.content, NodeContent::Leaf(_))
    }

    pub fn len(&self) -> usize {
        match &self.content {
            NodeContent::Leaf(entries) => entries.len(),
            NodeContent::Branch(children) => children.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entries of a leaf; empty for a branch.
    pub fn entries(&self) -> &[Entry] {
        match &self.content {
            NodeContent::Leaf(entries) => entries,
            NodeContent::Branch(_) => &[],
        }
    }

    /// Child references of a branch; empty for a leaf.
    pub fn children(&self) -> &[ChildRef] {
        match &self.content {
            NodeContent::Leaf(_) => &[],
            NodeContent::Branch(children) => children,
        }
    }

    /// Envelopes of the content, in order.
    pub fn item_envelopes(&self) -> Vec<&Envelope> {
        match &self.content {
            NodeContent::Leaf(entries) => entries.iter().map(|e| &e.envelope).collect(),
            NodeContent::Branch(children) => children.iter().map(|c| &c.envelope).collect(),
        }
    }

    /// Union of the content, ignoring the stored envelope.
    pub fn compute_envelope(&self) -> Option<Envelope> {
        Envelope::union_all(self.item_envelopes())
    }

    /// Re-derives the stored envelope from the content.
    pub fn refresh_envelope(&mut self) {
        self.envelope = self.compute_envelope();
    }

    pub fn child_index(&self, child: NodeId) -> Option<usize> {
        self.children().iter().position(|c| c.node == child)
    }

    /// Updates the cached envelope of `child`. Returns false when `child` is
    /// not referenced here or the cached envelope was already equal.
    pub(crate) fn update_child_envelope(&mut self, child: NodeId, envelope: Envelope) -> bool {
        let Some(index) = self.child_index(child) else {
            return false;
        };
        if let NodeContent::Branch(children) = &mut self.content {
            if children[index].envelope != envelope {
                children[index].envelope = envelope;
                return true;
            }
        }
        false
    }

    pub(crate) fn remove_child(&mut self, child: NodeId) -> Option<ChildRef> {
        let index = self.child_index(child)?;
        match &mut self.content {
            NodeContent::Branch(children) => Some(children.remove(index)),
            NodeContent::Leaf(_) => None,
        }
    }

    pub(crate) fn remove_entry(&mut self, envelope: &Envelope, id: EntryId) -> Option<Entry> {
        if let NodeContent::Leaf(entries) = &mut self.content {
            let index = entries
                .iter()
                .position(|e| e.id == id && e.envelope == *envelope)?;
            return Some(entries.remove(index));
        }
        None
    }

    /// Appends an item and grows the envelope to cover it. The item kind must
    /// match the node kind.
    pub(crate) fn push_item(&mut self, item: Item) {
        self.grow(item.envelope());
        match (&mut self.content, item) {
            (NodeContent::Leaf(entries), Item::Entry(entry)) => entries.push(entry),
            (NodeContent::Branch(children), Item::Child(child)) => children.push(child),
            _ => debug_assert!(false, "item kind does not match node {}", self.id),
        }
    }

    /// Takes the content out as items, leaving the node empty.
    pub(crate) fn take_items(&mut self) -> Vec<Item> {
        self.envelope = None;
        match &mut self.content {
            NodeContent::Leaf(entries) => std::mem::take(entries).into_iter().map(Item::Entry).collect(),
            NodeContent::Branch(children) => {
                std::mem::take(children).into_iter().map(Item::Child).collect()
            }
        }
    }

    /// Replaces the content with `items` and re-derives the envelope.
    pub(crate) fn set_items(&mut self, items: Vec<Item>) {
        self.content = NodeContent::from_items(self.level, items);
        self.refresh_envelope();
    }

    pub(crate) fn set_content(&mut self, level: u32, content: NodeContent) {
        self.level = level;
        self.content = content;
        self.refresh_envelope();
    }

    fn grow(&mut self, envelope: &Envelope) {
        match &mut self.envelope {
            Some(current) => current.expand(envelope),
            None => self.envelope = Some(envelope.clone()),
        }
    }
}

impl NodeContent {
    /// Builds leaf content for level 0 and branch content above it. Items of
    /// the wrong kind are dropped.
    pub(crate) fn from_items(level: u32, items: Vec<Item>) -> NodeContent {
        if level == 0 {
            NodeContent::Leaf(items.into_iter().filter_map(Item::into_entry).collect())
        } else {
            NodeContent::Branch(items.into_iter().filter_map(Item::into_child).collect())
        }
    }
}

/// Something a node can hold: an entry (in a leaf) or a child (in a branch).
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Item {
    Entry(Entry),
    Child(ChildRef),
}

impl Item {
    pub(crate) fn envelope(&self) -> &Envelope {
        match self {
            Item::Entry(e) => &e.envelope,
            Item::Child(c) => &c.envelope,
        }
    }

    fn into_entry(self) -> Option<Entry> {
        match self {
            Item::Entry(e) => Some(e),
            Item::Child(_) => None,
        }
    }

    fn into_child(self) -> Option<ChildRef> {
        match self {
            Item::Child(c) => Some(c),
            Item::Entry(_) => None,
        }
    }
}
