//! Node creation hook.

use crate::envelope::Envelope;
use crate::node::{Node, NodeContent, NodeId};

/// Builds the nodes of a tree.
///
/// The tree allocates an id in its store, computes the bounds and content and
/// then asks the factory for the node. Every node the tree creates (the
/// initial root, split siblings, new roots, packed levels) goes through here.
pub trait NodeFactory: Send + Sync {
    fn create_node(
        &self,
        id: NodeId,
        parent: Option<NodeId>,
        level: u32,
        envelope: Option<Envelope>,
        content: NodeContent,
    ) -> Node;
}

/// Factory producing plain [`Node`] values.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultNodeFactory;

impl NodeFactory for DefaultNodeFactory {
    fn create_node(
        &self,
        id: NodeId,
        parent: Option<NodeId>,
        level: u32,
        envelope: Option<Envelope>,
        content: NodeContent,
    ) -> Node {
        Node::new(id, parent, level, envelope, content)
    }
}
