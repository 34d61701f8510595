//! Structural checks. Violations are reported, never repaired.

use log::warn;

use super::RTree;
use crate::errors::TreeResult;
use crate::node::{Node, NodeContent, NodeId};
use crate::storage::NodeStore;

/// Findings of [`RTree::validate`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationReport {
    pub nodes_checked: u64,
    pub entries_found: u64,
    /// Nodes whose bounds differ from the union of their content, or whose
    /// cached bounds in the parent differ from their own
    pub boundary_violations: Vec<NodeId>,
    /// Non-root nodes holding fewer than `m` items, or any node holding more
    /// than `M`
    pub fill_violations: Vec<NodeId>,
    /// Nodes at the wrong level, leaves not at level 0, or a root whose
    /// level disagrees with the height
    pub level_violations: Vec<NodeId>,
    /// Nodes whose parent id does not name the branch referencing them
    pub parent_violations: Vec<NodeId>,
    /// Nodes that could not be read
    pub unreadable: Vec<NodeId>,
    /// `(recorded, found)` when the stored entry count is wrong
    pub entry_count_mismatch: Option<(u64, u64)>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.boundary_violations.is_empty()
            && self.fill_violations.is_empty()
            && self.level_violations.is_empty()
            && self.parent_violations.is_empty()
            && self.unreadable.is_empty()
            && self.entry_count_mismatch.is_none()
    }
}

impl<S: NodeStore> RTree<S> {
    /// True when every node's bounds are exactly the union of its content
    /// and every cached child bound equals the child's own bounds.
    ///
    /// An unreadable node makes the check fail.
    pub fn check_boundaries(&self) -> bool {
        let mut stack = vec![self.root_id()];
        while let Some(node_id) = stack.pop() {
            let node = match self.store.read(node_id) {
                Ok(node) => node,
                Err(err) => {
                    warn!("Boundary check cannot read node {}: {}", node_id, err);
                    return false;
                }
            };
            if node.envelope().cloned() != node.compute_envelope() {
                return false;
            }
            for child in node.children() {
                match self.store.read(child.node) {
                    Ok(c) if c.envelope() == Some(&child.envelope) => stack.push(child.node),
                    Ok(_) => return false,
                    Err(err) => {
                        warn!("Boundary check cannot read node {}: {}", child.node, err);
                        return false;
                    }
                }
            }
        }
        true
    }

    /// Checks bounds, fill factors, levels, parent links and the entry count.
    pub fn validate(&self) -> ValidationReport {
        let mut report = ValidationReport::default();
        let max = self.config.max_elements();
        let min = self.config.min_elements();
        let root_id = self.root_id();

        // (node, expected parent, expected level)
        let mut stack: Vec<(NodeId, Option<NodeId>, Option<u32>)> = vec![(root_id, None, None)];
        while let Some((node_id, parent, level)) = stack.pop() {
            let node = match self.store.read(node_id) {
                Ok(node) => node,
                Err(_) => {
                    report.unreadable.push(node_id);
                    continue;
                }
            };
            report.nodes_checked += 1;

            if node.envelope().cloned() != node.compute_envelope() {
                report.boundary_violations.push(node_id);
            }
            if node.len() > max || (node_id != root_id && node.len() < min) {
                report.fill_violations.push(node_id);
            }
            if node.parent() != parent {
                report.parent_violations.push(node_id);
            }
            let expected_level = level.unwrap_or_else(|| self.height().saturating_sub(1));
            if node.level() != expected_level || node.is_leaf() != (node.level() == 0) {
                report.level_violations.push(node_id);
            }

            match node.content() {
                NodeContent::Leaf(entries) => report.entries_found += entries.len() as u64,
                NodeContent::Branch(children) => {
                    for child in children {
                        if let Ok(c) = self.store.read(child.node) {
                            if c.envelope() != Some(&child.envelope) {
                                report.boundary_violations.push(child.node);
                            }
                        }
                        stack.push((
                            child.node,
                            Some(node_id),
                            Some(node.level().saturating_sub(1)),
                        ));
                    }
                }
            }
        }

        let recorded = self.len();
        if recorded != report.entries_found {
            report.entry_count_mismatch = Some((recorded, report.entries_found));
        }
        if !report.is_valid() {
            warn!("Tree validation found problems: {:?}", report);
        }
        report
    }

    /// Every node reachable from the root, root first.
    pub fn nodes(&self) -> TreeResult<Vec<Node>> {
        let mut nodes = Vec::new();
        let mut stack = vec![self.root_id()];
        while let Some(node_id) = stack.pop() {
            let node = self.store.read(node_id)?;
            stack.extend(node.children().iter().rev().map(|c| c.node));
            nodes.push(node);
        }
        Ok(nodes)
    }
}
