//! Insertion: ChooseSubtree, overflow treatment and upward adjustment.

use log::debug;

use super::RTree;
use crate::envelope::Envelope;
use crate::errors::{TreeError, TreeResult};
use crate::node::{ChildRef, Entry, EntryId, Item, Node, NodeContent};
use crate::split::{choose_subtree, split_groups};
use crate::storage::NodeStore;

/// Levels that already went through R* forced reinsertion during the
/// current top-level insertion.
pub(super) struct ReinsertGuard {
    done: Vec<bool>,
}

impl ReinsertGuard {
    pub(super) fn new() -> Self {
        Self { done: Vec::new() }
    }

    /// Marks `level` and returns true when it had not been marked yet.
    fn claim(&mut self, level: u32) -> bool {
        let index = level as usize;
        if self.done.len() <= index {
            self.done.resize(index + 1, false);
        }
        !std::mem::replace(&mut self.done[index], true)
    }
}

impl<S: NodeStore> RTree<S> {
    /// Inserts an entry.
    ///
    /// The same envelope and id may be inserted more than once; each insert
    /// adds a separate entry.
    ///
    /// # Errors
    ///
    /// [`TreeError::InvalidArgument`](crate::TreeError::InvalidArgument) when
    /// the envelope dimension differs from the tree's, or any store failure.
    pub fn insert(&mut self, envelope: Envelope, id: EntryId) -> TreeResult<()> {
        self.check_envelope(&envelope)?;
        let mut guard = ReinsertGuard::new();
        self.insert_item(Item::Entry(Entry::new(envelope, id)), 0, &mut guard)?;
        self.update_meta(|meta| meta.entry_count += 1)
    }

    /// Places `item` into a node at `level` and restores the tree shape.
    pub(super) fn insert_item(
        &mut self,
        item: Item,
        level: u32,
        guard: &mut ReinsertGuard,
    ) -> TreeResult<()> {
        let mut node = self.choose_node(item.envelope(), level)?;
        if let Item::Child(child) = &item {
            self.adopt_children(node.id(), std::slice::from_ref(child))?;
        }
        node.push_item(item);
        self.settle(node, guard)
    }

    /// Descends from the root to the node at `level` that should receive
    /// `envelope`.
    fn choose_node(&self, envelope: &Envelope, level: u32) -> TreeResult<Node> {
        let by_overlap = self.config.strategy().uses_rstar();
        let mut node = self.root()?;
        while node.level() > level {
            let children = node.children();
            if children.is_empty() {
                break;
            }
            let envelopes: Vec<&Envelope> = children.iter().map(|c| &c.envelope).collect();
            let pick = choose_subtree(
                &envelopes,
                envelope,
                by_overlap && node.level() == 1,
                self.config.overlap_candidates(),
            );
            let next = children[pick].node;
            node = self.store.read(next)?;
        }
        Ok(node)
    }

    /// Writes `node` after a change, treating overflow on the way up.
    fn settle(&mut self, mut node: Node, guard: &mut ReinsertGuard) -> TreeResult<()> {
        loop {
            if node.len() <= self.config.max_elements() {
                self.store.write(node.clone())?;
                return self.adjust_upward(node);
            }

            if self.config.strategy().uses_rstar()
                && node.parent().is_some()
                && guard.claim(node.level())
            {
                return self.reinsert(node, guard);
            }

            let (mut kept, mut sibling) = self.split(node)?;
            match kept.parent() {
                None => {
                    let level = kept.level() + 1;
                    let children = vec![child_ref(&kept)?, child_ref(&sibling)?];
                    let root = self.create_node(None, level, NodeContent::Branch(children))?;
                    kept.set_parent(Some(root.id()));
                    sibling.set_parent(Some(root.id()));
                    let root_id = root.id();
                    self.store.write(kept)?;
                    self.store.write(sibling)?;
                    self.store.write(root)?;
                    self.update_meta(|meta| {
                        meta.root = Some(root_id);
                        meta.height += 1;
                    })?;
                    debug!("Root split, new root {} at level {}", root_id, level);
                    return Ok(());
                }
                Some(parent_id) => {
                    let mut parent = self.store.read(parent_id)?;
                    if let Some(envelope) = kept.envelope() {
                        parent.update_child_envelope(kept.id(), envelope.clone());
                    }
                    parent.push_item(Item::Child(child_ref(&sibling)?));
                    parent.refresh_envelope();
                    self.store.write(kept)?;
                    self.store.write(sibling)?;
                    node = parent;
                }
            }
        }
    }

    /// Splits an overflowing node. Returns the node with its first group and
    /// a new sibling under the same parent with the second; neither is
    /// written yet.
    fn split(&mut self, mut node: Node) -> TreeResult<(Node, Node)> {
        let items = node.take_items();
        let (first, second) = {
            let envelopes: Vec<&Envelope> = items.iter().map(Item::envelope).collect();
            split_groups(
                self.config.strategy(),
                &envelopes,
                self.config.min_elements(),
            )
        };

        let mut slots: Vec<Option<Item>> = items.into_iter().map(Some).collect();
        let mut take = |group: &[usize]| -> Vec<Item> {
            group.iter().filter_map(|&i| slots[i].take()).collect()
        };
        let first_items = take(&first);
        let second_items = take(&second);

        let sibling_id = self.store.allocate()?;
        let content = NodeContent::from_items(node.level(), second_items);
        if let NodeContent::Branch(children) = &content {
            self.adopt_children(sibling_id, children)?;
        }
        let sibling = self.build_node(sibling_id, node.parent(), node.level(), content);
        node.set_items(first_items);

        debug!(
            "Split node {} at level {} into {} + {} items (sibling {})",
            node.id(),
            node.level(),
            node.len(),
            sibling.len(),
            sibling_id
        );
        Ok((node, sibling))
    }

    /// R* forced reinsertion: removes the items farthest from the node's
    /// center and inserts them again at the same level, closest first.
    fn reinsert(&mut self, mut node: Node, guard: &mut ReinsertGuard) -> TreeResult<()> {
        let level = node.level();
        let Some(bounds) = node.compute_envelope() else {
            return self.settle(node, guard);
        };

        let mut items = node.take_items();
        items.sort_by(|a, b| {
            let da = a.envelope().center_distance_sq(&bounds);
            let db = b.envelope().center_distance_sq(&bounds);
            db.total_cmp(&da)
        });
        let count = self.config.reinsert_count().min(items.len());
        let removed: Vec<Item> = items.drain(..count).collect();
        node.set_items(items);

        debug!(
            "Reinserting {} items from node {} at level {}",
            removed.len(),
            node.id(),
            level
        );
        self.store.write(node.clone())?;
        self.adjust_upward(node)?;

        for item in removed.into_iter().rev() {
            self.insert_item(item, level, guard)?;
        }
        Ok(())
    }

    /// Refreshes the cached envelope of `node` in its ancestors, stopping as
    /// soon as an ancestor's cached value is already right.
    pub(super) fn adjust_upward(&mut self, node: Node) -> TreeResult<()> {
        let mut child = node;
        while let Some(parent_id) = child.parent() {
            let Some(envelope) = child.envelope().cloned() else {
                break;
            };
            let mut parent = self.store.read(parent_id)?;
            if !parent.update_child_envelope(child.id(), envelope) {
                break;
            }
            parent.refresh_envelope();
            self.store.write(parent.clone())?;
            child = parent;
        }
        Ok(())
    }
}

/// Reference to a node for its parent. Only nodes holding items have bounds.
pub(super) fn child_ref(node: &Node) -> TreeResult<ChildRef> {
    let envelope = node
        .envelope()
        .cloned()
        .ok_or_else(|| TreeError::store(format!("node {} has no bounds", node.id())))?;
    Ok(ChildRef {
        envelope,
        node: node.id(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TreeConfig;
    use crate::node::NodeId;
    use crate::split::SplitStrategy;
    use crate::storage::TreeMeta;

    fn point(x: f64, y: f64) -> Envelope {
        Envelope::point(&[x, y]).unwrap()
    }

    fn leaf(tree: &mut RTree, points: &[(f64, f64)], first_id: EntryId) -> Node {
        let entries = points
            .iter()
            .zip(first_id..)
            .map(|(&(x, y), id)| Entry::new(point(x, y), id))
            .collect();
        tree.create_node(None, 0, NodeContent::Leaf(entries)).unwrap()
    }

    /// Height 2 tree with exactly two leaves; entry ids start at 0 on the
    /// left and at 100 on the right.
    fn two_leaf_tree(
        strategy: SplitStrategy,
        left: &[(f64, f64)],
        right: &[(f64, f64)],
    ) -> RTree {
        let mut tree = RTree::new(TreeConfig::new(4, 2).with_strategy(strategy)).unwrap();
        tree.store.clear().unwrap();

        let mut left = leaf(&mut tree, left, 0);
        let mut right = leaf(&mut tree, right, 100);
        let refs = vec![child_ref(&left).unwrap(), child_ref(&right).unwrap()];
        let root = tree.create_node(None, 1, NodeContent::Branch(refs)).unwrap();
        left.set_parent(Some(root.id()));
        right.set_parent(Some(root.id()));

        let meta = TreeMeta {
            root: Some(root.id()),
            height: 2,
            entry_count: (left.len() + right.len()) as u64,
        };
        tree.store.write(left).unwrap();
        tree.store.write(right).unwrap();
        tree.store.write(root).unwrap();
        tree.store.set_meta(meta).unwrap();
        assert!(tree.validate().is_valid());
        tree
    }

    fn leaf_sizes(tree: &RTree) -> Vec<usize> {
        let mut sizes: Vec<usize> = tree
            .root()
            .unwrap()
            .children()
            .iter()
            .map(|c| tree.node(c.node).unwrap().len())
            .collect();
        sizes.sort_unstable();
        sizes
    }

    fn leaf_holding(tree: &RTree, id: EntryId) -> NodeId {
        tree.root()
            .unwrap()
            .children()
            .iter()
            .map(|c| tree.node(c.node).unwrap())
            .find(|node| node.entries().iter().any(|e| e.id == id))
            .map(|node| node.id())
            .unwrap()
    }

    // (5, 5) is the entry farthest from the left leaf's center; once it is
    // gone the left leaf shrinks back to [0, 1] and the right leaf is the
    // cheaper home for it.
    const LEFT: [(f64, f64); 4] = [(0.0, 1.0), (1.0, 0.0), (1.0, 1.0), (5.0, 5.0)];

    #[test]
    fn test_rstar_overflow_reinserts_instead_of_splitting() {
        let right = [(7.0, 7.0), (8.0, 8.0)];
        let mut tree = two_leaf_tree(SplitStrategy::RStar, &LEFT, &right);
        assert_eq!(tree.config().reinsert_count(), 1);
        let left_id = leaf_holding(&tree, 0);
        let right_id = leaf_holding(&tree, 100);
        assert_eq!(leaf_holding(&tree, 3), left_id);

        tree.insert(point(0.5, 0.5), 50).unwrap();

        assert_eq!(tree.height(), 2);
        assert_eq!(tree.store().node_count(), 3);
        assert_eq!(leaf_sizes(&tree), vec![3, 4]);
        assert_eq!(leaf_holding(&tree, 50), left_id);
        assert_eq!(leaf_holding(&tree, 3), right_id);
        assert_eq!(
            tree.node(left_id).unwrap().envelope(),
            Some(&Envelope::rect(0.0, 0.0, 1.0, 1.0).unwrap())
        );
        assert_eq!(tree.len(), 7);
        assert!(tree.validate().is_valid());
    }

    #[test]
    fn test_guttman_overflow_splits() {
        let right = [(7.0, 7.0), (8.0, 8.0)];
        let mut tree = two_leaf_tree(SplitStrategy::Quadratic, &LEFT, &right);

        tree.insert(point(0.5, 0.5), 50).unwrap();

        assert_eq!(tree.height(), 2);
        assert_eq!(tree.store().node_count(), 4);
        assert_eq!(leaf_sizes(&tree).len(), 3);
        assert!(tree.validate().is_valid());
    }

    #[test]
    fn test_reinsertion_runs_once_per_level() {
        // The reinserted entry overflows the full right leaf, which must
        // then split.
        let right = [(7.0, 7.0), (8.0, 8.0), (7.0, 8.0), (8.0, 7.0)];
        let mut tree = two_leaf_tree(SplitStrategy::RStar, &LEFT, &right);

        tree.insert(point(0.5, 0.5), 50).unwrap();

        assert_eq!(tree.height(), 2);
        assert_eq!(tree.store().node_count(), 4);
        assert_eq!(leaf_sizes(&tree), vec![2, 3, 4]);
        assert_ne!(leaf_holding(&tree, 3), leaf_holding(&tree, 50));
        assert_eq!(tree.len(), 9);
        assert!(tree.validate().is_valid());
    }

    #[test]
    fn test_root_overflow_always_splits() {
        let config = TreeConfig::new(4, 2).with_strategy(SplitStrategy::RStar);
        let mut tree = RTree::new(config).unwrap();
        for (i, (x, y)) in LEFT.iter().enumerate() {
            tree.insert(point(*x, *y), i as EntryId).unwrap();
        }
        assert_eq!(tree.height(), 1);

        tree.insert(point(0.5, 0.5), 50).unwrap();

        assert_eq!(tree.height(), 2);
        assert_eq!(tree.store().node_count(), 3);
        assert_eq!(leaf_sizes(&tree).iter().sum::<usize>(), 5);
        assert!(tree.validate().is_valid());
    }

    #[test]
    fn test_reinsert_guard_claims_each_level_once() {
        let mut guard = ReinsertGuard::new();
        assert!(guard.claim(0));
        assert!(!guard.claim(0));
        assert!(guard.claim(2));
        assert!(guard.claim(1));
        assert!(!guard.claim(2));
        assert!(!guard.claim(1));
    }
}
