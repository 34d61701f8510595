//! Hilbert bulk loading.
//!
//! Entries are sorted by the Hilbert index of their centers (normalized over
//! the union of all entries) and packed bottom-up: consecutive runs of `M`
//! entries form the leaves, consecutive runs of `M` nodes form each parent
//! level, until a single root remains.

use log::debug;

use super::insert::child_ref;
use super::{check_store_config, RTree};
use crate::config::TreeConfig;
use crate::envelope::Envelope;
use crate::errors::TreeResult;
use crate::factory::DefaultNodeFactory;
use crate::hilbert::hilbert_index_bounded;
use crate::node::{Entry, EntryId, Node, NodeContent};
use crate::storage::{NodeStore, TreeMeta};

impl<S: NodeStore> RTree<S> {
    /// Builds a packed tree over `store` from `entries`. Whatever `store`
    /// held before is cleared. A store that persists its configuration must
    /// have been created with `config`.
    ///
    /// Every node except the last of each level is full, and the last one
    /// holds at least the minimum fill, so `N` entries give a tree of height
    /// `ceil(log_M(N))`. Inserts and deletes after packing follow the
    /// configured strategy; [`SplitStrategy::Hilbert`](crate::SplitStrategy::Hilbert)
    /// trees use the R* rules.
    pub fn bulk_load<I>(config: TreeConfig, store: S, entries: I) -> TreeResult<Self>
    where
        I: IntoIterator<Item = (Envelope, EntryId)>,
    {
        config.validate()?;
        check_store_config(&config, &store)?;
        let mut tree = RTree {
            config,
            store,
            factory: Box::new(DefaultNodeFactory),
        };
        let entries = entries
            .into_iter()
            .map(|(envelope, id)| {
                tree.check_envelope(&envelope)?;
                Ok(Entry::new(envelope, id))
            })
            .collect::<TreeResult<Vec<_>>>()?;
        tree.store.clear()?;
        tree.pack(entries)?;
        Ok(tree)
    }

    /// Re-packs the current entries into a fresh Hilbert-ordered tree.
    pub fn rebuild(&mut self) -> TreeResult<()> {
        let entries = self.entries()?;
        let before = self.height();
        self.store.clear()?;
        self.pack(entries)?;
        debug!(
            "Rebuilt tree with {} entries, height {} -> {}",
            self.len(),
            before,
            self.height()
        );
        Ok(())
    }

    /// Packs `entries` into an empty store.
    fn pack(&mut self, mut entries: Vec<Entry>) -> TreeResult<()> {
        if entries.is_empty() {
            return self.init_root();
        }
        let count = entries.len() as u64;
        self.sort_by_hilbert(&mut entries);

        let sizes = pack_sizes(
            entries.len(),
            self.config.max_elements(),
            self.config.min_elements(),
        );
        let mut level: Vec<Node> = Vec::with_capacity(sizes.len());
        let mut rest = entries.into_iter();
        for size in sizes {
            let group: Vec<Entry> = rest.by_ref().take(size).collect();
            level.push(self.create_node(None, 0, NodeContent::Leaf(group))?);
        }

        let mut height = 1;
        while level.len() > 1 {
            let sizes = pack_sizes(
                level.len(),
                self.config.max_elements(),
                self.config.min_elements(),
            );
            let mut parents = Vec::with_capacity(sizes.len());
            let mut children = level.into_iter();
            for size in sizes {
                let group: Vec<Node> = children.by_ref().take(size).collect();
                let refs = group.iter().map(child_ref).collect::<TreeResult<Vec<_>>>()?;
                let parent = self.create_node(None, height, NodeContent::Branch(refs))?;
                for mut child in group {
                    child.set_parent(Some(parent.id()));
                    self.store.write(child)?;
                }
                parents.push(parent);
            }
            level = parents;
            height += 1;
        }

        let mut root_id = None;
        for root in level {
            root_id = Some(root.id());
            self.store.write(root)?;
        }
        self.store.set_meta(TreeMeta {
            root: root_id,
            height,
            entry_count: count,
        })?;
        debug!("Packed {} entries into a tree of height {}", count, height);
        Ok(())
    }

    fn sort_by_hilbert(&self, entries: &mut Vec<Entry>) {
        let Some(bounds) = Envelope::union_all(entries.iter().map(|e| &e.envelope)) else {
            return;
        };
        let order = self.config.hilbert_order();
        let mut keyed: Vec<(u128, Entry)> = entries
            .drain(..)
            .map(|e| (hilbert_index_bounded(&e.envelope.center(), &bounds, order), e))
            .collect();
        keyed.sort_by_key(|(key, _)| *key);
        entries.extend(keyed.into_iter().map(|(_, e)| e));
    }
}

/// Sizes of the nodes packing `n` items: full nodes of `max`, and a last
/// node topped up from its predecessor when it would hold fewer than `min`.
fn pack_sizes(n: usize, max: usize, min: usize) -> Vec<usize> {
    if n == 0 {
        return Vec::new();
    }
    let nodes = n.div_ceil(max);
    let mut sizes = vec![max; nodes];
    let last = n - max * (nodes - 1);
    sizes[nodes - 1] = last;
    if nodes > 1 && last < min {
        sizes[nodes - 2] -= min - last;
        sizes[nodes - 1] = min;
    }
    sizes
}
