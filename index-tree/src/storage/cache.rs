//! LRU page cache of the file store.
//!
//! Pages enter the cache when first read or when written. Writes only mark
//! the cached page dirty; the owner writes dirty pages back when they are
//! evicted or on flush.

use std::collections::{BTreeMap, HashMap};

use crate::node::{Node, NodeId};

/// A cached page with its data and dirty flag
struct CachedPage {
    node: Node,
    dirty: bool,
    /// Last access tick, key into `lru_order`
    tick: u64,
}

pub(crate) struct PageCache {
    pages: HashMap<NodeId, CachedPage>,
    /// Access tick to page, oldest first
    lru_order: BTreeMap<u64, NodeId>,
    next_tick: u64,
    max_pages: usize,
}

impl PageCache {
    pub(crate) fn new(max_pages: usize) -> Self {
        Self {
            pages: HashMap::new(),
            lru_order: BTreeMap::new(),
            next_tick: 0,
            max_pages: max_pages.max(1),
        }
    }

    fn touch(&mut self, page_id: NodeId) {
        let tick = self.next_tick;
        if let Some(cached) = self.pages.get_mut(&page_id) {
            self.lru_order.remove(&cached.tick);
            cached.tick = tick;
            self.lru_order.insert(tick, page_id);
            self.next_tick += 1;
        }
    }

    /// Returns a copy of a cached page and marks it most recently used.
    pub(crate) fn get(&mut self, page_id: NodeId) -> Option<Node> {
        if !self.pages.contains_key(&page_id) {
            return None;
        }
        self.touch(page_id);
        self.pages.get(&page_id).map(|cached| cached.node.clone())
    }

    /// Inserts or replaces a page. A page stays dirty until marked clean,
    /// even when replaced by a clean copy.
    pub(crate) fn insert(&mut self, page_id: NodeId, node: Node, dirty: bool) {
        let tick = self.next_tick;
        self.next_tick += 1;
        let was_dirty = match self.pages.remove(&page_id) {
            Some(old) => {
                self.lru_order.remove(&old.tick);
                old.dirty
            }
            None => false,
        };
        self.lru_order.insert(tick, page_id);
        self.pages.insert(
            page_id,
            CachedPage {
                node,
                dirty: dirty || was_dirty,
                tick,
            },
        );
    }

    pub(crate) fn needs_eviction(&self) -> bool {
        self.pages.len() >= self.max_pages
    }

    /// Removes the least recently used page (page id, node, dirty flag).
    pub(crate) fn evict_oldest(&mut self) -> Option<(NodeId, Node, bool)> {
        let (_, page_id) = self.lru_order.pop_first()?;
        let cached = self.pages.remove(&page_id)?;
        Some((page_id, cached.node, cached.dirty))
    }

    /// Copies of every dirty page, for flushing.
    pub(crate) fn dirty_pages(&self) -> Vec<(NodeId, Node)> {
        self.pages
            .iter()
            .filter(|(_, cached)| cached.dirty)
            .map(|(id, cached)| (*id, cached.node.clone()))
            .collect()
    }

    pub(crate) fn mark_clean(&mut self, page_id: NodeId) {
        if let Some(cached) = self.pages.get_mut(&page_id) {
            cached.dirty = false;
        }
    }

    /// Drops a page without writing it back.
    pub(crate) fn remove(&mut self, page_id: NodeId) -> Option<(Node, bool)> {
        let cached = self.pages.remove(&page_id)?;
        self.lru_order.remove(&cached.tick);
        Some((cached.node, cached.dirty))
    }

    pub(crate) fn clear(&mut self) {
        self.pages.clear();
        self.lru_order.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.pages.len()
    }

    #[cfg(test)]
    fn contains(&self, page_id: NodeId) -> bool {
        self.pages.contains_key(&page_id)
    }

    #[cfg(test)]
    fn is_dirty(&self, page_id: NodeId) -> bool {
        self.pages.get(&page_id).map(|c| c.dirty).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeContent;

    fn leaf(id: NodeId) -> Node {
        Node::new(id, None, 0, None, NodeContent::Leaf(vec![]))
    }

    #[test]
    fn test_page_cache_insert_and_get() {
        let mut cache = PageCache::new(10);
        cache.insert(1, leaf(1), false);
        assert_eq!(cache.len(), 1);
        assert!(cache.contains(1));
        assert_eq!(cache.get(1).map(|n| n.id()), Some(1));
        assert!(cache.get(999).is_none());
    }

    #[test]
    fn test_page_cache_lru_eviction() {
        let mut cache = PageCache::new(3);
        cache.insert(1, leaf(1), false);
        cache.insert(2, leaf(2), false);
        cache.insert(3, leaf(3), false);
        assert!(cache.needs_eviction());

        // page 1 becomes most recent
        let _ = cache.get(1);

        let evicted = cache.evict_oldest().unwrap();
        assert_eq!(evicted.0, 2);
        assert_eq!(cache.evict_oldest().unwrap().0, 3);
        assert_eq!(cache.evict_oldest().unwrap().0, 1);
        assert!(cache.evict_oldest().is_none());
    }

    #[test]
    fn test_page_cache_dirty_tracking() {
        let mut cache = PageCache::new(10);
        cache.insert(1, leaf(1), true);
        cache.insert(2, leaf(2), false);
        cache.insert(3, leaf(3), true);

        let mut dirty: Vec<_> = cache.dirty_pages().into_iter().map(|(id, _)| id).collect();
        dirty.sort_unstable();
        assert_eq!(dirty, vec![1, 3]);

        // a clean re-insert keeps the pending write
        cache.insert(1, leaf(1), false);
        assert!(cache.is_dirty(1));

        cache.mark_clean(1);
        assert!(!cache.is_dirty(1));
    }

    #[test]
    fn test_page_cache_evicted_page_reports_dirty() {
        let mut cache = PageCache::new(2);
        cache.insert(1, leaf(1), true);
        cache.insert(2, leaf(2), false);

        let (id, _, dirty) = cache.evict_oldest().unwrap();
        assert_eq!(id, 1);
        assert!(dirty);
    }

    #[test]
    fn test_page_cache_remove_and_clear() {
        let mut cache = PageCache::new(10);
        cache.insert(1, leaf(1), true);
        cache.insert(2, leaf(2), false);

        let (_, dirty) = cache.remove(1).unwrap();
        assert!(dirty);
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert_eq!(cache.len(), 0);
        assert!(cache.evict_oldest().is_none());
    }
}
