//! Paged file node store.
//!
//! File layout:
//! - page 0: [`FileHeader`] (magic, version, page size, tree configuration,
//!   root, height, entry count, next page, free list head)
//! - page N (N >= 1): one node, encoded with bincode and wrapped in a
//!   [`PageRecord`] carrying a CRC32 of the encoded node, zero padded to the
//!   page size
//!
//! Freed pages are chained into an on-disk free list and reused by
//! [`NodeStore::allocate`]. Nodes go through an LRU [`PageCache`]; writes
//! stay in the cache until the page is evicted or the store is flushed.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use log::{debug, warn};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::cache::PageCache;
use super::{NodeStore, TreeMeta};
use crate::config::TreeConfig;
use crate::constants::{DEFAULT_CACHE_PAGES, MAGIC, MIN_PAGE_SIZE, PAGE_ALIGNMENT, VERSION};
use crate::errors::{TreeError, TreeResult};
use crate::node::{Node, NodeContent, NodeId};

/// Header stored in page 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct FileHeader {
    magic: u32,
    version: u32,
    page_size: u32,
    config: TreeConfig,
    /// 0 when the tree has no root yet
    root_page: NodeId,
    height: u32,
    entry_count: u64,
    next_page_id: NodeId,
    /// 0 terminates the chain
    free_list_head: NodeId,
    free_page_count: u64,
}

impl FileHeader {
    fn new(config: TreeConfig, page_size: usize) -> Self {
        Self {
            magic: MAGIC,
            version: VERSION,
            page_size: page_size as u32,
            config,
            root_page: 0,
            height: 0,
            entry_count: 0,
            next_page_id: 1,
            free_list_head: 0,
            free_page_count: 0,
        }
    }

    fn validate(&self) -> TreeResult<()> {
        if self.magic != MAGIC {
            return Err(TreeError::store("invalid file format (bad magic)"));
        }
        if self.version != VERSION {
            return Err(TreeError::store(format!(
                "unsupported file format version {}",
                self.version
            )));
        }
        if (self.page_size as usize) < MIN_PAGE_SIZE {
            return Err(TreeError::store(format!(
                "page size {} is below the minimum {}",
                self.page_size, MIN_PAGE_SIZE
            )));
        }
        if self.root_page >= self.next_page_id {
            return Err(TreeError::store(format!(
                "root page {} is beyond the last page {}",
                self.root_page, self.next_page_id
            )));
        }
        self.config.validate()
    }
}

/// A node record with a CRC32 of its encoded bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PageRecord {
    checksum: u32,
    payload: Vec<u8>,
}

impl PageRecord {
    fn seal(node: &Node) -> TreeResult<Self> {
        let payload = bincode::serde::encode_to_vec(node, bincode::config::legacy())
            .map_err(|e| TreeError::Serialization(e.to_string()))?;
        Ok(Self {
            checksum: crc32(&payload),
            payload,
        })
    }

    fn open(self, page_id: NodeId) -> TreeResult<Node> {
        let actual = crc32(&self.payload);
        if actual != self.checksum {
            return Err(TreeError::store(format!(
                "page {} checksum mismatch (stored {:x}, computed {:x})",
                page_id, self.checksum, actual
            )));
        }
        bincode::serde::decode_from_slice(&self.payload, bincode::config::legacy())
            .map(|(node, _)| node)
            .map_err(|e| TreeError::store(format!("page {} is malformed: {}", page_id, e)))
    }
}

/// Link of the free page chain, written over a freed page.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct FreePage {
    next_free: NodeId,
}

/// CRC32-MPEG2
fn crc32(data: &[u8]) -> u32 {
    const POLY: u32 = 0x04C1_1DB7;
    let mut crc: u32 = 0xFFFF_FFFF;
    for &byte in data {
        crc ^= (byte as u32) << 24;
        for _ in 0..8 {
            crc = if crc & 0x8000_0000 != 0 {
                (crc << 1) ^ POLY
            } else {
                crc << 1
            };
        }
    }
    crc ^ 0xFFFF_FFFF
}

/// Page size able to hold a node overflowing by one item, rounded up to
/// [`PAGE_ALIGNMENT`].
pub(crate) fn page_size_for(config: &TreeConfig) -> usize {
    let dim = config.dimension();
    let item = 32 + 16 * dim;
    let raw = 128 + 16 * dim + (config.max_elements() + 1) * item;
    let aligned = raw.div_ceil(PAGE_ALIGNMENT) * PAGE_ALIGNMENT;
    aligned.max(MIN_PAGE_SIZE)
}

/// Snapshot of the store counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub disk_reads: u64,
    pub disk_writes: u64,
    pub cached_pages: u64,
    pub page_size: u64,
    /// Pages in the file including the header and free pages
    pub file_pages: u64,
}

#[derive(Debug, Default)]
struct Counters {
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    disk_reads: AtomicU64,
    disk_writes: AtomicU64,
}

/// Result of [`FileNodeStore::check_integrity`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntegrityReport {
    /// Node pages read while walking the tree from its root
    pub pages_checked: u64,
    pub corrupted_pages: Vec<NodeId>,
    /// Pages neither reachable from the root nor on the free list
    pub orphaned_pages: Vec<NodeId>,
    pub free_pages: u64,
    pub errors: Vec<String>,
}

impl IntegrityReport {
    pub fn is_valid(&self) -> bool {
        self.corrupted_pages.is_empty() && self.orphaned_pages.is_empty() && self.errors.is_empty()
    }
}

/// Node store keeping one node per fixed-size page of a file.
pub struct FileNodeStore {
    file: Mutex<File>,
    path: PathBuf,
    page_size: usize,
    header: FileHeader,
    header_dirty: bool,
    cache: Mutex<PageCache>,
    counters: Counters,
}

impl FileNodeStore {
    /// Creates (or truncates) a store file for trees built with `config`.
    pub fn create(path: impl AsRef<Path>, config: &TreeConfig) -> TreeResult<Self> {
        config.validate()?;
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;

        let page_size = page_size_for(config);
        let mut store = Self {
            file: Mutex::new(file),
            path: path.to_path_buf(),
            page_size,
            header: FileHeader::new(config.clone(), page_size),
            header_dirty: true,
            cache: Mutex::new(PageCache::new(DEFAULT_CACHE_PAGES)),
            counters: Counters::default(),
        };
        store.write_header()?;
        debug!(
            "Created index file {} with page size {}",
            path.display(),
            page_size
        );
        Ok(store)
    }

    /// Opens an existing store file. The tree configuration is read back
    /// from the header, see [`FileNodeStore::config`].
    pub fn open(path: impl AsRef<Path>) -> TreeResult<Self> {
        let path = path.as_ref();
        let mut file = OpenOptions::new().read(true).write(true).open(path)?;

        let mut buffer = vec![0u8; MIN_PAGE_SIZE];
        file.seek(SeekFrom::Start(0))?;
        read_page_bytes(&mut file, &mut buffer, 0)?;
        let header: FileHeader =
            bincode::serde::decode_from_slice(&buffer, bincode::config::legacy())
                .map(|(header, _)| header)
                .map_err(|e| TreeError::store(format!("file header is malformed: {}", e)))?;
        header.validate()?;

        debug!(
            "Opened index file {} ({} entries, height {})",
            path.display(),
            header.entry_count,
            header.height
        );
        Ok(Self {
            file: Mutex::new(file),
            path: path.to_path_buf(),
            page_size: header.page_size as usize,
            header,
            header_dirty: false,
            cache: Mutex::new(PageCache::new(DEFAULT_CACHE_PAGES)),
            counters: Counters::default(),
        })
    }

    /// Replaces the page cache with one holding at most `pages` nodes.
    pub fn with_cache_pages(mut self, pages: usize) -> TreeResult<Self> {
        self.flush_pages()?;
        self.cache = Mutex::new(PageCache::new(pages));
        Ok(self)
    }

    /// Configuration the file was created with.
    pub fn config(&self) -> &TreeConfig {
        &self.header.config
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            cache_hits: self.counters.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.counters.cache_misses.load(Ordering::Relaxed),
            disk_reads: self.counters.disk_reads.load(Ordering::Relaxed),
            disk_writes: self.counters.disk_writes.load(Ordering::Relaxed),
            cached_pages: self.cache.lock().len() as u64,
            page_size: self.page_size as u64,
            file_pages: self.header.next_page_id,
        }
    }

    /// Walks the tree from its root and the free list, reading every page
    /// from disk. Nothing is repaired.
    pub fn check_integrity(&mut self) -> TreeResult<IntegrityReport> {
        self.flush()?;
        let mut report = IntegrityReport::default();
        let total = self.header.next_page_id as usize;
        let mut seen = vec![false; total];

        let mut stack = Vec::new();
        if self.header.root_page != 0 {
            stack.push(self.header.root_page);
        }
        while let Some(page_id) = stack.pop() {
            let index = page_id as usize;
            if page_id == 0 || index >= total {
                report
                    .errors
                    .push(format!("reference to page {} out of range", page_id));
                continue;
            }
            if seen[index] {
                report
                    .errors
                    .push(format!("page {} is referenced more than once", page_id));
                continue;
            }
            seen[index] = true;
            report.pages_checked += 1;
            match self.read_from_disk(page_id) {
                Ok(node) => {
                    if let NodeContent::Branch(children) = node.content() {
                        stack.extend(children.iter().map(|c| c.node));
                    }
                }
                Err(e) => {
                    report.corrupted_pages.push(page_id);
                    report.errors.push(e.to_string());
                }
            }
        }

        let mut next = self.header.free_list_head;
        while next != 0 {
            let index = next as usize;
            if index >= total || seen[index] {
                report
                    .errors
                    .push(format!("free list is broken at page {}", next));
                break;
            }
            seen[index] = true;
            report.free_pages += 1;
            match self.read_free_link(next) {
                Ok(link) => next = link,
                Err(e) => {
                    report.errors.push(e.to_string());
                    break;
                }
            }
        }
        if report.free_pages != self.header.free_page_count {
            report.errors.push(format!(
                "free list holds {} pages, header records {}",
                report.free_pages, self.header.free_page_count
            ));
        }

        report.orphaned_pages = (1..total)
            .filter(|&i| !seen[i])
            .map(|i| i as NodeId)
            .collect();
        report.corrupted_pages.sort_unstable();
        if !report.is_valid() {
            warn!(
                "Integrity check of {} found {} problem(s)",
                self.path.display(),
                report.errors.len() + report.orphaned_pages.len()
            );
        }
        Ok(report)
    }

    fn check_page_id(&self, page_id: NodeId) -> TreeResult<()> {
        if page_id == 0 || page_id >= self.header.next_page_id {
            return Err(TreeError::store(format!(
                "page {} out of range 1..{}",
                page_id, self.header.next_page_id
            )));
        }
        Ok(())
    }

    fn offset(&self, page_id: NodeId) -> u64 {
        page_id * self.page_size as u64
    }

    fn read_from_disk(&self, page_id: NodeId) -> TreeResult<Node> {
        let mut buffer = vec![0u8; self.page_size];
        {
            let mut file = self.file.lock();
            file.seek(SeekFrom::Start(self.offset(page_id)))?;
            read_page_bytes(&mut file, &mut buffer, page_id)?;
        }
        self.counters.disk_reads.fetch_add(1, Ordering::Relaxed);

        let record: PageRecord =
            bincode::serde::decode_from_slice(&buffer, bincode::config::legacy())
                .map(|(record, _)| record)
                .map_err(|e| TreeError::store(format!("page {} is malformed: {}", page_id, e)))?;
        let node = record.open(page_id)?;
        if node.id() != page_id {
            return Err(TreeError::store(format!(
                "page {} holds node {}",
                page_id,
                node.id()
            )));
        }
        Ok(node)
    }

    fn encode_page(&self, node: &Node) -> TreeResult<Vec<u8>> {
        let record = PageRecord::seal(node)?;
        let mut bytes = bincode::serde::encode_to_vec(&record, bincode::config::legacy())
            .map_err(|e| TreeError::Serialization(e.to_string()))?;
        if bytes.len() > self.page_size {
            return Err(TreeError::store(format!(
                "node {} needs {} bytes, page size is {}",
                node.id(),
                bytes.len(),
                self.page_size
            )));
        }
        bytes.resize(self.page_size, 0);
        Ok(bytes)
    }

    fn write_raw(&self, file: &mut File, page_id: NodeId, bytes: &[u8]) -> TreeResult<()> {
        file.seek(SeekFrom::Start(self.offset(page_id)))?;
        file.write_all(bytes)?;
        self.counters.disk_writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn write_to_disk(&self, file: &mut File, node: &Node) -> TreeResult<()> {
        let bytes = self.encode_page(node)?;
        self.write_raw(file, node.id(), &bytes)
    }

    /// Caches `node`, writing back whatever the cache evicts to make room.
    fn cache_node(&self, node: Node, dirty: bool) -> TreeResult<()> {
        let mut cache = self.cache.lock();
        while cache.needs_eviction() {
            match cache.evict_oldest() {
                Some((_, evicted, true)) => {
                    let mut file = self.file.lock();
                    self.write_to_disk(&mut file, &evicted)?;
                }
                Some(_) => {}
                None => break,
            }
        }
        cache.insert(node.id(), node, dirty);
        Ok(())
    }

    fn read_free_link(&self, page_id: NodeId) -> TreeResult<NodeId> {
        let mut buffer = vec![0u8; self.page_size];
        {
            let mut file = self.file.lock();
            file.seek(SeekFrom::Start(self.offset(page_id)))?;
            read_page_bytes(&mut file, &mut buffer, page_id)?;
        }
        self.counters.disk_reads.fetch_add(1, Ordering::Relaxed);
        bincode::serde::decode_from_slice::<FreePage, _>(&buffer, bincode::config::legacy())
            .map(|(page, _)| page.next_free)
            .map_err(|e| TreeError::store(format!("free page {} is malformed: {}", page_id, e)))
    }

    fn write_header(&mut self) -> TreeResult<()> {
        let mut bytes = bincode::serde::encode_to_vec(&self.header, bincode::config::legacy())
            .map_err(|e| TreeError::Serialization(e.to_string()))?;
        if bytes.len() > MIN_PAGE_SIZE {
            return Err(TreeError::invalid(format!(
                "file header needs {} bytes, at most {} fit",
                bytes.len(),
                MIN_PAGE_SIZE
            )));
        }
        bytes.resize(self.page_size, 0);
        let mut file = self.file.lock();
        self.write_raw(&mut file, 0, &bytes)?;
        self.header_dirty = false;
        Ok(())
    }

    fn flush_pages(&mut self) -> TreeResult<()> {
        let mut cache = self.cache.lock();
        let dirty = cache.dirty_pages();
        if dirty.is_empty() {
            return Ok(());
        }
        let mut file = self.file.lock();
        for (page_id, node) in dirty {
            self.write_to_disk(&mut file, &node)?;
            cache.mark_clean(page_id);
        }
        Ok(())
    }
}

/// Reads a whole page, reporting a short read as a truncated record.
fn read_page_bytes(file: &mut File, buffer: &mut [u8], page_id: NodeId) -> TreeResult<()> {
    file.read_exact(buffer).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => {
            TreeError::store(format!("page {} is truncated", page_id))
        }
        _ => TreeError::Io(e),
    })
}

impl NodeStore for FileNodeStore {
    fn allocate(&mut self) -> TreeResult<NodeId> {
        self.header_dirty = true;
        if self.header.free_list_head != 0 {
            let page_id = self.header.free_list_head;
            self.header.free_list_head = self.read_free_link(page_id)?;
            self.header.free_page_count = self.header.free_page_count.saturating_sub(1);
            return Ok(page_id);
        }
        let page_id = self.header.next_page_id;
        self.header.next_page_id += 1;
        Ok(page_id)
    }

    fn read(&self, id: NodeId) -> TreeResult<Node> {
        self.check_page_id(id)?;
        if let Some(node) = self.cache.lock().get(id) {
            self.counters.cache_hits.fetch_add(1, Ordering::Relaxed);
            return Ok(node);
        }
        self.counters.cache_misses.fetch_add(1, Ordering::Relaxed);
        let node = self.read_from_disk(id)?;
        self.cache_node(node.clone(), false)?;
        Ok(node)
    }

    fn write(&mut self, node: Node) -> TreeResult<()> {
        self.check_page_id(node.id())?;
        // reject oversized records now rather than at write-back
        self.encode_page(&node)?;
        self.cache_node(node, true)
    }

    fn free(&mut self, id: NodeId) -> TreeResult<()> {
        self.check_page_id(id)?;
        self.cache.lock().remove(id);
        let link = FreePage {
            next_free: self.header.free_list_head,
        };
        let mut bytes = bincode::serde::encode_to_vec(&link, bincode::config::legacy())
            .map_err(|e| TreeError::Serialization(e.to_string()))?;
        bytes.resize(self.page_size, 0);
        {
            let mut file = self.file.lock();
            self.write_raw(&mut file, id, &bytes)?;
        }
        self.header.free_list_head = id;
        self.header.free_page_count += 1;
        self.header_dirty = true;
        Ok(())
    }

    fn meta(&self) -> TreeMeta {
        TreeMeta {
            root: (self.header.root_page != 0).then_some(self.header.root_page),
            height: self.header.height,
            entry_count: self.header.entry_count,
        }
    }

    fn set_meta(&mut self, meta: TreeMeta) -> TreeResult<()> {
        if let Some(root) = meta.root {
            self.check_page_id(root)?;
        }
        self.header.root_page = meta.root.unwrap_or(0);
        self.header.height = meta.height;
        self.header.entry_count = meta.entry_count;
        self.header_dirty = true;
        Ok(())
    }

    fn node_count(&self) -> u64 {
        self.header.next_page_id - 1 - self.header.free_page_count
    }

    fn flush(&mut self) -> TreeResult<()> {
        self.flush_pages()?;
        if self.header_dirty {
            self.write_header()?;
        }
        self.file.lock().sync_all()?;
        Ok(())
    }

    fn clear(&mut self) -> TreeResult<()> {
        self.cache.lock().clear();
        let config = self.header.config.clone();
        self.header = FileHeader::new(config, self.page_size);
        self.file.lock().set_len(self.page_size as u64)?;
        self.write_header()?;
        debug!("Cleared index file {}", self.path.display());
        Ok(())
    }
    fn config(&self) -> Option<&TreeConfig> {
        Some(&self.header.config)
    }
}

impl Drop for FileNodeStore {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            warn!(
                "Failed to flush index file {} on drop: {}",
                self.path.display(),
                e
            );
        }
    }
}
