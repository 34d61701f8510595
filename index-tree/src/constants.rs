//! Constants for the index tree and its paged file store.

/// Fraction of a node's items removed for R* forced reinsertion
pub const DEFAULT_REINSERT_FRACTION: f64 = 0.3;

/// Children evaluated for overlap enlargement when choosing a leaf (R*)
pub const DEFAULT_OVERLAP_CANDIDATES: usize = 32;

/// Bits per axis of the Hilbert grid used for packing
pub const DEFAULT_HILBERT_ORDER: u32 = 16;

/// Smallest branching factor a tree accepts
pub const MIN_BRANCHING_FACTOR: usize = 2;

/// Hilbert indices are `u128`, so `dimension * order` must fit in it
pub const MAX_HILBERT_BITS: u32 = 128;

/// Default cache size in number of pages
pub const DEFAULT_CACHE_PAGES: usize = 1024;

/// Magic number for file format identification
pub const MAGIC: u32 = 0x4758_5254; // "GXRT"

/// File format version
pub const VERSION: u32 = 1;

/// Smallest page the file store lays out; page 0 (the header) uses it too
pub const MIN_PAGE_SIZE: usize = 1024;

/// Pages are rounded up to a multiple of this
pub const PAGE_ALIGNMENT: usize = 256;
