//! Tree configuration.

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_HILBERT_ORDER, DEFAULT_OVERLAP_CANDIDATES, DEFAULT_REINSERT_FRACTION,
    MAX_HILBERT_BITS, MIN_BRANCHING_FACTOR,
};
use crate::errors::{TreeError, TreeResult};
use crate::split::SplitStrategy;

/// Construction parameters of an [`RTree`](crate::RTree).
///
/// The branching factor `M` (`max_elements`) and the dimension are required;
/// everything else has a default. The minimum fill `m` defaults to `M / 2`.
///
/// # Examples
///
/// ```rust
/// use index_tree::{SplitStrategy, TreeConfig};
///
/// let config = TreeConfig::new(4, 2)
///     .with_strategy(SplitStrategy::RStar)
///     .with_crs("EPSG:4326");
/// assert_eq!(config.min_elements(), 2);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeConfig {
    max_elements: usize,
    min_elements: usize,
    dimension: usize,
    strategy: SplitStrategy,
    reinsert_fraction: f64,
    overlap_candidates: usize,
    hilbert_order: u32,
    crs: Option<String>,
}

impl TreeConfig {
    pub fn new(max_elements: usize, dimension: usize) -> TreeConfig {
        TreeConfig {
            max_elements,
            min_elements: (max_elements / 2).max(1),
            dimension,
            strategy: SplitStrategy::default(),
            reinsert_fraction: DEFAULT_REINSERT_FRACTION,
            overlap_candidates: DEFAULT_OVERLAP_CANDIDATES,
            hilbert_order: DEFAULT_HILBERT_ORDER,
            crs: None,
        }
    }

    pub fn with_min_elements(mut self, min_elements: usize) -> Self {
        self.min_elements = min_elements;
        self
    }

    pub fn with_strategy(mut self, strategy: SplitStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_reinsert_fraction(mut self, fraction: f64) -> Self {
        self.reinsert_fraction = fraction;
        self
    }

    pub fn with_overlap_candidates(mut self, candidates: usize) -> Self {
        self.overlap_candidates = candidates;
        self
    }

    pub fn with_hilbert_order(mut self, order: u32) -> Self {
        self.hilbert_order = order;
        self
    }

    /// Tags the tree with a coordinate reference system identifier. The tag
    /// is carried along and persisted but never interpreted.
    pub fn with_crs(mut self, crs: impl Into<String>) -> Self {
        self.crs = Some(crs.into());
        self
    }

    /// Branching factor `M`.
    pub fn max_elements(&self) -> usize {
        self.max_elements
    }

    /// Minimum fill `m` of every non-root node.
    pub fn min_elements(&self) -> usize {
        self.min_elements
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn strategy(&self) -> SplitStrategy {
        self.strategy
    }

    pub fn reinsert_fraction(&self) -> f64 {
        self.reinsert_fraction
    }

    pub fn overlap_candidates(&self) -> usize {
        self.overlap_candidates
    }

    pub fn hilbert_order(&self) -> u32 {
        self.hilbert_order
    }

    pub fn crs(&self) -> Option<&str> {
        self.crs.as_deref()
    }

    /// Number of items an R* node gives up for forced reinsertion. Always
    /// leaves at least `m` items behind.
    pub fn reinsert_count(&self) -> usize {
        let p = (self.reinsert_fraction * self.max_elements as f64).round() as usize;
        p.clamp(1, self.max_elements + 1 - self.min_elements)
    }

    pub fn validate(&self) -> TreeResult<()> {
        if self.max_elements < MIN_BRANCHING_FACTOR {
            return Err(TreeError::invalid(format!(
                "branching factor must be at least {}, got {}",
                MIN_BRANCHING_FACTOR, self.max_elements
            )));
        }
        if self.min_elements == 0 || self.min_elements > self.max_elements / 2 {
            return Err(TreeError::invalid(format!(
                "minimum fill must be in 1..={}, got {}",
                self.max_elements / 2,
                self.min_elements
            )));
        }
        if self.dimension == 0 {
            return Err(TreeError::invalid("dimension must be at least 1"));
        }
        if !(self.reinsert_fraction > 0.0 && self.reinsert_fraction < 1.0) {
            return Err(TreeError::invalid(format!(
                "reinsert fraction must be in (0, 1), got {}",
                self.reinsert_fraction
            )));
        }
        if self.overlap_candidates == 0 {
            return Err(TreeError::invalid("overlap candidates must be at least 1"));
        }
        if self.hilbert_order == 0
            || self.hilbert_order as u64 * self.dimension as u64 > MAX_HILBERT_BITS as u64
        {
            return Err(TreeError::invalid(format!(
                "hilbert order {} does not fit {} dimensions in {} bits",
                self.hilbert_order, self.dimension, MAX_HILBERT_BITS
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TreeConfig::new(4, 2);
        assert_eq!(config.max_elements(), 4);
        assert_eq!(config.min_elements(), 2);
        assert_eq!(config.dimension(), 2);
        assert_eq!(config.strategy(), SplitStrategy::Quadratic);
        assert_eq!(config.overlap_candidates(), DEFAULT_OVERLAP_CANDIDATES);
        assert_eq!(config.hilbert_order(), DEFAULT_HILBERT_ORDER);
        assert_eq!(config.crs(), None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_min_elements_rounds_down() {
        assert_eq!(TreeConfig::new(5, 2).min_elements(), 2);
        assert_eq!(TreeConfig::new(9, 2).min_elements(), 4);
        assert_eq!(TreeConfig::new(2, 2).min_elements(), 1);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(TreeConfig::new(1, 2).validate().is_err());
        assert!(TreeConfig::new(4, 0).validate().is_err());
        assert!(TreeConfig::new(4, 2).with_min_elements(3).validate().is_err());
        assert!(TreeConfig::new(4, 2).with_min_elements(0).validate().is_err());
        assert!(TreeConfig::new(4, 2).with_reinsert_fraction(0.0).validate().is_err());
        assert!(TreeConfig::new(4, 2).with_reinsert_fraction(1.0).validate().is_err());
        assert!(TreeConfig::new(4, 2).with_overlap_candidates(0).validate().is_err());
        assert!(TreeConfig::new(4, 2).with_hilbert_order(0).validate().is_err());
        assert!(TreeConfig::new(4, 3).with_hilbert_order(43).validate().is_err());
        assert!(TreeConfig::new(4, 3).with_hilbert_order(42).validate().is_ok());
    }

    #[test]
    fn test_reinsert_count_bounds() {
        assert_eq!(TreeConfig::new(4, 2).reinsert_count(), 1);
        assert_eq!(TreeConfig::new(10, 2).reinsert_count(), 3);
        assert_eq!(TreeConfig::new(50, 2).reinsert_count(), 15);
        // never strips a node below m
        let config = TreeConfig::new(10, 2).with_reinsert_fraction(0.9);
        assert_eq!(config.reinsert_count(), 11 - config.min_elements());
    }

    #[test]
    fn test_serde_roundtrip() {
        let config = TreeConfig::new(8, 3)
            .with_strategy(SplitStrategy::Hilbert)
            .with_crs("EPSG:4979");
        let json = serde_json::to_string(&config).unwrap();
        let back: TreeConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, back);
    }
}
