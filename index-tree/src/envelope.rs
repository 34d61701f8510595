use std::hash::Hash;

use serde::{Deserialize, Serialize};

use crate::errors::{TreeError, TreeResult};

/// An axis-aligned box in N dimensions, given by its lower and upper corners.
///
/// `Envelope` is the only shape the index understands. Entries, node bounds and
/// queries are all envelopes. A box whose lower and upper corners coincide is a
/// point and is a valid entry.
///
/// # Examples
///
/// ```rust
/// use index_tree::Envelope;
///
/// let a = Envelope::new(vec![0.0, 0.0], vec![1.0, 1.0]).unwrap();
/// let b = Envelope::new(vec![1.0, 1.0], vec![2.0, 2.0]).unwrap();
///
/// // Touching corners intersect.
/// assert!(a.intersects(&b));
/// assert_eq!(a.union(&b).area(), 4.0);
/// ```
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct Envelope {
    lower: Vec<f64>,
    upper: Vec<f64>,
}

impl Eq for Envelope {}

impl Hash for Envelope {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        for v in self.lower.iter().chain(self.upper.iter()) {
            v.to_bits().hash(state);
        }
    }
}

impl std::fmt::Display for Envelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Envelope(")?;
        for (i, (lo, hi)) in self.lower.iter().zip(self.upper.iter()).enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "[{}, {}]", lo, hi)?;
        }
        write!(f, ")")
    }
}

impl Envelope {
    /// Creates a new envelope from its lower and upper corners.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::InvalidArgument`] when the corners have different
    /// lengths, are empty, contain a non-finite coordinate, or when a lower
    /// bound is greater than the matching upper bound.
    pub fn new(lower: Vec<f64>, upper: Vec<f64>) -> TreeResult<Envelope> {
        if lower.is_empty() {
            return Err(TreeError::invalid("envelope must have at least one dimension"));
        }
        if lower.len() != upper.len() {
            return Err(TreeError::invalid(format!(
                "corner dimensions differ: lower has {}, upper has {}",
                lower.len(),
                upper.len()
            )));
        }
        for (axis, (lo, hi)) in lower.iter().zip(upper.iter()).enumerate() {
            if !lo.is_finite() || !hi.is_finite() {
                return Err(TreeError::invalid(format!(
                    "non-finite coordinate on axis {}",
                    axis
                )));
            }
            if lo > hi {
                return Err(TreeError::invalid(format!(
                    "lower bound {} exceeds upper bound {} on axis {}",
                    lo, hi, axis
                )));
            }
        }
        Ok(Envelope { lower, upper })
    }

    /// Creates a zero-extent envelope at the given position.
    pub fn point(coords: &[f64]) -> TreeResult<Envelope> {
        Envelope::new(coords.to_vec(), coords.to_vec())
    }

    /// Shorthand for a 2D rectangle.
    pub fn rect(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> TreeResult<Envelope> {
        Envelope::new(vec![min_x, min_y], vec![max_x, max_y])
    }

    /// Number of axes.
    pub fn dimension(&self) -> usize {
        self.lower.len()
    }

    pub fn lower(&self) -> &[f64] {
        &self.lower
    }

    pub fn upper(&self) -> &[f64] {
        &self.upper
    }

    /// Length of the box along `axis`.
    pub fn extent(&self, axis: usize) -> f64 {
        self.upper[axis] - self.lower[axis]
    }

    /// Product of the side lengths. Zero for points and flat boxes.
    pub fn area(&self) -> f64 {
        (0..self.dimension()).map(|axis| self.extent(axis)).product()
    }

    /// Sum of the side lengths.
    pub fn margin(&self) -> f64 {
        (0..self.dimension()).map(|axis| self.extent(axis)).sum()
    }

    pub fn center(&self) -> Vec<f64> {
        self.lower
            .iter()
            .zip(self.upper.iter())
            .map(|(lo, hi)| (lo + hi) / 2.0)
            .collect()
    }

    /// Squared euclidean distance between the centers of two envelopes.
    pub fn center_distance_sq(&self, other: &Envelope) -> f64 {
        (0..self.dimension())
            .map(|axis| {
                let d = (self.lower[axis] + self.upper[axis]) / 2.0
                    - (other.lower[axis] + other.upper[axis]) / 2.0;
                d * d
            })
            .sum()
    }

    /// Inclusive overlap test: boxes sharing only an edge or a corner intersect.
    pub fn intersects(&self, other: &Envelope) -> bool {
        debug_assert_eq!(self.dimension(), other.dimension());
        (0..self.dimension())
            .all(|axis| self.lower[axis] <= other.upper[axis] && self.upper[axis] >= other.lower[axis])
    }

    /// Checks if this envelope fully contains another (borders included).
    pub fn contains(&self, other: &Envelope) -> bool {
        debug_assert_eq!(self.dimension(), other.dimension());
        (0..self.dimension())
            .all(|axis| self.lower[axis] <= other.lower[axis] && self.upper[axis] >= other.upper[axis])
    }

    pub fn union(&self, other: &Envelope) -> Envelope {
        let mut merged = self.clone();
        merged.expand(other);
        merged
    }

    /// Grows this envelope in place to cover `other`.
    pub fn expand(&mut self, other: &Envelope) {
        debug_assert_eq!(self.dimension(), other.dimension());
        for axis in 0..self.dimension() {
            self.lower[axis] = self.lower[axis].min(other.lower[axis]);
            self.upper[axis] = self.upper[axis].max(other.upper[axis]);
        }
    }

    /// Returns the intersection of this envelope with another, if they intersect.
    pub fn intersection(&self, other: &Envelope) -> Option<Envelope> {
        if !self.intersects(other) {
            return None;
        }
        let lower = (0..self.dimension())
            .map(|axis| self.lower[axis].max(other.lower[axis]))
            .collect();
        let upper = (0..self.dimension())
            .map(|axis| self.upper[axis].min(other.upper[axis]))
            .collect();
        Some(Envelope { lower, upper })
    }

    /// Volume of the intersection, 0 when disjoint.
    pub fn overlap(&self, other: &Envelope) -> f64 {
        let mut volume = 1.0;
        for axis in 0..self.dimension() {
            let side = self.upper[axis].min(other.upper[axis]) - self.lower[axis].max(other.lower[axis]);
            if side <= 0.0 {
                return 0.0;
            }
            volume *= side;
        }
        volume
    }

    /// Area growth needed for this envelope to also cover `other`.
    pub fn enlargement(&self, other: &Envelope) -> f64 {
        self.union(other).area() - self.area()
    }

    pub fn is_point(&self) -> bool {
        self.lower == self.upper
    }

    /// Union of every envelope yielded, or `None` for an empty iterator.
    pub fn union_all<'a, I>(envelopes: I) -> Option<Envelope>
    where
        I: IntoIterator<Item = &'a Envelope>,
    {
        let mut iter = envelopes.into_iter();
        let mut merged = iter.next()?.clone();
        for env in iter {
            merged.expand(env);
        }
        Some(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn rect(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Envelope {
        Envelope::rect(min_x, min_y, max_x, max_y).unwrap()
    }

    #[test]
    fn test_new_rejects_malformed_input() {
        assert!(Envelope::new(vec![], vec![]).is_err());
        assert!(Envelope::new(vec![0.0, 0.0], vec![1.0]).is_err());
        assert!(Envelope::new(vec![0.0, f64::NAN], vec![1.0, 1.0]).is_err());
        assert!(Envelope::new(vec![0.0, 0.0], vec![f64::INFINITY, 1.0]).is_err());
        assert!(Envelope::new(vec![2.0, 0.0], vec![1.0, 1.0]).is_err());

        let err = Envelope::new(vec![2.0], vec![1.0]).unwrap_err();
        assert!(matches!(err, TreeError::InvalidArgument(_)));
    }

    #[test]
    fn test_point_is_valid() {
        let p = Envelope::point(&[3.0, 4.0]).unwrap();
        assert!(p.is_point());
        assert_eq!(p.area(), 0.0);
        assert_eq!(p.margin(), 0.0);
        assert_eq!(p.dimension(), 2);
    }

    #[test]
    fn test_area_margin_center() {
        let bbox = rect(0.0, 0.0, 10.0, 5.0);
        assert_eq!(bbox.area(), 50.0);
        assert_eq!(bbox.margin(), 15.0);
        assert_eq!(bbox.center(), vec![5.0, 2.5]);

        let cube = Envelope::new(vec![0.0, 0.0, 0.0], vec![2.0, 3.0, 4.0]).unwrap();
        assert_eq!(cube.area(), 24.0);
        assert_eq!(cube.margin(), 9.0);
    }

    #[test]
    fn test_intersects_is_border_inclusive() {
        let bbox1 = rect(0.0, 0.0, 10.0, 10.0);
        let bbox2 = rect(5.0, 5.0, 15.0, 15.0);
        let bbox3 = rect(20.0, 20.0, 30.0, 30.0);
        let corner = rect(10.0, 10.0, 20.0, 20.0);
        let edge = rect(10.0, 2.0, 12.0, 4.0);

        assert!(bbox1.intersects(&bbox2));
        assert!(bbox2.intersects(&bbox1));
        assert!(!bbox1.intersects(&bbox3));
        assert!(bbox1.intersects(&corner));
        assert!(bbox1.intersects(&edge));
    }

    #[test]
    fn test_contains() {
        let outer = rect(0.0, 0.0, 10.0, 10.0);
        let inner = rect(2.0, 2.0, 8.0, 8.0);
        let partial = rect(5.0, 5.0, 15.0, 15.0);

        assert!(outer.contains(&inner));
        assert!(outer.contains(&outer));
        assert!(!outer.contains(&partial));
        assert!(!inner.contains(&outer));
    }

    #[test]
    fn test_union_is_commutative_and_associative() {
        let a = rect(0.0, 0.0, 5.0, 5.0);
        let b = rect(3.0, -1.0, 10.0, 4.0);
        let c = rect(-2.0, 7.0, -1.0, 8.0);

        assert_eq!(a.union(&b), b.union(&a));
        assert_eq!(a.union(&b).union(&c), a.union(&b.union(&c)));
        assert_eq!(a.union(&b), rect(0.0, -1.0, 10.0, 5.0));
    }

    #[test]
    fn test_union_all() {
        let boxes = vec![rect(0.0, 0.0, 1.0, 1.0), rect(4.0, 4.0, 5.0, 6.0)];
        assert_eq!(Envelope::union_all(&boxes), Some(rect(0.0, 0.0, 5.0, 6.0)));
        assert_eq!(Envelope::union_all(&Vec::<Envelope>::new()), None);
    }

    #[test]
    fn test_overlap_and_intersection() {
        let a = rect(0.0, 0.0, 10.0, 10.0);
        let b = rect(5.0, 5.0, 15.0, 15.0);
        let c = rect(20.0, 20.0, 30.0, 30.0);
        let touching = rect(10.0, 0.0, 12.0, 10.0);

        assert_eq!(a.overlap(&b), 25.0);
        assert_eq!(a.overlap(&c), 0.0);
        assert_eq!(a.overlap(&touching), 0.0);

        assert_eq!(a.intersection(&b), Some(rect(5.0, 5.0, 10.0, 10.0)));
        assert_eq!(a.intersection(&c), None);
        assert_eq!(a.intersection(&touching), Some(rect(10.0, 0.0, 10.0, 10.0)));
    }

    #[test]
    fn test_enlargement() {
        let a = rect(0.0, 0.0, 2.0, 2.0);
        assert_eq!(a.enlargement(&rect(1.0, 1.0, 2.0, 2.0)), 0.0);
        assert_eq!(a.enlargement(&rect(0.0, 0.0, 4.0, 2.0)), 4.0);
    }

    #[test]
    fn test_center_distance() {
        let a = rect(0.0, 0.0, 2.0, 2.0);
        let b = rect(3.0, 4.0, 5.0, 6.0);
        assert_eq!(a.center_distance_sq(&b), 9.0 + 16.0);
        assert_eq!(a.center_distance_sq(&a), 0.0);
    }

    #[test]
    fn test_hash_and_eq() {
        let mut set = HashSet::new();
        set.insert(rect(1.0, 2.0, 3.0, 4.0));
        assert!(set.contains(&rect(1.0, 2.0, 3.0, 4.0)));
        assert!(!set.contains(&rect(1.0, 2.0, 3.0, 5.0)));
    }

    #[test]
    fn test_display() {
        let bbox = rect(1.0, 2.0, 3.0, 4.0);
        assert_eq!(format!("{}", bbox), "Envelope([1, 3], [2, 4])");
    }

    #[test]
    fn test_serialization() {
        let bbox = rect(1.5, 2.5, 3.5, 4.5);
        let json = serde_json::to_string(&bbox).unwrap();
        let deserialized: Envelope = serde_json::from_str(&json).unwrap();
        assert_eq!(bbox, deserialized);
    }
}
