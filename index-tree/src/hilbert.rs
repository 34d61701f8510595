//! Hilbert curve utilities for spatial locality optimization.
//!
//! The Hilbert curve is a continuous space-filling curve mapping the cells
//! of an N-dimensional grid to a 1D index so that consecutive indices are
//! neighbouring cells. Packing entries in Hilbert order keeps nearby entries
//! in the same nodes.
//!
//! Indices are computed with Skilling's transpose algorithm ("Programming the
//! Hilbert curve", 2004) and returned as `u128`, so `dimension * order` must
//! not exceed 128 bits.

use crate::constants::MAX_HILBERT_BITS;
use crate::envelope::Envelope;

/// Hilbert index of a grid cell.
///
/// `cell` holds one coordinate per axis, each in `0..2^order`.
///
/// # Example
/// ```
/// use index_tree::hilbert::hilbert_index;
///
/// // order 1 in 2D visits (0,0), (0,1), (1,1), (1,0)
/// assert_eq!(hilbert_index(&[0, 0], 1), 0);
/// assert_eq!(hilbert_index(&[0, 1], 1), 1);
/// assert_eq!(hilbert_index(&[1, 1], 1), 2);
/// assert_eq!(hilbert_index(&[1, 0], 1), 3);
/// ```
pub fn hilbert_index(cell: &[u128], order: u32) -> u128 {
    let dims = cell.len();
    debug_assert!(order >= 1 && dims >= 1);
    debug_assert!(dims as u64 * order as u64 <= MAX_HILBERT_BITS as u64);

    let mut x = cell.to_vec();
    let top: u128 = 1 << (order - 1);

    // inverse undo
    let mut q = top;
    while q > 1 {
        let p = q - 1;
        for i in 0..dims {
            if x[i] & q != 0 {
                x[0] ^= p;
            } else {
                let t = (x[0] ^ x[i]) & p;
                x[0] ^= t;
                x[i] ^= t;
            }
        }
        q >>= 1;
    }

    // gray encode
    for i in 1..dims {
        x[i] ^= x[i - 1];
    }
    let mut t: u128 = 0;
    let mut q = top;
    while q > 1 {
        if x[dims - 1] & q != 0 {
            t ^= q - 1;
        }
        q >>= 1;
    }
    for v in x.iter_mut() {
        *v ^= t;
    }

    // interleave the transposed form, most significant bits first
    let mut index: u128 = 0;
    for bit in (0..order).rev() {
        for v in &x {
            index = (index << 1) | ((v >> bit) & 1);
        }
    }
    index
}

/// Grid cell of `value` when `lower..=upper` is divided into `2^order`
/// cells. A zero-width range maps everything to cell 0.
pub fn grid_cell(value: f64, lower: f64, upper: f64, order: u32) -> u128 {
    let range = upper - lower;
    if range <= 0.0 {
        return 0;
    }
    let cells = 2f64.powi(order as i32);
    let max_cell = if order >= 128 { u128::MAX } else { (1u128 << order) - 1 };
    let normalized = ((value - lower) / range).clamp(0.0, 1.0);
    ((normalized * cells) as u128).min(max_cell)
}

/// Hilbert index of a point after normalizing it over `bounds`.
pub fn hilbert_index_bounded(point: &[f64], bounds: &Envelope, order: u32) -> u128 {
    let cell: Vec<u128> = point
        .iter()
        .enumerate()
        .map(|(axis, &v)| grid_cell(v, bounds.lower()[axis], bounds.upper()[axis], order))
        .collect();
    hilbert_index(&cell, order)
}
