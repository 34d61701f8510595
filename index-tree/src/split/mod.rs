//! Node split and subtree selection algorithms.
//!
//! The algorithms work on the envelopes of a node's items and return item
//! positions, so the same code splits leaves and branches. Which algorithm a
//! tree uses is fixed at construction through [`SplitStrategy`].

use serde::{Deserialize, Serialize};

use crate::envelope::Envelope;

mod choose;
mod linear;
mod quadratic;
mod rstar;

pub(crate) use choose::choose_subtree;

/// Insertion and split algorithm of a tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SplitStrategy {
    /// Guttman's linear split: seeds by greatest normalized separation.
    Linear,
    /// Guttman's quadratic split: seeds by greatest wasted area.
    #[default]
    Quadratic,
    /// R*-tree: overlap-aware subtree choice, forced reinsertion and the
    /// margin/overlap driven topological split.
    RStar,
    /// Hilbert-packed tree built by [`RTree::bulk_load`](crate::RTree::bulk_load).
    /// Incremental updates after packing use the R* algorithms.
    Hilbert,
}

impl SplitStrategy {
    /// True when inserts follow the R* rules (overlap enlargement at the
    /// leaf parents, forced reinsertion, topological split).
    pub fn uses_rstar(&self) -> bool {
        matches!(self, SplitStrategy::RStar | SplitStrategy::Hilbert)
    }
}

/// Partitions `envelopes` into two groups of at least `min` items each.
///
/// Returns the item positions of both groups. Needs at least two items.
pub(crate) fn split_groups(
    strategy: SplitStrategy,
    envelopes: &[&Envelope],
    min: usize,
) -> (Vec<usize>, Vec<usize>) {
    let min = min.clamp(1, envelopes.len() / 2);
    match strategy {
        SplitStrategy::Linear => linear::split(envelopes, min),
        SplitStrategy::Quadratic => quadratic::split(envelopes, min),
        SplitStrategy::RStar | SplitStrategy::Hilbert => rstar::split(envelopes, min),
    }
}

/// Distributes the items not taken as seeds, Guttman style: each item goes to
/// the group whose envelope grows least (ties: smaller area, then fewer
/// items), and once a group needs every remaining item to reach `min` it
/// takes them all. `pick_next` chooses which remaining item to place next.
fn distribute<F>(
    envelopes: &[&Envelope],
    seeds: (usize, usize),
    min: usize,
    mut pick_next: F,
) -> (Vec<usize>, Vec<usize>)
where
    F: FnMut(&[usize], &Envelope, &Envelope) -> usize,
{
    let (s1, s2) = seeds;
    let mut group1 = vec![s1];
    let mut group2 = vec![s2];
    let mut env1 = envelopes[s1].clone();
    let mut env2 = envelopes[s2].clone();
    let mut remaining: Vec<usize> = (0..envelopes.len()).filter(|&i| i != s1 && i != s2).collect();

    while !remaining.is_empty() {
        if group1.len() + remaining.len() <= min {
            group1.append(&mut remaining);
            break;
        }
        if group2.len() + remaining.len() <= min {
            group2.append(&mut remaining);
            break;
        }

        let pos = pick_next(&remaining, &env1, &env2);
        let item = remaining.swap_remove(pos);
        let envelope = envelopes[item];

        let d1 = env1.enlargement(envelope);
        let d2 = env2.enlargement(envelope);
        let to_first = if d1 != d2 {
            d1 < d2
        } else if env1.area() != env2.area() {
            env1.area() < env2.area()
        } else {
            group1.len() <= group2.len()
        };

        if to_first {
            group1.push(item);
            env1.expand(envelope);
        } else {
            group2.push(item);
            env2.expand(envelope);
        }
    }
    (group1, group2)
}
