//! ChooseSubtree: which child of a branch receives a new item.

use std::cmp::Ordering;

use crate::envelope::Envelope;

/// Picks the child whose envelope should receive `envelope`.
///
/// By default the child needing the least area enlargement wins, ties going
/// to the smaller resulting area and then the smaller current area. With
/// `by_overlap` the child whose growth adds the least overlap with its
/// siblings wins instead (ties: area enlargement, then area); only the
/// `candidates` children with the least area enlargement are evaluated.
pub(crate) fn choose_subtree(
    children: &[&Envelope],
    envelope: &Envelope,
    by_overlap: bool,
    candidates: usize,
) -> usize {
    let costs: Vec<(f64, f64, f64)> = children
        .iter()
        .map(|child| {
            let grown = child.union(envelope);
            let area = child.area();
            (grown.area() - area, grown.area(), area)
        })
        .collect();

    let mut ranked: Vec<usize> = (0..children.len()).collect();
    ranked.sort_by(|&a, &b| compare(&costs[a], &costs[b]));

    if !by_overlap || children.len() < 2 {
        return ranked.first().copied().unwrap_or(0);
    }

    ranked.truncate(candidates.max(1));
    let mut best = ranked[0];
    let mut best_cost = (f64::INFINITY, f64::INFINITY, f64::INFINITY);
    for &k in &ranked {
        let cost = (
            overlap_enlargement(children, k, envelope),
            costs[k].0,
            costs[k].2,
        );
        if compare(&cost, &best_cost) == Ordering::Less {
            best = k;
            best_cost = cost;
        }
    }
    best
}

/// Growth of the overlap between child `k` and its siblings when `k` is
/// extended to cover `envelope`.
fn overlap_enlargement(children: &[&Envelope], k: usize, envelope: &Envelope) -> f64 {
    let before = children[k];
    let after = before.union(envelope);
    children
        .iter()
        .enumerate()
        .filter(|&(j, _)| j != k)
        .map(|(_, sibling)| after.overlap(sibling) - before.overlap(sibling))
        .sum()
}

fn compare(a: &(f64, f64, f64), b: &(f64, f64, f64)) -> Ordering {
    a.0.total_cmp(&b.0)
        .then_with(|| a.1.total_cmp(&b.1))
        .then_with(|| a.2.total_cmp(&b.2))
}
