//! Guttman's linear split.

use super::distribute;
use crate::envelope::Envelope;

pub(super) fn split(envelopes: &[&Envelope], min: usize) -> (Vec<usize>, Vec<usize>) {
    let seeds = pick_seeds(envelopes);
    // items are placed in their original order
    distribute(envelopes, seeds, min, |remaining, _, _| {
        remaining
            .iter()
            .enumerate()
            .min_by_key(|(_, &item)| item)
            .map(|(pos, _)| pos)
            .unwrap_or(0)
    })
}

/// Along every axis, pairs the item with the highest lower bound and the
/// item with the lowest upper bound, normalizes their separation by the
/// width of the whole set and keeps the most separated pair.
fn pick_seeds(envelopes: &[&Envelope]) -> (usize, usize) {
    let dimension = envelopes[0].dimension();
    let mut best = (0, 1);
    let mut best_separation = f64::NEG_INFINITY;

    for axis in 0..dimension {
        let mut highest_low = 0;
        let mut lowest_high = 0;
        let mut min_low = f64::INFINITY;
        let mut max_high = f64::NEG_INFINITY;
        for (i, env) in envelopes.iter().enumerate() {
            if env.lower()[axis] > envelopes[highest_low].lower()[axis] {
                highest_low = i;
            }
            if env.upper()[axis] < envelopes[lowest_high].upper()[axis] {
                lowest_high = i;
            }
            min_low = min_low.min(env.lower()[axis]);
            max_high = max_high.max(env.upper()[axis]);
        }

        if highest_low == lowest_high {
            // the same item bounds both sides, pair it with the next lowest high
            lowest_high = (0..envelopes.len())
                .filter(|&i| i != highest_low)
                .min_by(|&a, &b| envelopes[a].upper()[axis].total_cmp(&envelopes[b].upper()[axis]))
                .unwrap_or(if highest_low == 0 { 1 } else { 0 });
        }

        let width = max_high - min_low;
        let gap = envelopes[highest_low].lower()[axis] - envelopes[lowest_high].upper()[axis];
        let separation = if width > 0.0 { gap / width } else { 0.0 };
        if separation > best_separation {
            best_separation = separation;
            best = (lowest_high, highest_low);
        }
    }
    best
}
