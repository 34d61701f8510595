//! Guttman's quadratic split.

use super::distribute;
use crate::envelope::Envelope;

pub(super) fn split(envelopes: &[&Envelope], min: usize) -> (Vec<usize>, Vec<usize>) {
    let seeds = pick_seeds(envelopes);
    distribute(envelopes, seeds, min, |remaining, env1, env2| {
        pick_next(envelopes, remaining, env1, env2)
    })
}

/// The pair wasting the most area when grouped together.
fn pick_seeds(envelopes: &[&Envelope]) -> (usize, usize) {
    let mut best = (0, 1);
    let mut max_waste = f64::NEG_INFINITY;
    for i in 0..envelopes.len() {
        for j in (i + 1)..envelopes.len() {
            let waste = envelopes[i].union(envelopes[j]).area()
                - envelopes[i].area()
                - envelopes[j].area();
            if waste > max_waste {
                max_waste = waste;
                best = (i, j);
            }
        }
    }
    best
}

/// Position in `remaining` of the item with the strongest preference for
/// one group.
fn pick_next(
    envelopes: &[&Envelope],
    remaining: &[usize],
    env1: &Envelope,
    env2: &Envelope,
) -> usize {
    let mut best = 0;
    let mut max_diff = f64::NEG_INFINITY;
    for (pos, &item) in remaining.iter().enumerate() {
        let d1 = env1.enlargement(envelopes[item]);
        let d2 = env2.enlargement(envelopes[item]);
        let diff = (d1 - d2).abs();
        if diff > max_diff {
            max_diff = diff;
            best = pos;
        }
    }
    best
}
