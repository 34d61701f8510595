//! R*-tree topological split.
//!
//! For every axis the items are sorted by lower and by upper bound, and each
//! sorting yields the distributions whose first group holds `min..=n - min`
//! items. The split axis minimizes the summed margins of all its
//! distributions; on that axis the distribution with the least overlap
//! between the two groups wins, ties going to the least total area.

use std::cmp::Ordering;

use crate::envelope::Envelope;

pub(super) fn split(envelopes: &[&Envelope], min: usize) -> (Vec<usize>, Vec<usize>) {
    let dimension = envelopes[0].dimension();

    let mut best_axis_orders = None;
    let mut best_margin = f64::INFINITY;
    for axis in 0..dimension {
        let orders = [
            sorted_by(envelopes, |e| (e.lower()[axis], e.upper()[axis])),
            sorted_by(envelopes, |e| (e.upper()[axis], e.lower()[axis])),
        ];
        let margin: f64 = orders
            .iter()
            .map(|order| {
                distributions(envelopes, order, min)
                    .map(|d| d.first.margin() + d.second.margin())
                    .sum::<f64>()
            })
            .sum();
        if margin < best_margin {
            best_margin = margin;
            best_axis_orders = Some(orders);
        }
    }

    let Some(orders) = best_axis_orders else {
        let half = envelopes.len() / 2;
        return ((0..half).collect(), (half..envelopes.len()).collect());
    };

    let mut best: Option<(usize, usize, f64, f64)> = None;
    for (which, order) in orders.iter().enumerate() {
        for d in distributions(envelopes, order, min) {
            let overlap = d.first.overlap(&d.second);
            let area = d.first.area() + d.second.area();
            let better = match best {
                None => true,
                Some((_, _, best_overlap, best_area)) => {
                    overlap < best_overlap || (overlap == best_overlap && area < best_area)
                }
            };
            if better {
                best = Some((which, d.split_at, overlap, area));
            }
        }
    }

    let (which, split_at) = best.map(|(w, k, _, _)| (w, k)).unwrap_or((0, min));
    let order = &orders[which];
    (order[..split_at].to_vec(), order[split_at..].to_vec())
}

fn sorted_by<F>(envelopes: &[&Envelope], key: F) -> Vec<usize>
where
    F: Fn(&Envelope) -> (f64, f64),
{
    let mut order: Vec<usize> = (0..envelopes.len()).collect();
    order.sort_by(|&a, &b| {
        let (a1, a2) = key(envelopes[a]);
        let (b1, b2) = key(envelopes[b]);
        match a1.total_cmp(&b1) {
            Ordering::Equal => a2.total_cmp(&b2),
            other => other,
        }
    });
    order
}

struct Distribution {
    split_at: usize,
    first: Envelope,
    second: Envelope,
}

/// Every distribution of `order` into a prefix of `min..=n - min` items and
/// the rest, with the envelopes of both groups.
fn distributions<'a>(
    envelopes: &'a [&Envelope],
    order: &'a [usize],
    min: usize,
) -> impl Iterator<Item = Distribution> + 'a {
    let n = order.len();
    let prefix = running_unions(order.iter().map(|&i| envelopes[i]));
    let mut suffix = running_unions(order.iter().rev().map(|&i| envelopes[i]));
    suffix.reverse();

    (min..=n.saturating_sub(min))
        .filter(move |&k| k >= 1 && k < n)
        .map(move |k| Distribution {
            split_at: k,
            first: prefix[k - 1].clone(),
            second: suffix[k].clone(),
        })
}

/// `result[i]` is the union of the first `i + 1` envelopes.
fn running_unions<'a, I>(envelopes: I) -> Vec<Envelope>
where
    I: Iterator<Item = &'a Envelope>,
{
    let mut out: Vec<Envelope> = Vec::new();
    for env in envelopes {
        let next = match out.last() {
            Some(acc) => acc.union(env),
            None => env.clone(),
        };
        out.push(next);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;

    #[test]
    fn test_running_unions() {
        let envs = rects(&[(0.0, 0.0, 1.0, 1.0), (2.0, 2.0, 3.0, 3.0), (-1.0, 0.0, 0.0, 0.5)]);
        let unions = running_unions(envs.iter());
        assert_eq!(unions[0], envs[0]);
        assert_eq!(unions[1], Envelope::rect(0.0, 0.0, 3.0, 3.0).unwrap());
        assert_eq!(unions[2], Envelope::rect(-1.0, 0.0, 3.0, 3.0).unwrap());
    }

    #[test]
    fn test_distribution_range() {
        let envs = rects(&[(0.0, 0.0, 1.0, 1.0); 5]);
        let refs: Vec<&Envelope> = envs.iter().collect();
        let order: Vec<usize> = (0..5).collect();
        let splits: Vec<usize> = distributions(&refs, &order, 2).map(|d| d.split_at).collect();
        assert_eq!(splits, vec![2, 3]);
    }

    #[test]
    fn test_split_chooses_axis_with_least_margin() {
        // a row of boxes along x: splitting across x gives disjoint groups
        let envs = rects(&[
            (0.0, 0.0, 1.0, 1.0),
            (4.0, 0.0, 5.0, 1.0),
            (1.5, 0.0, 2.5, 1.0),
            (6.0, 0.0, 7.0, 1.0),
            (3.0, 0.0, 3.5, 1.0),
        ]);
        let refs: Vec<&Envelope> = envs.iter().collect();
        let groups = split(&refs, 2);
        assert_partition(&groups, 5, 2);

        let first = Envelope::union_all(groups.0.iter().map(|&i| &envs[i])).unwrap();
        let second = Envelope::union_all(groups.1.iter().map(|&i| &envs[i])).unwrap();
        assert_eq!(first.overlap(&second), 0.0);
    }

    #[test]
    fn test_split_prefers_least_overlap() {
        let envs = rects(&[
            (0.0, 0.0, 2.0, 2.0),
            (1.0, 1.0, 3.0, 3.0),
            (8.0, 8.0, 10.0, 10.0),
            (9.0, 9.0, 11.0, 11.0),
        ]);
        let refs: Vec<&Envelope> = envs.iter().collect();
        let groups = split(&refs, 2);
        assert_eq!(sorted(groups.0), vec![0, 1]);
        assert_eq!(sorted(groups.1), vec![2, 3]);
    }
}
