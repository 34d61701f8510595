use index_tree::{Envelope, MemoryNodeStore, NodeStore, RTree, SplitStrategy, TreeConfig};
use index_tree_int_test::test_util::{brute_force, envelope, random_entries, sorted};

const STRATEGIES: [SplitStrategy; 4] = [
    SplitStrategy::Linear,
    SplitStrategy::Quadratic,
    SplitStrategy::RStar,
    SplitStrategy::Hilbert,
];

fn queries() -> Vec<Envelope> {
    vec![
        envelope(0.0, 0.0, 1000.0, 1000.0),
        envelope(100.0, 100.0, 200.0, 150.0),
        envelope(500.0, 0.0, 505.0, 1000.0),
        envelope(990.0, 990.0, 2000.0, 2000.0),
        envelope(-10.0, -10.0, -1.0, -1.0),
        envelope(333.3, 333.3, 333.3, 333.3),
    ]
}

#[test]
fn test_queries_match_brute_force() {
    let entries = random_entries(1, 2000);
    for strategy in STRATEGIES {
        let config = TreeConfig::new(12, 2).with_strategy(strategy);
        let mut tree = RTree::new(config).unwrap();
        for (envelope, id) in &entries {
            tree.insert(envelope.clone(), *id).unwrap();
        }
        assert_eq!(tree.len(), 2000);
        assert!(tree.check_boundaries());

        for query in queries() {
            let expected = brute_force(&entries, &query);
            assert_eq!(sorted(tree.query(&query).unwrap().collect()), expected, "{:?}", strategy);
            assert_eq!(sorted(tree.search(&query).unwrap()), expected, "{:?}", strategy);
        }
    }
}

#[test]
fn test_mixed_workload_keeps_tree_valid() {
    let entries = random_entries(2, 1500);
    for strategy in STRATEGIES {
        let config = TreeConfig::new(8, 2)
            .with_min_elements(3)
            .with_strategy(strategy);
        let mut tree = RTree::new(config).unwrap();
        let mut live = Vec::new();

        for (i, (envelope, id)) in entries.iter().enumerate() {
            tree.insert(envelope.clone(), *id).unwrap();
            live.push((envelope.clone(), *id));
            // every third step removes the oldest live entry
            if i % 3 == 2 {
                let (old, old_id) = live.remove(0);
                assert!(tree.delete(&old, old_id).unwrap());
            }
        }
        assert_eq!(tree.len(), live.len() as u64);
        let report = tree.validate();
        assert!(report.is_valid(), "{:?}: {:?}", strategy, report);

        for query in queries() {
            assert_eq!(
                sorted(tree.search(&query).unwrap()),
                brute_force(&live, &query),
                "{:?}",
                strategy
            );
        }
    }
}

#[test]
fn test_bulk_load_matches_incremental() {
    let entries = random_entries(3, 5000);
    let config = TreeConfig::new(16, 2).with_strategy(SplitStrategy::Hilbert);
    let packed = RTree::bulk_load(config.clone(), MemoryNodeStore::new(), entries.clone()).unwrap();

    let mut incremental = RTree::new(config).unwrap();
    for (envelope, id) in &entries {
        incremental.insert(envelope.clone(), *id).unwrap();
    }

    // 16^3 < 5000 <= 16^4
    assert_eq!(packed.height(), 4);
    assert!(packed.validate().is_valid());
    assert!(packed.store().node_count() <= incremental.store().node_count());
    for query in queries() {
        assert_eq!(
            sorted(packed.search(&query).unwrap()),
            sorted(incremental.search(&query).unwrap())
        );
    }
}

#[test]
fn test_higher_dimensions() {
    let config = TreeConfig::new(10, 4).with_strategy(SplitStrategy::RStar);
    let mut tree = RTree::new(config).unwrap();
    for i in 0..500u64 {
        let v = (i % 50) as f64;
        let w = (i / 50) as f64;
        let lower = vec![v, w, v + w, v - w];
        let upper = lower.iter().map(|c| c + 0.5).collect();
        tree.insert(Envelope::new(lower, upper).unwrap(), i).unwrap();
    }
    assert!(tree.validate().is_valid());

    let query = Envelope::new(vec![10.0, 3.0, 13.0, 7.0], vec![10.1, 3.1, 13.1, 7.1]).unwrap();
    assert_eq!(tree.search(&query).unwrap(), vec![160]);
}
