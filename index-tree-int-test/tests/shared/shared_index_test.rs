use index_tree::{EnvelopeIndex, RTree, SharedRTree, SplitStrategy, TreeConfig, TreeError};
use index_tree_int_test::test_util::{
    brute_force, cleanup, create_test_context, envelope, random_entries, run_test, sorted,
};
use std::sync::Arc;
use std::thread;

#[test]
fn test_parallel_writers_and_readers() {
    let config = TreeConfig::new(16, 2).with_strategy(SplitStrategy::RStar);
    let index = SharedRTree::new(RTree::new(config).unwrap());
    let entries = Arc::new(random_entries(20, 4000));

    let mut handles = Vec::new();
    for worker in 0..4usize {
        let index = index.clone();
        let entries = Arc::clone(&entries);
        handles.push(thread::spawn(move || {
            for (envelope, id) in entries.iter().skip(worker).step_by(4) {
                index.add(envelope, *id).unwrap();
            }
        }));
    }
    for _ in 0..2 {
        let index = index.clone();
        handles.push(thread::spawn(move || {
            let query = envelope(0.0, 0.0, 1000.0, 1000.0);
            for _ in 0..50 {
                let found = index.find_intersecting_keys(&query).unwrap();
                assert!(found.len() as u64 <= 4000);
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(index.size(), 4000);
    assert!(index.validate().unwrap().is_valid());
    let query = envelope(100.0, 600.0, 300.0, 700.0);
    assert_eq!(
        sorted(index.find_intersecting_keys(&query).unwrap()),
        brute_force(&entries, &query)
    );
}

#[test]
fn test_index_as_trait_object() {
    let config = TreeConfig::new(8, 2);
    let index: Box<dyn EnvelopeIndex> = Box::new(SharedRTree::new(RTree::new(config).unwrap()));

    index.add(&envelope(0.0, 0.0, 2.0, 2.0), 1).unwrap();
    index.add(&envelope(1.0, 1.0, 3.0, 3.0), 2).unwrap();
    assert_eq!(sorted(index.find_intersecting_keys(&envelope(2.0, 2.0, 2.0, 2.0)).unwrap()), vec![1, 2]);
    assert_eq!(index.find_contained_keys(&envelope(0.0, 0.0, 2.5, 2.5)).unwrap(), vec![1]);

    index.clear().unwrap();
    assert_eq!(index.size(), 0);
    index.close().unwrap();
    assert!(matches!(index.remove(&envelope(0.0, 0.0, 2.0, 2.0), 1), Err(TreeError::Closed)));
}

#[test]
fn test_shared_file_index_survives_close() {
    run_test(
        || create_test_context(),
        |ctx| {
            let entries = random_entries(21, 1000);
            {
                let index = SharedRTree::new(ctx.create_tree(TreeConfig::new(16, 2))?);
                for (envelope, id) in &entries {
                    index.add(envelope, *id)?;
                }
                index.rebuild()?;
                index.close()?;
            }

            let index = SharedRTree::new(ctx.open_tree()?);
            assert_eq!(index.size(), 1000);
            assert!(index.check_boundaries()?);
            let query = envelope(400.0, 400.0, 600.0, 600.0);
            assert_eq!(sorted(index.find_intersecting_keys(&query)?), brute_force(&entries, &query));
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}
