use index_tree::{NodeStore, SplitStrategy, TreeConfig, TreeError};
use index_tree_int_test::test_util::{
    brute_force, cleanup, create_test_context, envelope, random_entries, run_test, sorted,
};
use std::fs::OpenOptions;
use std::io::{Seek, SeekFrom, Write};

#[test]
fn test_reopen_preserves_entries() {
    run_test(
        || create_test_context(),
        |ctx| {
            let entries = random_entries(10, 3000);
            {
                let config = TreeConfig::new(24, 2)
                    .with_strategy(SplitStrategy::RStar)
                    .with_crs("EPSG:4326");
                let mut tree = ctx.create_tree(config)?;
                for (envelope, id) in &entries {
                    tree.insert(envelope.clone(), *id)?;
                }
                tree.flush()?;
            }

            let tree = ctx.open_tree()?;
            assert_eq!(tree.len(), 3000);
            assert_eq!(tree.crs(), Some("EPSG:4326"));
            assert_eq!(tree.config().strategy(), SplitStrategy::RStar);
            assert!(tree.validate().is_valid());

            let query = envelope(250.0, 250.0, 400.0, 300.0);
            assert_eq!(sorted(tree.search(&query)?), brute_force(&entries, &query));
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_updates_after_reopen() {
    run_test(
        || create_test_context(),
        |ctx| {
            let entries = random_entries(11, 1200);
            let (first, second) = entries.split_at(600);
            {
                let mut tree = ctx.create_tree(TreeConfig::new(16, 2))?;
                for (envelope, id) in first {
                    tree.insert(envelope.clone(), *id)?;
                }
            }
            {
                let mut tree = ctx.open_tree()?;
                for (envelope, id) in second {
                    tree.insert(envelope.clone(), *id)?;
                }
                for (envelope, id) in first.iter().take(300) {
                    assert!(tree.delete(envelope, *id)?);
                }
            }

            let tree = ctx.open_tree()?;
            assert_eq!(tree.len(), 900);
            assert!(tree.validate().is_valid());
            let live = &entries[300..];
            let query = envelope(0.0, 0.0, 500.0, 500.0);
            assert_eq!(sorted(tree.search(&query)?), brute_force(live, &query));
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_bulk_load_into_file() {
    run_test(
        || create_test_context(),
        |ctx| {
            let entries = random_entries(12, 2000);
            let config = TreeConfig::new(20, 2).with_strategy(SplitStrategy::Hilbert);
            let store = index_tree::FileNodeStore::create(ctx.path(), &config)?;
            {
                let mut tree = index_tree::RTree::bulk_load(config, store, entries.clone())?;
                tree.flush()?;
            }

            let tree = ctx.open_tree()?;
            assert_eq!(tree.len(), 2000);
            assert_eq!(tree.height(), 3);
            for (envelope, id) in entries.iter().step_by(97) {
                assert!(tree.query(envelope)?.any(|found| found == *id));
            }
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_damaged_page_is_skipped_by_queries() {
    run_test(
        || create_test_context(),
        |ctx| {
            let entries = random_entries(13, 800);
            let (leaf_id, lost, page_size) = {
                let mut tree = ctx.create_tree(TreeConfig::new(8, 2))?;
                for (envelope, id) in &entries {
                    tree.insert(envelope.clone(), *id)?;
                }
                let mut node = tree.root()?;
                while !node.is_leaf() {
                    node = tree.node(node.children()[0].node)?;
                }
                tree.flush()?;
                (node.id(), node.len(), tree.store().page_size() as u64)
            };

            let mut file = OpenOptions::new().write(true).open(ctx.path())?;
            file.seek(SeekFrom::Start(leaf_id * page_size + 40))?;
            file.write_all(&[0x5A; 16])?;
            drop(file);

            let tree = ctx.open_tree()?;
            let everything = envelope(-1.0, -1.0, 2000.0, 2000.0);
            {
                let mut iter = tree.query(&everything)?;
                let found = iter.by_ref().count();
                assert_eq!(found, 800 - lost);
                assert_eq!(iter.skipped(), 1);
            }

            assert!(matches!(tree.search(&everything), Err(TreeError::StoreIndex(_))));
            assert!(!tree.check_boundaries());
            assert_eq!(tree.validate().unreadable, vec![leaf_id]);

            let mut store = tree.into_store();
            let report = store.check_integrity()?;
            assert_eq!(report.corrupted_pages, vec![leaf_id]);
            assert!(store.node_count() > 1);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_truncated_file_reports_store_error() {
    run_test(
        || create_test_context(),
        |ctx| {
            let page_size = {
                let mut tree = ctx.create_tree(TreeConfig::new(8, 2))?;
                for (envelope, id) in random_entries(14, 200) {
                    tree.insert(envelope, id)?;
                }
                tree.flush()?;
                tree.store().page_size() as u64
            };

            let file = OpenOptions::new().write(true).open(ctx.path())?;
            let len = file.metadata()?.len();
            file.set_len(len - page_size / 2)?;
            drop(file);

            let tree = ctx.open_tree()?;
            let result = tree.search(&envelope(-1.0, -1.0, 2000.0, 2000.0));
            match result {
                Err(TreeError::StoreIndex(msg)) => assert!(msg.contains("truncated"), "{}", msg),
                other => panic!("expected a store error, got {:?}", other),
            }
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_file_keeps_its_config() {
    run_test(
        || create_test_context(),
        |ctx| {
            let entries = random_entries(15, 300);
            {
                let mut tree = ctx.create_tree(TreeConfig::new(16, 2))?;
                for (envelope, id) in &entries {
                    tree.insert(envelope.clone(), *id)?;
                }
                tree.flush()?;
            }

            let store = index_tree::FileNodeStore::open(ctx.path())?;
            let result = index_tree::RTree::bulk_load(TreeConfig::new(4, 3), store, Vec::new());
            assert!(matches!(result, Err(TreeError::InvalidArgument(_))));

            let store = index_tree::FileNodeStore::open(ctx.path())?;
            let result = index_tree::RTree::with_store(TreeConfig::new(4, 2), store);
            assert!(matches!(result, Err(TreeError::InvalidArgument(_))));

            let tree = ctx.open_tree()?;
            assert_eq!(tree.len(), 300);
            assert_eq!(tree.config().max_elements(), 16);
            assert!(tree.validate().is_valid());
            let query = envelope(100.0, 100.0, 600.0, 400.0);
            assert_eq!(sorted(tree.search(&query)?), brute_force(&entries, &query));
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}
