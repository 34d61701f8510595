use index_tree::{Envelope, EntryId, FileNodeStore, RTree, TreeConfig, TreeResult};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::{env, fs};

/// Runs a test between its setup and teardown. Teardown runs even when the
/// test panics; the panic is then resumed.
pub fn run_test<T, B, A>(before: B, test: T, after: A)
where
    B: FnOnce() -> TreeResult<TestContext>,
    T: FnOnce(&TestContext) -> TreeResult<()>,
    A: FnOnce(TestContext) -> TreeResult<()>,
{
    let ctx = match before() {
        Ok(ctx) => ctx,
        Err(err) => panic!("Failed to create test context: {}", err),
    };
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| test(&ctx)));
    if let Err(err) = after(ctx) {
        log::warn!("Cleanup failed: {}", err);
    }
    match outcome {
        Ok(Ok(())) => {}
        Ok(Err(err)) => panic!("Test failed: {}", err),
        Err(cause) => panic::resume_unwind(cause),
    }
}

/// A scratch location for one file-backed tree.
pub struct TestContext {
    path: PathBuf,
}

impl TestContext {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn create_tree(&self, config: TreeConfig) -> TreeResult<RTree<FileNodeStore>> {
        RTree::create_file(&self.path, config)
    }

    pub fn open_tree(&self) -> TreeResult<RTree<FileNodeStore>> {
        RTree::open_file(&self.path)
    }
}

pub fn random_path() -> PathBuf {
    let id = uuid::Uuid::new_v4();
    env::temp_dir().join(format!("{}.idx", id))
}

pub fn create_test_context() -> TreeResult<TestContext> {
    Ok(TestContext::new(random_path()))
}

pub fn cleanup(ctx: TestContext) -> TreeResult<()> {
    if ctx.path().exists() {
        fs::remove_file(ctx.path())?;
    }
    Ok(())
}

/// Small random 2D boxes inside `[0, 1000]²`, ids `0..count`.
pub fn random_entries(seed: u64, count: u64) -> Vec<(Envelope, EntryId)> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|id| {
            let x = rng.random_range(0.0..1000.0);
            let y = rng.random_range(0.0..1000.0);
            let w = rng.random_range(0.0..10.0);
            let h = rng.random_range(0.0..10.0);
            (envelope(x, y, x + w, y + h), id)
        })
        .collect()
}

pub fn envelope(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Envelope {
    match Envelope::rect(min_x, min_y, max_x, max_y) {
        Ok(envelope) => envelope,
        Err(err) => panic!("bad test envelope: {}", err),
    }
}

/// Ids of `entries` intersecting `query`, computed by brute force.
pub fn brute_force(entries: &[(Envelope, EntryId)], query: &Envelope) -> Vec<EntryId> {
    let mut ids: Vec<EntryId> = entries
        .iter()
        .filter(|(envelope, _)| envelope.intersects(query))
        .map(|(_, id)| *id)
        .collect();
    ids.sort_unstable();
    ids
}

pub fn sorted(mut ids: Vec<EntryId>) -> Vec<EntryId> {
    ids.sort_unstable();
    ids
}
