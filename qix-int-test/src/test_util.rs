use qix_index::{
    ByteOrderCode, Envelope, FileSystemNode, FileSystemQuadTree, IndexResult, IndexStore,
    MemoryNode, MemoryQuadTree, ShapeId,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::backtrace::Backtrace;
use std::io::{Read, Seek};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tempfile::TempDir;

/// Runs a test between a setup and a teardown step.
/// The teardown always runs, also when the test fails or panics.
pub fn run_test<T, B, A>(before: B, test: T, after: A)
where
    T: Fn(TestContext) -> IndexResult<()>,
    B: Fn() -> IndexResult<TestContext>,
    A: Fn(TestContext) -> IndexResult<()>,
{
    let ctx = match before() {
        Ok(ctx) => ctx,
        Err(e) => panic!("Before run failed: {:?}", e),
    };

    let start_time = Instant::now();
    let result = catch_unwind(AssertUnwindSafe(|| test(ctx.clone())));
    let elapsed = start_time.elapsed();
    let after_result = after(ctx);

    match result {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            eprintln!("\n==================== TEST FAILED ====================");
            eprintln!("Failed after {:?}", elapsed);
            eprintln!("Error: {:?}", e);
            let bt = Backtrace::capture().to_string();
            if !bt.is_empty() && !bt.contains("disabled") {
                eprintln!("\nBacktrace:\n{}", bt);
            }
            eprintln!("=====================================================\n");
            panic!("Test failed: {:?}", e);
        }
        Err(panic_err) => {
            let err_msg = if let Some(s) = panic_err.downcast_ref::<&str>() {
                s.to_string()
            } else if let Some(s) = panic_err.downcast_ref::<String>() {
                s.clone()
            } else {
                "Unknown panic".to_string()
            };
            panic!("Test panicked after {:?}: {}", elapsed, err_msg);
        }
    }

    if let Err(e) = after_result {
        panic!("After run failed: {:?}", e);
    }
}

#[derive(Clone)]
pub struct TestContext {
    dir: Arc<TempDir>,
    index_path: PathBuf,
}

impl TestContext {
    pub fn new(dir: TempDir) -> Self {
        let index_path = dir.path().join("test.qix");
        Self {
            dir: Arc::new(dir),
            index_path,
        }
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    /// A store for the context's index file.
    pub fn store(&self, byte_order: ByteOrderCode) -> IndexStore {
        IndexStore::new(&self.index_path, byte_order)
    }
}

pub fn create_test_context() -> IndexResult<TestContext> {
    let dir = tempfile::Builder::new().prefix("qix_").tempdir()?;
    Ok(TestContext::new(dir))
}

pub fn cleanup(ctx: TestContext) -> IndexResult<()> {
    match Arc::try_unwrap(ctx.dir) {
        Ok(dir) => dir.close()?,
        Err(_) => log::warn!("test directory is still in use, removing it on drop"),
    }
    Ok(())
}

/// Small records scattered over the whole lon/lat range.
pub fn random_records(count: usize, seed: u64) -> Vec<(ShapeId, Envelope)> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|i| {
            let x = rng.random_range(-180.0..178.0);
            let y = rng.random_range(-90.0..88.0);
            let w = rng.random_range(0.0..2.0);
            let h = rng.random_range(0.0..2.0);
            (i as ShapeId, Envelope::new(x, y, x + w, y + h))
        })
        .collect()
}

/// Unit squares on a `cols` x `rows` grid with a gap of one unit between
/// them. Ids run row by row.
pub fn grid_records(cols: u32, rows: u32) -> Vec<(ShapeId, Envelope)> {
    let mut records = Vec::with_capacity((cols * rows) as usize);
    for row in 0..rows {
        for col in 0..cols {
            let x = col as f64 * 2.0;
            let y = row as f64 * 2.0;
            records.push((row * cols + col, Envelope::new(x, y, x + 1.0, y + 1.0)));
        }
    }
    records
}

pub fn build_tree(
    records: &[(ShapeId, Envelope)],
    leaf_size: usize,
) -> IndexResult<MemoryQuadTree> {
    MemoryQuadTree::from_records(records.iter().copied(), leaf_size)
}

/// Ids of all records whose bounds intersect `query`, sorted.
pub fn brute_force(records: &[(ShapeId, Envelope)], query: &Envelope) -> Vec<ShapeId> {
    let mut ids: Vec<ShapeId> = records
        .iter()
        .filter(|(_, bounds)| bounds.intersects(query))
        .map(|(id, _)| *id)
        .collect();
    ids.sort_unstable();
    ids
}

pub fn sorted(mut ids: Vec<ShapeId>) -> Vec<ShapeId> {
    ids.sort_unstable();
    ids
}

/// Walks a loaded tree alongside the in-memory node it was written from,
/// comparing envelope, ids and child count at every node. Returns the
/// number of nodes compared.
pub fn assert_same_structure<R: Read + Seek>(
    loaded: &FileSystemQuadTree<R>,
    disk: &FileSystemNode,
    memory: &MemoryNode,
) -> IndexResult<usize> {
    assert_eq!(disk.envelope(), memory.envelope());
    assert_eq!(disk.shape_ids(), memory.shape_ids());
    assert_eq!(disk.num_sub_nodes(), memory.sub_nodes().len());

    let mut compared = 1;
    for (index, child) in memory.sub_nodes().iter().enumerate() {
        let disk_child = loaded.sub_node(disk, index)?;
        compared += assert_same_structure(loaded, &disk_child, child)?;
    }
    Ok(compared)
}
