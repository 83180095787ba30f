use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::fs;
use std::sync::Arc;

use btree_index::{BPlusTree, IndexKey, RelationScan, RelationScanError, RowId};
use buffer_pool_manager::disk_manager::DiskManager;
use buffer_pool_manager::pool::SimpleBufferPoolManager;

struct EmptyScan;
impl RelationScan for EmptyScan {
    fn scan_next(&mut self) -> Result<RowId, RelationScanError> {
        Err(RelationScanError::EndOfFile)
    }
    fn get_record(&self) -> &[u8] {
        &[]
    }
}

const NUM_KEYS: i32 = 20_000;
const POOL_SIZE: usize = 500;

fn bench_sequential_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("B+ Tree Insert - Sequential");
    group.sample_size(10);

    group.bench_function("insert_entry", |b| {
        b.iter_custom(|iters| {
            let start = std::time::Instant::now();
            for i in 0..iters {
                let db_file = format!("bench_bptree_seq_{i}.db");
                let _ = fs::remove_file(&db_file);
                let disk_manager = Arc::new(DiskManager::new(&db_file, false).unwrap());
                let bpm = Arc::new(SimpleBufferPoolManager::new(POOL_SIZE, disk_manager));
                let tree = BPlusTree::create(bpm, "bench".to_string(), 0, &mut EmptyScan).unwrap();

                for key in black_box(0..NUM_KEYS) {
                    tree.insert_entry(IndexKey::Integer(key), RowId { page_id: key as usize, slot_index: 0 }).unwrap();
                }

                let _ = fs::remove_file(&db_file);
            }
            start.elapsed()
        });
    });
    group.finish();
}

fn bench_point_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("B+ Tree Search");

    let db_file = "bench_bptree_search.db";
    let _ = fs::remove_file(db_file);
    let disk_manager = Arc::new(DiskManager::new(db_file, false).unwrap());
    let bpm = Arc::new(SimpleBufferPoolManager::new(POOL_SIZE, disk_manager));
    let tree = BPlusTree::create(bpm, "bench".to_string(), 0, &mut EmptyScan).unwrap();

    for key in 0..NUM_KEYS {
        tree.insert_entry(IndexKey::Integer(key), RowId { page_id: key as usize, slot_index: 0 }).unwrap();
    }

    group.bench_function("search", |b| {
        b.iter(|| {
            for key in black_box(0..1000) {
                let _ = black_box(tree.search(&IndexKey::Integer(key)));
            }
        });
    });
    group.finish();

    let _ = fs::remove_file(db_file);
}

criterion_group! {
    name = benches;
    config = Criterion::default().measurement_time(std::time::Duration::from_secs(10));
    targets = bench_sequential_insert, bench_point_search
}
criterion_main!(benches);
