use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::sync::Arc;
use buffer_pool_manager::api::BufferPoolManager;
use buffer_pool_manager::disk_manager::DiskManager;
use buffer_pool_manager::pool::SimpleBufferPoolManager;
use std::fs;

const POOL_SIZE: usize = 100;
const NUM_PAGES: usize = 1000;

fn setup_disk_manager(db_file: &str, use_direct_io: bool) -> Arc<DiskManager> {
    let _ = fs::remove_file(db_file);
    Arc::new(DiskManager::new(db_file, use_direct_io).unwrap())
}

fn bench_write_pages(c: &mut Criterion, id: &str, use_direct_io: bool) {
    let mut group = c.benchmark_group(format!("Write Pages - {}", id));
    group.sample_size(10);

    group.bench_function("new_page", |b| {
        b.iter_custom(|iters| {
            let start = std::time::Instant::now();
            for i in 0..iters {
                let db_file = format!("{}_write_{}.db", id, i);
                let disk_manager = setup_disk_manager(&db_file, use_direct_io);
                let bpm = SimpleBufferPoolManager::new(POOL_SIZE, disk_manager);
                for _ in 0..black_box(NUM_PAGES) {
                    let _page = black_box(bpm.new_page().unwrap());
                }
                black_box(bpm.flush_all_pages().unwrap());
                let _ = fs::remove_file(&db_file);
            }
            start.elapsed()
        });
    });
    group.finish();
}

fn bench_read_pages(c: &mut Criterion, id: &str, use_direct_io: bool) {
    let mut group = c.benchmark_group(format!("Read Pages - {}", id));
    group.sample_size(10);

    let db_file = format!("{}_read.db", id);
    let disk_manager = setup_disk_manager(&db_file, use_direct_io);
    let bpm = SimpleBufferPoolManager::new(POOL_SIZE, disk_manager);
    let mut page_ids = Vec::with_capacity(NUM_PAGES);
    for _ in 0..NUM_PAGES {
        let page = bpm.new_page().unwrap();
        page_ids.push(page.page_id());
    }
    bpm.flush_all_pages().unwrap();

    group.bench_function("fetch_page", |b| {
        b.iter(|| {
            for &page_id in black_box(&page_ids) {
                let _page = black_box(bpm.fetch_page(page_id).unwrap());
            }
        });
    });
    group.finish();

    let _ = fs::remove_file(db_file);
}

fn bpm_benchmarks(c: &mut Criterion) {
    bench_write_pages(c, "SimpleBPM_OSCache", false);
    bench_write_pages(c, "SimpleBPM_DirectIO", true);

    bench_read_pages(c, "SimpleBPM_OSCache", false);
    bench_read_pages(c, "SimpleBPM_DirectIO", true);
}

criterion_group!{
    name = benches;
    config = Criterion::default().measurement_time(std::time::Duration::from_secs(10));
    targets = bpm_benchmarks
}
criterion_main!(benches);
