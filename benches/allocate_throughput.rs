//! Benchmarks for tracking id allocation.
//!
//! Run with: cargo bench
//! View results in: target/criterion/report/index.html

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tempfile::TempDir;
use tokio::runtime::Runtime;
use trackseq::allocator::{AllocatorConfig, DurableAllocator, InMemoryAllocator};
use trackseq::contracts::{DateKey, Prefix, TrackingId, TrackingIdAllocator};
use trackseq::storage::RocksDbSequenceStore;

fn durable_allocator() -> (Arc<DurableAllocator<RocksDbSequenceStore>>, TempDir) {
    let dir = TempDir::new().unwrap();
    let store = RocksDbSequenceStore::open(dir.path()).unwrap();
    let allocator = DurableAllocator::new(Arc::new(store), AllocatorConfig::default());
    (Arc::new(allocator), dir)
}

// =============================================================================
// Allocation Benchmarks
// =============================================================================

fn bench_generate_in_memory(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let allocator = InMemoryAllocator::default();

    c.bench_function("generate_in_memory", |b| {
        b.to_async(&rt)
            .iter(|| async { black_box(allocator.generate().await.unwrap()) });
    });
}

fn bench_generate_rocksdb(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let (allocator, _dir) = durable_allocator();

    // Every call is a synced WAL write
    let mut group = c.benchmark_group("generate_rocksdb");
    group.sample_size(20);
    group.bench_function("sequential", |b| {
        b.to_async(&rt)
            .iter(|| async { black_box(allocator.generate().await.unwrap()) });
    });
    group.finish();
}

fn bench_generate_rocksdb_concurrent(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("generate_rocksdb_concurrent");
    group.sample_size(10);

    for callers in [4usize, 16, 64] {
        let (allocator, _dir) = durable_allocator();
        group.throughput(Throughput::Elements(callers as u64));
        group.bench_with_input(BenchmarkId::from_parameter(callers), &callers, |b, &n| {
            b.to_async(&rt).iter(|| {
                let allocator = Arc::clone(&allocator);
                async move {
                    let handles: Vec<_> = (0..n)
                        .map(|_| {
                            let a = Arc::clone(&allocator);
                            tokio::spawn(async move { a.generate().await })
                        })
                        .collect();
                    for h in handles {
                        black_box(h.await.unwrap().unwrap());
                    }
                }
            });
        });
    }

    group.finish();
}

// =============================================================================
// Format Benchmarks
// =============================================================================

fn bench_format_and_parse(c: &mut Criterion) {
    let id = TrackingId::new(Prefix::default(), "20251031".parse::<DateKey>().unwrap(), 42);
    let rendered = id.to_string();

    c.bench_function("format_tracking_id", |b| b.iter(|| black_box(&id).to_string()));
    c.bench_function("parse_tracking_id", |b| {
        b.iter(|| black_box(rendered.as_str()).parse::<TrackingId>().unwrap())
    });
}

criterion_group!(
    benches,
    bench_generate_in_memory,
    bench_generate_rocksdb,
    bench_generate_rocksdb_concurrent,
    bench_format_and_parse,
);
criterion_main!(benches);
