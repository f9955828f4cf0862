//! Memtrack Benchmarks
//!
//! Hot-path benchmarks for the bookkeeping engines.
//! Run with: `cargo bench`

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use memtrack::tracking::RegionLedger;
use memtrack::{ForwardingTable, MemoryTracker, TrackerConfig};

const KB: u64 = 1024;
const MB: u64 = 1024 * 1024;

fn bench_region_ledger(c: &mut Criterion) {
    let mut group = c.benchmark_group("region_ledger");

    group.bench_function("commit_sequential_merge", |b| {
        b.iter(|| {
            let mut ledger = RegionLedger::new(64 * MB);
            for i in 0..1024u64 {
                ledger.commit(i * 64 * KB, 64 * KB);
            }
            black_box(ledger.total_committed())
        })
    });

    group.bench_function("commit_disjoint_then_bridge", |b| {
        b.iter(|| {
            let mut ledger = RegionLedger::new(64 * MB);
            for i in 0..512u64 {
                ledger.commit(i * 128 * KB, 64 * KB);
            }
            // One commit collapses all 512 regions.
            ledger.commit(0, 64 * MB);
            black_box(ledger.region_count())
        })
    });

    group.bench_function("uncommit_split", |b| {
        b.iter(|| {
            let mut ledger = RegionLedger::new(64 * MB);
            ledger.commit(0, 64 * MB);
            for i in 0..512u64 {
                ledger.uncommit(i * 128 * KB, 64 * KB);
            }
            black_box(ledger.total_committed())
        })
    });

    group.finish();
}

fn bench_forwarding_table(c: &mut Criterion) {
    let mut group = c.benchmark_group("forwarding_table");

    let table = ForwardingTable::for_live_objects(4096);
    for i in 0..4096u64 {
        table.insert(i, i * 8);
    }

    group.throughput(Throughput::Elements(4096));
    group.bench_function("find_hit", |b| {
        b.iter(|| {
            for i in 0..4096u64 {
                black_box(table.find(i));
            }
        })
    });

    group.bench_function("find_miss", |b| {
        b.iter(|| {
            for i in 4096..8192u64 {
                black_box(table.find(i));
            }
        })
    });

    group.bench_function("insert_4096", |b| {
        b.iter(|| {
            let table = ForwardingTable::for_live_objects(4096);
            for i in 0..4096u64 {
                table.insert(i, i * 8);
            }
            black_box(table.entry_count())
        })
    });

    group.finish();
}

fn bench_malloc_sites(c: &mut Criterion) {
    let mut group = c.benchmark_group("malloc_sites");

    group.bench_function("record_hot_site", |b| {
        let tracker = MemoryTracker::new(TrackerConfig::default()).unwrap();
        b.iter(|| {
            tracker.record_malloc(black_box(0xfeed), 64);
        })
    });

    group.bench_function("record_distinct_sites", |b| {
        let tracker = MemoryTracker::new(TrackerConfig::default()).unwrap();
        let mut fingerprint = 0u64;
        b.iter(|| {
            fingerprint = fingerprint.wrapping_add(1) % 256;
            tracker.record_malloc(black_box(fingerprint), 64);
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_region_ledger,
    bench_forwarding_table,
    bench_malloc_sites
);
criterion_main!(benches);
