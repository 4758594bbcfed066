//! Engine-level throughput: scalars, collections, eviction and threads.

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use emberkv::storage::{EngineConfig, EvictionConfig, EvictionPolicy, StorageEngine};
use std::sync::Arc;
use std::time::Duration;

/// Writes: small text, integer-encoded and 1 KiB values
fn bench_writes(c: &mut Criterion) {
    let engine = StorageEngine::new();

    let mut group = c.benchmark_group("writes");
    group.throughput(Throughput::Elements(1));

    group.bench_function("set_text", |b| {
        let mut i = 0u64;
        b.iter(|| {
            engine.set(Bytes::from(format!("key:{}", i % 10_000)), b"small_value");
            i += 1;
        });
    });

    group.bench_function("set_integer", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let value = i.to_string();
            engine.set(Bytes::from(format!("num:{}", i % 10_000)), value.as_bytes());
            i += 1;
        });
    });

    group.bench_function("set_1kb", |b| {
        let mut i = 0u64;
        let value = vec![b'x'; 1024];
        b.iter(|| {
            engine.set(Bytes::from(format!("big:{}", i % 10_000)), &value);
            i += 1;
        });
    });

    group.finish();
}

/// Reads against a 100k key space
fn bench_reads(c: &mut Criterion) {
    let engine = Arc::new(StorageEngine::new());

    for i in 0..100_000 {
        let value = format!("value:{}", i);
        engine.set(Bytes::from(format!("key:{}", i)), value.as_bytes());
    }

    let mut group = c.benchmark_group("reads");
    group.throughput(Throughput::Elements(1));

    group.bench_function("hit", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = format!("key:{}", i % 100_000);
            black_box(engine.get(key.as_bytes()).ok());
            i += 1;
        });
    });

    group.bench_function("miss", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = format!("missing:{}", i);
            black_box(engine.get(key.as_bytes()).ok());
            i += 1;
        });
    });

    group.finish();
}

/// In-place integer increments
fn bench_counters(c: &mut Criterion) {
    let engine = Arc::new(StorageEngine::new());
    engine.set(Bytes::from("counter"), b"0");
    for i in 0..1000 {
        engine.set(Bytes::from(format!("counter:{}", i)), b"0");
    }

    let mut group = c.benchmark_group("counters");
    group.throughput(Throughput::Elements(1));

    group.bench_function("hot_key", |b| {
        b.iter(|| black_box(engine.incr(b"counter", 1).ok()));
    });

    group.bench_function("spread_1000", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = format!("counter:{}", i % 1000);
            black_box(engine.incr(key.as_bytes(), 1).ok());
            i += 1;
        });
    });

    group.finish();
}

/// QuickList push/pop and IntSet inserts
fn bench_collections(c: &mut Criterion) {
    let engine = Arc::new(StorageEngine::new());

    let mut group = c.benchmark_group("collections");
    group.throughput(Throughput::Elements(1));

    group.bench_function("push_pop", |b| {
        b.iter(|| {
            engine.push(Bytes::from("list"), b"element").ok();
            black_box(engine.pop(b"list").ok());
        });
    });

    group.bench_function("sadd", |b| {
        let mut i = 0i64;
        b.iter(|| {
            black_box(engine.sadd(Bytes::from("set"), i % 512).ok());
            i += 1;
        });
    });

    group.finish();
}

/// Writes against a 1 MiB budget, so most of them trigger eviction
fn bench_eviction(c: &mut Criterion) {
    let engine = Arc::new(StorageEngine::with_config(EngineConfig {
        eviction: EvictionConfig {
            policy: EvictionPolicy::VolatileRandom,
            max_off_heap_size: 1024 * 1024,
        },
        ..EngineConfig::default()
    }));

    let mut group = c.benchmark_group("eviction");
    group.throughput(Throughput::Elements(1));

    group.bench_function("set_under_pressure", |b| {
        let mut i = 0u64;
        let value = vec![b'x'; 256];
        b.iter(|| {
            let key = format!("key:{}", i);
            engine.set(Bytes::from(key.clone()), &value);
            engine.expire(key.as_bytes(), 60_000).ok();
            i += 1;
        });
    });

    group.finish();
}

/// Four threads hammering disjoint keys
fn bench_threads(c: &mut Criterion) {
    use std::thread;

    let mut group = c.benchmark_group("threads");
    group.measurement_time(Duration::from_secs(10));

    group.bench_function("set_get_x4", |b| {
        b.iter(|| {
            let engine = Arc::new(StorageEngine::new());
            let handles: Vec<_> = (0..4)
                .map(|t| {
                    let engine = Arc::clone(&engine);
                    thread::spawn(move || {
                        for i in 0..10_000 {
                            let key = format!("key:{}:{}", t, i);
                            engine.set(Bytes::from(key.clone()), b"value");
                            black_box(engine.get(key.as_bytes()).ok());
                        }
                    })
                })
                .collect();

            for handle in handles {
                handle.join().unwrap();
            }

            black_box(engine.len());
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_writes,
    bench_reads,
    bench_counters,
    bench_collections,
    bench_eviction,
    bench_threads,
);

criterion_main!(benches);
