//! Storage engine throughput benchmarks.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use flintkv::storage::StorageEngine;
use std::sync::Arc;

fn bench_set(c: &mut Criterion) {
    let engine = Arc::new(StorageEngine::new());

    let mut group = c.benchmark_group("set");
    group.throughput(Throughput::Elements(1));

    group.bench_function("set_small", |b| {
        let mut i = 0u64;
        b.iter(|| {
            engine.set(format!("key:{}", i), "small_value");
            i += 1;
        });
    });

    group.bench_function("set_medium", |b| {
        let mut i = 0u64;
        let value = "x".repeat(1024);
        b.iter(|| {
            engine.set(format!("key:{}", i), value.clone());
            i += 1;
        });
    });

    group.finish();
}

fn bench_get(c: &mut Criterion) {
    let engine = Arc::new(StorageEngine::new());
    for i in 0..100_000 {
        engine.set(format!("key:{}", i), format!("value:{}", i));
    }

    let mut group = c.benchmark_group("get");
    group.throughput(Throughput::Elements(1));

    group.bench_function("get_existing", |b| {
        let mut i = 0u64;
        b.iter(|| {
            black_box(engine.get_string(&format!("key:{}", i % 100_000)).ok());
            i += 1;
        });
    });

    group.bench_function("get_missing", |b| {
        let mut i = 0u64;
        b.iter(|| {
            black_box(engine.get_string(&format!("missing:{}", i)).ok());
            i += 1;
        });
    });

    group.finish();
}

fn bench_typed(c: &mut Criterion) {
    let engine = Arc::new(StorageEngine::new());

    let mut group = c.benchmark_group("typed");
    group.throughput(Throughput::Elements(1));

    group.bench_function("rpush", |b| {
        let values = vec!["element".to_string()];
        b.iter(|| {
            engine.rpush("bench:list", &values).unwrap();
        });
    });

    group.bench_function("hset", |b| {
        let mut i = 0u64;
        b.iter(|| {
            engine
                .hset("bench:hash", &format!("field:{}", i % 1000), "value")
                .unwrap();
            i += 1;
        });
    });

    group.bench_function("sadd", |b| {
        let mut i = 0u64;
        b.iter(|| {
            engine
                .sadd("bench:set", &[format!("member:{}", i % 1000)])
                .unwrap();
            i += 1;
        });
    });

    group.finish();
}

fn bench_mixed(c: &mut Criterion) {
    let engine = Arc::new(StorageEngine::new());
    for i in 0..10_000 {
        engine.set(format!("key:{}", i), format!("value:{}", i));
    }

    let mut group = c.benchmark_group("mixed");
    group.throughput(Throughput::Elements(1));

    group.bench_function("80_read_20_write", |b| {
        let mut i = 0u64;
        b.iter(|| {
            if i % 5 == 0 {
                engine.set(format!("new:{}", i), "value");
            } else {
                black_box(engine.get_string(&format!("key:{}", i % 10_000)).ok());
            }
            i += 1;
        });
    });

    group.finish();
}

criterion_group!(benches, bench_set, bench_get, bench_typed, bench_mixed);
criterion_main!(benches);
