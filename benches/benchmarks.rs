//! Benchmarks for rbdigest
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use rbdigest::traits::QuantileSketch;
use rbdigest::TDigest;

fn filled(n: usize, seed: u64) -> TDigest {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut digest = TDigest::new();
    for _ in 0..n {
        digest.add(rng.gen::<f64>() * 1_000.0).unwrap();
    }
    digest
}

// ============================================================================
// Ingestion
// ============================================================================

fn bench_add(c: &mut Criterion) {
    let mut group = c.benchmark_group("tdigest_add");
    group.throughput(Throughput::Elements(1));

    for accuracy in [0.05, 0.02, 0.01] {
        group.bench_function(format!("add_random_a{}", accuracy), |b| {
            let mut rng = StdRng::seed_from_u64(1);
            let mut digest = TDigest::with_config(accuracy, 25.0).unwrap();
            b.iter(|| {
                digest.add(black_box(rng.gen::<f64>())).unwrap();
            });
        });
    }

    group.bench_function("add_sequential", |b| {
        let mut digest = TDigest::new();
        let mut i = 0u64;
        b.iter(|| {
            digest.add(black_box(i as f64 * 0.001)).unwrap();
            i = i.wrapping_add(1);
        });
    });

    group.bench_function("add_weighted", |b| {
        let mut rng = StdRng::seed_from_u64(2);
        let mut digest = TDigest::new();
        b.iter(|| {
            let value = rng.gen::<f64>();
            digest.add_weighted(black_box(value), 3.5).unwrap();
        });
    });

    group.finish();
}

// ============================================================================
// Queries
// ============================================================================

fn bench_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("tdigest_query");

    let digest = filled(100_000, 3);

    group.bench_function("quantile", |b| {
        let mut q = 0.0f64;
        b.iter(|| {
            q = (q + 0.013) % 1.0;
            black_box(digest.quantile(black_box(q)).unwrap());
        });
    });

    group.bench_function("distribution", |b| {
        b.iter(|| black_box(digest.distribution().map(|p| p.count).sum::<f64>()));
    });

    group.finish();
}

// ============================================================================
// Merge
// ============================================================================

fn bench_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("tdigest_merge");

    let a = filled(10_000, 4);
    let b2 = filled(10_000, 5);
    let parts: Vec<TDigest> = (0..8).map(|seed| filled(10_000, 10 + seed)).collect();

    group.bench_function("merge", |b| {
        b.iter(|| black_box(TDigest::merge(&a, black_box(&b2), 0.02, 25.0).unwrap()));
    });

    group.bench_function("merge_multiple_8", |b| {
        b.iter(|| black_box(TDigest::merge_multiple(black_box(&parts), 0.02, 25.0).unwrap()));
    });

    group.bench_function("compress", |b| {
        b.iter(|| {
            let mut digest = a.clone();
            digest.compress();
            black_box(digest.centroid_count())
        });
    });

    group.finish();
}

// ============================================================================
// Serialization
// ============================================================================

fn bench_serialize(c: &mut Criterion) {
    let mut group = c.benchmark_group("tdigest_codec");

    let digest = filled(100_000, 6);
    let bytes = digest.serialize(false);
    let mut buf = vec![0u8; digest.expected_serialized_len()];

    group.bench_function("serialize", |b| {
        b.iter(|| black_box(digest.serialize(false)));
    });

    group.bench_function("serialize_into", |b| {
        b.iter(|| black_box(digest.serialize_into(&mut buf, false).unwrap()));
    });

    group.bench_function("serialize_compressed", |b| {
        b.iter(|| black_box(digest.serialize(true)));
    });

    group.bench_function("deserialize", |b| {
        b.iter(|| black_box(TDigest::deserialize(black_box(&bytes)).unwrap()));
    });

    group.finish();
}

// ============================================================================
// Main
// ============================================================================

criterion_group!(benches, bench_add, bench_query, bench_merge, bench_serialize);

criterion_main!(benches);
