//! Benchmarks for single-nonce evaluation.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use egihash_core::{build_cache, calc_dataset_item, hashimoto_light, keccak256};

fn bench_light_evaluation(c: &mut Criterion) {
    let cache = build_cache(0, |_, _, _| true).expect("genesis cache");
    let header = keccak256(b"benchmark header");

    let mut nonce = 0u64;
    c.bench_function("hashimoto_light", |b| {
        b.iter(|| {
            nonce = nonce.wrapping_add(1);
            hashimoto_light(0, &cache, black_box(&header), black_box(nonce))
        })
    });
}

fn bench_dataset_item(c: &mut Criterion) {
    let cache = build_cache(0, |_, _, _| true).expect("genesis cache");

    let mut i = 0usize;
    c.bench_function("calc_dataset_item", |b| {
        b.iter(|| {
            i = i.wrapping_add(1);
            calc_dataset_item(&cache, black_box(i))
        })
    });
}

criterion_group!(benches, bench_light_evaluation, bench_dataset_item);
criterion_main!(benches);
