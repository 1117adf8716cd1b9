//! Benchmarks for profile path lookups and package runs

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use veil_core::{ExecutionContext, PackageAssembler, ProfileStore, TargetKind};

fn sample_text() -> String {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/profile.json");
    std::fs::read_to_string(path).unwrap()
}

fn benchmark_lookups(c: &mut Criterion) {
    let text = sample_text();
    let path = ["highEntropyValues", "fullVersionList"];

    c.bench_function("find_memoized", |b| {
        let store = ProfileStore::parse(text.clone()).unwrap();
        store.find(&path).unwrap();
        b.iter(|| store.find(black_box(&path)).is_some());
    });

    c.bench_function("find_cold", |b| {
        b.iter_batched(
            || ProfileStore::parse(text.clone()).unwrap(),
            |store| store.find(black_box(&path)).is_some(),
            criterion::BatchSize::SmallInput,
        );
    });
}

fn benchmark_package_run(c: &mut Criterion) {
    let store = Arc::new(ProfileStore::parse(sample_text()).unwrap());

    c.bench_function("main_package_run", |b| {
        b.iter_batched(
            || {
                let package = PackageAssembler::default().pack(TargetKind::Main, &HashSet::new());
                ExecutionContext::new(package, Arc::clone(&store)).unwrap()
            },
            |mut ctx| ctx.run().is_clean(),
            criterion::BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, benchmark_lookups, benchmark_package_run);
criterion_main!(benches);
