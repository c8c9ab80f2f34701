//! Query performance benchmarks for practix-core
//!
//! Measures, over a generated 20k-item catalog:
//! - Cold listing (scan + sort + page slice)
//! - Warm listing (local tier hit)
//! - Cold search
//! - Category overview
//!
//! Run with:
//! ```bash
//! cargo bench --bench query_bench
//! ```

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use practix_core::store::CorpusStore;
use practix_core::{QueryService, SyntheticCorpus};
use practix_types::{ListFilters, SearchFilters, SortField, SortOrder, SortSpec};
use std::sync::Arc;
use std::time::Duration;

fn catalog(total: usize) -> Arc<CorpusStore> {
    let corpus = SyntheticCorpus::demo(total);
    Arc::new(CorpusStore::from_snapshot(corpus.build().unwrap()))
}

fn bench_listing(c: &mut Criterion) {
    let mut group = c.benchmark_group("listing");
    group.measurement_time(Duration::from_secs(5));

    let store = catalog(20_000);
    let rt = tokio::runtime::Runtime::new().unwrap();
    let sort = SortSpec::new(SortField::Title, SortOrder::Asc);

    group.bench_function("cold_page", |b| {
        b.to_async(&rt).iter(|| async {
            let service = QueryService::builder(store.clone()).build();
            service
                .list(
                    &"array-processing".into(),
                    &ListFilters::default(),
                    &sort,
                    1,
                    None,
                )
                .await
                .unwrap()
        });
    });

    let warm = QueryService::builder(store.clone()).build();
    group.bench_function("warm_page", |b| {
        b.to_async(&rt).iter(|| async {
            warm.list(
                &"array-processing".into(),
                &ListFilters::default(),
                &sort,
                1,
                None,
            )
            .await
            .unwrap()
        });
    });

    group.finish();
}

fn bench_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("search");
    let rt = tokio::runtime::Runtime::new().unwrap();

    for total in [5_000, 20_000] {
        let store = catalog(total);
        group.bench_with_input(BenchmarkId::from_parameter(total), &total, |b, _| {
            b.to_async(&rt).iter(|| async {
                let service = QueryService::builder(store.clone()).build();
                service
                    .search("binary search", &SearchFilters::default(), 1, None)
                    .await
                    .unwrap()
            });
        });
    }

    group.finish();
}

fn bench_overview(c: &mut Criterion) {
    let store = catalog(20_000);
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("overview_cold", |b| {
        b.to_async(&rt).iter(|| async {
            let service = QueryService::builder(store.clone()).build();
            service.overview().await.unwrap()
        });
    });
}

criterion_group!(benches, bench_listing, bench_search, bench_overview);
criterion_main!(benches);
