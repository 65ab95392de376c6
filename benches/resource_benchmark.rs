//! Performance benchmarks for resource-kit
//!
//! This benchmark suite measures:
//! - Entity cache writes (insert vs merge) across payload sizes
//! - Cache key and URL computation
//! - Resource fetches served from the cache
//!
//! Run with: cargo bench
//! View results: open target/criterion/report/index.html

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use resource_kit::transport::{Method, StubTransport};
use resource_kit::{
    Attributes, CacheKey, ClientConfig, EntityCache, ModelQuery, Params, Registry,
    ResourceDefinition, UrlBuilder, WriteMode,
};
use serde_json::{json, Value};
use std::hint::black_box;

// ============================================================================
// Benchmark Fixtures
// ============================================================================

/// Record with `fields` extra string fields.
fn record(id: u64, fields: usize) -> Attributes {
    let mut map = Attributes::new();
    map.insert("id".to_string(), json!(id));
    for i in 0..fields {
        map.insert(format!("field_{}", i), Value::String("x".repeat(16)));
    }
    map
}

fn filter_params() -> Params {
    let mut params = Params::new();
    params.insert("channel_id".to_string(), json!("c0ffee"));
    params.insert("kind".to_string(), json!("video"));
    params.insert("ids".to_string(), json!([1, 2, 3, 4]));
    params
}

// ============================================================================
// Group 1: Entity Cache
// ============================================================================

fn entity_cache_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("entity_cache");

    for fields in [4usize, 32, 256].iter() {
        group
            .throughput(Throughput::Elements(*fields as u64))
            .bench_with_input(BenchmarkId::new("merge", fields), fields, |b, &fields| {
                let cache = EntityCache::new();
                let payload = record(1, fields);
                cache
                    .put("node", "id", payload.clone(), WriteMode::Merge)
                    .expect("seed");

                b.iter(|| {
                    cache
                        .put("node", "id", black_box(payload.clone()), WriteMode::Merge)
                        .expect("merge")
                });
            });

        group.bench_with_input(BenchmarkId::new("replace", fields), fields, |b, &fields| {
            let cache = EntityCache::new();
            let payload = record(1, fields);

            b.iter(|| {
                cache
                    .put("node", "id", black_box(payload.clone()), WriteMode::Replace)
                    .expect("replace")
            });
        });
    }

    group.bench_function("get_hit", |b| {
        let cache = EntityCache::new();
        cache
            .put("node", "id", record(7, 8), WriteMode::Merge)
            .expect("seed");

        b.iter(|| cache.get(black_box("node"), black_box("7")));
    });

    group.finish();
}

// ============================================================================
// Group 2: Keys and URLs
// ============================================================================

fn key_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("keys");
    let params = filter_params();

    group.bench_function("collection_key", |b| {
        b.iter(|| CacheKey::collection(black_box("contentnode"), black_box(&params)))
    });

    let urls = UrlBuilder::new("/api");
    let def = ResourceDefinition::new("contentnode")
        .identifier("channel_id")
        .path("/:channel_id/contentnodes/");

    group.bench_function("build_list_url", |b| {
        b.iter(|| {
            urls.build_url(&def, "list", None, black_box(&params))
                .expect("url")
        })
    });

    group.bench_function("build_detail_url", |b| {
        b.iter(|| {
            urls.build_url(&def, "detail", Some(black_box("n1")), &params)
                .expect("url")
        })
    });

    group.finish();
}

// ============================================================================
// Group 3: Resource Reads
// ============================================================================

fn resource_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("resource");
    let rt = tokio::runtime::Runtime::new().expect("Failed to create Tokio runtime");

    let stub = StubTransport::new();
    stub.respond(Method::Get, "/user/1/", json!({"id": 1, "name": "Ada"}));
    let registry = Registry::new(stub, ClientConfig::default());
    let users = registry
        .define_resource(ResourceDefinition::new("user"))
        .expect("define");
    rt.block_on(async {
        users
            .fetch_model(ModelQuery::new("1"))
            .await
            .expect("seed fetch");
    });

    group.bench_function("fetch_model_hit", |b| {
        b.to_async(&rt).iter(|| async {
            users
                .fetch_model(black_box(ModelQuery::new("1")))
                .await
                .expect("hit")
        });
    });

    group.bench_function("fetch_model_force", |b| {
        b.to_async(&rt).iter(|| async {
            users
                .fetch_model(black_box(ModelQuery::new("1").force()))
                .await
                .expect("forced")
        });
    });

    group.finish();
}

// ============================================================================
// Benchmark Registration
// ============================================================================

criterion_group!(
    benches,
    entity_cache_benchmarks,
    key_benchmarks,
    resource_benchmarks
);
criterion_main!(benches);
