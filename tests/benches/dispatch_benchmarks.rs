//! # Trellis Dispatch Benchmarks
//!
//! | Area | Operation | Target |
//! |------|-----------|--------|
//! | Bus | Sync fan-out, 100 listeners | < 50µs |
//! | Bus | Concurrent fan-out, 100 listeners | < 500µs |
//! | Bus | Wildcard-heavy snapshot | < 100µs |
//! | Registry | Load order of 1000 components | < 5ms |

use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use indexmap::IndexMap;
use serde_json::{json, Value};
use trellis_bus::{EmitOptions, EventBus, Handler, SubscribeOptions};
use trellis_registry::{topological_order, BindingContext, ComponentRegistry, Constructor};

const FAN_OUT: [usize; 3] = [1, 10, 100];

fn bus_with_listeners(count: usize) -> EventBus {
    let bus = EventBus::with_history_capacity(0);
    for i in 0..count {
        let priority = i32::try_from(i % 7).unwrap_or_default();
        bus.on(
            "bench:tick",
            Handler::sync(|event| Ok(event.payload.clone())),
            SubscribeOptions::new().priority(priority),
        );
    }
    bus
}

// ============================================================================
// Synchronous dispatch
// ============================================================================

fn bench_sync_emit(c: &mut Criterion) {
    let mut group = c.benchmark_group("bus-sync-emit");

    for count in FAN_OUT {
        let bus = bus_with_listeners(count);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("listeners", count), &bus, |b, bus| {
            b.iter(|| black_box(bus.emit("bench:tick", json!({ "n": 1 })).outcomes.len()))
        });
    }

    group.finish();
}

// ============================================================================
// Concurrent dispatch
// ============================================================================

fn bench_async_emit(c: &mut Criterion) {
    let mut group = c.benchmark_group("bus-async-emit");
    group.measurement_time(Duration::from_secs(5));

    let Ok(runtime) = tokio::runtime::Runtime::new() else {
        return;
    };

    for count in FAN_OUT {
        let bus = EventBus::with_history_capacity(0);
        for _ in 0..count {
            bus.on(
                "bench:fetch",
                Handler::future(|event| async move { Ok(event.payload.clone()) }),
                SubscribeOptions::default(),
            );
        }

        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("listeners", count), &bus, |b, bus| {
            b.iter(|| {
                let report = runtime.block_on(bus.emit_async(
                    "bench:fetch",
                    Value::Null,
                    EmitOptions::new().timeout(Duration::from_secs(1)),
                ));
                black_box(report.succeeded())
            })
        });
    }

    group.finish();
}

// ============================================================================
// Wildcards
// ============================================================================

fn bench_wildcard_snapshot(c: &mut Criterion) {
    let mut group = c.benchmark_group("bus-wildcards");

    let bus = EventBus::with_history_capacity(0);
    for i in 0..50 {
        bus.on_pattern(&format!("module{i}:*"), Handler::sync(|_| Ok(Value::Null)))
            .ok();
    }
    bus.on_pattern("*:changed", Handler::sync(|_| Ok(Value::Null)))
        .ok();

    group.bench_function("emit_through_50_patterns", |b| {
        b.iter(|| black_box(bus.emit("module7:changed", Value::Null).outcomes.len()))
    });

    group.finish();
}

// ============================================================================
// Registry load order
// ============================================================================

fn layered_graph(size: usize) -> IndexMap<String, Vec<String>> {
    (0..size)
        .map(|i| {
            let dependencies = [i / 2, i / 3]
                .into_iter()
                .filter(|&d| d < i)
                .map(|d| format!("c{d}"))
                .collect();
            (format!("c{i}"), dependencies)
        })
        .collect()
}

fn bench_load_order(c: &mut Criterion) {
    let mut group = c.benchmark_group("registry-load-order");

    for size in [10, 100, 1000] {
        let graph = layered_graph(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("topological_order", size), &graph, |b, graph| {
            b.iter(|| black_box(topological_order(graph).map(|order| order.len())))
        });
    }

    group.bench_function("initialize_100_components", |b| {
        let graph = layered_graph(100);
        b.iter(|| {
            let registry = ComponentRegistry::new(|name: &str| Some(BindingContext::new(name)));
            for (name, dependencies) in &graph {
                let dependencies: Vec<&str> = dependencies.iter().map(String::as_str).collect();
                let _ = registry.register(name, Constructor::new(|_| Ok(Marker)), &dependencies);
            }
            black_box(registry.initialize().is_ok())
        })
    });

    group.finish();
}

struct Marker;

impl trellis_registry::Component for Marker {}

criterion_group!(
    benches,
    bench_sync_emit,
    bench_async_emit,
    bench_wildcard_snapshot,
    bench_load_order
);

criterion_main!(benches);
