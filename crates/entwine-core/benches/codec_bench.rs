//! # Codec Benchmarks
//!
//! Performance benchmarks for entwine-core encode and decode.
//!
//! Run with: `cargo bench -p entwine-core`

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use entwine_core::{Decoder, Encoder, Heap, Options, TypeInfo, TypeRegistry, Value};
use std::hint::black_box;

fn registry() -> TypeRegistry {
    let mut registry = TypeRegistry::new();
    registry
        .register(TypeInfo::new("bench.Hub").with_fields(["name", "spokes"]))
        .expect("register");
    registry
        .register(
            TypeInfo::new("bench.Spoke")
                .with_fields(["hub", "label"])
                .with_key_fields(["label"]),
        )
        .expect("register");
    registry
}

/// A hub whose N spokes all point back at it (N cycles through one object).
fn create_hub_graph(size: usize) -> (Heap, Value) {
    let mut heap = Heap::new();
    let spokes = heap.list(Vec::with_capacity(size));
    let hub = heap
        .record("bench.Hub", [("name", Value::text("hub")), ("spokes", Value::Ref(spokes))])
        .expect("hub");

    for i in 0..size {
        let spoke = heap
            .record(
                "bench.Spoke",
                [("hub", Value::Ref(hub)), ("label", Value::from(i as i64))],
            )
            .expect("spoke");
        heap.push(spokes, Value::Ref(spoke)).expect("push");
    }

    (heap, Value::Ref(hub))
}

/// A map with N tuple keys, every value aliasing its own key.
fn create_keyed_graph(size: usize) -> (Heap, Value) {
    let registry = registry();
    let mut heap = Heap::new();
    let map = heap.map();

    for i in 0..size {
        let key = heap.tuple(vec![Value::from(i as i64), Value::text("k")]);
        heap.map_insert(map, Value::Ref(key), Value::Ref(key), &registry)
            .expect("insert");
    }

    (heap, Value::Ref(map))
}

// =============================================================================
// BENCHMARKS
// =============================================================================

fn bench_encode(c: &mut Criterion) {
    let registry = registry();
    let options = Options::default();
    let encoder = Encoder::new(&registry, &options);
    let mut group = c.benchmark_group("encode");

    for size in [100, 1000, 10000].iter() {
        let (heap, root) = create_hub_graph(*size);
        group.bench_with_input(BenchmarkId::new("hub", size), size, |b, _| {
            b.iter(|| black_box(encoder.encode(&heap, &root)));
        });
    }

    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let registry = registry();
    let options = Options::default();
    let encoder = Encoder::new(&registry, &options);
    let decoder = Decoder::new(&registry, &options);
    let mut group = c.benchmark_group("decode");

    for size in [100, 1000, 10000].iter() {
        let (heap, root) = create_hub_graph(*size);
        let text = encoder.encode(&heap, &root).expect("encode");
        group.bench_with_input(BenchmarkId::new("hub", size), &text, |b, text| {
            b.iter(|| black_box(decoder.decode(text)));
        });
    }

    group.finish();
}

fn bench_composite_keys(c: &mut Criterion) {
    let registry = registry();
    let options = Options::default();
    let encoder = Encoder::new(&registry, &options);
    let decoder = Decoder::new(&registry, &options);
    let mut group = c.benchmark_group("composite_keys");

    for size in [100, 500, 1000].iter() {
        let (heap, root) = create_keyed_graph(*size);
        let text = encoder.encode(&heap, &root).expect("encode");

        group.bench_with_input(BenchmarkId::new("encode", size), size, |b, _| {
            b.iter(|| black_box(encoder.encode(&heap, &root)));
        });
        group.bench_with_input(BenchmarkId::new("decode", size), &text, |b, text| {
            b.iter(|| black_box(decoder.decode(text)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode, bench_composite_keys);
criterion_main!(benches);
