// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

use criterion::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shapeless::arena::Arena;
use shapeless::array::Column;
use shapeless::object::ObjectArray;
use shapeless::types::{DataTypeKind, DataValue, Object};
use shapeless::ObjectOptions;

/// Objects over `num_paths` distinct paths, with a typed path `id`.
fn objects(num_rows: usize, num_paths: usize) -> Vec<Object> {
    let mut rng = StdRng::seed_from_u64(0);
    (0..num_rows)
        .map(|i| {
            let mut object = Object::new();
            object.insert("id".into(), DataValue::Int64(i as i64));
            for _ in 0..8 {
                let path = format!("path_{}", rng.gen_range(0..num_paths));
                let value = match rng.gen_range(0..3) {
                    0 => DataValue::Int64(rng.gen()),
                    1 => DataValue::from(format!("value {}", rng.gen_range(0..100))),
                    _ => DataValue::List(vec![DataValue::Bool(true); 3]),
                };
                object.insert(path, value);
            }
            object
        })
        .collect()
}

fn column(max_dynamic_paths: usize) -> ObjectArray {
    ObjectArray::new(
        [("id", DataTypeKind::Int64.not_null())],
        ObjectOptions::new(max_dynamic_paths, 8),
    )
}

fn filled(rows: &[Object], max_dynamic_paths: usize) -> ObjectArray {
    let mut column = column(max_dynamic_paths);
    for row in rows {
        column.push(row);
    }
    column
}

fn insert(c: &mut Criterion) {
    let rows = objects(4096, 256);
    let mut group = c.benchmark_group("object insert");
    group.throughput(Throughput::Elements(rows.len() as u64));
    for max_dynamic_paths in [0, 16, 256] {
        group.bench_with_input(
            BenchmarkId::from_parameter(max_dynamic_paths),
            &max_dynamic_paths,
            |b, &max_dynamic_paths| b.iter(|| filled(&rows, max_dynamic_paths)),
        );
    }
    group.finish();
}

fn merge(c: &mut Criterion) {
    let sources = [objects(2048, 64), objects(2048, 256)]
        .iter()
        .map(|rows| filled(rows, 32))
        .collect::<Vec<_>>();
    let sources = sources.iter().collect::<Vec<_>>();
    c.bench_function("object merge", |b| {
        b.iter(|| {
            let mut merged = column(32);
            merged
                .take_dynamic_structure_from_source_columns(&sources)
                .unwrap();
            for source in &sources {
                merged.insert_range_from(source, 0, source.len());
            }
            merged
        })
    });
}

fn arena(c: &mut Criterion) {
    let source = filled(&objects(1024, 64), 16);
    c.bench_function("object arena round trip", |b| {
        b.iter(|| {
            let mut arena = Arena::with_capacity(1 << 16);
            let mut copy = source.clone_empty();
            for n in 0..source.len() {
                source.serialize_value_into_arena(n, &mut arena);
                let region = arena.finish_region();
                copy.deserialize_and_insert_from_arena(&mut &region[..])
                    .unwrap();
            }
            copy
        })
    });
}

criterion_group!(benches, insert, merge, arena);
criterion_main!(benches);
