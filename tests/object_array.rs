// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;
use shapeless::arena::Arena;
use shapeless::array::Column;
use shapeless::object::{ObjectArray, PathColumn};
use shapeless::types::{object_from_json, DataType, DataTypeKind, DataValue, Object};
use shapeless::ObjectOptions;

fn object(json: serde_json::Value) -> Object {
    object_from_json(&json).unwrap()
}

fn untyped(max_dynamic_paths: usize) -> ObjectArray {
    ObjectArray::new(
        Vec::<(String, DataType)>::new(),
        ObjectOptions::new(max_dynamic_paths, 2),
    )
}

/// Drop null values, which can not be told apart from absent paths.
fn without_nulls(mut object: Object) -> Object {
    object.retain(|_, v| !v.is_null());
    object
}

fn assert_aligned(column: &ObjectArray) {
    let len = column.len();
    for (path, c) in column.typed_paths() {
        assert_eq!(c.len(), len, "typed path {path}");
    }
    for (path, c) in column.dynamic_paths() {
        assert_eq!(c.len(), len, "dynamic path {path}");
    }
    for n in 0..len {
        assert!(column.shared_data().is_sorted_at(n), "row {n}");
        for (path, _) in column.shared_data().row(n) {
            assert!(!column.typed_paths().contains_key(path));
            assert!(!column.dynamic_paths().contains_key(path));
        }
    }
}

#[test]
fn three_paths_two_dynamic_columns() {
    let mut column = untyped(2);
    column.push(&object(json!({"x": 1})));
    column.push(&object(json!({"y": 2})));
    column.push(&object(json!({"z": 3})));

    assert_eq!(
        column.dynamic_paths().keys().collect::<Vec<_>>(),
        vec!["x", "y"]
    );
    assert!(column.shared_data().is_default_at(0));
    assert!(column.shared_data().is_default_at(1));
    let row = column.shared_data().row(2).collect::<Vec<_>>();
    assert_eq!(row.len(), 1);
    assert_eq!(row[0].0, "z");
    assert_eq!(row[0].1, DataValue::Int64(3).to_binary());
    assert_aligned(&column);
}

#[test]
fn overflow_policy() {
    let k = 3;
    let mut column = untyped(k);
    for i in 0..10 {
        let mut row = Object::new();
        row.insert(format!("p{i}"), DataValue::Int64(i));
        row.insert("p0".into(), DataValue::Int64(0));
        column.push(&row);
    }
    assert_eq!(column.dynamic_paths().len(), k);
    for n in 3..10 {
        assert_eq!(column.shared_data().row(n).count(), 1);
    }
    assert_aligned(&column);
}

#[test]
fn budget_is_never_revisited() {
    let mut column = untyped(2);
    column.push(&object(json!({"a": 1, "b": 2})));
    column.pop_back(1);
    assert!(column.is_empty());
    assert_eq!(column.dynamic_paths().len(), 2);

    column.push(&object(json!({"c": 3})));
    assert_eq!(
        column.dynamic_paths().keys().collect::<Vec<_>>(),
        vec!["a", "b"]
    );
    assert_eq!(column.shared_data().num_entries(), 1);
    assert!(column.try_to_add_new_dynamic_path("d").is_none());
}

#[test]
fn read_after_append() {
    let mut column = ObjectArray::new(
        [("id", DataTypeKind::Int64.not_null())],
        ObjectOptions::new(2, 1),
    );
    let rows = [
        json!({"id": 7, "a": {"b": 1, "c": null}, "d": "x"}),
        json!({"a": {"b": "str"}, "e": [1, [2, null]], "f": null}),
        json!({"g": true, "d": 1.25}),
    ];
    for row in &rows {
        column.push(&object(row.clone()));
    }
    let mut copy = column.clone_empty();
    for n in 0..column.len() {
        copy.push(&column.get(n));
    }
    for (n, row) in rows.iter().enumerate() {
        let mut expected = without_nulls(object(row.clone()));
        expected.entry("id".into()).or_insert(DataValue::Int64(0));
        assert_eq!(column.get(n), expected);
        assert_eq!(copy.get(n), expected);
    }
    assert_aligned(&column);
    assert_aligned(&copy);
}

#[test]
fn arena_round_trip() {
    let mut column = untyped(1);
    column.push(&object(json!({"b": 1, "a": "x", "c": [1.5]})));
    column.push(&object(json!({"b": null, "z": false})));

    let mut arena = Arena::new();
    let regions = (0..column.len())
        .map(|n| {
            column.serialize_value_into_arena(n, &mut arena);
            arena.finish_region()
        })
        .collect::<Vec<_>>();

    let mut copy = untyped(1);
    for region in regions.iter().rev() {
        let mut pos = &region[..];
        copy.deserialize_and_insert_from_arena(&mut pos).unwrap();
        assert!(pos.is_empty());
    }
    assert_eq!(copy.get(0), column.get(1));
    assert_eq!(copy.get(1), column.get(0));
    assert_aligned(&copy);
}

#[test]
fn merge_selects_paths_with_most_values() {
    // non-null values of "a": {5, 0, 0}, of "b": {1, 1, 1}
    let mut a = untyped(4);
    a.push(&object(json!({"a": 1, "b": 1})));
    for _ in 0..4 {
        a.push(&object(json!({"a": 1})));
    }
    let mut b = untyped(4);
    let mut c = untyped(4);
    for source in [&mut b, &mut c] {
        source.push(&object(json!({"a": null, "b": 1})));
    }

    let mut merged = ObjectArray::new(Vec::<(String, DataType)>::new(), ObjectOptions::new(1, 2));
    merged
        .take_dynamic_structure_from_source_columns(&[&a, &b, &c])
        .unwrap();
    assert_eq!(
        merged.dynamic_paths().keys().collect::<Vec<_>>(),
        vec!["a"]
    );
    assert_eq!(merged.statistics().data["a"], 5);

    for source in [&a, &b, &c] {
        merged.insert_range_from(source, 0, source.len());
    }
    assert_eq!(merged.len(), 7);
    assert_eq!(merged.dynamic_paths().len(), 1);
    let expected = [&a, &b, &c]
        .into_iter()
        .flat_map(|s| (0..s.len()).map(|n| s.get(n)))
        .collect::<Vec<_>>();
    let actual = (0..merged.len()).map(|n| merged.get(n)).collect::<Vec<_>>();
    assert_eq!(actual, expected);
    assert_aligned(&merged);
}

#[test]
fn subcolumn_from_shared_data() {
    let mut column = untyped(1);
    column.push(&object(json!({"a": 1, "b": 1})));
    column.push(&object(json!({"c": 2})));
    column.push(&object(json!({"b": "x", "c": 3})));

    let PathColumn::Dynamic(b) = column.subcolumn("b").unwrap() else {
        panic!("expect a dynamic column");
    };
    assert_eq!(
        (0..3).map(|n| b.get(n)).collect::<Vec<_>>(),
        vec![DataValue::Int64(1), DataValue::Null, DataValue::from("x")]
    );
    assert_eq!(column.subcolumn("missing").unwrap().len(), 3);
}

#[test]
fn unsupported_byte_access() {
    let mut column = untyped(1);
    assert!(column.get_data_at(0).unwrap_err().is_not_implemented());
    assert!(column.insert_data(b"x").unwrap_err().is_not_implemented());
}

fn random_value(rng: &mut StdRng) -> DataValue {
    match rng.gen_range(0..6) {
        0 => DataValue::Null,
        1 => DataValue::Bool(rng.gen()),
        2 => DataValue::Int64(rng.gen_range(-100..100)),
        3 => DataValue::from(format!("s{}", rng.gen_range(0..10))),
        4 => DataValue::from(rng.gen_range(0..100) as f64 / 4.0),
        _ => DataValue::List(vec![DataValue::Int64(rng.gen_range(0..3)); rng.gen_range(0..3)]),
    }
}

fn random_object(rng: &mut StdRng) -> Object {
    let mut object = Object::new();
    for _ in 0..rng.gen_range(0..6) {
        object.insert(format!("p{}", rng.gen_range(0..12)), random_value(rng));
    }
    if rng.gen_bool(0.5) {
        object.insert("t".into(), DataValue::Int64(rng.gen_range(0..10)));
    }
    object
}

#[test]
fn random_operations() {
    let mut rng = StdRng::seed_from_u64(233);
    let options = ObjectOptions::new(4, 2);
    let typed = [("t", DataTypeKind::Int64.nullable())];
    let mut columns = vec![];
    let mut expected = vec![];
    for _ in 0..4 {
        let mut column = ObjectArray::new(typed, options);
        let mut rows = vec![];
        for _ in 0..200 {
            let object = random_object(&mut rng);
            let mut row = without_nulls(object.clone());
            row.entry("t".into()).or_insert(DataValue::Null);
            if rng.gen_bool(0.1) {
                // a list that is too deep is rejected without a trace
                let mut bad = object.clone();
                let mut deep = DataValue::Null;
                for _ in 0..=options.format.max_nesting_depth {
                    deep = DataValue::List(vec![deep]);
                }
                bad.insert("p0".into(), deep);
                let before = column.clone();
                assert!(!column.try_push(&bad));
                assert_eq!(column, before);
            }
            assert!(column.try_push(&object));
            rows.push(row);
        }
        assert_aligned(&column);
        for (n, row) in rows.iter().enumerate() {
            assert_eq!(&without_nulls(column.get(n)), &without_nulls(row.clone()));
        }
        columns.push(column);
        expected.extend(rows);
    }

    let sources = columns.iter().collect::<Vec<_>>();
    let mut merged = ObjectArray::new(typed, options);
    merged
        .take_dynamic_structure_from_source_columns(&sources)
        .unwrap();
    for source in &sources {
        let mut start = 0;
        while start < source.len() {
            let length = rng.gen_range(1..50).min(source.len() - start);
            merged.insert_range_from(source, start, length);
            start += length;
        }
    }
    assert_aligned(&merged);
    assert_eq!(merged.len(), expected.len());
    for (n, row) in expected.iter().enumerate() {
        assert_eq!(without_nulls(merged.get(n)), without_nulls(row.clone()));
    }

    let mut arena = Arena::new();
    let mut copy = merged.clone_empty();
    for n in 0..merged.len() {
        merged.serialize_value_into_arena(n, &mut arena);
        let region = arena.finish_region();
        copy.deserialize_and_insert_from_arena(&mut &region[..])
            .unwrap();
    }
    assert_aligned(&copy);
    for n in 0..merged.len() {
        assert_eq!(without_nulls(copy.get(n)), without_nulls(merged.get(n)));
    }
}
