// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

//! Encoding of a single row into an [`Arena`].
//!
//! ```plain
//! num_paths: u64
//! typed paths:    path_len: u64, path, <typed column encoding>
//! dynamic paths:  path_len: u64, path, value_len: u64, <tagged value>
//! shared data:    path_len: u64, path, value_len: u64, <tagged value>
//! ```
//!
//! Paths are written in the order above. A decoder matches typed paths by name, and routes all
//! other paths like an insertion does.

use std::sync::Arc;

use bytes::BufMut;
use smallvec::SmallVec;
use tracing::debug;

use super::insert::RollbackGuard;
use super::ObjectArray;
use crate::arena::{read_len, read_sized, read_str, Arena};
use crate::array::Column;
use crate::error::{ColumnError, ColumnResult};
use crate::types::{is_binary_null, skip_binary};

impl ObjectArray {
    pub(super) fn serialize_row_into_arena(&self, n: usize, arena: &mut Arena) {
        let num_paths =
            self.typed_paths.len() + self.dynamic_paths.len() + self.shared_data.row_range(n).len();
        arena.buf_mut().put_u64_le(num_paths as u64);

        for (path, column) in &self.typed_paths {
            put_sized(arena.buf_mut(), path.as_bytes());
            column.serialize_value_into_arena(n, arena);
        }
        let mut value = vec![];
        for (path, column) in &self.dynamic_paths {
            value.clear();
            column.serialize_binary_at(n, &mut value);
            put_sized(arena.buf_mut(), path.as_bytes());
            put_sized(arena.buf_mut(), &value);
        }
        for (path, value) in self.shared_data.row(n) {
            put_sized(arena.buf_mut(), path.as_bytes());
            put_sized(arena.buf_mut(), value);
        }
    }

    /// Decode a row written by [`ObjectArray::serialize_row_into_arena`]. On error, the column is
    /// left unchanged.
    pub(super) fn deserialize_row_from_arena(&mut self, pos: &mut &[u8]) -> ColumnResult<()> {
        self.try_deserialize_row(pos)
            .inspect_err(|e| debug!(error = %e, "failed to decode Object row from arena"))
    }

    fn try_deserialize_row(&mut self, pos: &mut &[u8]) -> ColumnResult<()> {
        let mut guard = RollbackGuard::new(self);
        let column = &mut *guard.column;
        let prev_size = guard.rows;
        let num_paths = read_len(pos)?;

        // paths in an arena are not sorted
        let mut shared_entries: SmallVec<[(&str, &[u8]); 16]> = SmallVec::new();
        for _ in 0..num_paths {
            let path = read_str(pos)?;
            if let Some(typed) = column.typed_paths.get_mut(path) {
                if typed.len() != prev_size {
                    return Err(duplicate_path(path));
                }
                Arc::make_mut(typed).deserialize_and_insert_from_arena(pos)?;
                continue;
            }

            let value = read_sized(pos)?;
            let mut buf = value;
            if let Some(dynamic) = column.dynamic_paths.get_mut(path) {
                if dynamic.len() != prev_size {
                    return Err(duplicate_path(path));
                }
                guard.num_variants.push((path.to_string(), dynamic.num_variants()));
                Arc::make_mut(dynamic).deserialize_binary(&mut buf)?;
            } else if let Some(dynamic) = column.try_to_add_new_dynamic_path(path) {
                guard.new_dynamic_paths.push(path.to_string());
                dynamic.deserialize_binary(&mut buf)?;
            } else {
                skip_binary(&mut buf, &column.options.format)?;
                if !is_binary_null(value) {
                    shared_entries.push((path, value));
                }
            }
            if !buf.is_empty() {
                return Err(ColumnError::logical(format!(
                    "{} trailing bytes after value of path {path} in arena",
                    buf.len()
                )));
            }
        }

        shared_entries.sort_unstable_by_key(|(path, _)| *path);
        if let Some(w) = shared_entries.windows(2).find(|w| w[0].0 == w[1].0) {
            return Err(duplicate_path(w[0].0));
        }
        let shared = Arc::make_mut(&mut column.shared_data);
        for (path, value) in shared_entries {
            shared.push_entry(path, value);
        }
        shared.finish_row();
        column.fill_remaining_paths(prev_size);
        guard.committed = true;
        Ok(())
    }

    pub(super) fn skip_row_in_arena(&self, pos: &mut &[u8]) -> ColumnResult<()> {
        let num_paths = read_len(pos)?;
        for _ in 0..num_paths {
            let path = read_str(pos)?;
            match self.typed_paths.get(path) {
                Some(column) => column.skip_serialized_in_arena(pos)?,
                None => {
                    read_sized(pos)?;
                }
            }
        }
        Ok(())
    }
}

fn put_sized(buf: &mut impl BufMut, bytes: &[u8]) {
    buf.put_u64_le(bytes.len() as u64);
    buf.put_slice(bytes);
}

fn duplicate_path(path: &str) -> ColumnError {
    ColumnError::logical(format!("duplicate path {path} in arena"))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::options::ObjectOptions;
    use crate::types::{object_from_json, DataTypeKind, DataValue, Object};

    fn object(json: serde_json::Value) -> Object {
        object_from_json(&json).unwrap()
    }

    fn empty(max_dynamic_paths: usize) -> ObjectArray {
        ObjectArray::new(
            [
                ("id", DataTypeKind::Int64.not_null()),
                ("name", DataTypeKind::String.nullable()),
            ],
            ObjectOptions::new(max_dynamic_paths, 2),
        )
    }

    fn sample() -> ObjectArray {
        let mut column = empty(2);
        column.push(&object(json!({"id": 1, "a": 1, "b": "x"})));
        column.push(&object(json!({"name": "n", "c": [1, "y"], "d": 2.5, "b": null})));
        column.push(&object(json!({})));
        column
    }

    #[test]
    fn round_trip() {
        let column = sample();
        let mut arena = Arena::new();
        for n in 0..column.len() {
            column.serialize_value_into_arena(n, &mut arena);
        }
        let region = arena.finish_region();

        let mut pos = &region[..];
        for n in 0..column.len() {
            column.skip_serialized_in_arena(&mut pos).unwrap();
            if n + 1 < column.len() {
                assert!(!pos.is_empty());
            }
        }
        assert!(pos.is_empty());

        for max_dynamic_paths in [0, 1, 4] {
            let mut copy = empty(max_dynamic_paths);
            let mut pos = &region[..];
            for _ in 0..column.len() {
                copy.deserialize_and_insert_from_arena(&mut pos).unwrap();
            }
            assert!(pos.is_empty());
            assert_eq!(copy.len(), column.len());
            for n in 0..column.len() {
                assert_eq!(copy.get(n), column.get(n));
                assert!(copy.shared_data().is_sorted_at(n));
            }
        }
    }

    #[test]
    fn unsorted_paths_are_sorted() {
        let mut arena = Arena::new();
        let buf = arena.buf_mut();
        buf.put_u64_le(3);
        for (path, value) in [("z", DataValue::from(1)), ("a", DataValue::Null), ("m", 2.into())] {
            put_sized(buf, path.as_bytes());
            put_sized(buf, &value.to_binary());
        }
        let region = arena.finish_region();

        let mut column = ObjectArray::new(
            [] as [(&str, crate::types::DataType); 0],
            ObjectOptions::new(0, 2),
        );
        column
            .deserialize_and_insert_from_arena(&mut &region[..])
            .unwrap();
        assert_eq!(
            column.shared_data().row(0).map(|(p, _)| p).collect::<Vec<_>>(),
            vec!["m", "z"]
        );
        assert_eq!(column.get(0), object(json!({"m": 2, "z": 1})));
    }

    #[test]
    fn malformed_rows_leave_column_unchanged() {
        let column = sample();
        let mut arena = Arena::new();
        column.serialize_value_into_arena(1, &mut arena);
        let region = arena.finish_region();

        let mut copy = sample();
        let before = copy.clone();
        for len in [0, 8, 20, region.len() - 1] {
            let mut pos = &region[..len];
            assert!(copy.deserialize_and_insert_from_arena(&mut pos).is_err());
            assert_eq!(copy, before);
        }

        // a duplicate shared path
        let mut arena = Arena::new();
        let buf = arena.buf_mut();
        buf.put_u64_le(2);
        for _ in 0..2 {
            put_sized(buf, b"e");
            put_sized(buf, &DataValue::from(1).to_binary());
        }
        let region = arena.finish_region();
        let err = copy
            .deserialize_and_insert_from_arena(&mut &region[..])
            .unwrap_err();
        assert!(matches!(err, ColumnError::Logical(_)));
        assert_eq!(copy, before);
    }
}
