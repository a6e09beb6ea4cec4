// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

use std::hash::{Hash, Hasher};
use std::mem;
use std::ops::Range;

use bytes::BufMut;
use serde::{Deserialize, Serialize};

use super::*;
use crate::arena::{read_str, Arena};

/// Per-row sorted lists of `(path, encoded value)` entries.
///
/// Entries of all rows are stored back to back in `paths` and `values`. `offsets[i]` is the end of
/// the entries of row `i`. Within a row, paths are strictly increasing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SharedDataArray {
    offsets: Vec<usize>,
    paths: Utf8Array,
    values: BlobArray,
}

impl SharedDataArray {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn paths(&self) -> &Utf8Array {
        &self.paths
    }

    pub fn values(&self) -> &BlobArray {
        &self.values
    }

    /// Total number of entries, including those of a row not yet finished.
    pub fn num_entries(&self) -> usize {
        self.paths.len()
    }

    /// Range of the entries of row `n`.
    pub fn row_range(&self, n: usize) -> Range<usize> {
        let start = if n == 0 { 0 } else { self.offsets[n - 1] };
        start..self.offsets[n]
    }

    /// Range of the entries of `length` rows starting at row `start`.
    pub fn rows_range(&self, start: usize, length: usize) -> Range<usize> {
        if length == 0 {
            let offset = if start == 0 { 0 } else { self.offsets[start - 1] };
            return offset..offset;
        }
        self.row_range(start).start..self.row_range(start + length - 1).end
    }

    pub fn path_at(&self, i: usize) -> &str {
        self.paths.get_raw(i)
    }

    pub fn value_at(&self, i: usize) -> &[u8] {
        self.values.get_raw(i)
    }

    /// Entries of row `n`.
    pub fn row(&self, n: usize) -> impl Iterator<Item = (&str, &[u8])> + '_ {
        self.row_range(n)
            .map(move |i| (self.path_at(i), self.value_at(i)))
    }

    /// Append an entry to the row being built. Paths must be pushed in increasing order.
    pub fn push_entry(&mut self, path: &str, value: &[u8]) {
        debug_assert!(
            self.pending_entries() == 0 || self.path_at(self.num_entries() - 1) < path,
            "paths of shared data are not sorted: {path}"
        );
        self.paths.push(Some(path));
        self.values.push(Some(value));
    }

    /// Append entry `i` of `src` to the row being built.
    pub fn push_entry_from(&mut self, src: &Self, i: usize) {
        self.push_entry(src.path_at(i), src.value_at(i));
    }

    /// Finish the row being built.
    pub fn finish_row(&mut self) {
        self.offsets.push(self.paths.len());
    }

    fn pending_entries(&self) -> usize {
        self.paths.len() - self.offsets.last().copied().unwrap_or(0)
    }

    /// Cut the column to `rows` rows and `entries` entries.
    pub fn truncate(&mut self, rows: usize, entries: usize) {
        self.offsets.truncate(rows);
        self.paths.truncate(entries);
        self.values.truncate(entries);
    }

    /// Lower bound of `path` among the entries `start..end`, which must be sorted.
    pub fn lower_bound(&self, path: &str, start: usize, end: usize) -> usize {
        let (mut lo, mut hi) = (start, end);
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if self.path_at(mid) < path {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        lo
    }

    /// Index of the entry of `path` in row `n`.
    pub fn find_path(&self, path: &str, n: usize) -> Option<usize> {
        let range = self.row_range(n);
        let i = self.lower_bound(path, range.start, range.end);
        (i < range.end && self.path_at(i) == path).then_some(i)
    }

    /// Append the values of `path` in `length` rows starting at `start` to `column`, or nulls for
    /// the rows without the path.
    pub fn fill_path_column(
        &self,
        path: &str,
        start: usize,
        length: usize,
        column: &mut DynamicArray,
    ) -> ColumnResult<()> {
        column.reserve(length);
        for n in start..start + length {
            match self.find_path(path, n) {
                Some(i) => column.push(&DataValue::deserialize_stored(&mut self.value_at(i))?),
                None => column.insert_default(),
            }
        }
        Ok(())
    }

    /// Returns `true` if the paths of row `n` are strictly increasing.
    pub fn is_sorted_at(&self, n: usize) -> bool {
        let range = self.row_range(n);
        range
            .clone()
            .skip(1)
            .all(|i| self.path_at(i - 1) < self.path_at(i))
    }
}

impl Column for SharedDataArray {
    fn name(&self) -> String {
        "Array(Tuple(paths String, values String))".into()
    }

    fn len(&self) -> usize {
        self.offsets.len()
    }

    fn clone_empty(&self) -> Self {
        Self::new()
    }

    fn insert_many_defaults(&mut self, n: usize) {
        let end = self.paths.len();
        self.offsets.resize(self.offsets.len() + n, end);
    }

    fn insert_range_from(&mut self, src: &Self, start: usize, length: usize) {
        let range = src.rows_range(start, length);
        self.paths
            .extend_from(&src.paths, range.start, range.len());
        self.values
            .extend_from(&src.values, range.start, range.len());
        let base = self.offsets.last().copied().unwrap_or(0);
        self.offsets.extend(
            src.offsets[start..start + length]
                .iter()
                .map(|o| o - range.start + base),
        );
    }

    fn pop_back(&mut self, n: usize) {
        let rows = self.len() - n.min(self.len());
        let entries = if rows == 0 { 0 } else { self.offsets[rows - 1] };
        self.truncate(rows, entries);
    }

    fn is_default_at(&self, n: usize) -> bool {
        self.row_range(n).is_empty()
    }

    fn reserve(&mut self, additional: usize) {
        self.offsets.reserve(additional);
    }

    fn byte_size(&self) -> usize {
        self.offsets.len() * mem::size_of::<usize>() + self.paths.byte_size() + self.values.byte_size()
    }

    fn byte_size_at(&self, n: usize) -> usize {
        mem::size_of::<usize>()
            + self
                .row_range(n)
                .map(|i| self.paths.byte_size_at(i) + self.values.byte_size_at(i))
                .sum::<usize>()
    }

    fn allocated_bytes(&self) -> usize {
        self.offsets.capacity() * mem::size_of::<usize>()
            + self.paths.allocated_bytes()
            + self.values.allocated_bytes()
    }

    fn update_hash_with_value<H: Hasher>(&self, n: usize, hasher: &mut H) {
        let range = self.row_range(n);
        hasher.write_usize(range.len());
        for (path, value) in self.row(n) {
            path.hash(hasher);
            value.hash(hasher);
        }
    }

    fn structure_equals(&self, _other: &Self) -> bool {
        true
    }

    fn serialize_value_into_arena(&self, n: usize, arena: &mut Arena) {
        let buf = arena.buf_mut();
        buf.put_u64_le(self.row_range(n).len() as u64);
        for (path, value) in self.row(n) {
            buf.put_u64_le(path.len() as u64);
            buf.put_slice(path.as_bytes());
            buf.put_u64_le(value.len() as u64);
            buf.put_slice(value);
        }
    }

    fn deserialize_and_insert_from_arena(&mut self, pos: &mut &[u8]) -> ColumnResult<()> {
        let count = read_len(pos)?;
        let entries = self.num_entries();
        for _ in 0..count {
            let entry = read_str(pos).and_then(|path| Ok((path, read_sized(pos)?)));
            match entry {
                Ok((path, value)) => self.push_entry(path, value),
                Err(e) => {
                    self.truncate(self.len(), entries);
                    return Err(e);
                }
            }
        }
        self.finish_row();
        Ok(())
    }

    fn skip_serialized_in_arena(&self, pos: &mut &[u8]) -> ColumnResult<()> {
        let count = read_len(pos)?;
        for _ in 0..count {
            read_sized(pos)?;
            read_sized(pos)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::FormatSettings;

    fn shared(rows: &[&[(&str, DataValue)]]) -> SharedDataArray {
        let mut column = SharedDataArray::new();
        for row in rows {
            for (path, value) in *row {
                column.push_entry(path, &value.to_binary());
            }
            column.finish_row();
        }
        column
    }

    #[test]
    fn find_path() {
        let column = shared(&[
            &[("a", 1.into()), ("c", 2.into()), ("e", 3.into())],
            &[],
            &[("b", "x".into())],
        ]);
        assert_eq!(column.len(), 3);
        assert_eq!(column.find_path("c", 0), Some(1));
        assert_eq!(column.find_path("d", 0), None);
        assert_eq!(column.lower_bound("d", 0, 3), 2);
        assert_eq!(column.lower_bound("z", 0, 3), 3);
        assert_eq!(column.find_path("a", 1), None);
        assert_eq!(column.find_path("b", 2), Some(3));
        assert!(column.is_default_at(1));
        assert!((0..3).all(|n| column.is_sorted_at(n)));
    }

    #[test]
    fn fill_path_column() {
        let column = shared(&[&[("a", 1.into())], &[("b", 2.into())], &[("a", "s".into())]]);
        let mut dynamic = DynamicArray::new(2, FormatSettings::default());
        column.fill_path_column("a", 0, 3, &mut dynamic).unwrap();
        assert_eq!(
            (0..3).map(|n| dynamic.get(n)).collect::<Vec<_>>(),
            vec![DataValue::from(1), DataValue::Null, DataValue::from("s")]
        );
    }

    #[test]
    fn insert_range_and_pop_back() {
        let src = shared(&[&[("a", 1.into())], &[("b", 2.into()), ("c", 3.into())], &[]]);
        let mut dst = shared(&[&[("z", 0.into())]]);
        dst.insert_range_from(&src, 1, 2);
        dst.insert_many_defaults(1);
        assert_eq!(dst.len(), 4);
        assert_eq!(
            dst.row(1).map(|(p, _)| p).collect::<Vec<_>>(),
            vec!["b", "c"]
        );
        assert!(dst.is_default_at(2));

        dst.pop_back(3);
        assert_eq!(dst, shared(&[&[("z", 0.into())]]));
    }

    #[test]
    fn arena_round_trip() {
        let column = shared(&[&[("a", 1.into()), ("b", DataValue::Null)], &[]]);
        let mut arena = Arena::new();
        column.serialize_value_into_arena(0, &mut arena);
        column.serialize_value_into_arena(1, &mut arena);
        let region = arena.finish_region();

        let mut copy = SharedDataArray::new();
        let mut pos = &region[..];
        copy.deserialize_and_insert_from_arena(&mut pos).unwrap();
        copy.deserialize_and_insert_from_arena(&mut pos).unwrap();
        assert_eq!(copy, column);

        let mut pos = &region[..];
        column.skip_serialized_in_arena(&mut pos).unwrap();
        column.skip_serialized_in_arena(&mut pos).unwrap();
        assert!(pos.is_empty());

        // the second row is cut
        let mut pos = &region[..region.len() - 1];
        let mut copy = SharedDataArray::new();
        copy.deserialize_and_insert_from_arena(&mut pos).unwrap();
        assert!(copy.deserialize_and_insert_from_arena(&mut pos).is_err());
        assert_eq!(copy.len(), 1);
    }
}
