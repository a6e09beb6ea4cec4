// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

use std::hash::Hasher;

use crate::arena::Arena;
use crate::error::{ColumnError, ColumnResult};

/// The structural contract shared by every column of an object column, and the object column
/// itself.
///
/// A column is a mutable, append-only sequence of rows. Every row has a default value, which is
/// what `insert_default` appends. Transforms such as [`Column::filter`] build a new column and
/// leave `self` untouched.
pub trait Column: Clone + Send + Sync + 'static {
    /// Name of the column type.
    fn name(&self) -> String;

    /// Number of rows.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Create an empty column with the same structure.
    fn clone_empty(&self) -> Self;

    /// Clone the column, then cut it to `new_len` rows or pad it with defaults.
    fn clone_resized(&self, new_len: usize) -> Self {
        let mut column = self.clone();
        let len = self.len();
        if new_len < len {
            column.pop_back(len - new_len);
        } else {
            column.insert_many_defaults(new_len - len);
        }
        column
    }

    fn insert_default(&mut self) {
        self.insert_many_defaults(1);
    }

    fn insert_many_defaults(&mut self, n: usize);

    /// Append row `n` of `src`.
    fn insert_from(&mut self, src: &Self, n: usize) {
        self.insert_range_from(src, n, 1);
    }

    /// Append `length` rows of `src` starting at `start`.
    fn insert_range_from(&mut self, src: &Self, start: usize, length: usize);

    /// Remove the last `n` rows.
    fn pop_back(&mut self, n: usize);

    fn is_default_at(&self, n: usize) -> bool;

    fn number_of_default_rows(&self) -> usize {
        (0..self.len()).filter(|n| self.is_default_at(*n)).count()
    }

    fn reserve(&mut self, additional: usize);

    /// Bytes occupied by the column.
    fn byte_size(&self) -> usize;

    /// Bytes occupied by row `n`.
    fn byte_size_at(&self, n: usize) -> usize;

    /// Bytes allocated by the column, including spare capacity.
    fn allocated_bytes(&self) -> usize;

    /// Feed the value of row `n` into the hasher.
    fn update_hash_with_value<H: Hasher>(&self, n: usize, hasher: &mut H);

    /// Update one 32-bit hash per row with the row's value.
    fn update_weak_hash32(&self, hashes: &mut [u32]) -> ColumnResult<()> {
        if hashes.len() != self.len() {
            return Err(ColumnError::logical(format!(
                "size of hash ({}) does not match size of column ({})",
                hashes.len(),
                self.len()
            )));
        }
        for (n, hash) in hashes.iter_mut().enumerate() {
            let mut hasher = crc32fast::Hasher::new_with_initial(*hash);
            self.update_hash_with_value(n, &mut hasher);
            *hash = hasher.finalize();
        }
        Ok(())
    }

    /// Feed the whole column into the hasher.
    fn update_hash_fast<H: Hasher>(&self, hasher: &mut H) {
        hasher.write_usize(self.len());
        for n in 0..self.len() {
            self.update_hash_with_value(n, hasher);
        }
    }

    /// Returns `true` if the columns can be concatenated without reconciliation.
    fn structure_equals(&self, other: &Self) -> bool;

    /// Continue the pending region of the arena with row `n`.
    fn serialize_value_into_arena(&self, n: usize, arena: &mut Arena);

    /// Append a row written by [`Column::serialize_value_into_arena`], advancing the cursor.
    fn deserialize_and_insert_from_arena(&mut self, pos: &mut &[u8]) -> ColumnResult<()>;

    /// Advance the cursor past a row written by [`Column::serialize_value_into_arena`].
    fn skip_serialized_in_arena(&self, pos: &mut &[u8]) -> ColumnResult<()>;

    /// Keep the rows where `mask` is `true`.
    fn filter(&self, mask: &[bool]) -> ColumnResult<Self> {
        check_filter(self.len(), mask)?;
        let mut column = self.clone_empty();
        column.reserve(mask.iter().filter(|x| **x).count());
        for (n, _) in mask.iter().enumerate().filter(|(_, keep)| **keep) {
            column.insert_from(self, n);
        }
        Ok(column)
    }

    /// Spread the rows over the positions where `mask` is `true` (`false` if `inverted`), and
    /// fill the other positions with defaults.
    fn expand(&mut self, mask: &[bool], inverted: bool) -> ColumnResult<()> {
        check_expand(self.len(), mask, inverted)?;
        let mut column = self.clone_empty();
        column.reserve(mask.len());
        let mut from = 0;
        for selected in mask {
            if *selected != inverted {
                column.insert_from(self, from);
                from += 1;
            } else {
                column.insert_default();
            }
        }
        *self = column;
        Ok(())
    }

    /// Take the rows at `indices`. A non-zero `limit` takes only the first `limit` indices.
    fn index(&self, indices: &[usize], limit: usize) -> ColumnResult<Self> {
        let indices = check_index(self.len(), indices, limit)?;
        let mut column = self.clone_empty();
        column.reserve(indices.len());
        for n in indices {
            column.insert_from(self, *n);
        }
        Ok(column)
    }

    /// Reorder the rows by `perm`. A non-zero `limit` takes only the first `limit` rows.
    fn permute(&self, perm: &[usize], limit: usize) -> ColumnResult<Self> {
        check_permutation(self.len(), perm, limit)?;
        self.index(perm, limit)
    }

    /// Repeat row `i` `offsets[i] - offsets[i - 1]` times.
    fn replicate(&self, offsets: &[usize]) -> ColumnResult<Self> {
        check_replicate(self.len(), offsets)?;
        let mut column = self.clone_empty();
        column.reserve(offsets.last().copied().unwrap_or(0));
        let mut prev = 0;
        for (n, offset) in offsets.iter().enumerate() {
            for _ in prev..*offset {
                column.insert_from(self, n);
            }
            prev = *offset;
        }
        Ok(column)
    }

    /// Distribute the rows over `num_columns` columns, row `i` going to `selector[i]`.
    fn scatter(&self, num_columns: usize, selector: &[usize]) -> ColumnResult<Vec<Self>> {
        check_scatter(self.len(), num_columns, selector)?;
        let mut columns = (0..num_columns)
            .map(|_| self.clone_empty())
            .collect::<Vec<_>>();
        for (n, target) in selector.iter().enumerate() {
            columns[*target].insert_from(self, n);
        }
        Ok(columns)
    }
}

pub(crate) fn check_filter(len: usize, mask: &[bool]) -> ColumnResult<()> {
    if mask.len() != len {
        return Err(ColumnError::logical(format!(
            "size of filter ({}) does not match size of column ({})",
            mask.len(),
            len
        )));
    }
    Ok(())
}

pub(crate) fn check_expand(len: usize, mask: &[bool], inverted: bool) -> ColumnResult<()> {
    let selected = mask.iter().filter(|x| **x != inverted).count();
    if selected != len {
        return Err(ColumnError::logical(format!(
            "mask selects {} rows, but column has {} rows",
            selected, len
        )));
    }
    Ok(())
}

/// Returns the indices to take.
pub(crate) fn check_index(len: usize, indices: &[usize], limit: usize) -> ColumnResult<&[usize]> {
    let limit = if limit == 0 { indices.len() } else { limit };
    if limit > indices.len() {
        return Err(ColumnError::logical(format!(
            "size of indices ({}) is less than required ({})",
            indices.len(),
            limit
        )));
    }
    let indices = &indices[..limit];
    if let Some(n) = indices.iter().find(|n| **n >= len) {
        return Err(ColumnError::logical(format!(
            "index {} is out of bound, column has {} rows",
            n, len
        )));
    }
    Ok(indices)
}

pub(crate) fn check_permutation(len: usize, perm: &[usize], limit: usize) -> ColumnResult<()> {
    if limit == 0 && perm.len() != len {
        return Err(ColumnError::logical(format!(
            "size of permutation ({}) does not match size of column ({})",
            perm.len(),
            len
        )));
    }
    Ok(())
}

pub(crate) fn check_replicate(len: usize, offsets: &[usize]) -> ColumnResult<()> {
    if offsets.len() != len {
        return Err(ColumnError::logical(format!(
            "size of offsets ({}) does not match size of column ({})",
            offsets.len(),
            len
        )));
    }
    if offsets.windows(2).any(|w| w[0] > w[1]) {
        return Err(ColumnError::logical("replicate offsets are not monotonic"));
    }
    Ok(())
}

pub(crate) fn check_scatter(len: usize, num_columns: usize, selector: &[usize]) -> ColumnResult<()> {
    if selector.len() != len {
        return Err(ColumnError::logical(format!(
            "size of selector ({}) does not match size of column ({})",
            selector.len(),
            len
        )));
    }
    if let Some(n) = selector.iter().find(|n| **n >= num_columns) {
        return Err(ColumnError::logical(format!(
            "selector {} is out of bound, scattering into {} columns",
            n, num_columns
        )));
    }
    Ok(())
}
