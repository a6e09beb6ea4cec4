// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

use std::hash::Hasher;

use bytes::BufMut;
use serde::{Deserialize, Serialize};

use super::*;
use crate::arena::{read_u8, Arena};
use crate::types::DataType;

/// A column of one declared type.
///
/// Nulls are only stored if the type is nullable. Otherwise a null value is replaced by the
/// default value of the type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypedArray {
    data_type: DataType,
    array: ArrayImpl,
}

impl TypedArray {
    pub fn new(data_type: DataType) -> Self {
        Self {
            data_type,
            array: ArrayImpl::new(data_type.kind()),
        }
    }

    /// Wrap an existing array.
    ///
    /// Returns `None` if the array holds nulls but the type is not nullable.
    pub fn from_array(data_type: DataType, array: ArrayImpl) -> Option<Self> {
        if array.kind() != data_type.kind() || (!data_type.is_nullable() && array.null_count() > 0)
        {
            return None;
        }
        Some(Self { data_type, array })
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn array(&self) -> &ArrayImpl {
        &self.array
    }

    pub fn get(&self, n: usize) -> DataValue {
        self.array.get(n)
    }

    pub fn is_null(&self, n: usize) -> bool {
        self.array.is_null(n)
    }

    /// Appends a value to the column.
    ///
    /// # Panics
    ///
    /// Panics if the value does not fit the type of the column.
    pub fn push(&mut self, value: &DataValue) {
        if !self.try_push(value) {
            panic!(
                "failed to push value: type mismatch, {} into {}",
                value.type_name(),
                self.data_type
            );
        }
    }

    /// Appends a value to the column. Returns `false` if the value does not fit the type of the
    /// column, in which case the column is unchanged.
    #[must_use]
    pub fn try_push(&mut self, value: &DataValue) -> bool {
        if value.is_null() {
            if !self.data_type.is_nullable() {
                return false;
            }
            self.array.push_null();
            return true;
        }
        self.array.push(value)
    }

    /// Appends a value, storing the default value instead of a null that the type can not hold.
    pub fn push_or_default(&mut self, value: &DataValue) {
        if value.is_null() {
            self.insert_default();
        } else {
            self.push(value);
        }
    }
}

impl Column for TypedArray {
    fn name(&self) -> String {
        self.data_type.to_string()
    }

    fn len(&self) -> usize {
        self.array.len()
    }

    fn clone_empty(&self) -> Self {
        Self::new(self.data_type)
    }

    fn insert_many_defaults(&mut self, n: usize) {
        if self.data_type.is_nullable() {
            self.array.push_null_n(n);
        } else {
            let default = self.data_type.kind().default_value();
            for _ in 0..n {
                let pushed = self.array.push(&default);
                debug_assert!(pushed);
            }
        }
    }

    fn insert_range_from(&mut self, src: &Self, start: usize, length: usize) {
        self.array.extend_from(&src.array, start, length);
    }

    fn pop_back(&mut self, n: usize) {
        let len = self.len();
        self.array.truncate(len - n.min(len));
    }

    fn is_default_at(&self, n: usize) -> bool {
        self.get(n) == self.data_type.default_value()
    }

    fn reserve(&mut self, additional: usize) {
        self.array.reserve(additional);
    }

    fn byte_size(&self) -> usize {
        self.array.byte_size()
    }

    fn byte_size_at(&self, n: usize) -> usize {
        self.array.byte_size_at(n)
    }

    fn allocated_bytes(&self) -> usize {
        self.array.allocated_bytes()
    }

    fn update_hash_with_value<H: Hasher>(&self, n: usize, hasher: &mut H) {
        self.array.hash_at(n, hasher);
    }

    fn structure_equals(&self, other: &Self) -> bool {
        self.data_type == other.data_type
    }

    fn serialize_value_into_arena(&self, n: usize, arena: &mut Arena) {
        let buf = arena.buf_mut();
        if self.data_type.is_nullable() {
            let is_null = self.array.is_null(n);
            buf.put_u8(is_null as u8);
            if is_null {
                return;
            }
        }
        self.array.encode_at(n, buf);
    }

    fn deserialize_and_insert_from_arena(&mut self, pos: &mut &[u8]) -> ColumnResult<()> {
        if self.data_type.is_nullable() && read_u8(pos)? != 0 {
            self.array.push_null();
            return Ok(());
        }
        self.array.decode_and_push(pos)
    }

    fn skip_serialized_in_arena(&self, pos: &mut &[u8]) -> ColumnResult<()> {
        if self.data_type.is_nullable() && read_u8(pos)? != 0 {
            return Ok(());
        }
        self.array.skip_encoded(pos)
    }

    fn filter(&self, mask: &[bool]) -> ColumnResult<Self> {
        check_filter(self.len(), mask)?;
        Ok(Self {
            data_type: self.data_type,
            array: self.array.filter(mask),
        })
    }

    fn index(&self, indices: &[usize], limit: usize) -> ColumnResult<Self> {
        let indices = check_index(self.len(), indices, limit)?;
        Ok(Self {
            data_type: self.data_type,
            array: self.array.pick(indices),
        })
    }
}
