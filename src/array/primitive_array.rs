// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

use std::iter::FromIterator;
use std::mem;

use bitvec::vec::BitVec;
use serde::{Deserialize, Serialize};

use super::Array;
use crate::types::NativeType;

/// A collection of primitive types, such as `i64`, `F64`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct PrimitiveArray<T: NativeType> {
    valid: BitVec,
    data: Vec<T>,
}

// Enable `collect()` an array from iterator of `Option<T>`.
impl<T: NativeType> FromIterator<Option<T>> for PrimitiveArray<T> {
    fn from_iter<I: IntoIterator<Item = Option<T>>>(iter: I) -> Self {
        let iter = iter.into_iter();
        let mut array = Self::with_capacity(iter.size_hint().0);
        for e in iter {
            array.push(e.as_ref());
        }
        array
    }
}

// Enable `collect()` an array from iterator of `T`.
impl<T: NativeType> FromIterator<T> for PrimitiveArray<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        iter.into_iter().map(Some).collect()
    }
}

impl<T: NativeType> Array for PrimitiveArray<T> {
    type Item = T;

    fn with_capacity(capacity: usize) -> Self {
        Self {
            valid: BitVec::with_capacity(capacity),
            data: Vec::with_capacity(capacity),
        }
    }

    fn is_null(&self, idx: usize) -> bool {
        !self.valid[idx]
    }

    fn get_raw(&self, idx: usize) -> &T {
        &self.data[idx]
    }

    fn len(&self) -> usize {
        self.valid.len()
    }

    fn push(&mut self, value: Option<&T>) {
        self.valid.push(value.is_some());
        self.data.push(value.cloned().unwrap_or_default());
    }

    fn push_n(&mut self, n: usize, value: Option<&T>) {
        self.valid.resize(self.valid.len() + n, value.is_some());
        self.data
            .resize(self.data.len() + n, value.cloned().unwrap_or_default());
    }

    fn truncate(&mut self, len: usize) {
        self.valid.truncate(len);
        self.data.truncate(len);
    }

    fn reserve(&mut self, additional: usize) {
        self.valid.reserve(additional);
        self.data.reserve(additional);
    }

    fn extend_from(&mut self, other: &Self, start: usize, len: usize) {
        let end = start + len;
        self.valid.extend_from_bitslice(&other.valid[start..end]);
        self.data.extend_from_slice(&other.data[start..end]);
    }

    fn null_count(&self) -> usize {
        self.valid.count_zeros()
    }

    fn byte_size(&self) -> usize {
        self.data.len() * mem::size_of::<T>() + self.valid.len().div_ceil(8)
    }

    fn byte_size_at(&self, _idx: usize) -> usize {
        mem::size_of::<T>()
    }

    fn allocated_bytes(&self) -> usize {
        self.data.capacity() * mem::size_of::<T>() + self.valid.capacity().div_ceil(8)
    }
}
