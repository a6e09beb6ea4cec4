// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

//! Array implementations, and the columns an object column is built from.
//!
//! An [`Array`] is an append-only vector of nullable values of one type. [`ArrayImpl`] erases the
//! value type, and the [`Column`] trait describes the structural contract that every tier of an
//! object column fulfills.

use std::hash::{Hash, Hasher};

use bytes::BufMut;
use serde::{Deserialize, Serialize};

use crate::arena::{read_bytes, read_len, read_sized};
use crate::error::{ColumnError, ColumnResult};
use crate::types::{DataTypeKind, DataValue, NativeType, F64};

mod bytes_array;
mod column;
mod compressed;
mod dynamic_array;
mod iterator;
mod primitive_array;
mod shared_data;
mod shuffle_ext;
mod typed_array;

pub use self::bytes_array::*;
pub use self::column::*;
pub use self::compressed::*;
pub use self::dynamic_array::*;
pub use self::iterator::*;
pub use self::primitive_array::*;
pub use self::shared_data::*;
pub use self::shuffle_ext::*;
pub use self::typed_array::*;

/// A trait over all arrays.
///
/// Arrays are mutable and append-only: values are pushed to the back and can only be removed by
/// truncating. The `push` function always accepts a reference to an element. e.g. for
/// `PrimitiveArray`, you must do `array.push(Some(&1))`. For `Utf8Array`, you must do
/// `array.push(Some("xxx"))`. Note that you don't need to construct a `String`.
///
/// The `Item` is the item you could retrieve from this array.
/// For example, `PrimitiveArray` could return an `Option<&i64>`, and `Utf8Array` will
/// return an `Option<&str>`.
pub trait Array: Sized + Clone + Send + Sync + 'static {
    /// Type of element in the array.
    type Item: ?Sized + ToOwned + PartialEq + Hash;

    /// Create a new empty array with `capacity`.
    fn with_capacity(capacity: usize) -> Self;

    /// Returns true if the value at `idx` is null.
    fn is_null(&self, idx: usize) -> bool;

    /// Returns the raw value at `idx`, regardless of null.
    fn get_raw(&self, idx: usize) -> &Self::Item;

    /// Retrieve a reference to value.
    fn get(&self, idx: usize) -> Option<&Self::Item> {
        if self.is_null(idx) {
            None
        } else {
            Some(self.get_raw(idx))
        }
    }

    /// Number of items of array.
    fn len(&self) -> usize;

    /// Returns true if the array is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append a value to the array.
    fn push(&mut self, value: Option<&Self::Item>);

    /// Append a value multiple times.
    fn push_n(&mut self, n: usize, value: Option<&Self::Item>) {
        for _ in 0..n {
            self.push(value);
        }
    }

    /// Shorten the array, keeping the first `len` elements.
    fn truncate(&mut self, len: usize);

    /// Reserve at least `additional` elements.
    fn reserve(&mut self, additional: usize);

    /// Append `len` elements of `other` starting at `start`.
    fn extend_from(&mut self, other: &Self, start: usize, len: usize);

    /// Number of nulls in the array.
    fn null_count(&self) -> usize;

    /// Bytes occupied by the values of the array.
    fn byte_size(&self) -> usize;

    /// Bytes occupied by the value at `idx`.
    fn byte_size_at(&self, idx: usize) -> usize;

    /// Bytes allocated by the array, including spare capacity.
    fn allocated_bytes(&self) -> usize;

    /// Get iterator of current array.
    fn iter(&self) -> ArrayIter<'_, Self> {
        ArrayIter::new(self)
    }

    /// Get iterator over the non-null values of current array.
    fn nonnull_iter(&self) -> NonNullArrayIter<'_, Self> {
        NonNullArrayIter::new(self)
    }

    /// Filter the elements and return a new array.
    fn filter(&self, p: &[bool]) -> Self {
        assert_eq!(p.len(), self.len());
        let mut array = Self::with_capacity(p.iter().filter(|x| **x).count());
        for (i, &v) in p.iter().enumerate() {
            if v {
                array.push(self.get(i));
            }
        }
        array
    }
}

pub type BoolArray = PrimitiveArray<bool>;
pub type I64Array = PrimitiveArray<i64>;
pub type F64Array = PrimitiveArray<F64>;

/// Embeds all types of arrays in `array` module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ArrayImpl {
    Bool(BoolArray),
    Int64(I64Array),
    Float64(F64Array),
    String(Utf8Array),
    Blob(BlobArray),
}

/// Evaluate `$body` with `$array` bound to the inner array of an [`ArrayImpl`].
macro_rules! dispatch {
    ($self:expr, $array:ident => $body:expr) => {
        match $self {
            ArrayImpl::Bool($array) => $body,
            ArrayImpl::Int64($array) => $body,
            ArrayImpl::Float64($array) => $body,
            ArrayImpl::String($array) => $body,
            ArrayImpl::Blob($array) => $body,
        }
    };
}

macro_rules! impl_into {
    ($x:ty, $y:ident) => {
        impl From<$x> for ArrayImpl {
            fn from(array: $x) -> Self {
                Self::$y(array)
            }
        }
    };
}

impl_into! { BoolArray, Bool }
impl_into! { I64Array, Int64 }
impl_into! { F64Array, Float64 }
impl_into! { Utf8Array, String }
impl_into! { BlobArray, Blob }

impl ArrayImpl {
    /// Create an empty array of the given kind.
    pub fn new(kind: DataTypeKind) -> Self {
        Self::with_capacity(kind, 0)
    }

    pub fn with_capacity(kind: DataTypeKind, capacity: usize) -> Self {
        match kind {
            DataTypeKind::Bool => Self::Bool(BoolArray::with_capacity(capacity)),
            DataTypeKind::Int64 => Self::Int64(I64Array::with_capacity(capacity)),
            DataTypeKind::Float64 => Self::Float64(F64Array::with_capacity(capacity)),
            DataTypeKind::String => Self::String(Utf8Array::with_capacity(capacity)),
            DataTypeKind::Blob => Self::Blob(BlobArray::with_capacity(capacity)),
        }
    }

    pub fn kind(&self) -> DataTypeKind {
        match self {
            Self::Bool(_) => DataTypeKind::Bool,
            Self::Int64(_) => DataTypeKind::Int64,
            Self::Float64(_) => DataTypeKind::Float64,
            Self::String(_) => DataTypeKind::String,
            Self::Blob(_) => DataTypeKind::Blob,
        }
    }

    /// Create an empty array of the same kind.
    pub fn new_empty(&self) -> Self {
        Self::new(self.kind())
    }

    pub fn len(&self) -> usize {
        dispatch!(self, a => a.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_null(&self, idx: usize) -> bool {
        dispatch!(self, a => a.is_null(idx))
    }

    pub fn null_count(&self) -> usize {
        dispatch!(self, a => a.null_count())
    }

    /// Get the value at the given index.
    pub fn get(&self, idx: usize) -> DataValue {
        match self {
            Self::Bool(a) => a.get(idx).map_or(DataValue::Null, |v| v.into_value()),
            Self::Int64(a) => a.get(idx).map_or(DataValue::Null, |v| v.into_value()),
            Self::Float64(a) => a.get(idx).map_or(DataValue::Null, |v| v.into_value()),
            Self::String(a) => a.get(idx).map_or(DataValue::Null, DataValue::from),
            Self::Blob(a) => a
                .get(idx)
                .map_or(DataValue::Null, |v| DataValue::Blob(v.to_vec())),
        }
    }

    /// Appends a value to the back of array.
    ///
    /// Returns `false` and leaves the array unchanged if the value does not fit the array.
    #[must_use]
    pub fn push(&mut self, value: &DataValue) -> bool {
        if value.is_null() {
            self.push_null();
            return true;
        }
        match (self, value) {
            (Self::Bool(a), v) => match bool::from_value(v) {
                Some(v) => a.push(Some(&v)),
                None => return false,
            },
            (Self::Int64(a), v) => match i64::from_value(v) {
                Some(v) => a.push(Some(&v)),
                None => return false,
            },
            (Self::Float64(a), v) => match F64::from_value(v) {
                Some(v) => a.push(Some(&v)),
                None => return false,
            },
            (Self::String(a), DataValue::String(v)) => a.push(Some(v)),
            (Self::Blob(a), DataValue::Blob(v)) => a.push(Some(v)),
            (Self::Blob(a), DataValue::String(v)) => a.push(Some(v.as_bytes())),
            _ => return false,
        }
        true
    }

    pub fn push_null(&mut self) {
        self.push_null_n(1);
    }

    pub fn push_null_n(&mut self, n: usize) {
        dispatch!(self, a => a.push_n(n, None))
    }

    pub fn truncate(&mut self, len: usize) {
        dispatch!(self, a => a.truncate(len))
    }

    pub fn reserve(&mut self, additional: usize) {
        dispatch!(self, a => a.reserve(additional))
    }

    /// Append `len` elements of `other` starting at `start`.
    ///
    /// # Panics
    ///
    /// Panics if the arrays are of different kinds.
    pub fn extend_from(&mut self, other: &Self, start: usize, len: usize) {
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => a.extend_from(b, start, len),
            (Self::Int64(a), Self::Int64(b)) => a.extend_from(b, start, len),
            (Self::Float64(a), Self::Float64(b)) => a.extend_from(b, start, len),
            (Self::String(a), Self::String(b)) => a.extend_from(b, start, len),
            (Self::Blob(a), Self::Blob(b)) => a.extend_from(b, start, len),
            (a, b) => panic!(
                "failed to extend array: type mismatch, {} vs {}",
                a.kind(),
                b.kind()
            ),
        }
    }

    /// Pick rows by `indices` into a new array.
    pub fn pick(&self, indices: &[usize]) -> Self {
        dispatch!(self, a => a.pick(indices).into())
    }

    pub fn filter(&self, p: &[bool]) -> Self {
        dispatch!(self, a => a.filter(p).into())
    }

    pub fn byte_size(&self) -> usize {
        dispatch!(self, a => a.byte_size())
    }

    pub fn byte_size_at(&self, idx: usize) -> usize {
        dispatch!(self, a => a.byte_size_at(idx))
    }

    pub fn allocated_bytes(&self) -> usize {
        dispatch!(self, a => a.allocated_bytes())
    }

    /// Feed the value at `idx` into the hasher.
    pub fn hash_at<H: Hasher>(&self, idx: usize, state: &mut H) {
        dispatch!(self, a => a.get(idx).hash(state))
    }

    /// Write the native encoding of the non-null value at `idx`.
    ///
    /// Fixed-width values are written as is, strings and blobs are prefixed by their length.
    pub fn encode_at(&self, idx: usize, buf: &mut impl BufMut) {
        match self {
            Self::Bool(a) => a.get_raw(idx).encode(buf),
            Self::Int64(a) => a.get_raw(idx).encode(buf),
            Self::Float64(a) => a.get_raw(idx).encode(buf),
            Self::String(a) => put_sized(buf, a.get_raw(idx).as_bytes()),
            Self::Blob(a) => put_sized(buf, a.get_raw(idx)),
        }
    }

    /// Decode a value written by [`ArrayImpl::encode_at`] and append it.
    pub fn decode_and_push(&mut self, pos: &mut &[u8]) -> ColumnResult<()> {
        match self {
            Self::Bool(a) => a.push(Some(&bool::decode(&mut read_bytes(pos, bool::WIDTH)?))),
            Self::Int64(a) => a.push(Some(&i64::decode(&mut read_bytes(pos, i64::WIDTH)?))),
            Self::Float64(a) => a.push(Some(&F64::decode(&mut read_bytes(pos, F64::WIDTH)?))),
            Self::String(a) => {
                let bytes = read_sized(pos)?;
                let s = std::str::from_utf8(bytes)
                    .map_err(|_| ColumnError::logical("string in arena is not UTF-8"))?;
                a.push(Some(s));
            }
            Self::Blob(a) => a.push(Some(read_sized(pos)?)),
        }
        Ok(())
    }

    /// Advance the cursor past a value written by [`ArrayImpl::encode_at`].
    pub fn skip_encoded(&self, pos: &mut &[u8]) -> ColumnResult<()> {
        let len = match self {
            Self::Bool(_) => bool::WIDTH,
            Self::Int64(_) => i64::WIDTH,
            Self::Float64(_) => F64::WIDTH,
            Self::String(_) | Self::Blob(_) => read_len(pos)?,
        };
        read_bytes(pos, len)?;
        Ok(())
    }
}

fn put_sized(buf: &mut impl BufMut, bytes: &[u8]) {
    buf.put_u64_le(bytes.len() as u64);
    buf.put_slice(bytes);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_values() {
        let mut array = ArrayImpl::new(DataTypeKind::Float64);
        assert!(array.push(&DataValue::from(1.5)));
        assert!(array.push(&DataValue::Int64(2)));
        assert!(array.push(&DataValue::Null));
        assert!(!array.push(&DataValue::from("x")));
        assert_eq!(array.len(), 3);
        assert_eq!(array.get(1), DataValue::from(2.0));
        assert_eq!(array.get(2), DataValue::Null);
        assert_eq!(array.null_count(), 1);

        let mut array = ArrayImpl::new(DataTypeKind::Blob);
        assert!(array.push(&DataValue::from("ab")));
        assert_eq!(array.get(0), DataValue::Blob(b"ab".to_vec()));
        assert!(!array.push(&DataValue::List(vec![])));
    }

    #[test]
    fn encode_decode() {
        let mut array = ArrayImpl::new(DataTypeKind::String);
        assert!(array.push(&DataValue::from("hello")));
        let mut buf = vec![];
        array.encode_at(0, &mut buf);
        buf.extend_from_slice(b"rest");

        let mut pos = &buf[..];
        array.skip_encoded(&mut pos).unwrap();
        assert_eq!(pos, b"rest");

        let mut pos = &buf[..];
        let mut decoded = array.new_empty();
        decoded.decode_and_push(&mut pos).unwrap();
        assert_eq!(decoded, array);
        assert_eq!(pos, b"rest");
    }

    #[test]
    #[should_panic]
    fn extend_type_mismatch() {
        let mut a = ArrayImpl::new(DataTypeKind::Int64);
        let b = ArrayImpl::new(DataTypeKind::Bool);
        a.extend_from(&b, 0, 0);
    }
}
