// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

use std::fmt::{self, Debug};
use std::hash::Hash;
use std::marker::PhantomData;
use std::mem;

use bitvec::vec::BitVec;
use serde::{Deserialize, Serialize};

use super::Array;

/// A collection of variable-length values.
#[derive(Serialize, Deserialize)]
#[serde(
    try_from = "RawBytesArray",
    bound(serialize = "", deserialize = "")
)]
pub struct BytesArray<T: ValueRef + ?Sized> {
    offset: Vec<usize>,
    valid: BitVec,
    data: Vec<u8>,
    #[serde(skip)]
    _type: PhantomData<T>,
}

/// The borrowed type of a variable-length value.
pub trait ValueRef: ToOwned + AsRef<[u8]> + PartialEq + Hash + Send + Sync + 'static {
    /// Returns `true` if the bytes are a valid value.
    fn validate(s: &[u8]) -> bool;

    /// Convert from bytes written by `as_ref`.
    fn from_bytes(s: &[u8]) -> &Self;
}

impl ValueRef for str {
    fn validate(s: &[u8]) -> bool {
        std::str::from_utf8(s).is_ok()
    }

    fn from_bytes(s: &[u8]) -> &Self {
        // SAFETY: the array only holds bytes copied from `&str`, or validated on deserialization.
        unsafe { std::str::from_utf8_unchecked(s) }
    }
}

impl ValueRef for [u8] {
    fn validate(_: &[u8]) -> bool {
        true
    }

    fn from_bytes(s: &[u8]) -> &Self {
        s
    }
}

pub type Utf8Array = BytesArray<str>;
pub type BlobArray = BytesArray<[u8]>;

impl<T: ValueRef + ?Sized> Clone for BytesArray<T> {
    fn clone(&self) -> Self {
        Self {
            offset: self.offset.clone(),
            valid: self.valid.clone(),
            data: self.data.clone(),
            _type: PhantomData,
        }
    }
}

impl<T: ValueRef + ?Sized> Default for BytesArray<T> {
    fn default() -> Self {
        Self::with_capacity(0)
    }
}

impl<T: ValueRef + ?Sized> PartialEq for BytesArray<T> {
    fn eq(&self, other: &Self) -> bool {
        self.offset == other.offset && self.valid == other.valid && self.data == other.data
    }
}

impl<T: ValueRef + ?Sized + Debug> Debug for BytesArray<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<T: ValueRef + ?Sized> Array for BytesArray<T> {
    type Item = T;

    fn with_capacity(capacity: usize) -> Self {
        let mut offset = Vec::with_capacity(capacity + 1);
        offset.push(0);
        Self {
            offset,
            valid: BitVec::with_capacity(capacity),
            // For variable-length values, we cannot know the exact size of the value.
            data: Vec::with_capacity(capacity),
            _type: PhantomData,
        }
    }

    fn is_null(&self, idx: usize) -> bool {
        !self.valid[idx]
    }

    fn get_raw(&self, idx: usize) -> &T {
        T::from_bytes(&self.data[self.offset[idx]..self.offset[idx + 1]])
    }

    fn len(&self) -> usize {
        self.valid.len()
    }

    fn push(&mut self, value: Option<&T>) {
        self.valid.push(value.is_some());
        if let Some(x) = value {
            self.data.extend_from_slice(x.as_ref());
        }
        self.offset.push(self.data.len());
    }

    fn push_n(&mut self, n: usize, value: Option<&T>) {
        self.valid.resize(self.valid.len() + n, value.is_some());
        if let Some(value) = value {
            self.data.reserve(value.as_ref().len() * n);
            self.offset.reserve(n);
            for _ in 0..n {
                self.data.extend_from_slice(value.as_ref());
                self.offset.push(self.data.len());
            }
        } else {
            self.offset
                .extend(std::iter::repeat(self.data.len()).take(n));
        }
    }

    fn truncate(&mut self, len: usize) {
        if len >= self.len() {
            return;
        }
        self.valid.truncate(len);
        self.offset.truncate(len + 1);
        self.data.truncate(self.offset[len]);
    }

    fn reserve(&mut self, additional: usize) {
        self.offset.reserve(additional);
        self.valid.reserve(additional);
        self.data.reserve(additional);
    }

    fn extend_from(&mut self, other: &Self, start: usize, len: usize) {
        let end = start + len;
        self.valid.extend_from_bitslice(&other.valid[start..end]);
        let base = other.offset[start];
        self.data
            .extend_from_slice(&other.data[base..other.offset[end]]);
        let shift = self.offset[self.offset.len() - 1];
        self.offset
            .extend(other.offset[start + 1..=end].iter().map(|o| o - base + shift));
    }

    fn null_count(&self) -> usize {
        self.valid.count_zeros()
    }

    fn byte_size(&self) -> usize {
        self.data.len() + self.offset.len() * mem::size_of::<usize>() + self.valid.len().div_ceil(8)
    }

    fn byte_size_at(&self, idx: usize) -> usize {
        self.offset[idx + 1] - self.offset[idx] + mem::size_of::<usize>()
    }

    fn allocated_bytes(&self) -> usize {
        self.data.capacity()
            + self.offset.capacity() * mem::size_of::<usize>()
            + self.valid.capacity().div_ceil(8)
    }
}

/// Serialized form of a [`BytesArray`], checked before use.
#[derive(Deserialize)]
struct RawBytesArray {
    offset: Vec<usize>,
    valid: BitVec,
    data: Vec<u8>,
}

impl<T: ValueRef + ?Sized> TryFrom<RawBytesArray> for BytesArray<T> {
    type Error = String;

    fn try_from(raw: RawBytesArray) -> Result<Self, Self::Error> {
        let RawBytesArray {
            offset,
            valid,
            data,
        } = raw;
        if offset.len() != valid.len() + 1 || offset.first() != Some(&0) {
            return Err("offsets do not match the validity bitmap".into());
        }
        if offset.last() != Some(&data.len()) {
            return Err("offsets do not match the data length".into());
        }
        for w in offset.windows(2) {
            if w[0] > w[1] {
                return Err("offsets are not monotonic".into());
            }
            if !T::validate(&data[w[0]..w[1]]) {
                return Err("invalid value in array".into());
            }
        }
        Ok(Self {
            offset,
            valid,
            data,
            _type: PhantomData,
        })
    }
}

// Enable `collect()` an array from iterator of `Option<&T>` or `Option<T::Owned>`.
impl<O: AsRef<T>, T: ValueRef + ?Sized> FromIterator<Option<O>> for BytesArray<T> {
    fn from_iter<I: IntoIterator<Item = Option<O>>>(iter: I) -> Self {
        let iter = iter.into_iter();
        let mut array = Self::with_capacity(iter.size_hint().0);
        for e in iter {
            if let Some(s) = e {
                array.push(Some(s.as_ref()));
            } else {
                array.push(None);
            }
        }
        array
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::ArrayToVecExt;

    #[test]
    fn test_utf8_array() {
        let mut array = Utf8Array::with_capacity(100);
        for i in 0..100 {
            if i % 2 == 0 {
                array.push(Some(&format!("{}", i)));
            } else {
                array.push(None);
            }
        }
        assert_eq!(array.len(), 100);
        assert_eq!(array.get(10), Some("10"));
        assert_eq!(array.get(11), None);
        assert_eq!(array.null_count(), 50);
    }

    #[test]
    fn test_extend_from() {
        let a: Utf8Array = [Some("a"), None, Some("bc"), Some("def")].into_iter().collect();
        let mut b: Utf8Array = [Some("x")].into_iter().collect();
        b.extend_from(&a, 1, 3);
        assert_eq!(
            b.to_vec(),
            vec![
                Some("x".to_string()),
                None,
                Some("bc".to_string()),
                Some("def".to_string())
            ]
        );
        b.truncate(2);
        assert_eq!(b.to_vec(), vec![Some("x".to_string()), None]);
        b.push(Some("y"));
        assert_eq!(b.get(2), Some("y"));
    }

    #[test]
    fn test_serde_validates() {
        let array: BlobArray = [Some(&[0xffu8, 0xfe][..]), None].into_iter().collect();
        let bytes = bincode::serialize(&array).unwrap();
        let blob: BlobArray = bincode::deserialize(&bytes).unwrap();
        assert_eq!(blob, array);
        assert!(bincode::deserialize::<Utf8Array>(&bytes).is_err());
    }
}
