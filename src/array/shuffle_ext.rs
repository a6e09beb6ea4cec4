// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

//! Utilities to shuffle [`Array`] content.

use itertools::Itertools;

use super::*;

/// Transform an [`Array`] to `Vec<Option<Item>>`.
pub trait ArrayToVecExt: Array {
    /// Transform an [`Array`] to `Vec<Option<Item>>`.
    ///
    /// ```
    /// use shapeless::array::*;
    ///
    /// let array = I64Array::from_iter([1, 3, 5, 7, 9].map(Some));
    /// assert_eq!(
    ///     array.to_vec(),
    ///     vec![Some(1), Some(3), Some(5), Some(7), Some(9)]
    /// );
    /// ```
    fn to_vec(&self) -> Vec<Option<<Self::Item as ToOwned>::Owned>> {
        self.iter().map(|x| x.map(|x| x.to_owned())).collect_vec()
    }
}

impl<T: Array> ArrayToVecExt for T {}

/// Pick scattered array values into a new array.
pub trait ArrayPickExt: Array {
    /// Pick rows accroding to `logical_rows` into a new array.
    ///
    /// For example, the array contains `[1, 3, 5, 7, 9]`, and `logical_rows` is
    /// `[4, 2, 0]`, then the result is `[9, 5, 1]`.
    ///
    /// ```
    /// use shapeless::array::*;
    ///
    /// let array = I64Array::from_iter([1, 3, 5, 7, 9].map(Some));
    /// assert_eq!(array.pick(&[4, 2, 0]).to_vec(), vec![Some(9), Some(5), Some(1)]);
    /// ```
    fn pick(&self, logical_rows: &[usize]) -> Self {
        let mut array = Self::with_capacity(logical_rows.len());
        for idx in logical_rows {
            array.push(self.get(*idx));
        }
        array
    }
}

impl<T: Array> ArrayPickExt for T {}
