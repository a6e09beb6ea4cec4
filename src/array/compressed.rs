// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

use std::fmt;
use std::marker::PhantomData;

use lz4_flex::{compress_prepend_size, decompress_size_prepended};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::Column;
use crate::error::ColumnResult;

/// A column serialized with bincode and compressed with LZ4.
pub struct CompressedArray<C> {
    len: usize,
    data: Vec<u8>,
    _column: PhantomData<C>,
}

impl<C: Column + Serialize + DeserializeOwned> CompressedArray<C> {
    pub fn compress(column: &C) -> ColumnResult<Self> {
        let encoded = bincode::serialize(column)?;
        Ok(Self {
            len: column.len(),
            data: compress_prepend_size(&encoded),
            _column: PhantomData,
        })
    }

    pub fn decompress(&self) -> ColumnResult<C> {
        let encoded = decompress_size_prepended(&self.data)?;
        Ok(bincode::deserialize(&encoded)?)
    }
}

impl<C> CompressedArray<C> {
    /// Number of rows of the compressed column.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Size of the compressed data.
    pub fn byte_size(&self) -> usize {
        self.data.len()
    }
}

impl<C> Clone for CompressedArray<C> {
    fn clone(&self) -> Self {
        Self {
            len: self.len,
            data: self.data.clone(),
            _column: PhantomData,
        }
    }
}

impl<C> fmt::Debug for CompressedArray<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompressedArray")
            .field("len", &self.len)
            .field("byte_size", &self.data.len())
            .finish()
    }
}
