// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

use thiserror::Error;

use crate::types::DecodeError;

/// The error type of column operations.
#[derive(Error, Debug)]
pub enum ColumnError {
    /// The caller broke an invariant of the column. Not recoverable locally.
    #[error("logical error: {0}")]
    Logical(String),
    /// The method has no meaning for this kind of column.
    #[error("method {method} is not supported for {column}")]
    NotImplemented { method: &'static str, column: String },
    #[error("failed to decode value: {0}")]
    Decode(#[from] DecodeError),
    #[error("failed to serialize column: {0}")]
    Serialize(#[from] bincode::Error),
    #[error("failed to decompress column: {0}")]
    Decompress(#[from] lz4_flex::block::DecompressError),
}

impl ColumnError {
    pub(crate) fn logical(msg: impl Into<String>) -> Self {
        Self::Logical(msg.into())
    }

    /// Returns `true` if the error means the operation is meaningless for the column, rather than
    /// a bug in the caller.
    pub fn is_not_implemented(&self) -> bool {
        matches!(self, Self::NotImplemented { .. })
    }
}

pub type ColumnResult<T> = std::result::Result<T, ColumnError>;
