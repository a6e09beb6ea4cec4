// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

use std::fmt::Debug;
use std::hash::Hash;

use bytes::{Buf, BufMut};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{DataValue, F64};

/// A fixed-width value stored in a `PrimitiveArray`.
pub trait NativeType:
    PartialOrd
    + PartialEq
    + Debug
    + Copy
    + Send
    + Sync
    + Sized
    + Default
    + Hash
    + Serialize
    + DeserializeOwned
    + 'static
{
    /// Width of each element
    const WIDTH: usize;

    /// Encode the value to the end of a buffer.
    fn encode(&self, buffer: &mut impl BufMut);

    /// Decode a value from a buffer. The buffer must hold at least `WIDTH` bytes.
    fn decode(buffer: &mut impl Buf) -> Self;

    fn into_value(self) -> DataValue;

    /// Extract a value of this type, converting losslessly where possible.
    fn from_value(value: &DataValue) -> Option<Self>;
}

impl NativeType for bool {
    const WIDTH: usize = std::mem::size_of::<u8>();

    fn encode(&self, buffer: &mut impl BufMut) {
        buffer.put_u8(*self as u8)
    }

    fn decode(buffer: &mut impl Buf) -> Self {
        buffer.get_u8() != 0
    }

    fn into_value(self) -> DataValue {
        DataValue::Bool(self)
    }

    fn from_value(value: &DataValue) -> Option<Self> {
        match value {
            DataValue::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

impl NativeType for i64 {
    const WIDTH: usize = std::mem::size_of::<i64>();

    fn encode(&self, buffer: &mut impl BufMut) {
        buffer.put_i64_le(*self);
    }

    fn decode(buffer: &mut impl Buf) -> Self {
        buffer.get_i64_le()
    }

    fn into_value(self) -> DataValue {
        DataValue::Int64(self)
    }

    fn from_value(value: &DataValue) -> Option<Self> {
        match value {
            DataValue::Int64(v) => Some(*v),
            _ => None,
        }
    }
}

impl NativeType for F64 {
    const WIDTH: usize = std::mem::size_of::<f64>();

    fn encode(&self, buffer: &mut impl BufMut) {
        buffer.put_f64_le(self.0);
    }

    fn decode(buffer: &mut impl Buf) -> Self {
        F64::from(buffer.get_f64_le())
    }

    fn into_value(self) -> DataValue {
        DataValue::Float64(self)
    }

    fn from_value(value: &DataValue) -> Option<Self> {
        match value {
            DataValue::Float64(v) => Some(*v),
            DataValue::Int64(v) => Some(F64::from(*v as f64)),
            _ => None,
        }
    }
}
