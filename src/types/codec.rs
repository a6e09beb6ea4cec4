// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

//! Tagged binary encoding of [`DataValue`].
//!
//! Every value starts with a one-byte tag followed by its payload:
//!
//! ```plain
//! | tag | payload                                   |
//! |-----|-------------------------------------------|
//! | 0   | (null)                                    |
//! | 1   | u8                                        |
//! | 2   | i64                                       |
//! | 3   | f64                                       |
//! | 4   | len: u64, utf-8 bytes                     |
//! | 5   | len: u64, bytes                           |
//! | 6   | count: u64, `count` encoded values        |
//! ```
//!
//! All integers are encoded in little-endian. Decoding is limited by [`FormatSettings`].

use bytes::{Buf, BufMut};
use thiserror::Error;

use super::*;
use crate::options::FormatSettings;

pub const NULL_TAG: u8 = 0;
const BOOL_TAG: u8 = 1;
const INT64_TAG: u8 = 2;
const FLOAT64_TAG: u8 = 3;
const STRING_TAG: u8 = 4;
const BLOB_TAG: u8 = 5;
const LIST_TAG: u8 = 6;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("unexpected end of input")]
    UnexpectedEof,
    #[error("unknown value tag: {0}")]
    UnknownTag(u8),
    #[error("string is not valid UTF-8")]
    InvalidUtf8,
    #[error("value is nested deeper than {0} levels")]
    TooDeep(usize),
    #[error("value of {0} bytes exceeds the limit")]
    TooLarge(u64),
}

impl DataValue {
    /// Append the binary encoding of the value to `buf`.
    pub fn serialize_binary(&self, buf: &mut impl BufMut) {
        match self {
            Self::Null => buf.put_u8(NULL_TAG),
            Self::Bool(v) => {
                buf.put_u8(BOOL_TAG);
                v.encode(buf);
            }
            Self::Int64(v) => {
                buf.put_u8(INT64_TAG);
                v.encode(buf);
            }
            Self::Float64(v) => {
                buf.put_u8(FLOAT64_TAG);
                v.encode(buf);
            }
            Self::String(v) => {
                buf.put_u8(STRING_TAG);
                buf.put_u64_le(v.len() as u64);
                buf.put_slice(v.as_bytes());
            }
            Self::Blob(v) => {
                buf.put_u8(BLOB_TAG);
                buf.put_u64_le(v.len() as u64);
                buf.put_slice(v);
            }
            Self::List(v) => {
                buf.put_u8(LIST_TAG);
                buf.put_u64_le(v.len() as u64);
                for item in v {
                    item.serialize_binary(buf);
                }
            }
        }
    }

    /// Encode the value into a new buffer.
    pub fn to_binary(&self) -> Vec<u8> {
        let mut buf = vec![];
        self.serialize_binary(&mut buf);
        buf
    }

    /// Decode one value from the front of `buf`.
    pub fn deserialize_binary(
        buf: &mut impl Buf,
        settings: &FormatSettings,
    ) -> Result<Self, DecodeError> {
        decode_value(buf, settings, 0)
    }

    /// Decode one value that was encoded by a column of this crate.
    ///
    /// Format limits only guard untrusted input, so they are not checked here.
    pub fn deserialize_stored(buf: &mut impl Buf) -> Result<Self, DecodeError> {
        decode_value(buf, &FormatSettings::UNLIMITED, 0)
    }
}

/// Returns the kind of the encoded value without decoding it.
pub fn peek_binary_kind(encoded: &[u8]) -> Option<DataTypeKind> {
    Some(match *encoded.first()? {
        BOOL_TAG => DataTypeKind::Bool,
        INT64_TAG => DataTypeKind::Int64,
        FLOAT64_TAG => DataTypeKind::Float64,
        STRING_TAG => DataTypeKind::String,
        BLOB_TAG => DataTypeKind::Blob,
        _ => return None,
    })
}

/// Returns `true` if the encoded value is null.
pub fn is_binary_null(encoded: &[u8]) -> bool {
    encoded.first() == Some(&NULL_TAG)
}

/// Advance `buf` past one encoded value, validating its structure.
pub fn skip_binary(buf: &mut &[u8], settings: &FormatSettings) -> Result<(), DecodeError> {
    skip_value(buf, settings, 0)
}

fn ensure(buf: &impl Buf, len: usize) -> Result<(), DecodeError> {
    if buf.remaining() < len {
        return Err(DecodeError::UnexpectedEof);
    }
    Ok(())
}

fn decode_len(buf: &mut impl Buf, settings: &FormatSettings) -> Result<usize, DecodeError> {
    ensure(buf, 8)?;
    let len = buf.get_u64_le();
    if len > settings.max_value_size as u64 {
        return Err(DecodeError::TooLarge(len));
    }
    Ok(len as usize)
}

fn decode_bytes(buf: &mut impl Buf, settings: &FormatSettings) -> Result<Vec<u8>, DecodeError> {
    let len = decode_len(buf, settings)?;
    ensure(buf, len)?;
    let mut bytes = vec![0; len];
    buf.copy_to_slice(&mut bytes);
    Ok(bytes)
}

fn decode_value(
    buf: &mut impl Buf,
    settings: &FormatSettings,
    depth: usize,
) -> Result<DataValue, DecodeError> {
    ensure(buf, 1)?;
    Ok(match buf.get_u8() {
        NULL_TAG => DataValue::Null,
        BOOL_TAG => {
            ensure(buf, bool::WIDTH)?;
            DataValue::Bool(bool::decode(buf))
        }
        INT64_TAG => {
            ensure(buf, i64::WIDTH)?;
            DataValue::Int64(i64::decode(buf))
        }
        FLOAT64_TAG => {
            ensure(buf, F64::WIDTH)?;
            DataValue::Float64(F64::decode(buf))
        }
        STRING_TAG => {
            let bytes = decode_bytes(buf, settings)?;
            DataValue::String(String::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8)?)
        }
        BLOB_TAG => DataValue::Blob(decode_bytes(buf, settings)?),
        LIST_TAG => {
            if depth >= settings.max_nesting_depth {
                return Err(DecodeError::TooDeep(settings.max_nesting_depth));
            }
            let count = decode_len(buf, settings)?;
            // every item takes at least one byte
            ensure(buf, count)?;
            let mut items = Vec::with_capacity(count);
            for _ in 0..count {
                items.push(decode_value(buf, settings, depth + 1)?);
            }
            DataValue::List(items)
        }
        tag => return Err(DecodeError::UnknownTag(tag)),
    })
}

fn skip_value(buf: &mut &[u8], settings: &FormatSettings, depth: usize) -> Result<(), DecodeError> {
    ensure(buf, 1)?;
    match buf.get_u8() {
        NULL_TAG => {}
        BOOL_TAG => skip_fixed(buf, bool::WIDTH)?,
        INT64_TAG => skip_fixed(buf, i64::WIDTH)?,
        FLOAT64_TAG => skip_fixed(buf, F64::WIDTH)?,
        STRING_TAG | BLOB_TAG => {
            let len = decode_len(buf, settings)?;
            skip_fixed(buf, len)?;
        }
        LIST_TAG => {
            if depth >= settings.max_nesting_depth {
                return Err(DecodeError::TooDeep(settings.max_nesting_depth));
            }
            let count = decode_len(buf, settings)?;
            for _ in 0..count {
                skip_value(buf, settings, depth + 1)?;
            }
        }
        tag => return Err(DecodeError::UnknownTag(tag)),
    }
    Ok(())
}

fn skip_fixed(buf: &mut &[u8], len: usize) -> Result<(), DecodeError> {
    ensure(buf, len)?;
    buf.advance(len);
    Ok(())
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    fn decode(bytes: &[u8]) -> Result<DataValue, DecodeError> {
        let mut buf = bytes;
        DataValue::deserialize_binary(&mut buf, &FormatSettings::default())
    }

    #[test_case(DataValue::Null)]
    #[test_case(DataValue::Bool(true))]
    #[test_case(DataValue::Int64(-42))]
    #[test_case(DataValue::from(2.5))]
    #[test_case(DataValue::from("héllo"))]
    #[test_case(DataValue::Blob(vec![0, 1, 255]))]
    #[test_case(DataValue::List(vec![DataValue::Null, 1.into(), DataValue::List(vec!["x".into()])]))]
    fn encoding_is_self_delimiting(value: DataValue) {
        let mut bytes = value.to_binary();
        bytes.extend_from_slice(b"trailing");
        let mut buf = &bytes[..];
        let decoded = DataValue::deserialize_binary(&mut buf, &FormatSettings::default()).unwrap();
        assert_eq!(decoded, value);
        assert_eq!(buf, b"trailing");

        let mut buf = &bytes[..];
        skip_binary(&mut buf, &FormatSettings::default()).unwrap();
        assert_eq!(buf, b"trailing");
    }

    #[test]
    fn malformed_input() {
        assert_eq!(decode(&[]), Err(DecodeError::UnexpectedEof));
        assert_eq!(decode(&[42]), Err(DecodeError::UnknownTag(42)));
        assert_eq!(decode(&[INT64_TAG, 1, 2]), Err(DecodeError::UnexpectedEof));

        let mut bytes = vec![STRING_TAG];
        bytes.put_u64_le(2);
        bytes.put_slice(&[0xff, 0xfe]);
        assert_eq!(decode(&bytes), Err(DecodeError::InvalidUtf8));
    }

    #[test]
    fn limits() {
        let settings = FormatSettings {
            max_nesting_depth: 1,
            max_value_size: 4,
        };
        let nested = DataValue::List(vec![DataValue::List(vec![])]).to_binary();
        let mut buf = &nested[..];
        assert_eq!(
            DataValue::deserialize_binary(&mut buf, &settings),
            Err(DecodeError::TooDeep(1))
        );

        let long = DataValue::from("too long").to_binary();
        let mut buf = &long[..];
        assert_eq!(
            DataValue::deserialize_binary(&mut buf, &settings),
            Err(DecodeError::TooLarge(8))
        );
    }

    #[test]
    fn peek_kind() {
        assert_eq!(peek_binary_kind(&DataValue::from(1).to_binary()), Some(DataTypeKind::Int64));
        assert_eq!(peek_binary_kind(&DataValue::List(vec![]).to_binary()), None);
        assert!(is_binary_null(&DataValue::Null.to_binary()));
        assert!(!is_binary_null(&DataValue::from(false).to_binary()));
    }
}
