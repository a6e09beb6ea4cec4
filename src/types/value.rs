// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::*;

/// A dynamically-typed value of an object path.
#[derive(Debug, Default, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DataValue {
    // NOTE: Null comes first.
    // => NULL is less than any non-NULL values
    #[default]
    Null,
    Bool(bool),
    Int64(i64),
    Float64(F64),
    String(String),
    Blob(Vec<u8>),
    List(Vec<DataValue>),
}

impl DataValue {
    /// Returns `true` if value is null.
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Get the kind of a scalar value. `None` for nulls and lists, which can not be stored in a
    /// typed array.
    pub fn kind(&self) -> Option<DataTypeKind> {
        Some(match self {
            Self::Null | Self::List(_) => return None,
            Self::Bool(_) => DataTypeKind::Bool,
            Self::Int64(_) => DataTypeKind::Int64,
            Self::Float64(_) => DataTypeKind::Float64,
            Self::String(_) => DataTypeKind::String,
            Self::Blob(_) => DataTypeKind::Blob,
        })
    }

    /// Name of the value type, as shown in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "Null",
            Self::Bool(_) => "Bool",
            Self::Int64(_) => "Int64",
            Self::Float64(_) => "Float64",
            Self::String(_) => "String",
            Self::Blob(_) => "Blob",
            Self::List(_) => "List",
        }
    }
}

impl fmt::Display for DataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int64(v) => write!(f, "{v}"),
            Self::Float64(v) => write!(f, "{v}"),
            Self::String(v) => write!(f, "'{v}'"),
            Self::Blob(v) => {
                write!(f, "'\\x")?;
                for b in v {
                    write!(f, "{b:02X}")?;
                }
                write!(f, "'")
            }
            Self::List(v) => {
                write!(f, "[")?;
                for (i, item) in v.iter().enumerate() {
                    if i != 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
        }
    }
}

macro_rules! impl_from_for_datavalue {
    ($($t:ty => |$v:ident| $e:expr),* $(,)?) => {
        $(
            impl From<$t> for DataValue {
                fn from($v: $t) -> Self {
                    $e
                }
            }
        )*
    };
}

impl_from_for_datavalue! {
    bool => |v| Self::Bool(v),
    i32 => |v| Self::Int64(v as i64),
    i64 => |v| Self::Int64(v),
    f64 => |v| Self::Float64(F64::from(v)),
    F64 => |v| Self::Float64(v),
    String => |v| Self::String(v),
    &str => |v| Self::String(v.to_string()),
    Vec<u8> => |v| Self::Blob(v),
    Vec<DataValue> => |v| Self::List(v),
}

impl<T: Into<DataValue>> From<Option<T>> for DataValue {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Self::Null,
        }
    }
}
