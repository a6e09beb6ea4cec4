// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

use std::fmt;
use std::str::FromStr;

use parse_display::{Display, FromStr};
use serde::{Deserialize, Serialize};

mod codec;
mod native;
mod object;
mod value;

pub use self::codec::*;
pub use self::native::*;
pub use self::object::*;
pub use self::value::*;

/// A wrapper around floats providing implementations of `Eq`, `Ord`, and `Hash`.
pub type F64 = ordered_float::OrderedFloat<f64>;

/// Kind of a typed column.
#[derive(
    Debug, Display, FromStr, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum DataTypeKind {
    Bool,
    Int64,
    Float64,
    String,
    Blob,
}

impl DataTypeKind {
    pub const fn nullable(self) -> DataType {
        DataType {
            kind: self,
            nullable: true,
        }
    }

    pub const fn not_null(self) -> DataType {
        DataType {
            kind: self,
            nullable: false,
        }
    }

    /// The value inserted when a row does not provide one.
    pub fn default_value(self) -> DataValue {
        match self {
            Self::Bool => DataValue::Bool(false),
            Self::Int64 => DataValue::Int64(0),
            Self::Float64 => DataValue::Float64(F64::from(0.0)),
            Self::String => DataValue::String(String::new()),
            Self::Blob => DataValue::Blob(vec![]),
        }
    }
}

/// Data type of a typed path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DataType {
    pub kind: DataTypeKind,
    pub nullable: bool,
}

impl DataType {
    pub const fn new(kind: DataTypeKind, nullable: bool) -> Self {
        Self { kind, nullable }
    }

    pub const fn kind(&self) -> DataTypeKind {
        self.kind
    }

    pub const fn is_nullable(&self) -> bool {
        self.nullable
    }

    /// The value inserted when a row does not provide one.
    pub fn default_value(&self) -> DataValue {
        if self.nullable {
            DataValue::Null
        } else {
            self.kind.default_value()
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.nullable {
            write!(f, "Nullable({})", self.kind)
        } else {
            write!(f, "{}", self.kind)
        }
    }
}

impl FromStr for DataType {
    type Err = parse_display::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.strip_prefix("Nullable(").and_then(|s| s.strip_suffix(')')) {
            Some(inner) => Ok(inner.trim().parse::<DataTypeKind>()?.nullable()),
            None => Ok(s.parse::<DataTypeKind>()?.not_null()),
        }
    }
}
