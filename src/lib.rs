// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

//! Columnar storage for schemaless objects.
//!
//! An [`ObjectArray`](object::ObjectArray) stores rows of path/value pairs in three tiers: typed
//! paths declared up front, a bounded set of dynamic paths discovered on insertion, and a sorted
//! shared-data fallback for everything else.

#![deny(unused_must_use)]

pub mod arena;
pub mod array;
mod error;
pub mod object;
mod options;
pub mod types;

pub use self::error::*;
pub use self::options::*;
