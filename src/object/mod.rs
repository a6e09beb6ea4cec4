// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

//! A column of schemaless objects.
//!
//! Every row of an [`ObjectArray`] is an [`Object`]: a mapping from paths to values. The values
//! of a path are stored in one of three tiers:
//!
//! * typed paths: declared on construction, each stored in a [`TypedArray`] of a fixed type.
//! * dynamic paths: discovered on insertion, each stored in a [`DynamicArray`]. At most
//!   `max_dynamic_paths` paths get a dynamic column, for the lifetime of the column.
//! * shared data: all other paths, stored per row as sorted `(path, encoded value)` entries in a
//!   [`SharedDataArray`].
//!
//! All tiers always have the same number of rows, and a path is stored in at most one tier of a
//! row. A null value of a dynamic path can not be told apart from an absent path: both are read
//! back as absent, and null values are never written to shared data.
//!
//! Tiers are shared between clones of a column, and copied on first write.

use std::collections::BTreeMap;
use std::fmt::Write;
use std::sync::Arc;

use tracing::debug;

use crate::array::*;
use crate::error::{ColumnError, ColumnResult};
use crate::options::ObjectOptions;
use crate::types::{DataType, DataValue, Object};

mod arena;
mod insert;
mod merge;
mod ops;
mod statistics;
mod subcolumns;

pub use self::ops::CompressedObject;
pub use self::statistics::*;
pub use self::subcolumns::*;

/// A column of schemaless objects. See the [module-level documentation](self) for details.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectArray {
    typed_paths: BTreeMap<String, Arc<TypedArray>>,
    dynamic_paths: BTreeMap<String, Arc<DynamicArray>>,
    shared_data: Arc<SharedDataArray>,
    options: ObjectOptions,
    statistics: ObjectStatistics,
}

/// The column of one path, as returned by [`ObjectArray::subcolumn`].
#[derive(Debug, Clone, PartialEq)]
pub enum PathColumn {
    Typed(Arc<TypedArray>),
    Dynamic(Arc<DynamicArray>),
}

impl PathColumn {
    pub fn len(&self) -> usize {
        match self {
            Self::Typed(c) => c.len(),
            Self::Dynamic(c) => c.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, n: usize) -> DataValue {
        match self {
            Self::Typed(c) => c.get(n),
            Self::Dynamic(c) => c.get(n),
        }
    }
}

impl ObjectArray {
    /// Create an empty column with the given typed paths.
    ///
    /// `max_dynamic_types` is capped at [`MAX_DYNAMIC_TYPES_LIMIT`].
    pub fn new(
        typed_paths: impl IntoIterator<Item = (impl Into<String>, DataType)>,
        mut options: ObjectOptions,
    ) -> Self {
        options.max_dynamic_types = options.max_dynamic_types.min(MAX_DYNAMIC_TYPES_LIMIT);
        Self {
            typed_paths: typed_paths
                .into_iter()
                .map(|(path, ty)| (path.into(), Arc::new(TypedArray::new(ty))))
                .collect(),
            dynamic_paths: BTreeMap::new(),
            shared_data: Arc::new(SharedDataArray::new()),
            options,
            statistics: ObjectStatistics::default(),
        }
    }

    /// Create an empty column from empty typed path columns.
    pub fn from_typed_columns(
        typed_paths: BTreeMap<String, TypedArray>,
        options: ObjectOptions,
    ) -> ColumnResult<Self> {
        options.validate()?;
        if let Some((path, _)) = typed_paths.iter().find(|(_, c)| !c.is_empty()) {
            return Err(ColumnError::logical(format!(
                "unexpected non-empty typed path column {path} in Object column constructor"
            )));
        }
        Ok(Self {
            typed_paths: typed_paths
                .into_iter()
                .map(|(path, column)| (path, Arc::new(column)))
                .collect(),
            dynamic_paths: BTreeMap::new(),
            shared_data: Arc::new(SharedDataArray::new()),
            options,
            statistics: ObjectStatistics::default(),
        })
    }

    /// Create a column from populated tiers, possibly shared with other columns.
    pub fn from_parts(
        typed_paths: BTreeMap<String, Arc<TypedArray>>,
        dynamic_paths: BTreeMap<String, Arc<DynamicArray>>,
        shared_data: Arc<SharedDataArray>,
        options: ObjectOptions,
        statistics: ObjectStatistics,
    ) -> ColumnResult<Self> {
        options.validate()?;
        if dynamic_paths.len() > options.max_dynamic_paths {
            return Err(ColumnError::logical(format!(
                "the number of dynamic paths ({}) exceeds the limit ({})",
                dynamic_paths.len(),
                options.max_dynamic_paths
            )));
        }
        let len = shared_data.len();
        let lens = typed_paths
            .iter()
            .map(|(path, c)| (path, c.len()))
            .chain(dynamic_paths.iter().map(|(path, c)| (path, c.len())));
        for (path, path_len) in lens {
            if path_len != len {
                return Err(ColumnError::logical(format!(
                    "column of path {path} has {path_len} rows, but shared data has {len} rows"
                )));
            }
        }
        if let Some(path) = dynamic_paths.keys().find(|p| typed_paths.contains_key(*p)) {
            return Err(ColumnError::logical(format!(
                "path {path} is both a typed path and a dynamic path"
            )));
        }
        Ok(Self {
            typed_paths,
            dynamic_paths,
            shared_data,
            options,
            statistics,
        })
    }

    /// Create a column from owned populated tiers.
    pub fn from_owned_parts(
        typed_paths: BTreeMap<String, TypedArray>,
        dynamic_paths: BTreeMap<String, DynamicArray>,
        shared_data: SharedDataArray,
        options: ObjectOptions,
    ) -> ColumnResult<Self> {
        Self::from_parts(
            typed_paths
                .into_iter()
                .map(|(path, c)| (path, Arc::new(c)))
                .collect(),
            dynamic_paths
                .into_iter()
                .map(|(path, c)| (path, Arc::new(c)))
                .collect(),
            Arc::new(shared_data),
            options,
            ObjectStatistics::default(),
        )
    }

    pub fn typed_paths(&self) -> &BTreeMap<String, Arc<TypedArray>> {
        &self.typed_paths
    }

    pub fn dynamic_paths(&self) -> &BTreeMap<String, Arc<DynamicArray>> {
        &self.dynamic_paths
    }

    pub fn shared_data(&self) -> &SharedDataArray {
        &self.shared_data
    }

    pub fn options(&self) -> &ObjectOptions {
        &self.options
    }

    pub fn max_dynamic_paths(&self) -> usize {
        self.options.max_dynamic_paths
    }

    pub fn max_dynamic_types(&self) -> usize {
        self.options.max_dynamic_types
    }

    pub fn statistics(&self) -> &ObjectStatistics {
        &self.statistics
    }

    pub fn set_statistics(&mut self, statistics: ObjectStatistics) {
        self.statistics = statistics;
    }

    /// Read row `n`.
    ///
    /// Typed paths are always present. Dynamic paths are present only if the value is not null.
    ///
    /// # Panics
    ///
    /// Panics if a value of the row can not be decoded.
    pub fn get(&self, n: usize) -> Object {
        self.try_get(n)
            .unwrap_or_else(|e| panic!("failed to read row {n} of Object column: {e}"))
    }

    pub fn try_get(&self, n: usize) -> ColumnResult<Object> {
        let mut object = Object::new();
        for (path, column) in &self.typed_paths {
            object.insert(path.clone(), column.get(n));
        }
        for (path, column) in &self.dynamic_paths {
            if !column.is_null(n) {
                object.insert(path.clone(), column.try_get(n)?);
            }
        }
        for (path, mut value) in self.shared_data.row(n) {
            let value = DataValue::deserialize_stored(&mut value)?;
            object.insert(path.to_string(), value);
        }
        Ok(object)
    }

    /// Byte-level access is meaningless for an object column.
    pub fn get_data_at(&self, _n: usize) -> ColumnResult<&[u8]> {
        Err(self.not_implemented("get_data_at"))
    }

    /// Byte-level access is meaningless for an object column.
    pub fn insert_data(&mut self, _data: &[u8]) -> ColumnResult<()> {
        Err(self.not_implemented("insert_data"))
    }

    fn not_implemented(&self, method: &'static str) -> ColumnError {
        ColumnError::NotImplemented {
            method,
            column: self.name(),
        }
    }

    /// Add a dynamic path back-filled with nulls.
    ///
    /// Returns `None` without changing the column if the path is already typed or dynamic, or if
    /// the budget of dynamic paths is used up.
    pub fn try_to_add_new_dynamic_path(&mut self, path: &str) -> Option<&mut DynamicArray> {
        if self.dynamic_paths.len() >= self.options.max_dynamic_paths
            || self.typed_paths.contains_key(path)
            || self.dynamic_paths.contains_key(path)
        {
            return None;
        }
        let mut column = self.new_dynamic_column();
        column.insert_many_defaults(self.len());
        if self.dynamic_paths.len() + 1 == self.options.max_dynamic_paths {
            debug!(
                path,
                max_dynamic_paths = self.options.max_dynamic_paths,
                "reached the limit of dynamic paths"
            );
        }
        let column = self
            .dynamic_paths
            .entry(path.to_string())
            .or_insert_with(|| Arc::new(column));
        Some(Arc::make_mut(column))
    }

    /// Add dynamic paths back-filled with nulls. Paths that are already dynamic are kept as is.
    pub fn set_dynamic_paths(&mut self, paths: &[String]) -> ColumnResult<()> {
        let new_paths = paths
            .iter()
            .filter(|p| !self.dynamic_paths.contains_key(*p))
            .count();
        if self.dynamic_paths.len() + new_paths > self.options.max_dynamic_paths {
            return Err(ColumnError::logical(format!(
                "cannot set dynamic paths to Object column, the number of paths ({}) exceeds the limit ({})",
                self.dynamic_paths.len() + new_paths,
                self.options.max_dynamic_paths
            )));
        }
        if let Some(path) = paths.iter().find(|p| self.typed_paths.contains_key(*p)) {
            return Err(ColumnError::logical(format!(
                "cannot set dynamic path {path}, it is a typed path"
            )));
        }
        if let Some(path) = paths.iter().find(|p| {
            !self.dynamic_paths.contains_key(*p)
                && (0..self.len()).any(|n| self.shared_data.find_path(p, n).is_some())
        }) {
            return Err(ColumnError::logical(format!(
                "cannot set dynamic path {path}, it has values in shared data"
            )));
        }
        let len = self.len();
        for path in paths {
            if self.dynamic_paths.contains_key(path) {
                continue;
            }
            let mut column = self.new_dynamic_column();
            column.insert_many_defaults(len);
            self.dynamic_paths.insert(path.clone(), Arc::new(column));
        }
        Ok(())
    }

    fn new_dynamic_column(&self) -> DynamicArray {
        DynamicArray::new(self.options.max_dynamic_types, self.options.format)
    }

    /// The column of a single path. Paths that are neither typed nor dynamic are collected from
    /// shared data into a new dynamic column.
    pub fn subcolumn(&self, path: &str) -> ColumnResult<PathColumn> {
        if let Some(column) = self.typed_paths.get(path) {
            return Ok(PathColumn::Typed(column.clone()));
        }
        if let Some(column) = self.dynamic_paths.get(path) {
            return Ok(PathColumn::Dynamic(column.clone()));
        }
        let mut column = self.new_dynamic_column();
        self.shared_data
            .fill_path_column(path, 0, self.len(), &mut column)?;
        Ok(PathColumn::Dynamic(Arc::new(column)))
    }

    /// Identity permutation: objects are not comparable.
    pub fn get_permutation(&self) -> Vec<usize> {
        (0..self.len()).collect()
    }

    /// Detach all tiers shared with other columns.
    pub fn ensure_ownership(&mut self) {
        self.for_each_subcolumn_mut(|_| {});
    }

    /// Append defaults to the typed and dynamic columns that did not get a value for the row
    /// starting at `prev_size`.
    fn fill_remaining_paths(&mut self, prev_size: usize) {
        for column in self.typed_paths.values_mut() {
            if column.len() == prev_size {
                Arc::make_mut(column).insert_default();
            }
        }
        self.fill_remaining_dynamic_paths(prev_size, 1);
    }

    /// Append `length` defaults to the dynamic columns of `prev_size` rows.
    fn fill_remaining_dynamic_paths(&mut self, prev_size: usize, length: usize) {
        for column in self.dynamic_paths.values_mut() {
            if column.len() == prev_size {
                Arc::make_mut(column).insert_many_defaults(length);
            }
        }
    }

    pub(crate) fn format_name(&self) -> String {
        let mut name = format!(
            "Object(max_dynamic_paths={}, max_dynamic_types={}",
            self.options.max_dynamic_paths, self.options.max_dynamic_types
        );
        for (path, column) in &self.typed_paths {
            let _ = write!(name, ", {} {}", path, column.name());
        }
        name.push(')');
        name
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::types::{object_from_json, DataTypeKind};

    fn column(rows: &[serde_json::Value]) -> ObjectArray {
        let mut column = ObjectArray::new(
            [("id", DataTypeKind::Int64.nullable())],
            ObjectOptions::default_for_test(),
        );
        for row in rows {
            column.push(&object_from_json(row).unwrap());
        }
        column
    }

    #[test]
    fn set_dynamic_paths() {
        let mut column = column(&[json!({"a": 1}), json!({"id": 2})]);
        column
            .set_dynamic_paths(&["a".to_string(), "b".to_string()])
            .unwrap();
        assert_eq!(column.dynamic_paths()["a"].get(0), DataValue::Int64(1));
        assert_eq!(column.dynamic_paths()["b"].len(), 2);
        assert!(column.dynamic_paths()["b"].is_null(1));

        let too_many = ["c", "d", "e"].map(String::from);
        assert!(column.set_dynamic_paths(&too_many).is_err());
        assert!(column.set_dynamic_paths(&["id".to_string()]).is_err());
        assert_eq!(column.dynamic_paths().len(), 2);
    }

    #[test]
    fn set_dynamic_path_held_in_shared_data() {
        let mut shared = SharedDataArray::new();
        shared.push_entry("e", &DataValue::Int64(5).to_binary());
        shared.finish_row();
        let mut column = ObjectArray::from_owned_parts(
            BTreeMap::new(),
            BTreeMap::new(),
            shared,
            ObjectOptions::default_for_test(),
        )
        .unwrap();
        assert!(column.set_dynamic_paths(&["e".to_string()]).is_err());
        column.set_dynamic_paths(&["f".to_string()]).unwrap();
        assert_eq!(column.get(0)["e"], DataValue::Int64(5));
    }

    #[test]
    fn add_dynamic_path_only_once() {
        let mut column = column(&[json!({"id": 1, "a": 1})]);
        assert!(column.try_to_add_new_dynamic_path("id").is_none());
        assert!(column.try_to_add_new_dynamic_path("a").is_none());
        assert_eq!(column.dynamic_paths()["a"].get(0), DataValue::Int64(1));
        assert_eq!(column.dynamic_paths().len(), 1);
        assert!(!column.dynamic_paths().contains_key("id"));

        let added = column.try_to_add_new_dynamic_path("b").unwrap();
        assert_eq!(added.len(), 1);
        assert!(added.is_null(0));
        assert_eq!(column.dynamic_paths().len(), 2);
    }

    #[test]
    fn ownership_and_permutation() {
        let column = column(&[json!({"a": 1}), json!({"b": "x"}), json!({})]);
        let mut copy = column.clone();
        assert!(Arc::ptr_eq(&column.shared_data, &copy.shared_data));
        copy.ensure_ownership();
        assert!(!Arc::ptr_eq(&column.shared_data, &copy.shared_data));
        assert!(!Arc::ptr_eq(
            &column.dynamic_paths["a"],
            &copy.dynamic_paths["a"]
        ));
        assert_eq!(copy, column);
        assert_eq!(column.get_permutation(), vec![0, 1, 2]);
    }
}
