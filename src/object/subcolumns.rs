// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

//! Walking the columns nested in an object column.

use std::sync::Arc;

use super::ObjectArray;
use crate::array::*;

/// A column nested in an [`ObjectArray`].
#[derive(Debug, Clone, Copy)]
pub enum Subcolumn<'a> {
    Typed(&'a TypedArray),
    Dynamic(&'a DynamicArray),
    SharedData(&'a SharedDataArray),
    /// Values of a typed path, or a typed variant of a dynamic column.
    Array(&'a ArrayImpl),
    /// Paths of shared data.
    Utf8(&'a Utf8Array),
    /// Encoded values of shared data or of the shared variant of a dynamic column.
    Blob(&'a BlobArray),
}

impl<'a> Subcolumn<'a> {
    pub fn len(&self) -> usize {
        match self {
            Self::Typed(c) => c.len(),
            Self::Dynamic(c) => c.len(),
            Self::SharedData(c) => c.len(),
            Self::Array(a) => a.len(),
            Self::Utf8(a) => a.len(),
            Self::Blob(a) => a.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Call `f` on every column nested in this one, depth first.
    pub fn for_each_subcolumn_recursively(self, f: &mut impl FnMut(Subcolumn<'a>)) {
        match self {
            Self::Typed(c) => visit(Self::Array(c.array()), f),
            Self::Dynamic(c) => {
                for variant in c.variants() {
                    visit(Self::Array(variant), f);
                }
                visit(Self::Blob(c.shared_variant()), f);
            }
            Self::SharedData(c) => {
                visit(Self::Utf8(c.paths()), f);
                visit(Self::Blob(c.values()), f);
            }
            Self::Array(_) | Self::Utf8(_) | Self::Blob(_) => {}
        }
    }
}

fn visit<'a>(column: Subcolumn<'a>, f: &mut impl FnMut(Subcolumn<'a>)) {
    f(column);
    column.for_each_subcolumn_recursively(f);
}

/// A tier of an [`ObjectArray`], borrowed mutably.
#[derive(Debug)]
pub enum SubcolumnMut<'a> {
    Typed(&'a mut TypedArray),
    Dynamic(&'a mut DynamicArray),
    SharedData(&'a mut SharedDataArray),
}

impl ObjectArray {
    /// Call `f` on the typed columns, the dynamic columns and shared data, in this order.
    pub fn for_each_subcolumn<'a>(&'a self, mut f: impl FnMut(Subcolumn<'a>)) {
        for column in self.typed_paths.values() {
            f(Subcolumn::Typed(column));
        }
        for column in self.dynamic_paths.values() {
            f(Subcolumn::Dynamic(column));
        }
        f(Subcolumn::SharedData(&self.shared_data));
    }

    /// Like [`for_each_subcolumn`](Self::for_each_subcolumn), but also visits the columns nested
    /// in each tier right after it.
    pub fn for_each_subcolumn_recursively<'a>(&'a self, mut f: impl FnMut(Subcolumn<'a>)) {
        self.for_each_subcolumn(|column| visit(column, &mut f));
    }

    /// Call `f` on every tier, detaching the tiers shared with other columns.
    ///
    /// `f` must keep the tiers aligned.
    pub fn for_each_subcolumn_mut(&mut self, mut f: impl FnMut(SubcolumnMut<'_>)) {
        for column in self.typed_paths.values_mut() {
            f(SubcolumnMut::Typed(Arc::make_mut(column)));
        }
        for column in self.dynamic_paths.values_mut() {
            f(SubcolumnMut::Dynamic(Arc::make_mut(column)));
        }
        f(SubcolumnMut::SharedData(Arc::make_mut(&mut self.shared_data)));
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::options::ObjectOptions;
    use crate::types::{object_from_json, DataTypeKind};

    fn column() -> ObjectArray {
        let mut column = ObjectArray::new(
            [("id", DataTypeKind::Int64.not_null())],
            ObjectOptions::new(2, 2),
        );
        for row in [
            json!({"id": 1, "a": 1, "b": "x"}),
            json!({"b": [1], "c": true}),
        ] {
            column.push(&object_from_json(&row).unwrap());
        }
        column
    }

    fn tag(column: Subcolumn<'_>) -> String {
        match column {
            Subcolumn::Typed(_) => "typed".into(),
            Subcolumn::Dynamic(_) => "dynamic".into(),
            Subcolumn::SharedData(_) => "shared_data".into(),
            Subcolumn::Array(a) => a.kind().to_string(),
            Subcolumn::Utf8(_) => "paths".into(),
            Subcolumn::Blob(_) => "blob".into(),
        }
    }

    #[test]
    fn visit_tiers() {
        let column = column();
        let mut visited = vec![];
        column.for_each_subcolumn(|c| {
            assert_eq!(c.len(), 2);
            visited.push(tag(c));
        });
        assert_eq!(visited, ["typed", "dynamic", "dynamic", "shared_data"]);
    }

    #[test]
    fn visit_tiers_recursively() {
        let column = column();
        let mut visited = vec![];
        column.for_each_subcolumn_recursively(|c| visited.push(tag(c)));
        assert_eq!(
            visited,
            [
                "typed",
                "Int64",
                "dynamic", // a
                "Int64",
                "blob",
                "dynamic", // b
                "String",
                "blob",
                "shared_data",
                "paths",
                "blob",
            ]
        );

        let mut blobs = vec![];
        column.for_each_subcolumn_recursively(|c| {
            if let Subcolumn::Blob(b) = c {
                blobs.push(b.len());
            }
        });
        // a has no shared variant values, b has the list, shared data has "c"
        assert_eq!(blobs, [0, 1, 1]);
    }

    #[test]
    fn visit_tiers_mutably() {
        let column = column();
        let mut copy = column.clone();
        let mut tiers = 0;
        copy.for_each_subcolumn_mut(|c| {
            tiers += 1;
            if let SubcolumnMut::Dynamic(c) = c {
                c.reserve(16);
            }
        });
        assert_eq!(tiers, 4);
        assert!(!Arc::ptr_eq(&column.shared_data, &copy.shared_data));
        assert_eq!(copy, column);
    }
}
