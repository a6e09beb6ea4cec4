// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

//! Appending rows of another object column, and reconciling the dynamic paths of several columns
//! before they are merged.

use std::collections::HashMap;
use std::sync::Arc;

use itertools::Itertools;
use smallvec::SmallVec;
use tracing::debug;

use super::{ObjectArray, ObjectStatistics, StatisticsSource};
use crate::array::{Column, DynamicArray, SharedDataArray};
use crate::error::{ColumnError, ColumnResult};

impl ObjectArray {
    /// Append `length` rows of `src` starting at `start`.
    ///
    /// Both columns must have the same typed paths. Dynamic paths of `src` become dynamic paths
    /// of `self` while the budget allows it, and go to shared data otherwise.
    pub(super) fn append_range(&mut self, src: &ObjectArray, start: usize, length: usize) {
        assert_eq!(
            self.typed_paths.len(),
            src.typed_paths.len(),
            "number of typed paths mismatch in insert_range_from"
        );
        for (path, column) in &mut self.typed_paths {
            let src_column = src
                .typed_paths
                .get(path)
                .unwrap_or_else(|| panic!("typed path {path} is missing in the source column"));
            Arc::make_mut(column).insert_range_from(src_column, start, length);
        }

        // paths of `src` that did not get a dynamic column, sorted
        let mut queued: SmallVec<[(&str, &DynamicArray); 8]> = SmallVec::new();
        for (path, src_column) in &src.dynamic_paths {
            if let Some(column) = self.dynamic_paths.get_mut(path) {
                Arc::make_mut(column).insert_range_from(src_column, start, length);
            } else if let Some(column) = self.try_to_add_new_dynamic_path(path) {
                column.insert_range_from(src_column, start, length);
            } else {
                queued.push((path.as_str(), &**src_column));
            }
        }

        self.insert_from_shared_data(src, &queued, start, length);
    }

    /// Append the shared data of `src` and the values of `queued` paths, then fill the dynamic
    /// paths that got no value.
    fn insert_from_shared_data(
        &mut self,
        src: &ObjectArray,
        queued: &[(&str, &DynamicArray)],
        start: usize,
        length: usize,
    ) {
        let prev_size = self.len();
        let src_shared = &*src.shared_data;
        let shared = Arc::make_mut(&mut self.shared_data);

        if src_shared.rows_range(start, length).is_empty() {
            if queued.is_empty() {
                shared.insert_many_defaults(length);
            } else {
                for n in start..start + length {
                    for (path, column) in queued {
                        serialize_path_and_value_into_shared_data(shared, path, column, n);
                    }
                    shared.finish_row();
                }
            }
            self.fill_remaining_dynamic_paths(prev_size, length);
            return;
        }

        for n in start..start + length {
            let current_size = shared.len();
            let mut queued_iter = queued.iter().peekable();
            for i in src_shared.row_range(n) {
                let path = src_shared.path_at(i);
                if let Some(column) = self.dynamic_paths.get_mut(path) {
                    Arc::make_mut(column).push_encoded(src_shared.value_at(i));
                    continue;
                }
                while let Some((queued_path, column)) = queued_iter.next_if(|(p, _)| *p < path) {
                    serialize_path_and_value_into_shared_data(shared, queued_path, column, n);
                }
                shared.push_entry_from(src_shared, i);
            }
            for (queued_path, column) in queued_iter {
                serialize_path_and_value_into_shared_data(shared, queued_path, column, n);
            }
            shared.finish_row();

            for column in self.dynamic_paths.values_mut() {
                if column.len() == current_size {
                    Arc::make_mut(column).insert_default();
                }
            }
        }
    }

    /// Choose the dynamic paths of this empty column from the columns that are going to be
    /// merged into it.
    ///
    /// If the paths of all sources do not fit in `max_dynamic_paths`, the paths with the most
    /// non-null values are kept. Among paths with equal counts the greater path wins. The structure of each kept dynamic column is then taken from the
    /// sources that have the path.
    pub fn take_dynamic_structure_from_source_columns(
        &mut self,
        sources: &[&ObjectArray],
    ) -> ColumnResult<()> {
        if !self.is_empty() {
            return Err(ColumnError::logical(
                "take_dynamic_structure_from_source_columns should be called only on empty Object column",
            ));
        }

        let mut totals: HashMap<&str, usize> = HashMap::new();
        for source in sources {
            for (path, column) in &source.dynamic_paths {
                let count = match source.statistics.data.get(path) {
                    Some(count) => *count,
                    None => column.len() - column.number_of_default_rows(),
                };
                *totals.entry(path).or_default() += count;
            }
        }

        let mut paths = totals.into_iter().collect_vec();
        if paths.len() > self.options.max_dynamic_paths {
            paths.sort_by(|(p1, c1), (p2, c2)| (c2, p2).cmp(&(c1, p1)));
            paths.truncate(self.options.max_dynamic_paths);
        }
        debug!(
            sources = sources.len(),
            paths = ?paths,
            "take dynamic structure of Object column"
        );

        self.dynamic_paths.clear();
        for (path, _) in &paths {
            let sources = sources
                .iter()
                .filter_map(|s| s.dynamic_paths.get(*path).map(|c| &**c))
                .collect_vec();
            let mut column = self.new_dynamic_column();
            column.take_dynamic_structure(&sources)?;
            self.dynamic_paths.insert(path.to_string(), Arc::new(column));
        }
        self.statistics = ObjectStatistics {
            source: StatisticsSource::Merge,
            data: paths
                .into_iter()
                .map(|(path, count)| (path.to_string(), count))
                .collect(),
        };
        Ok(())
    }
}

/// Append the value of `column` at row `n` to the row being built, unless it is null.
fn serialize_path_and_value_into_shared_data(
    shared: &mut SharedDataArray,
    path: &str,
    column: &DynamicArray,
    n: usize,
) {
    if column.is_null(n) {
        return;
    }
    let mut value = vec![];
    column.serialize_binary_at(n, &mut value);
    shared.push_entry(path, &value);
}
