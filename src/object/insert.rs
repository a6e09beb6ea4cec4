// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

use std::sync::Arc;

use tracing::debug;

use super::ObjectArray;
use crate::array::{fits_settings, Column};
use crate::types::Object;

impl ObjectArray {
    /// Append an object.
    ///
    /// Every path goes to its typed column if it is declared, otherwise to its dynamic column,
    /// otherwise to a new dynamic column if the budget allows it, otherwise to shared data. Null
    /// values are dropped on the way to shared data.
    ///
    /// # Panics
    ///
    /// Panics if a value does not fit the type of its typed path.
    pub fn push(&mut self, object: &Object) {
        let prev_size = self.len();
        for (path, value) in object {
            if let Some(column) = self.typed_paths.get_mut(path) {
                Arc::make_mut(column).push_or_default(value);
            } else if let Some(column) = self.dynamic_paths.get_mut(path) {
                Arc::make_mut(column).push(value);
            } else if let Some(column) = self.try_to_add_new_dynamic_path(path) {
                column.push(value);
            } else if !value.is_null() {
                // `object` iterates in path order, so the row stays sorted
                Arc::make_mut(&mut self.shared_data).push_entry(path, &value.to_binary());
            }
        }
        Arc::make_mut(&mut self.shared_data).finish_row();
        self.fill_remaining_paths(prev_size);
    }

    /// Append an object. Returns `false` if a value does not fit its typed path or the format
    /// settings, in which case the column is left exactly as it was.
    #[must_use]
    pub fn try_push(&mut self, object: &Object) -> bool {
        let mut guard = RollbackGuard::new(self);
        let column = &mut *guard.column;
        let prev_size = guard.rows;
        for (path, value) in object {
            let inserted = if let Some(typed) = column.typed_paths.get_mut(path) {
                Arc::make_mut(typed).try_push(value)
            } else if let Some(dynamic) = column.dynamic_paths.get_mut(path) {
                guard.num_variants.push((path.clone(), dynamic.num_variants()));
                Arc::make_mut(dynamic).try_push(value)
            } else if let Some(dynamic) = column.try_to_add_new_dynamic_path(path) {
                guard.new_dynamic_paths.push(path.clone());
                dynamic.try_push(value)
            } else if value.is_null() {
                true
            } else if fits_settings(value, &column.options.format, 0) {
                Arc::make_mut(&mut column.shared_data).push_entry(path, &value.to_binary());
                true
            } else {
                false
            };
            if !inserted {
                debug!(path = %path, value = %value, "failed to insert value into Object column");
                return false;
            }
        }
        Arc::make_mut(&mut column.shared_data).finish_row();
        column.fill_remaining_paths(prev_size);
        guard.committed = true;
        true
    }
}

/// Restores every tier of a column to its size at creation, unless committed.
pub(super) struct RollbackGuard<'a> {
    pub(super) column: &'a mut ObjectArray,
    pub(super) rows: usize,
    shared_entries: usize,
    pub(super) new_dynamic_paths: Vec<String>,
    /// Number of typed variants of the existing dynamic columns written to.
    pub(super) num_variants: Vec<(String, usize)>,
    pub(super) committed: bool,
}

impl<'a> RollbackGuard<'a> {
    pub(super) fn new(column: &'a mut ObjectArray) -> Self {
        Self {
            rows: column.len(),
            shared_entries: column.shared_data.num_entries(),
            column,
            new_dynamic_paths: vec![],
            num_variants: vec![],
            committed: false,
        }
    }
}

impl Drop for RollbackGuard<'_> {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        let rows = self.rows;
        let column = &mut *self.column;
        for path in &self.new_dynamic_paths {
            column.dynamic_paths.remove(path);
        }
        for c in column.typed_paths.values_mut() {
            let extra = c.len() - rows;
            if extra > 0 {
                Arc::make_mut(c).pop_back(extra);
            }
        }
        for c in column.dynamic_paths.values_mut() {
            let extra = c.len() - rows;
            if extra > 0 {
                Arc::make_mut(c).pop_back(extra);
            }
        }
        for (path, n) in &self.num_variants {
            if let Some(c) = column.dynamic_paths.get_mut(path) {
                if c.num_variants() > *n {
                    Arc::make_mut(c).truncate_variants(*n);
                }
            }
        }
        if column.shared_data.num_entries() > self.shared_entries || column.shared_data.len() > rows
        {
            Arc::make_mut(&mut column.shared_data).truncate(rows, self.shared_entries);
        }
        debug!(
            rows,
            removed_dynamic_paths = self.new_dynamic_paths.len(),
            "rolled back Object column"
        );
    }
}
