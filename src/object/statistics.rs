// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::ObjectArray;
use crate::array::Column;

/// Where the statistics of an [`ObjectArray`] come from.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatisticsSource {
    /// Counted from the rows of the column.
    #[default]
    Read,
    /// Selected while reconciling the dynamic paths of several columns.
    Merge,
}

/// Advisory number of non-null values per dynamic path.
///
/// Only used to choose the dynamic paths of a merged column.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectStatistics {
    pub source: StatisticsSource,
    pub data: HashMap<String, usize>,
}

impl ObjectStatistics {
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl ObjectArray {
    /// Count the non-null values of every dynamic path and record them as the statistics of the
    /// column.
    pub fn compute_statistics(&mut self) -> &ObjectStatistics {
        let data = self
            .dynamic_paths
            .iter()
            .map(|(path, column)| (path.clone(), column.len() - column.null_count()))
            .collect();
        self.statistics = ObjectStatistics {
            source: StatisticsSource::Read,
            data,
        };
        &self.statistics
    }
}
