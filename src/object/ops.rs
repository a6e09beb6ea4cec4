// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

use std::collections::BTreeMap;
use std::hash::Hasher;
use std::sync::Arc;

use super::{ObjectArray, ObjectStatistics};
use crate::arena::Arena;
use crate::array::*;
use crate::error::ColumnResult;
use crate::options::ObjectOptions;

/// Apply a transform to every tier and build a new column from the results.
macro_rules! fan_out {
    ($self:ident, $method:ident($($arg:expr),*)) => {{
        let typed_paths = $self
            .typed_paths
            .iter()
            .map(|(path, c)| Ok((path.clone(), Arc::new(c.$method($($arg),*)?))))
            .collect::<ColumnResult<BTreeMap<_, _>>>()?;
        let dynamic_paths = $self
            .dynamic_paths
            .iter()
            .map(|(path, c)| Ok((path.clone(), Arc::new(c.$method($($arg),*)?))))
            .collect::<ColumnResult<BTreeMap<_, _>>>()?;
        Ok(ObjectArray {
            typed_paths,
            dynamic_paths,
            shared_data: Arc::new($self.shared_data.$method($($arg),*)?),
            options: $self.options,
            statistics: ObjectStatistics::default(),
        })
    }};
}

impl Column for ObjectArray {
    fn name(&self) -> String {
        self.format_name()
    }

    fn len(&self) -> usize {
        self.shared_data.len()
    }

    fn clone_empty(&self) -> Self {
        Self {
            typed_paths: self
                .typed_paths
                .iter()
                .map(|(path, c)| (path.clone(), Arc::new(c.clone_empty())))
                .collect(),
            dynamic_paths: self
                .dynamic_paths
                .iter()
                .map(|(path, c)| (path.clone(), Arc::new(c.clone_empty())))
                .collect(),
            shared_data: Arc::new(self.shared_data.clone_empty()),
            options: self.options,
            statistics: self.statistics.clone(),
        }
    }

    fn insert_many_defaults(&mut self, n: usize) {
        for c in self.typed_paths.values_mut() {
            Arc::make_mut(c).insert_many_defaults(n);
        }
        for c in self.dynamic_paths.values_mut() {
            Arc::make_mut(c).insert_many_defaults(n);
        }
        Arc::make_mut(&mut self.shared_data).insert_many_defaults(n);
    }

    fn insert_range_from(&mut self, src: &Self, start: usize, length: usize) {
        self.append_range(src, start, length);
    }

    /// Remove the last `n` rows. Dynamic paths are kept, even if they become empty.
    fn pop_back(&mut self, n: usize) {
        for c in self.typed_paths.values_mut() {
            Arc::make_mut(c).pop_back(n);
        }
        for c in self.dynamic_paths.values_mut() {
            Arc::make_mut(c).pop_back(n);
        }
        Arc::make_mut(&mut self.shared_data).pop_back(n);
    }

    fn is_default_at(&self, n: usize) -> bool {
        self.typed_paths.values().all(|c| c.is_default_at(n))
            && self.dynamic_paths.values().all(|c| c.is_default_at(n))
            && self.shared_data.is_default_at(n)
    }

    fn reserve(&mut self, additional: usize) {
        for c in self.typed_paths.values_mut() {
            Arc::make_mut(c).reserve(additional);
        }
        for c in self.dynamic_paths.values_mut() {
            Arc::make_mut(c).reserve(additional);
        }
        Arc::make_mut(&mut self.shared_data).reserve(additional);
    }

    fn byte_size(&self) -> usize {
        self.typed_paths.values().map(|c| c.byte_size()).sum::<usize>()
            + self.dynamic_paths.values().map(|c| c.byte_size()).sum::<usize>()
            + self.shared_data.byte_size()
    }

    fn byte_size_at(&self, n: usize) -> usize {
        self.typed_paths.values().map(|c| c.byte_size_at(n)).sum::<usize>()
            + self.dynamic_paths.values().map(|c| c.byte_size_at(n)).sum::<usize>()
            + self.shared_data.byte_size_at(n)
    }

    fn allocated_bytes(&self) -> usize {
        self.typed_paths.values().map(|c| c.allocated_bytes()).sum::<usize>()
            + self.dynamic_paths.values().map(|c| c.allocated_bytes()).sum::<usize>()
            + self.shared_data.allocated_bytes()
    }

    fn update_hash_with_value<H: Hasher>(&self, n: usize, hasher: &mut H) {
        for c in self.typed_paths.values() {
            c.update_hash_with_value(n, hasher);
        }
        for c in self.dynamic_paths.values() {
            c.update_hash_with_value(n, hasher);
        }
        self.shared_data.update_hash_with_value(n, hasher);
    }

    /// Dynamic paths are not part of the structure.
    fn structure_equals(&self, other: &Self) -> bool {
        self.options.max_dynamic_paths == other.options.max_dynamic_paths
            && self.options.max_dynamic_types == other.options.max_dynamic_types
            && self.typed_paths.len() == other.typed_paths.len()
            && self.typed_paths.iter().all(|(path, c)| {
                other
                    .typed_paths
                    .get(path)
                    .is_some_and(|o| c.structure_equals(o))
            })
    }

    fn serialize_value_into_arena(&self, n: usize, arena: &mut Arena) {
        self.serialize_row_into_arena(n, arena);
    }

    fn deserialize_and_insert_from_arena(&mut self, pos: &mut &[u8]) -> ColumnResult<()> {
        self.deserialize_row_from_arena(pos)
    }

    fn skip_serialized_in_arena(&self, pos: &mut &[u8]) -> ColumnResult<()> {
        self.skip_row_in_arena(pos)
    }

    fn filter(&self, mask: &[bool]) -> ColumnResult<Self> {
        check_filter(self.len(), mask)?;
        fan_out!(self, filter(mask))
    }

    fn expand(&mut self, mask: &[bool], inverted: bool) -> ColumnResult<()> {
        check_expand(self.len(), mask, inverted)?;
        for c in self.typed_paths.values_mut() {
            Arc::make_mut(c).expand(mask, inverted)?;
        }
        for c in self.dynamic_paths.values_mut() {
            Arc::make_mut(c).expand(mask, inverted)?;
        }
        Arc::make_mut(&mut self.shared_data).expand(mask, inverted)
    }

    fn index(&self, indices: &[usize], limit: usize) -> ColumnResult<Self> {
        let indices = check_index(self.len(), indices, limit)?;
        fan_out!(self, index(indices, 0))
    }

    fn permute(&self, perm: &[usize], limit: usize) -> ColumnResult<Self> {
        check_permutation(self.len(), perm, limit)?;
        fan_out!(self, permute(perm, limit))
    }

    fn replicate(&self, offsets: &[usize]) -> ColumnResult<Self> {
        check_replicate(self.len(), offsets)?;
        fan_out!(self, replicate(offsets))
    }

    fn scatter(&self, num_columns: usize, selector: &[usize]) -> ColumnResult<Vec<Self>> {
        check_scatter(self.len(), num_columns, selector)?;
        let mut typed_paths = vec![BTreeMap::new(); num_columns];
        for (path, c) in &self.typed_paths {
            for (part, c) in typed_paths.iter_mut().zip(c.scatter(num_columns, selector)?) {
                part.insert(path.clone(), Arc::new(c));
            }
        }
        let mut dynamic_paths = vec![BTreeMap::new(); num_columns];
        for (path, c) in &self.dynamic_paths {
            for (part, c) in dynamic_paths.iter_mut().zip(c.scatter(num_columns, selector)?) {
                part.insert(path.clone(), Arc::new(c));
            }
        }
        let shared_data = self.shared_data.scatter(num_columns, selector)?;
        Ok(typed_paths
            .into_iter()
            .zip(dynamic_paths)
            .zip(shared_data)
            .map(|((typed_paths, dynamic_paths), shared_data)| ObjectArray {
                typed_paths,
                dynamic_paths,
                shared_data: Arc::new(shared_data),
                options: self.options,
                statistics: ObjectStatistics::default(),
            })
            .collect())
    }
}

/// An [`ObjectArray`] with every tier compressed.
#[derive(Debug, Clone)]
pub struct CompressedObject {
    typed_paths: BTreeMap<String, CompressedArray<TypedArray>>,
    dynamic_paths: BTreeMap<String, CompressedArray<DynamicArray>>,
    shared_data: CompressedArray<SharedDataArray>,
    options: ObjectOptions,
    statistics: ObjectStatistics,
}

impl ObjectArray {
    pub fn compress(&self) -> ColumnResult<CompressedObject> {
        Ok(CompressedObject {
            typed_paths: self
                .typed_paths
                .iter()
                .map(|(path, c)| Ok((path.clone(), CompressedArray::compress(&**c)?)))
                .collect::<ColumnResult<_>>()?,
            dynamic_paths: self
                .dynamic_paths
                .iter()
                .map(|(path, c)| Ok((path.clone(), CompressedArray::compress(&**c)?)))
                .collect::<ColumnResult<_>>()?,
            shared_data: CompressedArray::compress(&*self.shared_data)?,
            options: self.options,
            statistics: self.statistics.clone(),
        })
    }
}

impl CompressedObject {
    pub fn len(&self) -> usize {
        self.shared_data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared_data.is_empty()
    }

    /// Size of the compressed data of all tiers.
    pub fn byte_size(&self) -> usize {
        self.typed_paths.values().map(|c| c.byte_size()).sum::<usize>()
            + self.dynamic_paths.values().map(|c| c.byte_size()).sum::<usize>()
            + self.shared_data.byte_size()
    }

    pub fn decompress(&self) -> ColumnResult<ObjectArray> {
        let typed_paths = self
            .typed_paths
            .iter()
            .map(|(path, c)| Ok((path.clone(), Arc::new(c.decompress()?))))
            .collect::<ColumnResult<_>>()?;
        let dynamic_paths = self
            .dynamic_paths
            .iter()
            .map(|(path, c)| Ok((path.clone(), Arc::new(c.decompress()?))))
            .collect::<ColumnResult<_>>()?;
        ObjectArray::from_parts(
            typed_paths,
            dynamic_paths,
            Arc::new(self.shared_data.decompress()?),
            self.options,
            self.statistics.clone(),
        )
    }
}
