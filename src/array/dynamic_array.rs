// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};
use std::mem;

use bytes::BufMut;
use serde::{Deserialize, Serialize};
use tracing::trace;

use super::*;
use crate::arena::Arena;
use crate::options::FormatSettings;
use crate::types::{peek_binary_kind, NULL_TAG};

/// The largest number of typed variants a [`DynamicArray`] can hold.
///
/// Two discriminators are reserved for null and for the shared variant.
pub const MAX_DYNAMIC_TYPES_LIMIT: usize = 254;

const NULL_DISCRIMINATOR: u8 = u8::MAX;
const SHARED_DISCRIMINATOR: u8 = u8::MAX - 1;

/// A self-describing column that holds values of any type.
///
/// Values of the first `max_types` distinct kinds get a typed variant each. Values of other kinds,
/// and lists, are stored in their binary encoding in the shared variant.
///
/// ```plain
/// discriminators: [0, 255, 1, 254, 0]      255: null, 254: shared
/// offsets:        [0, 0,   0, 0,   1]      index into the variant
/// variants:       [Int64[1, 2], String["a"]]
/// shared:         [<encoded list>]
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicArray {
    max_types: usize,
    discriminators: Vec<u8>,
    offsets: Vec<usize>,
    variants: Vec<ArrayImpl>,
    shared: BlobArray,
    settings: FormatSettings,
}

impl DynamicArray {
    pub fn new(max_types: usize, settings: FormatSettings) -> Self {
        Self {
            max_types: max_types.min(MAX_DYNAMIC_TYPES_LIMIT),
            discriminators: vec![],
            offsets: vec![],
            variants: vec![],
            shared: BlobArray::with_capacity(0),
            settings,
        }
    }

    pub fn max_types(&self) -> usize {
        self.max_types
    }

    pub fn settings(&self) -> &FormatSettings {
        &self.settings
    }

    /// Kinds of the typed variants, in the order they were created.
    pub fn variant_kinds(&self) -> Vec<DataTypeKind> {
        self.variants.iter().map(|v| v.kind()).collect()
    }

    pub fn variants(&self) -> &[ArrayImpl] {
        &self.variants
    }

    /// Encoded values of the shared variant.
    pub fn shared_variant(&self) -> &BlobArray {
        &self.shared
    }

    pub fn num_variants(&self) -> usize {
        self.variants.len()
    }

    /// Drop the typed variants after the first `n`, which must be empty.
    pub(crate) fn truncate_variants(&mut self, n: usize) {
        debug_assert!(self.variants.iter().skip(n).all(|v| v.is_empty()));
        self.variants.truncate(n);
    }

    /// Number of values stored in the shared variant.
    pub fn shared_len(&self) -> usize {
        self.shared.len()
    }

    pub fn is_null(&self, n: usize) -> bool {
        self.discriminators[n] == NULL_DISCRIMINATOR
    }

    pub fn null_count(&self) -> usize {
        self.discriminators
            .iter()
            .filter(|d| **d == NULL_DISCRIMINATOR)
            .count()
    }

    /// Get the value at row `n`.
    ///
    /// # Panics
    ///
    /// Panics if a value of the shared variant can not be decoded.
    pub fn get(&self, n: usize) -> DataValue {
        self.try_get(n)
            .unwrap_or_else(|e| panic!("corrupted dynamic value at row {n}: {e}"))
    }

    pub fn try_get(&self, n: usize) -> ColumnResult<DataValue> {
        let offset = self.offsets[n];
        Ok(match self.discriminators[n] {
            NULL_DISCRIMINATOR => DataValue::Null,
            SHARED_DISCRIMINATOR => {
                let mut encoded = self.shared.get_raw(offset);
                DataValue::deserialize_stored(&mut encoded)?
            }
            d => self.variants[d as usize].get(offset),
        })
    }

    /// Appends a value to the column.
    pub fn push(&mut self, value: &DataValue) {
        let kind = match value {
            DataValue::Null => {
                self.push_discriminator(NULL_DISCRIMINATOR, 0);
                return;
            }
            DataValue::List(_) => None,
            value => value.kind(),
        };
        if let Some(d) = kind.and_then(|kind| self.variant_for(kind)) {
            let variant = &mut self.variants[d];
            let offset = variant.len();
            let pushed = variant.push(value);
            debug_assert!(pushed);
            self.push_discriminator(d as u8, offset);
        } else {
            self.push_shared(&value.to_binary());
        }
    }

    /// Appends a value to the column. Returns `false` if the value is beyond the limits of the
    /// format settings, in which case the column is unchanged.
    #[must_use]
    pub fn try_push(&mut self, value: &DataValue) -> bool {
        if !fits_settings(value, &self.settings, 0) {
            return false;
        }
        self.push(value);
        true
    }

    /// Write the binary encoding of the value at row `n`.
    pub fn serialize_binary_at(&self, n: usize, buf: &mut impl BufMut) {
        let offset = self.offsets[n];
        match self.discriminators[n] {
            NULL_DISCRIMINATOR => buf.put_u8(NULL_TAG),
            SHARED_DISCRIMINATOR => buf.put_slice(self.shared.get_raw(offset)),
            d => self.variants[d as usize].get(offset).serialize_binary(buf),
        }
    }

    /// Append a value in its binary encoding, as stored by another column.
    ///
    /// # Panics
    ///
    /// Panics if the value can not be decoded.
    pub fn push_encoded(&mut self, encoded: &[u8]) {
        let mut buf = encoded;
        let value = DataValue::deserialize_stored(&mut buf)
            .unwrap_or_else(|e| panic!("corrupted encoded value: {e}"));
        self.push(&value);
    }

    /// Decode one value from the front of untrusted `buf` and append it.
    pub fn deserialize_binary(&mut self, buf: &mut &[u8]) -> ColumnResult<()> {
        let value = DataValue::deserialize_binary(buf, &self.settings)?;
        self.push(&value);
        Ok(())
    }

    /// Reset the typed variants to the `max_types` kinds with the most values across `sources`.
    ///
    /// Must be called on an empty column.
    pub fn take_dynamic_structure(&mut self, sources: &[&DynamicArray]) -> ColumnResult<()> {
        if !self.is_empty() {
            return Err(ColumnError::logical(
                "take_dynamic_structure should be called only on empty Dynamic column",
            ));
        }
        let mut counts: BTreeMap<DataTypeKind, usize> = BTreeMap::new();
        for source in sources {
            for variant in &source.variants {
                *counts.entry(variant.kind()).or_default() += variant.len();
            }
            for encoded in source.shared.nonnull_iter() {
                if let Some(kind) = peek_binary_kind(encoded) {
                    *counts.entry(kind).or_default() += 1;
                }
            }
        }
        let mut kinds = counts.into_iter().collect::<Vec<_>>();
        kinds.sort_by(|(k1, c1), (k2, c2)| c2.cmp(c1).then(k1.cmp(k2)));
        kinds.truncate(self.max_types);
        trace!(?kinds, "take dynamic structure");
        self.variants = kinds.into_iter().map(|(kind, _)| ArrayImpl::new(kind)).collect();
        self.shared = BlobArray::with_capacity(0);
        Ok(())
    }

    fn variant_for(&mut self, kind: DataTypeKind) -> Option<usize> {
        if let Some(d) = self.variants.iter().position(|v| v.kind() == kind) {
            return Some(d);
        }
        if self.variants.len() < self.max_types {
            self.variants.push(ArrayImpl::new(kind));
            return Some(self.variants.len() - 1);
        }
        None
    }

    fn push_shared(&mut self, encoded: &[u8]) {
        let offset = self.shared.len();
        self.shared.push(Some(encoded));
        self.push_discriminator(SHARED_DISCRIMINATOR, offset);
    }

    fn push_discriminator(&mut self, d: u8, offset: usize) {
        self.discriminators.push(d);
        self.offsets.push(offset);
    }
}

/// Returns `true` if the decoder accepts the value under `settings`.
pub(crate) fn fits_settings(value: &DataValue, settings: &FormatSettings, depth: usize) -> bool {
    match value {
        DataValue::String(v) => v.len() <= settings.max_value_size,
        DataValue::Blob(v) => v.len() <= settings.max_value_size,
        DataValue::List(items) => {
            depth < settings.max_nesting_depth
                && items.len() <= settings.max_value_size
                && items.iter().all(|v| fits_settings(v, settings, depth + 1))
        }
        _ => true,
    }
}

impl Column for DynamicArray {
    fn name(&self) -> String {
        format!("Dynamic(max_types={})", self.max_types)
    }

    fn len(&self) -> usize {
        self.discriminators.len()
    }

    fn clone_empty(&self) -> Self {
        Self {
            max_types: self.max_types,
            discriminators: vec![],
            offsets: vec![],
            variants: self.variants.iter().map(|v| v.new_empty()).collect(),
            shared: BlobArray::with_capacity(0),
            settings: self.settings,
        }
    }

    fn insert_many_defaults(&mut self, n: usize) {
        self.discriminators
            .resize(self.discriminators.len() + n, NULL_DISCRIMINATOR);
        self.offsets.resize(self.offsets.len() + n, 0);
    }

    fn insert_range_from(&mut self, src: &Self, start: usize, length: usize) {
        self.reserve(length);
        // values are routed by the variants of `self`, not of `src`
        for n in start..start + length {
            self.push(&src.get(n));
        }
    }

    fn pop_back(&mut self, n: usize) {
        let new_len = self.len() - n.min(self.len());
        let mut popped = vec![0; self.variants.len()];
        let mut popped_shared = 0;
        for d in &self.discriminators[new_len..] {
            match *d {
                NULL_DISCRIMINATOR => {}
                SHARED_DISCRIMINATOR => popped_shared += 1,
                d => popped[d as usize] += 1,
            }
        }
        for (variant, popped) in self.variants.iter_mut().zip(popped) {
            variant.truncate(variant.len() - popped);
        }
        self.shared.truncate(self.shared.len() - popped_shared);
        self.discriminators.truncate(new_len);
        self.offsets.truncate(new_len);
    }

    fn is_default_at(&self, n: usize) -> bool {
        self.is_null(n)
    }

    fn number_of_default_rows(&self) -> usize {
        self.null_count()
    }

    fn reserve(&mut self, additional: usize) {
        self.discriminators.reserve(additional);
        self.offsets.reserve(additional);
    }

    fn byte_size(&self) -> usize {
        self.discriminators.len()
            + self.offsets.len() * mem::size_of::<usize>()
            + self.variants.iter().map(|v| v.byte_size()).sum::<usize>()
            + self.shared.byte_size()
    }

    fn byte_size_at(&self, n: usize) -> usize {
        let offset = self.offsets[n];
        let value = match self.discriminators[n] {
            NULL_DISCRIMINATOR => 0,
            SHARED_DISCRIMINATOR => self.shared.byte_size_at(offset),
            d => self.variants[d as usize].byte_size_at(offset),
        };
        1 + mem::size_of::<usize>() + value
    }

    fn allocated_bytes(&self) -> usize {
        self.discriminators.capacity()
            + self.offsets.capacity() * mem::size_of::<usize>()
            + self.variants.iter().map(|v| v.allocated_bytes()).sum::<usize>()
            + self.shared.allocated_bytes()
    }

    fn update_hash_with_value<H: Hasher>(&self, n: usize, hasher: &mut H) {
        self.get(n).hash(hasher);
    }

    fn structure_equals(&self, other: &Self) -> bool {
        self.max_types == other.max_types
    }

    fn serialize_value_into_arena(&self, n: usize, arena: &mut Arena) {
        let mut value = vec![];
        self.serialize_binary_at(n, &mut value);
        let buf = arena.buf_mut();
        buf.put_u64_le(value.len() as u64);
        buf.put_slice(&value);
    }

    fn deserialize_and_insert_from_arena(&mut self, pos: &mut &[u8]) -> ColumnResult<()> {
        let mut value = read_sized(pos)?;
        self.deserialize_binary(&mut value)
    }

    fn skip_serialized_in_arena(&self, pos: &mut &[u8]) -> ColumnResult<()> {
        read_sized(pos)?;
        Ok(())
    }
}
