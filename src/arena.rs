// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

//! An append-only buffer used to serialize single rows of columns, e.g. as keys of an
//! aggregation hash table.
//!
//! Columns append to the pending region of the arena. Values of several columns may be written
//! one after another and [`Arena::finish_region`] returns all of them as one contiguous region.
//! Returned regions are frozen: they are never moved or modified, no matter how much is written
//! to the arena afterwards.
//!
//! All integers are encoded in little-endian.

use bytes::{Buf, Bytes, BytesMut};

use crate::error::{ColumnError, ColumnResult};

#[derive(Debug, Default)]
pub struct Arena {
    buf: BytesMut,
    allocated: usize,
    regions: usize,
}

impl Arena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
            ..Default::default()
        }
    }

    /// The buffer to continue the pending region with.
    pub fn buf_mut(&mut self) -> &mut BytesMut {
        &mut self.buf
    }

    /// Bytes written since the last finished region.
    pub fn pending(&self) -> &[u8] {
        &self.buf
    }

    /// Freeze the pending region and return it.
    pub fn finish_region(&mut self) -> Bytes {
        self.allocated += self.buf.len();
        self.regions += 1;
        self.buf.split().freeze()
    }

    /// Total bytes handed out in finished regions.
    pub fn allocated_bytes(&self) -> usize {
        self.allocated
    }

    pub fn num_regions(&self) -> usize {
        self.regions
    }
}

/// Read a length prefix from an arena cursor.
pub(crate) fn read_len(pos: &mut &[u8]) -> ColumnResult<usize> {
    if pos.remaining() < 8 {
        return Err(ColumnError::logical(
            "unexpected end of arena while reading length",
        ));
    }
    usize::try_from(pos.get_u64_le())
        .map_err(|_| ColumnError::logical("length in arena does not fit in memory"))
}

/// Read `len` bytes from an arena cursor.
pub(crate) fn read_bytes<'a>(pos: &mut &'a [u8], len: usize) -> ColumnResult<&'a [u8]> {
    if pos.len() < len {
        return Err(ColumnError::logical(format!(
            "unexpected end of arena: need {} bytes, {} left",
            len,
            pos.len()
        )));
    }
    let (bytes, rest) = pos.split_at(len);
    *pos = rest;
    Ok(bytes)
}

/// Read a length-prefixed byte string from an arena cursor.
pub(crate) fn read_sized<'a>(pos: &mut &'a [u8]) -> ColumnResult<&'a [u8]> {
    let len = read_len(pos)?;
    read_bytes(pos, len)
}

/// Read a length-prefixed UTF-8 string from an arena cursor.
pub(crate) fn read_str<'a>(pos: &mut &'a [u8]) -> ColumnResult<&'a str> {
    let bytes = read_sized(pos)?;
    std::str::from_utf8(bytes).map_err(|_| ColumnError::logical("path in arena is not UTF-8"))
}

pub(crate) fn read_u8(pos: &mut &[u8]) -> ColumnResult<u8> {
    if !pos.has_remaining() {
        return Err(ColumnError::logical("unexpected end of arena"));
    }
    Ok(pos.get_u8())
}

#[cfg(test)]
mod tests {
    use bytes::BufMut;

    use super::*;

    #[test]
    fn regions_are_stable() {
        let mut arena = Arena::with_capacity(4);
        arena.buf_mut().put_u64_le(42);
        let first = arena.finish_region();
        for i in 0..1000u64 {
            arena.buf_mut().put_u64_le(i);
        }
        let second = arena.finish_region();
        assert_eq!(&first[..], &42u64.to_le_bytes());
        assert_eq!(second.len(), 8000);
        assert_eq!(arena.allocated_bytes(), 8008);
        assert_eq!(arena.num_regions(), 2);
    }

    #[test]
    fn truncated_cursor() {
        let data = [1u8, 0, 0];
        let mut pos = &data[..];
        assert!(read_len(&mut pos).is_err());

        let mut buf = vec![];
        buf.put_u64_le(10);
        buf.put_slice(b"abc");
        let mut pos = &buf[..];
        assert!(read_sized(&mut pos).is_err());
    }
}
