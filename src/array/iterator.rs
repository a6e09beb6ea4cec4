// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

use std::iter::{ExactSizeIterator, FusedIterator, Iterator};

use super::Array;

/// An iterator over the elements of an [`Array`].
#[derive(Clone)]
pub struct ArrayIter<'a, A: Array> {
    data: &'a A,
    pos: usize,
    end: usize,
}

impl<'a, A: Array> ArrayIter<'a, A> {
    pub fn new(data: &'a A) -> Self {
        Self {
            data,
            pos: 0,
            end: data.len(),
        }
    }
}

impl<'a, A: Array> Iterator for ArrayIter<'a, A> {
    type Item = Option<&'a A::Item>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.end {
            None
        } else {
            let item = self.data.get(self.pos);
            self.pos += 1;
            Some(item)
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let exact = self.end - self.pos;
        (exact, Some(exact))
    }
}

impl<A: Array> DoubleEndedIterator for ArrayIter<'_, A> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.pos >= self.end {
            None
        } else {
            self.end -= 1;
            Some(self.data.get(self.end))
        }
    }
}

impl<A: Array> ExactSizeIterator for ArrayIter<'_, A> {}

impl<A: Array> FusedIterator for ArrayIter<'_, A> {}

/// An iterator over the non-null elements of an [`Array`].
pub struct NonNullArrayIter<'a, A: Array> {
    inner: ArrayIter<'a, A>,
}

impl<'a, A: Array> NonNullArrayIter<'a, A> {
    pub fn new(data: &'a A) -> Self {
        Self {
            inner: ArrayIter::new(data),
        }
    }
}

impl<'a, A: Array> Iterator for NonNullArrayIter<'a, A> {
    type Item = &'a A::Item;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.by_ref().flatten().next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, self.inner.size_hint().1)
    }
}
