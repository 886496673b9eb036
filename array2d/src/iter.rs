/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Strided element iterators.
//!
//! Both iterators are built on a [`Cursor`]: a `(base, offset,
//! stride)` triple supporting the random-access operations
//!
//! ```text
//! advance(n):        offset += n × stride
//! distance(a, b):    (b.offset − a.offset) / stride
//! a == b, a < b:     compare offsets
//! deref:             *base.add(offset)
//! ```
//!
//! A slice of length `n` starting at offset `s` is the half-open cursor
//! range `[s, s + n × stride)`. The end cursor is never dereferenced,
//! so it may point past the buffer.
//!
//! Offsets, not addresses, are compared so that zero-sized element
//! types iterate the right number of times.

use std::cmp::Ordering;
use std::fmt;
use std::iter::FusedIterator;
use std::marker::PhantomData;

use crate::layout::Stride;
use crate::layout::Strided;
use crate::layout::Unit;

/// A random-access position in an array buffer.
pub(crate) struct Cursor<T, S> {
    base: *mut T,
    offset: usize,
    stride: S,
}

impl<T, S: Copy> Clone for Cursor<T, S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T, S: Copy> Copy for Cursor<T, S> {}

impl<T, S: Stride> Cursor<T, S> {
    pub(crate) fn new(base: *mut T, offset: usize, stride: S) -> Self {
        Self {
            base,
            offset,
            stride,
        }
    }

    pub(crate) fn offset(&self) -> usize {
        self.offset
    }

    /// Moves the cursor by `n` elements of the slice (not of the
    /// buffer).
    pub(crate) fn advance(&mut self, n: isize) {
        let step = self.stride.get() as isize;
        self.offset = self.offset.wrapping_add_signed(n * step);
    }

    /// Number of slice elements from `self` to `other`.
    pub(crate) fn distance_to(&self, other: &Self) -> isize {
        debug_assert_eq!(self.base, other.base);
        let step = self.stride.get().max(1) as isize;
        (other.offset as isize - self.offset as isize) / step
    }

    /// # Safety
    ///
    /// The cursor must point at an initialized element of a buffer that
    /// stays valid and unaliased by writers for `'a`.
    pub(crate) unsafe fn get<'a>(&self) -> &'a T {
        &*self.base.add(self.offset)
    }

    /// # Safety
    ///
    /// As [`Cursor::get`], and no other reference to the element may
    /// exist for `'a`.
    pub(crate) unsafe fn get_mut<'a>(&self) -> &'a mut T {
        &mut *self.base.add(self.offset)
    }
}

impl<T, S> PartialEq for Cursor<T, S> {
    fn eq(&self, other: &Self) -> bool {
        self.base == other.base && self.offset == other.offset
    }
}

impl<T, S> Eq for Cursor<T, S> {}

impl<T, S> PartialOrd for Cursor<T, S> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T, S> Ord for Cursor<T, S> {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.base, self.offset).cmp(&(other.base, other.offset))
    }
}

impl<T, S: fmt::Debug> fmt::Debug for Cursor<T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor")
            .field("offset", &self.offset)
            .field("stride", &self.stride)
            .finish()
    }
}

/// Shared iterator over the elements of one row or column.
pub struct Elements<'a, T, S> {
    front: Cursor<T, S>,
    back: Cursor<T, S>,
    _marker: PhantomData<&'a T>,
}

/// Iterator along a contiguous run.
pub type MajorIter<'a, T> = Elements<'a, T, Unit>;

/// Iterator across contiguous runs.
pub type MinorIter<'a, T> = Elements<'a, T, Strided>;

impl<'a, T, S: Stride> Elements<'a, T, S> {
    /// # Safety
    ///
    /// `start + i × stride` must be an in-bounds, initialized element of
    /// the buffer at `base` for every `i < len`, and the buffer must be
    /// readable and not written through any other path for `'a`.
    pub(crate) unsafe fn from_raw_parts(base: *mut T, start: usize, len: usize, stride: S) -> Self {
        let front = Cursor::new(base, start, stride);
        let mut back = front;
        back.advance(len as isize);
        Self {
            front,
            back,
            _marker: PhantomData,
        }
    }

    /// Buffer offset of the next element, or of the end position once
    /// exhausted.
    pub fn offset(&self) -> usize {
        self.front.offset()
    }
}

// SAFETY: `Elements` behaves like `&'a T`.
unsafe impl<T: Sync, S: Send> Send for Elements<'_, T, S> {}
unsafe impl<T: Sync, S: Sync> Sync for Elements<'_, T, S> {}

impl<T, S: Copy> Clone for Elements<'_, T, S> {
    fn clone(&self) -> Self {
        Self {
            front: self.front,
            back: self.back,
            _marker: PhantomData,
        }
    }
}

impl<'a, T, S: Stride> Iterator for Elements<'a, T, S> {
    type Item = &'a T;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        if self.front >= self.back {
            return None;
        }
        // SAFETY: front < back, so front is within the slice.
        let item = unsafe { self.front.get() };
        self.front.advance(1);
        Some(item)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = self.front.distance_to(&self.back).max(0) as usize;
        (len, Some(len))
    }

    fn nth(&mut self, n: usize) -> Option<Self::Item> {
        if n >= self.len() {
            self.front = self.back;
            return None;
        }
        self.front.advance(n as isize);
        self.next()
    }

    fn count(self) -> usize {
        self.len()
    }

    fn last(mut self) -> Option<Self::Item> {
        self.next_back()
    }
}

impl<T, S: Stride> DoubleEndedIterator for Elements<'_, T, S> {
    #[inline]
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.front >= self.back {
            return None;
        }
        self.back.advance(-1);
        // SAFETY: back now addresses the last element not yet yielded.
        Some(unsafe { self.back.get() })
    }

    fn nth_back(&mut self, n: usize) -> Option<Self::Item> {
        if n >= self.len() {
            self.back = self.front;
            return None;
        }
        self.back.advance(-(n as isize));
        self.next_back()
    }
}

impl<T, S: Stride> ExactSizeIterator for Elements<'_, T, S> {}

impl<T, S: Stride> FusedIterator for Elements<'_, T, S> {}

impl<T: fmt::Debug, S: Stride> fmt::Debug for Elements<'_, T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.clone()).finish()
    }
}

/// Exclusive iterator over the elements of one row or column.
pub struct ElementsMut<'a, T, S> {
    front: Cursor<T, S>,
    back: Cursor<T, S>,
    _marker: PhantomData<&'a mut T>,
}

pub type MajorIterMut<'a, T> = ElementsMut<'a, T, Unit>;

pub type MinorIterMut<'a, T> = ElementsMut<'a, T, Strided>;

impl<'a, T, S: Stride> ElementsMut<'a, T, S> {
    /// # Safety
    ///
    /// As [`Elements::from_raw_parts`], and no other reference to any of
    /// the addressed elements may exist for `'a`.
    pub(crate) unsafe fn from_raw_parts(base: *mut T, start: usize, len: usize, stride: S) -> Self {
        let front = Cursor::new(base, start, stride);
        let mut back = front;
        back.advance(len as isize);
        Self {
            front,
            back,
            _marker: PhantomData,
        }
    }

    pub fn offset(&self) -> usize {
        self.front.offset()
    }
}

// SAFETY: `ElementsMut` behaves like `&'a mut T`.
unsafe impl<T: Send, S: Send> Send for ElementsMut<'_, T, S> {}
unsafe impl<T: Sync, S: Sync> Sync for ElementsMut<'_, T, S> {}

impl<'a, T, S: Stride> From<ElementsMut<'a, T, S>> for Elements<'a, T, S> {
    fn from(iter: ElementsMut<'a, T, S>) -> Self {
        Self {
            front: iter.front,
            back: iter.back,
            _marker: PhantomData,
        }
    }
}

impl<'a, T, S: Stride> Iterator for ElementsMut<'a, T, S> {
    type Item = &'a mut T;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        if self.front >= self.back {
            return None;
        }
        // SAFETY: each position is yielded at most once.
        let item = unsafe { self.front.get_mut() };
        self.front.advance(1);
        Some(item)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = self.front.distance_to(&self.back).max(0) as usize;
        (len, Some(len))
    }

    fn nth(&mut self, n: usize) -> Option<Self::Item> {
        if n >= self.len() {
            self.front = self.back;
            return None;
        }
        self.front.advance(n as isize);
        self.next()
    }

    fn count(self) -> usize {
        self.len()
    }
}

impl<T, S: Stride> DoubleEndedIterator for ElementsMut<'_, T, S> {
    #[inline]
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.front >= self.back {
            return None;
        }
        self.back.advance(-1);
        // SAFETY: each position is yielded at most once.
        Some(unsafe { self.back.get_mut() })
    }

    fn nth_back(&mut self, n: usize) -> Option<Self::Item> {
        if n >= self.len() {
            self.back = self.front;
            return None;
        }
        self.back.advance(-(n as isize));
        self.next_back()
    }
}

impl<T, S: Stride> ExactSizeIterator for ElementsMut<'_, T, S> {}

impl<T, S: Stride> FusedIterator for ElementsMut<'_, T, S> {}

impl<T, S: Stride> fmt::Debug for ElementsMut<'_, T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementsMut")
            .field("front", &self.front)
            .field("back", &self.back)
            .finish()
    }
}
