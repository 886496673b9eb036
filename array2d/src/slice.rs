/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Row and column views.
//!
//! A slice is a `(buffer, major_capacity, axis, index)` tuple. It owns
//! no data; element positions are recomputed from the layout on every
//! call to `iter()`, so a slice of a contiguous axis yields a
//! [`MajorIter`](crate::iter::MajorIter) and a slice of the other axis
//! a [`MinorIter`](crate::iter::MinorIter).
//!
//! Slices borrow the array they were taken from, which rules out
//! `reserve`, `reshape` and `resize` while any slice is alive. Use a
//! [`SliceHandle`] to refer to a slice across such calls.

use std::fmt;
use std::iter::FusedIterator;
use std::marker::PhantomData;
use std::ops::Index;
use std::ops::IndexMut;

use crate::iter::Elements;
use crate::iter::ElementsMut;
use crate::layout::Axis;
use crate::layout::Layout;
use crate::layout::Stride;
use crate::layout::sealed;

/// Type-level choice of the axis a slice runs along.
pub trait SliceAxis: sealed::Sealed + Copy + Default + fmt::Debug + 'static {
    const AXIS: Axis;

    /// Stride kind of this axis' slices under layout `L`.
    type Step<L: Layout>: Stride;

    /// Logical `(row, col)` of element `i` of slice `index`.
    fn cell(index: usize, i: usize) -> (usize, usize);

    /// Number of slices along this axis.
    fn count(rows: usize, cols: usize) -> usize;

    /// Number of elements in each slice.
    fn len(rows: usize, cols: usize) -> usize;
}

/// Marker for row slices.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RowAxis;

/// Marker for column slices.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ColAxis;

impl sealed::Sealed for RowAxis {}
impl sealed::Sealed for ColAxis {}

impl SliceAxis for RowAxis {
    const AXIS: Axis = Axis::Row;
    type Step<L: Layout> = L::RowStride;

    #[inline]
    fn cell(index: usize, i: usize) -> (usize, usize) {
        (index, i)
    }

    fn count(rows: usize, _cols: usize) -> usize {
        rows
    }

    fn len(_rows: usize, cols: usize) -> usize {
        cols
    }
}

impl SliceAxis for ColAxis {
    const AXIS: Axis = Axis::Col;
    type Step<L: Layout> = L::ColStride;

    #[inline]
    fn cell(index: usize, i: usize) -> (usize, usize) {
        (i, index)
    }

    fn count(_rows: usize, cols: usize) -> usize {
        cols
    }

    fn len(rows: usize, _cols: usize) -> usize {
        rows
    }
}

/// Position data shared by [`Slice`] and [`SliceMut`].
struct RawSlice<T, L, A> {
    base: *mut T,
    major_capacity: usize,
    index: usize,
    len: usize,
    _marker: PhantomData<(L, A)>,
}

impl<T, L, A> Clone for RawSlice<T, L, A> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T, L, A> Copy for RawSlice<T, L, A> {}

impl<T, L: Layout, A: SliceAxis> RawSlice<T, L, A> {
    fn new(base: *mut T, major_capacity: usize, index: usize, len: usize) -> Self {
        Self {
            base,
            major_capacity,
            index,
            len,
            _marker: PhantomData,
        }
    }

    #[inline]
    fn offset(&self, i: usize) -> usize {
        let (row, col) = A::cell(self.index, i);
        L::offset_of(row, col, self.major_capacity)
    }

    fn stride(&self) -> A::Step<L> {
        Stride::new(self.major_capacity)
    }

    // SAFETY (all accessors): the array guarantees that every logical
    // cell maps into its buffer, and `i < len` keeps us logical.

    unsafe fn elements<'a>(&self) -> Elements<'a, T, A::Step<L>> {
        Elements::from_raw_parts(self.base, self.offset(0), self.len, self.stride())
    }

    unsafe fn elements_mut<'a>(&self) -> ElementsMut<'a, T, A::Step<L>> {
        ElementsMut::from_raw_parts(self.base, self.offset(0), self.len, self.stride())
    }

    unsafe fn get<'a>(&self, i: usize) -> Option<&'a T> {
        if i < self.len {
            Some(&*self.base.add(self.offset(i)))
        } else {
            None
        }
    }

    unsafe fn get_mut<'a>(&self, i: usize) -> Option<&'a mut T> {
        if i < self.len {
            Some(&mut *self.base.add(self.offset(i)))
        } else {
            None
        }
    }
}

/// A shared view of one row or column.
pub struct Slice<'a, T, L, A> {
    raw: RawSlice<T, L, A>,
    _marker: PhantomData<&'a T>,
}

pub type Row<'a, T, L> = Slice<'a, T, L, RowAxis>;
pub type Col<'a, T, L> = Slice<'a, T, L, ColAxis>;

// SAFETY: shared views behave like `&'a T`, exclusive ones like
// `&'a mut T`.
unsafe impl<T: Sync, L, A> Send for Slice<'_, T, L, A> {}
unsafe impl<T: Sync, L, A> Sync for Slice<'_, T, L, A> {}
unsafe impl<T: Send, L, A> Send for SliceMut<'_, T, L, A> {}
unsafe impl<T: Sync, L, A> Sync for SliceMut<'_, T, L, A> {}
unsafe impl<T: Sync, L, A> Send for Slices<'_, T, L, A> {}
unsafe impl<T: Sync, L, A> Sync for Slices<'_, T, L, A> {}
unsafe impl<T: Send, L, A> Send for SliceIterMut<'_, T, L, A> {}
unsafe impl<T: Sync, L, A> Sync for SliceIterMut<'_, T, L, A> {}

impl<T, L, A> Clone for Slice<'_, T, L, A> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T, L, A> Copy for Slice<'_, T, L, A> {}

impl<'a, T, L: Layout, A: SliceAxis> Slice<'a, T, L, A> {
    pub(crate) fn new(data: &'a [T], major_capacity: usize, index: usize, len: usize) -> Self {
        Self {
            raw: RawSlice::new(data.as_ptr() as *mut T, major_capacity, index, len),
            _marker: PhantomData,
        }
    }

    /// The row or column number of this slice.
    pub fn index(&self) -> usize {
        self.raw.index
    }

    pub fn axis(&self) -> Axis {
        A::AXIS
    }

    pub fn len(&self) -> usize {
        self.raw.len
    }

    pub fn is_empty(&self) -> bool {
        self.raw.len == 0
    }

    pub fn iter(&self) -> Elements<'a, T, A::Step<L>> {
        // SAFETY: see `RawSlice`; shared access for 'a.
        unsafe { self.raw.elements() }
    }

    pub fn get(&self, i: usize) -> Option<&'a T> {
        // SAFETY: see `RawSlice`; shared access for 'a.
        unsafe { self.raw.get(i) }
    }

    pub fn first(&self) -> Option<&'a T> {
        self.get(0)
    }

    pub fn last(&self) -> Option<&'a T> {
        self.raw.len.checked_sub(1).and_then(|i| self.get(i))
    }

    pub fn to_vec(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.iter().cloned().collect()
    }
}

impl<'a, T, L: Layout, A: SliceAxis> Index<usize> for Slice<'a, T, L, A> {
    type Output = T;

    fn index(&self, i: usize) -> &T {
        match self.get(i) {
            Some(item) => item,
            None => panic!(
                "index {} out of range for {} {} of length {}",
                i,
                A::AXIS,
                self.raw.index,
                self.raw.len
            ),
        }
    }
}

impl<'a, T, L: Layout, A: SliceAxis> IntoIterator for Slice<'a, T, L, A> {
    type Item = &'a T;
    type IntoIter = Elements<'a, T, A::Step<L>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, T, L: Layout, A: SliceAxis> IntoIterator for &Slice<'a, T, L, A> {
    type Item = &'a T;
    type IntoIter = Elements<'a, T, A::Step<L>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T: PartialEq, L: Layout, A: SliceAxis> PartialEq<[T]> for Slice<'_, T, L, A> {
    fn eq(&self, other: &[T]) -> bool {
        self.len() == other.len() && self.iter().eq(other.iter())
    }
}

impl<T: PartialEq, L: Layout, A: SliceAxis, const N: usize> PartialEq<[T; N]>
    for Slice<'_, T, L, A>
{
    fn eq(&self, other: &[T; N]) -> bool {
        *self == other[..]
    }
}

impl<T: fmt::Debug, L: Layout, A: SliceAxis> fmt::Debug for Slice<'_, T, L, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

/// An exclusive view of one row or column.
pub struct SliceMut<'a, T, L, A> {
    raw: RawSlice<T, L, A>,
    _marker: PhantomData<&'a mut T>,
}

pub type RowMut<'a, T, L> = SliceMut<'a, T, L, RowAxis>;
pub type ColMut<'a, T, L> = SliceMut<'a, T, L, ColAxis>;

impl<'a, T, L: Layout, A: SliceAxis> SliceMut<'a, T, L, A> {
    pub(crate) fn new(data: &'a mut [T], major_capacity: usize, index: usize, len: usize) -> Self {
        Self {
            raw: RawSlice::new(data.as_mut_ptr(), major_capacity, index, len),
            _marker: PhantomData,
        }
    }

    pub fn index(&self) -> usize {
        self.raw.index
    }

    pub fn axis(&self) -> Axis {
        A::AXIS
    }

    pub fn len(&self) -> usize {
        self.raw.len
    }

    pub fn is_empty(&self) -> bool {
        self.raw.len == 0
    }

    pub fn iter(&self) -> Elements<'_, T, A::Step<L>> {
        // SAFETY: shared reborrow of an exclusive view.
        unsafe { self.raw.elements() }
    }

    pub fn iter_mut(&mut self) -> ElementsMut<'_, T, A::Step<L>> {
        // SAFETY: exclusive reborrow.
        unsafe { self.raw.elements_mut() }
    }

    pub fn get(&self, i: usize) -> Option<&T> {
        // SAFETY: shared reborrow of an exclusive view.
        unsafe { self.raw.get(i) }
    }

    pub fn get_mut(&mut self, i: usize) -> Option<&mut T> {
        // SAFETY: exclusive reborrow.
        unsafe { self.raw.get_mut(i) }
    }

    /// Reborrows as a shared view.
    pub fn as_slice(&self) -> Slice<'_, T, L, A> {
        Slice {
            raw: self.raw,
            _marker: PhantomData,
        }
    }

    pub fn fill(&mut self, value: T)
    where
        T: Clone,
    {
        for item in self.iter_mut() {
            *item = value.clone();
        }
    }

    pub fn to_vec(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.iter().cloned().collect()
    }
}

impl<'a, T, L, A> From<SliceMut<'a, T, L, A>> for Slice<'a, T, L, A> {
    fn from(slice: SliceMut<'a, T, L, A>) -> Self {
        Slice {
            raw: slice.raw,
            _marker: PhantomData,
        }
    }
}

impl<T, L: Layout, A: SliceAxis> Index<usize> for SliceMut<'_, T, L, A> {
    type Output = T;

    fn index(&self, i: usize) -> &T {
        let (index, len) = (self.raw.index, self.raw.len);
        match self.get(i) {
            Some(item) => item,
            None => panic!(
                "index {} out of range for {} {} of length {}",
                i,
                A::AXIS,
                index,
                len
            ),
        }
    }
}

impl<T, L: Layout, A: SliceAxis> IndexMut<usize> for SliceMut<'_, T, L, A> {
    fn index_mut(&mut self, i: usize) -> &mut T {
        let (index, len) = (self.raw.index, self.raw.len);
        match self.get_mut(i) {
            Some(item) => item,
            None => panic!(
                "index {} out of range for {} {} of length {}",
                i,
                A::AXIS,
                index,
                len
            ),
        }
    }
}

impl<'a, T, L: Layout, A: SliceAxis> IntoIterator for SliceMut<'a, T, L, A> {
    type Item = &'a mut T;
    type IntoIter = ElementsMut<'a, T, A::Step<L>>;

    fn into_iter(self) -> Self::IntoIter {
        // SAFETY: consumes the exclusive view for its full lifetime.
        unsafe { self.raw.elements_mut() }
    }
}

impl<T: fmt::Debug, L: Layout, A: SliceAxis> fmt::Debug for SliceMut<'_, T, L, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

/// The sequence of all rows or all columns of an array, with extents
/// fixed at the time it was obtained.
pub struct Slices<'a, T, L, A> {
    base: *mut T,
    major_capacity: usize,
    count: usize,
    len: usize,
    _marker: PhantomData<(&'a T, L, A)>,
}

impl<T, L, A> Clone for Slices<'_, T, L, A> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T, L, A> Copy for Slices<'_, T, L, A> {}

impl<'a, T, L: Layout, A: SliceAxis> Slices<'a, T, L, A> {
    pub(crate) fn new(data: &'a [T], major_capacity: usize, rows: usize, cols: usize) -> Self {
        Self {
            base: data.as_ptr() as *mut T,
            major_capacity,
            count: A::count(rows, cols),
            len: A::len(rows, cols),
            _marker: PhantomData,
        }
    }

    /// Number of slices.
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn get(&self, index: usize) -> Option<Slice<'a, T, L, A>> {
        (index < self.count).then(|| self.make(index))
    }

    pub fn iter(&self) -> SliceIter<'a, T, L, A> {
        SliceIter {
            seq: *self,
            front: 0,
            back: self.count,
        }
    }

    fn make(&self, index: usize) -> Slice<'a, T, L, A> {
        Slice {
            raw: RawSlice::new(self.base, self.major_capacity, index, self.len),
            _marker: PhantomData,
        }
    }
}

impl<'a, T, L: Layout, A: SliceAxis> IntoIterator for Slices<'a, T, L, A> {
    type Item = Slice<'a, T, L, A>;
    type IntoIter = SliceIter<'a, T, L, A>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T, L: Layout, A: SliceAxis> fmt::Debug for Slices<'_, T, L, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slices")
            .field("axis", &A::AXIS)
            .field("count", &self.count)
            .field("len", &self.len)
            .finish()
    }
}

/// Iterator over slice indices `0..count`, yielding a fresh [`Slice`]
/// for each.
pub struct SliceIter<'a, T, L, A> {
    seq: Slices<'a, T, L, A>,
    front: usize,
    back: usize,
}

impl<T, L, A> Clone for SliceIter<'_, T, L, A> {
    fn clone(&self) -> Self {
        Self {
            seq: self.seq,
            front: self.front,
            back: self.back,
        }
    }
}

impl<'a, T, L: Layout, A: SliceAxis> Iterator for SliceIter<'a, T, L, A> {
    type Item = Slice<'a, T, L, A>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.front >= self.back {
            return None;
        }
        let slice = self.seq.make(self.front);
        self.front += 1;
        Some(slice)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = self.back - self.front;
        (len, Some(len))
    }

    fn nth(&mut self, n: usize) -> Option<Self::Item> {
        self.front = self.front.saturating_add(n).min(self.back);
        self.next()
    }
}

impl<T, L: Layout, A: SliceAxis> DoubleEndedIterator for SliceIter<'_, T, L, A> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.front >= self.back {
            return None;
        }
        self.back -= 1;
        Some(self.seq.make(self.back))
    }
}

impl<T, L: Layout, A: SliceAxis> ExactSizeIterator for SliceIter<'_, T, L, A> {}

impl<T, L: Layout, A: SliceAxis> FusedIterator for SliceIter<'_, T, L, A> {}

/// Iterator yielding disjoint exclusive views of every row or column.
pub struct SliceIterMut<'a, T, L, A> {
    base: *mut T,
    major_capacity: usize,
    len: usize,
    front: usize,
    back: usize,
    _marker: PhantomData<(&'a mut T, L, A)>,
}

impl<'a, T, L: Layout, A: SliceAxis> SliceIterMut<'a, T, L, A> {
    pub(crate) fn new(data: &'a mut [T], major_capacity: usize, rows: usize, cols: usize) -> Self {
        Self {
            base: data.as_mut_ptr(),
            major_capacity,
            len: A::len(rows, cols),
            front: 0,
            back: A::count(rows, cols),
            _marker: PhantomData,
        }
    }

    fn make(&self, index: usize) -> SliceMut<'a, T, L, A> {
        // Distinct indices along one axis address disjoint cells.
        SliceMut {
            raw: RawSlice::new(self.base, self.major_capacity, index, self.len),
            _marker: PhantomData,
        }
    }
}

impl<'a, T, L: Layout, A: SliceAxis> Iterator for SliceIterMut<'a, T, L, A> {
    type Item = SliceMut<'a, T, L, A>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.front >= self.back {
            return None;
        }
        let slice = self.make(self.front);
        self.front += 1;
        Some(slice)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = self.back - self.front;
        (len, Some(len))
    }
}

impl<T, L: Layout, A: SliceAxis> DoubleEndedIterator for SliceIterMut<'_, T, L, A> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.front >= self.back {
            return None;
        }
        self.back -= 1;
        Some(self.make(self.back))
    }
}

impl<T, L: Layout, A: SliceAxis> ExactSizeIterator for SliceIterMut<'_, T, L, A> {}

impl<T, L: Layout, A: SliceAxis> FusedIterator for SliceIterMut<'_, T, L, A> {}

/// A detached reference to a row or column.
///
/// Handles do not borrow the array. Resolving one with
/// [`Array::slice`](crate::Array::slice) fails with
/// [`ArrayError::ForeignHandle`](crate::ArrayError::ForeignHandle) if it
/// was issued by a different array (including a clone, or a value that
/// has since been assigned over the original), and with
/// [`ArrayError::StaleHandle`](crate::ArrayError::StaleHandle) if the
/// array's shape or storage changed after the handle was issued.
pub struct SliceHandle<A> {
    index: usize,
    owner: u64,
    generation: u64,
    _marker: PhantomData<A>,
}

impl<A: SliceAxis> SliceHandle<A> {
    pub(crate) fn new(index: usize, owner: u64, generation: u64) -> Self {
        Self {
            index,
            owner,
            generation,
            _marker: PhantomData,
        }
    }

    /// Identity of the array that issued this handle.
    pub fn owner(&self) -> u64 {
        self.owner
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn axis(&self) -> Axis {
        A::AXIS
    }

    /// The array generation this handle was issued at.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl<A> Clone for SliceHandle<A> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<A> Copy for SliceHandle<A> {}

impl<A> PartialEq for SliceHandle<A> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
            && self.owner == other.owner
            && self.generation == other.generation
    }
}

impl<A> Eq for SliceHandle<A> {}

impl<A: SliceAxis> fmt::Debug for SliceHandle<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SliceHandle")
            .field("axis", &A::AXIS)
            .field("index", &self.index)
            .field("owner", &self.owner)
            .field("generation", &self.generation)
            .finish()
    }
}
