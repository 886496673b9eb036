/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

use std::cmp::Ordering;
use std::collections::TryReserveError;
use std::fmt;
use std::marker::PhantomData;
use std::ops::Index;
use std::ops::IndexMut;
use std::sync::atomic;
use std::sync::atomic::AtomicU64;

use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;
use serde::de;
use serde::ser::SerializeStruct;

use crate::config::Config;
use crate::config::GrowthPolicy;
use crate::layout::Axis;
use crate::layout::Layout;
use crate::layout::LayoutKind;
use crate::layout::RowMajor;
use crate::slice::ColAxis;
use crate::slice::RowAxis;
use crate::slice::Slice;
use crate::slice::SliceAxis;
use crate::slice::SliceHandle;
use crate::slice::SliceIterMut;
use crate::slice::SliceMut;
use crate::slice::Slices;
use crate::storage::Storage;

/// The type of error for array operations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ArrayError {
    #[error("index ({row}, {col}) out of range for {rows}x{cols} array")]
    IndexOutOfRange {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("{axis} {index} out of range {count}")]
    SliceOutOfRange {
        axis: Axis,
        index: usize,
        count: usize,
    },

    #[error("capacity {rows}x{cols} overflows usize")]
    CapacityOverflow { rows: usize, cols: usize },

    #[error("failed to allocate storage for {requested} elements")]
    Allocation {
        requested: usize,
        #[source]
        source: Option<TryReserveError>,
    },

    #[error("shape mismatch: expected {expected} elements, got {got}")]
    ShapeMismatch { expected: usize, got: usize },

    #[error("nonrectangular rows: row {row} has {got} elements, expected {expected}")]
    NonRectangular {
        row: usize,
        expected: usize,
        got: usize,
    },

    #[error("foreign slice handle: issued by array {owner}, resolved against array {array}")]
    ForeignHandle { owner: u64, array: u64 },

    #[error("stale slice handle: issued at generation {issued}, array is at generation {current}")]
    StaleHandle { issued: u64, current: u64 },
}

/// A growable, dense two-dimensional array.
///
/// Elements live in a flat buffer `S` addressed through layout `L`
/// (see [`crate::layout`]). Each axis has a logical extent and an
/// allocated capacity; growing within capacity never reallocates:
///
/// ```
/// use array2d::Array;
///
/// let mut a: Array<i32> = Array::with_shape(2, 2).unwrap();
/// a.reserve(4, 4).unwrap();
/// let ptr = a.as_ptr();
/// a.reshape(3, 4).unwrap();
/// assert_eq!(a.as_ptr(), ptr);
/// assert_eq!(a.shape(), (3, 4));
/// ```
///
/// Every buffer cell outside the logical region holds `T::default()`,
/// so cells exposed by growing read as the default value.
pub struct Array<T, L = RowMajor, S = Vec<T>> {
    data: S,
    id: u64,
    rows: usize,
    cols: usize,
    row_capacity: usize,
    col_capacity: usize,
    generation: u64,
    growth: GrowthPolicy,
    layout: L,
    _marker: PhantomData<T>,
}

static NEXT_ID: AtomicU64 = AtomicU64::new(0);

fn next_id() -> u64 {
    NEXT_ID.fetch_add(1, atomic::Ordering::Relaxed)
}

impl<T: Clone, L: Clone, S: Clone> Clone for Array<T, L, S> {
    /// The clone is a distinct array: handles issued by `self` do not
    /// resolve against it.
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            id: next_id(),
            rows: self.rows,
            cols: self.cols,
            row_capacity: self.row_capacity,
            col_capacity: self.col_capacity,
            generation: self.generation,
            growth: self.growth,
            layout: self.layout.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T, L: Layout, S: Storage<T>> Default for Array<T, L, S> {
    fn default() -> Self {
        Self::new()
    }
}

fn area(rows: usize, cols: usize) -> Result<usize, ArrayError> {
    rows.checked_mul(cols)
        .ok_or(ArrayError::CapacityOverflow { rows, cols })
}

/// Moves the live `major × minor` block of `data` from run stride
/// `from` to run stride `to`.
///
/// Elements are exchanged rather than copied, so the cells they leave
/// behind receive whatever the destination held. When the stride grows
/// every destination lies at or after its source, so we walk from the
/// highest offset down; when it shrinks, from the lowest up. Either way
/// no source is overwritten before it has been moved.
fn restride<T>(data: &mut [T], major: usize, minor: usize, from: usize, to: usize) {
    let mut shift = |k: usize, j: usize| {
        let (src, dst) = (k * from + j, k * to + j);
        if src != dst {
            data.swap(src, dst);
        }
    };
    match to.cmp(&from) {
        Ordering::Equal => {}
        Ordering::Greater => {
            for k in (0..minor).rev() {
                for j in (0..major).rev() {
                    shift(k, j);
                }
            }
        }
        Ordering::Less => {
            for k in 0..minor {
                for j in 0..major {
                    shift(k, j);
                }
            }
        }
    }
}

/// Resets the cells of the `major × minor` block at run stride
/// `stride` that fall outside `keep_major × keep_minor`.
fn clear_outside<T: Default>(
    data: &mut [T],
    major: usize,
    minor: usize,
    keep_major: usize,
    keep_minor: usize,
    stride: usize,
) {
    for k in 0..minor {
        let run = k * stride;
        let first = if k < keep_minor { keep_major.min(major) } else { 0 };
        data[run + first..run + major].fill_with(T::default);
    }
}

impl<T, L: Layout, S: Storage<T>> Array<T, L, S> {
    /// An empty array with no capacity.
    pub fn new() -> Self {
        Self {
            data: S::default(),
            id: next_id(),
            rows: 0,
            cols: 0,
            row_capacity: 0,
            col_capacity: 0,
            generation: 0,
            growth: GrowthPolicy::default(),
            layout: L::default(),
            _marker: PhantomData,
        }
    }

    /// Sets the policy used when an operation must grow capacity.
    pub fn with_growth(mut self, growth: GrowthPolicy) -> Self {
        self.growth = growth;
        self
    }

    pub fn with_config(self, config: &Config) -> Self {
        self.with_growth(config.growth)
    }

    pub fn num_rows(&self) -> usize {
        self.rows
    }

    pub fn num_cols(&self) -> usize {
        self.cols
    }

    /// `(rows, cols)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn row_capacity(&self) -> usize {
        self.row_capacity
    }

    pub fn col_capacity(&self) -> usize {
        self.col_capacity
    }

    /// `(row_capacity, col_capacity)`.
    pub fn capacity(&self) -> (usize, usize) {
        (self.row_capacity, self.col_capacity)
    }

    /// Number of logical elements.
    pub fn len(&self) -> usize {
        self.rows * self.cols
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn layout(&self) -> LayoutKind {
        L::KIND
    }

    pub fn growth_policy(&self) -> GrowthPolicy {
        self.growth
    }

    /// Counter bumped by every operation that changes shape, capacity,
    /// or buffer placement.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn major_capacity(&self) -> usize {
        L::to_major_minor(self.row_capacity, self.col_capacity).0
    }

    #[inline]
    fn offset_of(&self, row: usize, col: usize) -> usize {
        L::offset_of(row, col, self.major_capacity())
    }

    pub fn get(&self, row: usize, col: usize) -> Option<&T> {
        if row < self.rows && col < self.cols {
            Some(&self.data.as_slice()[self.offset_of(row, col)])
        } else {
            None
        }
    }

    pub fn get_mut(&mut self, row: usize, col: usize) -> Option<&mut T> {
        if row < self.rows && col < self.cols {
            let offset = self.offset_of(row, col);
            Some(&mut self.data.as_mut_slice()[offset])
        } else {
            None
        }
    }

    /// Checked access.
    pub fn at(&self, row: usize, col: usize) -> Result<&T, ArrayError> {
        let (rows, cols) = self.shape();
        self.get(row, col)
            .ok_or(ArrayError::IndexOutOfRange {
                row,
                col,
                rows,
                cols,
            })
    }

    /// Checked mutable access.
    pub fn at_mut(&mut self, row: usize, col: usize) -> Result<&mut T, ArrayError> {
        let (rows, cols) = self.shape();
        self.get_mut(row, col)
            .ok_or(ArrayError::IndexOutOfRange {
                row,
                col,
                rows,
                cols,
            })
    }

    /// # Safety
    ///
    /// `row < num_rows()` and `col < num_cols()`.
    pub unsafe fn get_unchecked(&self, row: usize, col: usize) -> &T {
        let offset = self.offset_of(row, col);
        self.data.as_slice().get_unchecked(offset)
    }

    /// # Safety
    ///
    /// `row < num_rows()` and `col < num_cols()`.
    pub unsafe fn get_unchecked_mut(&mut self, row: usize, col: usize) -> &mut T {
        let offset = self.offset_of(row, col);
        self.data.as_mut_slice().get_unchecked_mut(offset)
    }

    /// Start of the buffer. Valid until the next `reserve`, `reshape`,
    /// `resize` or move.
    pub fn as_ptr(&self) -> *const T {
        self.data.as_ptr()
    }

    pub fn as_mut_ptr(&mut self) -> *mut T {
        self.data.as_mut_slice().as_mut_ptr()
    }

    /// The whole buffer, padding included.
    pub fn storage(&self) -> &[T] {
        self.data.as_slice()
    }

    fn slice_at<A: SliceAxis>(&self, index: usize) -> Option<Slice<'_, T, L, A>> {
        if index >= A::count(self.rows, self.cols) {
            return None;
        }
        Some(Slice::new(
            self.data.as_slice(),
            self.major_capacity(),
            index,
            A::len(self.rows, self.cols),
        ))
    }

    fn slice_mut_at<A: SliceAxis>(&mut self, index: usize) -> Option<SliceMut<'_, T, L, A>> {
        if index >= A::count(self.rows, self.cols) {
            return None;
        }
        let (major_capacity, len) = (self.major_capacity(), A::len(self.rows, self.cols));
        Some(SliceMut::new(
            self.data.as_mut_slice(),
            major_capacity,
            index,
            len,
        ))
    }

    fn expect_slice<V>(view: Option<V>, axis: Axis, index: usize, count: usize) -> V {
        match view {
            Some(view) => view,
            None => panic!("{} {} out of range {}", axis, index, count),
        }
    }

    /// A view of row `row`.
    ///
    /// # Panics
    ///
    /// If `row >= num_rows()`.
    pub fn row(&self, row: usize) -> Slice<'_, T, L, RowAxis> {
        Self::expect_slice(self.slice_at(row), Axis::Row, row, self.rows)
    }

    /// A view of column `col`.
    ///
    /// # Panics
    ///
    /// If `col >= num_cols()`.
    pub fn col(&self, col: usize) -> Slice<'_, T, L, ColAxis> {
        Self::expect_slice(self.slice_at(col), Axis::Col, col, self.cols)
    }

    pub fn row_mut(&mut self, row: usize) -> SliceMut<'_, T, L, RowAxis> {
        let rows = self.rows;
        Self::expect_slice(self.slice_mut_at(row), Axis::Row, row, rows)
    }

    pub fn col_mut(&mut self, col: usize) -> SliceMut<'_, T, L, ColAxis> {
        let cols = self.cols;
        Self::expect_slice(self.slice_mut_at(col), Axis::Col, col, cols)
    }

    /// All rows, in order.
    pub fn rows(&self) -> Slices<'_, T, L, RowAxis> {
        Slices::new(self.data.as_slice(), self.major_capacity(), self.rows, self.cols)
    }

    /// All columns, in order.
    pub fn cols(&self) -> Slices<'_, T, L, ColAxis> {
        Slices::new(self.data.as_slice(), self.major_capacity(), self.rows, self.cols)
    }

    pub fn rows_mut(&mut self) -> SliceIterMut<'_, T, L, RowAxis> {
        let (major_capacity, rows, cols) = (self.major_capacity(), self.rows, self.cols);
        SliceIterMut::new(self.data.as_mut_slice(), major_capacity, rows, cols)
    }

    pub fn cols_mut(&mut self) -> SliceIterMut<'_, T, L, ColAxis> {
        let (major_capacity, rows, cols) = (self.major_capacity(), self.rows, self.cols);
        SliceIterMut::new(self.data.as_mut_slice(), major_capacity, rows, cols)
    }

    /// The logical part of contiguous run `k`: row `k` of a row-major
    /// array, column `k` of a column-major one.
    ///
    /// # Panics
    ///
    /// If `k` is not a valid row (row-major) or column (column-major).
    pub fn minor_slice(&self, k: usize) -> &[T] {
        let (major, minor) = L::to_major_minor(self.rows, self.cols);
        assert!(k < minor, "minor index {} out of range {}", k, minor);
        let start = k * self.major_capacity();
        &self.data.as_slice()[start..start + major]
    }

    pub fn minor_slice_mut(&mut self, k: usize) -> &mut [T] {
        let (major, minor) = L::to_major_minor(self.rows, self.cols);
        assert!(k < minor, "minor index {} out of range {}", k, minor);
        let start = k * self.major_capacity();
        &mut self.data.as_mut_slice()[start..start + major]
    }

    fn handle<A: SliceAxis>(&self, index: usize) -> Result<SliceHandle<A>, ArrayError> {
        let count = A::count(self.rows, self.cols);
        if index >= count {
            return Err(ArrayError::SliceOutOfRange {
                axis: A::AXIS,
                index,
                count,
            });
        }
        Ok(SliceHandle::new(index, self.id, self.generation))
    }

    pub fn row_handle(&self, row: usize) -> Result<SliceHandle<RowAxis>, ArrayError> {
        self.handle(row)
    }

    pub fn col_handle(&self, col: usize) -> Result<SliceHandle<ColAxis>, ArrayError> {
        self.handle(col)
    }

    fn check_handle<A: SliceAxis>(&self, handle: &SliceHandle<A>) -> Result<(), ArrayError> {
        if handle.owner() != self.id {
            return Err(ArrayError::ForeignHandle {
                owner: handle.owner(),
                array: self.id,
            });
        }
        if handle.generation() != self.generation {
            return Err(ArrayError::StaleHandle {
                issued: handle.generation(),
                current: self.generation,
            });
        }
        Ok(())
    }

    /// Resolves a handle issued by this array.
    pub fn slice<A: SliceAxis>(
        &self,
        handle: SliceHandle<A>,
    ) -> Result<Slice<'_, T, L, A>, ArrayError> {
        self.check_handle(&handle)?;
        let count = A::count(self.rows, self.cols);
        self.slice_at(handle.index())
            .ok_or(ArrayError::SliceOutOfRange {
                axis: A::AXIS,
                index: handle.index(),
                count,
            })
    }

    pub fn slice_mut<A: SliceAxis>(
        &mut self,
        handle: SliceHandle<A>,
    ) -> Result<SliceMut<'_, T, L, A>, ArrayError> {
        self.check_handle(&handle)?;
        let count = A::count(self.rows, self.cols);
        self.slice_mut_at(handle.index())
            .ok_or(ArrayError::SliceOutOfRange {
                axis: A::AXIS,
                index: handle.index(),
                count,
            })
    }
}

impl<T: Default, L: Layout, S: Storage<T>> Array<T, L, S> {
    /// A `rows × cols` array of default values with exactly that
    /// capacity.
    pub fn with_shape(rows: usize, cols: usize) -> Result<Self, ArrayError> {
        Self::with_capacity(rows, cols, rows, cols)
    }

    /// A `rows × cols` array of default values with at least the given
    /// capacity on each axis.
    pub fn with_capacity(
        rows: usize,
        cols: usize,
        row_capacity: usize,
        col_capacity: usize,
    ) -> Result<Self, ArrayError> {
        let row_capacity = row_capacity.max(rows);
        let col_capacity = col_capacity.max(cols);
        let data = S::try_with_len(area(row_capacity, col_capacity)?)?;
        Ok(Self {
            data,
            rows,
            cols,
            row_capacity,
            col_capacity,
            ..Self::new()
        })
    }

    /// Builds an array by calling `f(row, col)` for every cell, in
    /// storage order.
    pub fn from_fn<F>(rows: usize, cols: usize, mut f: F) -> Result<Self, ArrayError>
    where
        F: FnMut(usize, usize) -> T,
    {
        let mut array = Self::with_shape(rows, cols)?;
        let (major, minor) = L::to_major_minor(rows, cols);
        let data = array.data.as_mut_slice();
        for k in 0..minor {
            for j in 0..major {
                let (row, col) = L::from_major_minor(j, k);
                data[k * major + j] = f(row, col);
            }
        }
        Ok(array)
    }

    /// Builds an array from `rows × cols` elements listed row by row.
    pub fn from_row_major(rows: usize, cols: usize, elements: Vec<T>) -> Result<Self, ArrayError> {
        let expected = area(rows, cols)?;
        if elements.len() != expected {
            return Err(ArrayError::ShapeMismatch {
                expected,
                got: elements.len(),
            });
        }
        let mut array = Self::with_shape(rows, cols)?;
        let major_capacity = array.major_capacity();
        let data = array.data.as_mut_slice();
        for (i, item) in elements.into_iter().enumerate() {
            data[L::offset_of(i / cols, i % cols, major_capacity)] = item;
        }
        Ok(array)
    }

    /// Builds an array from equally long rows.
    pub fn from_rows<I, R>(rows: I) -> Result<Self, ArrayError>
    where
        I: IntoIterator<Item = R>,
        R: IntoIterator<Item = T>,
    {
        let mut elements = Vec::new();
        let mut shape: Option<(usize, usize)> = None;
        for (row, items) in rows.into_iter().enumerate() {
            let before = elements.len();
            elements.extend(items);
            let got = elements.len() - before;
            match shape {
                None => shape = Some((1, got)),
                Some((_, expected)) if expected != got => {
                    return Err(ArrayError::NonRectangular { row, expected, got });
                }
                Some((n, cols)) => shape = Some((n + 1, cols)),
            }
        }
        let (rows, cols) = shape.unwrap_or((0, 0));
        Self::from_row_major(rows, cols, elements)
    }

    /// Ensures capacity for at least `rows × cols` without changing the
    /// logical shape.
    ///
    /// While either capacity is zero no storage is allocated, and the
    /// other axis' capacity is bookkeeping only: a later growing
    /// `reshape` sizes its buffer from the requested shape.
    ///
    /// Capacity is rounded up by the array's [`GrowthPolicy`]. When the
    /// buffer is too small it is grown once and every run is moved to
    /// its position under the new major capacity.
    pub fn reserve(&mut self, rows: usize, cols: usize) -> Result<(), ArrayError> {
        let row_capacity = self.growth.grow(self.row_capacity, rows);
        let col_capacity = self.growth.grow(self.col_capacity, cols);
        if (row_capacity, col_capacity) == self.capacity() {
            return Ok(());
        }
        let needed = area(row_capacity, col_capacity)?;
        if needed > self.data.len() {
            tracing::debug!(
                layout = ?L::KIND,
                from = self.data.len(),
                to = needed,
                "growing array storage"
            );
            self.data.try_resize(needed)?;
        }

        let (major, minor) = L::to_major_minor(self.rows, self.cols);
        let from = self.major_capacity();
        let (to, _) = L::to_major_minor(row_capacity, col_capacity);
        restride(self.data.as_mut_slice(), major, minor, from, to);

        self.row_capacity = row_capacity;
        self.col_capacity = col_capacity;
        self.generation += 1;
        Ok(())
    }

    /// Changes the logical shape, keeping the overlapping top-left
    /// block and exposing default values elsewhere.
    ///
    /// Stays within the current buffer whenever the new area fits in
    /// it: a pure bookkeeping change if both extents fit their
    /// capacities, an in-place re-stride otherwise. Falls back to the
    /// copying path of [`Array::resize`] (with capacity rounded by the
    /// growth policy) when the buffer is too small.
    pub fn reshape(&mut self, rows: usize, cols: usize) -> Result<(), ArrayError> {
        if (rows, cols) == self.shape() {
            return Ok(());
        }
        let (new_major, new_minor) = L::to_major_minor(rows, cols);
        let (old_major, old_minor) = L::to_major_minor(self.rows, self.cols);
        let (major_capacity, minor_capacity) =
            L::to_major_minor(self.row_capacity, self.col_capacity);

        let fits = new_major <= major_capacity && new_minor <= minor_capacity;
        let stride = if fits {
            major_capacity
        } else {
            let needed = area(rows, cols)?;
            if needed == 0 || needed > self.data.len() {
                // Capacity without a backing buffer does not anchor growth.
                let (row_base, col_base) = if self.data.is_empty() {
                    (0, 0)
                } else {
                    self.capacity()
                };
                let row_capacity = self.growth.grow(row_base, rows);
                let col_capacity = self.growth.grow(col_base, cols);
                return self.rebuild(rows, cols, row_capacity, col_capacity);
            }
            if new_major > major_capacity {
                new_major
            } else {
                self.data.len() / new_minor
            }
        };

        let data = self.data.as_mut_slice();
        clear_outside(data, old_major, old_minor, new_major, new_minor, major_capacity);
        if stride != major_capacity {
            tracing::trace!(
                layout = ?L::KIND,
                from = major_capacity,
                to = stride,
                "restriding array storage"
            );
            restride(
                data,
                old_major.min(new_major),
                old_minor.min(new_minor),
                major_capacity,
                stride,
            );
        }
        let minor_capacity = if fits {
            minor_capacity
        } else {
            data.len() / stride
        };

        (self.rows, self.cols) = (rows, cols);
        (self.row_capacity, self.col_capacity) = L::from_major_minor(stride, minor_capacity);
        self.generation += 1;
        Ok(())
    }

    /// Changes the logical shape by building a new buffer of exactly
    /// `rows × cols`, keeping the overlapping top-left block.
    ///
    /// The replacement is fully allocated before anything is moved, so
    /// on error `self` is unchanged.
    pub fn resize(&mut self, rows: usize, cols: usize) -> Result<(), ArrayError> {
        self.rebuild(rows, cols, rows, cols)
    }

    /// Releases capacity beyond the logical shape.
    pub fn shrink_to_fit(&mut self) -> Result<(), ArrayError> {
        if self.capacity() == self.shape() && self.data.len() == self.len() {
            return Ok(());
        }
        self.rebuild(self.rows, self.cols, self.rows, self.cols)
    }

    fn rebuild(
        &mut self,
        rows: usize,
        cols: usize,
        row_capacity: usize,
        col_capacity: usize,
    ) -> Result<(), ArrayError> {
        tracing::debug!(
            layout = ?L::KIND,
            rows,
            cols,
            row_capacity,
            col_capacity,
            "rebuilding array storage"
        );
        let mut next = Self::with_capacity(rows, cols, row_capacity, col_capacity)?;

        let (major, minor) = L::to_major_minor(self.rows.min(rows), self.cols.min(cols));
        let (from, to) = (self.major_capacity(), next.major_capacity());
        let src = self.data.as_mut_slice();
        let dst = next.data.as_mut_slice();
        for k in 0..minor {
            for j in 0..major {
                dst[k * to + j] = std::mem::take(&mut src[k * from + j]);
            }
        }

        next.id = self.id;
        next.generation = self.generation + 1;
        next.growth = self.growth;
        *self = next;
        Ok(())
    }
}

impl<T, L: Layout, S: Storage<T>> Index<(usize, usize)> for Array<T, L, S> {
    type Output = T;

    fn index(&self, (row, col): (usize, usize)) -> &T {
        match self.get(row, col) {
            Some(item) => item,
            None => panic!(
                "index ({}, {}) out of range for {}x{} array",
                row, col, self.rows, self.cols
            ),
        }
    }
}

impl<T, L: Layout, S: Storage<T>> IndexMut<(usize, usize)> for Array<T, L, S> {
    fn index_mut(&mut self, (row, col): (usize, usize)) -> &mut T {
        let (rows, cols) = self.shape();
        match self.get_mut(row, col) {
            Some(item) => item,
            None => panic!(
                "index ({}, {}) out of range for {}x{} array",
                row, col, rows, cols
            ),
        }
    }
}

/// Arrays are equal when they have the same shape and the same value
/// at every logical cell, regardless of layout or capacity.
impl<T, L1, L2, S1, S2> PartialEq<Array<T, L2, S2>> for Array<T, L1, S1>
where
    T: PartialEq,
    L1: Layout,
    L2: Layout,
    S1: Storage<T>,
    S2: Storage<T>,
{
    fn eq(&self, other: &Array<T, L2, S2>) -> bool {
        self.shape() == other.shape()
            && self
                .rows()
                .iter()
                .zip(other.rows().iter())
                .all(|(a, b)| a.iter().eq(b.iter()))
    }
}

impl<T: Eq, L: Layout, S: Storage<T>> Eq for Array<T, L, S> {}

impl<T: fmt::Debug, L: Layout, S: Storage<T>> fmt::Debug for Array<T, L, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Array")
            .field("layout", &self.layout)
            .field("shape", &self.shape())
            .field("capacity", &self.capacity())
            .field("rows", &self.rows().iter().collect::<Vec<_>>())
            .finish()
    }
}

/// Logical elements in row order, independent of layout.
struct RowOrder<'a, T, L, S>(&'a Array<T, L, S>);

impl<T: Serialize, L: Layout, S: Storage<T>> Serialize for RowOrder<'_, T, L, S> {
    fn serialize<Z: Serializer>(&self, serializer: Z) -> Result<Z::Ok, Z::Error> {
        serializer.collect_seq(self.0.rows().iter().flat_map(|row| row.iter()))
    }
}

impl<T: Serialize, L: Layout, S: Storage<T>> Serialize for Array<T, L, S> {
    fn serialize<Z: Serializer>(&self, serializer: Z) -> Result<Z::Ok, Z::Error> {
        let mut state = serializer.serialize_struct("Array", 3)?;
        state.serialize_field("rows", &self.rows)?;
        state.serialize_field("cols", &self.cols)?;
        state.serialize_field("elements", &RowOrder(self))?;
        state.end()
    }
}

#[derive(Deserialize)]
#[serde(rename = "Array")]
struct ArrayRepr<T> {
    rows: usize,
    cols: usize,
    elements: Vec<T>,
}

impl<'de, T, L, S> Deserialize<'de> for Array<T, L, S>
where
    T: Deserialize<'de> + Default,
    L: Layout,
    S: Storage<T>,
{
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let repr = ArrayRepr::<T>::deserialize(deserializer)?;
        Self::from_row_major(repr.rows, repr.cols, repr.elements).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use tracing_test::traced_test;

    use super::*;
    use crate::layout::ColMajor;
    use crate::strategy::Model;
    use crate::strategy::Op;
    use crate::strategy::gen_ops;
    use crate::strategy::gen_shape;

    fn numbered<L: Layout>(rows: usize, cols: usize) -> Array<usize, L> {
        Array::from_fn(rows, cols, |r, c| r * cols + c).unwrap()
    }

    fn assert_default_outside<T: Default + PartialEq + fmt::Debug, L: Layout>(a: &Array<T, L>) {
        let major_capacity = a.major_capacity();
        let mut live = vec![false; a.storage().len()];
        for r in 0..a.num_rows() {
            for c in 0..a.num_cols() {
                live[L::offset_of(r, c, major_capacity)] = true;
            }
        }
        for (i, item) in a.storage().iter().enumerate() {
            if !live[i] {
                assert_eq!(*item, T::default(), "padding cell {} not reset", i);
            }
        }
    }

    #[test]
    fn test_new_is_empty() {
        let a: Array<i32> = Array::new();
        assert!(a.is_empty());
        assert_eq!(a.shape(), (0, 0));
        assert_eq!(a.capacity(), (0, 0));
        assert_eq!(a.layout(), LayoutKind::RowMajor);
        assert_eq!(a.rows().len(), 0);
        assert!(a.get(0, 0).is_none());
    }

    #[test]
    fn test_with_shape_defaults() {
        let a: Array<i32, ColMajor> = Array::with_shape(2, 3).unwrap();
        assert_eq!(a.shape(), (2, 3));
        assert_eq!(a.len(), 6);
        assert!(a.storage().iter().all(|&x| x == 0));
        assert_eq!(a.layout(), LayoutKind::ColMajor);
    }

    #[test]
    fn test_storage_order() {
        let a = numbered::<RowMajor>(2, 3);
        assert_eq!(a.storage(), &[0, 1, 2, 3, 4, 5]);
        let b = numbered::<ColMajor>(2, 3);
        assert_eq!(b.storage(), &[0, 3, 1, 4, 2, 5]);
        assert_eq!(a, b);
        assert_eq!(a.minor_slice(1), &[3, 4, 5]);
        assert_eq!(b.minor_slice(2), &[2, 5]);
    }

    #[test]
    fn test_checked_access() {
        let mut a = numbered::<RowMajor>(2, 3);
        assert_eq!(*a.at(1, 2).unwrap(), 5);
        *a.at_mut(0, 1).unwrap() = 42;
        assert_eq!(a[(0, 1)], 42);
        assert!(matches!(
            a.at(2, 0),
            Err(ArrayError::IndexOutOfRange {
                row: 2,
                col: 0,
                rows: 2,
                cols: 3
            })
        ));
        assert!(a.at_mut(0, 3).is_err());
        // SAFETY: (1, 1) is in range.
        assert_eq!(unsafe { *a.get_unchecked(1, 1) }, 4);
        unsafe { *a.get_unchecked_mut(1, 1) = 7 };
        assert_eq!(a[(1, 1)], 7);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_index_out_of_range() {
        let a = numbered::<ColMajor>(2, 2);
        let _ = a[(0, 2)];
    }

    #[test]
    #[should_panic(expected = "row 3 out of range 3")]
    fn test_row_out_of_range() {
        let a = numbered::<RowMajor>(3, 3);
        let _ = a.row(3);
    }

    #[test]
    fn test_from_rows() {
        let a: Array<i32, ColMajor> = Array::from_rows(vec![vec![1, 2], vec![3, 4], vec![5, 6]]).unwrap();
        assert_eq!(a.shape(), (3, 2));
        assert_eq!(a.col(1), [2, 4, 6]);

        let err = Array::<i32>::from_rows(vec![vec![1, 2], vec![3]]).unwrap_err();
        assert!(matches!(
            err,
            ArrayError::NonRectangular {
                row: 1,
                expected: 2,
                got: 1
            }
        ));

        let empty = Array::<i32>::from_rows(Vec::<Vec<i32>>::new()).unwrap();
        assert_eq!(empty.shape(), (0, 0));
    }

    #[test]
    fn test_from_row_major_mismatch() {
        let err = Array::<i32>::from_row_major(2, 2, vec![1, 2, 3]).unwrap_err();
        assert!(matches!(err, ArrayError::ShapeMismatch { expected: 4, got: 3 }));
    }

    #[test]
    fn test_restride_grow_and_shrink() {
        // Two runs of three live elements at stride 3.
        let mut data = vec![1, 2, 3, 4, 5, 6, 0, 0, 0, 0];
        restride(&mut data, 3, 2, 3, 5);
        assert_eq!(data, vec![1, 2, 3, 0, 0, 4, 5, 6, 0, 0]);
        restride(&mut data, 3, 2, 5, 3);
        assert_eq!(data, vec![1, 2, 3, 4, 5, 6, 0, 0, 0, 0]);
        // Overlapping self-move: stride 2 -> 3 with runs longer than the shift.
        let mut data = vec![1, 2, 3, 4, 5, 6, 0, 0, 0];
        restride(&mut data, 2, 3, 2, 3);
        assert_eq!(data, vec![1, 2, 0, 3, 4, 0, 5, 6, 0]);
    }

    #[test]
    fn test_reserve_preserves_contents() {
        let mut a = numbered::<RowMajor>(2, 3);
        a.reserve(4, 5).unwrap();
        assert_eq!(a.shape(), (2, 3));
        assert_eq!(a.capacity(), (4, 5));
        assert_eq!(a, numbered::<RowMajor>(2, 3));
        assert_default_outside(&a);

        let mut b = numbered::<ColMajor>(3, 2);
        b.reserve(6, 2).unwrap();
        assert_eq!(b.capacity(), (6, 2));
        assert_eq!(b, numbered::<ColMajor>(3, 2));
        assert_default_outside(&b);
    }

    #[test]
    fn test_reserve_within_capacity_is_noop() {
        let mut a = numbered::<RowMajor>(2, 2);
        a.reserve(4, 4).unwrap();
        let (ptr, generation) = (a.as_ptr(), a.generation());
        a.reserve(3, 1).unwrap();
        assert_eq!(a.as_ptr(), ptr);
        assert_eq!(a.generation(), generation);
        assert_eq!(a.capacity(), (4, 4));
    }

    #[test]
    fn test_reserve_overflow() {
        let mut a: Array<u8> = Array::new();
        let err = a.reserve(usize::MAX, 2).unwrap_err();
        assert!(matches!(err, ArrayError::CapacityOverflow { .. }));
        assert_eq!(a.capacity(), (0, 0));
    }

    #[test]
    fn test_reserve_allocation_failure_leaves_array_untouched() {
        let mut a = numbered::<RowMajor>(2, 2);
        let before = a.clone();
        let err = a.reserve(1 << 31, 1 << 31).unwrap_err();
        assert!(matches!(err, ArrayError::Allocation { .. }));
        assert_eq!(a, before);
        assert_eq!(a.capacity(), (2, 2));
    }

    #[test]
    fn test_reserve_double_growth() {
        let mut a = numbered::<RowMajor>(2, 2).with_growth(GrowthPolicy::Double);
        a.reserve(3, 2).unwrap();
        assert_eq!(a.capacity(), (4, 2));
        a.reserve(5, 5).unwrap();
        assert_eq!(a.capacity(), (8, 5));
        assert_eq!(a, numbered::<RowMajor>(2, 2));
    }

    fn check_reshape_within_capacity<L: Layout>() {
        let mut a = numbered::<L>(2, 2);
        a.reserve(4, 4).unwrap();
        let ptr = a.as_ptr();
        a.reshape(3, 4).unwrap();
        assert_eq!(a.as_ptr(), ptr);
        assert_eq!(a.capacity(), (4, 4));
        assert_eq!(a.row(0), [0, 1, 0, 0]);
        assert_eq!(a.row(2), [0, 0, 0, 0]);
        a.reshape(1, 1).unwrap();
        assert_eq!(a.as_ptr(), ptr);
        assert_default_outside(&a);
        a.reshape(2, 2).unwrap();
        assert_eq!(a.row(0), [0, 0]);
        assert_eq!(a.row(1), [0, 0]);
    }

    #[test]
    fn test_reshape_within_capacity_keeps_buffer() {
        check_reshape_within_capacity::<RowMajor>();
        check_reshape_within_capacity::<ColMajor>();
    }

    #[test]
    fn test_reshape_restrides_in_place() {
        // 2x2 in a 4x4 buffer (16 cells); 2x8 fits the buffer but not the
        // column capacity, so the row-major runs are widened in place.
        let mut a = numbered::<RowMajor>(2, 2);
        a.reserve(4, 4).unwrap();
        let ptr = a.as_ptr();
        a.reshape(2, 8).unwrap();
        assert_eq!(a.as_ptr(), ptr);
        assert_eq!(a.capacity(), (2, 8));
        assert_eq!(a.row(0), [0, 1, 0, 0, 0, 0, 0, 0]);
        assert_eq!(a.row(1), [2, 3, 0, 0, 0, 0, 0, 0]);
        assert_default_outside(&a);

        // 8x2 needs more runs: the stride shrinks back to 2.
        a.reshape(8, 2).unwrap();
        assert_eq!(a.as_ptr(), ptr);
        assert_eq!(a.capacity(), (8, 2));
        assert_eq!(a.row(0), [0, 1]);
        assert_eq!(a.row(1), [2, 3]);
        assert!(a.rows().iter().skip(2).all(|r| r == [0, 0]));
        assert_default_outside(&a);
    }

    #[test]
    fn test_reshape_col_major_restride() {
        let mut a = numbered::<ColMajor>(3, 2);
        a.reserve(3, 4).unwrap();
        // 12 cells; 6x2 widens the columns.
        a.reshape(6, 2).unwrap();
        assert_eq!(a.capacity(), (6, 2));
        assert_eq!(a.col(0), [0, 2, 4, 0, 0, 0]);
        assert_eq!(a.col(1), [1, 3, 5, 0, 0, 0]);
        // 2x6 narrows them again.
        a.reshape(2, 6).unwrap();
        assert_eq!(a.capacity(), (2, 6));
        assert_eq!(a.row(0), [0, 1, 0, 0, 0, 0]);
        assert_eq!(a.row(1), [2, 3, 0, 0, 0, 0]);
        assert_default_outside(&a);
    }

    #[test]
    #[traced_test]
    fn test_reshape_beyond_buffer_rebuilds() {
        let mut a = numbered::<RowMajor>(2, 2);
        let generation = a.generation();
        a.reshape(3, 5).unwrap();
        assert!(logs_contain("rebuilding array storage"));
        assert_eq!(a.shape(), (3, 5));
        assert_eq!(a.row(0), [0, 1, 0, 0, 0]);
        assert_eq!(a.row(1), [2, 3, 0, 0, 0]);
        assert!(a.generation() > generation);
    }

    #[test]
    fn test_reshape_to_zero_extent() {
        let mut a = numbered::<RowMajor>(2, 2);
        a.reshape(0, 5).unwrap();
        assert_eq!(a.shape(), (0, 5));
        assert!(a.is_empty());
        a.reshape(2, 2).unwrap();
        assert_eq!(a.row(0), [0, 0]);
    }

    #[test]
    fn test_resize_keeps_intersection() {
        let mut a = numbered::<ColMajor>(3, 3);
        a.resize(2, 4).unwrap();
        assert_eq!(a.capacity(), (2, 4));
        assert_eq!(a.storage().len(), 8);
        assert_eq!(a.row(0), [0, 1, 2, 0]);
        assert_eq!(a.row(1), [3, 4, 5, 0]);
    }

    #[test]
    fn test_resize_non_copy_elements() {
        let mut a: Array<String> =
            Array::from_fn(2, 2, |r, c| format!("{}{}", r, c)).unwrap();
        a.resize(3, 1).unwrap();
        assert_eq!(a.col(0).to_vec(), vec!["00", "10", ""]);
        a.reserve(3, 4).unwrap();
        a.reshape(2, 2).unwrap();
        assert_eq!(a.row(0).to_vec(), vec!["00", ""]);
    }

    #[test]
    fn test_shrink_to_fit() {
        let mut a = numbered::<RowMajor>(2, 3);
        a.reserve(10, 10).unwrap();
        a.shrink_to_fit().unwrap();
        assert_eq!(a.capacity(), (2, 3));
        assert_eq!(a.storage().len(), 6);
        assert_eq!(a, numbered::<RowMajor>(2, 3));
        let generation = a.generation();
        a.shrink_to_fit().unwrap();
        assert_eq!(a.generation(), generation);
    }

    #[test]
    #[traced_test]
    fn test_reserve_logs_growth() {
        let mut a = numbered::<RowMajor>(1, 1);
        a.reserve(2, 2).unwrap();
        assert!(logs_contain("growing array storage"));
    }

    #[test]
    fn test_handles_go_stale() {
        let mut a = numbered::<RowMajor>(3, 3);
        let row = a.row_handle(1).unwrap();
        let col = a.col_handle(2).unwrap();
        assert_eq!(a.slice(row).unwrap(), [3, 4, 5]);
        a.slice_mut(col).unwrap()[0] = 99;
        assert_eq!(a[(0, 2)], 99);

        a.reserve(5, 5).unwrap();
        assert!(matches!(
            a.slice(row),
            Err(ArrayError::StaleHandle { issued: 0, current: 1 })
        ));
        assert!(a.slice_mut(col).is_err());

        let fresh = a.row_handle(1).unwrap();
        assert_eq!(a.slice(fresh).unwrap(), [3, 4, 5]);
        assert!(matches!(
            a.col_handle(3),
            Err(ArrayError::SliceOutOfRange {
                axis: Axis::Col,
                index: 3,
                count: 3
            })
        ));
    }

    #[test]
    fn test_handles_are_bound_to_their_array() {
        let mut a: Array<i32> = Array::from_rows([[1, 2], [3, 4]]).unwrap();
        let row = a.row_handle(1).unwrap();
        assert_eq!(a.slice(row).unwrap(), [3, 4]);

        a = Array::from_rows([[9, 9], [8, 8]]).unwrap();
        assert!(matches!(a.slice(row), Err(ArrayError::ForeignHandle { .. })));
        assert!(a.slice_mut(row).is_err());

        let mut b: Array<i32> = Array::from_rows([[5, 6], [7, 8]]).unwrap();
        let col = b.col_handle(0).unwrap();
        std::mem::swap(&mut a, &mut b);
        assert!(matches!(b.slice(col), Err(ArrayError::ForeignHandle { .. })));
        assert_eq!(a.slice(col).unwrap(), [5, 7]);

        let c = a.clone();
        assert!(matches!(c.slice(col), Err(ArrayError::ForeignHandle { .. })));

        let taken = std::mem::take(&mut a);
        assert!(matches!(a.slice(col), Err(ArrayError::ForeignHandle { .. })));
        assert_eq!(taken.slice(col).unwrap(), [5, 7]);
    }

    #[test]
    fn test_handles_survive_identity_through_rebuild() {
        let mut a = numbered::<ColMajor>(2, 2);
        let row = a.row_handle(0).unwrap();
        a.resize(3, 3).unwrap();
        assert!(matches!(
            a.slice(row),
            Err(ArrayError::StaleHandle { issued: 0, current: 1 })
        ));
        let row = a.row_handle(0).unwrap();
        assert_eq!(a.slice(row).unwrap(), [0, 1, 0]);
    }

    #[test]
    fn test_mutable_escape_hatches() {
        let mut a = numbered::<RowMajor>(2, 3);
        a.reserve(2, 5).unwrap();
        a.minor_slice_mut(1).copy_from_slice(&[7, 8, 9]);
        assert_eq!(a.row(1), [7, 8, 9]);
        assert_eq!(a.minor_slice(1), &[7, 8, 9]);

        let ptr = a.as_mut_ptr();
        assert_eq!(ptr as *const usize, a.as_ptr());
        // SAFETY: offset 1 is (0, 1) and lies within the buffer.
        unsafe { *ptr.add(1) = 42 };
        assert_eq!(a[(0, 1)], 42);

        let mut b = numbered::<ColMajor>(2, 3);
        b.minor_slice_mut(2).fill(0);
        assert_eq!(b.col(2), [0, 0]);
        assert_eq!(b.col(1), [1, 4]);
    }

    #[test]
    #[should_panic(expected = "minor index 2 out of range 2")]
    fn test_minor_slice_mut_out_of_range() {
        let mut a = numbered::<RowMajor>(2, 3);
        let _ = a.minor_slice_mut(2);
    }

    #[test]
    fn test_unbacked_capacity_does_not_anchor_growth() {
        for growth in [GrowthPolicy::Exact, GrowthPolicy::Double] {
            let mut a: Array<u8> = Array::new().with_growth(growth);
            a.reserve(usize::MAX, 0).unwrap();
            assert_eq!(a.capacity(), (usize::MAX, 0));
            assert!(a.storage().is_empty());
            a.reshape(3, 1).unwrap();
            assert_eq!(a.shape(), (3, 1));
            assert_eq!(a.capacity(), (3, 1));

            let mut b: Array<u8, ColMajor> = Array::new().with_growth(growth);
            b.reserve(0, usize::MAX).unwrap();
            b.reshape(1, 3).unwrap();
            assert_eq!(b.capacity(), (1, 3));
        }
    }

    #[test]
    fn test_clone_is_deep() {
        let a = numbered::<RowMajor>(2, 2);
        let mut b = a.clone();
        b[(0, 0)] = 10;
        assert_eq!(a[(0, 0)], 0);
        assert_ne!(a.as_ptr(), b.as_ptr());
    }

    #[test]
    fn test_take_leaves_empty() {
        let mut a = numbered::<ColMajor>(2, 2);
        let b = std::mem::take(&mut a);
        assert_eq!(b.shape(), (2, 2));
        assert!(a.is_empty());
        assert_eq!(a.capacity(), (0, 0));
    }

    #[test]
    fn test_serde_is_layout_independent() {
        let a = numbered::<ColMajor>(2, 3);
        let json = serde_json::to_string(&a).unwrap();
        assert_eq!(json, r#"{"rows":2,"cols":3,"elements":[0,1,2,3,4,5]}"#);
        let b: Array<usize, RowMajor> = serde_json::from_str(&json).unwrap();
        assert_eq!(a, b);
        let bad = serde_json::from_str::<Array<usize>>(r#"{"rows":2,"cols":3,"elements":[0]}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn test_debug() {
        let a = numbered::<RowMajor>(2, 2);
        let s = format!("{:?}", a);
        assert!(s.contains("[[0, 1], [2, 3]]"), "{}", s);
    }

    fn check_model<L: Layout>(growth: GrowthPolicy, ops: &[Op]) -> Result<(), TestCaseError> {
        let mut array: Array<i64, L> = Array::new().with_growth(growth);
        let mut model = Model::default();
        for op in ops {
            match *op {
                Op::Reserve(r, c) => array.reserve(r, c).unwrap(),
                Op::Reshape(r, c) => {
                    array.reshape(r, c).unwrap();
                    model.resize(r, c);
                }
                Op::Resize(r, c) => {
                    array.resize(r, c).unwrap();
                    model.resize(r, c);
                }
                Op::Set(r, c, v) => {
                    if let Some(cell) = array.get_mut(r, c) {
                        *cell = v;
                    }
                    model.set(r, c, v);
                }
            }
            prop_assert_eq!(array.shape(), model.shape());
            prop_assert!(array.num_rows() <= array.row_capacity());
            prop_assert!(array.num_cols() <= array.col_capacity());
            prop_assert!(array.storage().len() >= array.row_capacity() * array.col_capacity());
            let rows: Vec<Vec<i64>> = array.rows().iter().map(|r| r.to_vec()).collect();
            prop_assert_eq!(&rows, model.rows());
        }
        assert_default_outside(&array);
        Ok(())
    }

    proptest! {
        #[test]
        fn prop_matches_model_row_major(ops in gen_ops(24, 6)) {
            check_model::<RowMajor>(GrowthPolicy::Exact, &ops)?;
        }

        #[test]
        fn prop_matches_model_col_major(ops in gen_ops(24, 6)) {
            check_model::<ColMajor>(GrowthPolicy::Exact, &ops)?;
        }

        #[test]
        fn prop_matches_model_row_major_doubling(ops in gen_ops(24, 6)) {
            check_model::<RowMajor>(GrowthPolicy::Double, &ops)?;
        }

        #[test]
        fn prop_matches_model_col_major_doubling(ops in gen_ops(24, 6)) {
            check_model::<ColMajor>(GrowthPolicy::Double, &ops)?;
        }

        #[test]
        fn prop_layouts_agree((rows, cols) in gen_shape(8)) {
            let a = numbered::<RowMajor>(rows, cols);
            let b = numbered::<ColMajor>(rows, cols);
            prop_assert_eq!(&a, &b);
            for r in 0..rows {
                for c in 0..cols {
                    prop_assert_eq!(a[(r, c)], b[(r, c)]);
                    prop_assert_eq!(a.row(r)[c], a.col(c)[r]);
                }
            }
        }

        #[test]
        fn prop_reserve_then_reshape_keeps_buffer(
            (rows, cols) in gen_shape(6),
            (extra_rows, extra_cols) in gen_shape(6),
        ) {
            let mut a = numbered::<RowMajor>(rows, cols);
            let (r, c) = (rows + extra_rows, cols + extra_cols);
            a.reserve(r, c).unwrap();
            let ptr = a.as_ptr();
            a.reshape(r, c).unwrap();
            prop_assert_eq!(a.as_ptr(), ptr);
        }
    }
}
