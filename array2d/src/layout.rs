/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Memory layouts for two-dimensional arrays.
//!
//! A layout decides which logical axis is stored contiguously. We
//! speak of the position *within* a contiguous run as the **major**
//! coordinate and of the run number as the **minor** coordinate:
//!
//! ```text
//! offset(row, col) = minor × major_capacity + major
//!
//! RowMajor: (major, minor) = (col, row)    rows are contiguous
//! ColMajor: (major, minor) = (row, col)    columns are contiguous
//! ```
//!
//! `major_capacity` is the *allocated* length of a contiguous run, not
//! its logical length, so runs may be followed by unused padding.

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

pub(crate) mod sealed {
    pub trait Sealed {}
}

/// A logical axis of a two-dimensional array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    Row,
    Col,
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::Row => write!(f, "row"),
            Axis::Col => write!(f, "col"),
        }
    }
}

/// Runtime name of a [`Layout`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutKind {
    RowMajor,
    ColMajor,
}

/// Step between consecutive elements of a slice, in elements.
///
/// [`Unit`] is the statically known stride of a contiguous slice;
/// [`Strided`] carries the major capacity of the array it was taken
/// from.
pub trait Stride: sealed::Sealed + Copy + fmt::Debug {
    fn new(major_capacity: usize) -> Self;

    fn get(self) -> usize;
}

/// Stride of a contiguous run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Unit;

impl sealed::Sealed for Unit {}

impl Stride for Unit {
    #[inline]
    fn new(_major_capacity: usize) -> Self {
        Unit
    }

    #[inline]
    fn get(self) -> usize {
        1
    }
}

/// Stride across contiguous runs; equal to the major capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Strided(usize);

impl sealed::Sealed for Strided {}

impl Stride for Strided {
    #[inline]
    fn new(major_capacity: usize) -> Self {
        Strided(major_capacity)
    }

    #[inline]
    fn get(self) -> usize {
        self.0
    }
}

/// A storage order for a two-dimensional array.
///
/// Layouts are zero-sized type parameters, so every index computation
/// is monomorphized and there is no per-access dispatch.
pub trait Layout:
    sealed::Sealed + Copy + Default + fmt::Debug + PartialEq + Eq + Send + Sync + 'static
{
    const KIND: LayoutKind;

    /// The axis whose slices are contiguous.
    const CONTIGUOUS: Axis;

    /// Stride kind of a row slice.
    type RowStride: Stride;

    /// Stride kind of a column slice.
    type ColStride: Stride;

    /// Splits a logical `(row, col)` pair into `(major, minor)`. Works
    /// on extents and capacities as well as on coordinates.
    fn to_major_minor(row: usize, col: usize) -> (usize, usize);

    /// Inverse of [`Layout::to_major_minor`].
    fn from_major_minor(major: usize, minor: usize) -> (usize, usize);

    /// Flat buffer offset of `(row, col)` given the current major
    /// capacity.
    #[inline]
    fn offset_of(row: usize, col: usize, major_capacity: usize) -> usize {
        let (major, minor) = Self::to_major_minor(row, col);
        minor * major_capacity + major
    }
}

/// Rows are stored contiguously.
///
/// ```text
/// Logical:     Memory (column capacity 4):
/// [a b c]      [a b c _ d e f _]
/// [d e f]
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RowMajor;

impl sealed::Sealed for RowMajor {}

impl Layout for RowMajor {
    const KIND: LayoutKind = LayoutKind::RowMajor;
    const CONTIGUOUS: Axis = Axis::Row;

    type RowStride = Unit;
    type ColStride = Strided;

    #[inline]
    fn to_major_minor(row: usize, col: usize) -> (usize, usize) {
        (col, row)
    }

    #[inline]
    fn from_major_minor(major: usize, minor: usize) -> (usize, usize) {
        (minor, major)
    }
}

/// Columns are stored contiguously.
///
/// ```text
/// Logical:     Memory (row capacity 3):
/// [a b c]      [a d _ b e _ c f _]
/// [d e f]
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ColMajor;

impl sealed::Sealed for ColMajor {}

impl Layout for ColMajor {
    const KIND: LayoutKind = LayoutKind::ColMajor;
    const CONTIGUOUS: Axis = Axis::Col;

    type RowStride = Strided;
    type ColStride = Unit;

    #[inline]
    fn to_major_minor(row: usize, col: usize) -> (usize, usize) {
        (row, col)
    }

    #[inline]
    fn from_major_minor(major: usize, minor: usize) -> (usize, usize) {
        (major, minor)
    }
}
