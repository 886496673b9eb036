/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Growable, dense two-dimensional arrays.
//!
//! Provides [`Array`], a 2-D container whose elements live in a single
//! flat buffer in either [`RowMajor`] or [`ColMajor`] order. Capacity is
//! tracked per axis, so an array can be reserved once and then reshaped
//! within that capacity without reallocating:
//!
//! ```
//! use array2d::Array;
//! use array2d::ColMajor;
//!
//! let mut a: Array<i32, ColMajor> = Array::from_rows([[1, 2], [3, 4]]).unwrap();
//! a.reserve(4, 4).unwrap();
//! a.reshape(3, 3).unwrap();
//! assert_eq!(a.row(0), [1, 2, 0]);
//! assert_eq!(a.col(1), [2, 4, 0]);
//! ```
//!
//! Rows and columns are exposed as strided views ([`Slice`],
//! [`SliceMut`]) and as sequences of views ([`Slices`]). Views borrow
//! the array; [`SliceHandle`]s name a row or column across mutations
//! and are checked against the array's generation when resolved.

mod array;
pub use array::Array;
pub use array::ArrayError;

/// Array configuration and growth policy.
pub mod config;
pub use config::Config;
pub use config::GrowthPolicy;

/// Strided element iterators.
pub mod iter;
pub use iter::Elements;
pub use iter::ElementsMut;

/// Memory layouts and index mapping.
pub mod layout;
pub use layout::Axis;
pub use layout::ColMajor;
pub use layout::Layout;
pub use layout::LayoutKind;
pub use layout::RowMajor;

/// Row and column views.
pub mod slice;
pub use slice::Col;
pub use slice::ColMut;
pub use slice::Row;
pub use slice::RowMut;
pub use slice::Slice;
pub use slice::SliceHandle;
pub use slice::SliceMut;
pub use slice::Slices;

/// Element containers.
pub mod storage;
pub use storage::Storage;

/// Property-based generators for randomized test input.
#[cfg(test)]
pub mod strategy;
