/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Property-based generators for array shapes and operation
//! sequences, and a naive reference model to check them against.
//!
//! Example usage:
//!
//! ```
//! use proptest::prelude::*;
//!
//! use crate::strategy::gen_ops;
//!
//! proptest! {
//!     #[test]
//!     fn test_ops(ops in gen_ops(16, 5)) {
//!         // Apply `ops` to an array and to a `Model`.
//!     }
//! }
//! ```
//!
//! This module is only included in test builds (`#[cfg(test)]`).

use proptest::prelude::*;

/// Generates a `(rows, cols)` pair with each extent in
/// `0..=max_len`.
pub fn gen_shape(max_len: usize) -> impl Strategy<Value = (usize, usize)> {
    (0..=max_len, 0..=max_len)
}

/// One step applied to both an array and a [`Model`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Reserve(usize, usize),
    Reshape(usize, usize),
    Resize(usize, usize),
    /// Coordinates may fall outside the current shape, in which case
    /// the op is a no-op.
    Set(usize, usize, i64),
}

/// Generates a single [`Op`] with extents and coordinates bounded by
/// `max_len`.
pub fn gen_op(max_len: usize) -> impl Strategy<Value = Op> {
    prop_oneof![
        2 => gen_shape(max_len).prop_map(|(r, c)| Op::Reserve(r, c)),
        2 => gen_shape(max_len).prop_map(|(r, c)| Op::Reshape(r, c)),
        1 => gen_shape(max_len).prop_map(|(r, c)| Op::Resize(r, c)),
        3 => (0..=max_len, 0..=max_len, 1..100i64).prop_map(|(r, c, v)| Op::Set(r, c, v)),
    ]
}

/// Generates up to `max_ops` operations.
pub fn gen_ops(max_ops: usize, max_len: usize) -> impl Strategy<Value = Vec<Op>> {
    prop::collection::vec(gen_op(max_len), 0..=max_ops)
}

/// A reference 2-D array: a vector of rows, reshaped by building a new
/// one each time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Model {
    rows: Vec<Vec<i64>>,
    cols: usize,
}

impl Model {
    pub fn shape(&self) -> (usize, usize) {
        (self.rows.len(), self.cols)
    }

    pub fn rows(&self) -> &Vec<Vec<i64>> {
        &self.rows
    }

    /// Changes the shape, keeping the top-left intersection and zero
    /// filling the rest.
    pub fn resize(&mut self, rows: usize, cols: usize) {
        self.rows = (0..rows)
            .map(|r| {
                (0..cols)
                    .map(|c| {
                        self.rows
                            .get(r)
                            .and_then(|row| row.get(c))
                            .copied()
                            .unwrap_or_default()
                    })
                    .collect()
            })
            .collect();
        self.cols = cols;
    }

    pub fn set(&mut self, row: usize, col: usize, value: i64) {
        if let Some(cell) = self.rows.get_mut(row).and_then(|r| r.get_mut(col)) {
            *cell = value;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_resize() {
        let mut m = Model::default();
        m.resize(2, 2);
        m.set(1, 1, 5);
        m.set(2, 0, 9);
        m.resize(3, 1);
        assert_eq!(m.rows(), &vec![vec![0], vec![0], vec![0]]);
        m.resize(2, 3);
        m.set(0, 2, 7);
        assert_eq!(m.shape(), (2, 3));
        assert_eq!(m.rows(), &vec![vec![0, 0, 7], vec![0, 0, 0]]);
    }

    proptest! {
        #[test]
        fn test_gen_shape_bounds((r, c) in gen_shape(5)) {
            prop_assert!(r <= 5 && c <= 5);
        }
    }
}
