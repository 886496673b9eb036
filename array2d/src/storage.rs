/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! The element container an [`Array`](crate::Array) keeps its buffer in.

use crate::ArrayError;

/// A growable, contiguous element container.
///
/// This is the whole contract the array relies on: a length, fallible
/// default-filling resize, and contiguous access. Any dynamic sequence
/// can satisfy it; [`Vec`] does.
pub trait Storage<T>: Default {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resizes to exactly `len` elements, filling new positions with
    /// `T::default()`. On error the container must be left unchanged.
    fn try_resize(&mut self, len: usize) -> Result<(), ArrayError>
    where
        T: Default;

    fn as_slice(&self) -> &[T];

    fn as_mut_slice(&mut self) -> &mut [T];

    fn as_ptr(&self) -> *const T {
        self.as_slice().as_ptr()
    }

    fn try_with_len(len: usize) -> Result<Self, ArrayError>
    where
        T: Default,
    {
        let mut storage = Self::default();
        storage.try_resize(len)?;
        Ok(storage)
    }
}

impl<T> Storage<T> for Vec<T> {
    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn try_resize(&mut self, len: usize) -> Result<(), ArrayError>
    where
        T: Default,
    {
        if let Some(additional) = len.checked_sub(Vec::len(self)) {
            self.try_reserve_exact(additional)
                .map_err(|source| ArrayError::Allocation {
                    requested: len,
                    source: Some(source),
                })?;
        }
        self.resize_with(len, T::default);
        Ok(())
    }

    fn as_slice(&self) -> &[T] {
        self
    }

    fn as_mut_slice(&mut self) -> &mut [T] {
        self
    }
}
