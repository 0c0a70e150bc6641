use std::sync::Arc;

use crate::foundation::error::{PointreelError, PointreelResult};

/// Read-only multi-dimensional `f32` buffer in C (row-major) order.
///
/// Cloning is cheap; the element storage is shared.
#[derive(Clone, Debug, PartialEq)]
pub struct NDArray {
    shape: Vec<usize>,
    strides: Vec<usize>,
    data: Arc<[f32]>,
}

impl NDArray {
    /// Build an array, validating that `data.len()` equals the product of `shape`.
    pub fn new(shape: Vec<usize>, data: Vec<f32>) -> PointreelResult<Self> {
        let expected = shape
            .iter()
            .try_fold(1usize, |acc, &d| acc.checked_mul(d))
            .ok_or_else(|| PointreelError::validation("ndarray shape overflows usize"))?;
        if expected != data.len() {
            return Err(PointreelError::validation(format!(
                "ndarray shape {shape:?} expects {expected} elements, got {}",
                data.len()
            )));
        }

        let mut strides = vec![1usize; shape.len()];
        for i in (0..shape.len().saturating_sub(1)).rev() {
            strides[i] = strides[i + 1] * shape[i + 1];
        }

        Ok(Self {
            shape,
            strides,
            data: data.into(),
        })
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Flat element storage.
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Bounds-checked element access. Returns `None` when the index rank or any
    /// coordinate is out of range.
    pub fn at(&self, index: &[usize]) -> Option<f32> {
        if index.len() != self.shape.len() {
            return None;
        }
        let mut flat = 0usize;
        for ((&i, &dim), &stride) in index.iter().zip(&self.shape).zip(&self.strides) {
            if i >= dim {
                return None;
            }
            flat += i * stride;
        }
        self.data.get(flat).copied()
    }

    /// Frame count of a `[frames, samples, dims]` positions array (0 for other ranks).
    pub fn frame_count(&self) -> usize {
        if self.shape.len() == 3 { self.shape[0] } else { 0 }
    }

    /// Sample count of a `[frames, samples, dims]` positions array (0 for other ranks).
    pub fn sample_count(&self) -> usize {
        if self.shape.len() == 3 { self.shape[1] } else { 0 }
    }

    /// Raw `(x, y)` of `sample` at `frame` in a positions array.
    pub fn xy(&self, frame: usize, sample: usize) -> Option<(f64, f64)> {
        let x = self.at(&[frame, sample, 0])?;
        let y = self.at(&[frame, sample, 1])?;
        Some((f64::from(x), f64::from(y)))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/data/ndarray.rs"]
mod tests;
