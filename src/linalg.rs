//! Dense vector and matrix helpers on top of `ndarray`.
//!
//! Everything here allocates a fresh result except `scale_in_place`. Shapes
//! are checked up front and reported as `DimensionMismatch` instead of
//! letting `ndarray` panic halfway through.

use ndarray::prelude::*;

use crate::error::{ConfigurationError, Result};

pub type Vector = Array1<f64>;

/// Row-major (standard layout) matrix.
pub type Matrix = Array2<f64>;

fn check_same_shape<D: Dimension>(a: &Array<f64, D>, b: &Array<f64, D>) -> Result<()> {
    if a.shape() != b.shape() {
        return Err(ConfigurationError::shape_mismatch(a.shape(), b.shape()));
    }
    Ok(())
}

pub fn add<D: Dimension>(a: &Array<f64, D>, b: &Array<f64, D>) -> Result<Array<f64, D>> {
    check_same_shape(a, b)?;
    Ok(a + b)
}

pub fn subtract<D: Dimension>(a: &Array<f64, D>, b: &Array<f64, D>) -> Result<Array<f64, D>> {
    check_same_shape(a, b)?;
    Ok(a - b)
}

/// Elementwise product.
pub fn hadamard<D: Dimension>(a: &Array<f64, D>, b: &Array<f64, D>) -> Result<Array<f64, D>> {
    check_same_shape(a, b)?;
    Ok(a * b)
}

pub fn scale_in_place<D: Dimension>(a: &mut Array<f64, D>, scalar: f64) {
    *a *= scalar;
}

pub fn scaled<D: Dimension>(a: &Array<f64, D>, scalar: f64) -> Array<f64, D> {
    a * scalar
}

pub fn dot(a: &Vector, b: &Vector) -> Result<f64> {
    if a.len() != b.len() {
        return Err(ConfigurationError::len_mismatch(a.len(), b.len()));
    }
    Ok(a.dot(b))
}

/// `a ⊗ b`, the `a.len() × b.len()` matrix with entries `a[i] * b[j]`.
pub fn outer(a: &Vector, b: &Vector) -> Matrix {
    Array2::from_shape_fn((a.len(), b.len()), |(i, j)| a[i] * b[j])
}

/// Transposed copy, laid out row-major like every other `Matrix`.
pub fn transpose(m: &Matrix) -> Matrix {
    m.t().as_standard_layout().into_owned()
}

pub fn mat_vec(m: &Matrix, v: &Vector) -> Result<Vector> {
    if m.ncols() != v.len() {
        return Err(ConfigurationError::len_mismatch(m.ncols(), v.len()));
    }
    Ok(m.dot(v))
}

pub fn sum_of_squares<D: Dimension>(a: &Array<f64, D>) -> f64 {
    a.iter().map(|x| x * x).sum()
}

pub fn euclidean_norm<D: Dimension>(a: &Array<f64, D>) -> f64 {
    sum_of_squares(a).sqrt()
}
