/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

use corals_utils::views::{Matrix, MatrixView};
use faer::Par;

/// Indicate whether a matrix should be implicitly transposed for an operation.
#[derive(Debug, Clone, Copy)]
pub enum Transpose {
    /// Use a provided matrix directly.
    None,
    /// Use the transpose of a matrix.
    Ordinary,
}

impl Transpose {
    /// Return whether or not the enum is `Transpose::Ordinary`.
    pub fn is_transpose(&self) -> bool {
        matches!(self, Self::Ordinary)
    }

    /// Call exactly one of the arguments depending on the value of `self` and return the
    /// result.
    pub fn call<F, G, T>(&self, if_none: F, if_transpose: G) -> T
    where
        F: FnOnce() -> T,
        G: FnOnce() -> T,
    {
        match self {
            Self::None => if_none(),
            Self::Ordinary => if_transpose(),
        }
    }
}

/// Compute `c = a * b` for row-major matrices, where either operand may be implicitly
/// transposed.
///
/// The product runs on the rayon pool of the caller, so it uses the workers of an
/// installed [`crate::Executor`] pool or the global pool otherwise.
///
/// # Panics
///
/// Panics if the inner dimensions of `a` and `b` (after transposition) differ.
pub fn dgemm(
    atranspose: Transpose,
    btranspose: Transpose,
    a: MatrixView<'_, f64>,
    b: MatrixView<'_, f64>,
) -> Matrix<f64> {
    let (m, k) = atranspose.call(|| a.shape(), || (a.ncols(), a.nrows()));
    let (kb, n) = btranspose.call(|| b.shape(), || (b.ncols(), b.nrows()));
    assert_eq!(
        k, kb,
        "inner dimensions do not match: a is {m}x{k} and b is {kb}x{n}"
    );

    let fa = atranspose.call(
        || faer::mat::MatRef::from_row_major_slice(a.as_slice(), m, k),
        || faer::mat::MatRef::from_row_major_slice(a.as_slice(), k, m).transpose(),
    );
    let fb = btranspose.call(
        || faer::mat::MatRef::from_row_major_slice(b.as_slice(), k, n),
        || faer::mat::MatRef::from_row_major_slice(b.as_slice(), n, k).transpose(),
    );

    let mut c = Matrix::new(0.0, m, n);
    let fc = faer::mat::MatMut::from_row_major_slice_mut(c.as_mut_slice(), m, n);
    faer::linalg::matmul::matmul(fc, faer::Accum::Replace, fa, fb, 1.0, Par::rayon(0));
    c
}

/// Return `z * z'` for the row-major matrix `z`.
pub fn gram(z: MatrixView<'_, f64>) -> Matrix<f64> {
    dgemm(Transpose::None, Transpose::Ordinary, z, z)
}

/// Dot product of two equal-length slices.
#[inline]
pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Squared euclidean distance between two equal-length slices.
#[inline]
pub fn squared_l2(a: &[f64], b: &[f64]) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}
