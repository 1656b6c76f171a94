/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Dense `n x n` correlation matrices.

use corals_utils::views::{Matrix, MatrixView};

use crate::{
    linalg::{Transpose, dgemm},
    standardize::{center, standardize},
};

/// Pairwise baseline: covariance of centered columns, then normalization by the
/// standard deviations.
pub fn corrcoef(data: MatrixView<'_, f64>) -> Matrix<f64> {
    let c = center(data);
    let mut cov = dgemm(Transpose::None, Transpose::Ordinary, c.as_view(), c.as_view());

    let scale: Vec<f64> = (0..cov.nrows()).map(|i| cov[(i, i)].sqrt()).collect();
    for (i, row) in cov.row_iter_mut().enumerate() {
        for (j, x) in row.iter_mut().enumerate() {
            let denominator = scale[i] * scale[j];
            *x = if denominator > 0.0 {
                (*x / denominator).clamp(-1.0, 1.0)
            } else {
                0.0
            };
        }
    }
    cov
}

/// Standardize, materialize the transposed copy, then multiply.
pub fn matrix_symmetrical(data: MatrixView<'_, f64>) -> Matrix<f64> {
    let z = standardize(data);
    let zt = z.transpose();
    dgemm(Transpose::None, Transpose::None, z.as_view(), zt.as_view())
}

/// Standardize, then multiply against a transposed view of the same buffer.
pub fn matrix_symmetrical_nocopy(data: MatrixView<'_, f64>) -> Matrix<f64> {
    let z = standardize(data);
    dgemm(Transpose::None, Transpose::Ordinary, z.as_view(), z.as_view())
}

/// Correlate the columns of `left` against the columns of `right`.
///
/// The result has one row per column of `left` and one column per column of `right`. Both
/// must have the same number of samples.
pub fn matrix_asymmetrical(left: MatrixView<'_, f64>, right: MatrixView<'_, f64>) -> Matrix<f64> {
    let z1 = standardize(left);
    let z2 = standardize(right);
    dgemm(Transpose::None, Transpose::Ordinary, z1.as_view(), z2.as_view())
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::test_util::uniform;

    /// Textbook Pearson coefficient between two columns.
    fn pearson(x: &[f64], y: &[f64]) -> f64 {
        let n = x.len() as f64;
        let (mx, my) = (x.iter().sum::<f64>() / n, y.iter().sum::<f64>() / n);
        let sxy: f64 = x.iter().zip(y).map(|(a, b)| (a - mx) * (b - my)).sum();
        let sxx: f64 = x.iter().map(|a| (a - mx).powi(2)).sum();
        let syy: f64 = y.iter().map(|b| (b - my).powi(2)).sum();
        sxy / (sxx * syy).sqrt()
    }

    #[test]
    fn variants_agree_with_pearson() {
        let data = uniform(30, 12, 7);
        let copies = data.clone();
        let results = [
            corrcoef(data.as_view()),
            matrix_symmetrical(data.as_view()),
            matrix_symmetrical_nocopy(data.as_view()),
            matrix_asymmetrical(data.as_view(), copies.as_view()),
        ];

        for r in &results {
            assert_eq!(r.shape(), (12, 12));
            for i in 0..12 {
                for j in 0..12 {
                    let expected = pearson(&data.column(i), &data.column(j));
                    assert_relative_eq!(r[(i, j)], expected, epsilon = 1e-10);
                }
            }
        }
    }

    #[test]
    fn constant_column_has_zero_correlation() {
        let mut data = uniform(10, 3, 2);
        for i in 0..10 {
            data[(i, 1)] = 4.0;
        }
        for r in [corrcoef(data.as_view()), matrix_symmetrical(data.as_view())] {
            assert_eq!(r[(1, 0)], 0.0);
            assert_eq!(r[(1, 1)], 0.0);
            assert_relative_eq!(r[(0, 0)], 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn asymmetric_shape() {
        let left = uniform(8, 3, 1);
        let right = uniform(8, 5, 2);
        let r = matrix_asymmetrical(left.as_view(), right.as_view());
        assert_eq!(r.shape(), (3, 5));
    }
}
