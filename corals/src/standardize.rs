/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

use corals_utils::views::{Matrix, MatrixView};

/// Standardize the columns of `data` into unit vectors.
///
/// Returns an `n x m` matrix whose row `j` is column `j` of `data`, centered and scaled to
/// unit euclidean norm. Dot products between rows are then Pearson correlations. A
/// constant column becomes the zero vector, so its correlation with anything is `0`.
pub fn standardize(data: MatrixView<'_, f64>) -> Matrix<f64> {
    let mut z = data.transpose();
    z.row_iter_mut().for_each(normalize);
    z
}

/// Center each column of `data` without scaling it, returning the `n x m` transpose.
pub fn center(data: MatrixView<'_, f64>) -> Matrix<f64> {
    let mut c = data.transpose();
    c.row_iter_mut().for_each(|row| {
        let mean = mean(row);
        row.iter_mut().for_each(|x| *x -= mean);
    });
    c
}

fn mean(row: &[f64]) -> f64 {
    if row.is_empty() {
        0.0
    } else {
        row.iter().sum::<f64>() / row.len() as f64
    }
}

fn normalize(row: &mut [f64]) {
    let mean = mean(row);
    row.iter_mut().for_each(|x| *x -= mean);
    let norm = row.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm > 0.0 {
        row.iter_mut().for_each(|x| *x /= norm);
    } else {
        row.fill(0.0);
    }
}

/// Replace each column of `data` with its ranks, averaging the ranks of ties.
///
/// Ranks start at `1`. Correlating ranked columns gives the Spearman coefficient.
pub fn rank_columns(data: MatrixView<'_, f64>) -> Matrix<f64> {
    let (m, n) = data.shape();
    Matrix::from_columns(m, n, |j| average_ranks(&data.column(j)))
}

fn average_ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut ranks = vec![0.0; values.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && values[order[end]] == values[order[start]] {
            end += 1;
        }
        // Positions `start..end` share the mean of ranks `start + 1..=end`.
        let rank = (start + end + 1) as f64 / 2.0;
        for &i in &order[start..end] {
            ranks[i] = rank;
        }
        start = end;
    }
    ranks
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::linalg::dot;

    #[test]
    fn unit_norm_and_zero_mean() {
        let data = crate::test_util::uniform(20, 5, 3);
        let z = standardize(data.as_view());
        assert_eq!(z.shape(), (5, 20));
        for row in z.row_iter() {
            assert_relative_eq!(row.iter().sum::<f64>(), 0.0, epsilon = 1e-12);
            assert_relative_eq!(dot(row, row), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn constant_columns_become_zero() {
        let data = Matrix::try_from(vec![1.0, 3.0, 1.0, 4.0, 1.0, 5.0].into_boxed_slice(), 3, 2)
            .unwrap();
        let z = standardize(data.as_view());
        assert!(z.row(0).iter().all(|&x| x == 0.0));
        assert_relative_eq!(dot(z.row(1), z.row(1)), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn perfectly_correlated_columns() {
        // Column 1 = 2 * column 0 + 1, column 2 = -column 0.
        let data = Matrix::<f64>::from_columns(4, 3, |j| {
            let base = [1.0, 2.0, 4.0, 8.0];
            match j {
                0 => base.to_vec(),
                1 => base.iter().map(|x| 2.0 * x + 1.0).collect(),
                _ => base.iter().map(|x| -x).collect(),
            }
        });
        let z = standardize(data.as_view());
        assert_relative_eq!(dot(z.row(0), z.row(1)), 1.0, epsilon = 1e-12);
        assert_relative_eq!(dot(z.row(0), z.row(2)), -1.0, epsilon = 1e-12);
    }

    #[test]
    fn ranks_average_ties() {
        assert_eq!(average_ranks(&[10.0, 20.0, 10.0, 5.0]), vec![2.5, 4.0, 2.5, 1.0]);
        assert_eq!(average_ranks(&[1.0, 1.0, 1.0]), vec![2.0, 2.0, 2.0]);
        assert!(average_ranks(&[]).is_empty());

        let data = Matrix::<f64>::from_columns(3, 2, |j| {
            if j == 0 { vec![0.3, 0.1, 0.2] } else { vec![-1.0, -1.0, 7.0] }
        });
        let ranked = rank_columns(data.as_view());
        assert_eq!(ranked.column(0), vec![3.0, 1.0, 2.0]);
        assert_eq!(ranked.column(1), vec![1.5, 1.5, 3.0]);
    }

    #[test]
    fn centering_keeps_scale() {
        let data = Matrix::<f64>::from_columns(2, 1, |_| vec![1.0, 3.0]);
        let c = center(data.as_view());
        assert_eq!(c.row(0), &[-1.0, 1.0]);
    }
}
