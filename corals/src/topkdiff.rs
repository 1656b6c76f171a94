/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Top-k search over the difference of two correlation matrices.
//!
//! Given paired groups `X1` and `X2` with the same features, the difference matrix is
//! `D = corr(X1) - corr(X2)`. With standardized columns `a_i` (from `X1`) and `b_i` (from
//! `X2`), the augmented vectors `u_i = [a_i, b_i]` and `w_j = [a_j, -b_j]` satisfy
//! `<u_i, w_j> = D_ij`, which turns the problem into a single correlation-like search.

use std::fmt;

use corals_utils::views::{Matrix, MatrixView};

use crate::{
    error::CorrelationError,
    linalg::{Transpose, dgemm, gram},
    result::{Correlations, Entry, dedup, select_topk},
    search::{Strategy, knn_candidates, neighbors_per_query},
    standardize::{rank_columns, standardize},
    threads::Executor,
    topk::symmetric_entries,
};

/// The correlation coefficient being differenced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Method {
    #[default]
    Pearson,
    /// Pearson on per-column ranks.
    Spearman,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pearson => f.write_str("pearson"),
            Self::Spearman => f.write_str("spearman"),
        }
    }
}

fn check_pair(
    x1: MatrixView<'_, f64>,
    x2: MatrixView<'_, f64>,
    k: usize,
) -> Result<(), CorrelationError> {
    if x1.ncols() != x2.ncols() {
        return Err(CorrelationError::ColumnMismatch {
            left: x1.ncols(),
            right: x2.ncols(),
        });
    }
    CorrelationError::check_k(k, x1.ncols())
}

fn standardized(x: MatrixView<'_, f64>, method: Method) -> Matrix<f64> {
    match method {
        Method::Pearson => standardize(x),
        Method::Spearman => standardize(rank_columns(x).as_view()),
    }
}

/// Concatenate the rows of `a` and `sign * b` side by side.
fn augment(a: &Matrix<f64>, b: &Matrix<f64>, sign: f64) -> Matrix<f64> {
    let (n, m1) = a.shape();
    let m2 = b.ncols();
    let mut out = Matrix::new(0.0, n, m1 + m2);
    for (i, row) in out.row_iter_mut().enumerate() {
        let (left, right) = row.split_at_mut(m1);
        left.copy_from_slice(a.row(i));
        right
            .iter_mut()
            .zip(b.row(i))
            .for_each(|(o, x)| *o = sign * x);
    }
    out
}

/// Two Gram products, subtracted.
pub fn topkdiff_matrix(
    x1: MatrixView<'_, f64>,
    x2: MatrixView<'_, f64>,
    k: usize,
    method: Method,
) -> Result<Correlations, CorrelationError> {
    check_pair(x1, x2, k)?;
    let a = standardized(x1, method);
    let b = standardized(x2, method);

    let mut d = gram(a.as_view());
    let c2 = gram(b.as_view());
    d.as_mut_slice()
        .iter_mut()
        .zip(c2.as_slice())
        .for_each(|(x, y)| *x -= y);

    Ok(select_topk(symmetric_entries(&d), k).into_iter().collect())
}

/// One product of the augmented matrices.
pub fn topkdiff_matrix_one(
    x1: MatrixView<'_, f64>,
    x2: MatrixView<'_, f64>,
    k: usize,
    method: Method,
) -> Result<Correlations, CorrelationError> {
    check_pair(x1, x2, k)?;
    let a = standardized(x1, method);
    let b = standardized(x2, method);
    let u = augment(&a, &b, 1.0);
    let w = augment(&a, &b, -1.0);

    let d = dgemm(Transpose::None, Transpose::Ordinary, u.as_view(), w.as_view());
    Ok(select_topk(symmetric_entries(&d), k).into_iter().collect())
}

/// Ball-tree search over the augmented vectors with a combined tree on `{w} ∪ {-w}`.
///
/// With `symmetrize`, every candidate `(i, j)` also contributes its mirror `(j, i)`.
pub fn topkdiff_balltree(
    x1: MatrixView<'_, f64>,
    x2: MatrixView<'_, f64>,
    k: usize,
    approximation_factor: f64,
    symmetrize: bool,
    method: Method,
    executor: &Executor,
) -> Result<Correlations, CorrelationError> {
    check_pair(x1, x2, k)?;
    CorrelationError::check_approximation_factor(approximation_factor)?;

    let n = x1.ncols();
    let kk = neighbors_per_query(n, k, approximation_factor);
    tracing::debug!(n, k, kk, symmetrize, %method, "top-k difference ball tree search");

    let a = standardized(x1, method);
    let b = standardized(x2, method);
    let u = augment(&a, &b, 1.0);
    let w = augment(&a, &b, -1.0);

    let mut candidates =
        knn_candidates(u.as_view(), w.as_view(), kk, Strategy::CombinedTree, executor);
    if symmetrize {
        let mirrored: Vec<Entry> = candidates
            .iter()
            .map(|e| Entry::new(e.col, e.row, e.value))
            .collect();
        candidates.extend(mirrored);
    }
    Ok(select_topk(dedup(candidates), k).into_iter().collect())
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use rstest::rstest;

    use super::*;
    use crate::{full::matrix_symmetrical, test_util::uniform};

    fn positions(c: &Correlations) -> Vec<(usize, usize)> {
        let mut p: Vec<_> = c.rows.iter().copied().zip(c.cols.iter().copied()).collect();
        p.sort_unstable();
        p
    }

    #[test]
    fn exact_variants_match_the_definition() {
        let x1 = uniform(14, 20, 1);
        let x2 = uniform(10, 20, 2);
        let k = 40;

        let two = topkdiff_matrix(x1.as_view(), x2.as_view(), k, Method::Pearson).unwrap();
        let one = topkdiff_matrix_one(x1.as_view(), x2.as_view(), k, Method::Pearson).unwrap();
        assert_eq!(positions(&two), positions(&one));

        let c1 = matrix_symmetrical(x1.as_view());
        let c2 = matrix_symmetrical(x2.as_view());
        for e in two.entries() {
            assert_relative_eq!(e.value, c1[(e.row, e.col)] - c2[(e.row, e.col)], epsilon = 1e-10);
        }
    }

    #[test]
    fn identical_groups_have_no_difference() {
        let x = uniform(12, 9, 4);
        let found = topkdiff_matrix(x.as_view(), x.as_view(), 5, Method::Pearson).unwrap();
        assert!(found.values.iter().all(|v| v.abs() < 1e-12));
    }

    #[rstest]
    fn balltree_is_exact_at_full_budget(
        #[values(false, true)] symmetrize: bool,
        #[values(Method::Pearson, Method::Spearman)] method: Method,
    ) {
        let x1 = uniform(16, 30, 5);
        let x2 = uniform(16, 30, 6);
        let k = 60;
        let executor = Executor::with_workers(3).unwrap();

        let exact = topkdiff_matrix(x1.as_view(), x2.as_view(), k, method).unwrap();
        let approx = topkdiff_balltree(
            x1.as_view(),
            x2.as_view(),
            k,
            15.0,
            symmetrize,
            method,
            &executor,
        )
        .unwrap();
        assert_eq!(positions(&approx), positions(&exact));
    }

    #[test]
    fn mismatched_columns() {
        let x1 = uniform(4, 3, 1);
        let x2 = uniform(4, 5, 2);
        assert!(matches!(
            topkdiff_matrix(x1.as_view(), x2.as_view(), 1, Method::Pearson),
            Err(CorrelationError::ColumnMismatch { left: 3, right: 5 })
        ));
    }
}
