/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Top-k correlation search.
//!
//! All variants return the `k` entries of the full `n x n` correlation matrix (diagonal
//! included) with the largest absolute value, ordered strongest first with ties broken by
//! row and then column.

use corals_utils::views::{Matrix, MatrixView};

use crate::{
    balltree::{BallTree, with_negation},
    error::CorrelationError,
    full,
    linalg::dot,
    result::{Correlations, Entry, dedup, select_topk, sort_topk},
    search::{knn_candidates, neighbors_per_query},
    standardize::standardize,
    threads::Executor,
};

pub use crate::search::Strategy;

/// Entries of a mathematically symmetric matrix, reading both triangles from the upper
/// one so that mirrored entries compare equal.
pub(crate) fn symmetric_entries(matrix: &Matrix<f64>) -> Vec<Entry> {
    let n = matrix.nrows();
    let mut entries = Vec::with_capacity(n * n);
    for i in 0..n {
        for j in 0..n {
            let value = if i <= j { matrix[(i, j)] } else { matrix[(j, i)] };
            entries.push(Entry::new(i, j, value));
        }
    }
    entries
}

/// Baseline: the pairwise correlation matrix, fully sorted.
pub fn topk_corrcoef(data: MatrixView<'_, f64>, k: usize) -> Result<Correlations, CorrelationError> {
    CorrelationError::check_k(k, data.ncols())?;
    let r = full::corrcoef(data);
    Ok(sort_topk(symmetric_entries(&r), k).into_iter().collect())
}

/// The Gram-product correlation matrix, fully sorted.
pub fn topk_matrix(data: MatrixView<'_, f64>, k: usize) -> Result<Correlations, CorrelationError> {
    CorrelationError::check_k(k, data.ncols())?;
    let r = full::matrix_symmetrical_nocopy(data);
    Ok(sort_topk(symmetric_entries(&r), k).into_iter().collect())
}

/// The Gram-product correlation matrix with a partial selection of the winners.
pub fn topk_partition(data: MatrixView<'_, f64>, k: usize) -> Result<Correlations, CorrelationError> {
    CorrelationError::check_k(k, data.ncols())?;
    let r = full::matrix_symmetrical_nocopy(data);
    Ok(select_topk(symmetric_entries(&r), k).into_iter().collect())
}

/// Approximate top-k with a ball tree over the standardized columns.
///
/// Each column gathers `ceil(approximation_factor * k / n)` candidates of each sign; the
/// strongest `k` candidates are returned. Once the per-column budget reaches `n` the
/// result is exact.
pub fn topk_balltree(
    data: MatrixView<'_, f64>,
    k: usize,
    approximation_factor: f64,
    strategy: Strategy,
    executor: &Executor,
) -> Result<Correlations, CorrelationError> {
    let n = data.ncols();
    CorrelationError::check_k(k, n)?;
    CorrelationError::check_approximation_factor(approximation_factor)?;

    let kk = neighbors_per_query(n, k, approximation_factor);
    tracing::debug!(n, k, kk, %strategy, n_jobs = executor.n_jobs(), "top-k ball tree search");

    let z = standardize(data);
    let candidates = knn_candidates(z.as_view(), z.as_view(), kk, strategy, executor);
    Ok(select_topk(dedup(candidates), k).into_iter().collect())
}

/// Knobs of [`topk_balltree_tuned`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Tuning {
    /// Visit queries in the leaf order of the tree instead of column order.
    pub query_sort: bool,
    /// Reduce candidates with a partial selection instead of a full sort.
    pub partition: bool,
    /// Workers write candidates into one shared buffer that is reduced once.
    pub direct: bool,
}

/// [`topk_balltree`] with [`Strategy::CombinedTree`], reducing candidates close to where
/// they are produced.
///
/// Without `direct`, every worker keeps only the strongest `k` candidates of its share of
/// the queries, so at most `n_jobs * k` entries reach the final selection. With `direct`,
/// every query owns a fixed slot of the shared buffer. Either way the selected entries are
/// those of the untuned search.
pub fn topk_balltree_tuned(
    data: MatrixView<'_, f64>,
    k: usize,
    approximation_factor: f64,
    tuning: Tuning,
    executor: &Executor,
) -> Result<Correlations, CorrelationError> {
    let n = data.ncols();
    CorrelationError::check_k(k, n)?;
    CorrelationError::check_approximation_factor(approximation_factor)?;

    let kk = neighbors_per_query(n, k, approximation_factor).min(n);
    tracing::debug!(n, k, kk, ?tuning, n_jobs = executor.n_jobs(), "tuned top-k ball tree search");

    let z = standardize(data);
    let tree = BallTree::new(with_negation(z.as_view()));
    let (z, tree) = (&z, &tree);

    let order: Vec<usize> = if tuning.query_sort {
        tree.order().iter().copied().filter(|&i| i < n).collect()
    } else {
        (0..n).collect()
    };
    let reduce = |entries: Vec<Entry>| {
        if tuning.partition {
            select_topk(entries, k)
        } else {
            sort_topk(entries, k)
        }
    };
    let candidates = |i: usize| {
        tree.query(z.row(i), 2 * kk).into_iter().map(move |neighbor| {
            let j = neighbor.id % n;
            Entry::new(i, j, dot(z.row(i), z.row(j)))
        })
    };

    let selected = if tuning.direct {
        let slot = 2 * kk;
        let mut buffer = vec![Entry::new(0, 0, 0.0); n * slot];
        executor.fill(&mut buffer, slot, |q, out| {
            out.iter_mut()
                .zip(candidates(order[q]))
                .for_each(|(o, e)| *o = e);
        });
        reduce(dedup(buffer))
    } else {
        let share = n.div_ceil(executor.n_jobs()).max(1);
        let partial = executor.map(n.div_ceil(share), |w| {
            let queries = &order[w * share..((w + 1) * share).min(n)];
            reduce(dedup(queries.iter().flat_map(|&i| candidates(i)).collect()))
        });
        reduce(partial.into_iter().flatten().collect())
    };
    Ok(selected.into_iter().collect())
}
