/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Thresholded correlation search: every entry with `|r| >= threshold`, in row-major
//! order.

use corals_utils::views::MatrixView;

use crate::{
    error::CorrelationError,
    full,
    result::{Correlations, dedup},
    search::{Strategy, radius_candidates},
    standardize::standardize,
    threads::Executor,
    topk::symmetric_entries,
};

/// Slack added to the search radius so that entries exactly at the threshold survive
/// rounding in the distance computation. Candidates are filtered by their exact value.
const RADIUS_SLACK: f64 = 1e-9;

/// Materialize the correlation matrix and keep the entries above the threshold.
pub fn threshold_matrix(
    data: MatrixView<'_, f64>,
    threshold: f64,
) -> Result<Correlations, CorrelationError> {
    CorrelationError::check_threshold(threshold)?;
    let r = full::matrix_symmetrical_nocopy(data);
    Ok(symmetric_entries(&r)
        .into_iter()
        .filter(|e| e.value.abs() >= threshold)
        .collect())
}

/// Radius search with a ball tree over the standardized columns.
///
/// For unit vectors `|z_i - z_j|^2 = 2 - 2 r_ij`, so `r_ij >= t` is a ball of radius
/// `sqrt(2 - 2t)` around `z_i` and `r_ij <= -t` is the same ball around `-z_i`.
pub fn threshold_balltree(
    data: MatrixView<'_, f64>,
    threshold: f64,
    strategy: Strategy,
    executor: &Executor,
) -> Result<Correlations, CorrelationError> {
    CorrelationError::check_threshold(threshold)?;
    let radius = (2.0 - 2.0 * threshold).max(0.0).sqrt() + RADIUS_SLACK;
    tracing::debug!(n = data.ncols(), threshold, radius, %strategy, "threshold ball tree search");

    let z = standardize(data);
    let candidates = radius_candidates(z.as_view(), z.as_view(), radius, strategy, executor);
    Ok(dedup(candidates)
        .into_iter()
        .filter(|e| e.value.abs() >= threshold)
        .collect())
}
