/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

use thiserror::Error;

/// Errors raised by the correlation entry points.
///
/// Numerical edge cases (constant columns, empty results) are not errors: constant columns
/// have zero correlation with everything and an empty selection is a valid result.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CorrelationError {
    #[error("k = {k} exceeds the {total} entries of the correlation matrix")]
    KTooLarge { k: usize, total: usize },

    #[error("paired matrices must have the same number of columns, got {left} and {right}")]
    ColumnMismatch { left: usize, right: usize },

    #[error("threshold must lie in [0, 1], got {0}")]
    Threshold(f64),

    #[error("approximation factor must be positive and finite, got {0}")]
    ApproximationFactor(f64),

    #[error("at least one {0} is required")]
    Zero(&'static str),

    #[error("failed to build a thread pool with {n_jobs} workers")]
    ThreadPool {
        n_jobs: usize,
        #[source]
        source: rayon::ThreadPoolBuildError,
    },
}

impl CorrelationError {
    pub(crate) fn check_k(k: usize, n: usize) -> Result<(), Self> {
        let total = n.saturating_mul(n);
        if k > total {
            Err(Self::KTooLarge { k, total })
        } else {
            Ok(())
        }
    }

    pub(crate) fn check_threshold(threshold: f64) -> Result<(), Self> {
        if (0.0..=1.0).contains(&threshold) {
            Ok(())
        } else {
            Err(Self::Threshold(threshold))
        }
    }

    pub(crate) fn check_approximation_factor(factor: f64) -> Result<(), Self> {
        if factor.is_finite() && factor > 0.0 {
            Ok(())
        } else {
            Err(Self::ApproximationFactor(factor))
        }
    }
}
