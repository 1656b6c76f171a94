/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

use std::fmt;

use corals::{Correlations, CorrelationError, Executor, Strategy, threshold};
use corals_utils::views::MatrixView;

use super::PARALLELISM;

/// Correlations at or above a threshold in absolute value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Threshold {
    Matrix,
    BallTree(Strategy),
    /// Combined-query radius search on `n_jobs` workers.
    BallTreeParallel { n_jobs: usize },
}

impl Threshold {
    pub(super) fn all() -> Vec<Self> {
        let mut all = vec![
            Self::Matrix,
            Self::BallTree(Strategy::CombinedTree),
            Self::BallTree(Strategy::CombinedQuery),
            Self::BallTree(Strategy::Twice),
        ];
        all.extend(PARALLELISM.map(|n_jobs| Self::BallTreeParallel { n_jobs }));
        all
    }

    pub(super) fn n_jobs(&self) -> Option<usize> {
        match self {
            Self::BallTreeParallel { n_jobs } => Some(*n_jobs),
            Self::Matrix | Self::BallTree(_) => None,
        }
    }

    pub(super) fn run(
        &self,
        data: MatrixView<'_, f64>,
        t: f64,
        executor: &Executor,
    ) -> Result<Correlations, CorrelationError> {
        match *self {
            Self::Matrix => threshold::threshold_matrix(data, t),
            Self::BallTree(strategy) => threshold::threshold_balltree(data, t, strategy, executor),
            Self::BallTreeParallel { .. } => {
                threshold::threshold_balltree(data, t, Strategy::CombinedQuery, executor)
            }
        }
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Matrix => f.write_str("threshold_matrix"),
            Self::BallTree(strategy) => write!(f, "threshold_balltree_{strategy}"),
            Self::BallTreeParallel { n_jobs } => {
                write!(f, "threshold_balltree_combined_query_parallel_{n_jobs}")
            }
        }
    }
}
