/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

use std::fmt;

use corals::{
    Correlations, CorrelationError, Executor,
    topkdiff::{self, Method},
};
use corals_utils::views::MatrixView;

use super::{DEFAULT_APPROXIMATION_FACTOR, PARALLELISM};

/// Top-k search over the difference of the correlation matrices of two sample groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TopkDiff {
    Matrix,
    MatrixOne,
    BallTree { n_jobs: usize, symmetrize: bool },
}

impl TopkDiff {
    pub(super) fn all() -> Vec<Self> {
        let mut all = vec![Self::Matrix, Self::MatrixOne];
        all.extend(PARALLELISM.map(|n_jobs| Self::BallTree {
            n_jobs,
            symmetrize: false,
        }));
        all.push(Self::BallTree {
            n_jobs: 64,
            symmetrize: true,
        });
        all
    }

    pub(super) fn n_jobs(&self) -> Option<usize> {
        match self {
            Self::BallTree { n_jobs, .. } => Some(*n_jobs),
            Self::Matrix | Self::MatrixOne => None,
        }
    }

    pub(super) fn run(
        &self,
        x1: MatrixView<'_, f64>,
        x2: MatrixView<'_, f64>,
        k: usize,
        executor: &Executor,
    ) -> Result<Correlations, CorrelationError> {
        let method = Method::Pearson;
        match *self {
            Self::Matrix => topkdiff::topkdiff_matrix(x1, x2, k, method),
            Self::MatrixOne => topkdiff::topkdiff_matrix_one(x1, x2, k, method),
            Self::BallTree { symmetrize, .. } => topkdiff::topkdiff_balltree(
                x1,
                x2,
                k,
                DEFAULT_APPROXIMATION_FACTOR,
                symmetrize,
                method,
                executor,
            ),
        }
    }
}

impl fmt::Display for TopkDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Matrix => f.write_str("topkdiff_matrix"),
            Self::MatrixOne => f.write_str("topkdiff_matrix_one"),
            Self::BallTree { n_jobs, symmetrize } => {
                let sym = if *symmetrize { "_sym" } else { "" };
                write!(f, "topkdiff_balltree_combined_tree{sym}_parallel_{n_jobs}")
            }
        }
    }
}
