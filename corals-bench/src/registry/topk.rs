/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

use std::fmt;

use corals::{
    Correlations, CorrelationError, Executor, Mapper, Strategy, topk,
    topk::{Tuning, topk_balltree_tuned},
    topk_batched,
};
use corals_utils::views::MatrixView;

use super::{DEFAULT_APPROXIMATION_FACTOR, PARALLELISM};

/// Top-k correlation search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topk {
    Corrcoef,
    Matrix,
    Partition,
    BallTree(Strategy),
    BallTreeParallel { strategy: Strategy, n_jobs: usize },
    /// The combined-tree search with per-worker reduction, on the calling thread.
    BallTreeTuned,
    BallTreeTunedParallel { mode: TunedMode, n_jobs: usize },
    /// Map/reduce with `n_jobs` batches and a ball-tree mapper.
    BatchBallTree { n_jobs: usize },
    /// Map/reduce with `n_jobs` batches and a Gram-product mapper.
    BatchMatmul { n_jobs: usize },
    /// [`Topk::BatchMatmul`] on `n_jobs` scoped OS threads instead of a worker pool.
    BatchMatmulThreads { n_jobs: usize },
}

/// The registered settings of the parallel tuned search. All of them visit queries in
/// tree order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TunedMode {
    Sorted,
    /// Partial selection instead of a full sort.
    Partition,
    /// Candidates go straight into a shared buffer.
    Direct,
}

impl TunedMode {
    const ALL: [Self; 3] = [Self::Sorted, Self::Partition, Self::Direct];

    fn tuning(self) -> Tuning {
        Tuning {
            query_sort: true,
            partition: self == Self::Partition,
            direct: self == Self::Direct,
        }
    }

    // The infix before `parallel_` in identifiers.
    fn infix(self) -> &'static str {
        match self {
            Self::Sorted => "",
            Self::Partition => "partition_",
            Self::Direct => "direct_",
        }
    }
}

impl Topk {
    pub(super) fn all() -> Vec<Self> {
        let mut all = vec![Self::Corrcoef, Self::Matrix, Self::Partition];
        all.extend(Strategy::ALL.map(Self::BallTree));
        for strategy in [Strategy::CombinedQuery, Strategy::CombinedTree] {
            all.extend(
                PARALLELISM.map(|n_jobs| Self::BallTreeParallel { strategy, n_jobs }),
            );
        }
        all.push(Self::BallTreeTuned);
        for mode in TunedMode::ALL {
            all.extend(PARALLELISM.map(|n_jobs| Self::BallTreeTunedParallel { mode, n_jobs }));
        }
        all.extend(PARALLELISM.map(|n_jobs| Self::BatchBallTree { n_jobs }));
        all.extend(PARALLELISM.map(|n_jobs| Self::BatchMatmul { n_jobs }));
        all.extend(PARALLELISM.map(|n_jobs| Self::BatchMatmulThreads { n_jobs }));
        all
    }

    /// The executor the variant runs on.
    pub(super) fn executor(&self) -> Result<Executor, CorrelationError> {
        match (self, self.n_jobs()) {
            (Self::BatchMatmulThreads { n_jobs }, _) => Executor::with_threads(*n_jobs),
            (_, Some(n_jobs)) => Executor::with_workers(n_jobs),
            (_, None) => Ok(Executor::Sequential),
        }
    }

    pub(super) fn n_jobs(&self) -> Option<usize> {
        match self {
            Self::BallTreeParallel { n_jobs, .. }
            | Self::BallTreeTunedParallel { n_jobs, .. }
            | Self::BatchBallTree { n_jobs }
            | Self::BatchMatmul { n_jobs }
            | Self::BatchMatmulThreads { n_jobs } => Some(*n_jobs),
            Self::Corrcoef
            | Self::Matrix
            | Self::Partition
            | Self::BallTree(_)
            | Self::BallTreeTuned => None,
        }
    }

    pub(super) fn run(
        &self,
        data: MatrixView<'_, f64>,
        k: usize,
        executor: &Executor,
    ) -> Result<Correlations, CorrelationError> {
        match *self {
            Self::Corrcoef => topk::topk_corrcoef(data, k),
            Self::Matrix => topk::topk_matrix(data, k),
            Self::Partition => topk::topk_partition(data, k),
            Self::BallTree(strategy) | Self::BallTreeParallel { strategy, .. } => {
                topk::topk_balltree(data, k, DEFAULT_APPROXIMATION_FACTOR, strategy, executor)
            }
            Self::BallTreeTuned => topk_balltree_tuned(
                data,
                k,
                DEFAULT_APPROXIMATION_FACTOR,
                Tuning::default(),
                executor,
            ),
            Self::BallTreeTunedParallel { mode, .. } => topk_balltree_tuned(
                data,
                k,
                DEFAULT_APPROXIMATION_FACTOR,
                mode.tuning(),
                executor,
            ),
            Self::BatchBallTree { n_jobs } => {
                let mapper = Mapper::BallTree {
                    approximation_factor: DEFAULT_APPROXIMATION_FACTOR,
                };
                topk_batched(data, k, mapper, n_jobs, executor)
            }
            Self::BatchMatmul { n_jobs } | Self::BatchMatmulThreads { n_jobs } => {
                topk_batched(data, k, Mapper::Matmul, n_jobs, executor)
            }
        }
    }
}

impl fmt::Display for Topk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Corrcoef => f.write_str("topk_corrcoef"),
            Self::Matrix => f.write_str("topk_matrix"),
            Self::Partition => f.write_str("topk_partition"),
            Self::BallTree(strategy) => write!(f, "topk_balltree_{strategy}"),
            Self::BallTreeParallel { strategy, n_jobs } => {
                write!(f, "topk_balltree_{strategy}_parallel_{n_jobs}")
            }
            Self::BallTreeTuned => f.write_str("topk_balltree_combined_tree_optimized"),
            Self::BallTreeTunedParallel { mode, n_jobs } => write!(
                f,
                "topk_balltree_combined_tree_optimized_{}parallel_{n_jobs}",
                mode.infix()
            ),
            Self::BatchBallTree { n_jobs } => write!(f, "topk_batch_balltree_parallel_{n_jobs}"),
            Self::BatchMatmul { n_jobs } => write!(f, "topk_batch_matmul_parallel_{n_jobs}"),
            Self::BatchMatmulThreads { n_jobs } => {
                write!(f, "topk_batch_matmul_threads_parallel_{n_jobs}")
            }
        }
    }
}
